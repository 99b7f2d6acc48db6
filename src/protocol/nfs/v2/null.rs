//! `NULL` (procedure 0): does nothing; answers prove the server is reachable.

use tracing::debug;

use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Pings the NFS service. The reply carries no status word.
pub async fn nfsproc_null(rpc: &RpcClient) -> Result<()> {
    debug!("nfsproc_null");
    rpc.call(nfs2::PROGRAM, nfs2::VERSION, NFSProgram::NFSPROC_NULL.number(), &())
        .await?;
    Ok(())
}
