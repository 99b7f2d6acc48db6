//! `REMOVE` (procedure 10), RFC 1094 section 2.2.11.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Removes a non-directory entry. The reply is the bare status.
pub async fn nfsproc_remove(rpc: &RpcClient, args: &nfs2::diropargs) -> Result<()> {
    debug!("nfsproc_remove({:?}, {})", args.dir, args.name);
    call(rpc, NFSProgram::NFSPROC_REMOVE, args).await?;
    Ok(())
}
