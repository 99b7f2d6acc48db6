//! `RMDIR` (procedure 15), RFC 1094 section 2.2.16.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Removes an empty directory.
pub async fn nfsproc_rmdir(rpc: &RpcClient, args: &nfs2::diropargs) -> Result<()> {
    debug!("nfsproc_rmdir({:?}, {})", args.dir, args.name);
    call(rpc, NFSProgram::NFSPROC_RMDIR, args).await?;
    Ok(())
}
