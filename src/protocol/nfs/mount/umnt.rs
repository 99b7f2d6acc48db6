//! `UMNT` (procedure 3): tells mountd the client no longer uses an export.

use tracing::debug;

use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::mount::{self, MountProgram};

/// Releases `path`. The reply carries no results.
pub async fn mountproc_umnt(rpc: &RpcClient, path: &str) -> Result<()> {
    debug!("mountproc_umnt({:?})", path);
    rpc.call(mount::PROGRAM, mount::VERSION, MountProgram::MOUNTPROC_UMNT as u32, path).await?;
    Ok(())
}
