//! `STATFS` (procedure 17), RFC 1094 section 2.2.18.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Reports capacity of the file system containing `file`.
pub async fn nfsproc_statfs(rpc: &RpcClient, file: &nfs2::fhandle) -> Result<nfs2::statfsokres> {
    debug!("nfsproc_statfs({:?})", file);
    let mut reply = call(rpc, NFSProgram::NFSPROC_STATFS, file).await?;
    reply.decode()
}
