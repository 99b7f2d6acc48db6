//! `GETATTR` (procedure 1), RFC 1094 section 2.2.1.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Fetches the attributes of `file`.
pub async fn nfsproc_getattr(rpc: &RpcClient, file: &nfs2::fhandle) -> Result<nfs2::fattr> {
    debug!("nfsproc_getattr({:?})", file);
    let mut reply = call(rpc, NFSProgram::NFSPROC_GETATTR, file).await?;
    reply.decode()
}
