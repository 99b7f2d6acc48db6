//! `SETATTR` (procedure 2), RFC 1094 section 2.2.2.
//!
//! Fields of the `sattr` set to all ones are ignored by the server; a size
//! change truncates or extends the file.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Changes attributes and returns the resulting ones.
pub async fn nfsproc_setattr(rpc: &RpcClient, args: &nfs2::sattrargs) -> Result<nfs2::fattr> {
    debug!("nfsproc_setattr({:?})", args);
    let mut reply = call(rpc, NFSProgram::NFSPROC_SETATTR, args).await?;
    reply.decode()
}
