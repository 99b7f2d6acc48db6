//! `READLINK` (procedure 5), RFC 1094 section 2.2.6.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_readlink(rpc: &RpcClient, file: &nfs2::fhandle) -> Result<nfs2::path> {
    debug!("nfsproc_readlink({:?})", file);
    let mut reply = call(rpc, NFSProgram::NFSPROC_READLINK, file).await?;
    reply.decode()
}
