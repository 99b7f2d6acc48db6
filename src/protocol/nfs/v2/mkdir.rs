//! `MKDIR` (procedure 14), RFC 1094 section 2.2.15.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_mkdir(rpc: &RpcClient, args: &nfs2::createargs) -> Result<nfs2::diropokres> {
    debug!("nfsproc_mkdir({:?}, {})", args.place.dir, args.place.name);
    let mut reply = call(rpc, NFSProgram::NFSPROC_MKDIR, args).await?;
    reply.decode()
}
