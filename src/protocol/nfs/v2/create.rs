//! `CREATE` (procedure 9), RFC 1094 section 2.2.10.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Creates a regular file and returns its handle and attributes.
pub async fn nfsproc_create(
    rpc: &RpcClient,
    args: &nfs2::createargs,
) -> Result<nfs2::diropokres> {
    debug!("nfsproc_create({:?}, {})", args.place.dir, args.place.name);
    let mut reply = call(rpc, NFSProgram::NFSPROC_CREATE, args).await?;
    reply.decode()
}
