//! `WRITE` (procedure 8), RFC 1094 section 2.2.9.
//!
//! Version 2 writes are synchronous: the reply arrives after the data is on
//! stable storage and carries the new attributes.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_write(rpc: &RpcClient, args: &nfs2::writeargs) -> Result<nfs2::fattr> {
    debug!("nfsproc_write({:?}, offset {}, {} bytes)", args.file, args.offset, args.data.len());
    let mut reply = call(rpc, NFSProgram::NFSPROC_WRITE, args).await?;
    reply.decode()
}
