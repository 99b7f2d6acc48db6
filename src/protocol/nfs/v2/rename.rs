//! `RENAME` (procedure 11), RFC 1094 section 2.2.12.
//!
//! Source and destination may live in different directories of the same file
//! system. An existing destination is replaced.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_rename(rpc: &RpcClient, args: &nfs2::renameargs) -> Result<()> {
    debug!(
        "nfsproc_rename({:?}, {} -> {:?}, {})",
        args.from.dir, args.from.name, args.to.dir, args.to.name
    );
    call(rpc, NFSProgram::NFSPROC_RENAME, args).await?;
    Ok(())
}
