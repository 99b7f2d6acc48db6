//! `SYMLINK` (procedure 13), RFC 1094 section 2.2.14.
//!
//! Version 2 returns no handle for the new link; it has to be looked up.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_symlink(rpc: &RpcClient, args: &nfs2::symlinkargs) -> Result<()> {
    debug!("nfsproc_symlink({:?}, {} -> {})", args.from.dir, args.from.name, args.to);
    call(rpc, NFSProgram::NFSPROC_SYMLINK, args).await?;
    Ok(())
}
