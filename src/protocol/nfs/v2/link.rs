//! `LINK` (procedure 12), RFC 1094 section 2.2.13.

use tracing::debug;

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

/// Creates the hard link `to` for the existing file `from`.
pub async fn nfsproc_link(rpc: &RpcClient, args: &nfs2::linkargs) -> Result<()> {
    debug!("nfsproc_link({:?} -> {:?}, {})", args.from, args.to.dir, args.to.name);
    call(rpc, NFSProgram::NFSPROC_LINK, args).await?;
    Ok(())
}
