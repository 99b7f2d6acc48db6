//! `READDIR` (procedure 16), RFC 1094 section 2.2.17.
//!
//! A listing is read in pages. Each call starts after the entry whose cookie
//! it carries (zero for the first page) and returns as many entries as fit
//! in `count` bytes, plus an end-of-directory flag.

use tracing::{debug, trace};

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_readdir(
    rpc: &RpcClient,
    args: &nfs2::readdirargs,
) -> Result<nfs2::readdirokres> {
    debug!("nfsproc_readdir({:?}, cookie {:?}, count {})", args.dir, args.cookie, args.count);
    let mut reply = call(rpc, NFSProgram::NFSPROC_READDIR, args).await?;
    let res: nfs2::readdirokres = reply.decode()?;
    trace!(" --> {} entries, eof {}", res.entries.len(), res.eof);
    Ok(res)
}
