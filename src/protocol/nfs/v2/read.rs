//! `READ` (procedure 6), RFC 1094 section 2.2.7.
//!
//! At most `MAXDATA` bytes come back per call. The attributes in the reply
//! describe the file after the read, so no GETATTR has to follow.

use tracing::debug;

use super::call;
use crate::error::{Error, Result};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};

pub async fn nfsproc_read(rpc: &RpcClient, args: &nfs2::readargs) -> Result<nfs2::readokres> {
    debug!("nfsproc_read({:?}, offset {}, count {})", args.file, args.offset, args.count);
    let mut reply = call(rpc, NFSProgram::NFSPROC_READ, args).await?;
    let res: nfs2::readokres = reply.decode()?;
    if res.data.len() > args.count as usize {
        return Err(Error::MalformedReply(format!(
            "READ returned {} bytes for a request of {}",
            res.data.len(),
            args.count
        )));
    }
    Ok(res)
}
