//! `LOOKUP` (procedure 4), RFC 1094 section 2.2.5, and the WebNFS security
//! negotiation built on it (RFC 2755).

use tracing::{debug, warn};

use super::call;
use crate::error::Result;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, webnfs, NFSProgram};

/// Resolves `args.name` in `args.dir`.
pub async fn nfsproc_lookup(rpc: &RpcClient, args: &nfs2::diropargs) -> Result<nfs2::diropokres> {
    debug!("nfsproc_lookup({:?}, {})", args.dir, args.name);
    let mut reply = call(rpc, NFSProgram::NFSPROC_LOOKUP, args).await?;
    reply.decode()
}

/// Asks which security flavors protect `path` below the public handle.
///
/// Each reply packs up to seven flavors into an overloaded file handle. While
/// the server signals that more follow, the next request starts at the index
/// just past the flavors received so far. A reply without flavors, or an
/// index that would not fit its byte, ends the exchange.
pub async fn nfsproc_security_negotiate(rpc: &RpcClient, path: &[u8]) -> Result<Vec<u32>> {
    let mut flavors = Vec::new();
    let mut index: u8 = 1;
    loop {
        let args = nfs2::diropargs {
            dir: nfs2::fhandle::PUBLIC,
            name: webnfs::negotiation_name(index, path).into(),
        };
        debug!("security negotiation for {:?} at index {}", String::from_utf8_lossy(path), index);
        let mut reply = call(rpc, NFSProgram::NFSPROC_LOOKUP, &args).await?;
        let res: nfs2::diropokres = reply.decode()?;
        let (batch, more) = webnfs::parse_flavors(&res.file);
        let received = batch.len();
        flavors.extend(batch);

        if !more || received == 0 {
            break;
        }
        match u8::try_from(received).ok().and_then(|n| index.checked_add(n)) {
            Some(next) => index = next,
            None => {
                warn!("security negotiation index overflow after {} flavors", flavors.len());
                break;
            }
        }
    }
    debug!("server offers flavors {:?}", flavors);
    Ok(flavors)
}
