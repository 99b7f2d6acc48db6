//! `GETPORT` (procedure 3): where does a program listen?

use tracing::debug;

use crate::error::{Error, NfsStatusError, Result};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::portmap::{self, PortmapProgram};
use crate::protocol::xdr::nfs2;

/// Returns the TCP port of `prog`/`vers`.
///
/// The portmapper answers zero for programs it does not know; that is
/// reported as `NFSERR_NOENT`.
pub async fn pmapproc_getport(rpc: &RpcClient, prog: u32, vers: u32) -> Result<u16> {
    let mapping = portmap::mapping::tcp(prog, vers);
    debug!("pmapproc_getport({:?})", mapping);
    let mut reply = rpc
        .call(portmap::PROGRAM, portmap::VERSION, PortmapProgram::PMAPPROC_GETPORT as u32, &mapping)
        .await?;
    let port = reply.decode_uint32()?;
    debug!(" --> {}", port);
    match port {
        0 => Err(NfsStatusError(nfs2::nfsstat::NFSERR_NOENT as u32).into()),
        port => u16::try_from(port)
            .map_err(|_| Error::MalformedReply(format!("port {port} out of range"))),
    }
}
