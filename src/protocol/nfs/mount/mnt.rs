//! `MNT` (procedure 1): exchanges an export path for its root file handle.

use tracing::debug;

use crate::error::{Error, NfsStatusError, Result};
use crate::protocol::nfs::FileHandle;
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::mount::{self, MountProgram};

/// Mounts `path` and returns the root handle of the export.
///
/// A non-zero status is a Unix errno; it is reported like an NFS status.
pub async fn mountproc_mnt(rpc: &RpcClient, path: &str) -> Result<FileHandle> {
    if path.len() > mount::MNTPATHLEN {
        return Err(Error::InvalidArgument(format!("mount path longer than {}", mount::MNTPATHLEN)));
    }
    debug!("mountproc_mnt({:?})", path);
    let mut reply = rpc
        .call(mount::PROGRAM, mount::VERSION, MountProgram::MOUNTPROC_MNT as u32, path)
        .await?;
    let res: mount::fhstatus = reply.decode()?;
    match res.directory {
        Some(handle) if res.status == 0 => Ok(FileHandle::new(&handle.0)),
        _ => {
            debug!("{:?} --> mount status {}", path, res.status);
            Err(NfsStatusError(res.status).into())
        }
    }
}
