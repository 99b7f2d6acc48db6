//! NFS version 2 client procedures (RFC 1094).
//!
//! Every procedure lives in its own module as a `nfsproc_*` function over raw
//! protocol types. [`Nfs2`] wraps them for the version-neutral
//! [`Protocol`](super::Protocol) interface.
//!
//! All replies except NULL start with an `nfsstat` word. It is read first and
//! any value other than `NFS_OK` becomes [`NfsStatusError`]; the result body is
//! decoded only on success.

use std::sync::Arc;

use tracing::debug;

use super::{
    Attributes, DirEntry, DirPage, FileHandle, FileType, FsStats, NfsTime, Resolved, SetAttributes,
};
use crate::error::{Error, NfsStatusError, Result};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::nfs2::{self, NFSProgram};
use crate::protocol::xdr::{Serialize, XdrBuffer};

mod create;
mod getattr;
mod link;
mod lookup;
mod mkdir;
mod null;
mod read;
mod readdir;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod statfs;
mod symlink;
mod write;

pub use create::nfsproc_create;
pub use getattr::nfsproc_getattr;
pub use link::nfsproc_link;
pub use lookup::{nfsproc_lookup, nfsproc_security_negotiate};
pub use mkdir::nfsproc_mkdir;
pub use null::nfsproc_null;
pub use read::nfsproc_read;
pub use readdir::nfsproc_readdir;
pub use readlink::nfsproc_readlink;
pub use remove::nfsproc_remove;
pub use rename::nfsproc_rename;
pub use rmdir::nfsproc_rmdir;
pub use setattr::nfsproc_setattr;
pub use statfs::nfsproc_statfs;
pub use symlink::nfsproc_symlink;
pub use write::nfsproc_write;

/// Issues `procedure` and checks the leading status word.
async fn call<A: Serialize + ?Sized>(
    rpc: &RpcClient,
    procedure: NFSProgram,
    args: &A,
) -> Result<XdrBuffer> {
    let mut reply = rpc.call(nfs2::PROGRAM, nfs2::VERSION, procedure.number(), args).await?;
    let status = reply.decode_uint32()?;
    if status != nfs2::nfsstat::NFS_OK as u32 {
        debug!("{:?} failed with status {}", procedure, status);
        return Err(NfsStatusError(status).into());
    }
    Ok(reply)
}

/// A name inside a directory: non-empty, without slashes, at most `MAXNAMLEN`.
fn filename(name: &str) -> Result<nfs2::filename> {
    if name.is_empty() || name.len() > nfs2::MAXNAMLEN || name.contains('/') {
        return Err(Error::InvalidArgument(format!("invalid file name {name:?}")));
    }
    Ok(nfs2::nfsstring::from(name))
}

/// A path below the public handle, which may span several components.
fn public_path(path: &str) -> Result<nfs2::path> {
    if path.len() > nfs2::MAXPATHLEN {
        return Err(Error::InvalidArgument(format!("path longer than {} bytes", nfs2::MAXPATHLEN)));
    }
    Ok(nfs2::nfsstring::from(path))
}

fn offset(offset: u64) -> Result<u32> {
    u32::try_from(offset)
        .map_err(|_| Error::InvalidArgument(format!("offset {offset} beyond the 32-bit range")))
}

fn to_fhandle(handle: &FileHandle) -> Result<nfs2::fhandle> {
    let bytes: [u8; nfs2::FHSIZE] = handle.as_bytes().try_into().map_err(|_| {
        Error::InvalidArgument(format!(
            "file handle of {} bytes is not a version 2 handle",
            handle.as_bytes().len()
        ))
    })?;
    Ok(nfs2::fhandle(bytes))
}

fn from_fhandle(handle: &nfs2::fhandle) -> FileHandle {
    FileHandle::new(&handle.0)
}

fn from_timeval(time: nfs2::timeval) -> NfsTime {
    NfsTime::new(time.seconds, time.useconds.saturating_mul(1000))
}

fn to_timeval(time: Option<NfsTime>) -> nfs2::timeval {
    match time {
        Some(time) => nfs2::timeval { seconds: time.seconds, useconds: time.nanos / 1000 },
        None => nfs2::timeval { seconds: nfs2::SATTR_UNSET, useconds: nfs2::SATTR_UNSET },
    }
}

fn from_ftype(ftype: nfs2::ftype) -> FileType {
    match ftype {
        nfs2::ftype::NFNON => FileType::None,
        nfs2::ftype::NFREG => FileType::Regular,
        nfs2::ftype::NFDIR => FileType::Directory,
        nfs2::ftype::NFBLK => FileType::BlockDevice,
        nfs2::ftype::NFCHR => FileType::CharDevice,
        nfs2::ftype::NFLNK => FileType::Symlink,
        nfs2::ftype::NFSOCK => FileType::Socket,
        nfs2::ftype::NFBAD => FileType::Bad,
        nfs2::ftype::NFFIFO => FileType::Fifo,
    }
}

fn from_fattr(attr: &nfs2::fattr) -> Attributes {
    Attributes {
        file_type: from_ftype(attr.ftype),
        mode: attr.mode & 0o7777,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        size: attr.size as u64,
        block_size: attr.blocksize,
        rdev: attr.rdev,
        blocks: attr.blocks as u64,
        fsid: attr.fsid as u64,
        fileid: attr.fileid as u64,
        atime: from_timeval(attr.atime),
        mtime: from_timeval(attr.mtime),
        ctime: from_timeval(attr.ctime),
    }
}

fn to_sattr(attributes: &SetAttributes) -> Result<nfs2::sattr> {
    let size = match attributes.size {
        Some(size) => u32::try_from(size)
            .ok()
            .filter(|s| *s != nfs2::SATTR_UNSET)
            .ok_or_else(|| Error::InvalidArgument(format!("size {size} beyond the 32-bit range")))?,
        None => nfs2::SATTR_UNSET,
    };
    Ok(nfs2::sattr {
        mode: attributes.mode.unwrap_or(nfs2::SATTR_UNSET),
        uid: attributes.uid.unwrap_or(nfs2::SATTR_UNSET),
        gid: attributes.gid.unwrap_or(nfs2::SATTR_UNSET),
        size,
        atime: to_timeval(attributes.atime),
        mtime: to_timeval(attributes.mtime),
    })
}

fn resolved(res: &nfs2::diropokres) -> Resolved {
    Resolved { handle: from_fhandle(&res.file), attributes: from_fattr(&res.attributes) }
}

/// The version 2 protocol over one RPC client.
pub struct Nfs2 {
    rpc: Arc<RpcClient>,
}

impl Nfs2 {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }

    pub async fn null(&self) -> Result<()> {
        nfsproc_null(&self.rpc).await
    }

    pub async fn getattr(&self, file: &FileHandle) -> Result<Attributes> {
        let attr = nfsproc_getattr(&self.rpc, &to_fhandle(file)?).await?;
        Ok(from_fattr(&attr))
    }

    pub async fn setattr(
        &self,
        file: &FileHandle,
        attributes: &SetAttributes,
    ) -> Result<Attributes> {
        let args = nfs2::sattrargs { file: to_fhandle(file)?, attributes: to_sattr(attributes)? };
        let attr = nfsproc_setattr(&self.rpc, &args).await?;
        Ok(from_fattr(&attr))
    }

    /// Looks up `name` in `dir`. Below the public handle `name` may be a
    /// slash-separated path.
    pub async fn lookup(&self, dir: &FileHandle, name: &str) -> Result<Resolved> {
        let name = if dir.is_public() { public_path(name)? } else { filename(name)? };
        let args = nfs2::diropargs { dir: to_fhandle(dir)?, name };
        let res = nfsproc_lookup(&self.rpc, &args).await?;
        Ok(resolved(&res))
    }

    pub async fn negotiate_security(&self, path: &str) -> Result<Vec<u32>> {
        let path = public_path(path.trim_start_matches('/'))?;
        nfsproc_security_negotiate(&self.rpc, path.as_ref()).await
    }

    pub async fn readlink(&self, file: &FileHandle) -> Result<String> {
        let target = nfsproc_readlink(&self.rpc, &to_fhandle(file)?).await?;
        Ok(target.to_string())
    }

    pub async fn read(
        &self,
        file: &FileHandle,
        at: u64,
        count: u32,
    ) -> Result<(Vec<u8>, Attributes)> {
        let args = nfs2::readargs {
            file: to_fhandle(file)?,
            offset: offset(at)?,
            count: count.min(nfs2::MAXDATA),
            totalcount: 0,
        };
        let res = nfsproc_read(&self.rpc, &args).await?;
        Ok((res.data, from_fattr(&res.attributes)))
    }

    pub async fn write(&self, file: &FileHandle, at: u64, data: &[u8]) -> Result<Attributes> {
        if data.len() > nfs2::MAXDATA as usize {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes exceeds {}",
                data.len(),
                nfs2::MAXDATA
            )));
        }
        let args = nfs2::writeargs {
            file: to_fhandle(file)?,
            beginoffset: 0,
            offset: offset(at)?,
            totalcount: 0,
            data: data.to_vec(),
        };
        let attr = nfsproc_write(&self.rpc, &args).await?;
        Ok(from_fattr(&attr))
    }

    pub async fn create(
        &self,
        dir: &FileHandle,
        name: &str,
        attributes: &SetAttributes,
    ) -> Result<Resolved> {
        let args = nfs2::createargs {
            place: nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? },
            attributes: to_sattr(attributes)?,
        };
        Ok(resolved(&nfsproc_create(&self.rpc, &args).await?))
    }

    pub async fn mkdir(
        &self,
        dir: &FileHandle,
        name: &str,
        attributes: &SetAttributes,
    ) -> Result<Resolved> {
        let args = nfs2::createargs {
            place: nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? },
            attributes: to_sattr(attributes)?,
        };
        Ok(resolved(&nfsproc_mkdir(&self.rpc, &args).await?))
    }

    pub async fn remove(&self, dir: &FileHandle, name: &str) -> Result<()> {
        let args = nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? };
        nfsproc_remove(&self.rpc, &args).await
    }

    pub async fn rmdir(&self, dir: &FileHandle, name: &str) -> Result<()> {
        let args = nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? };
        nfsproc_rmdir(&self.rpc, &args).await
    }

    pub async fn rename(
        &self,
        from_dir: &FileHandle,
        from_name: &str,
        to_dir: &FileHandle,
        to_name: &str,
    ) -> Result<()> {
        let args = nfs2::renameargs {
            from: nfs2::diropargs { dir: to_fhandle(from_dir)?, name: filename(from_name)? },
            to: nfs2::diropargs { dir: to_fhandle(to_dir)?, name: filename(to_name)? },
        };
        nfsproc_rename(&self.rpc, &args).await
    }

    pub async fn link(&self, file: &FileHandle, dir: &FileHandle, name: &str) -> Result<()> {
        let args = nfs2::linkargs {
            from: to_fhandle(file)?,
            to: nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? },
        };
        nfsproc_link(&self.rpc, &args).await
    }

    pub async fn symlink(
        &self,
        dir: &FileHandle,
        name: &str,
        target: &str,
        attributes: &SetAttributes,
    ) -> Result<()> {
        if target.is_empty() || target.len() > nfs2::MAXPATHLEN {
            return Err(Error::InvalidArgument(format!("invalid link target {target:?}")));
        }
        let args = nfs2::symlinkargs {
            from: nfs2::diropargs { dir: to_fhandle(dir)?, name: filename(name)? },
            to: nfs2::nfsstring::from(target),
            attributes: to_sattr(attributes)?,
        };
        nfsproc_symlink(&self.rpc, &args).await
    }

    pub async fn readdir(&self, dir: &FileHandle, cookie: u64, count: u32) -> Result<DirPage> {
        let cookie = u32::try_from(cookie).map_err(|_| {
            Error::InvalidArgument(format!("cookie {cookie} beyond the 32-bit range"))
        })?;
        let args = nfs2::readdirargs { dir: to_fhandle(dir)?, cookie: cookie.to_be_bytes(), count };
        let res = nfsproc_readdir(&self.rpc, &args).await?;
        let entries = res
            .entries
            .into_iter()
            .map(|entry| DirEntry {
                fileid: entry.fileid as u64,
                name: entry.name.to_string(),
                cookie: u32::from_be_bytes(entry.cookie) as u64,
            })
            .collect();
        Ok(DirPage { entries, eof: res.eof })
    }

    pub async fn statfs(&self, file: &FileHandle) -> Result<FsStats> {
        let res = nfsproc_statfs(&self.rpc, &to_fhandle(file)?).await?;
        Ok(FsStats {
            transfer_size: res.tsize,
            block_size: res.bsize,
            blocks: res.blocks as u64,
            blocks_free: res.bfree as u64,
            blocks_available: res.bavail as u64,
        })
    }
}
