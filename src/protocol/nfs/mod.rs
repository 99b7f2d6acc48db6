//! NFS operation layer.
//!
//! - `v2`: the NFS version 2 procedures (RFC 1094), one module per procedure,
//!   including the WebNFS security negotiation (RFC 2755).
//! - `mount`: MOUNT version 1, for servers that do not offer public access.
//! - `portmap`: `GETPORT`, to find mountd and pcnfsd.
//!
//! The node and cache layers talk to a [`Protocol`] in the version-neutral
//! types defined here; version-specific wire encoding stays inside the
//! variant that owns it.

use std::fmt;
use std::sync::Arc;

use filetime::FileTime;
use smallvec::SmallVec;

use crate::error::Result;
use crate::protocol::rpc::RpcClient;

pub mod mount;
pub mod portmap;
pub mod v2;

pub use v2::Nfs2;

/// Opaque, server-assigned identifier of a file.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FileHandle(SmallVec<[u8; 32]>);

impl FileHandle {
    pub fn new(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    /// The all-zero handle of the given size, which WebNFS servers map to
    /// their public directory.
    pub fn public(size: usize) -> Self {
        Self(SmallVec::from_elem(0, size))
    }

    pub fn is_public(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FileType {
    #[default]
    None,
    Regular,
    Directory,
    BlockDevice,
    CharDevice,
    Symlink,
    Socket,
    Fifo,
    /// A type the server could not classify
    Bad,
}

/// A server timestamp.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NfsTime {
    pub seconds: u32,
    pub nanos: u32,
}

impl NfsTime {
    pub fn new(seconds: u32, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// The current local time.
    pub fn now() -> Self {
        let now = FileTime::now();
        Self { seconds: now.unix_seconds() as u32, nanos: now.nanoseconds() }
    }
}

impl From<NfsTime> for FileTime {
    fn from(time: NfsTime) -> Self {
        FileTime::from_unix_time(time.seconds as i64, time.nanos)
    }
}

/// File attributes as reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub file_type: FileType,
    /// Permission bits; the file type bits are masked off
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub block_size: u32,
    pub rdev: u32,
    pub blocks: u64,
    pub fsid: u64,
    pub fileid: u64,
    pub atime: NfsTime,
    pub mtime: NfsTime,
    pub ctime: NfsTime,
}

/// Attributes to change; `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetAttributes {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<NfsTime>,
    pub mtime: Option<NfsTime>,
}

impl SetAttributes {
    /// Mode plus the current time as access and modification time, the seed
    /// used for newly created objects.
    pub fn for_create(mode: u32) -> Self {
        let now = NfsTime::now();
        Self { mode: Some(mode), atime: Some(now), mtime: Some(now), ..Default::default() }
    }
}

/// A handle together with its attributes, as returned by LOOKUP and CREATE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub handle: FileHandle,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub fileid: u64,
    pub name: String,
    /// Resumes the listing after this entry
    pub cookie: u64,
}

/// One READDIR reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirPage {
    pub entries: Vec<DirEntry>,
    pub eof: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FsStats {
    /// Preferred transfer size
    pub transfer_size: u32,
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
}

/// A protocol version bound to one server connection.
pub enum Protocol {
    V2(Nfs2),
}

impl Protocol {
    pub fn version(&self) -> u32 {
        match self {
            Protocol::V2(_) => crate::protocol::xdr::nfs2::VERSION,
        }
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        match self {
            Protocol::V2(nfs) => nfs.rpc(),
        }
    }

    /// Size of the all-zero public handle.
    pub fn public_handle(&self) -> FileHandle {
        match self {
            Protocol::V2(_) => FileHandle::public(crate::protocol::xdr::nfs2::FHSIZE),
        }
    }

    pub async fn null(&self) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.null().await,
        }
    }

    pub async fn getattr(&self, file: &FileHandle) -> Result<Attributes> {
        match self {
            Protocol::V2(nfs) => nfs.getattr(file).await,
        }
    }

    pub async fn setattr(
        &self,
        file: &FileHandle,
        attributes: &SetAttributes,
    ) -> Result<Attributes> {
        match self {
            Protocol::V2(nfs) => nfs.setattr(file, attributes).await,
        }
    }

    pub async fn lookup(&self, dir: &FileHandle, name: &str) -> Result<Resolved> {
        match self {
            Protocol::V2(nfs) => nfs.lookup(dir, name).await,
        }
    }

    /// Security flavors the server accepts for `path` below the public handle.
    pub async fn negotiate_security(&self, path: &str) -> Result<Vec<u32>> {
        match self {
            Protocol::V2(nfs) => nfs.negotiate_security(path).await,
        }
    }

    pub async fn readlink(&self, file: &FileHandle) -> Result<String> {
        match self {
            Protocol::V2(nfs) => nfs.readlink(file).await,
        }
    }

    pub async fn read(
        &self,
        file: &FileHandle,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, Attributes)> {
        match self {
            Protocol::V2(nfs) => nfs.read(file, offset, count).await,
        }
    }

    pub async fn write(&self, file: &FileHandle, offset: u64, data: &[u8]) -> Result<Attributes> {
        match self {
            Protocol::V2(nfs) => nfs.write(file, offset, data).await,
        }
    }

    pub async fn create(
        &self,
        dir: &FileHandle,
        name: &str,
        attributes: &SetAttributes,
    ) -> Result<Resolved> {
        match self {
            Protocol::V2(nfs) => nfs.create(dir, name, attributes).await,
        }
    }

    pub async fn mkdir(
        &self,
        dir: &FileHandle,
        name: &str,
        attributes: &SetAttributes,
    ) -> Result<Resolved> {
        match self {
            Protocol::V2(nfs) => nfs.mkdir(dir, name, attributes).await,
        }
    }

    pub async fn remove(&self, dir: &FileHandle, name: &str) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.remove(dir, name).await,
        }
    }

    pub async fn rmdir(&self, dir: &FileHandle, name: &str) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.rmdir(dir, name).await,
        }
    }

    pub async fn rename(
        &self,
        from_dir: &FileHandle,
        from_name: &str,
        to_dir: &FileHandle,
        to_name: &str,
    ) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.rename(from_dir, from_name, to_dir, to_name).await,
        }
    }

    pub async fn link(&self, file: &FileHandle, dir: &FileHandle, name: &str) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.link(file, dir, name).await,
        }
    }

    pub async fn symlink(
        &self,
        dir: &FileHandle,
        name: &str,
        target: &str,
        attributes: &SetAttributes,
    ) -> Result<()> {
        match self {
            Protocol::V2(nfs) => nfs.symlink(dir, name, target, attributes).await,
        }
    }

    pub async fn readdir(&self, dir: &FileHandle, cookie: u64, count: u32) -> Result<DirPage> {
        match self {
            Protocol::V2(nfs) => nfs.readdir(dir, cookie, count).await,
        }
    }

    pub async fn statfs(&self, file: &FileHandle) -> Result<FsStats> {
        match self {
            Protocol::V2(nfs) => nfs.statfs(file).await,
        }
    }
}
