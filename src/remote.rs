//! File-like view of remote objects for code that should not depend on NFS.
//!
//! [`RemoteFile`] is what an application layer (a file browser, a copy
//! tool) programs against. It is implemented for `Arc<NfsNode>`.

use std::sync::Arc;

use async_trait::async_trait;
use filetime::FileTime;

use crate::error::{Error, Result};
use crate::node::NfsNode;
use crate::protocol::nfs::FileType;
use crate::protocol::xdr::nfs2::nfsstat;

/// Kind of access asked of [`RemoteFile::permission`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    /// The "other" permission bit; shifted by 3 for group, 6 for owner.
    fn bit(self) -> u32 {
        match self {
            Access::Read => 0o4,
            Access::Write => 0o2,
            Access::Execute => 0o1,
        }
    }
}

#[async_trait]
pub trait RemoteFile: Sized + Send + Sync {
    /// False if the server no longer knows the object.
    async fn exists(&self) -> Result<bool>;

    async fn is_directory(&self) -> Result<bool>;

    /// Size in bytes
    async fn length(&self) -> Result<u64>;

    /// Last modification time
    async fn mtime(&self) -> Result<FileTime>;

    /// Checks the mode bits against the current credential's identity.
    ///
    /// This mirrors what the server will most likely decide; the server
    /// has the final word.
    async fn permission(&self, access: Access) -> Result<bool>;

    /// Names of the directory's entries
    async fn list(&self) -> Result<Vec<String>>;

    /// Resolves a name in this directory, following a final symlink.
    async fn lookup(&self, name: &str) -> Result<Self>;

    async fn read(&self, offset: u64, len: u32) -> Result<Vec<u8>>;

    /// Writes at most one transfer's worth and returns the bytes written.
    async fn write(&self, offset: u64, data: &[u8]) -> Result<usize>;

    async fn create(&self, name: &str, mode: u32) -> Result<Self>;

    async fn mkdir(&self, name: &str, mode: u32) -> Result<Self>;

    /// Removes a file or an empty directory.
    async fn remove(&self, name: &str) -> Result<()>;

    async fn rename(&self, from: &str, to_dir: &Self, to: &str) -> Result<()>;
}

#[async_trait]
impl RemoteFile for Arc<NfsNode> {
    async fn exists(&self) -> Result<bool> {
        match self.getattr().await {
            Ok(_) => Ok(true),
            Err(err)
                if matches!(
                    err.nfs_status(),
                    Some(nfsstat::NFSERR_NOENT | nfsstat::NFSERR_STALE)
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn is_directory(&self) -> Result<bool> {
        Ok(self.fresh_attributes().await?.file_type == FileType::Directory)
    }

    async fn length(&self) -> Result<u64> {
        Ok(self.fresh_attributes().await?.size)
    }

    async fn mtime(&self) -> Result<FileTime> {
        Ok(self.fresh_attributes().await?.mtime.into())
    }

    async fn permission(&self, access: Access) -> Result<bool> {
        let attributes = self.fresh_attributes().await?;
        let identity = self.credentials().identity();
        if identity.uid == 0 {
            return Ok(access != Access::Execute
                || attributes.file_type == FileType::Directory
                || attributes.mode & 0o111 != 0);
        }
        let shift = if identity.uid == attributes.uid {
            6
        } else if identity.in_group(attributes.gid) {
            3
        } else {
            0
        };
        Ok(attributes.mode & (access.bit() << shift) != 0)
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.readdir().await?.to_vec())
    }

    async fn lookup(&self, name: &str) -> Result<Self> {
        NfsNode::lookup(self, name).await
    }

    async fn read(&self, offset: u64, len: u32) -> Result<Vec<u8>> {
        NfsNode::read(self, offset, len).await
    }

    async fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        NfsNode::write(self, offset, data).await
    }

    async fn create(&self, name: &str, mode: u32) -> Result<Self> {
        NfsNode::create(self, name, mode).await
    }

    async fn mkdir(&self, name: &str, mode: u32) -> Result<Self> {
        NfsNode::mkdir(self, name, mode).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        match NfsNode::remove(self, name).await {
            Err(err) if err.nfs_status() == Some(nfsstat::NFSERR_ISDIR) => {
                NfsNode::rmdir(self, name).await
            }
            other => other,
        }
    }

    async fn rename(&self, from: &str, to_dir: &Self, to: &str) -> Result<()> {
        if to_dir.server() != self.server() {
            return Err(Error::InvalidArgument(format!(
                "cannot rename across servers {} and {}",
                self.server(),
                to_dir.server()
            )));
        }
        NfsNode::rename(self, from, to_dir, to).await
    }
}
