//! MOUNT protocol version 1 (RFC 1094 Appendix A) data structures.
//!
//! MOUNT hands out the root file handle of an exported directory. Servers
//! that support WebNFS make it optional: the public handle reaches the same
//! tree without any MOUNT round trip.

// Allow unused code; DUMP and EXPORT shapes are kept for completeness
#![allow(dead_code)]
// Names follow the RFC
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::nfs2::fhandle;
use super::*;

/// MOUNT program number for RPC
pub const PROGRAM: u32 = 100005;
/// MOUNT protocol version 1, the companion of NFS version 2
pub const VERSION: u32 = 1;

/// Maximum bytes in a path name
pub const MNTPATHLEN: usize = 1024;

/// Directory path on the server
pub type dirpath = Vec<u8>;

/// Procedure numbers for the `MOUNT` version 1 protocol
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
pub enum MountProgram {
    /// Null procedure for service availability testing
    MOUNTPROC_NULL = 0,
    /// Mount a file system
    MOUNTPROC_MNT = 1,
    /// Get list of mounted file systems
    MOUNTPROC_DUMP = 2,
    /// Unmount a file system
    MOUNTPROC_UMNT = 3,
    /// Unmount all file systems
    MOUNTPROC_UMNTALL = 4,
    /// Get list of exported file systems
    MOUNTPROC_EXPORT = 5,
}
impl SerializeEnum for MountProgram {}
impl DeserializeEnum for MountProgram {}

/// Reply to `MNT`: a Unix errno, and on success the root handle.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct fhstatus {
    pub status: u32,
    pub directory: Option<fhandle>,
}

impl Serialize for fhstatus {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.status.serialize(dest)?;
        match (&self.directory, self.status) {
            (Some(handle), 0) => handle.serialize(dest),
            _ => Ok(()),
        }
    }
}

impl Deserialize for fhstatus {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.status = deserialize(src)?;
        self.directory = if self.status == 0 { Some(deserialize(src)?) } else { None };
        Ok(())
    }
}
