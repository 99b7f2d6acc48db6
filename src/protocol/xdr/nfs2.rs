//! XDR types and constants of the NFS version 2 protocol (RFC 1094).
//!
//! Version 2 is the small, 32-bit ancestor of NFSv3: fixed 32 byte file
//! handles, 32-bit sizes and offsets, microsecond timestamps and a 4 byte
//! directory cookie. Only the shapes the client sends or decodes live here;
//! status unions are decoded by the procedure layer, which reads the status
//! word first and the result body only on `NFS_OK`.

// Allow unused items; not every status code or structure is used by every caller
#![allow(dead_code)]
// Names follow RFC 1094
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// The RPC program number of NFS.
pub const PROGRAM: u32 = 100003;
/// The protocol version described by this module.
pub const VERSION: u32 = 2;
/// Well-known port of NFS and of WebNFS public access.
pub const NFS_PORT: u16 = 2049;

/// Largest READ or WRITE payload.
pub const MAXDATA: u32 = 8192;
/// Longest pathname accepted by the server.
pub const MAXPATHLEN: usize = 1024;
/// Longest single filename.
pub const MAXNAMLEN: usize = 255;
/// Size of the opaque file handle.
pub const FHSIZE: usize = 32;
/// Size of the opaque READDIR cookie.
pub const COOKIESIZE: usize = 4;

/// Sattr fields set to all ones are left unchanged by the server.
pub const SATTR_UNSET: u32 = u32::MAX;

/// Procedure numbers of NFS version 2.
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum NFSProgram {
    NFSPROC_NULL = 0,
    NFSPROC_GETATTR = 1,
    NFSPROC_SETATTR = 2,
    /// Obsolete; never sent
    NFSPROC_ROOT = 3,
    NFSPROC_LOOKUP = 4,
    NFSPROC_READLINK = 5,
    NFSPROC_READ = 6,
    /// Reserved for a write cache; never sent
    NFSPROC_WRITECACHE = 7,
    NFSPROC_WRITE = 8,
    NFSPROC_CREATE = 9,
    NFSPROC_REMOVE = 10,
    NFSPROC_RENAME = 11,
    NFSPROC_LINK = 12,
    NFSPROC_SYMLINK = 13,
    NFSPROC_MKDIR = 14,
    NFSPROC_RMDIR = 15,
    NFSPROC_READDIR = 16,
    NFSPROC_STATFS = 17,
}

impl NFSProgram {
    pub fn number(self) -> u32 {
        self as u32
    }
}

/// Status codes of NFS version 2 replies.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat {
    NFS_OK = 0,
    /// Not owner
    NFSERR_PERM = 1,
    /// No such file or directory
    NFSERR_NOENT = 2,
    /// Hard I/O error on the server
    NFSERR_IO = 5,
    /// No such device or address
    NFSERR_NXIO = 6,
    /// Permission denied
    NFSERR_ACCES = 13,
    /// File exists
    NFSERR_EXIST = 17,
    /// No such device
    NFSERR_NODEV = 19,
    /// Not a directory
    NFSERR_NOTDIR = 20,
    /// Is a directory
    NFSERR_ISDIR = 21,
    /// File too large
    NFSERR_FBIG = 27,
    /// No space left on device
    NFSERR_NOSPC = 28,
    /// Read-only file system
    NFSERR_ROFS = 30,
    /// Filename too long
    NFSERR_NAMETOOLONG = 63,
    /// Directory not empty
    NFSERR_NOTEMPTY = 66,
    /// Disk quota exceeded
    NFSERR_DQUOT = 69,
    /// The file handle no longer refers to a file
    NFSERR_STALE = 70,
    /// Server write cache flushed
    NFSERR_WFLUSH = 99,
}
impl SerializeEnum for nfsstat {}
impl DeserializeEnum for nfsstat {}

/// File types of NFS version 2.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype {
    #[default]
    NFNON = 0,
    NFREG = 1,
    NFDIR = 2,
    NFBLK = 3,
    NFCHR = 4,
    NFLNK = 5,
    NFSOCK = 6,
    NFBAD = 7,
    NFFIFO = 8,
}
impl SerializeEnum for ftype {}
impl DeserializeEnum for ftype {}

/// The opaque file handle. Its contents mean nothing to the client.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct fhandle(pub [u8; FHSIZE]);

impl fhandle {
    /// The all-zero public handle of WebNFS.
    pub const PUBLIC: fhandle = fhandle([0; FHSIZE]);

    pub fn is_public(&self) -> bool {
        self.0 == [0; FHSIZE]
    }
}

impl Serialize for fhandle {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for fhandle {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

impl fmt::Debug for fhandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Seconds and microseconds since the epoch.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct timeval {
    pub seconds: u32,
    pub useconds: u32,
}
DeserializeStruct!(timeval, seconds, useconds);
SerializeStruct!(timeval, seconds, useconds);

/// File attributes.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr {
    pub ftype: ftype,
    /// Protection mode bits, including the file type bits
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub blocksize: u32,
    /// Device number for block and character specials
    pub rdev: u32,
    pub blocks: u32,
    pub fsid: u32,
    pub fileid: u32,
    pub atime: timeval,
    pub mtime: timeval,
    pub ctime: timeval,
}
DeserializeStruct!(
    fattr, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);
SerializeStruct!(
    fattr, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);

/// Settable attributes; all-ones fields are ignored by the server.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct sattr {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub atime: timeval,
    pub mtime: timeval,
}
DeserializeStruct!(sattr, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr, mode, uid, gid, size, atime, mtime);

impl Default for sattr {
    fn default() -> Self {
        let unset = timeval { seconds: SATTR_UNSET, useconds: SATTR_UNSET };
        Self {
            mode: SATTR_UNSET,
            uid: SATTR_UNSET,
            gid: SATTR_UNSET,
            size: SATTR_UNSET,
            atime: unset,
            mtime: unset,
        }
    }
}

/// A filename or path as raw bytes.
///
/// Names are byte strings on the wire; the WebNFS negotiation name is not
/// even valid UTF-8, so no encoding is imposed here.
#[allow(non_camel_case_types)]
#[derive(Clone, Default, PartialEq, Eq)]
pub struct nfsstring(pub Vec<u8>);

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

pub type filename = nfsstring;
pub type path = nfsstring;
pub type nfscookie = [u8; COOKIESIZE];

/// A name within a directory.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct diropargs {
    pub dir: fhandle,
    pub name: filename,
}
DeserializeStruct!(diropargs, dir, name);
SerializeStruct!(diropargs, dir, name);

/// Body of a successful LOOKUP, CREATE or MKDIR.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct diropokres {
    pub file: fhandle,
    pub attributes: fattr,
}
DeserializeStruct!(diropokres, file, attributes);
SerializeStruct!(diropokres, file, attributes);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct sattrargs {
    pub file: fhandle,
    pub attributes: sattr,
}
DeserializeStruct!(sattrargs, file, attributes);
SerializeStruct!(sattrargs, file, attributes);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct readargs {
    pub file: fhandle,
    pub offset: u32,
    pub count: u32,
    /// Unused by servers
    pub totalcount: u32,
}
DeserializeStruct!(readargs, file, offset, count, totalcount);
SerializeStruct!(readargs, file, offset, count, totalcount);

/// Body of a successful READ.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct readokres {
    pub attributes: fattr,
    pub data: Vec<u8>,
}
DeserializeStruct!(readokres, attributes, data);
SerializeStruct!(readokres, attributes, data);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct writeargs {
    pub file: fhandle,
    /// Unused by servers
    pub beginoffset: u32,
    pub offset: u32,
    /// Unused by servers
    pub totalcount: u32,
    pub data: Vec<u8>,
}
DeserializeStruct!(writeargs, file, beginoffset, offset, totalcount, data);
SerializeStruct!(writeargs, file, beginoffset, offset, totalcount, data);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct createargs {
    pub place: diropargs,
    pub attributes: sattr,
}
DeserializeStruct!(createargs, place, attributes);
SerializeStruct!(createargs, place, attributes);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct renameargs {
    pub from: diropargs,
    pub to: diropargs,
}
DeserializeStruct!(renameargs, from, to);
SerializeStruct!(renameargs, from, to);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct linkargs {
    pub from: fhandle,
    pub to: diropargs,
}
DeserializeStruct!(linkargs, from, to);
SerializeStruct!(linkargs, from, to);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct symlinkargs {
    pub from: diropargs,
    pub to: path,
    pub attributes: sattr,
}
DeserializeStruct!(symlinkargs, from, to, attributes);
SerializeStruct!(symlinkargs, from, to, attributes);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct readdirargs {
    pub dir: fhandle,
    pub cookie: nfscookie,
    /// Upper bound on the reply size in bytes
    pub count: u32,
}
DeserializeStruct!(readdirargs, dir, cookie, count);
SerializeStruct!(readdirargs, dir, cookie, count);

/// One directory entry as it appears in the READDIR list.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct entry {
    pub fileid: u32,
    pub name: filename,
    pub cookie: nfscookie,
}
DeserializeStruct!(entry, fileid, name, cookie);
SerializeStruct!(entry, fileid, name, cookie);

/// Body of a successful READDIR.
///
/// On the wire the entries are a linked list: each is preceded by a TRUE
/// "value follows" word and the list is closed by FALSE, then `eof`.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct readdirokres {
    pub entries: Vec<entry>,
    pub eof: bool,
}

impl Serialize for readdirokres {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for entry in &self.entries {
            true.serialize(dest)?;
            entry.serialize(dest)?;
        }
        false.serialize(dest)?;
        self.eof.serialize(dest)
    }
}

impl Deserialize for readdirokres {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.entries.clear();
        while deserialize::<bool>(src)? {
            self.entries.push(deserialize(src)?);
        }
        self.eof = deserialize(src)?;
        Ok(())
    }
}

/// Body of a successful STATFS.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct statfsokres {
    /// Optimum transfer size
    pub tsize: u32,
    pub bsize: u32,
    pub blocks: u32,
    pub bfree: u32,
    pub bavail: u32,
}
DeserializeStruct!(statfsokres, tsize, bsize, blocks, bfree, bavail);
SerializeStruct!(statfsokres, tsize, bsize, blocks, bfree, bavail);

/// WebNFS security negotiation (RFC 2755).
///
/// A LOOKUP from the public handle whose name starts with [`SEC_NEGOTIATE`]
/// and a one byte, 1-based index asks for the security flavors that protect
/// the path in the rest of the name. The server answers with an ordinary
/// diropres whose handle is overloaded:
///
/// ```text
/// octet 0      length of the flavor array in octets
/// octet 1      non-zero when more flavors follow
/// octets 2-3   unused
/// octets 4-31  up to seven big-endian flavor numbers
/// ```
pub mod webnfs {
    use super::{fhandle, FHSIZE};

    /// Marker byte of a security negotiation name.
    pub const SEC_NEGOTIATE: u8 = 0x81;
    /// Flavors that fit into one overloaded handle.
    pub const FLAVORS_PER_REPLY: usize = (FHSIZE - 4) / 4;

    /// Builds the LOOKUP name asking for flavors starting at `index`.
    pub fn negotiation_name(index: u8, path: &[u8]) -> Vec<u8> {
        let mut name = Vec::with_capacity(path.len() + 2);
        name.push(SEC_NEGOTIATE);
        name.push(index);
        name.extend_from_slice(path);
        name
    }

    /// Splits an overloaded handle into its flavors and continuation flag.
    pub fn parse_flavors(handle: &fhandle) -> (Vec<u32>, bool) {
        let octets = (handle.0[0] as usize).min(FLAVORS_PER_REPLY * 4);
        let more = handle.0[1] != 0;
        let flavors = handle.0[4..4 + octets]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        (flavors, more)
    }

    /// Packs flavors into an overloaded handle, as a server would.
    pub fn pack_flavors(flavors: &[u32], more: bool) -> fhandle {
        let mut handle = fhandle::default();
        let flavors = &flavors[..flavors.len().min(FLAVORS_PER_REPLY)];
        handle.0[0] = (flavors.len() * 4) as u8;
        handle.0[1] = u8::from(more);
        for (i, flavor) in flavors.iter().enumerate() {
            handle.0[4 + i * 4..8 + i * 4].copy_from_slice(&flavor.to_be_bytes());
        }
        handle
    }

}
