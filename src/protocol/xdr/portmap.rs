//! Portmap protocol version 2 (RFC 1833) data structures.
//!
//! The client only asks `GETPORT` questions: MOUNT and the legacy
//! authentication service rarely sit on fixed ports, NFS itself does.

// Allow unused code; only GETPORT is issued
#![allow(dead_code)]
// Names follow the RFC
#![allow(non_camel_case_types)]

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// A program/version/protocol triple and the port it is served on.
///
/// `port` is ignored in `GETPORT` arguments.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mapping {
    /// The RPC program number
    pub prog: u32,
    /// The RPC program version number
    pub vers: u32,
    /// The transport protocol (TCP or UDP, see IPPROTO_* constants)
    pub prot: u32,
    /// The port number where the service is listening
    pub port: u32,
}
DeserializeStruct!(mapping, prog, vers, prot, port);
SerializeStruct!(mapping, prog, vers, prot, port);

/// Protocol number for TCP/IP
pub const IPPROTO_TCP: u32 = 6;
/// Protocol number for UDP/IP
pub const IPPROTO_UDP: u32 = 17;
/// Portmap RPC program number
pub const PROGRAM: u32 = 100000;
/// Portmap RPC version number
pub const VERSION: u32 = 2;
/// Well-known port of the portmapper
pub const PMAP_PORT: u16 = 111;

/// Procedure numbers for the Portmap RPC service.
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
pub enum PortmapProgram {
    /// Null procedure for service availability testing
    PMAPPROC_NULL = 0,
    /// Register a new program-to-port mapping
    PMAPPROC_SET = 1,
    /// Remove a program-to-port mapping
    PMAPPROC_UNSET = 2,
    /// Look up the port for a program
    PMAPPROC_GETPORT = 3,
    /// List all registered program-to-port mappings
    PMAPPROC_DUMP = 4,
    /// Call another registered procedure
    PMAPPROC_CALLIT = 5,
}
impl SerializeEnum for PortmapProgram {}
impl DeserializeEnum for PortmapProgram {}

impl mapping {
    /// `GETPORT` arguments for a TCP service.
    pub fn tcp(prog: u32, vers: u32) -> Self {
        Self { prog, vers, prot: IPPROTO_TCP, port: 0 }
    }
}
