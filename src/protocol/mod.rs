//! Protocol module implements the client side of the NFS version 2 protocol suite.
//!
//! This module contains three main components:
//!
//! - `xdr`: External Data Representation (XDR) for serialization and deserialization
//!   of the RPC, NFS, MOUNT, portmapper and pcnfsd data structures (RFC 4506).
//!
//! - `rpc`: the record-marked TCP transport, one multiplexed connection per server
//!   and port, and the call layer with timeouts and retransmission (RFC 5531).
//!
//! - `nfs`: the NFS version 2 procedures (RFC 1094) with WebNFS security
//!   negotiation, plus the MOUNT and portmapper calls needed to reach a server.

pub mod nfs;
pub mod rpc;
pub mod xdr;
