//! Portmapper client (RFC 1833, version 2).

mod get_port;

pub use get_port::pmapproc_getport;
