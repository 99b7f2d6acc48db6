//! NFS Mamont Client - an NFS version 2 client over ONC RPC in Rust
//!
//! This library talks to NFS version 2 servers (RFC 1094) over TCP and
//! presents their files as cached, path-addressed objects.
//!
//! ## Supported Features
//!
//! - All NFS version 2 procedures except the obsolete ROOT and WRITECACHE
//! - WebNFS public file handle and security negotiation (RFC 2054, RFC 2755)
//! - MOUNT version 1 for servers without public access
//! - Portmapper lookups and pcnfsd logins for Unix credentials
//! - Record-marked TCP transport with reconnection, timeouts and retransmission
//! - Asynchronous operation with the Tokio runtime
//!
//! ## Main Components
//!
//! - `client`: [`NfsClient`], the entry point holding connections, credentials
//!   and the object cache.
//!
//! - `node`: [`NfsNode`], one remote file, directory or symlink with its cached
//!   attributes, listing and link target.
//!
//! - `cache`: [`ObjectCache`], resolved nodes keyed by server and path.
//!
//! - `auth`: [`CredentialProvider`], the credential carried by every call to a
//!   server, including the pcnfsd login.
//!
//! - `remote`: [`RemoteFile`], a file-like interface over nodes.
//!
//! - `protocol`: XDR encoding, the RPC transport and call layer, and the NFS,
//!   MOUNT and portmapper procedures.
//!
//! ## Standards Compliance
//!
//! - RFC 1094: NFS Version 2 Protocol Specification
//! - RFC 2054, RFC 2755: WebNFS Client Specification and Security Negotiation
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 4506: XDR: External Data Representation Standard
//! - RFC 1833: Binding Protocols for ONC RPC Version 2

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod node;
pub mod protocol;
pub mod remote;

pub use auth::{Credential, CredentialProvider, UnixCredential};
pub use cache::{CacheKey, ObjectCache};
pub use client::NfsClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use node::NfsNode;
pub use protocol::nfs::{Attributes, FileHandle, FileType, NfsTime, SetAttributes};
pub use protocol::xdr;
pub use remote::{Access, RemoteFile};
