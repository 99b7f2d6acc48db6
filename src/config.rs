//! Client-wide tunables.
//!
//! A [`ClientConfig`] is built once by the embedding application and shared
//! (behind an `Arc`) by every connection, RPC client and node of an
//! [`NfsClient`](crate::NfsClient).

use std::time::Duration;

use crate::protocol::xdr::{nfs2, portmap, rpc};

/// The uid and gid of the anonymous user `nobody`.
pub const ANONYMOUS_ID: u32 = 65534;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Port of the NFS service; WebNFS servers always listen here.
    pub nfs_port: u16,
    pub portmap_port: u16,
    /// Fixed mountd port; `None` asks the portmapper.
    pub mount_port: Option<u16>,
    /// Fixed pcnfsd port; `None` asks the portmapper.
    pub pcnfsd_port: Option<u16>,

    /// How long a single transmission waits for its reply.
    pub call_timeout: Duration,
    /// Retransmissions after the first send before giving up.
    pub max_retries: u32,
    /// Pause between attempts to re-establish a broken connection.
    pub reconnect_delay: Duration,
    /// Close connections that carried no call for this long.
    pub idle_timeout: Option<Duration>,
    /// Payload bytes per TCP record.
    pub max_fragment_size: usize,
    /// Largest reply record accepted from a server.
    pub max_record_size: usize,

    /// Upper bound of a single READ or WRITE.
    pub transfer_size: u32,
    /// Reply size requested from READDIR.
    pub readdir_size: u32,
    /// Cached attributes are trusted for this long after validation.
    pub attr_cache_ttl: Duration,
    /// Nodes kept by the object cache.
    pub cache_capacity: usize,

    /// Flavor to pick first during security negotiation.
    pub preferred_flavor: Option<u32>,
    /// Flavors this client can generate credentials for.
    pub supported_flavors: Vec<u32>,
    /// Flavor used when negotiation offers nothing usable.
    pub default_flavor: u32,
    /// Machine name carried by `AUTH_UNIX` credentials.
    pub machine_name: String,
    pub anonymous_uid: u32,
    pub anonymous_gid: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nfs_port: nfs2::NFS_PORT,
            portmap_port: portmap::PMAP_PORT,
            mount_port: None,
            pcnfsd_port: None,
            call_timeout: Duration::from_secs(10),
            max_retries: 3,
            reconnect_delay: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(300)),
            max_fragment_size: 1460,
            max_record_size: 1 << 20,
            transfer_size: nfs2::MAXDATA,
            readdir_size: nfs2::MAXDATA,
            attr_cache_ttl: Duration::from_secs(3),
            cache_capacity: 4096,
            preferred_flavor: None,
            supported_flavors: vec![rpc::AUTH_UNIX, rpc::AUTH_NONE],
            default_flavor: rpc::AUTH_UNIX,
            machine_name: "localhost".to_string(),
            anonymous_uid: ANONYMOUS_ID,
            anonymous_gid: ANONYMOUS_ID,
        }
    }
}

impl ClientConfig {
    pub fn with_nfs_port(mut self, port: u16) -> Self {
        self.nfs_port = port;
        self
    }

    pub fn with_portmap_port(mut self, port: u16) -> Self {
        self.portmap_port = port;
        self
    }

    pub fn with_mount_port(mut self, port: u16) -> Self {
        self.mount_port = Some(port);
        self
    }

    pub fn with_pcnfsd_port(mut self, port: u16) -> Self {
        self.pcnfsd_port = Some(port);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Clamped to at least one byte per record.
    pub fn with_max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size.max(1);
        self
    }

    /// READ and WRITE never exceed the protocol limit of 8192 bytes.
    pub fn with_transfer_size(mut self, size: u32) -> Self {
        self.transfer_size = size.clamp(1, nfs2::MAXDATA);
        self
    }

    pub fn with_readdir_size(mut self, size: u32) -> Self {
        self.readdir_size = size.max(1);
        self
    }

    pub fn with_attr_cache_ttl(mut self, ttl: Duration) -> Self {
        self.attr_cache_ttl = ttl;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    pub fn with_preferred_flavor(mut self, flavor: u32) -> Self {
        self.preferred_flavor = Some(flavor);
        self
    }

    pub fn with_supported_flavors(mut self, flavors: Vec<u32>) -> Self {
        self.supported_flavors = flavors;
        self
    }

    pub fn with_default_flavor(mut self, flavor: u32) -> Self {
        self.default_flavor = flavor;
        self
    }

    pub fn with_machine_name<S: AsRef<str>>(mut self, name: S) -> Self {
        self.machine_name = name.as_ref().to_string();
        self
    }
}
