//! Entry point: servers, their connections and credentials, and root nodes.
//!
//! An [`NfsClient`] keeps one [`Connection`] per (server, port) and one
//! [`CredentialProvider`] per server. Every RPC client built for a server
//! shares that server's provider, so a credential fetched from pcnfsd or
//! chosen by negotiation applies to NFS, MOUNT and portmapper calls alike.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::auth::CredentialProvider;
use crate::cache::{CacheKey, ObjectCache};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::node::{NfsNode, Session};
use crate::protocol::nfs::{mount, portmap, Nfs2, Protocol};
use crate::protocol::rpc::{Connection, RpcClient};
use crate::protocol::xdr;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct NfsClient {
    config: Arc<ClientConfig>,
    cache: Arc<ObjectCache>,
    connections: Mutex<HashMap<(String, u16), Arc<Connection>>>,
    credentials: Mutex<HashMap<String, Arc<CredentialProvider>>>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl Default for NfsClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl NfsClient {
    pub fn new(config: ClientConfig) -> Self {
        let cache = Arc::new(ObjectCache::new(config.cache_capacity));
        Self {
            config: Arc::new(config),
            cache,
            connections: Mutex::new(HashMap::new()),
            credentials: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    /// The credential slot of `server`, created on first use.
    pub fn credentials(&self, server: &str) -> Arc<CredentialProvider> {
        let mut credentials = locked(&self.credentials);
        Arc::clone(
            credentials
                .entry(server.to_string())
                .or_insert_with(|| Arc::new(CredentialProvider::new(Arc::clone(&self.config)))),
        )
    }

    /// The shared connection to `server:port`, created on first use.
    pub fn connection(&self, server: &str, port: u16) -> Arc<Connection> {
        let mut connections = locked(&self.connections);
        Arc::clone(connections.entry((server.to_string(), port)).or_insert_with(|| {
            debug!("new connection to {}:{}", server, port);
            Arc::new(Connection::new(server, port, Arc::clone(&self.config)))
        }))
    }

    /// An RPC client for `server:port` carrying the server's credential.
    pub fn rpc(&self, server: &str, port: u16) -> Arc<RpcClient> {
        Arc::new(RpcClient::new(
            self.connection(server, port),
            self.credentials(server),
            Arc::clone(&self.config),
        ))
    }

    fn session(&self, server: &str) -> Arc<Session> {
        let mut sessions = locked(&self.sessions);
        if let Some(session) = sessions.get(server) {
            return Arc::clone(session);
        }
        let rpc = self.rpc(server, self.config.nfs_port);
        let session = Arc::new(Session {
            server: server.to_string(),
            protocol: Protocol::V2(Nfs2::new(rpc)),
            cache: Arc::downgrade(&self.cache),
            config: Arc::clone(&self.config),
        });
        sessions.insert(server.to_string(), Arc::clone(&session));
        session
    }

    /// Port of `program` on `server`: `fixed` if configured, otherwise the
    /// portmapper's answer.
    async fn resolve_port(
        &self,
        server: &str,
        program: u32,
        version: u32,
        fixed: Option<u16>,
    ) -> Result<u16> {
        if let Some(port) = fixed {
            return Ok(port);
        }
        let portmapper = self.rpc(server, self.config.portmap_port);
        let port = portmap::pmapproc_getport(&portmapper, program, version).await?;
        debug!("program {} version {} on {} is at port {}", program, version, server, port);
        Ok(port)
    }

    /// The WebNFS public directory of `server`.
    ///
    /// No call is made; the first operation on the node reaches the server.
    pub fn public_root(&self, server: &str) -> Arc<NfsNode> {
        let key = CacheKey::new(server, "/");
        if let Some(root) = self.cache.get(&key) {
            return root;
        }
        let session = self.session(server);
        let handle = session.protocol.public_handle();
        let root = NfsNode::new_root(session, "/", handle, None);
        self.cache.insert(Arc::clone(&root));
        root
    }

    /// Resolves `path` relative to the public directory of `server`.
    pub async fn open(&self, server: &str, path: &str) -> Result<Arc<NfsNode>> {
        let root = self.public_root(server);
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Ok(root);
        }
        root.lookup(path).await
    }

    /// Mounts `export` through mountd and returns its root node.
    pub async fn mount(&self, server: &str, export: &str) -> Result<Arc<NfsNode>> {
        if !export.starts_with('/') {
            return Err(Error::InvalidArgument(format!("export path {export:?} is not absolute")));
        }
        let port = self
            .resolve_port(server, xdr::mount::PROGRAM, xdr::mount::VERSION, self.config.mount_port)
            .await?;
        let mountd = self.rpc(server, port);
        let handle = mount::mountproc_mnt(&mountd, export).await?;
        info!("mounted {}:{}", server, export);

        let session = self.session(server);
        let attributes = session.protocol.getattr(&handle).await?;
        let root = NfsNode::new_root(session, export, handle, Some(attributes));
        self.cache.insert(Arc::clone(&root));
        Ok(root)
    }

    /// Tells mountd that `export` is no longer used and forgets its nodes.
    pub async fn unmount(&self, server: &str, export: &str) -> Result<()> {
        let port = self
            .resolve_port(server, xdr::mount::PROGRAM, xdr::mount::VERSION, self.config.mount_port)
            .await?;
        mount::mountproc_umnt(&self.rpc(server, port), export).await?;
        self.cache.remove_tree(&CacheKey::new(server, export));
        info!("unmounted {}:{}", server, export);
        Ok(())
    }

    /// Calls the NFS null procedure.
    pub async fn ping(&self, server: &str) -> Result<()> {
        self.session(server).protocol.null().await
    }

    /// Logs `username` in through the pcnfsd of `server` and makes the
    /// resulting Unix identity the server's credential.
    ///
    /// Returns false, leaving the credential as it was, when pcnfsd cannot be
    /// found or refuses the login.
    pub async fn fetch_credential(&self, server: &str, username: &str, password: &str) -> bool {
        let port = match self
            .resolve_port(
                server,
                xdr::pcnfsd::PROGRAM,
                xdr::pcnfsd::VERSION_2,
                self.config.pcnfsd_port,
            )
            .await
        {
            Ok(port) => port,
            Err(err) => {
                warn!("no pcnfsd on {}: {}", server, err);
                return false;
            }
        };
        let pcnfsd = self.rpc(server, port);
        self.credentials(server).fetch(&pcnfsd, username, password).await
    }

    /// Reverts `server` to the anonymous credential.
    pub fn reset_credential(&self, server: &str) {
        self.credentials(server).reset();
    }

    /// Closes every open connection. They reopen on the next call.
    pub async fn shutdown(&self) {
        let connections: Vec<_> = locked(&self.connections).values().cloned().collect();
        for connection in connections {
            connection.close().await;
        }
    }
}
