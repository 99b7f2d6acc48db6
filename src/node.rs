//! Remote file objects.
//!
//! An [`NfsNode`] is one file, directory or symlink on a server, found by
//! walking paths from a root node. It carries the last attributes the server
//! reported and, for directories and symlinks, the last listing and link
//! target. Those two are tied to the modification time they were read at
//! and dropped as soon as the server reports a different one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use tracing::{debug, trace, warn};
use tracing_attributes::instrument;

use crate::auth::CredentialProvider;
use crate::cache::{CacheKey, ObjectCache};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::nfs::{
    Attributes, FileHandle, FileType, FsStats, NfsTime, Protocol, Resolved, SetAttributes,
};

/// Everything the nodes of one server share.
pub(crate) struct Session {
    pub(crate) server: String,
    pub(crate) protocol: Protocol,
    /// Owned by the client; nodes in the cache point back here.
    pub(crate) cache: Weak<ObjectCache>,
    pub(crate) config: Arc<ClientConfig>,
}

impl Session {
    /// The client's cache, or a detached empty one once the client is gone.
    pub(crate) fn cache(&self) -> Arc<ObjectCache> {
        self.cache.upgrade().unwrap_or_else(|| Arc::new(ObjectCache::new(1)))
    }

    fn credentials(&self) -> &Arc<CredentialProvider> {
        self.protocol.rpc().credentials()
    }
}

#[derive(Default)]
struct NodeState {
    attributes: Option<Attributes>,
    /// False once a change through this client makes the attributes suspect
    valid: bool,
    validated_at: Option<Instant>,
    /// Parent modification time when this node was looked up
    parent_mtime: Option<NfsTime>,
    listing: Option<(NfsTime, Arc<[String]>)>,
    link_target: Option<(NfsTime, String)>,
}

impl NodeState {
    fn apply(&mut self, attributes: Attributes) {
        let mtime = attributes.mtime;
        if self.listing.as_ref().is_some_and(|(at, _)| *at != mtime) {
            trace!("dropping directory listing");
            self.listing = None;
        }
        if self.link_target.as_ref().is_some_and(|(at, _)| *at != mtime) {
            self.link_target = None;
        }
        self.attributes = Some(attributes);
        self.valid = true;
        self.validated_at = Some(Instant::now());
    }
}

pub struct NfsNode {
    session: Arc<Session>,
    path: String,
    handle: FileHandle,
    /// Root of the tree this node was reached from; `None` on the root itself
    root: Option<Arc<NfsNode>>,
    state: Mutex<NodeState>,
}

impl std::fmt::Debug for NfsNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NfsNode")
            .field("server", &self.session.server)
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

impl NfsNode {
    pub(crate) fn new_root(
        session: Arc<Session>,
        path: &str,
        handle: FileHandle,
        attributes: Option<Attributes>,
    ) -> Arc<Self> {
        let mut state = NodeState::default();
        if let Some(attributes) = attributes {
            state.apply(attributes);
        }
        Arc::new(Self {
            session,
            path: path.to_string(),
            handle,
            root: None,
            state: Mutex::new(state),
        })
    }

    fn new_child(
        self: &Arc<Self>,
        path: String,
        resolved: Resolved,
        parent_mtime: Option<NfsTime>,
    ) -> Arc<Self> {
        let mut state = NodeState { parent_mtime, ..Default::default() };
        state.apply(resolved.attributes);
        Arc::new(Self {
            session: Arc::clone(&self.session),
            path,
            handle: resolved.handle,
            root: Some(self.root()),
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn server(&self) -> &str {
        &self.session.server
    }

    /// Absolute path from the root this node was reached from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path component; empty for a root.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(slash) => &self.path[slash + 1..],
            None => &self.path,
        }
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn protocol(&self) -> &Protocol {
        &self.session.protocol
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        self.session.credentials()
    }

    pub fn root(self: &Arc<Self>) -> Arc<NfsNode> {
        match &self.root {
            Some(root) => Arc::clone(root),
            None => Arc::clone(self),
        }
    }

    /// Last known attributes, without asking the server.
    pub fn attributes(&self) -> Option<Attributes> {
        self.state().attributes.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.state().valid
    }

    pub fn file_type(&self) -> FileType {
        self.state().attributes.as_ref().map(|a| a.file_type).unwrap_or_default()
    }

    pub fn parent_mtime(&self) -> Option<NfsTime> {
        self.state().parent_mtime
    }

    /// Directory listing held from an earlier [`readdir`](Self::readdir).
    pub fn cached_listing(&self) -> Option<Arc<[String]>> {
        self.state().listing.as_ref().map(|(_, names)| Arc::clone(names))
    }

    pub fn cached_link_target(&self) -> Option<String> {
        self.state().link_target.as_ref().map(|(_, target)| target.clone())
    }

    /// Records attributes learned from any reply about this node.
    pub fn apply_attributes(&self, attributes: Attributes) {
        self.state().apply(attributes);
    }

    fn refresh(&self, attributes: Attributes, parent_mtime: Option<NfsTime>) {
        let mut state = self.state();
        state.apply(attributes);
        state.parent_mtime = parent_mtime;
    }

    /// Marks the attributes as stale; the next access refetches them.
    pub fn invalidate(&self) {
        self.state().valid = false;
    }

    fn invalidate_listing(&self) {
        let mut state = self.state();
        state.listing = None;
        state.valid = false;
    }

    fn child_path(&self, name: &str) -> String {
        let name = name.trim_matches('/');
        match name {
            "" | "." => self.path.clone(),
            ".." => match self.path.rfind('/') {
                Some(0) | None => "/".to_string(),
                Some(slash) => self.path[..slash].to_string(),
            },
            _ if self.path.ends_with('/') => format!("{}{}", self.path, name),
            _ => format!("{}/{}", self.path, name),
        }
    }

    fn key(&self, path: &str) -> CacheKey {
        CacheKey::new(&self.session.server, path)
    }

    /// Refreshes the attributes from the server.
    ///
    /// A node that already has attributes keeps them when the server cannot
    /// be reached; the failure is only logged. Without earlier attributes
    /// the error is returned.
    pub async fn getattr(&self) -> Result<Attributes> {
        match self.session.protocol.getattr(&self.handle).await {
            Ok(attributes) => {
                self.apply_attributes(attributes.clone());
                Ok(attributes)
            }
            Err(err) if err.is_transport() => match self.attributes() {
                Some(attributes) => {
                    warn!("getattr {} failed, keeping cached attributes: {}", self.path, err);
                    Ok(attributes)
                }
                None => Err(err),
            },
            Err(err) => {
                self.invalidate();
                Err(err)
            }
        }
    }

    /// Cached attributes while they are valid and younger than the
    /// configured lifetime, otherwise a fresh [`getattr`](Self::getattr).
    pub async fn fresh_attributes(&self) -> Result<Attributes> {
        {
            let state = self.state();
            if let (true, Some(attributes), Some(at)) =
                (state.valid, &state.attributes, state.validated_at)
            {
                if at.elapsed() < self.session.config.attr_cache_ttl {
                    return Ok(attributes.clone());
                }
            }
        }
        self.getattr().await
    }

    pub async fn setattr(&self, attributes: &SetAttributes) -> Result<Attributes> {
        let attributes = self.session.protocol.setattr(&self.handle, attributes).await?;
        self.apply_attributes(attributes.clone());
        Ok(attributes)
    }

    /// Resolves `name` below this directory, following a symlink at the end
    /// by one level.
    pub async fn lookup(self: &Arc<Self>, name: &str) -> Result<Arc<NfsNode>> {
        let node = self.lookup_nofollow(name).await?;
        if node.file_type() != FileType::Symlink {
            return Ok(node);
        }
        let target = node.readlink().await?;
        debug!("{} is a symlink to {}", node.path, target);
        let start = if target.starts_with('/') {
            self.root()
        } else {
            match name.trim_matches('/').rsplit_once('/') {
                Some((dir, _)) => Arc::clone(self).walk(dir).await?,
                None => Arc::clone(self),
            }
        };
        start.walk(&target).await
    }

    /// Steps through the components of `path` without following symlinks.
    async fn walk(self: Arc<Self>, path: &str) -> Result<Arc<NfsNode>> {
        let mut node = self;
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            node = node.lookup_nofollow(component).await?;
        }
        Ok(node)
    }

    /// Resolves `name` below this directory, returning a symlink itself
    /// rather than its target.
    ///
    /// A cached node is reused while this directory's modification time is
    /// the one it was looked up under. Otherwise a LOOKUP goes to the server,
    /// serialized per path so concurrent callers share one result. When a
    /// LOOKUP below the public handle is refused as too weak, the flavors for
    /// `name` are negotiated and the LOOKUP is retried once.
    ///
    /// Names with `..` components are resolved by path from the root and
    /// never go above it.
    #[instrument(skip(self), fields(dir = %self.path))]
    pub async fn lookup_nofollow(self: &Arc<Self>, name: &str) -> Result<Arc<NfsNode>> {
        let dotted = name.split('/').any(|component| component == "..");
        let single = !name.trim_matches('/').contains('/');
        if dotted && (single || self.handle.is_public()) {
            return self.lookup_from_root(name).await;
        }
        self.lookup_entry(name).await
    }

    /// Applies `name` to this node's path and walks down from the root.
    /// `..` is never sent to the server and never climbs above the root.
    async fn lookup_from_root(self: &Arc<Self>, name: &str) -> Result<Arc<NfsNode>> {
        let root = self.root();
        let below_root = self.path.strip_prefix(root.path.as_str()).unwrap_or_default();
        let mut components: Vec<&str> = below_root.split('/').filter(|c| !c.is_empty()).collect();
        for component in name.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    components.pop();
                }
                _ => components.push(component),
            }
        }
        trace!("{} from {} is {:?} below the root", name, self.path, components);

        let mut node = root;
        for component in components {
            node = node.lookup_entry(component).await?;
        }
        Ok(node)
    }

    async fn lookup_entry(self: &Arc<Self>, name: &str) -> Result<Arc<NfsNode>> {
        let path = self.child_path(name);
        if path == self.path {
            return Ok(Arc::clone(self));
        }
        let key = self.key(&path);
        let cache = self.session.cache();
        let _guard = cache.lock_path(&key).await;

        let parent_mtime = self.fresh_attributes().await.ok().map(|a| a.mtime);
        if let Some(cached) = cache.get(&key) {
            if parent_mtime.is_some() && cached.parent_mtime() == parent_mtime {
                trace!("cache hit for {}", path);
                return Ok(cached);
            }
        }

        let resolved = match self.session.protocol.lookup(&self.handle, name).await {
            Err(err) if err.is_auth_too_weak() && self.handle.is_public() => {
                self.negotiate(name).await?;
                self.session.protocol.lookup(&self.handle, name).await?
            }
            other => other?,
        };

        match cache.get(&key) {
            Some(cached) if cached.handle == resolved.handle => {
                cached.refresh(resolved.attributes, parent_mtime);
                Ok(cached)
            }
            _ => {
                let node = self.new_child(path, resolved, parent_mtime);
                cache.insert(Arc::clone(&node));
                Ok(node)
            }
        }
    }

    /// Asks the server which flavors protect `path` and adopts one.
    #[instrument(skip(self))]
    async fn negotiate(&self, path: &str) -> Result<u32> {
        let offered = self.session.protocol.negotiate_security(path).await?;
        let flavor = self.credentials().adopt_flavor(&offered);
        debug!("negotiated flavor {} from {:?}", flavor, offered);
        Ok(flavor)
    }

    /// Names in this directory, without `.` and `..`.
    ///
    /// The listing is kept until the directory's modification time changes.
    #[instrument(skip(self), fields(dir = %self.path))]
    pub async fn readdir(&self) -> Result<Arc<[String]>> {
        let mtime = self.fresh_attributes().await?.mtime;
        let cached = self.state().listing.clone().filter(|(at, _)| *at == mtime);
        if let Some((_, names)) = cached {
            return Ok(names);
        }

        let mut names = Vec::new();
        let mut cookie = 0;
        loop {
            let page = self
                .session
                .protocol
                .readdir(&self.handle, cookie, self.session.config.readdir_size)
                .await?;
            let Some(last) = page.entries.last() else {
                if page.eof {
                    break;
                }
                return Err(Error::MalformedReply(
                    "READDIR returned no entries before the end of the directory".to_string(),
                ));
            };
            cookie = last.cookie;
            names.extend(
                page.entries.into_iter().map(|e| e.name).filter(|n| n != "." && n != ".."),
            );
            if page.eof {
                break;
            }
        }
        debug!("{} entries", names.len());

        let names: Arc<[String]> = names.into();
        self.state().listing = Some((mtime, Arc::clone(&names)));
        Ok(names)
    }

    /// Target of this symlink, kept until its modification time changes.
    pub async fn readlink(&self) -> Result<String> {
        let mtime = self.fresh_attributes().await?.mtime;
        let cached = self.state().link_target.clone().filter(|(at, _)| *at == mtime);
        if let Some((_, target)) = cached {
            return Ok(target);
        }
        let target = self.session.protocol.readlink(&self.handle).await?;
        self.state().link_target = Some((mtime, target.clone()));
        Ok(target)
    }

    /// Reads up to `len` bytes at `offset`, at most one transfer's worth.
    pub async fn read(&self, offset: u64, len: u32) -> Result<Vec<u8>> {
        let count = len.min(self.session.config.transfer_size);
        let (data, attributes) = self.session.protocol.read(&self.handle, offset, count).await?;
        self.apply_attributes(attributes);
        Ok(data)
    }

    /// Writes as much of `data` as fits in one transfer and returns the
    /// number of bytes written.
    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        let len = data.len().min(self.session.config.transfer_size as usize);
        let attributes = self.session.protocol.write(&self.handle, offset, &data[..len]).await?;
        self.apply_attributes(attributes);
        Ok(len)
    }

    /// Creates a regular file with permission bits `mode`.
    pub async fn create(self: &Arc<Self>, name: &str, mode: u32) -> Result<Arc<NfsNode>> {
        let path = self.child_path(name);
        let _guard = self.session.cache().lock_path(&self.key(&path)).await;
        let resolved = self
            .session
            .protocol
            .create(&self.handle, name, &SetAttributes::for_create(mode))
            .await?;
        Ok(self.register_created(path, resolved))
    }

    pub async fn mkdir(self: &Arc<Self>, name: &str, mode: u32) -> Result<Arc<NfsNode>> {
        let path = self.child_path(name);
        let _guard = self.session.cache().lock_path(&self.key(&path)).await;
        let resolved = self
            .session
            .protocol
            .mkdir(&self.handle, name, &SetAttributes::for_create(mode))
            .await?;
        Ok(self.register_created(path, resolved))
    }

    fn register_created(self: &Arc<Self>, path: String, resolved: Resolved) -> Arc<NfsNode> {
        debug!("created {}", path);
        let node = self.new_child(path, resolved, None);
        self.session.cache().insert(Arc::clone(&node));
        self.invalidate_listing();
        node
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        self.session.protocol.remove(&self.handle, name).await?;
        self.session.cache().remove(&self.key(&self.child_path(name)));
        self.invalidate_listing();
        Ok(())
    }

    pub async fn rmdir(&self, name: &str) -> Result<()> {
        self.session.protocol.rmdir(&self.handle, name).await?;
        self.session.cache().remove_tree(&self.key(&self.child_path(name)));
        self.invalidate_listing();
        Ok(())
    }

    /// Moves `from` in this directory to `to` in `to_dir`.
    pub async fn rename(&self, from: &str, to_dir: &NfsNode, to: &str) -> Result<()> {
        self.session.protocol.rename(&self.handle, from, &to_dir.handle, to).await?;
        let cache = self.session.cache();
        cache.remove_tree(&self.key(&self.child_path(from)));
        cache.remove_tree(&to_dir.key(&to_dir.child_path(to)));
        self.invalidate_listing();
        to_dir.invalidate_listing();
        Ok(())
    }

    /// Adds `name` in this directory as a hard link to `file`.
    pub async fn link(&self, file: &NfsNode, name: &str) -> Result<()> {
        self.session.protocol.link(&file.handle, &self.handle, name).await?;
        file.invalidate();
        self.invalidate_listing();
        Ok(())
    }

    pub async fn symlink(&self, name: &str, target: &str) -> Result<()> {
        let attributes = SetAttributes::for_create(0o777);
        self.session.protocol.symlink(&self.handle, name, target, &attributes).await?;
        self.invalidate_listing();
        Ok(())
    }

    pub async fn statfs(&self) -> Result<FsStats> {
        self.session.protocol.statfs(&self.handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NfsClient;

    fn root() -> (NfsClient, Arc<NfsNode>) {
        let client = NfsClient::new(ClientConfig::default());
        let root = client.public_root("server");
        (client, root)
    }

    fn node_at(root: &Arc<NfsNode>, path: &str) -> Arc<NfsNode> {
        let node = NfsNode::new_root(Arc::clone(&root.session), path, root.handle.clone(), None);
        root.session.cache().insert(Arc::clone(&node));
        node
    }

    #[test]
    fn child_paths() {
        let (_client, root) = root();
        assert_eq!(root.child_path("a"), "/a");
        assert_eq!(root.child_path("/a/"), "/a");
        assert_eq!(root.child_path(".."), "/");

        let dir = node_at(&root, "/a/b");
        assert_eq!(dir.child_path("c"), "/a/b/c");
        assert_eq!(dir.child_path("."), "/a/b");
        assert_eq!(dir.child_path(".."), "/a");
        assert_eq!(dir.name(), "b");
    }

    #[test]
    fn remove_tree_keeps_siblings_with_common_prefix() {
        let (client, root) = root();
        for path in ["/a", "/a/b", "/a/b/c", "/ab"] {
            node_at(&root, path);
        }
        client.cache().remove_tree(&CacheKey::new("server", "/a"));

        let cached = |path| client.cache().get(&CacheKey::new("server", path)).is_some();
        assert!(!cached("/a"));
        assert!(!cached("/a/b/c"));
        assert!(cached("/ab"));
        assert!(cached("/"));
    }

    #[test]
    fn new_mtime_drops_listing_and_link_target() {
        let (_client, root) = root();
        let mut attributes = Attributes { file_type: FileType::Directory, ..Default::default() };
        attributes.mtime = NfsTime::new(10, 0);
        root.apply_attributes(attributes.clone());
        {
            let mut state = root.state();
            state.listing = Some((NfsTime::new(10, 0), Arc::from(vec!["x".to_string()])));
            state.link_target = Some((NfsTime::new(10, 0), "t".to_string()));
        }

        root.apply_attributes(attributes.clone());
        assert!(root.cached_listing().is_some());

        attributes.mtime = NfsTime::new(11, 0);
        root.apply_attributes(attributes);
        assert!(root.cached_listing().is_none());
        assert!(root.cached_link_target().is_none());
    }
}
