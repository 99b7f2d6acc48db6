//! Credentials carried in every call header.
//!
//! Each server gets one [`CredentialProvider`], shared by all RPC clients that
//! talk to it. The provider holds exactly one active [`Credential`]; security
//! negotiation and pcnfsd logins replace it wholesale, never field by field.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::xdr::rpc::{auth_unix, opaque_auth, AUTH_NONE, AUTH_UNIX};
use crate::protocol::xdr::{Deserialize, Serialize, XdrBuffer};

mod pcnfsd;

/// Supplementary groups an `AUTH_UNIX` credential may carry.
pub const MAX_GROUPS: usize = 16;

/// A Unix identity, either anonymous or resolved through pcnfsd.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixCredential {
    pub uid: u32,
    pub gid: u32,
    pub gids: SmallVec<[u32; MAX_GROUPS]>,
    /// Home directory reported by pcnfsd version 2.
    pub home: Option<String>,
    /// Default umask reported by pcnfsd version 2.
    pub umask: Option<u32>,
    pub machine_name: String,
}

impl UnixCredential {
    pub fn anonymous(config: &ClientConfig) -> Self {
        Self {
            uid: config.anonymous_uid,
            gid: config.anonymous_gid,
            gids: SmallVec::new(),
            home: None,
            umask: None,
            machine_name: config.machine_name.clone(),
        }
    }

    /// True if `gid` is the primary or a supplementary group.
    pub fn in_group(&self, gid: u32) -> bool {
        self.gid == gid || self.gids.contains(&gid)
    }

    fn to_wire(&self) -> auth_unix {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        auth_unix {
            stamp,
            machinename: self.machine_name.as_bytes().to_vec(),
            uid: self.uid,
            gid: self.gid,
            gids: self.gids.iter().take(MAX_GROUPS).copied().collect(),
        }
    }
}

/// A flavor chosen by security negotiation for which this client produces no
/// credential body of its own.
///
/// The mechanism handshake (for example RPCSEC_GSS context creation) is left
/// to an external mechanism; the call header carries the flavor with an empty
/// body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NegotiatedCredential {
    pub flavor: u32,
    /// Mechanism identifier, such as a GSS-API OID.
    pub mechanism: Vec<u8>,
    /// Quality of protection
    pub qop: u32,
    /// Service type: none, integrity or privacy.
    pub service: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    None,
    Unix(UnixCredential),
    Negotiated(NegotiatedCredential),
}

impl Credential {
    pub fn flavor(&self) -> u32 {
        match self {
            Credential::None => AUTH_NONE,
            Credential::Unix(_) => AUTH_UNIX,
            Credential::Negotiated(negotiated) => negotiated.flavor,
        }
    }

    fn to_opaque_auth(&self) -> Result<opaque_auth> {
        let body = match self {
            Credential::None | Credential::Negotiated(_) => Vec::new(),
            Credential::Unix(unix) => {
                let mut body = Vec::new();
                unix.to_wire()
                    .serialize(&mut body)
                    .map_err(|e| Error::InvalidArgument(format!("cannot encode credential: {e}")))?;
                body
            }
        };
        Ok(opaque_auth { flavor: self.flavor(), body })
    }
}

/// The credential slot of one server.
pub struct CredentialProvider {
    config: Arc<ClientConfig>,
    active: RwLock<Arc<Credential>>,
    /// Last known Unix identity, restored when negotiation picks `AUTH_UNIX`.
    identity: RwLock<Arc<UnixCredential>>,
}

impl CredentialProvider {
    /// Starts out as the anonymous user under `AUTH_UNIX`.
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let anonymous = UnixCredential::anonymous(&config);
        Self {
            config,
            active: RwLock::new(Arc::new(Credential::Unix(anonymous.clone()))),
            identity: RwLock::new(Arc::new(anonymous)),
        }
    }

    pub fn current(&self) -> Arc<Credential> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The Unix identity used for `AUTH_UNIX` and for permission checks.
    pub fn identity(&self) -> Arc<UnixCredential> {
        Arc::clone(&self.identity.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn flavor(&self) -> u32 {
        self.current().flavor()
    }

    /// Installs a new active credential. A Unix credential also becomes the
    /// remembered identity.
    pub fn replace(&self, credential: Credential) {
        if let Credential::Unix(unix) = &credential {
            *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(unix.clone());
        }
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(credential);
    }

    /// Reverts to the anonymous uid and gid under `AUTH_UNIX`.
    pub fn reset(&self) {
        debug!("credential reset to anonymous");
        self.replace(Credential::Unix(UnixCredential::anonymous(&self.config)));
    }

    /// Switches the active credential to `flavor`, keeping the Unix identity.
    pub fn select_flavor(&self, flavor: u32) {
        let credential = match flavor {
            AUTH_NONE => Credential::None,
            AUTH_UNIX => Credential::Unix((*self.identity()).clone()),
            flavor => Credential::Negotiated(NegotiatedCredential { flavor, ..Default::default() }),
        };
        debug!("credential flavor set to {}", flavor);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(credential);
    }

    /// Picks a flavor from those a server offered and makes it active.
    ///
    /// See [`choose_flavor`] for the order of preference.
    pub fn adopt_flavor(&self, offered: &[u32]) -> u32 {
        let flavor = choose_flavor(offered, &self.config);
        if !offered.contains(&flavor) {
            warn!("no offered flavor in {:?} is supported; using default {}", offered, flavor);
        }
        self.select_flavor(flavor);
        flavor
    }

    /// Writes the active credential into a call header.
    pub fn put_credential(&self, buf: &mut XdrBuffer) -> Result<()> {
        buf.encode(&self.current().to_opaque_auth()?)
    }

    /// Reads a credential from a call header, as a server or relay would.
    pub fn get_credential(buf: &mut XdrBuffer) -> Result<Credential> {
        let auth: opaque_auth = buf.decode()?;
        Ok(match auth.flavor {
            AUTH_NONE => Credential::None,
            AUTH_UNIX => {
                let mut unix = auth_unix::default();
                unix.deserialize(&mut auth.body.as_slice()).map_err(Error::malformed)?;
                Credential::Unix(UnixCredential {
                    uid: unix.uid,
                    gid: unix.gid,
                    gids: unix.gids.into_iter().collect(),
                    home: None,
                    umask: None,
                    machine_name: String::from_utf8_lossy(&unix.machinename).into_owned(),
                })
            }
            flavor => Credential::Negotiated(NegotiatedCredential {
                flavor,
                mechanism: auth.body,
                ..Default::default()
            }),
        })
    }
}

/// The configured preferred flavor if offered, else the first offered flavor
/// this client supports, else the configured default.
pub fn choose_flavor(offered: &[u32], config: &ClientConfig) -> u32 {
    if let Some(preferred) = config.preferred_flavor {
        if offered.contains(&preferred) {
            return preferred;
        }
    }
    offered
        .iter()
        .copied()
        .find(|flavor| config.supported_flavors.contains(flavor))
        .unwrap_or(config.default_flavor)
}
