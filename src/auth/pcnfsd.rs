//! Unix credentials from a pcnfsd login.

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::{Credential, CredentialProvider, UnixCredential, MAX_GROUPS};
use crate::error::{AcceptedErrorKind, Error, Result, RpcAcceptedError};
use crate::protocol::rpc::RpcClient;
use crate::protocol::xdr::pcnfsd::{self, scramble};

impl CredentialProvider {
    /// Resolves `username`/`password` through the pcnfsd behind `pcnfsd` and
    /// installs the resulting Unix credential.
    ///
    /// Version 2 is tried first; a server that only speaks version 1 answers
    /// with a program mismatch and is asked again in version 1. Any other
    /// failure returns false and leaves the current credential untouched.
    pub async fn fetch(&self, pcnfsd: &RpcClient, username: &str, password: &str) -> bool {
        let fetched = match self.fetch_v2(pcnfsd, username, password).await {
            Err(Error::RpcAccepted(RpcAcceptedError {
                kind: AcceptedErrorKind::ProgramMismatch,
                ..
            })) => {
                debug!("pcnfsd does not speak version 2; falling back to version 1");
                self.fetch_v1(pcnfsd, username, password).await
            }
            other => other,
        };

        match fetched {
            Ok(Some(credential)) => {
                info!(
                    "pcnfsd login for {} as uid {} gid {}",
                    username, credential.uid, credential.gid
                );
                self.replace(Credential::Unix(credential));
                true
            }
            Ok(None) => {
                warn!("pcnfsd refused login for {}", username);
                false
            }
            Err(err) => {
                warn!("pcnfsd login for {} failed: {}", username, err);
                false
            }
        }
    }

    async fn fetch_v2(
        &self,
        pcnfsd: &RpcClient,
        username: &str,
        password: &str,
    ) -> Result<Option<UnixCredential>> {
        let args = pcnfsd::v2_auth_args {
            system: self.config.machine_name.as_bytes().to_vec(),
            id: scramble(username.as_bytes()),
            pw: scramble(password.as_bytes()),
            comment: Vec::new(),
        };
        let mut reply =
            pcnfsd.call(pcnfsd::PROGRAM, pcnfsd::VERSION_2, pcnfsd::PCNFSD2_AUTH, &args).await?;
        let res: pcnfsd::v2_auth_results = reply.decode()?;
        if res.stat != pcnfsd::AUTH_RES_OK {
            return Ok(None);
        }
        let home = String::from_utf8_lossy(&res.home).into_owned();
        Ok(Some(UnixCredential {
            uid: res.uid,
            gid: res.gid,
            gids: res.gids.iter().take(MAX_GROUPS).copied().collect::<SmallVec<_>>(),
            home: (!home.is_empty()).then_some(home),
            umask: Some(res.def_umask),
            machine_name: self.config.machine_name.clone(),
        }))
    }

    async fn fetch_v1(
        &self,
        pcnfsd: &RpcClient,
        username: &str,
        password: &str,
    ) -> Result<Option<UnixCredential>> {
        let args = pcnfsd::auth_args {
            id: scramble(username.as_bytes()),
            pw: scramble(password.as_bytes()),
        };
        let mut reply =
            pcnfsd.call(pcnfsd::PROGRAM, pcnfsd::VERSION_1, pcnfsd::PCNFSD_AUTH, &args).await?;
        let res: pcnfsd::auth_results = reply.decode()?;
        if res.stat != pcnfsd::AUTH_RES_OK {
            return Ok(None);
        }
        Ok(Some(UnixCredential {
            uid: res.uid,
            gid: res.gid,
            gids: SmallVec::new(),
            home: None,
            umask: None,
            machine_name: self.config.machine_name.clone(),
        }))
    }
}
