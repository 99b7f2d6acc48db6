//! Error taxonomy shared by every layer of the client.
//!
//! Transport failures, RPC level refusals, NFS status codes and malformed
//! replies are kept apart so callers can tell a flaky network from a protocol
//! mismatch. Security negotiation relies on [`Error::is_auth_too_weak`].

use std::fmt;
use std::io;

use num_traits::FromPrimitive;
use thiserror::Error;

use crate::protocol::xdr::nfs2::nfsstat;
use crate::protocol::xdr::rpc::auth_stat;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connection refused or reset, short read, or a socket closed under us.
    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),
    /// No matching reply arrived after every retransmission.
    #[error("RPC call timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error(transparent)]
    RpcAccepted(#[from] RpcAcceptedError),
    #[error(transparent)]
    RpcRejected(#[from] RpcRejectedError),
    #[error(transparent)]
    NfsStatus(#[from] NfsStatusError),
    /// The reply could not be decoded; client and server disagree on the protocol.
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    /// Rejected locally before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn malformed(err: impl fmt::Display) -> Self {
        Error::MalformedReply(err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout { .. })
    }

    /// True for an `AUTH_ERROR` denial carrying `AUTH_TOOWEAK`.
    pub fn is_auth_too_weak(&self) -> bool {
        matches!(
            self,
            Error::RpcRejected(RpcRejectedError::AuthError(auth_stat::AUTH_TOOWEAK))
        )
    }

    /// The NFS status carried by the error, if it is one.
    pub fn nfs_status(&self) -> Option<nfsstat> {
        match self {
            Error::NfsStatus(status) => status.status(),
            _ => None,
        }
    }
}

/// Why an accepted call still failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcceptedErrorKind {
    ProgramUnavailable,
    ProgramMismatch,
    ProcedureUnavailable,
    GarbageArguments,
    SystemError,
}

/// The server accepted the call but did not run it.
///
/// `low_version`/`high_version` are only meaningful for
/// [`AcceptedErrorKind::ProgramMismatch`] and are zero otherwise.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("RPC call accepted but failed: {kind:?} (versions {low_version}..={high_version})")]
pub struct RpcAcceptedError {
    pub kind: AcceptedErrorKind,
    pub low_version: u32,
    pub high_version: u32,
}

impl RpcAcceptedError {
    pub fn new(kind: AcceptedErrorKind) -> Self {
        Self { kind, low_version: 0, high_version: 0 }
    }
}

/// The server refused the call outright.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RpcRejectedError {
    #[error("RPC version mismatch (server supports {low}..={high})")]
    RpcMismatch { low: u32, high: u32 },
    #[error("RPC authentication error: {0:?}")]
    AuthError(auth_stat),
}

/// A non-zero status word in an otherwise well formed NFS reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("NFS error status {0}")]
pub struct NfsStatusError(pub u32);

impl NfsStatusError {
    pub fn code(&self) -> u32 {
        self.0
    }

    pub fn status(&self) -> Option<nfsstat> {
        FromPrimitive::from_u32(self.0)
    }

    /// The file handle no longer names anything on the server.
    pub fn is_stale(&self) -> bool {
        matches!(self.status(), Some(nfsstat::NFSERR_STALE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_too_weak() {
        let err = Error::RpcRejected(RpcRejectedError::AuthError(auth_stat::AUTH_TOOWEAK));
        assert!(err.is_auth_too_weak());
        assert!(!err.is_transport());

        let err = Error::RpcRejected(RpcRejectedError::AuthError(auth_stat::AUTH_BADCRED));
        assert!(!err.is_auth_too_weak());
    }

    #[test]
    fn decodes_known_status_codes() {
        let err = Error::NfsStatus(NfsStatusError(70));
        assert_eq!(err.nfs_status(), Some(nfsstat::NFSERR_STALE));
        assert!(NfsStatusError(70).is_stale());
        assert_eq!(NfsStatusError(12345).status(), None);
    }
}
