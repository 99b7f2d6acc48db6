//! RPC call layer: call headers, retransmission and reply status decoding.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::connection::Connection;
use crate::auth::CredentialProvider;
use crate::config::ClientConfig;
use crate::error::{AcceptedErrorKind, Error, Result, RpcAcceptedError, RpcRejectedError};
use crate::protocol::xdr::rpc::{
    accept_body, opaque_auth, rejected_reply, reply_body, rpc_body, rpc_msg, CALL, RPC_VERSION,
};
use crate::protocol::xdr::{Serialize, XdrBuffer};

/// Issues calls over one [`Connection`] with the credential of its server.
pub struct RpcClient {
    connection: Arc<Connection>,
    credentials: Arc<CredentialProvider>,
    config: Arc<ClientConfig>,
    next_xid: AtomicU32,
}

impl RpcClient {
    pub fn new(
        connection: Arc<Connection>,
        credentials: Arc<CredentialProvider>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self { connection, credentials, config, next_xid: AtomicU32::new(rand::random()) }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.credentials
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Calls with the configured timeout and retry count.
    pub async fn call<A: Serialize + ?Sized>(
        &self,
        program: u32,
        version: u32,
        procedure: u32,
        args: &A,
    ) -> Result<XdrBuffer> {
        self.call_with(
            program,
            version,
            procedure,
            args,
            self.config.call_timeout,
            self.config.max_retries,
        )
        .await
    }

    /// Sends a call and waits for its reply.
    ///
    /// Each transmission waits up to `timeout`. Silence leads to up to
    /// `max_retries` retransmissions under the same xid, then
    /// [`Error::Timeout`]. Retransmitting a mutating procedure can apply it
    /// twice if only the reply was lost. Transport errors are not retried.
    ///
    /// On success the returned buffer is positioned at the procedure results.
    pub async fn call_with<A: Serialize + ?Sized>(
        &self,
        program: u32,
        version: u32,
        procedure: u32,
        args: &A,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<XdrBuffer> {
        let xid = self.next_xid.fetch_add(1, Ordering::Relaxed);
        let record = self.build_call(xid, program, version, procedure, args)?;

        let attempts = max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            trace!("xid {} prog {} proc {} attempt {}", xid, program, procedure, attempt);
            let outcome = tokio::time::timeout(timeout, async {
                let waiter = self.connection.send(xid, record.clone()).await?;
                waiter.wait().await.map_err(Error::Transport)
            })
            .await;

            match outcome {
                Ok(Ok(reply)) => return decode_reply(xid, reply),
                Ok(Err(err)) => return Err(err),
                Err(_) => debug!("xid {} timed out after {:?} (attempt {})", xid, timeout, attempt),
            }
        }

        warn!(
            "call to {}:{} prog {} proc {} gave up after {} attempts",
            self.connection.host(),
            self.connection.port(),
            program,
            procedure,
            attempts
        );
        Err(Error::Timeout { attempts })
    }

    fn build_call<A: Serialize + ?Sized>(
        &self,
        xid: u32,
        program: u32,
        version: u32,
        procedure: u32,
        args: &A,
    ) -> Result<Vec<u8>> {
        let mut buf = XdrBuffer::for_record();
        buf.encode_uint32(xid);
        buf.encode_uint32(CALL);
        buf.encode_uint32(RPC_VERSION);
        buf.encode_uint32(program);
        buf.encode_uint32(version);
        buf.encode_uint32(procedure);
        self.credentials.put_credential(&mut buf)?;
        buf.encode(&opaque_auth::none())?;
        buf.encode(args)?;
        Ok(buf.into_inner())
    }
}

/// Checks the reply header and leaves the buffer at the results.
fn decode_reply(xid: u32, reply: Vec<u8>) -> Result<XdrBuffer> {
    let mut reply = XdrBuffer::from_bytes(reply);
    let msg: rpc_msg = reply.decode()?;
    if msg.xid != xid {
        return Err(Error::MalformedReply(format!("reply xid {} for call {}", msg.xid, xid)));
    }

    let body = match msg.body {
        rpc_body::REPLY(body) => body,
        rpc_body::CALL(_) => {
            return Err(Error::MalformedReply("received a call instead of a reply".to_string()))
        }
    };

    match body {
        reply_body::MSG_ACCEPTED(accepted) => {
            let kind = match accepted.reply_data {
                accept_body::SUCCESS => return Ok(reply),
                accept_body::PROG_MISMATCH(info) => {
                    return Err(RpcAcceptedError {
                        kind: AcceptedErrorKind::ProgramMismatch,
                        low_version: info.low,
                        high_version: info.high,
                    }
                    .into())
                }
                accept_body::PROG_UNAVAIL => AcceptedErrorKind::ProgramUnavailable,
                accept_body::PROC_UNAVAIL => AcceptedErrorKind::ProcedureUnavailable,
                accept_body::GARBAGE_ARGS => AcceptedErrorKind::GarbageArguments,
                accept_body::SYSTEM_ERR => AcceptedErrorKind::SystemError,
            };
            Err(RpcAcceptedError::new(kind).into())
        }
        reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(info)) => {
            Err(RpcRejectedError::RpcMismatch { low: info.low, high: info.high }.into())
        }
        reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat)) => {
            Err(RpcRejectedError::AuthError(stat).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::xdr::rpc::{
        accepted_reply_message, auth_stat, auth_too_weak_reply, call_message, make_success_reply,
        mismatch_info,
    };
    use crate::protocol::xdr::RECORD_MARK_LEN;

    fn encode(msg: &rpc_msg, results: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        msg.serialize(&mut bytes).unwrap();
        bytes.extend_from_slice(results);
        bytes
    }

    #[test]
    fn call_header_matches_wire_layout() {
        let config = Arc::new(ClientConfig::default());
        let credentials = Arc::new(CredentialProvider::new(config.clone()));
        credentials.select_flavor(crate::protocol::xdr::rpc::AUTH_NONE);
        let connection = Arc::new(Connection::new("localhost", 2049, config.clone()));
        let client = RpcClient::new(connection, credentials, config);

        let record = client.build_call(7, 100003, 2, 1, &[1_u8, 1, 1, 1][..]).unwrap();
        let expected = encode(
            &call_message(7, 100003, 2, 1, opaque_auth::none(), opaque_auth::none()),
            &[0, 0, 0, 4, 1, 1, 1, 1],
        );
        assert_eq!(&record[..RECORD_MARK_LEN], &[0; RECORD_MARK_LEN]);
        assert_eq!(&record[RECORD_MARK_LEN..], expected.as_slice());
    }

    #[test]
    fn success_leaves_cursor_at_results() {
        let mut reply = decode_reply(9, encode(&make_success_reply(9), &[0, 0, 0, 5])).unwrap();
        assert_eq!(reply.decode_uint32().unwrap(), 5);
    }

    #[test]
    fn accepted_errors_are_typed() {
        let mismatch = accept_body::PROG_MISMATCH(mismatch_info { low: 1, high: 1 });
        let err = decode_reply(3, encode(&accepted_reply_message(3, mismatch), &[])).unwrap_err();
        assert!(matches!(
            err,
            Error::RpcAccepted(RpcAcceptedError {
                kind: AcceptedErrorKind::ProgramMismatch,
                low_version: 1,
                high_version: 1
            })
        ));

        let err =
            decode_reply(3, encode(&accepted_reply_message(3, accept_body::GARBAGE_ARGS), &[]))
                .unwrap_err();
        assert!(matches!(
            err,
            Error::RpcAccepted(RpcAcceptedError { kind: AcceptedErrorKind::GarbageArguments, .. })
        ));
    }

    #[test]
    fn denials_are_typed() {
        let err = decode_reply(4, encode(&auth_too_weak_reply(4), &[])).unwrap_err();
        assert!(err.is_auth_too_weak());
        assert!(matches!(
            err,
            Error::RpcRejected(RpcRejectedError::AuthError(auth_stat::AUTH_TOOWEAK))
        ));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let bytes = encode(&make_success_reply(5), &[]);
        let err = decode_reply(5, bytes[..10].to_vec()).unwrap_err();
        assert!(matches!(err, Error::MalformedReply(_)));
    }
}
