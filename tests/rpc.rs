use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod support;

use nfs_mamont_client::error::{AcceptedErrorKind, Error, RpcAcceptedError, RpcRejectedError};
use nfs_mamont_client::xdr::rpc::{self, accept_body, mismatch_info, rejected_reply};
use nfs_mamont_client::NfsClient;

use support::{MockServer, Reply};

const PROGRAM: u32 = 200_000;
const VERSION: u32 = 1;

#[tokio::test]
async fn returns_results_of_accepted_call() {
    support::init_logging();
    let server = MockServer::start(|call| Reply::Success(call.args.clone())).await;
    let client = NfsClient::new(support::config(server.port));
    let rpc = client.rpc("127.0.0.1", server.port);

    let mut reply = rpc.call(PROGRAM, VERSION, 7, &42_u32).await.expect("call");
    assert_eq!(reply.decode_uint32().unwrap(), 42);
    assert_eq!(reply.remaining(), 0);

    let calls = server.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].program, calls[0].version, calls[0].procedure), (PROGRAM, VERSION, 7));
    assert_eq!(calls[0].flavor(), rpc::AUTH_UNIX);
}

#[tokio::test]
async fn maps_accepted_failures() {
    let server = MockServer::start(|call| match call.procedure {
        1 => Reply::Accepted(accept_body::PROG_UNAVAIL),
        2 => Reply::Accepted(accept_body::PROG_MISMATCH(mismatch_info { low: 2, high: 3 })),
        3 => Reply::Accepted(accept_body::PROC_UNAVAIL),
        4 => Reply::Accepted(accept_body::GARBAGE_ARGS),
        _ => Reply::Accepted(accept_body::SYSTEM_ERR),
    })
    .await;
    let client = NfsClient::new(support::config(server.port));
    let rpc = client.rpc("127.0.0.1", server.port);

    let kinds = [
        (1, AcceptedErrorKind::ProgramUnavailable),
        (3, AcceptedErrorKind::ProcedureUnavailable),
        (4, AcceptedErrorKind::GarbageArguments),
        (5, AcceptedErrorKind::SystemError),
    ];
    for (procedure, kind) in kinds {
        let err = rpc.call(PROGRAM, VERSION, procedure, &()).await.unwrap_err();
        assert!(
            matches!(err, Error::RpcAccepted(RpcAcceptedError { kind: k, .. }) if k == kind),
            "procedure {procedure}: {err:?}"
        );
    }

    let err = rpc.call(PROGRAM, VERSION, 2, &()).await.unwrap_err();
    match err {
        Error::RpcAccepted(err) => {
            assert_eq!(err.kind, AcceptedErrorKind::ProgramMismatch);
            assert_eq!((err.low_version, err.high_version), (2, 3));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn maps_denied_calls() {
    let server = MockServer::start(|call| match call.procedure {
        1 => Reply::too_weak(),
        _ => Reply::Denied(rejected_reply::RPC_MISMATCH(mismatch_info { low: 2, high: 2 })),
    })
    .await;
    let client = NfsClient::new(support::config(server.port));
    let rpc = client.rpc("127.0.0.1", server.port);

    let err = rpc.call(PROGRAM, VERSION, 1, &()).await.unwrap_err();
    assert!(err.is_auth_too_weak(), "{err:?}");

    let err = rpc.call(PROGRAM, VERSION, 2, &()).await.unwrap_err();
    assert!(matches!(err, Error::RpcRejected(RpcRejectedError::RpcMismatch { low: 2, high: 2 })));
}

#[tokio::test]
async fn gives_up_after_every_retransmission() {
    let server = MockServer::start(|_| Reply::Silent).await;
    let client = NfsClient::new(support::config(server.port).with_max_retries(2));
    let rpc = client.rpc("127.0.0.1", server.port);

    let err = rpc.call(PROGRAM, VERSION, 1, &()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 3 }), "{err:?}");
    assert!(err.is_transport());

    let calls = server.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.xid == calls[0].xid));
}

#[tokio::test]
async fn late_answer_to_retransmission_completes_call() {
    let seen = Arc::new(AtomicUsize::new(0));
    let server = {
        let seen = seen.clone();
        MockServer::start(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::Silent
            } else {
                Reply::Success(Vec::new())
            }
        })
        .await
    };
    let client = NfsClient::new(support::config(server.port));
    let rpc = client.rpc("127.0.0.1", server.port);

    rpc.call(PROGRAM, VERSION, 1, &()).await.expect("answered retransmission");
    let calls = server.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].xid, calls[1].xid);
}

#[tokio::test]
async fn reconnects_after_server_drops_connection() {
    let seen = Arc::new(AtomicUsize::new(0));
    let server = {
        let seen = seen.clone();
        MockServer::start(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::Close
            } else {
                Reply::Success(Vec::new())
            }
        })
        .await
    };
    let client = NfsClient::new(support::config(server.port));
    let rpc = client.rpc("127.0.0.1", server.port);

    let err = rpc.call(PROGRAM, VERSION, 1, &()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");

    rpc.call(PROGRAM, VERSION, 1, &()).await.expect("call on new connection");
    assert_eq!(server.connections(), 2);
    assert!(rpc.connection().is_connected().await);
}

#[tokio::test]
async fn broken_connection_waits_for_server_to_return() {
    let first = MockServer::start(|_| Reply::Close).await;
    let port = first.port;
    let client = NfsClient::new(support::config(port).with_max_retries(5));
    let rpc = client.rpc("127.0.0.1", port);

    let err = rpc.call(PROGRAM, VERSION, 1, &()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{err:?}");
    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let calls: Vec<_> = (0..2_u32)
        .map(|i| {
            let rpc = rpc.clone();
            tokio::spawn(async move { rpc.call(PROGRAM, VERSION, 1, &i).await })
        })
        .collect();
    // Refused for several reconnect delays and across one call timeout.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(calls.iter().all(|call| !call.is_finished()));

    let second = MockServer::start_on(port, |call| Reply::Success(call.args.clone())).await;
    for (i, call) in calls.into_iter().enumerate() {
        let mut reply = call.await.unwrap().expect("call after reconnect");
        assert_eq!(reply.decode_uint32().unwrap(), i as u32);
    }
    assert_eq!(second.connections(), 1);
    assert!(rpc.connection().is_connected().await);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = NfsClient::new(support::config(port));
    let rpc = client.rpc("127.0.0.1", port);

    let err = rpc.call(PROGRAM, VERSION, 0, &()).await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
}

#[tokio::test]
async fn concurrent_calls_share_one_connection() {
    let server = MockServer::start(|call| Reply::Success(call.args.clone())).await;
    let client = Arc::new(NfsClient::new(support::config(server.port)));
    let rpc = client.rpc("127.0.0.1", server.port);

    let calls = (0..16_u32).map(|i| {
        let rpc = rpc.clone();
        async move {
            let mut reply = rpc.call(PROGRAM, VERSION, 1, &i).await.expect("call");
            assert_eq!(reply.decode_uint32().unwrap(), i);
        }
    });
    futures::future::join_all(calls).await;

    assert_eq!(server.connections(), 1);
    let mut xids: Vec<u32> = server.calls().iter().map(|c| c.xid).collect();
    xids.sort_unstable();
    xids.dedup();
    assert_eq!(xids.len(), 16);
}

#[tokio::test]
async fn idle_connection_is_closed_and_reopened() {
    let server = MockServer::start(|_| Reply::Success(Vec::new())).await;
    let config = support::config(server.port).with_idle_timeout(Some(Duration::from_millis(50)));
    let client = NfsClient::new(config);
    let rpc = client.rpc("127.0.0.1", server.port);

    rpc.call(PROGRAM, VERSION, 1, &()).await.expect("first call");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!rpc.connection().is_connected().await);

    rpc.call(PROGRAM, VERSION, 1, &()).await.expect("call after idle close");
    assert_eq!(server.connections(), 2);
}
