#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use nfs_mamont_client::protocol::rpc::{read_record, write_record};
use nfs_mamont_client::xdr::nfs2::{self, fattr, fhandle, ftype, timeval};
use nfs_mamont_client::xdr::{rpc, Serialize, XdrBuffer};
use nfs_mamont_client::{ClientConfig, Credential, CredentialProvider};

pub mod fs;

/// One call as the mock server received it.
#[derive(Clone, Debug)]
pub struct Call {
    pub xid: u32,
    pub program: u32,
    pub version: u32,
    pub procedure: u32,
    pub credential: Credential,
    pub args: Vec<u8>,
}

impl Call {
    pub fn args(&self) -> XdrBuffer {
        XdrBuffer::from_bytes(self.args.clone())
    }

    pub fn flavor(&self) -> u32 {
        self.credential.flavor()
    }
}

pub enum Reply {
    /// `SUCCESS` followed by these result bytes
    Success(Vec<u8>),
    Accepted(rpc::accept_body),
    Denied(rpc::rejected_reply),
    /// Swallow the call
    Silent,
    /// Drop the connection without answering
    Close,
}

impl Reply {
    pub fn success<T: Serialize + ?Sized>(results: &T) -> Reply {
        let mut bytes = Vec::new();
        results.serialize(&mut bytes).expect("serialize results");
        Reply::Success(bytes)
    }

    /// An NFS reply: `NFS_OK` and a result body.
    pub fn nfs_ok<T: Serialize + ?Sized>(results: &T) -> Reply {
        let mut bytes = Vec::new();
        0_u32.serialize(&mut bytes).expect("serialize status");
        results.serialize(&mut bytes).expect("serialize results");
        Reply::Success(bytes)
    }

    /// An NFS reply carrying only an error status.
    pub fn nfs_err(status: nfs2::nfsstat) -> Reply {
        Reply::success(&(status as u32))
    }

    pub fn too_weak() -> Reply {
        Reply::Denied(rpc::rejected_reply::AUTH_ERROR(rpc::auth_stat::AUTH_TOOWEAK))
    }
}

type Handler = dyn Fn(&Call) -> Reply + Send + Sync;

/// An RPC server on a loopback port that answers through a closure and
/// records every call it reads.
pub struct MockServer {
    pub port: u16,
    calls: Arc<Mutex<Vec<Call>>>,
    connections: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> MockServer
    where
        F: Fn(&Call) -> Reply + Send + Sync + 'static,
    {
        Self::start_on(0, handler).await
    }

    /// Listens on `port`, or on any free port when it is 0.
    pub async fn start_on<F>(port: u16, handler: F) -> MockServer
    where
        F: Fn(&Call) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("bind mock server");
        let port = listener.local_addr().expect("local address").port();
        let handler: Arc<Handler> = Arc::new(handler);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let task = {
            let calls = calls.clone();
            let connections = connections.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let (handler, calls, closed) = (handler.clone(), calls.clone(), closed.clone());
                    tokio::spawn(async move {
                        serve(socket, handler, calls).await;
                        closed.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };
        MockServer { port, calls, connections, closed, task }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of `procedure` received so far.
    pub fn count(&self, procedure: u32) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.procedure == procedure).count()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Connections that have ended, by either side.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, handler: Arc<Handler>, calls: Arc<Mutex<Vec<Call>>>) {
    loop {
        let Ok(record) = read_record(&mut socket, 1 << 20).await else {
            return;
        };
        let Some(call) = parse_call(record) else {
            return;
        };
        calls.lock().unwrap().push(call.clone());

        let mut out = XdrBuffer::for_record();
        match handler(&call) {
            Reply::Success(results) => {
                out.encode(&rpc::make_success_reply(call.xid)).unwrap();
                out.write_all(&results).unwrap();
            }
            Reply::Accepted(status) => {
                out.encode(&rpc::accepted_reply_message(call.xid, status)).unwrap();
            }
            Reply::Denied(rejected) => {
                out.encode(&rpc::denied_reply_message(call.xid, rejected)).unwrap();
            }
            Reply::Silent => continue,
            Reply::Close => return,
        }
        let mut record = out.into_inner();
        if write_record(&mut socket, &mut record, 1460).await.is_err() {
            return;
        }
    }
}

fn parse_call(record: Vec<u8>) -> Option<Call> {
    let mut buf = XdrBuffer::from_bytes(record);
    let xid = buf.decode_uint32().ok()?;
    if buf.decode_uint32().ok()? != rpc::CALL || buf.decode_uint32().ok()? != rpc::RPC_VERSION {
        return None;
    }
    let program = buf.decode_uint32().ok()?;
    let version = buf.decode_uint32().ok()?;
    let procedure = buf.decode_uint32().ok()?;
    let credential = CredentialProvider::get_credential(&mut buf).ok()?;
    let _verifier: rpc::opaque_auth = buf.decode().ok()?;
    Some(Call { xid, program, version, procedure, credential, args: buf.unread().to_vec() })
}

/// A client configuration aimed at a mock server, with short timers.
pub fn config(port: u16) -> ClientConfig {
    ClientConfig::default()
        .with_nfs_port(port)
        .with_portmap_port(port)
        .with_mount_port(port)
        .with_pcnfsd_port(port)
        .with_call_timeout(Duration::from_millis(200))
        .with_max_retries(2)
        .with_reconnect_delay(Duration::from_millis(20))
        .with_machine_name("testhost")
}

pub fn handle(id: u8) -> fhandle {
    let mut handle = fhandle::default();
    handle.0[0] = id;
    handle.0[31] = 0xee;
    handle
}

pub fn attributes(kind: ftype, fileid: u32, mtime: u32) -> fattr {
    fattr {
        ftype: kind,
        mode: if kind == ftype::NFDIR { 0o40755 } else { 0o100644 },
        nlink: 1,
        uid: 1000,
        gid: 100,
        size: 512,
        blocksize: 4096,
        fileid,
        mtime: timeval { seconds: mtime, useconds: 0 },
        ..Default::default()
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
