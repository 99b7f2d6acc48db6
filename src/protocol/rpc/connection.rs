//! Framed transport to one server and port.
//!
//! Each live socket is split between two tasks. The writer task owns the write
//! half and sends records in the order they arrive on its channel, so
//! fragments of two messages never interleave. The reader task reassembles
//! replies and hands each one to the caller waiting on its transaction id.
//!
//! A [`Connection`] outlives its sockets. When a socket breaks, every caller
//! waiting on it gets a transport error and the next send reconnects, retrying
//! every `reconnect_delay` until the server answers. A socket closed for
//! idleness, or one that was never opened, is connected with a single attempt.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::wire;
use crate::config::ClientConfig;
use crate::error::{Error, Result};

const ALIVE: u8 = 0;
const BROKEN: u8 = 1;
const IDLE: u8 = 2;

type ReplySender = oneshot::Sender<io::Result<Vec<u8>>>;

#[derive(Default)]
struct PendingTable {
    next_ticket: u64,
    by_xid: HashMap<u32, (u64, ReplySender)>,
}

/// Callers waiting for a reply on one socket, keyed by transaction id.
#[derive(Default)]
struct PendingReplies {
    table: StdMutex<PendingTable>,
}

impl PendingReplies {
    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(self: &Arc<Self>, xid: u32) -> ReplyWaiter {
        let (sender, receiver) = oneshot::channel();
        let mut table = self.table();
        table.next_ticket += 1;
        let ticket = table.next_ticket;
        if table.by_xid.insert(xid, (ticket, sender)).is_some() {
            debug!("xid {} registered twice; the earlier waiter is dropped", xid);
        }
        ReplyWaiter { xid, ticket, receiver, pending: Arc::clone(self) }
    }

    fn dispatch(&self, xid: u32, record: Vec<u8>) -> bool {
        match self.table().by_xid.remove(&xid) {
            Some((_, sender)) => {
                let _ = sender.send(Ok(record));
                true
            }
            None => false,
        }
    }

    fn unregister(&self, xid: u32, ticket: u64) {
        let mut table = self.table();
        if matches!(table.by_xid.get(&xid), Some((t, _)) if *t == ticket) {
            table.by_xid.remove(&xid);
        }
    }

    fn fail_all(&self, kind: io::ErrorKind, reason: &str) {
        let waiters = std::mem::take(&mut self.table().by_xid);
        for (_, (_, sender)) in waiters {
            let _ = sender.send(Err(io::Error::new(kind, reason.to_string())));
        }
    }

    fn is_empty(&self) -> bool {
        self.table().by_xid.is_empty()
    }
}

/// The receiving end of one sent call.
///
/// Dropping it stops waiting; the call itself is not cancelled and a late
/// reply is discarded by the reader.
pub struct ReplyWaiter {
    xid: u32,
    ticket: u64,
    receiver: oneshot::Receiver<io::Result<Vec<u8>>>,
    pending: Arc<PendingReplies>,
}

impl ReplyWaiter {
    pub fn xid(&self) -> u32 {
        self.xid
    }

    /// Waits for the reply record, xid included.
    pub async fn wait(mut self) -> io::Result<Vec<u8>> {
        match (&mut self.receiver).await {
            Ok(reply) => reply,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection closed before the reply arrived",
            )),
        }
    }
}

impl Drop for ReplyWaiter {
    fn drop(&mut self) {
        self.pending.unregister(self.xid, self.ticket);
    }
}

/// Why the writer did not put a record on the wire.
enum Refused {
    /// The socket was closed for idleness first; the record is handed back.
    Closed(Vec<u8>),
    Failed(io::Error),
}

struct Outbound {
    record: Vec<u8>,
    done: oneshot::Sender<std::result::Result<(), Refused>>,
}

#[derive(Clone)]
struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Arc<PendingReplies>,
    state: Arc<AtomicU8>,
}

/// The one connection to a (server, port) pair.
pub struct Connection {
    host: String,
    port: u16,
    config: Arc<ClientConfig>,
    link: Mutex<Option<Link>>,
}

impl Connection {
    /// Creates an unconnected transport; the socket is opened by the first send.
    pub fn new(host: impl Into<String>, port: u16, config: Arc<ClientConfig>) -> Self {
        Self { host: host.into(), port, config, link: Mutex::new(None) }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True while a socket is open and has not failed.
    pub async fn is_connected(&self) -> bool {
        let link = self.link.lock().await;
        matches!(link.as_ref(), Some(link) if link.state.load(Ordering::Acquire) == ALIVE)
    }

    /// Puts one call on the wire and returns the handle to await its reply.
    ///
    /// `record` must start with the reserved record mark slot. The waiter is
    /// registered before the record is written so a fast reply cannot be missed.
    /// A failed write is reported to this caller; the record is not replayed.
    pub async fn send(&self, xid: u32, record: Vec<u8>) -> Result<ReplyWaiter> {
        let mut record = record;
        loop {
            let link = self.acquire().await?;
            let waiter = link.pending.register(xid);
            let (done, written) = oneshot::channel();

            if let Err(mpsc::error::SendError(outbound)) =
                link.outbound.send(Outbound { record, done })
            {
                record = outbound.record;
                if link.state.load(Ordering::Acquire) == IDLE {
                    continue;
                }
                return Err(connection_lost());
            }

            return match written.await {
                Ok(Ok(())) => Ok(waiter),
                Ok(Err(Refused::Closed(returned))) => {
                    record = returned;
                    continue;
                }
                Ok(Err(Refused::Failed(err))) => Err(Error::Transport(err)),
                Err(_) => Err(connection_lost()),
            };
        }
    }

    /// Drops the current socket. The next send connects again.
    pub async fn close(&self) {
        if self.link.lock().await.take().is_some() {
            debug!("closing connection to {}:{}", self.host, self.port);
        }
    }

    async fn acquire(&self) -> Result<Link> {
        let mut slot = self.link.lock().await;
        let broken = match slot.as_ref() {
            Some(link) => match link.state.load(Ordering::Acquire) {
                ALIVE => return Ok(link.clone()),
                BROKEN => true,
                _ => false,
            },
            None => false,
        };

        // The old link stays in the slot until replaced: a reconnect cut
        // short by a call timeout resumes on the next send.
        let stream = if broken {
            self.reconnect().await
        } else {
            self.connect().await.map_err(Error::Transport)?
        };
        let link = self.spawn_link(stream);
        *slot = Some(link.clone());
        Ok(link)
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let _ = stream.set_nodelay(true);
        debug!("connected to {}:{}", self.host, self.port);
        Ok(stream)
    }

    async fn reconnect(&self) -> TcpStream {
        loop {
            match self.connect().await {
                Ok(stream) => {
                    info!("reconnected to {}:{}", self.host, self.port);
                    return stream;
                }
                Err(err) => {
                    warn!(
                        "reconnecting to {}:{} failed: {}; retrying in {:?}",
                        self.host, self.port, err, self.config.reconnect_delay
                    );
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }

    fn spawn_link(&self, stream: TcpStream) -> Link {
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingReplies::default());
        let state = Arc::new(AtomicU8::new(ALIVE));

        let reader = tokio::spawn(run_reader(
            read_half,
            Arc::clone(&pending),
            Arc::clone(&state),
            self.config.max_record_size,
        ));
        tokio::spawn(run_writer(
            write_half,
            outbound_rx,
            Arc::clone(&pending),
            Arc::clone(&state),
            reader,
            self.config.max_fragment_size,
            self.config.idle_timeout,
        ));

        Link { outbound, pending, state }
    }
}

fn connection_lost() -> Error {
    Error::Transport(io::Error::new(io::ErrorKind::ConnectionReset, "connection lost"))
}

async fn run_reader(
    mut socket: OwnedReadHalf,
    pending: Arc<PendingReplies>,
    state: Arc<AtomicU8>,
    max_record_size: usize,
) {
    loop {
        match wire::read_record(&mut socket, max_record_size).await {
            Ok(record) => {
                let xid = record.get(..4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                let Some(xid) = xid else {
                    warn!("dropping reply record of {} bytes without an xid", record.len());
                    continue;
                };
                if !pending.dispatch(xid, record) {
                    trace!("no caller waiting for xid {}; reply dropped", xid);
                }
            }
            Err(err) => {
                // Mark the link unusable before failing the waiters, so none of
                // them can retry on this socket.
                let was_alive = state
                    .compare_exchange(ALIVE, BROKEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if was_alive {
                    warn!("connection lost: {}", err);
                }
                pending.fail_all(err.kind(), "connection lost while waiting for a reply");
                return;
            }
        }
    }
}

async fn run_writer(
    mut socket: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    pending: Arc<PendingReplies>,
    state: Arc<AtomicU8>,
    reader: JoinHandle<()>,
    max_fragment: usize,
    idle_timeout: Option<Duration>,
) {
    loop {
        let next = match idle_timeout {
            Some(idle) => tokio::select! {
                message = outbound.recv() => message,
                _ = tokio::time::sleep(idle) => {
                    if !pending.is_empty() {
                        continue;
                    }
                    debug!("closing idle connection");
                    let _ =
                        state.compare_exchange(ALIVE, IDLE, Ordering::AcqRel, Ordering::Acquire);
                    outbound.close();
                    while let Some(message) = outbound.recv().await {
                        let _ = message.done.send(Err(Refused::Closed(message.record)));
                    }
                    break;
                }
            },
            None => outbound.recv().await,
        };

        let Some(mut message) = next else {
            break;
        };
        if message.done.is_closed() {
            trace!("caller gave up before its record was written; skipping");
            continue;
        }
        match wire::write_record(&mut socket, &mut message.record, max_fragment).await {
            Ok(()) => {
                let _ = message.done.send(Ok(()));
            }
            Err(err) => {
                warn!("write failed: {}", err);
                state.store(BROKEN, Ordering::Release);
                pending.fail_all(err.kind(), "connection lost while sending");
                let _ = message.done.send(Err(Refused::Failed(err)));
                outbound.close();
                while let Some(message) = outbound.recv().await {
                    let lost = io::Error::new(io::ErrorKind::ConnectionReset, "connection lost");
                    let _ = message.done.send(Err(Refused::Failed(lost)));
                }
                break;
            }
        }
    }

    reader.abort();
    pending.fail_all(io::ErrorKind::ConnectionAborted, "connection closed");
}
