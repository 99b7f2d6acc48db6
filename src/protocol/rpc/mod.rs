//! ONC RPC version 2 over TCP (RFC 5531).
//!
//! - `wire`: the record marking standard
//! - `connection`: one socket per server and port, reconnected on failure
//! - `client`: call headers, retransmission and reply status decoding

mod client;
mod connection;
mod wire;

pub use client::RpcClient;
pub use connection::{Connection, ReplyWaiter};
pub use wire::{read_record, write_record, MAX_FRAGMENT_SIZE};
