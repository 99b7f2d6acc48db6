//! ONC RPC version 2 message structures (RFC 5531).
//!
//! The client serializes [`rpc_msg`] headers for calls and decodes them from
//! replies. Reply constructors are kept alongside so that relays and test
//! servers can answer in the same vocabulary.

// Names follow the RFC
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// RPC protocol version carried in every call.
pub const RPC_VERSION: u32 = 2;

/// `msg_type` discriminants.
pub const CALL: u32 = 0;
pub const REPLY: u32 = 1;

/// Authentication flavor numbers.
///
/// Flavors are plain numbers rather than an enum because security
/// negotiation must carry flavors this client has never heard of.
pub const AUTH_NONE: u32 = 0;
pub const AUTH_UNIX: u32 = 1;
pub const AUTH_SHORT: u32 = 2;
pub const AUTH_DES: u32 = 3;
pub const AUTH_KERB4: u32 = 4;
pub const RPCSEC_GSS: u32 = 6;

/// Why the server refused to authenticate a call.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    AUTH_OK = 0,
    /// Bad credential (seal broken)
    #[default]
    AUTH_BADCRED = 1,
    /// Client must begin a new session
    AUTH_REJECTEDCRED = 2,
    /// Bad verifier (seal broken)
    AUTH_BADVERF = 3,
    /// Verifier expired or replayed
    AUTH_REJECTEDVERF = 4,
    /// Rejected for security reasons; a stronger flavor is required
    AUTH_TOOWEAK = 5,
    /// Bogus response verifier
    AUTH_INVALIDRESP = 6,
    /// Reason unknown
    AUTH_FAILED = 7,
    /// No credentials for the user
    RPCSEC_GSS_CREDPROBLEM = 13,
    /// Problem with the security context
    RPCSEC_GSS_CTXPROBLEM = 14,
}
impl SerializeEnum for auth_stat {}
impl DeserializeEnum for auth_stat {}

/// Credentials of the `AUTH_UNIX` (a.k.a. `AUTH_SYS`) flavor.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_unix {
    /// Arbitrary id generated by the caller
    pub stamp: u32,
    /// Name of the caller's machine
    pub machinename: Vec<u8>,
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups, at most 16 on the wire
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// An authentication field: flavor number plus flavor-specific bytes.
///
/// Calls carry two (credential and verifier), replies carry one.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct opaque_auth {
    pub flavor: u32,
    /// At most 400 bytes on the wire
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

impl opaque_auth {
    /// The empty `AUTH_NONE` field.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Transaction id followed by a call or reply body.
///
/// The xid only matches replies to calls; it is not a sequence number.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    pub xid: u32,
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
pub enum rpc_body {
    CALL(call_body),
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                CALL.serialize(dest)?;
                v.serialize(dest)
            }
            rpc_body::REPLY(v) => {
                REPLY.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            CALL => *self = rpc_body::CALL(deserialize(src)?),
            REPLY => *self = rpc_body::REPLY(deserialize(src)?),
            msg_type => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid message type in rpc_body: {msg_type}"),
                ))
            }
        }

        Ok(())
    }
}

/// Call header; the procedure arguments follow it directly.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct call_body {
    /// Must be [`RPC_VERSION`]
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth,
    pub verf: opaque_auth,
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

#[allow(non_camel_case_types)]
#[derive(Clone, Debug)]
pub enum reply_body {
    MSG_ACCEPTED(accepted_reply),
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => *self = reply_body::MSG_DENIED(deserialize(src)?),
            reply_status => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid reply status in reply_body: {reply_status}"),
                ))
            }
        }

        Ok(())
    }
}

/// Lowest and highest versions the server supports.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// An accepted call: server verifier plus the accept status union.
/// On `SUCCESS` the procedure results follow.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    pub verf: opaque_auth,
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(u32)]
pub enum accept_body {
    /// Procedure results follow
    #[default]
    SUCCESS,
    /// Program not exported by the server
    PROG_UNAVAIL,
    /// Program version not supported; the supported range follows
    PROG_MISMATCH(mismatch_info),
    /// Procedure number unknown to the program
    PROC_UNAVAIL,
    /// Arguments could not be decoded
    GARBAGE_ARGS,
    /// Memory allocation failure or similar on the server
    SYSTEM_ERR,
}

impl Serialize for accept_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest),
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest),
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest),
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest),
            accept_body::SYSTEM_ERR => 5_u32.serialize(dest),
        }
    }
}

impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = accept_body::SUCCESS,
            1 => *self = accept_body::PROG_UNAVAIL,
            2 => *self = accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => *self = accept_body::PROC_UNAVAIL,
            4 => *self = accept_body::GARBAGE_ARGS,
            5 => *self = accept_body::SYSTEM_ERR,
            accept_stat => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid accept stat in accept_body: {accept_stat}"),
                ));
            }
        }

        Ok(())
    }
}

/// A denied call: either the RPC version is wrong or authentication failed.
#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum rejected_reply {
    RPC_MISMATCH(mismatch_info),
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => *self = rejected_reply::AUTH_ERROR(deserialize(src)?),
            stat => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid reject stat in rejected_reply: {stat}"),
                ))
            }
        }

        Ok(())
    }
}

/// Builds a call header for `prog`/`vers`/`proc`.
pub fn call_message(
    xid: u32,
    prog: u32,
    vers: u32,
    proc: u32,
    cred: opaque_auth,
    verf: opaque_auth,
) -> rpc_msg {
    rpc_msg {
        xid,
        body: rpc_body::CALL(call_body { rpcvers: RPC_VERSION, prog, vers, proc, cred, verf }),
    }
}

/// An accepted reply with the given status and an empty verifier.
pub fn accepted_reply_message(xid: u32, reply_data: accept_body) -> rpc_msg {
    let reply =
        reply_body::MSG_ACCEPTED(accepted_reply { verf: opaque_auth::none(), reply_data });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// A successful reply header; results are appended by the caller.
pub fn make_success_reply(xid: u32) -> rpc_msg {
    accepted_reply_message(xid, accept_body::SUCCESS)
}

/// A denied reply.
pub fn denied_reply_message(xid: u32, rejected: rejected_reply) -> rpc_msg {
    rpc_msg { xid, body: rpc_body::REPLY(reply_body::MSG_DENIED(rejected)) }
}

/// A reply refusing the caller's credential flavor as too weak.
pub fn auth_too_weak_reply(xid: u32) -> rpc_msg {
    denied_reply_message(xid, rejected_reply::AUTH_ERROR(auth_stat::AUTH_TOOWEAK))
}
