//! PC-NFS authentication daemon (pcnfsd) structures, versions 1 and 2.
//!
//! pcnfsd turns a login name and password into Unix ids for clients that have
//! no local user database. Only the `AUTH` procedures are used.
//!
//! The name and password travel through [`scramble`], a fixed XOR mask that
//! any observer can undo. It exists for interoperability with deployed
//! daemons and provides no confidentiality at all.

// Keep original naming conventions of the pcnfsd interface definition
#![allow(non_camel_case_types)]

use super::*;

pub const PROGRAM: u32 = 150001;
pub const VERSION_1: u32 = 1;
pub const VERSION_2: u32 = 2;

/// `PCNFSD_AUTH` in version 1.
pub const PCNFSD_AUTH: u32 = 1;
/// `PCNFSD2_AUTH` in version 2.
pub const PCNFSD2_AUTH: u32 = 13;

/// `arstat` value of a successful authentication.
pub const AUTH_RES_OK: u32 = 0;
/// Extra groups reported by version 2.
pub const EXTRAGIDLEN: usize = 16;

/// Masks a name or password the way pcnfsd expects. The top bit of every
/// byte is dropped.
pub fn scramble(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| (b & 0x7f) ^ 0x5b).collect()
}

/// Version 1 `AUTH` arguments; both fields already scrambled.
#[derive(Clone, Debug, Default)]
pub struct auth_args {
    pub id: Vec<u8>,
    pub pw: Vec<u8>,
}
DeserializeStruct!(auth_args, id, pw);
SerializeStruct!(auth_args, id, pw);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct auth_results {
    pub stat: u32,
    pub uid: u32,
    pub gid: u32,
}
DeserializeStruct!(auth_results, stat, uid, gid);
SerializeStruct!(auth_results, stat, uid, gid);

/// Version 2 `AUTH` arguments; `id` and `pw` already scrambled.
#[derive(Clone, Debug, Default)]
pub struct v2_auth_args {
    /// Name of the calling machine
    pub system: Vec<u8>,
    pub id: Vec<u8>,
    pub pw: Vec<u8>,
    pub comment: Vec<u8>,
}
DeserializeStruct!(v2_auth_args, system, id, pw, comment);
SerializeStruct!(v2_auth_args, system, id, pw, comment);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct v2_auth_results {
    pub stat: u32,
    pub uid: u32,
    pub gid: u32,
    /// At most [`EXTRAGIDLEN`] entries
    pub gids: Vec<u32>,
    pub home: Vec<u8>,
    pub def_umask: u32,
    pub comment: Vec<u8>,
}
DeserializeStruct!(v2_auth_results, stat, uid, gid, gids, home, def_umask, comment);
SerializeStruct!(v2_auth_results, stat, uid, gid, gids, home, def_umask, comment);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_is_fixed_xor_mask() {
        assert_eq!(scramble(b"guest"), vec![0x3c, 0x2e, 0x3e, 0x28, 0x2f]);
        assert_eq!(scramble(&[0x80, 0xdb, 0x5b]), vec![0x5b, 0x00, 0x00]);
        assert!(scramble(b"").is_empty());
    }

    #[test]
    fn v2_results_decode() {
        let results = v2_auth_results {
            stat: AUTH_RES_OK,
            uid: 501,
            gid: 20,
            gids: vec![12, 61],
            home: b"/home/guest".to_vec(),
            def_umask: 0o022,
            comment: Vec::new(),
        };
        let mut bytes = Vec::new();
        results.serialize(&mut bytes).unwrap();
        let decoded: v2_auth_results = deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, results);
    }
}
