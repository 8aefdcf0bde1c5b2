//! Hash primitives used by header encoding.
//!
//! Dash identifies blocks and checks proof of work with the same X11 chain
//! of eleven hash functions. Digests are returned in internal byte order
//! (the order they are written to disk and to the wire).

/// X11 digest of `data`.
pub fn x11(data: &[u8]) -> [u8; 32] {
    let digest = rs_x11_hash::get_x11_hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}
