//! Challenge-response computation for the Speed Editor handshake
//!
//! The keyboard and the host authenticate each other before the keyboard
//! emits any input report. The host side is a fixed obfuscation of the
//! keyboard's 64-bit challenge; the tables and mask below must match
//! bit-for-bit or the keyboard rejects the response.

const AUTH_EVEN_TBL: [u64; 8] = [
    0x3ae1206f97c10bc8,
    0x2a9ab32bebf244c6,
    0x20a6f8b8df9adf0a,
    0xaf80ece52cfc1719,
    0xec2ee2f7414fd151,
    0xb055adfd73344a15,
    0xa63d2e3059001187,
    0x751bf623f42e0dde,
];

const AUTH_ODD_TBL: [u64; 8] = [
    0x3e22b34f502e7fde,
    0x24656b981875ab1c,
    0xa17f3456df7bf8c3,
    0x6df72e1941aef698,
    0x72226f011e66ab94,
    0x3831a3c606296b42,
    0xfd7ff81881332c89,
    0x61a3f6474ff236c6,
];

const MASK: u64 = 0xa79a63f585d37bf0;

/// One byte rotation of the 64-bit word: the low byte moves to the top.
///
/// Firmware-compatible tools call this `rol8`; the direction is what the
/// keyboard expects.
#[inline]
fn rotate_byte(v: u64) -> u64 {
    v.rotate_right(8)
}

/// Compute the host response to a keyboard challenge.
///
/// Pure and total: the same challenge always yields the same response.
pub fn compute_response(challenge: u64) -> u64 {
    let n = (challenge & 7) as usize;
    let mut v = (0..n).fold(challenge, |acc, _| rotate_byte(acc));

    let k = if (v & 1) == ((0x78 >> n) & 1) {
        AUTH_EVEN_TBL[n]
    } else {
        v ^= rotate_byte(v);
        AUTH_ODD_TBL[n]
    };

    v ^ (rotate_byte(v) & MASK) ^ k
}
