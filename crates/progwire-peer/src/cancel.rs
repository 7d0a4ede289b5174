//! The cancel-notification datagram.
//!
//! Cancellation rides the same socket pair as framed progress traffic but
//! deliberately not the framed format: a plain datagram containing a fixed
//! literal token. Anyone reading that socket must run this check before
//! attempting wire-codec decode so the two framings never compete.

/// Literal token marking a cancel-notification datagram.
pub const CANCEL_TOKEN: &[u8] = b"__CANCEL__";

/// Whether a received datagram is a cancel notification.
pub fn is_cancel_datagram(payload: &[u8]) -> bool {
    payload
        .windows(CANCEL_TOKEN.len())
        .any(|window| window == CANCEL_TOKEN)
}
