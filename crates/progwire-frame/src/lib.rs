//! Datagram fragmentation and reassembly for remote progress events.
//!
//! This is the wire layer of progwire. One logical progress event becomes a
//! sequence of datagrams, each at most [`MAX_PACKET_LEN`] bytes:
//! - A 2-byte protocol tag (`v2`) for version discrimination
//! - A 36-byte hyphenated UUID correlating all fragments of one event
//! - A 1-digit event-type ordinal
//! - A 3-digit zero-padded fragment index
//! - The body chunk, or the literal `__EOM__` end-of-message marker
//!
//! No I/O and no threading — encode produces packets, decode feeds them
//! through a [`ReassemblyTable`] that tolerates reordering and duplicates.

pub mod codec;
pub mod error;
pub mod reassembly;

pub use codec::{
    decode_packet, encode_packets, EventType, ProgressEvent, EOM, MAX_CHUNK_LEN,
    MAX_FRAGMENT_INDEX, MAX_PACKET_LEN, PREAMBLE_LEN, PROTOCOL_TAG,
};
pub use error::{FrameError, Result};
pub use reassembly::{ReassemblyTable, DEFAULT_TABLE_CAPACITY};
