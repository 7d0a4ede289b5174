use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{FrameError, Result};
use crate::reassembly::ReassemblyTable;

/// Maximum datagram length. Wire constant; changing it breaks the protocol.
pub const MAX_PACKET_LEN: usize = 128;

/// Preamble: tag (2) + hyphenated UUID (36) + type digit (1) + index (3).
pub const PREAMBLE_LEN: usize = 42;

/// Maximum body bytes carried by a single packet.
pub const MAX_CHUNK_LEN: usize = MAX_PACKET_LEN - PREAMBLE_LEN;

/// Protocol version tag. Datagrams not starting with this are ignored.
pub const PROTOCOL_TAG: &[u8; 2] = b"v2";

/// End-of-message marker. Its fragment index is the total data-fragment
/// count, so the receiver learns the count independent of arrival order.
pub const EOM: &[u8] = b"__EOM__";

/// Highest fragment index the 3-digit zero-padded field can carry.
pub const MAX_FRAGMENT_INDEX: u32 = 999;

/// The kind of progress event a packet belongs to.
///
/// Ordinals are wire values encoded as a single decimal digit, which caps
/// this enumeration at 10 variants. The order is fixed; appending is the
/// only compatible change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    IntermediateResult = 0,
    Step = 1,
    SetExtraMessage = 2,
    SetMax = 3,
    Exception = 4,
}

impl EventType {
    /// Wire ordinal of this event type.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Map a wire ordinal back to an event type.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(EventType::IntermediateResult),
            1 => Some(EventType::Step),
            2 => Some(EventType::SetExtraMessage),
            3 => Some(EventType::SetMax),
            4 => Some(EventType::Exception),
            _ => None,
        }
    }
}

/// A fully reassembled progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Identifier correlating all fragments of this event.
    pub id: Uuid,
    /// The kind of event.
    pub event_type: EventType,
    /// Reconstructed body, `None` when the event carried no data fragments.
    pub body: Option<String>,
}

/// Encode one progress event into its ordered packet sequence.
///
/// A fresh random [`Uuid`] correlates the fragments. Data fragments carry
/// body chunks at strictly increasing indices starting at 0; one trailing
/// [`EOM`] fragment carries the data-fragment count in its index field.
/// An absent body produces just the end marker at index 0.
pub fn encode_packets(event_type: EventType, body: Option<&str>) -> Result<Vec<Bytes>> {
    let id = Uuid::new_v4();
    let mut packets = Vec::new();
    let mut index: u32 = 0;

    if let Some(body) = body {
        for chunk in body.as_bytes().chunks(MAX_CHUNK_LEN) {
            if index >= MAX_FRAGMENT_INDEX {
                return Err(too_many_fragments(body));
            }
            let mut buf = preamble(&id, event_type, index);
            buf.put_slice(chunk);
            packets.push(buf.freeze());
            index += 1;
        }
    }

    // The end marker's index doubles as the total data-fragment count.
    let mut buf = preamble(&id, event_type, index);
    buf.put_slice(EOM);
    packets.push(buf.freeze());
    Ok(packets)
}

fn too_many_fragments(body: &str) -> FrameError {
    FrameError::TooManyFragments {
        fragments: body.len().div_ceil(MAX_CHUNK_LEN) + 1,
        max: MAX_FRAGMENT_INDEX as usize,
    }
}

fn preamble(id: &Uuid, event_type: EventType, index: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(MAX_PACKET_LEN);
    buf.put_slice(PROTOCOL_TAG);
    let mut id_text = [0u8; 36];
    buf.put_slice(id.as_hyphenated().encode_lower(&mut id_text).as_bytes());
    buf.put_u8(b'0' + event_type.ordinal());
    buf.put_slice(format!("{index:03}").as_bytes());
    buf
}

/// Feed one received datagram into the reassembly table.
///
/// Returns the finished [`ProgressEvent`] if this packet completed its
/// message, `None` otherwise. Datagrams shorter than the preamble, carrying
/// an unknown protocol tag, or otherwise unparseable are silently ignored —
/// a receiver must keep working in the presence of foreign traffic.
pub fn decode_packet(packet: &[u8], table: &mut ReassemblyTable) -> Option<ProgressEvent> {
    if packet.len() < PREAMBLE_LEN {
        return None;
    }
    if &packet[..2] != PROTOCOL_TAG {
        return None;
    }

    let id = Uuid::try_parse(std::str::from_utf8(&packet[2..38]).ok()?).ok()?;
    let event_type = EventType::from_ordinal((packet[38] as char).to_digit(10)? as u8)?;
    let index_text = std::str::from_utf8(&packet[39..PREAMBLE_LEN]).ok()?;
    if !index_text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u32 = index_text.parse().ok()?;

    table.accept(id, event_type, index, &packet[PREAMBLE_LEN..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(packets: &[Bytes]) -> (Option<ProgressEvent>, ReassemblyTable) {
        let mut table = ReassemblyTable::new();
        let mut event = None;
        for packet in packets {
            if let Some(finished) = decode_packet(packet, &mut table) {
                event = Some(finished);
            }
        }
        (event, table)
    }

    #[test]
    fn multipart_round_trip_out_of_order() {
        let long_story = "this is some pretty long text that will exceed the \
                          maximum single-packet message length and will therefore require \
                          splitting into multiple packets which may arrive in any order or \
                          even not at all potentially";

        let mut packets =
            encode_packets(EventType::SetExtraMessage, Some(long_story)).expect("should encode");
        assert!(packets.len() > 2, "body should need multiple fragments");
        packets.reverse();

        let (event, table) = reassemble(&packets);
        let event = event.expect("message should complete");
        assert!(table.is_empty());
        assert_eq!(event.event_type, EventType::SetExtraMessage);
        assert_eq!(event.body.as_deref(), Some(long_story));
    }

    #[test]
    fn duplicates_are_tolerated() {
        let body = "b".repeat(MAX_CHUNK_LEN * 2);
        let packets =
            encode_packets(EventType::IntermediateResult, Some(&body)).expect("should encode");
        assert_eq!(packets.len(), 3);

        // End marker twice up front, every data fragment twice, completing
        // only on the last missing fragment.
        let replayed = [
            &packets[2], &packets[2], &packets[0], &packets[0], &packets[1],
        ];

        let mut table = ReassemblyTable::new();
        let mut completions = 0;
        for packet in replayed {
            if decode_packet(packet, &mut table).is_some() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1, "duplicates must not complete twice");
        assert!(table.is_empty());
    }

    #[test]
    fn set_max_round_trip() {
        let packets = encode_packets(EventType::SetMax, Some("100")).expect("should encode");
        assert_eq!(packets.len(), 2);

        let (event, table) = reassemble(&packets);
        let event = event.expect("message should complete");
        assert!(table.is_empty());
        assert_eq!(event.event_type, EventType::SetMax);
        assert_eq!(event.body.as_deref(), Some("100"));
    }

    #[test]
    fn bodiless_event_is_a_single_packet() {
        let packets = encode_packets(EventType::Step, None).expect("should encode");
        assert_eq!(packets.len(), 1);
        assert!(packets[0].ends_with(EOM));

        let (event, table) = reassemble(&packets);
        let event = event.expect("message should complete");
        assert!(table.is_empty());
        assert_eq!(event.event_type, EventType::Step);
        assert_eq!(event.body, None);
    }

    #[test]
    fn packets_respect_max_length() {
        let body = "x".repeat(MAX_CHUNK_LEN * 3 + 17);
        let packets = encode_packets(EventType::SetExtraMessage, Some(&body))
            .expect("should encode");
        assert_eq!(packets.len(), 5);
        for packet in &packets {
            assert!(packet.len() <= MAX_PACKET_LEN);
        }
    }

    #[test]
    fn short_datagram_is_ignored() {
        let mut table = ReassemblyTable::new();
        assert_eq!(decode_packet(b"v2tooshort", &mut table), None);
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_protocol_version_is_ignored() {
        let packets = encode_packets(EventType::Step, None).expect("should encode");
        let mut foreign = packets[0].to_vec();
        foreign[1] = b'9';

        let mut table = ReassemblyTable::new();
        assert_eq!(decode_packet(&foreign, &mut table), None);
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_event_ordinal_is_ignored() {
        let packets = encode_packets(EventType::Step, None).expect("should encode");
        let mut foreign = packets[0].to_vec();
        foreign[38] = b'7';

        let mut table = ReassemblyTable::new();
        assert_eq!(decode_packet(&foreign, &mut table), None);
        assert!(table.is_empty());
    }

    #[test]
    fn oversized_body_fails_instead_of_corrupting_the_index() {
        let body = "y".repeat(MAX_CHUNK_LEN * (MAX_FRAGMENT_INDEX as usize + 1));
        let result = encode_packets(EventType::Exception, Some(&body));
        assert!(matches!(
            result,
            Err(FrameError::TooManyFragments { .. })
        ));
    }
}
