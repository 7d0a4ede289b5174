use std::collections::{BTreeMap, HashMap, VecDeque};

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::codec::{EventType, ProgressEvent, EOM};

/// Default maximum number of in-flight incomplete messages.
pub const DEFAULT_TABLE_CAPACITY: usize = 1000;

/// Fragments of one message that has not completed yet.
#[derive(Debug)]
struct PartialMessage {
    event_type: EventType,
    /// Fragment index to body chunk, ordered for final concatenation.
    fragments: BTreeMap<u32, Bytes>,
    /// Total data-fragment count, known once the end marker arrives.
    expected_total: Option<u32>,
}

impl PartialMessage {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            fragments: BTreeMap::new(),
            expected_total: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.expected_total == Some(self.fragments.len() as u32)
    }

    fn into_event(self, id: Uuid) -> ProgressEvent {
        let body = if self.fragments.is_empty() {
            None
        } else {
            let mut bytes = Vec::new();
            for chunk in self.fragments.values() {
                bytes.extend_from_slice(chunk);
            }
            // Chunk boundaries may fall mid-character; decoding only after
            // concatenation keeps multi-byte sequences intact.
            Some(String::from_utf8_lossy(&bytes).into_owned())
        };
        ProgressEvent {
            id,
            event_type: self.event_type,
            body,
        }
    }
}

/// Bounded, insertion-ordered table of incomplete messages.
///
/// Fragments arrive in any order and may be duplicated; a message completes
/// when its data-fragment count matches the total announced by the end
/// marker. A message that lost a fragment forever never completes, so
/// inserting past capacity evicts the oldest entry — bounded memory against
/// buggy or malicious senders, at the cost of dropping that message.
#[derive(Debug)]
pub struct ReassemblyTable {
    entries: HashMap<Uuid, PartialMessage>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl ReassemblyTable {
    /// Create a table with the default capacity of [`DEFAULT_TABLE_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TABLE_CAPACITY)
    }

    /// Create a table with an explicit maximum entry count.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record one fragment; returns the finished event if this fragment
    /// completed its message.
    ///
    /// An [`EOM`] chunk fixes the expected total (its index is the data
    /// fragment count); any other chunk is stored at its index, last write
    /// winning on duplicates.
    pub fn accept(
        &mut self,
        id: Uuid,
        event_type: EventType,
        index: u32,
        chunk: &[u8],
    ) -> Option<ProgressEvent> {
        if !self.entries.contains_key(&id) {
            self.evict_to_fit();
            self.entries.insert(id, PartialMessage::new(event_type));
            self.order.push_back(id);
        }

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.event_type = event_type;
            if chunk == EOM {
                entry.expected_total = Some(index);
            } else {
                entry.fragments.insert(index, Bytes::copy_from_slice(chunk));
            }
            if !entry.is_complete() {
                return None;
            }
        }

        let entry = self.entries.remove(&id)?;
        self.order.retain(|k| k != &id);
        Some(entry.into_event(id))
    }

    fn evict_to_fit(&mut self) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                debug!(message_id = %oldest, "evicting oldest incomplete message");
            }
        }
    }

    /// Number of incomplete messages currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no incomplete messages are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReassemblyTable {
    fn default() -> Self {
        Self::new()
    }
}
