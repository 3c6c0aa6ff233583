//! Scheduled show events (pyro triggers and friends).
//!
//! Body layout (little-endian):
//! ```text
//! VERSION:u8 COUNT:u16 ENTRY*
//! ENTRY = TIME:u32 TYPE:u8 SUBTYPE:u8 PAYLOAD:4B
//! ```
//!
//! Entries are sorted by time, nondecreasing. The payload is opaque;
//! accessors reinterpret it as a little-endian u32 or f32.

use crate::codec;
use crate::container::{BlockType, ShowFile};
use crate::error::{Result, ShowError};

const ENTRY_LEN: usize = 10;

/// A single timed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Event {
    pub time_ms: u32,
    pub event_type: u8,
    pub subtype: u8,
    pub payload: [u8; 4],
}

impl Event {
    pub fn payload_u32(&self) -> u32 {
        u32::from_le_bytes(self.payload)
    }

    pub fn payload_f32(&self) -> f32 {
        f32::from_le_bytes(self.payload)
    }
}

/// An owned, growable list of events.
#[derive(Debug, Clone, Default)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an events block body.
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        let version = codec::read_u8(body, 0)?;
        if version != 0 {
            return Err(ShowError::UnsupportedVersion { version });
        }
        let count = usize::from(codec::read_u16(body, 1)?);
        let mut events = Vec::with_capacity(count);
        let mut offset = 3;
        for _ in 0..count {
            if body.len() < offset + ENTRY_LEN {
                return Err(ShowError::truncated(
                    "event entry",
                    offset,
                    ENTRY_LEN,
                    body.len() - offset,
                ));
            }
            events.push(Event {
                time_ms: codec::read_u32(body, offset)?,
                event_type: body[offset + 4],
                subtype: body[offset + 5],
                payload: [
                    body[offset + 6],
                    body[offset + 7],
                    body[offset + 8],
                    body[offset + 9],
                ],
            });
            offset += ENTRY_LEN;
        }
        Ok(Self { events })
    }

    /// Decode the first events block of a container.
    pub fn from_show_file(file: &mut ShowFile<'_>) -> Result<Self> {
        let block = file.find_first_by_type(BlockType::Events)?;
        Self::from_bytes(file.body(&block))
    }

    /// Encode back into an events block body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.events.len())
            .map_err(|_| ShowError::InvalidArgument("more than 65535 events"))?;
        let mut body = Vec::with_capacity(3 + self.events.len() * ENTRY_LEN);
        body.push(0);
        codec::write_u16(&mut body, count);
        for event in &self.events {
            codec::write_u32(&mut body, event.time_ms);
            body.push(event.event_type);
            body.push(event.subtype);
            body.extend_from_slice(&event.payload);
        }
        Ok(body)
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Establish nondecreasing time order. The sort is stable, so events
    /// sharing a timestamp keep their relative order.
    pub fn sort(&mut self) {
        self.events.sort_by_key(|e| e.time_ms);
    }

    pub fn is_sorted(&self) -> bool {
        self.events.windows(2).all(|w| w[0].time_ms <= w[1].time_ms)
    }

    /// Shift every event of `event_type` by `delta_ms` (saturating at
    /// both ends of the u32 range), then restore sorted order.
    pub fn adjust_timestamps_by_type(&mut self, event_type: u8, delta_ms: i32) {
        for event in &mut self.events {
            if event.event_type == event_type {
                event.time_ms = event.time_ms.saturating_add_signed(delta_ms);
            }
        }
        self.sort();
    }

    pub fn player(&self) -> EventPlayer<'_> {
        EventPlayer {
            list: self,
            index: 0,
        }
    }
}

impl std::ops::Index<usize> for EventList {
    type Output = Event;

    fn index(&self, index: usize) -> &Event {
        &self.events[index]
    }
}

/// A cursor over a sorted event list.
#[derive(Debug, Clone)]
pub struct EventPlayer<'a> {
    list: &'a EventList,
    index: usize,
}

impl EventPlayer<'_> {
    /// The next event, without advancing.
    pub fn peek_next(&self) -> Option<&Event> {
        self.list.get(self.index)
    }

    /// The next event, advancing past it.
    pub fn next_event(&mut self) -> Option<&Event> {
        let event = self.list.get(self.index)?;
        self.index += 1;
        Some(event)
    }

    /// The next event only if it is due at or before `t_ms`; advances
    /// past it when returned.
    pub fn next_event_not_later_than(&mut self, t_ms: u32) -> Option<&Event> {
        if self.list.get(self.index)?.time_ms <= t_ms {
            self.next_event()
        } else {
            None
        }
    }

    /// Position the cursor at the first event with `time_ms >= t_ms`.
    pub fn seek(&mut self, t_ms: u32) {
        self.index = self.list.as_slice().partition_point(|e| e.time_ms < t_ms);
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn event(time_ms: u32, event_type: u8, subtype: u8) -> Event {
        Event {
            time_ms,
            event_type,
            subtype,
            payload: [0; 4],
        }
    }

    fn sample() -> EventList {
        let mut list = EventList::new();
        list.push(event(1000, 1, 0));
        list.push(event(2000, 2, 1));
        list.push(event(2000, 1, 2));
        list.push(event(5000, 1, 3));
        list
    }

    #[test]
    fn decode_round_trip() {
        let list = sample();
        let body = list.encode().unwrap();
        let decoded = EventList::from_bytes(&body).unwrap();
        assert_eq!(decoded.as_slice(), list.as_slice());
    }

    #[test]
    fn unknown_version_rejected() {
        assert!(matches!(
            EventList::from_bytes(&[9, 0, 0]),
            Err(ShowError::UnsupportedVersion { version: 9 })
        ));
    }

    #[test]
    fn truncated_entry_rejected() {
        let mut body = sample().encode().unwrap();
        body.truncate(body.len() - 1);
        assert!(matches!(
            EventList::from_bytes(&body),
            Err(ShowError::Truncated { .. })
        ));
    }

    #[test]
    fn payload_reinterpretation() {
        let mut e = event(0, 1, 0);
        e.payload = 0x1234_5678u32.to_le_bytes();
        assert_eq!(e.payload_u32(), 0x1234_5678);
        e.payload = 1.5f32.to_le_bytes();
        assert_eq!(e.payload_f32(), 1.5);
    }

    #[test]
    fn sort_establishes_order() {
        let mut list = EventList::new();
        list.push(event(5000, 1, 0));
        list.push(event(1000, 2, 1));
        assert!(!list.is_sorted());
        list.sort();
        assert!(list.is_sorted());
        assert_eq!(list[0].time_ms, 1000);
    }

    #[test]
    fn stable_sort_keeps_same_time_order() {
        let mut list = sample();
        list.sort();
        // The two t=2000 events keep their insertion order.
        assert_eq!(list[1].subtype, 1);
        assert_eq!(list[2].subtype, 2);
    }

    #[test]
    fn adjust_timestamps_by_type() {
        let mut list = sample();
        list.adjust_timestamps_by_type(1, -1500);
        assert!(list.is_sorted());
        // Type-1 events moved, type-2 stayed; relative order within
        // type 1 is preserved.
        let type1: Vec<(u32, u8)> = list
            .as_slice()
            .iter()
            .filter(|e| e.event_type == 1)
            .map(|e| (e.time_ms, e.subtype))
            .collect();
        assert_eq!(type1, vec![(0, 0), (500, 2), (3500, 3)]);
        assert!(list.as_slice().iter().any(|e| e.time_ms == 2000 && e.event_type == 2));
    }

    #[test]
    fn adjust_saturates_at_zero() {
        let mut list = EventList::new();
        list.push(event(100, 1, 0));
        list.adjust_timestamps_by_type(1, -500);
        assert_eq!(list[0].time_ms, 0);
    }

    #[test]
    fn player_advances_monotonically() {
        let list = sample();
        let mut player = player_of(&list);
        let mut last = 0;
        while let Some(event) = player.next_event() {
            assert!(event.time_ms >= last);
            last = event.time_ms;
        }
        assert!(player.peek_next().is_none());
    }

    fn player_of(list: &EventList) -> EventPlayer<'_> {
        list.player()
    }

    #[test]
    fn peek_does_not_advance() {
        let list = sample();
        let mut player = list.player();
        assert_eq!(player.peek_next().unwrap().time_ms, 1000);
        assert_eq!(player.peek_next().unwrap().time_ms, 1000);
        assert_eq!(player.next_event().unwrap().time_ms, 1000);
        assert_eq!(player.peek_next().unwrap().time_ms, 2000);
    }

    #[test]
    fn next_event_not_later_than_gates_on_time() {
        let list = sample();
        let mut player = list.player();
        assert!(player.next_event_not_later_than(500).is_none());
        assert_eq!(player.next_event_not_later_than(1000).unwrap().time_ms, 1000);
        assert_eq!(player.next_event_not_later_than(3000).unwrap().time_ms, 2000);
    }

    #[test]
    fn seek_positions_at_first_due() {
        let list = sample();
        let mut player = list.player();
        player.seek(2000);
        assert_eq!(player.peek_next().unwrap().time_ms, 2000);
        player.seek(2001);
        assert_eq!(player.peek_next().unwrap().time_ms, 5000);
        player.seek(0);
        assert_eq!(player.peek_next().unwrap().time_ms, 1000);
        player.seek(99_999);
        assert!(player.peek_next().is_none());
        player.rewind();
        assert_eq!(player.peek_next().unwrap().time_ms, 1000);
    }
}
