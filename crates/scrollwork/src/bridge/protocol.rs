/// Frame buffer layout shared with the page shell.
/// Must stay in sync with TypeScript `protocol.ts`.
///
/// Layout (all values in f32 / 4 bytes):
/// ```text
/// [Header: 12 floats]
/// [Property writes: max_writes × 4 floats]  target, property, value, pad
/// [Events: max_events × 4 floats]           kind, a, b, c
/// ```
///
/// Capacities are written into the header on every frame.
/// TypeScript reads them from the header to compute offsets dynamically.

use std::collections::HashSet;

use crate::api::engine::MotionConfig;
use crate::api::types::{MotionEvent, PropertyWrite};

/// Number of floats in the header section.
pub const HEADER_FLOATS: usize = 12;

/// Header field indices.
pub const HEADER_LOCK: usize = 0;
pub const HEADER_FRAME_COUNTER: usize = 1;
pub const HEADER_PROTOCOL_VERSION: usize = 2;
pub const HEADER_MAX_WRITES: usize = 3;
pub const HEADER_WRITE_COUNT: usize = 4;
pub const HEADER_MAX_EVENTS: usize = 5;
pub const HEADER_EVENT_COUNT: usize = 6;
pub const HEADER_SCROLL_OFFSET: usize = 7;
pub const HEADER_SCROLL_VELOCITY: usize = 8;
pub const HEADER_ACTIVE_SECTION: usize = 9;
pub const HEADER_CAPTURES_NATIVE: usize = 10;
pub const HEADER_DROPPED: usize = 11;

/// Protocol version written into the header.
pub const PROTOCOL_VERSION: f32 = 1.0;

/// Per-frame values written into the header alongside the counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameHeader {
    pub frame: u64,
    pub scroll_offset: f32,
    pub scroll_velocity: f32,
    /// Index of the active section in document order, -1 for none.
    pub active_section: f32,
    pub captures_native: bool,
}

/// Runtime-computed buffer layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolLayout {
    /// Maximum property writes per frame.
    pub max_writes: usize,
    /// Maximum engine events per frame.
    pub max_events: usize,

    /// Size of the write section in floats.
    pub write_data_floats: usize,
    /// Size of the event section in floats.
    pub event_data_floats: usize,

    /// Offset (in floats) where write data begins.
    pub write_data_offset: usize,
    /// Offset (in floats) where event data begins.
    pub event_data_offset: usize,

    /// Total buffer size in floats.
    pub buffer_total_floats: usize,
    /// Total buffer size in bytes.
    pub buffer_total_bytes: usize,
}

impl ProtocolLayout {
    /// Compute layout from raw capacity values.
    pub fn new(max_writes: usize, max_events: usize) -> Self {
        let write_data_floats = max_writes * PropertyWrite::FLOATS;
        let event_data_floats = max_events * MotionEvent::FLOATS;

        let write_data_offset = HEADER_FLOATS;
        let event_data_offset = write_data_offset + write_data_floats;

        let buffer_total_floats = event_data_offset + event_data_floats;
        let buffer_total_bytes = buffer_total_floats * 4;

        Self {
            max_writes,
            max_events,
            write_data_floats,
            event_data_floats,
            write_data_offset,
            event_data_offset,
            buffer_total_floats,
            buffer_total_bytes,
        }
    }

    /// Compute layout from a MotionConfig.
    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.max_writes, config.max_events)
    }

    /// Pack one frame into `buffer` (at least `buffer_total_floats` long).
    /// Over capacity, writes are first coalesced to the last value per
    /// (target, property), then the oldest are dropped; excess events are
    /// dropped from the end. The number dropped goes into the header.
    /// Returns the (writes, events) counts actually packed.
    pub fn pack(
        &self,
        buffer: &mut [f32],
        header: &FrameHeader,
        writes: &[PropertyWrite],
        events: &[MotionEvent],
    ) -> (usize, usize) {
        let coalesced;
        let kept = if writes.len() > self.max_writes {
            coalesced = coalesce(writes);
            &coalesced[coalesced.len().saturating_sub(self.max_writes)..]
        } else {
            writes
        };
        let write_count = kept.len();
        let event_count = events.len().min(self.max_events);
        let dropped = (writes.len() - write_count) + (events.len() - event_count);
        if dropped > 0 {
            log::warn!("frame {}: {} records over buffer capacity", header.frame, dropped);
        }

        let write_floats: &[f32] = bytemuck::cast_slice(kept);
        buffer[self.write_data_offset..self.write_data_offset + write_floats.len()].copy_from_slice(write_floats);
        let event_floats: &[f32] = bytemuck::cast_slice(&events[..event_count]);
        buffer[self.event_data_offset..self.event_data_offset + event_floats.len()].copy_from_slice(event_floats);

        buffer[HEADER_FRAME_COUNTER] = header.frame as f32;
        buffer[HEADER_PROTOCOL_VERSION] = PROTOCOL_VERSION;
        buffer[HEADER_MAX_WRITES] = self.max_writes as f32;
        buffer[HEADER_WRITE_COUNT] = write_count as f32;
        buffer[HEADER_MAX_EVENTS] = self.max_events as f32;
        buffer[HEADER_EVENT_COUNT] = event_count as f32;
        buffer[HEADER_SCROLL_OFFSET] = header.scroll_offset;
        buffer[HEADER_SCROLL_VELOCITY] = header.scroll_velocity;
        buffer[HEADER_ACTIVE_SECTION] = header.active_section;
        buffer[HEADER_CAPTURES_NATIVE] = if header.captures_native { 1.0 } else { 0.0 };
        buffer[HEADER_DROPPED] = dropped as f32;
        (write_count, event_count)
    }
}

/// Keep only the last write to each (target, property), in write order.
fn coalesce(writes: &[PropertyWrite]) -> Vec<PropertyWrite> {
    let mut seen = HashSet::new();
    let mut kept: Vec<PropertyWrite> = writes
        .iter()
        .rev()
        .filter(|w| seen.insert((w.target.to_bits(), w.property.to_bits())))
        .copied()
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{event_kind, Property, TargetId};

    #[test]
    fn from_default_config_matches_expected_sizes() {
        let layout = ProtocolLayout::from_config(&MotionConfig::default());

        assert_eq!(layout.max_writes, 512);
        assert_eq!(layout.max_events, 64);
        assert_eq!(layout.write_data_floats, 512 * 4);
        assert_eq!(layout.event_data_floats, 64 * 4);
        assert_eq!(layout.write_data_offset, HEADER_FLOATS);
        assert_eq!(layout.event_data_offset, HEADER_FLOATS + 512 * 4);
        assert_eq!(layout.buffer_total_floats, HEADER_FLOATS + 512 * 4 + 64 * 4);
        assert_eq!(layout.buffer_total_bytes, layout.buffer_total_floats * 4);
    }

    #[test]
    fn offsets_are_contiguous() {
        let layout = ProtocolLayout::new(100, 20);

        assert_eq!(layout.write_data_offset, HEADER_FLOATS);
        assert_eq!(layout.event_data_offset, layout.write_data_offset + layout.write_data_floats);
        assert_eq!(layout.buffer_total_floats, layout.event_data_offset + layout.event_data_floats);
    }

    #[test]
    fn pack_places_records_and_header() {
        let layout = ProtocolLayout::new(2, 1);
        let mut buffer = vec![0.0; layout.buffer_total_floats];
        let writes = [
            PropertyWrite::new(TargetId(3), Property::Opacity, 0.5),
            PropertyWrite::new(TargetId(4), Property::StrokeOffset, 1200.0),
        ];
        let events = [MotionEvent::new(event_kind::CUE, 1.0, 0.0, 0.0)];
        let header = FrameHeader {
            frame: 9,
            scroll_offset: 640.0,
            active_section: 2.0,
            captures_native: true,
            ..Default::default()
        };

        assert_eq!(layout.pack(&mut buffer, &header, &writes, &events), (2, 1));
        assert_eq!(buffer[HEADER_WRITE_COUNT], 2.0);
        assert_eq!(buffer[HEADER_SCROLL_OFFSET], 640.0);
        assert_eq!(buffer[HEADER_CAPTURES_NATIVE], 1.0);

        let w = layout.write_data_offset;
        assert_eq!(&buffer[w..w + 4], &[3.0, 0.0, 0.5, 0.0]);
        assert_eq!(&buffer[w + 4..w + 8], &[4.0, 4.0, 1200.0, 0.0]);
        let e = layout.event_data_offset;
        assert_eq!(&buffer[e..e + 4], &[event_kind::CUE, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn overflow_keeps_final_value_per_property() {
        let layout = ProtocolLayout::new(2, 1);
        let mut buffer = vec![0.0; layout.buffer_total_floats];
        let writes = [
            PropertyWrite::new(TargetId(1), Property::Opacity, 0.2),
            PropertyWrite::new(TargetId(2), Property::Scale, 1.1),
            PropertyWrite::new(TargetId(1), Property::Opacity, 0.6),
            PropertyWrite::new(TargetId(1), Property::Opacity, 1.0),
        ];
        let (packed, _) = layout.pack(&mut buffer, &FrameHeader::default(), &writes, &[]);
        assert_eq!(packed, 2);
        assert_eq!(buffer[HEADER_DROPPED], 2.0);

        let w = layout.write_data_offset;
        assert_eq!(&buffer[w..w + 4], &[2.0, 3.0, 1.1, 0.0]);
        assert_eq!(&buffer[w + 4..w + 8], &[1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn overflow_after_coalescing_keeps_latest() {
        let layout = ProtocolLayout::new(1, 1);
        let mut buffer = vec![0.0; layout.buffer_total_floats];
        let writes = [
            PropertyWrite::new(TargetId(1), Property::Scale, 1.2),
            PropertyWrite::new(TargetId(2), Property::Scale, 1.4),
        ];
        let events = [MotionEvent::new(event_kind::CUE, 1.0, 0.0, 0.0); 2];
        let (packed, events) = layout.pack(&mut buffer, &FrameHeader::default(), &writes, &events);
        assert_eq!((packed, events), (1, 1));
        assert_eq!(buffer[HEADER_DROPPED], 2.0);
        assert_eq!(buffer[layout.write_data_offset + 2], 1.4);
    }
}
