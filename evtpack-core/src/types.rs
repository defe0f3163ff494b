//! Core types for packed event streams.
//!
//! This module defines the in-memory event record, the stream container and
//! the encoder configuration shared by the codec modules.

use crate::header::FileHeader;

/// A single Change Detection (CD) event.
///
/// Events represent brightness changes detected by the event camera sensor.
/// Each event contains the pixel coordinates, polarity (increase/decrease in
/// brightness), and timestamp in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    /// X coordinate of the pixel
    pub x: u16,
    /// Y coordinate of the pixel
    pub y: u16,
    /// Event polarity: 0 = OFF (decrease), 1 = ON (increase in brightness)
    pub polarity: u8,
    /// Timestamp in microseconds. Only the low 31 bits fit in a packed word.
    pub timestamp: u64,
}

impl Event {
    /// Creates a new event.
    #[inline]
    pub fn new(x: u16, y: u16, polarity: u8, timestamp: u64) -> Self {
        Self {
            x,
            y,
            polarity,
            timestamp,
        }
    }
}

/// Sensor geometry carried in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorMetadata {
    /// Sensor width in pixels
    pub width: u32,
    /// Sensor height in pixels
    pub height: u32,
}

impl SensorMetadata {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the image size as `(height, width)`.
    pub fn image_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }
}

/// An ordered sequence of events together with the sensor geometry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventStream {
    /// Events in producer order (non-decreasing timestamps)
    pub events: Vec<Event>,
    /// Sensor geometry
    pub metadata: SensorMetadata,
}

impl EventStream {
    pub fn new(events: Vec<Event>, metadata: SensorMetadata) -> Self {
        Self { events, metadata }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Largest timestamp in the stream, if any.
    pub fn max_timestamp(&self) -> Option<u64> {
        self.events.iter().map(|e| e.timestamp).max()
    }
}

/// Inclusive timestamp range selected for encoding.
///
/// An `end` of zero means "unspecified": the encoder then uses
/// `max(t) + 1` so that every event at or after `start` is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    /// First timestamp kept, and the offset subtracted to compute the duration
    pub start: u64,
    /// Last timestamp kept, or 0 for "up to the end of the stream"
    pub end: u64,
}

impl TimeWindow {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Window that keeps every event.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == 0
    }

    /// Resolves the upper bound against the stream's largest timestamp.
    pub fn resolve_end(&self, max_timestamp: Option<u64>) -> u64 {
        if self.is_unbounded() {
            max_timestamp.map_or(0, |t| t.saturating_add(1))
        } else {
            self.end
        }
    }
}

/// How the encoder treats fields that do not fit their bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Fail the whole encode with `CodecError::FieldOverflow`
    #[default]
    Reject,
    /// Mask each field to its width and log a warning
    Mask,
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeOptions {
    pub window: TimeWindow,
    pub overflow: OverflowPolicy,
}

impl EncodeOptions {
    pub fn new(window: TimeWindow, overflow: OverflowPolicy) -> Self {
        Self { window, overflow }
    }
}

/// Result of decoding a packed event file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    /// Decoded events and sensor geometry
    pub stream: EventStream,
    /// The parsed file header
    pub header: FileHeader,
}

impl DecodeResult {
    /// The header's timestamp slot (reserved1).
    pub fn time_stamp(&self) -> u64 {
        self.header.time_stamp
    }

    /// Returns the image size as `(height, width)`.
    pub fn image_size(&self) -> (u32, u32) {
        self.stream.metadata.image_size()
    }
}
