//! Event stream encoder.
//!
//! Selects the events inside a [`TimeWindow`], packs them into 64-bit words
//! and prefixes them with a [`FileHeader`]. Encoding validates the whole
//! selection before a single byte is produced, so a failed encode never
//! yields a partial buffer or file.

use crate::error::CodecError;
use crate::header::{FileHeader, HEADER_LENGTH};
use crate::packing::{self, TIME_MASK, WORD_SIZE};
use crate::types::{EncodeOptions, Event, EventStream, OverflowPolicy, TimeWindow};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// An encoded file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStream {
    /// Header followed by the packed words; exactly `header.file_size` bytes
    pub bytes: Vec<u8>,
    /// Header written at the start of `bytes`
    pub header: FileHeader,
    /// Number of events packed
    pub events_written: u64,
}

/// Outcome of writing an encoded file to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    pub header: FileHeader,
    pub events_written: u64,
    pub bytes_written: u64,
}

/// Header and window bounds computed before any packing takes place.
#[derive(Debug, Clone, Copy)]
struct EncodePlan {
    header: FileHeader,
    start: u64,
    end: u64,
}

impl EncodePlan {
    #[inline]
    fn selects(&self, event: &Event) -> bool {
        event.timestamp >= self.start && event.timestamp <= self.end
    }
}

/// Encoder for packed event files.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamEncoder {
    options: EncodeOptions,
}

impl StreamEncoder {
    /// Creates an encoder with the given window and overflow policy.
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Validates the selection and computes the header.
    fn plan(&self, stream: &EventStream) -> Result<EncodePlan, CodecError> {
        let window = self.options.window;
        let start = window.start;
        let end = window.resolve_end(stream.max_timestamp());

        let mut count = 0u64;
        let mut max_time: Option<u64> = None;
        for (index, event) in stream.events.iter().enumerate() {
            if event.timestamp < start || event.timestamp > end {
                continue;
            }
            if self.options.overflow == OverflowPolicy::Reject {
                if let Some((field, value)) = packing::check_event(event) {
                    return Err(CodecError::FieldOverflow {
                        field,
                        value,
                        index: Some(index),
                    });
                }
            }
            count += 1;
            let stored = event.timestamp & TIME_MASK;
            max_time = Some(max_time.map_or(stored, |m| m.max(stored)));
        }

        let duration = max_time.map_or(0, |t| t.saturating_sub(start));
        let header = FileHeader::new(
            count,
            count * WORD_SIZE as u64,
            duration,
            stream.metadata.width,
            stream.metadata.height,
        )?;

        log::debug!(
            "selected {} of {} events in window [{}, {}], duration {} us",
            count,
            stream.events.len(),
            start,
            end,
            duration
        );

        Ok(EncodePlan { header, start, end })
    }

    /// Writes header and payload for an already validated plan.
    fn write_planned<W: Write>(
        &self,
        plan: &EncodePlan,
        stream: &EventStream,
        writer: &mut W,
    ) -> Result<(), CodecError> {
        writer.write_all(&plan.header.to_bytes())?;
        for (index, event) in stream.events.iter().enumerate() {
            if plan.selects(event) {
                let word = packing::pack_event(event, index, self.options.overflow)?;
                writer.write_u64::<LittleEndian>(word)?;
            }
        }
        Ok(())
    }

    /// Encodes `stream` into an in-memory buffer.
    pub fn encode(&self, stream: &EventStream) -> Result<EncodedStream, CodecError> {
        let plan = self.plan(stream)?;
        let mut bytes = Vec::with_capacity(plan.header.file_size as usize);
        self.write_planned(&plan, stream, &mut bytes)?;
        debug_assert_eq!(bytes.len() as u64, plan.header.file_size);

        Ok(EncodedStream {
            bytes,
            header: plan.header,
            events_written: plan.header.event_count,
        })
    }

    /// Encodes `stream` into any writer and returns the header written.
    pub fn write_to<W: Write>(
        &self,
        stream: &EventStream,
        writer: &mut W,
    ) -> Result<FileHeader, CodecError> {
        let plan = self.plan(stream)?;
        self.write_planned(&plan, stream, writer)?;
        Ok(plan.header)
    }

    /// Encodes `stream` to `path`.
    ///
    /// Packed words are streamed into a temporary file next to `path`, which
    /// is then renamed over the target. On any error the temporary file is
    /// removed and `path` is left untouched.
    pub fn write_file<P: AsRef<Path>>(
        &self,
        path: P,
        stream: &EventStream,
    ) -> Result<EncodeSummary, CodecError> {
        let path = path.as_ref();
        let plan = self.plan(stream)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(temp);
        self.write_planned(&plan, stream, &mut writer)?;
        let temp = writer.into_inner().map_err(|e| e.into_error())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        let header = plan.header;
        log::info!(
            "Wrote {} events of duration {:.6} s into {:?} ({} bytes)",
            header.event_count,
            header.duration as f64 / 1e6,
            path,
            header.file_size
        );

        Ok(EncodeSummary {
            header,
            events_written: header.event_count,
            bytes_written: header.file_size,
        })
    }
}

/// Encodes the events of `stream` inside `window` into a complete file image.
pub fn encode_stream(
    stream: &EventStream,
    window: TimeWindow,
    policy: OverflowPolicy,
) -> Result<EncodedStream, CodecError> {
    StreamEncoder::new(EncodeOptions::new(window, policy)).encode(stream)
}

/// Encodes the events of `stream` inside `window` and writes them to `path`.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    stream: &EventStream,
    window: TimeWindow,
    policy: OverflowPolicy,
) -> Result<EncodeSummary, CodecError> {
    StreamEncoder::new(EncodeOptions::new(window, policy)).write_file(path, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorMetadata;

    fn stream_with_times(times: &[u64]) -> EventStream {
        let events = times
            .iter()
            .enumerate()
            .map(|(i, &t)| Event::new(i as u16, (i * 2) as u16, (i % 2) as u8, t))
            .collect();
        EventStream::new(events, SensorMetadata::new(640, 480))
    }

    #[test]
    fn test_window_filtering() {
        let stream = stream_with_times(&[50, 150, 199, 250]);
        let encoded =
            encode_stream(&stream, TimeWindow::new(100, 200), OverflowPolicy::Reject).unwrap();

        assert_eq!(encoded.events_written, 2);
        assert_eq!(encoded.header.event_count, 2);
        assert_eq!(encoded.header.duration, 99);
        assert_eq!(encoded.bytes.len(), HEADER_LENGTH + 2 * WORD_SIZE);

        let first = u64::from_le_bytes(encoded.bytes[64..72].try_into().unwrap());
        let second = u64::from_le_bytes(encoded.bytes[72..80].try_into().unwrap());
        assert_eq!(packing::unpack_word(first), stream.events[1]);
        assert_eq!(packing::unpack_word(second), stream.events[2]);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let stream = stream_with_times(&[100, 200]);
        let encoded =
            encode_stream(&stream, TimeWindow::new(100, 200), OverflowPolicy::Reject).unwrap();
        assert_eq!(encoded.events_written, 2);
    }

    #[test]
    fn test_unspecified_window_keeps_everything() {
        let stream = stream_with_times(&[10, 20, 30]);
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        assert_eq!(encoded.events_written, 3);
        assert_eq!(encoded.header.duration, 30);

        let offset =
            encode_stream(&stream, TimeWindow::new(15, 0), OverflowPolicy::Reject).unwrap();
        assert_eq!(offset.events_written, 2);
        assert_eq!(offset.header.duration, 15);
    }

    #[test]
    fn test_empty_stream() {
        let stream = EventStream::new(Vec::new(), SensorMetadata::new(346, 260));
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        assert_eq!(encoded.bytes.len(), 64);
        assert_eq!(encoded.header.file_size, 64);
        assert_eq!(encoded.header.event_count, 0);
        assert_eq!(encoded.header.duration, 0);
    }

    #[test]
    fn test_overflow_rejected_before_output() {
        let stream = stream_with_times(&[10, 1 << 31]);
        let err = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            CodecError::FieldOverflow {
                field: "t",
                index: Some(1),
                ..
            }
        ));

        let mut sink = Vec::new();
        let encoder = StreamEncoder::new(EncodeOptions::default());
        assert!(encoder.write_to(&stream, &mut sink).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_overflow_outside_window_is_ignored() {
        let stream = stream_with_times(&[10, 1 << 31]);
        let encoded =
            encode_stream(&stream, TimeWindow::new(0, 100), OverflowPolicy::Reject).unwrap();
        assert_eq!(encoded.events_written, 1);
    }

    #[test]
    fn test_mask_policy() {
        let stream = stream_with_times(&[(1 << 31) + 7]);
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Mask).unwrap();
        let word = u64::from_le_bytes(encoded.bytes[64..72].try_into().unwrap());
        assert_eq!(packing::word_get_time(word), 7);
        assert_eq!(packing::word_get_x(word), 0);
        assert_eq!(encoded.header.duration, 7);
    }
}
