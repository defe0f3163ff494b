//! Packed event decoder.
//!
//! Reads the header, seeks to `header_length` and unpacks one 64-bit word
//! per event. Files can be decoded in one go or chunk by chunk with
//! [`Evt3Reader`] to keep memory bounded.

use crate::error::CodecError;
use crate::header::FileHeader;
use crate::packing::{self, WORD_SIZE};
use crate::types::{DecodeResult, Event, EventStream, SensorMetadata};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Number of events decoded per read.
pub const READ_CHUNK_EVENTS: usize = 1 << 16;

/// Decodes the payload of an in-memory file image.
///
/// `bytes` is the whole file starting at offset 0; the payload is taken from
/// `header.header_length` onwards. The returned stream carries the header's
/// sensor geometry.
pub fn decode_stream(bytes: &[u8], header: &FileHeader) -> Result<EventStream, CodecError> {
    let metadata = SensorMetadata::new(header.width, header.height);
    let expected = header.payload_len();
    if expected == 0 {
        return Ok(EventStream::new(Vec::new(), metadata));
    }

    let offset = header.payload_offset();
    let available = (bytes.len() as u64).saturating_sub(offset);
    if available < expected {
        return Err(CodecError::TruncatedData {
            expected,
            available,
        });
    }

    let start = offset as usize;
    let end = start + expected as usize;
    let events = bytes[start..end]
        .chunks_exact(WORD_SIZE)
        .map(|chunk| packing::unpack_word(LittleEndian::read_u64(chunk)))
        .collect();
    Ok(EventStream::new(events, metadata))
}

/// Decodes header and events from an in-memory file image.
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodeResult, CodecError> {
    let header = FileHeader::from_bytes(bytes)?;
    check_file_size(&header, bytes.len() as u64);
    let stream = decode_stream(bytes, &header)?;
    Ok(DecodeResult { stream, header })
}

/// Decodes a packed event file from disk.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodeResult, CodecError> {
    let file = File::open(path.as_ref())?;
    let mut reader = Evt3Reader::new(BufReader::new(file))?;
    let header = *reader.header();
    let events = reader.read_all()?;

    log::info!(
        "Loaded {} events ({:.6} s, {}x{}) from {:?}",
        events.len(),
        header.duration as f64 / 1e6,
        header.width,
        header.height,
        path.as_ref()
    );

    Ok(DecodeResult {
        stream: EventStream::new(events, SensorMetadata::new(header.width, header.height)),
        header,
    })
}

/// Reads only the header of a packed event file.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<FileHeader, CodecError> {
    let mut file = File::open(path.as_ref())?;
    FileHeader::read_from(&mut file)
}

fn check_file_size(header: &FileHeader, actual: u64) {
    if header.file_size != actual {
        log::warn!(
            "header declares {} bytes but {} are present",
            header.file_size,
            actual
        );
    }
}

/// Streaming reader for packed event files.
///
/// Construction parses the header, checks that the declared payload is
/// present and positions the reader at the first event.
#[derive(Debug)]
pub struct Evt3Reader<R> {
    reader: R,
    header: FileHeader,
    remaining: u64,
    buffer: Vec<u8>,
}

impl<R: Read + Seek> Evt3Reader<R> {
    pub fn new(mut reader: R) -> Result<Self, CodecError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut reader)?;

        let total = reader.seek(SeekFrom::End(0))?;
        check_file_size(&header, total);

        let available = total.saturating_sub(header.payload_offset());
        let expected = header.payload_len();
        if available < expected {
            return Err(CodecError::TruncatedData {
                expected,
                available,
            });
        }

        reader.seek(SeekFrom::Start(header.payload_offset()))?;

        Ok(Self {
            reader,
            header,
            remaining: header.event_count,
            buffer: Vec::new(),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn metadata(&self) -> SensorMetadata {
        SensorMetadata::new(self.header.width, self.header.height)
    }

    /// Events not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Appends up to `max_events` decoded events to `events` and returns how
    /// many were read. Returns 0 once the payload is exhausted.
    pub fn read_chunk(
        &mut self,
        events: &mut Vec<Event>,
        max_events: usize,
    ) -> Result<usize, CodecError> {
        let count = (max_events as u64).min(self.remaining) as usize;
        if count == 0 {
            return Ok(0);
        }

        self.buffer.resize(count * WORD_SIZE, 0);
        if let Err(e) = self.reader.read_exact(&mut self.buffer) {
            return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                let read = self.header.event_count - self.remaining;
                CodecError::TruncatedData {
                    expected: self.header.payload_len(),
                    available: read * WORD_SIZE as u64,
                }
            } else {
                CodecError::Io(e)
            });
        }

        events.extend(
            self.buffer
                .chunks_exact(WORD_SIZE)
                .map(|chunk| packing::unpack_word(LittleEndian::read_u64(chunk))),
        );
        self.remaining -= count as u64;
        Ok(count)
    }

    /// Reads every remaining event.
    pub fn read_all(&mut self) -> Result<Vec<Event>, CodecError> {
        let mut events = Vec::with_capacity(self.remaining.min(usize::MAX as u64) as usize);
        while self.read_chunk(&mut events, READ_CHUNK_EVENTS)? > 0 {}
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_stream;
    use crate::types::{OverflowPolicy, TimeWindow};
    use std::io::Cursor;

    fn sample_stream() -> EventStream {
        EventStream::new(
            vec![
                Event::new(0, 0, 0, 0),
                Event::new(12345, 54321, 1, 1_000_000),
                Event::new(u16::MAX, u16::MAX, 1, packing::MAX_TIMESTAMP),
            ],
            SensorMetadata::new(1280, 720),
        )
    }

    #[test]
    fn test_decode_bytes_round_trip() {
        let stream = sample_stream();
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        let result = decode_bytes(&encoded.bytes).unwrap();
        assert_eq!(result.stream, stream);
        assert_eq!(result.image_size(), (720, 1280));
        assert_eq!(result.time_stamp(), 0);
    }

    #[test]
    fn test_decode_stream_carries_geometry() {
        let stream = sample_stream();
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        let decoded = decode_stream(&encoded.bytes, &encoded.header).unwrap();
        assert_eq!(decoded, stream);
        assert_eq!(decoded.metadata, SensorMetadata::new(1280, 720));

        let empty = EventStream::new(Vec::new(), SensorMetadata::new(346, 260));
        let encoded = encode_stream(&empty, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        let decoded = decode_stream(&encoded.bytes, &encoded.header).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.metadata.image_size(), (260, 346));
    }

    #[test]
    fn test_truncated_payload() {
        let encoded =
            encode_stream(&sample_stream(), TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        let cut = &encoded.bytes[..encoded.bytes.len() - 1];
        match decode_bytes(cut) {
            Err(CodecError::TruncatedData {
                expected,
                available,
            }) => {
                assert_eq!(expected, 24);
                assert_eq!(available, 23);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            Evt3Reader::new(Cursor::new(cut.to_vec())),
            Err(CodecError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_payload_starts_at_header_length() {
        let stream = sample_stream();
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();

        // Move the payload 16 bytes further out and point header_length at it.
        let mut bytes = encoded.bytes[..64].to_vec();
        bytes[32..36].copy_from_slice(&80u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 16]);
        bytes.extend_from_slice(&encoded.bytes[64..]);

        let result = decode_bytes(&bytes).unwrap();
        assert_eq!(result.stream.events, stream.events);

        let mut reader = Evt3Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.read_all().unwrap(), stream.events);
    }

    #[test]
    fn test_read_in_chunks() {
        let stream = sample_stream();
        let encoded = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
        let mut reader = Evt3Reader::new(Cursor::new(encoded.bytes)).unwrap();

        let mut events = Vec::new();
        assert_eq!(reader.read_chunk(&mut events, 2).unwrap(), 2);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_chunk(&mut events, 2).unwrap(), 1);
        assert_eq!(reader.read_chunk(&mut events, 2).unwrap(), 0);
        assert_eq!(events, stream.events);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let stream = sample_stream();
        let mut bytes = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject)
            .unwrap()
            .bytes;
        bytes.extend_from_slice(&[0xFF; 5]);
        assert_eq!(decode_bytes(&bytes).unwrap().stream.events, stream.events);
    }
}
