//! Fixed 64-byte file header.
//!
//! Layout (all little-endian):
//!
//! ```text
//! Offset  Size  Field
//! 0       4     signature ("EVT3")
//! 4       8     file_size (u64)
//! 12      8     event_count (u64)
//! 20      8     time_stamp (u64, reserved1, zero on write)
//! 28      4     duration (u32, microseconds)
//! 32      4     header_length (u32, = 64)
//! 36      4     width (u32)
//! 40      4     height (u32)
//! 44      4     reserved2 (u32, zero)
//! 48      16    reserved padding
//! ```
//!
//! Only the first 48 bytes carry meaning. The payload starts `header_length`
//! bytes into the file.

use crate::error::CodecError;
use byteorder::{ByteOrder, LittleEndian};
use std::io::Read;

/// Signature at the start of every file.
pub const SIGNATURE: [u8; 4] = *b"EVT3";

/// On-disk header size, and the `header_length` value every writer emits.
pub const HEADER_LENGTH: usize = 64;

/// Number of leading header bytes that carry fields.
pub const HEADER_FIELDS_LENGTH: usize = 48;

/// Byte offsets of each header field. Shared by the writer and the reader.
mod offset {
    pub const SIGNATURE: usize = 0;
    pub const FILE_SIZE: usize = 4;
    pub const EVENT_COUNT: usize = 12;
    pub const TIME_STAMP: usize = 20;
    pub const DURATION: usize = 28;
    pub const HEADER_LENGTH: usize = 32;
    pub const WIDTH: usize = 36;
    pub const HEIGHT: usize = 40;
}

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Always [`SIGNATURE`] for a successfully decoded header
    pub signature: [u8; 4],
    /// Total file size in bytes (header + payload)
    pub file_size: u64,
    /// Number of packed events in the payload
    pub event_count: u64,
    /// Reserved slot, zero when written by this crate
    pub time_stamp: u64,
    /// Largest selected timestamp minus the window start, in microseconds
    pub duration: u32,
    /// Offset of the first packed event
    pub header_length: u32,
    /// Sensor width in pixels
    pub width: u32,
    /// Sensor height in pixels
    pub height: u32,
}

impl FileHeader {
    /// Builds a header for `event_count` events with a payload of
    /// `payload_bytes`.
    ///
    /// Fails if `duration` does not fit the 32-bit header field or the
    /// total file size does not fit in 64 bits.
    pub fn new(
        event_count: u64,
        payload_bytes: u64,
        duration: u64,
        width: u32,
        height: u32,
    ) -> Result<Self, CodecError> {
        let duration = u32::try_from(duration).map_err(|_| CodecError::FieldOverflow {
            field: "duration",
            value: duration,
            index: None,
        })?;
        let file_size = (HEADER_LENGTH as u64)
            .checked_add(payload_bytes)
            .ok_or(CodecError::FieldOverflow {
                field: "file_size",
                value: payload_bytes,
                index: None,
            })?;
        Ok(Self {
            signature: SIGNATURE,
            file_size,
            event_count,
            time_stamp: 0,
            duration,
            header_length: HEADER_LENGTH as u32,
            width,
            height,
        })
    }

    /// Serializes the header into exactly [`HEADER_LENGTH`] bytes. Reserved
    /// bytes are zero.
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut buf = [0u8; HEADER_LENGTH];
        buf[offset::SIGNATURE..offset::SIGNATURE + 4].copy_from_slice(&self.signature);
        LittleEndian::write_u64(&mut buf[offset::FILE_SIZE..], self.file_size);
        LittleEndian::write_u64(&mut buf[offset::EVENT_COUNT..], self.event_count);
        LittleEndian::write_u64(&mut buf[offset::TIME_STAMP..], self.time_stamp);
        LittleEndian::write_u32(&mut buf[offset::DURATION..], self.duration);
        LittleEndian::write_u32(&mut buf[offset::HEADER_LENGTH..], self.header_length);
        LittleEndian::write_u32(&mut buf[offset::WIDTH..], self.width);
        LittleEndian::write_u32(&mut buf[offset::HEIGHT..], self.height);
        buf
    }

    /// Parses a header from the start of `bytes`.
    ///
    /// Needs at least [`HEADER_FIELDS_LENGTH`] bytes. The signature must match
    /// and `header_length` must not point inside the field region.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_FIELDS_LENGTH {
            return Err(CodecError::Format(format!(
                "header needs {} bytes, only {} available",
                HEADER_FIELDS_LENGTH,
                bytes.len()
            )));
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[offset::SIGNATURE..offset::SIGNATURE + 4]);
        if signature != SIGNATURE {
            return Err(CodecError::Format(format!(
                "bad signature {:?}, expected {:?}",
                String::from_utf8_lossy(&signature),
                String::from_utf8_lossy(&SIGNATURE)
            )));
        }

        let header = Self {
            signature,
            file_size: LittleEndian::read_u64(&bytes[offset::FILE_SIZE..]),
            event_count: LittleEndian::read_u64(&bytes[offset::EVENT_COUNT..]),
            time_stamp: LittleEndian::read_u64(&bytes[offset::TIME_STAMP..]),
            duration: LittleEndian::read_u32(&bytes[offset::DURATION..]),
            header_length: LittleEndian::read_u32(&bytes[offset::HEADER_LENGTH..]),
            width: LittleEndian::read_u32(&bytes[offset::WIDTH..]),
            height: LittleEndian::read_u32(&bytes[offset::HEIGHT..]),
        };

        if (header.header_length as usize) < HEADER_FIELDS_LENGTH {
            return Err(CodecError::Format(format!(
                "header length {} is shorter than the {} byte field region",
                header.header_length, HEADER_FIELDS_LENGTH
            )));
        }

        Ok(header)
    }

    /// Reads the field region from `reader`, which must be positioned at
    /// offset 0. Afterwards the reader sits at byte 48; callers seek to
    /// `header_length` before reading the payload.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, CodecError> {
        let mut buf = [0u8; HEADER_FIELDS_LENGTH];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CodecError::Format(format!(
                    "header needs {} bytes, file is shorter",
                    HEADER_FIELDS_LENGTH
                ))
            } else {
                CodecError::Io(e)
            }
        })?;
        Self::from_bytes(&buf)
    }

    /// Offset of the first packed event.
    pub fn payload_offset(&self) -> u64 {
        self.header_length as u64
    }

    /// Number of payload bytes the header declares.
    pub fn payload_len(&self) -> u64 {
        self.event_count
            .saturating_mul(crate::packing::WORD_SIZE as u64)
    }
}

/// Encodes a header for the given stream properties.
pub fn encode_header(
    event_count: u64,
    payload_bytes: u64,
    duration: u64,
    width: u32,
    height: u32,
) -> Result<[u8; HEADER_LENGTH], CodecError> {
    Ok(FileHeader::new(event_count, payload_bytes, duration, width, height)?.to_bytes())
}

/// Decodes a header from the start of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<FileHeader, CodecError> {
    FileHeader::from_bytes(bytes)
}
