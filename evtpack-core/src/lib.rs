//! Codec for packed event camera streams.
//!
//! Events (timestamp, pixel coordinate, polarity) are stored as one 64-bit
//! word each behind a fixed 64-byte header tagged `EVT3`. This crate provides
//! the header codec, the bit packing, whole-buffer and streaming decoders, an
//! atomic file writer, and CSV interchange for driving the codec.
//!
//! # Example
//!
//! ```no_run
//! use evtpack_core::{decode_file, write_file, Event, EventStream, OverflowPolicy,
//!     SensorMetadata, TimeWindow};
//!
//! let stream = EventStream::new(
//!     vec![Event::new(10, 20, 1, 100), Event::new(11, 20, 0, 150)],
//!     SensorMetadata::new(640, 480),
//! );
//! write_file("recording.evt", &stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
//!
//! let result = decode_file("recording.evt").unwrap();
//! println!("Decoded {} events", result.stream.len());
//! println!("Sensor: {}x{}", result.stream.metadata.width, result.stream.metadata.height);
//! ```
//!
//! # Features
//!
//! - Explicit overflow policy: reject out-of-range fields or mask them with a warning
//! - Time-window selection at encode time
//! - Chunked decoding for large files
//! - Atomic file replacement on encode
//! - CSV input and output with customizable field ordering
//!
//! Diagnostics are emitted through the `log` facade; install any logger to
//! see them.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod output;
pub mod packing;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use decoder::{decode_bytes, decode_file, decode_stream, read_header, Evt3Reader};
pub use encoder::{encode_stream, write_file, EncodeSummary, EncodedStream, StreamEncoder};
pub use error::CodecError;
pub use header::{decode_header, encode_header, FileHeader, HEADER_LENGTH, SIGNATURE};
pub use output::{ColumnOrder, FieldOrder, OutputError};
pub use source::{CsvEventSource, EventSource, SourceError};
pub use types::{
    DecodeResult, EncodeOptions, Event, EventStream, OverflowPolicy, SensorMetadata, TimeWindow,
};
