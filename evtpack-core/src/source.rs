//! Event sources feeding the encoder.
//!
//! The encoder only needs an [`EventStream`]; where it comes from (a live
//! sensor, a vendor recording, a text dump) is hidden behind [`EventSource`].
//! [`CsvEventSource`] reads the CSV layout produced by
//! [`CsvWriter`](crate::output::CsvWriter).

use crate::output::FieldOrder;
use crate::types::{Event, EventStream, SensorMetadata};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading events.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing sensor geometry")]
    MissingGeometry,

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Something that can produce a time-ordered event stream.
pub trait EventSource {
    /// Loads events with `t < max_duration_us`, or every event when
    /// `max_duration_us` is 0.
    fn load_events(&mut self, max_duration_us: u64) -> Result<EventStream, SourceError>;
}

/// Reads events from CSV text.
///
/// Expects a `%geometry:<width>,<height>` line before the first event. Other
/// `%` lines, blank lines and a column-name row are skipped.
pub struct CsvEventSource<R: BufRead> {
    reader: R,
    field_order: FieldOrder,
}

impl CsvEventSource<BufReader<File>> {
    /// Opens a CSV file.
    pub fn open<P: AsRef<Path>>(path: P, field_order: FieldOrder) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), field_order))
    }
}

impl<R: BufRead> CsvEventSource<R> {
    pub fn new(reader: R, field_order: FieldOrder) -> Self {
        Self {
            reader,
            field_order,
        }
    }

    fn parse_geometry(value: &str, line: usize) -> Result<SensorMetadata, SourceError> {
        let parse_err = || SourceError::Parse {
            line,
            message: format!("invalid geometry: {:?}", value),
        };
        let (w, h) = value
            .split_once(',')
            .or_else(|| value.split_once('x'))
            .ok_or_else(parse_err)?;
        let width = w.trim().parse().map_err(|_| parse_err())?;
        let height = h.trim().parse().map_err(|_| parse_err())?;
        Ok(SensorMetadata::new(width, height))
    }

    fn parse_event(&self, text: &str, line: usize) -> Result<Event, SourceError> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(SourceError::Parse {
                line,
                message: format!("expected 4 fields, found {}", parts.len()),
            });
        }

        let mut values = [0u64; 4];
        for (column, &field) in self.field_order.columns().iter().enumerate() {
            values[field] = parts[column].parse().map_err(|_| SourceError::Parse {
                line,
                message: format!("invalid value {:?}", parts[column]),
            })?;
        }

        let coord = |value: u64, name: &str| {
            u16::try_from(value).map_err(|_| SourceError::Parse {
                line,
                message: format!("{} coordinate {} exceeds 16 bits", name, value),
            })
        };
        let x = coord(values[0], "x")?;
        let y = coord(values[1], "y")?;
        let polarity = u8::try_from(values[2]).map_err(|_| SourceError::Parse {
            line,
            message: format!("invalid polarity {}", values[2]),
        })?;

        Ok(Event::new(x, y, polarity, values[3]))
    }
}

impl<R: BufRead> EventSource for CsvEventSource<R> {
    fn load_events(&mut self, max_duration_us: u64) -> Result<EventStream, SourceError> {
        let mut metadata = None;
        let mut events = Vec::new();
        let mut text = String::new();
        let mut line = 0usize;

        loop {
            text.clear();
            if self.reader.read_line(&mut text)? == 0 {
                break;
            }
            line += 1;
            let trimmed = text.trim();

            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('%') {
                if let Some(value) = rest.trim_start().strip_prefix("geometry") {
                    let value = value.trim_start_matches(&[':', ' '][..]);
                    metadata = Some(Self::parse_geometry(value, line)?);
                }
                continue;
            }
            if trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
                // column names
                continue;
            }

            if metadata.is_none() {
                return Err(SourceError::MissingGeometry);
            }
            let event = self.parse_event(trimmed, line)?;
            if max_duration_us == 0 || event.timestamp < max_duration_us {
                events.push(event);
            }
        }

        let metadata = metadata.ok_or(SourceError::MissingGeometry)?;
        log::info!(
            "Loaded {} events, image size W{} x H{}",
            events.len(),
            metadata.width,
            metadata.height
        );
        Ok(EventStream::new(events, metadata))
    }
}
