//! CSV output for decoded events.
//!
//! Each event becomes one line with its four fields in a configurable order,
//! optionally preceded by a `%geometry:<width>,<height>` line.

use crate::types::{Event, EventStream, SensorMetadata};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Column indices of the four event fields: x=0, y=1, p=2, t=3.
pub const FIELD_NAMES: [&str; 4] = ["x", "y", "polarity", "timestamp"];

/// Field ordering for CSV input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// x, y, p, t
    #[default]
    XYPT,
    /// t, x, y, p
    TXYP,
    /// x, y, t, p
    XYTP,
    /// Any other permutation, built through [`FieldOrder::custom`]
    Custom(ColumnOrder),
}

/// A permutation of the four field indices: `indices()[column]` is the field
/// stored in that column. Only constructible through [`FieldOrder::custom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOrder([usize; 4]);

impl ColumnOrder {
    pub fn indices(&self) -> [usize; 4] {
        self.0
    }
}

impl std::str::FromStr for FieldOrder {
    type Err = OutputError;

    /// Parses a field order from a format string like "x,y,p,t" or "t,x,y,p".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s.split(',').map(|p| p.trim().to_lowercase()).collect();

        if parts.len() != 4 {
            return Err(OutputError::InvalidFormat(
                "Format must have exactly 4 fields: x, y, p, t".to_string(),
            ));
        }

        let mut indices = [0usize; 4];
        for (i, part) in parts.iter().enumerate() {
            indices[i] = match part.as_str() {
                "x" => 0,
                "y" => 1,
                "p" | "pol" | "polarity" => 2,
                "t" | "time" | "timestamp" => 3,
                _ => {
                    return Err(OutputError::InvalidFormat(format!(
                        "Unknown field: {}. Use x, y, p, t",
                        part
                    )))
                }
            };
        }

        Self::custom(indices)
    }
}

impl FieldOrder {
    /// Builds an order from column indices (x=0, y=1, p=2, t=3).
    ///
    /// Every field must appear exactly once. Named permutations map to their
    /// variant, anything else becomes [`FieldOrder::Custom`].
    pub fn custom(indices: [usize; 4]) -> Result<Self, OutputError> {
        let mut used = [false; 4];
        for &field in &indices {
            if field >= FIELD_NAMES.len() {
                return Err(OutputError::InvalidFormat(format!(
                    "Field index {} out of range 0..4",
                    field
                )));
            }
            if used[field] {
                return Err(OutputError::InvalidFormat(format!(
                    "Duplicate field: {}",
                    FIELD_NAMES[field]
                )));
            }
            used[field] = true;
        }

        Ok(match indices {
            [0, 1, 2, 3] => Self::XYPT,
            [3, 0, 1, 2] => Self::TXYP,
            [0, 1, 3, 2] => Self::XYTP,
            other => Self::Custom(ColumnOrder(other)),
        })
    }

    /// Returns, for each column, the index of the field it holds.
    pub fn columns(&self) -> [usize; 4] {
        match self {
            Self::XYPT => [0, 1, 2, 3],
            Self::TXYP => [3, 0, 1, 2],
            Self::XYTP => [0, 1, 3, 2],
            Self::Custom(order) => order.indices(),
        }
    }

    /// Returns the column names for this field order.
    pub fn header(&self) -> String {
        self.columns()
            .iter()
            .map(|&i| FIELD_NAMES[i])
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// CSV output writer for events.
pub struct CsvWriter<W: Write> {
    writer: BufWriter<W>,
    field_order: FieldOrder,
}

impl<W: Write> CsvWriter<W> {
    /// Creates a new CSV writer.
    pub fn new(writer: W, field_order: FieldOrder) -> Self {
        Self {
            writer: BufWriter::new(writer),
            field_order,
        }
    }

    /// Writes the geometry line, if metadata is given.
    pub fn write_header(&mut self, metadata: Option<&SensorMetadata>) -> Result<(), OutputError> {
        if let Some(meta) = metadata {
            writeln!(self.writer, "%geometry:{},{}", meta.width, meta.height)?;
        }
        Ok(())
    }

    /// Writes a batch of events.
    pub fn write_events(&mut self, events: &[Event]) -> Result<(), OutputError> {
        let columns = self.field_order.columns();
        for event in events {
            let values = [
                event.x as u64,
                event.y as u64,
                event.polarity as u64,
                event.timestamp,
            ];
            writeln!(
                self.writer,
                "{},{},{},{}",
                values[columns[0]], values[columns[1]], values[columns[2]], values[columns[3]]
            )?;
        }
        Ok(())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes a stream, geometry line included, to a CSV file.
pub fn write_csv<P: AsRef<Path>>(
    path: P,
    stream: &EventStream,
    field_order: FieldOrder,
) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = CsvWriter::new(file, field_order);
    writer.write_header(Some(&stream.metadata))?;
    writer.write_events(&stream.events)?;
    writer.flush()?;
    Ok(())
}
