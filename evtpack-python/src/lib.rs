//! Python bindings for the evtpack codec with numpy support.
//!
//! Events cross the boundary in columnar form (separate arrays for t, x, y
//! and p), matching how numpy users hold event data.

use evtpack_core::{
    decode_file, read_header as read_file_header, CodecError, EncodeOptions, Event, EventStream,
    OverflowPolicy, SensorMetadata, StreamEncoder, TimeWindow,
};
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::PathBuf;

fn to_py_err(err: CodecError) -> PyErr {
    match err {
        CodecError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Decoded events in columnar form.
#[pyclass]
pub struct Events {
    t: Vec<u64>,
    x: Vec<u16>,
    y: Vec<u16>,
    p: Vec<u8>,
    time_stamp: u64,
    duration: u32,
    width: u32,
    height: u32,
}

#[pymethods]
impl Events {
    fn __len__(&self) -> usize {
        self.t.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Events(count={}, image_size=({}, {}))",
            self.t.len(),
            self.height,
            self.width
        )
    }

    /// Timestamps in microseconds.
    #[getter]
    fn t<'py>(&self, py: Python<'py>) -> &'py PyArray1<u64> {
        self.t.clone().into_pyarray(py)
    }

    #[getter]
    fn x<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.x.clone().into_pyarray(py)
    }

    #[getter]
    fn y<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.y.clone().into_pyarray(py)
    }

    /// Polarities: 0 = OFF, 1 = ON.
    #[getter]
    fn p<'py>(&self, py: Python<'py>) -> &'py PyArray1<u8> {
        self.p.clone().into_pyarray(py)
    }

    /// The header's timestamp slot.
    #[getter]
    fn time_stamp(&self) -> u64 {
        self.time_stamp
    }

    /// Duration stored in the header, in microseconds.
    #[getter]
    fn duration(&self) -> u32 {
        self.duration
    }

    /// Sensor geometry as (height, width).
    #[getter]
    fn image_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Returns all arrays as a dictionary keyed t, x, y, p.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        dict.set_item("t", self.t.clone().into_pyarray(py))?;
        dict.set_item("x", self.x.clone().into_pyarray(py))?;
        dict.set_item("y", self.y.clone().into_pyarray(py))?;
        dict.set_item("p", self.p.clone().into_pyarray(py))?;
        dict.set_item("time_stamp", self.time_stamp)?;
        dict.set_item("image_size", (self.height, self.width))?;
        Ok(dict.into())
    }
}

impl Events {
    fn from_stream(stream: EventStream, time_stamp: u64, duration: u32) -> Self {
        let len = stream.events.len();
        let mut t = Vec::with_capacity(len);
        let mut x = Vec::with_capacity(len);
        let mut y = Vec::with_capacity(len);
        let mut p = Vec::with_capacity(len);

        for event in stream.events {
            t.push(event.timestamp);
            x.push(event.x);
            y.push(event.y);
            p.push(event.polarity);
        }

        Self {
            t,
            x,
            y,
            p,
            time_stamp,
            duration,
            width: stream.metadata.width,
            height: stream.metadata.height,
        }
    }
}

/// Loads a packed event file.
///
/// Example:
///     >>> import evtpack
///     >>> events = evtpack.load_events("recording.evt")
///     >>> print(len(events), events.image_size)
#[pyfunction]
fn load_events(py: Python<'_>, path: &str) -> PyResult<Py<Events>> {
    let result = decode_file(PathBuf::from(path)).map_err(to_py_err)?;
    let events = Events::from_stream(
        result.stream,
        result.header.time_stamp,
        result.header.duration,
    );
    Py::new(py, events)
}

/// Packs columnar event arrays into a file and returns the bytes written.
///
/// Events with t outside [window_start, window_end] are skipped; a
/// window_end of 0 keeps everything from window_start on.
#[pyfunction]
#[pyo3(signature = (path, t, x, y, p, width, height, window_start=0, window_end=0, mask_overflow=false))]
#[allow(clippy::too_many_arguments)]
fn save_events(
    path: &str,
    t: PyReadonlyArray1<'_, u64>,
    x: PyReadonlyArray1<'_, u16>,
    y: PyReadonlyArray1<'_, u16>,
    p: PyReadonlyArray1<'_, u8>,
    width: u32,
    height: u32,
    window_start: u64,
    window_end: u64,
    mask_overflow: bool,
) -> PyResult<u64> {
    let (t, x, y, p) = (t.as_array(), x.as_array(), y.as_array(), p.as_array());
    if x.len() != t.len() || y.len() != t.len() || p.len() != t.len() {
        return Err(PyValueError::new_err(format!(
            "array lengths differ: t={}, x={}, y={}, p={}",
            t.len(),
            x.len(),
            y.len(),
            p.len()
        )));
    }

    let events = t
        .iter()
        .zip(x.iter())
        .zip(y.iter())
        .zip(p.iter())
        .map(|(((&t, &x), &y), &p)| Event::new(x, y, p, t))
        .collect();
    let stream = EventStream::new(events, SensorMetadata::new(width, height));

    let overflow = if mask_overflow {
        OverflowPolicy::Mask
    } else {
        OverflowPolicy::Reject
    };
    let encoder = StreamEncoder::new(EncodeOptions::new(
        TimeWindow::new(window_start, window_end),
        overflow,
    ));
    let summary = encoder
        .write_file(PathBuf::from(path), &stream)
        .map_err(to_py_err)?;
    Ok(summary.bytes_written)
}

/// Reads only the header of a packed event file as a dictionary.
#[pyfunction]
fn read_header(py: Python<'_>, path: &str) -> PyResult<PyObject> {
    let header = read_file_header(PathBuf::from(path)).map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item(
        "signature",
        String::from_utf8_lossy(&header.signature).into_owned(),
    )?;
    dict.set_item("file_size", header.file_size)?;
    dict.set_item("event_count", header.event_count)?;
    dict.set_item("time_stamp", header.time_stamp)?;
    dict.set_item("duration", header.duration)?;
    dict.set_item("header_length", header.header_length)?;
    dict.set_item("width", header.width)?;
    dict.set_item("height", header.height)?;
    Ok(dict.into())
}

/// Packed event codec module for Python.
#[pymodule]
fn _evtpack(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(load_events, m)?)?;
    m.add_function(wrap_pyfunction!(save_events, m)?)?;
    m.add_function(wrap_pyfunction!(read_header, m)?)?;
    m.add_class::<Events>()?;
    Ok(())
}
