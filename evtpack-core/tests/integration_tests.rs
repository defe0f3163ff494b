//! Integration tests for writing and reading packed event files.
//!
//! Run with: cargo test --test integration_tests

use evtpack_core::{
    decode_file, encode_stream, output, read_header, write_file, CodecError, CsvEventSource,
    Event, EventSource, EventStream, Evt3Reader, FieldOrder, OverflowPolicy, SensorMetadata,
    TimeWindow,
};
use std::fs::File;
use std::io::{BufReader, Cursor};

fn synthetic_stream(count: usize) -> EventStream {
    let events = (0..count)
        .map(|i| {
            Event::new(
                (i * 7 % 1280) as u16,
                (i * 13 % 720) as u16,
                (i % 2) as u8,
                (i as u64) * 3,
            )
        })
        .collect();
    EventStream::new(events, SensorMetadata::new(1280, 720))
}

/// Test that a file written to disk decodes to the same stream.
#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.evt");
    let stream = synthetic_stream(10_000);

    let summary = write_file(&path, &stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
    assert_eq!(summary.events_written, 10_000);
    assert_eq!(summary.bytes_written, 64 + 10_000 * 8);
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        summary.bytes_written
    );

    let result = decode_file(&path).unwrap();
    assert_eq!(result.stream, stream);
    assert_eq!(result.header.duration, 9_999 * 3);
    assert_eq!(result.image_size(), (720, 1280));
}

/// Test that the on-disk bytes match the documented layout exactly.
#[test]
fn test_literal_file_layout() {
    let stream = EventStream::new(
        vec![Event::new(12345, 54321, 1, 1_000_000)],
        SensorMetadata::new(640, 480),
    );
    let bytes = encode_stream(&stream, TimeWindow::all(), OverflowPolicy::Reject)
        .unwrap()
        .bytes;

    assert_eq!(bytes.len(), 72);
    assert_eq!(&bytes[0..4], b"EVT3");
    assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 72);
    assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 1);
    assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 1_000_000);
    assert_eq!(u32::from_le_bytes(bytes[32..36].try_into().unwrap()), 64);
    assert_eq!(u32::from_le_bytes(bytes[36..40].try_into().unwrap()), 640);
    assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 480);

    // Payload viewed as two little-endian u32 words per event.
    let word0 = u32::from_le_bytes(bytes[64..68].try_into().unwrap());
    let word1 = u32::from_le_bytes(bytes[68..72].try_into().unwrap());
    assert_eq!(word0 & 0xFFFF, 12345);
    assert_eq!(word0 >> 16, 54321);
    assert_eq!(word1 & 0x1, 1);
    assert_eq!(word1 >> 1, 1_000_000);
}

/// Test the window example: t in {50,150,199,250} with [100,200].
#[test]
fn test_windowed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("window.evt");
    let stream = EventStream::new(
        [50, 150, 199, 250]
            .iter()
            .map(|&t| Event::new(1, 1, 1, t))
            .collect(),
        SensorMetadata::new(64, 64),
    );

    write_file(
        &path,
        &stream,
        TimeWindow::new(100, 200),
        OverflowPolicy::Reject,
    )
    .unwrap();

    let result = decode_file(&path).unwrap();
    let times: Vec<u64> = result.stream.events.iter().map(|e| e.timestamp).collect();
    assert_eq!(times, vec![150, 199]);
    assert_eq!(result.header.event_count, 2);
    assert_eq!(result.header.duration, 99);
}

/// Test that an empty stream produces a bare header and decodes back.
#[test]
fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.evt");
    let stream = EventStream::new(Vec::new(), SensorMetadata::new(346, 260));

    let summary = write_file(&path, &stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
    assert_eq!(summary.bytes_written, 64);

    let header = read_header(&path).unwrap();
    assert_eq!(header.file_size, 64);
    assert_eq!(header.event_count, 0);

    let result = decode_file(&path).unwrap();
    assert!(result.stream.is_empty());
    assert_eq!(result.image_size(), (260, 346));
}

/// Test that a rejected encode leaves an existing file untouched.
#[test]
fn test_failed_encode_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keep.evt");
    let good = synthetic_stream(4);
    write_file(&path, &good, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut bad = synthetic_stream(4);
    bad.events[2].timestamp = 1 << 31;
    let err = write_file(&path, &bad, TimeWindow::all(), OverflowPolicy::Reject).unwrap_err();
    assert!(matches!(err, CodecError::FieldOverflow { field: "t", .. }));

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

/// Test that a truncated file is reported, not silently shortened.
#[test]
fn test_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.evt");
    let bytes = encode_stream(&synthetic_stream(8), TimeWindow::all(), OverflowPolicy::Reject)
        .unwrap()
        .bytes;
    std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

    match decode_file(&path) {
        Err(CodecError::TruncatedData {
            expected,
            available,
        }) => {
            assert_eq!(expected, 64);
            assert_eq!(available, 56);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

/// Test that a file with a foreign signature is rejected.
#[test]
fn test_foreign_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.evt");
    std::fs::write(&path, b"% evt 3.0\n% format EVT3;width=1280;height=720\n% end\n").unwrap();
    assert!(matches!(decode_file(&path), Err(CodecError::Format(_))));
}

/// Test chunked decoding against a file on disk.
#[test]
fn test_streaming_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunks.evt");
    let stream = synthetic_stream(1000);
    write_file(&path, &stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();

    let mut reader = Evt3Reader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(reader.metadata(), stream.metadata);

    let mut events = Vec::new();
    let mut chunks = 0;
    while reader.read_chunk(&mut events, 300).unwrap() > 0 {
        chunks += 1;
    }
    assert_eq!(chunks, 4);
    assert_eq!(events, stream.events);
}

/// Test the CSV -> packed file -> CSV path.
#[test]
fn test_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let evt_path = dir.path().join("from_csv.evt");
    let csv_path = dir.path().join("out.csv");

    let text = "%geometry:640,480\n10,1,2,1\n20,3,4,0\n30,5,6,1\n";
    let mut source = CsvEventSource::new(Cursor::new(text), FieldOrder::TXYP);
    let stream = source.load_events(0).unwrap();

    write_file(&evt_path, &stream, TimeWindow::all(), OverflowPolicy::Reject).unwrap();
    let result = decode_file(&evt_path).unwrap();
    output::write_csv(&csv_path, &result.stream, FieldOrder::TXYP).unwrap();

    let written = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(written, text);
}
