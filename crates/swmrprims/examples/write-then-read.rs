//! Writer thread plus polling reader on one store.
//!
//! Run with:
//!   cargo run --example write-then-read
//!
//! The reader follows the writer frame by frame and stops once all
//! frames have been verified.

use std::fs;
use std::thread;
use std::time::Duration;

use swmrprims::monitor::{
    MonitorConfig, MonitorError, ReferenceSource, SwmrReader, SwmrWriter, WriteOptions,
    WriterConfig,
};

const FRAMES: usize = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("swmrprims-demo-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let path = dir.join("swmr.dat");

    let mut writer = SwmrWriter::new(&path, WriterConfig::default());
    writer.create_file()?;
    writer.load_reference_frame(&ReferenceSource::Embedded)?;

    let handle = thread::spawn(move || {
        let report = writer.write_frames(&WriteOptions {
            iterations: FRAMES,
            chunk_depth: 4,
            direct_chunk_write: false,
            period: Duration::from_millis(50),
        })?;
        writer.close()?;
        Ok::<_, MonitorError>(report)
    });

    // The dataset appears once the writer thread has entered SWMR mode.
    let mut reader = loop {
        match SwmrReader::open_file(&path, "data") {
            Ok(reader) => break reader,
            Err(_) if !handle.is_finished() => thread::sleep(Duration::from_millis(5)),
            Err(err) => return Err(err.into()),
        }
    };
    reader.load_reference_frame(&ReferenceSource::Embedded)?;
    let reason = reader.monitor(&MonitorConfig {
        poll_interval: Duration::from_millis(20),
        expected_frames: Some(FRAMES),
        ..MonitorConfig::default()
    })?;

    let written = handle
        .join()
        .map_err(|_| "writer thread panicked")??;
    let read = reader.report();

    eprintln!(
        "wrote {} frames in {} flushes ({:.3} MB/s)",
        written.frames, written.flushes, written.throughput_mb_s
    );
    eprintln!(
        "read {} checks, {} failures, stopped: {reason}",
        read.checks, read.failures
    );

    let _ = fs::remove_dir_all(&dir);
    Ok(())
}
