use std::io::IsTerminal;
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use swmrprims_monitor::{ReadReport, WriteReport};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct WriteOutput<'a> {
    schema_id: &'static str,
    datafile: String,
    dataset: &'a str,
    #[serde(flatten)]
    report: &'a WriteReport,
}

#[derive(Serialize)]
struct ReadOutput<'a> {
    schema_id: &'static str,
    datafile: String,
    dataset: &'a str,
    #[serde(flatten)]
    report: &'a ReadReport,
}

/// Layout of a stored dataset, as printed by `info`.
#[derive(Serialize)]
pub struct DatasetInfo {
    pub datafile: String,
    pub dataset: String,
    pub format_version: u32,
    pub frames: usize,
    pub frame_shape: Vec<usize>,
    pub chunk_depth: usize,
    pub frame_bytes: usize,
    pub swmr: bool,
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(rows: Vec<(&str, String)>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    println!("{table}");
}

pub fn print_write_report(datafile: &Path, dataset: &str, report: &WriteReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&WriteOutput {
            schema_id: "https://schemas.3leaps.dev/swmrprims/cli/v1/write-report.schema.json",
            datafile: datafile.display().to_string(),
            dataset,
            report,
        }),
        OutputFormat::Table => print_table(vec![
            ("Datafile", datafile.display().to_string()),
            ("Dataset", dataset.to_string()),
            ("Frames", report.frames.to_string()),
            ("Frame size", format!("{} B", report.frame_bytes)),
            ("Flushes", report.flushes.to_string()),
            ("Elapsed", format!("{:.3} s", report.elapsed_secs)),
            (
                "Flush interval",
                format!(
                    "mean {:.3} ms, std {:.3} ms, min {:.3} ms, max {:.3} ms",
                    report.mean_flush_ms,
                    report.std_flush_ms,
                    report.min_flush_ms,
                    report.max_flush_ms
                ),
            ),
            ("Throughput", format!("{:.3} MB/s", report.throughput_mb_s)),
        ]),
        OutputFormat::Pretty => println!(
            "wrote {} frames ({} B each) to {}:{} in {:.3}s, {} flushes, mean {:.3}ms std {:.3}ms, {:.3} MB/s",
            report.frames,
            report.frame_bytes,
            datafile.display(),
            dataset,
            report.elapsed_secs,
            report.flushes,
            report.mean_flush_ms,
            report.std_flush_ms,
            report.throughput_mb_s
        ),
    }
}

pub fn print_read_report(datafile: &Path, dataset: &str, report: &ReadReport, format: OutputFormat) {
    let reason = report
        .stop_reason
        .map(|r| r.as_str())
        .unwrap_or("unknown");
    match format {
        OutputFormat::Json => print_json(&ReadOutput {
            schema_id: "https://schemas.3leaps.dev/swmrprims/cli/v1/read-report.schema.json",
            datafile: datafile.display().to_string(),
            dataset,
            report,
        }),
        OutputFormat::Table => print_table(vec![
            ("Datafile", datafile.display().to_string()),
            ("Dataset", dataset.to_string()),
            ("Checks", report.checks.to_string()),
            ("Frames observed", report.frames_observed.to_string()),
            ("Failures", report.failures.to_string()),
            ("Stopped", reason.to_string()),
        ]),
        OutputFormat::Pretty => println!(
            "checked {} of {} frames in {}:{}, {} failed ({})",
            report.checks,
            report.frames_observed,
            datafile.display(),
            dataset,
            report.failures,
            reason
        ),
    }
}

pub fn print_dataset_info(info: &DatasetInfo, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct InfoOutput<'a> {
                schema_id: &'static str,
                #[serde(flatten)]
                info: &'a DatasetInfo,
            }
            print_json(&InfoOutput {
                schema_id: "https://schemas.3leaps.dev/swmrprims/cli/v1/dataset-info.schema.json",
                info,
            });
        }
        OutputFormat::Table => print_table(vec![
            ("Datafile", info.datafile.clone()),
            ("Dataset", info.dataset.clone()),
            ("Format version", info.format_version.to_string()),
            ("Frames", info.frames.to_string()),
            ("Frame shape", shape_string(&info.frame_shape)),
            ("Chunk depth", info.chunk_depth.to_string()),
            ("Frame size", format!("{} B", info.frame_bytes)),
            ("SWMR", info.swmr.to_string()),
        ]),
        OutputFormat::Pretty => println!(
            "{}:{} frames={} shape={} chunk={} swmr={}",
            info.datafile,
            info.dataset,
            info.frames,
            shape_string(&info.frame_shape),
            info.chunk_depth,
            info.swmr
        ),
    }
}

fn shape_string(shape: &[usize]) -> String {
    shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("x")
}
