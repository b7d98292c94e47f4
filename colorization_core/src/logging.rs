use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::loss::LossBreakdown;
use crate::schedule::StepKind;

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

pub fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationLogEntry {
    pub iteration: usize,
    pub step: StepKind,
    /// Absent on re-projection iterations
    pub loss: Option<f32>,
    pub fidelity: Option<f32>,
    pub luminance: Option<f32>,
    pub coupled_tv: Option<f32>,
    pub timestamp_ms: u128,
}

impl IterationLogEntry {
    pub fn new(iteration: usize, step: StepKind, loss: Option<&LossBreakdown>) -> Self {
        Self {
            iteration,
            step,
            loss: loss.map(|l| l.total),
            fidelity: loss.map(|l| l.fidelity),
            luminance: loss.map(|l| l.luminance),
            coupled_tv: loss.map(|l| l.coupled_tv),
            timestamp_ms: timestamp_ms(),
        }
    }
}

pub fn log_iteration<P: AsRef<Path>>(path: P, entry: &IterationLogEntry) -> io::Result<()> {
    append_json_line(path, entry)
}

#[derive(Debug, Serialize)]
pub struct RunSummaryEntry {
    pub iterations: usize,
    pub reprojections: Vec<usize>,
    pub final_loss: Option<f32>,
    pub timestamp_ms: u128,
}

pub fn log_run_summary<P: AsRef<Path>>(path: P, summary: &RunSummaryEntry) -> io::Result<()> {
    append_json_line(path, summary)
}
