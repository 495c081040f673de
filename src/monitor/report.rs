//! Monitoring report files
//!
//! Text layout of `{video}_usage.txt` (samples) and `{video}_averages.txt`.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::Sample;
use crate::config::ReportStyle;

/// Mean values over one monitoring run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub net_sent_gb: f64,
    pub net_recv_gb: f64,
}

impl Averages {
    /// `None` for an empty run
    #[allow(clippy::cast_precision_loss)]
    pub fn of(samples: &[Sample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = |f: fn(&Sample) -> f64| samples.iter().map(f).sum::<f64>() / n;

        Some(Self {
            cpu_percent: mean(|s| f64::from(s.cpu_percent)),
            memory_percent: mean(|s| f64::from(s.memory_percent)),
            net_sent_gb: mean(|s| s.net_sent_gb),
            net_recv_gb: mean(|s| s.net_recv_gb),
        })
    }
}

/// Where a job writes its text report and plot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub text: PathBuf,
    pub plot: PathBuf,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, video: &str, style: ReportStyle) -> Self {
        let (text, plot) = match style {
            ReportStyle::Samples => ("usage.txt", "plot.png"),
            ReportStyle::Averages => ("averages.txt", "performance.png"),
        };
        Self {
            text: output_dir.join(format!("{video}_{text}")),
            plot: output_dir.join(format!("{video}_{plot}")),
        }
    }
}

/// `elapsed, cpu, memory` line; floats keep a decimal point (`12.0`, not `12`)
pub fn sample_line(sample: &Sample) -> String {
    format!(
        "{:.2}, {:?}, {:?}\n",
        sample.elapsed_secs, sample.cpu_percent, sample.memory_percent
    )
}

/// Every sample followed by CPU and memory averages
pub fn render_samples(samples: &[Sample], averages: &Averages) -> String {
    let mut out: String = samples.iter().map(sample_line).collect();
    let _ = write!(
        out,
        "\nAverage CPU Usage: {:.2}%\nAverage Memory Usage: {:.2}%\n",
        averages.cpu_percent, averages.memory_percent
    );
    out
}

pub fn render_averages(averages: &Averages) -> String {
    format!(
        "Average CPU: {:?}%\nAverage Memory: {:?}%\nAverage Sent: {:.6} GB\nAverage Received: {:.6} GB\n",
        averages.cpu_percent, averages.memory_percent, averages.net_sent_gb, averages.net_recv_gb
    )
}

/// Append one sample line, creating the file if needed
pub fn append_sample(path: &Path, sample: &Sample) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(sample_line(sample).as_bytes())
}

/// Write the final text report, replacing any incremental content
pub fn write_report(
    path: &Path,
    style: ReportStyle,
    samples: &[Sample],
    averages: &Averages,
) -> io::Result<()> {
    let content = match style {
        ReportStyle::Samples => render_samples(samples, averages),
        ReportStyle::Averages => render_averages(averages),
    };
    fs::write(path, content)
}
