//! Time-series plots of a monitoring run
//!
//! Rendered with the `plotters` bitmap backend. Text goes through `ab_glyph`
//! with a bundled DejaVu Sans, so no system fonts are needed. CPU red,
//! memory blue, network sent green, received magenta.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::Path;
use std::sync::OnceLock;

use super::Sample;

pub type PlotResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const USAGE_SIZE: (u32, u32) = (1000, 500);
const PERFORMANCE_SIZE: (u32, u32) = (1000, 1500);

const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
static FONT_LOADED: OnceLock<bool> = OnceLock::new();

/// Register the bundled font once per process
fn ensure_font() -> PlotResult {
    let loaded = *FONT_LOADED
        .get_or_init(|| register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES).is_ok());
    if loaded {
        Ok(())
    } else {
        Err("bundled plot font could not be loaded".into())
    }
}

/// CPU and memory over time in one chart (`{video}_plot.png`)
pub fn draw_usage(path: &Path, video: &str, samples: &[Sample]) -> PlotResult {
    ensure_font()?;
    let root = BitMapBackend::new(path, USAGE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    draw_percent_panel(
        &root,
        &format!("CPU and Memory Usage Over Time for {video}"),
        "Usage (%)",
        samples,
        &[(Metric::Cpu, RED), (Metric::Memory, BLUE)],
    )?;

    root.present()?;
    Ok(())
}

/// Three stacked panels: CPU, memory, network (`{video}_performance.png`)
pub fn draw_performance(path: &Path, video: &str, samples: &[Sample]) -> PlotResult {
    ensure_font()?;
    let root = BitMapBackend::new(path, PERFORMANCE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(
        &format!("Performance Metrics for {video}"),
        (FONT_FAMILY, 28).into_font(),
    )?;

    let panels = root.split_evenly((3, 1));
    draw_percent_panel(
        &panels[0],
        "CPU",
        Metric::Cpu.label(),
        samples,
        &[(Metric::Cpu, RED)],
    )?;
    draw_percent_panel(
        &panels[1],
        "Memory",
        Metric::Memory.label(),
        samples,
        &[(Metric::Memory, BLUE)],
    )?;
    draw_network_panel(&panels[2], samples)?;

    root.present()?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Metric {
    Cpu,
    Memory,
}

impl Metric {
    fn value(self, sample: &Sample) -> f64 {
        match self {
            Self::Cpu => f64::from(sample.cpu_percent),
            Self::Memory => f64::from(sample.memory_percent),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU Usage (%)",
            Self::Memory => "Memory Usage (%)",
        }
    }
}

fn time_axis(samples: &[Sample]) -> std::ops::Range<f64> {
    let last = samples.last().map_or(0.0, |s| s.elapsed_secs);
    0.0..last.max(1.0)
}

fn legend_line(color: RGBColor) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
}

fn draw_percent_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    caption: &str,
    y_desc: &str,
    samples: &[Sample],
    series: &[(Metric, RGBColor)],
) -> PlotResult {
    let mut chart = ChartBuilder::on(area)
        .caption(caption, (FONT_FAMILY, 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(time_axis(samples), 0.0..100.0)?;

    chart
        .configure_mesh()
        .x_desc("Time (seconds)")
        .y_desc(y_desc)
        .draw()?;

    for &(metric, color) in series {
        chart
            .draw_series(LineSeries::new(
                samples.iter().map(|s| (s.elapsed_secs, metric.value(s))),
                color.stroke_width(2),
            ))?
            .label(metric.label())
            .legend(legend_line(color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_network_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    samples: &[Sample],
) -> PlotResult {
    let (low, high) = samples
        .iter()
        .flat_map(|s| [s.net_sent_gb, s.net_recv_gb])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let (low, high) = if low.is_finite() && high - low > 1e-9 {
        (low, high)
    } else {
        let base = if low.is_finite() { low } else { 0.0 };
        (base, base + 1e-3)
    };

    let mut chart = ChartBuilder::on(area)
        .caption("Network", (FONT_FAMILY, 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(time_axis(samples), low..high)?;

    chart
        .configure_mesh()
        .x_desc("Time (seconds)")
        .y_desc("Network (GB)")
        .y_label_formatter(&|gb| format!("{gb:.3}"))
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            samples.iter().map(|s| (s.elapsed_secs, s.net_sent_gb)),
            GREEN.stroke_width(2),
        ))?
        .label("Network Sent (GB)")
        .legend(legend_line(GREEN));
    chart
        .draw_series(LineSeries::new(
            samples.iter().map(|s| (s.elapsed_secs, s.net_recv_gb)),
            MAGENTA.stroke_width(2),
        ))?
        .label("Network Received (GB)")
        .legend(legend_line(MAGENTA));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Sample> {
        (0..10u32)
            .map(|i| Sample {
                elapsed_secs: f64::from(i + 1),
                cpu_percent: 5.0 * f32::from(u8::try_from(i).unwrap()),
                memory_percent: 40.0,
                net_sent_gb: 1.0 + f64::from(i) * 0.01,
                net_recv_gb: 2.0,
            })
            .collect()
    }

    fn assert_png(path: &Path) {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"), "not a PNG: {}", path.display());
    }

    #[test]
    fn test_bundled_font_registers() {
        ensure_font().unwrap();
        ensure_font().unwrap();
    }

    #[test]
    fn test_draw_usage_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4_plot.png");
        draw_usage(&path, "clip.mp4", &samples()).unwrap();
        assert_png(&path);
    }

    #[test]
    fn test_draw_performance_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4_performance.png");
        draw_performance(&path, "clip.mp4", &samples()).unwrap();
        assert_png(&path);
    }

    #[test]
    fn test_single_flat_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");
        draw_performance(&path, "flat.mp4", &samples()[..1]).unwrap();
        assert_png(&path);
    }
}
