//! System resource sampler
//!
//! Whole-machine CPU, memory and network counters via `sysinfo`.

use sysinfo::{Networks, System};

use super::Sample;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Keeps the `sysinfo` handles alive between samples
///
/// CPU usage is computed over the time since the previous refresh, so samples
/// should be at least `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` apart.
pub struct Sampler {
    system: System,
    networks: Networks,
}

impl Sampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // Baseline for the first CPU delta
        system.refresh_cpu();
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    pub fn sample(&mut self, elapsed_secs: f64) -> Sample {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.networks.refresh();

        let (sent, received) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(sent, received), (_, data)| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    received.saturating_add(data.total_received()),
                )
            });

        Sample {
            elapsed_secs,
            cpu_percent: one_decimal(self.system.global_cpu_info().cpu_usage()),
            memory_percent: memory_percent(
                self.system.total_memory(),
                self.system.available_memory(),
            ),
            net_sent_gb: bytes_to_gb(sent),
            net_recv_gb: bytes_to_gb(received),
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of memory in use, `(total - available) / total`, in percent
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn memory_percent(total: u64, available: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    let percent = used as f64 / total as f64 * 100.0;
    one_decimal(percent as f32)
}

/// Percentages are reported with one decimal, like the usual process monitors
fn one_decimal(percent: f32) -> f32 {
    (percent * 10.0).round() / 10.0
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_percent() {
        assert!((memory_percent(1000, 250) - 75.0).abs() < f32::EPSILON);
        assert!((memory_percent(3, 2) - 33.3).abs() < 1e-4);
        assert!((memory_percent(0, 0)).abs() < f32::EPSILON);
        // Available above total is clamped rather than negative
        assert!((memory_percent(100, 200)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cpu_rounded_to_one_decimal() {
        assert!((one_decimal(12.345_678) - 12.3).abs() < 1e-4);
        assert!((one_decimal(99.96) - 100.0).abs() < 1e-4);

        let mut sampler = Sampler::new();
        let cpu = sampler.sample(0.0).cpu_percent;
        assert!((cpu * 10.0 - (cpu * 10.0).round()).abs() < 1e-3);
    }

    #[test]
    fn test_bytes_to_gb() {
        assert!((bytes_to_gb(1024 * 1024 * 1024) - 1.0).abs() < f64::EPSILON);
        assert!((bytes_to_gb(0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_live_sample_is_in_range() {
        let mut sampler = Sampler::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let sample = sampler.sample(1.5);
        assert!((sample.elapsed_secs - 1.5).abs() < f64::EPSILON);
        assert!((0.0..=100.0).contains(&sample.memory_percent));
        assert!(sample.cpu_percent >= 0.0);
        assert!(sample.net_sent_gb >= 0.0);
        assert!(sample.net_recv_gb >= 0.0);
    }
}
