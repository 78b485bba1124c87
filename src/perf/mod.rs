/// Performance measurement utilities.
/// Each frame phase (clip/bin, raster, resolve) can be timed and counted
/// for optimization analysis.
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        println!("[PERF] {}: {:.2}μs", self.name, elapsed.as_micros());
    }
}

/// Per-frame phase timings accumulated by the device.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clip_bin_us: f64,
    pub raster_us: f64,
    pub resolve_us: f64,
}

impl FrameStats {
    pub fn total_us(&self) -> f64 {
        self.clip_bin_us + self.raster_us + self.resolve_us
    }

    pub fn print_summary(&self) {
        let total = self.total_us().max(f64::EPSILON);
        println!("\n========== FRAME SUMMARY ==========");
        println!(
            "Clip + Bin:      {:8.2}μs ({:5.1}%)",
            self.clip_bin_us,
            (self.clip_bin_us / total) * 100.0
        );
        println!(
            "Rasterization:   {:8.2}μs ({:5.1}%)",
            self.raster_us,
            (self.raster_us / total) * 100.0
        );
        println!(
            "MSAA Resolve:    {:8.2}μs ({:5.1}%)",
            self.resolve_us,
            (self.resolve_us / total) * 100.0
        );
        println!("───────────────────────────────────");
        println!("Total:           {:8.2}μs", self.total_us());
        println!("===================================\n");
    }
}

/// Macro for easy performance measurement of a scope.
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
