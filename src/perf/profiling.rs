/// Instrumentation infrastructure for the rasterization pipeline.
/// Provides lock-free function call counting; increments compile to nothing
/// unless the `profiling` feature is enabled.
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the hot pipeline stages.
pub struct FunctionCounters {
    // Geometry phase
    pub triangles_submitted: AtomicU64,
    pub triangles_clip_rejected: AtomicU64,
    pub triangles_backface_culled: AtomicU64,
    pub triangles_degenerate: AtomicU64,
    pub tile_tasks_binned: AtomicU64,

    // Pixel phase
    pub early_z_rejects: AtomicU64,
    pub samples_shaded: AtomicU64,
    pub samples_written: AtomicU64,
    pub depth_test_fails: AtomicU64,
    pub stencil_test_fails: AtomicU64,
    pub alpha_discards: AtomicU64,

    // Resolve phase
    pub pixels_resolved: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            triangles_submitted: AtomicU64::new(0),
            triangles_clip_rejected: AtomicU64::new(0),
            triangles_backface_culled: AtomicU64::new(0),
            triangles_degenerate: AtomicU64::new(0),
            tile_tasks_binned: AtomicU64::new(0),
            early_z_rejects: AtomicU64::new(0),
            samples_shaded: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            depth_test_fails: AtomicU64::new(0),
            stencil_test_fails: AtomicU64::new(0),
            alpha_discards: AtomicU64::new(0),
            pixels_resolved: AtomicU64::new(0),
        }
    }

    /// Reset all counters to zero (typically at frame start).
    pub fn reset(&self) {
        self.triangles_submitted.store(0, Ordering::Relaxed);
        self.triangles_clip_rejected.store(0, Ordering::Relaxed);
        self.triangles_backface_culled.store(0, Ordering::Relaxed);
        self.triangles_degenerate.store(0, Ordering::Relaxed);
        self.tile_tasks_binned.store(0, Ordering::Relaxed);
        self.early_z_rejects.store(0, Ordering::Relaxed);
        self.samples_shaded.store(0, Ordering::Relaxed);
        self.samples_written.store(0, Ordering::Relaxed);
        self.depth_test_fails.store(0, Ordering::Relaxed);
        self.stencil_test_fails.store(0, Ordering::Relaxed);
        self.alpha_discards.store(0, Ordering::Relaxed);
        self.pixels_resolved.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            triangles_submitted: self.triangles_submitted.load(Ordering::Relaxed),
            triangles_clip_rejected: self.triangles_clip_rejected.load(Ordering::Relaxed),
            triangles_backface_culled: self.triangles_backface_culled.load(Ordering::Relaxed),
            triangles_degenerate: self.triangles_degenerate.load(Ordering::Relaxed),
            tile_tasks_binned: self.tile_tasks_binned.load(Ordering::Relaxed),
            early_z_rejects: self.early_z_rejects.load(Ordering::Relaxed),
            samples_shaded: self.samples_shaded.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            depth_test_fails: self.depth_test_fails.load(Ordering::Relaxed),
            stencil_test_fails: self.stencil_test_fails.load(Ordering::Relaxed),
            alpha_discards: self.alpha_discards.load(Ordering::Relaxed),
            pixels_resolved: self.pixels_resolved.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    pub triangles_submitted: u64,
    pub triangles_clip_rejected: u64,
    pub triangles_backface_culled: u64,
    pub triangles_degenerate: u64,
    pub tile_tasks_binned: u64,
    pub early_z_rejects: u64,
    pub samples_shaded: u64,
    pub samples_written: u64,
    pub depth_test_fails: u64,
    pub stencil_test_fails: u64,
    pub alpha_discards: u64,
    pub pixels_resolved: u64,
}

impl CounterSnapshot {
    /// Print a formatted report.
    pub fn print_report(&self) {
        println!("\n=== Pipeline Counters Report ===");
        println!("\nGeometry Phase:");
        println!("  triangles submitted:    {:12}", self.triangles_submitted);
        println!("  clip rejected:          {:12}", self.triangles_clip_rejected);
        println!("  backface culled:        {:12}", self.triangles_backface_culled);
        println!("  degenerate skipped:     {:12}", self.triangles_degenerate);
        println!("  tile tasks binned:      {:12}", self.tile_tasks_binned);

        println!("\nPixel Phase:");
        println!("  early-Z rejects:        {:12}", self.early_z_rejects);
        println!("  samples shaded:         {:12}", self.samples_shaded);
        println!("  samples written:        {:12}", self.samples_written);
        println!("  depth test fails:       {:12}", self.depth_test_fails);
        println!("  stencil test fails:     {:12}", self.stencil_test_fails);
        println!("  alpha discards:         {:12}", self.alpha_discards);
        if self.samples_shaded > 0 {
            let write_rate = (self.samples_written as f64 / self.samples_shaded as f64) * 100.0;
            println!("  sample write rate:      {:11.2}%", write_rate);
        }

        println!("\nResolve Phase:");
        println!("  pixels resolved:        {:12}", self.pixels_resolved);

        println!();
    }
}

/// Global function counters instance.
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when the profiling feature is enabled).
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when the profiling feature is enabled).
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
