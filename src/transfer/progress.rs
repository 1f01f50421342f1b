use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub start_time: Instant,
    pub current_speed: f64,
    pub percent_complete: f32,
    pub estimated_time_remaining: Duration,
}

/// Progress of a single upload or download. Each operation owns its own
/// tracker.
#[derive(Debug)]
pub struct ProgressTracker {
    stats: ProgressStats,
}

impl ProgressTracker {
    pub fn start(total_bytes: u64) -> Self {
        Self {
            stats: ProgressStats {
                total_bytes,
                processed_bytes: 0,
                start_time: Instant::now(),
                current_speed: 0.0,
                percent_complete: 0.0,
                estimated_time_remaining: Duration::from_secs(0),
            },
        }
    }

    pub fn update(&mut self, processed_bytes: u64) -> &ProgressStats {
        let stats = &mut self.stats;
        let processed_bytes = processed_bytes.min(stats.total_bytes);
        let elapsed_secs = stats.start_time.elapsed().as_secs_f64();

        stats.processed_bytes = processed_bytes;
        stats.current_speed = if elapsed_secs > 0.0 {
            processed_bytes as f64 / elapsed_secs
        } else {
            0.0
        };

        stats.percent_complete = if stats.total_bytes > 0 {
            (processed_bytes as f32 / stats.total_bytes as f32) * 100.0
        } else {
            100.0
        };
        let remaining_bytes = stats.total_bytes - processed_bytes;
        stats.estimated_time_remaining = if stats.current_speed > 0.0 {
            Duration::from_secs_f64(remaining_bytes as f64 / stats.current_speed)
        } else {
            Duration::from_secs(0)
        };

        &self.stats
    }

    /// Update from a completed fraction in `0.0..=1.0`, for steps whose
    /// byte count is only known proportionally (sub-chunk fetches).
    pub fn update_fraction(&mut self, fraction: f64) -> &ProgressStats {
        let fraction = fraction.clamp(0.0, 1.0);
        let processed = (self.stats.total_bytes as f64 * fraction).round() as u64;
        self.update(processed)
    }

    pub fn stats(&self) -> &ProgressStats {
        &self.stats
    }
}

pub trait ProgressFormatter {
    fn format_progress(&self) -> String;
    fn format_speed(&self) -> String;
    fn format_time_remaining(&self) -> String;
}

impl ProgressFormatter for ProgressStats {
    fn format_progress(&self) -> String {
        format!("{:5.1}% {}/{} bytes", self.percent_complete, self.processed_bytes, self.total_bytes)
    }

    fn format_speed(&self) -> String {
        const MIB: f64 = 1024.0 * 1024.0;
        match self.current_speed {
            speed if speed >= MIB => format!("{:.2} MiB/s", speed / MIB),
            speed if speed >= 1024.0 => format!("{:.1} KiB/s", speed / 1024.0),
            speed => format!("{:.0} B/s", speed),
        }
    }

    fn format_time_remaining(&self) -> String {
        let secs = self.estimated_time_remaining.as_secs();
        match (secs / 3600, secs % 3600 / 60, secs % 60) {
            (0, 0, s) => format!("eta {}s", s),
            (0, m, s) => format!("eta {}m{:02}s", m, s),
            (h, m, _) => format!("eta {}h{:02}m", h, m),
        }
    }
}
