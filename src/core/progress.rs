//! Download progress and human-readable sizes

use std::time::Instant;

/// Progress of one stream download, fed from `(downloaded, total)` reports
#[derive(Debug, Clone)]
pub struct Progress {
    /// Expected size in bytes; 0 when unknown
    pub total_size: u64,
    pub downloaded_size: u64,
    /// 0.0 to 100.0; stays 0.0 while the total is unknown
    pub percent: f64,
    /// Bytes per second since start
    pub speed: Option<f64>,
    pub start_time: Instant,
}

impl Progress {
    /// Create a new progress tracker
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            downloaded_size: 0,
            percent: 0.0,
            speed: None,
            start_time: Instant::now(),
        }
    }

    /// Apply one transport report
    pub fn update(&mut self, downloaded_size: u64, total_size: u64) {
        if total_size > 0 {
            self.total_size = total_size;
        }
        self.downloaded_size = downloaded_size;
        self.percent = if self.total_size > 0 {
            (downloaded_size as f64 / self.total_size as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        if elapsed.as_millis() > 0 {
            self.speed = Some(downloaded_size as f64 / elapsed.as_secs_f64());
        }
    }

    /// Get human-readable speed string
    pub fn speed_string(&self) -> String {
        match self.speed {
            Some(speed) => format!("{}/s", format_bytes(speed as u64)),
            None => "Unknown".to_string(),
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = ((bytes_f64.ln() / THRESHOLD.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

/// Format a duration in whole seconds as `h:mm:ss` or `m:ss`
pub fn format_length(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
