//! Colorful console output for pipeline stage timing and counts.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

/// ASCII art banner for server startup.
pub fn print_banner() {
    let banner = r#"
  _____ _                      ____             _
 |  ___| |_   _  ___ _ __     |  _ \ ___  _   _| |_ ___ _ __
 | |_  | | | | |/ _ \ '__|____| |_) / _ \| | | | __/ _ \ '__|
 |  _| | | |_| |  __/ | |_____|  _ < (_) | |_| | ||  __/ |
 |_|   |_|\__, |\___|_|       |_| \_\___/ \__,_|\__\___|_|
          |___/
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Flyer Route Planner".bright_cyan()
    );
}

/// Prints a pipeline stage start message.
pub fn print_stage_start(stage_name: &str) {
    println!(
        "{} {} {} stage started",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", stage_name).bright_cyan(),
    );
}

/// Prints a pipeline stage end message with duration and an item count
/// (edges ingested, zones produced, routes generated, etc).
pub fn print_stage_end(stage_name: &str, duration: Duration, item_count: usize, item_label: &str) {
    println!(
        "{} {} {} stage ended: time spent ({}), {} ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[{}]", stage_name).bright_cyan(),
        format_duration(duration).yellow(),
        item_label,
        item_count.to_formatted_string(&Locale::en).bright_magenta().bold(),
    );
}

/// Prints a recovered provider failure at warn level.
pub fn print_provider_fallback(detail: &str) {
    println!(
        "{} {} {} {}",
        timestamp().bright_black(),
        "WARN".bright_yellow(),
        "[Provider]".bright_cyan(),
        detail.yellow(),
    );
}

/// Prints the final job summary box.
pub fn print_job_summary(job_id: &str, route_count: usize, total_addresses: u64, total_distance_m: f64, total_duration_min: u64) {
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let title = format!("Job {} complete", job_id);
    let padding = 60usize.saturating_sub(title.chars().count());
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        title.bright_green().bold(),
        " ".repeat(right_pad),
        "║".bright_cyan()
    );

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());
    println!("{}  {:<22}{:>32}  {}", "║".bright_cyan(), "Routes:", route_count, "║".bright_cyan());
    println!(
        "{}  {:<22}{:>32}  {}",
        "║".bright_cyan(),
        "Est. addresses:",
        total_addresses.to_formatted_string(&Locale::en),
        "║".bright_cyan()
    );
    println!(
        "{}  {:<22}{:>32}  {}",
        "║".bright_cyan(),
        "Total distance:",
        format!("{:.1} km", total_distance_m / 1000.0),
        "║".bright_cyan()
    );
    println!(
        "{}  {:<22}{:>32}  {}",
        "║".bright_cyan(),
        "Total duration:",
        format!("{} min", total_duration_min),
        "║".bright_cyan()
    );
    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs();
            let millis = d.subsec_millis();
            format!("{}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "0.000".to_string())
}

/// A timer for tracking a single pipeline stage's duration.
pub struct StageTimer {
    start: Instant,
    stage_name: String,
}

impl StageTimer {
    pub fn start(stage_name: impl Into<String>) -> Self {
        let name = stage_name.into();
        print_stage_start(&name);
        Self { start: Instant::now(), stage_name: name }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self, item_count: usize, item_label: &str) {
        print_stage_end(&self.stage_name, self.start.elapsed(), item_count, item_label);
    }
}
