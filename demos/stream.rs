//! Stream head orientation from the Air glasses to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let tracker = match airtrack::Tracker::start(airtrack::TrackerConfig::default()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to start tracking: {}", e);
            std::process::exit(1);
        }
    };

    println!("Tracking (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut frames: u64 = 0;
    let mut last_report = Instant::now();

    while tracker.is_running() {
        std::thread::sleep(Duration::from_millis(16)); // ~60 Hz consumer
        frames += 1;

        let q = tracker.orientation();
        let (roll, pitch, yaw) = q.euler_angles();

        // Print every ~30th frame to avoid flooding the terminal
        if frames % 30 == 1 {
            println!(
                "quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]  rpy=[{:+7.2}, {:+7.2}, {:+7.2}] deg",
                q.w,
                q.i,
                q.j,
                q.k,
                roll.to_degrees(),
                pitch.to_degrees(),
                yaw.to_degrees(),
            );
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(10) {
            println!("--- tracking for {:.0}s ---", start.elapsed().as_secs_f64());
            last_report = now;
        }
    }

    if let Some(fault) = tracker.take_fault() {
        eprintln!("Session ended with error: {}", fault);
        std::process::exit(1);
    }
}
