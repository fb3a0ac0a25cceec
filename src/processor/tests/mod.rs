//! Integration tests for the processor module
//!
//! Tests the complete station workflow (read, QC, write, report) against
//! CSV files written to temporary directories.


use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};

/// Fifteen-minute water level series with a spike at row 20 and a flat run
pub fn level_csv(points: usize) -> String {
    let mut csv = String::from("timestamp,water_level_m,rain_mm\n");
    for i in 0..points {
        let minutes = i * 15;
        let timestamp = format!(
            "2024-01-01 {:02}:{:02}:00",
            (minutes / 60) % 24,
            minutes % 60
        );
        let value = match i {
            20 => "3.40".to_string(),
            40..=47 => "1.25".to_string(),
            60 => "NA".to_string(),
            _ => format!("{:.3}", 1.0 + (i % 7) as f64 * 0.01),
        };
        csv.push_str(&format!("{},{},0.0\n", timestamp, value));
    }
    csv
}

pub fn write_station(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{}.csv", name));
    fs::write(&path, content).unwrap();
    path
}

/// Config reading `water_level_m` with small, test-friendly windows
pub fn test_config(input: PathBuf) -> Config {
    let mut config = Config::default().with_input(input).with_workers(2);
    config.data.value_column = "water_level_m".to_string();
    config.data.nominal_interval = Some("15min".to_string());
    config.qc.spike_mad.window = 5;
    config.qc.spike_mad.threshold = 3.5;
    config.qc.stuck_sensor.window = 6;
    config
}
