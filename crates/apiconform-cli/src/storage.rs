//! Persistent report storage, `~/.apiconform/reports/`
//!
//! Every `apiconform run` is saved regardless of `--output` mode.
//! Directory layout: `{host_port}_{timestamp}/`

use std::path::PathBuf;
use std::time::SystemTime;

use apiconform_core::{RunConfig, RunReport, Verdict, to_http_file};

/// Everything needed to persist a run.
pub struct ReportData<'a> {
    pub config: &'a RunConfig,
    pub report: &'a RunReport,
    pub verdict: &'a Verdict,
    /// Session headers, for the reproduction file
    pub headers: &'a [(String, String)],
    pub duration_secs: f64,
}

/// Save a run report to `~/.apiconform/reports/{host_port}_{timestamp}/`.
///
/// Returns the report directory path on success.
pub fn save_report(data: &ReportData) -> Result<PathBuf, std::io::Error> {
    let base = report_base_dir()?;
    let report_dir = base.join(build_dir_name(&data.config.base_url));
    std::fs::create_dir_all(&report_dir)?;

    // credentials never reach disk
    let config_toml = toml::to_string_pretty(&data.config.masked())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(report_dir.join("config.toml"), config_toml)?;

    let summary = serde_json::json!({
        "verdict": {
            "status": data.verdict.status.to_string(),
            "exit_code": data.verdict.exit_code,
            "reason": data.verdict.reason,
        },
        "stats": {
            "total": data.report.total,
            "passed": data.report.passed,
            "failed": data.report.failed,
            "warnings": data.report.warnings,
        },
        "meta": {
            "timestamp": timestamp_iso(),
            "duration_secs": data.duration_secs,
            "base_url": data.report.base_url,
            "contract": data.report.contract,
            "dialect": data.report.dialect,
        },
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?,
    )?;

    std::fs::write(
        report_dir.join("results.json"),
        serde_json::to_string_pretty(&data.report.results).map_err(std::io::Error::other)?,
    )?;

    if data.report.failed > 0 {
        let http_content = to_http_file(
            data.report.failures(),
            data.headers,
            data.config.auth.is_some(),
        );
        std::fs::write(report_dir.join("reproductions.http"), http_content)?;
    }

    Ok(report_dir)
}

fn report_base_dir() -> Result<PathBuf, std::io::Error> {
    let home = std::env::var("HOME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".apiconform").join("reports"))
}

/// `{host_port}_{timestamp}` e.g. `localhost_8080_20261019T093000`
fn build_dir_name(base_url: &str) -> String {
    format!("{}_{}", extract_host_port(base_url), timestamp_compact())
}

/// `"https://localhost:8080/api/v1"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .replace(':', "_")
}

/// `"20261019T093000"`, filesystem-safe.
fn timestamp_compact() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}{mo:02}{d:02}T{h:02}{mi:02}{s:02}")
}

/// `"2026-10-19T09:30:00Z"`
fn timestamp_iso() -> String {
    let (y, mo, d, h, mi, s) = utc_now();
    format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z")
}

fn utc_now() -> (i32, u32, u32, u32, u32, u32) {
    let epoch_secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days = (epoch_secs / 86400) as i64;
    let tod = epoch_secs % 86400;
    let (y, m, d) = civil_from_days(days);
    (
        y,
        m,
        d,
        (tod / 3600) as u32,
        ((tod % 3600) / 60) as u32,
        (tod % 60) as u32,
    )
}

/// Epoch days → (year, month, day), proleptic Gregorian.
///
/// Reference: <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_host_port_standard() {
        assert_eq!(
            extract_host_port("https://localhost:8080/api/v1/finance"),
            "localhost_8080"
        );
        assert_eq!(
            extract_host_port("https://finance.example.edu"),
            "finance.example.edu"
        );
    }

    #[test]
    fn civil_from_days_epoch() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }

    #[test]
    fn civil_from_days_leap_day() {
        // 2024-02-29 = day 19782 from epoch
        assert_eq!(civil_from_days(19_782), (2024, 2, 29));
    }

    #[test]
    fn dir_name_format() {
        let name = build_dir_name("http://127.0.0.1:3000/api");
        assert!(name.starts_with("127.0.0.1_3000_"));
        let ts = name.trim_start_matches("127.0.0.1_3000_");
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "T");
    }
}
