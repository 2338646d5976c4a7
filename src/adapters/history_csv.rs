//! CSV history log adapter.
//!
//! Implements [`HistoryPort`] with one CSV file per local calendar day:
//!
//! ```text
//!   <dir>/incubator_2026-10-17.csv
//!   timestamp,temperature,humidity,heater1_on,heater2_on,humidifier_on,target_temperature,target_humidity
//!   2026-10-17 08:00:00,99.4,55.1,1,0,1,99.5,55.0
//! ```
//!
//! Retention works on whole files: a file is removed once its date is
//! older than the retention window.  Every file operation runs under one
//! lock, so the supervisor's append never interleaves with a dashboard
//! query or a purge.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::app::ports::{Clock, HistoryPort, TelemetryRecord};
use crate::error::HistoryError;

pub const HEADER: &str = "timestamp,temperature,humidity,heater1_on,heater2_on,humidifier_on,target_temperature,target_humidity";

const FILE_PREFIX: &str = "incubator_";
const FILE_SUFFIX: &str = ".csv";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Longest window [`CsvHistoryLog::recent`] will read.
pub const MAX_QUERY_DAYS: u32 = 21;

/// Column-oriented history, as charted by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySeries {
    /// Seconds since the Unix epoch.
    pub timestamp: Vec<i64>,
    pub temperature: Vec<f32>,
    pub humidity: Vec<f32>,
    pub heater1_on: Vec<bool>,
    pub heater2_on: Vec<bool>,
    pub humidifier_on: Vec<bool>,
    pub target_temperature: Vec<f32>,
    pub target_humidity: Vec<f32>,
}

impl HistorySeries {
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }
}

pub struct CsvHistoryLog {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl CsvHistoryLog {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created data directory: {}", dir.display());
        }
        Ok(Self {
            dir,
            clock,
            lock: Mutex::new(()),
        })
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format(DATE_FORMAT)))
    }

    /// Rows from the last `days` daily files, oldest first, optionally
    /// thinned so consecutive samples are at least `interval_minutes`
    /// apart.  `days` outside `1..=21` falls back to 1; an interval of 0
    /// keeps every row.  Malformed rows are skipped.
    pub fn recent(&self, days: u32, interval_minutes: u32) -> Result<HistorySeries, HistoryError> {
        let days = if (1..=MAX_QUERY_DAYS).contains(&days) {
            days
        } else {
            1
        };
        let today = local_now(self.clock.as_ref()).date();

        let mut rows = Vec::new();
        {
            let _guard = self.lock.lock();
            for back in 0..days {
                let Some(date) = today.checked_sub_days(chrono::Days::new(u64::from(back))) else {
                    continue;
                };
                let path = self.file_for(date);
                if !path.exists() {
                    continue;
                }
                let reader = BufReader::new(fs::File::open(&path)?);
                for line in reader.lines().skip(1) {
                    rows.push(line?);
                }
            }
        }

        // Fixed-width timestamps sort lexically.
        rows.sort();

        let mut series = HistorySeries::default();
        let mut last_sample: Option<NaiveDateTime> = None;
        let min_gap = chrono::Duration::minutes(i64::from(interval_minutes));

        for row in &rows {
            let parsed = match parse_row(row) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Error processing data row: {}", e);
                    continue;
                }
            };
            if interval_minutes > 0 {
                if let Some(last) = last_sample {
                    if parsed.at - last < min_gap {
                        continue;
                    }
                }
                last_sample = Some(parsed.at);
            }
            let epoch = Local
                .from_local_datetime(&parsed.at)
                .earliest()
                .map_or_else(|| parsed.at.and_utc().timestamp(), |dt| dt.timestamp());

            series.timestamp.push(epoch);
            series.temperature.push(parsed.temperature);
            series.humidity.push(parsed.humidity);
            series.heater1_on.push(parsed.heater1_on);
            series.heater2_on.push(parsed.heater2_on);
            series.humidifier_on.push(parsed.humidifier_on);
            series.target_temperature.push(parsed.target_temperature);
            series.target_humidity.push(parsed.target_humidity);
        }

        Ok(series)
    }
}

impl HistoryPort for CsvHistoryLog {
    fn record(&self, record: &TelemetryRecord) -> Result<(), HistoryError> {
        let local = record.timestamp.with_timezone(&Local);
        let path = self.file_for(local.date_naive());
        let row = format!(
            "{},{:.1},{:.1},{},{},{},{:.1},{:.1}\n",
            local.format(TIMESTAMP_FORMAT),
            record.temperature,
            record.humidity,
            flag(record.heater1_on),
            flag(record.heater2_on),
            flag(record.humidifier_on),
            record.target_temperature,
            record.target_humidity,
        );

        let _guard = self.lock.lock();
        let fresh = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if fresh {
            writeln!(file, "{HEADER}")?;
            info!("Created new data file: {}", path.display());
        }
        file.write_all(row.as_bytes())?;
        Ok(())
    }

    fn purge(&self, retention_days: u32) -> Result<usize, HistoryError> {
        let cutoff = local_now(self.clock.as_ref()) - chrono::Duration::days(i64::from(retention_days));

        let _guard = self.lock.lock();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(date_str) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };

            match NaiveDate::parse_from_str(date_str, DATE_FORMAT) {
                Ok(date) if date.and_time(NaiveTime::MIN) < cutoff => {
                    match fs::remove_file(entry.path()) {
                        Ok(()) => {
                            info!("Deleted old data file: {}", name);
                            removed += 1;
                        }
                        Err(e) => error!("Error processing file {}: {}", name, e),
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Error processing file {}: {}", name, e),
            }
        }
        Ok(removed)
    }
}

struct ParsedRow {
    at: NaiveDateTime,
    temperature: f32,
    humidity: f32,
    heater1_on: bool,
    heater2_on: bool,
    humidifier_on: bool,
    target_temperature: f32,
    target_humidity: f32,
}

fn parse_row(row: &str) -> Result<ParsedRow, String> {
    let cols: Vec<&str> = row.trim_end().split(',').collect();
    if cols.len() != 8 {
        return Err(format!("expected 8 columns, got {}", cols.len()));
    }
    let num = |i: usize| cols[i].parse::<f32>().map_err(|e| format!("column {i}: {e}"));
    let bit = |i: usize| match cols[i] {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("column {i}: not a flag: {other:?}")),
    };
    Ok(ParsedRow {
        at: NaiveDateTime::parse_from_str(cols[0], TIMESTAMP_FORMAT)
            .map_err(|e| format!("timestamp: {e}"))?,
        temperature: num(1)?,
        humidity: num(2)?,
        heater1_on: bit(3)?,
        heater2_on: bit(4)?,
        humidifier_on: bit(5)?,
        target_temperature: num(6)?,
        target_humidity: num(7)?,
    })
}

fn local_now(clock: &dyn Clock) -> NaiveDateTime {
    let now: DateTime<Utc> = clock.now();
    now.with_timezone(&Local).naive_local()
}

fn flag(on: bool) -> char {
    if on { '1' } else { '0' }
}
