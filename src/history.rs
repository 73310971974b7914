//! Detection log
//!
//! Every detection the server runs is appended here, including failures and
//! empty results, together with whatever the vehicle registry knew about the
//! plate at that moment. The log answers the history, search, statistics and
//! export endpoints. It is bounded: once `capacity` entries are held the
//! oldest are dropped.

use crate::record::{DetectionRecord, DetectionStatus};
use crate::vehicles::Vehicle;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write;
use std::sync::{PoisonError, RwLock};

/// Column order of the CSV export
pub const CSV_HEADER: &str = "Number Plate,Date,Time,Confidence,Vehicle Model,Owner Name,Color,Status,Image Filename,Timestamp";

/// How many plates the statistics rank
const FREQUENT_PLATES: usize = 5;

/// A detection record with the vehicle details known at detection time
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub record: DetectionRecord,
    pub owner_name: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl LogEntry {
    pub fn new(record: DetectionRecord, vehicle: Option<&Vehicle>) -> Self {
        Self {
            record,
            owner_name: vehicle.map(|v| v.owner_name.clone()),
            model: vehicle.and_then(|v| v.model.clone()),
            color: vehicle.and_then(|v| v.color.clone()),
        }
    }

    /// Calendar day of the detection (UTC)
    pub fn date(&self) -> NaiveDate {
        self.record.timestamp.date_naive()
    }

    fn is_detected(&self) -> bool {
        self.record.status == DetectionStatus::Detected
    }
}

/// Filters for [`DetectionLog::search`]; empty fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    /// Case-insensitive substring of the plate
    #[serde(default)]
    pub plate: String,
    /// Exact day, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Case-insensitive substring of the owner name
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub fn default_limit() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateCount {
    pub plate: String,
    pub count: usize,
}

/// Aggregate figures over the whole log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total_detections: usize,
    /// Distinct plates among successful detections
    pub unique_plates: usize,
    pub today_detections: usize,
    /// Most detected plates, highest count first; ties keep first-seen order
    pub frequent_plates: Vec<PlateCount>,
    pub first_detection_date: Option<NaiveDate>,
    pub last_detection_date: Option<NaiveDate>,
}

pub struct DetectionLog {
    entries: RwLock<VecDeque<LogEntry>>,
    capacity: usize,
}

impl DetectionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&self, entry: LogEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest entries first
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.read(|entries| entries.iter().rev().take(limit).cloned().collect())
    }

    /// Latest successful detections first
    pub fn history(&self, limit: usize) -> Vec<LogEntry> {
        self.read(|entries| {
            entries
                .iter()
                .rev()
                .filter(|e| e.is_detected())
                .take(limit)
                .cloned()
                .collect()
        })
    }

    /// First `query.limit` matching entries in log order
    pub fn search(&self, query: &LogQuery) -> Vec<LogEntry> {
        let plate = query.plate.trim().to_lowercase();
        let owner = query.owner.trim().to_lowercase();
        let date = query.date.trim();

        self.read(|entries| {
            entries
                .iter()
                .filter(|e| plate.is_empty() || e.record.plate.to_lowercase().contains(&plate))
                .filter(|e| date.is_empty() || e.date().format("%Y-%m-%d").to_string() == date)
                .filter(|e| {
                    owner.is_empty()
                        || e.owner_name
                            .as_deref()
                            .is_some_and(|o| o.to_lowercase().contains(&owner))
                })
                .take(query.limit)
                .cloned()
                .collect()
        })
    }

    pub fn stats(&self, today: NaiveDate) -> LogStats {
        self.read(|entries| {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            let mut first_seen: Vec<&str> = Vec::new();
            for entry in entries.iter().filter(|e| e.is_detected()) {
                let count = counts.entry(entry.record.plate.as_str()).or_insert(0);
                if *count == 0 {
                    first_seen.push(entry.record.plate.as_str());
                }
                *count += 1;
            }

            let mut frequent: Vec<PlateCount> = first_seen
                .iter()
                .map(|plate| PlateCount {
                    plate: plate.to_string(),
                    count: counts[plate],
                })
                .collect();
            // Stable sort keeps first-seen order on equal counts
            frequent.sort_by(|a, b| b.count.cmp(&a.count));
            frequent.truncate(FREQUENT_PLATES);

            LogStats {
                total_detections: entries.len(),
                unique_plates: counts.len(),
                today_detections: entries.iter().filter(|e| e.date() == today).count(),
                frequent_plates: frequent,
                first_detection_date: entries.iter().map(LogEntry::date).min(),
                last_detection_date: entries.iter().map(LogEntry::date).max(),
            }
        })
    }

    /// Whole log as CSV, oldest entry first
    pub fn export_csv(&self) -> String {
        self.read(|entries| {
            let mut out = String::with_capacity(CSV_HEADER.len() + 1 + entries.len() * 96);
            out.push_str(CSV_HEADER);
            out.push('\n');
            for entry in entries {
                let record = &entry.record;
                let fields = [
                    record.plate.clone(),
                    record.timestamp.format("%Y-%m-%d").to_string(),
                    record.timestamp.format("%H:%M:%S").to_string(),
                    format!("{:.2}", record.confidence),
                    entry.model.clone().unwrap_or_default(),
                    entry.owner_name.clone().unwrap_or_default(),
                    entry.color.clone().unwrap_or_default(),
                    record.status.as_str().to_string(),
                    record.image_reference.clone(),
                    record.timestamp.to_rfc3339(),
                ];
                let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
                // Writing to a String cannot fail
                let _ = writeln!(out, "{}", row.join(","));
            }
            out
        })
    }

    /// Drop entries dated before `cutoff`; returns how many were removed
    pub fn remove_before(&self, cutoff: NaiveDate) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.date() >= cutoff);
        before - entries.len()
    }

    fn read<T>(&self, f: impl FnOnce(&VecDeque<LogEntry>) -> T) -> T {
        f(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Quote a CSV field when it holds a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
