use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoodState {
    #[default]
    Happy,
    AlertHigh,
    AlertLow,
    Touched,
    Updating,
}

impl MoodState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "HAPPY",
            Self::AlertHigh => "ALERT_HIGH",
            Self::AlertLow => "ALERT_LOW",
            Self::Touched => "TOUCHED",
            Self::Updating => "UPDATING",
        }
    }

    /// Touched and Updating are overlays that suppress environment evaluation.
    pub fn is_overlay(self) -> bool {
        matches!(self, Self::Touched | Self::Updating)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentClass {
    Normal,
    AlertHigh,
    AlertLow,
}

impl EnvironmentClass {
    pub fn mood(self) -> MoodState {
        match self {
            Self::Normal => MoodState::Happy,
            Self::AlertHigh => MoodState::AlertHigh,
            Self::AlertLow => MoodState::AlertLow,
        }
    }
}

/// Raw values returned by a sensor driver, before they are stamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SensorSample {
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
    #[serde(rename = "tempC")]
    pub temperature_c: f32,
    #[serde(rename = "humidity")]
    pub humidity_pct: f32,
    #[serde(rename = "pressure_hPa")]
    pub pressure_hpa: f32,
}

impl SensorSample {
    pub fn from_reading(reading: Reading, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            temperature_c: reading.temperature_c,
            humidity_pct: reading.humidity_pct,
            pressure_hpa: reading.pressure_hpa,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HistoryEntry {
    pub timestamp_ms: u64,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl HistoryEntry {
    pub fn is_used(&self) -> bool {
        self.timestamp_ms != 0
    }
}

/// Local wall-clock time as seen by the controller. `date` is only known when the
/// clock source can supply a full calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub date: Option<NaiveDate>,
    pub hour: u8,
    pub minute: u8,
}

impl LocalTime {
    pub fn new(hour: u8, minute: u8) -> Self {
        Self {
            date: None,
            hour,
            minute,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn from_chrono(now: &DateTime<FixedOffset>) -> Self {
        Self {
            date: Some(now.date_naive()),
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataPayload {
    #[serde(rename = "tempC")]
    pub temp_c: f32,
    pub humidity: f32,
    #[serde(rename = "pressure_hPa")]
    pub pressure_hpa: f32,
    pub state: &'static str,
    #[serde(rename = "sensorValid")]
    pub sensor_valid: bool,
    #[serde(rename = "displayOn")]
    pub display_on: bool,
    pub uptime: u64,
    pub time: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HistoryPayload {
    pub labels: Vec<u64>,
    pub temps: Vec<f32>,
    pub hums: Vec<f32>,
}

impl HistoryPayload {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut payload = Self::default();
        for entry in entries {
            payload.labels.push(entry.timestamp_ms);
            payload.temps.push(entry.temperature_c);
            payload.hums.push(entry.humidity_pct);
        }
        payload
    }
}
