use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub alarm_check_interval_ms: u64,
    pub sensor_interval_ms: u64,
    pub touch_hold_ms: u64,
    pub display_grace_ms: u64,
    pub loop_idle_ms: u64,
    pub touch_pulse_ms: u32,
    pub alert_pulse_ms: u32,
    pub alarm_pulse_count: u8,
    pub alarm_pulse_on_ms: u32,
    pub alarm_pulse_gap_ms: u32,
    pub min_valid_temp_c: f32,
    pub max_valid_temp_c: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            alarm_check_interval_ms: 60_000,
            sensor_interval_ms: 5_000,
            touch_hold_ms: 2_000,
            display_grace_ms: 10_000,
            loop_idle_ms: 10,
            touch_pulse_ms: 100,
            alert_pulse_ms: 50,
            alarm_pulse_count: 5,
            alarm_pulse_on_ms: 200,
            alarm_pulse_gap_ms: 100,
            min_valid_temp_c: -40.0,
            max_valid_temp_c: 85.0,
        }
    }
}

/// Temperature alert thresholds. Ordering is deliberately not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub high_c: f32,
    pub low_c: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_c: 30.0,
            low_c: 18.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHoursConfig {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmReset {
    /// Clear the triggered flag only on a tick that lands exactly on 00:00.
    #[default]
    MidnightEdge,
    /// Also clear it whenever the local date differs from the date the alarm last fired.
    CalendarDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub enabled: bool,
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub reset: AlarmReset,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hour: 7,
            minute: 30,
            reset: AlarmReset::MidnightEdge,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub device_name: String,
    pub thresholds: ThresholdConfig,
    pub buzzer_enabled: bool,
    pub display_timeout_minutes: u16,
    pub quiet_hours: QuietHoursConfig,
    pub alarm: AlarmConfig,
    pub timezone: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_name: "mochi".to_string(),
            thresholds: ThresholdConfig::default(),
            buzzer_enabled: true,
            display_timeout_minutes: 10,
            quiet_hours: QuietHoursConfig::default(),
            alarm: AlarmConfig::default(),
            timezone: "UTC".to_string(),
        }
    }
}

impl DeviceSettings {
    pub fn sanitize(&mut self) {
        self.quiet_hours.start_hour = self.quiet_hours.start_hour.min(23);
        self.quiet_hours.end_hour = self.quiet_hours.end_hour.min(23);
        self.alarm.hour = self.alarm.hour.min(23);
        self.alarm.minute = self.alarm.minute.min(59);

        let name = self.device_name.trim().replace(' ', "-");
        self.device_name = if name.is_empty() {
            "mochi".to_string()
        } else {
            name
        };
    }

    /// Settings arriving from a client: rejected when out of range, otherwise
    /// normalised. Stored settings go through `sanitize` alone.
    pub fn checked(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        self.sanitize();
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.thresholds.high_c.is_finite() || !self.thresholds.low_c.is_finite() {
            return Err(ConfigError::Invalid("thresholds must be finite"));
        }
        if self.quiet_hours.start_hour > 23 || self.quiet_hours.end_hour > 23 {
            return Err(ConfigError::Invalid("quiet hours must be within 0..=23"));
        }
        if self.alarm.hour > 23 || self.alarm.minute > 59 {
            return Err(ConfigError::Invalid("alarm time out of range"));
        }
        if self.timezone.trim().is_empty() {
            return Err(ConfigError::Invalid("timezone must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub settings: DeviceSettings,
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut runtime: Self = serde_json::from_slice(raw)?;
        runtime.settings.sanitize();
        Ok(runtime)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}
