use chrono::{FixedOffset, TimeZone};
use mochi_common::{AlarmReset, MoodState, RuntimeConfig};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::mock_hw::{daytime_settings, device, step_at, ScriptedSensor};

#[test]
fn reloaded_thresholds_apply_on_next_sample() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[16.0]));

    step_at(&mut device, 5_000);
    assert_eq!(device.controller().current_mood(), MoodState::AlertLow);

    let mut settings = device.controller().settings().clone();
    settings.thresholds.low_c = 15.0;
    device.controller_mut().reload_settings(settings);
    assert_eq!(device.controller().current_mood(), MoodState::AlertLow);

    step_at(&mut device, 10_000);
    assert_eq!(device.controller().current_mood(), MoodState::Happy);
    assert_eq!(device.buzzer().pulses, vec![50]);
}

#[test]
fn reload_disabling_buzzer_silences_later_alerts() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[22.0, 31.0]));

    step_at(&mut device, 5_000);
    let mut settings = device.controller().settings().clone();
    settings.buzzer_enabled = false;
    device.controller_mut().reload_settings(settings);
    step_at(&mut device, 10_000);

    assert_eq!(device.controller().current_mood(), MoodState::AlertHigh);
    assert!(device.buzzer().pulses.is_empty());
}

#[test]
fn stored_config_round_trips() {
    let mut runtime = RuntimeConfig::default();
    runtime.settings.device_name = "kitchen".to_string();
    runtime.settings.alarm.reset = AlarmReset::CalendarDate;

    let raw = runtime.to_json().unwrap();
    let restored = RuntimeConfig::from_json(&raw).unwrap();

    assert_eq!(restored.settings, runtime.settings);
    assert!(String::from_utf8(raw).unwrap().contains("\"calendar_date\""));
}

#[test]
fn empty_object_yields_factory_defaults() {
    let runtime = RuntimeConfig::from_json(b"{}").unwrap();

    assert_eq!(runtime.settings.device_name, "mochi");
    assert_eq!(runtime.settings.thresholds.high_c, 30.0);
    assert_eq!(runtime.settings.thresholds.low_c, 18.0);
    assert_eq!(runtime.settings.quiet_hours.start_hour, 22);
    assert_eq!(runtime.settings.quiet_hours.end_hour, 7);
    assert!(!runtime.settings.alarm.enabled);
    assert_eq!(runtime.settings.display_timeout_minutes, 10);
}

#[test]
fn data_payload_uses_dashboard_field_names() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[23.25]));
    step_at(&mut device, 5_000);

    let offset = FixedOffset::east_opt(3_600).unwrap();
    let local = offset.with_ymd_and_hms(2026, 4, 2, 9, 15, 0).unwrap();
    let payload = device.controller().data_payload(5_000, Some(&local));

    assert_eq!(
        serde_json::to_value(&payload).unwrap(),
        json!({
            "tempC": 23.25,
            "humidity": 40.0,
            "pressure_hPa": 1013.0,
            "state": "HAPPY",
            "sensorValid": true,
            "displayOn": true,
            "uptime": 5_000,
            "time": "2026-04-02 09:15:00",
        })
    );
}

#[test]
fn history_payload_is_oldest_first() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[20.0, 21.0, 22.0]));
    for now in [5_000, 10_000, 15_000] {
        step_at(&mut device, now);
    }

    let payload = device.controller().history_payload();

    assert_eq!(payload.labels, vec![5_000, 10_000, 15_000]);
    assert_eq!(payload.temps, vec![20.0, 21.0, 22.0]);
    assert_eq!(payload.hums, vec![40.0, 40.0, 40.0]);
}
