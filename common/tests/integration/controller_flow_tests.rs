use mochi_common::{ControllerAction, DeviceSettings, LocalTime, MoodState, SensorError};
use pretty_assertions::assert_eq;

use crate::mock_hw::{daytime_settings, device, reading, step_at, ScriptedSensor};

fn rendered_moods(actions: &[ControllerAction]) -> Vec<MoodState> {
    actions
        .iter()
        .filter_map(|action| match action {
            ControllerAction::Render { mood, .. } => Some(*mood),
            _ => None,
        })
        .collect()
}

#[test]
fn temperature_swing_alerts_once_and_recovers() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[25.0, 32.0, 32.0, 29.0]));

    let moods: Vec<MoodState> = [5_000, 10_000, 15_000, 20_000]
        .into_iter()
        .map(|now| {
            step_at(&mut device, now);
            device.controller().current_mood()
        })
        .collect();

    assert_eq!(
        moods,
        vec![
            MoodState::Happy,
            MoodState::AlertHigh,
            MoodState::AlertHigh,
            MoodState::Happy
        ]
    );
    assert_eq!(device.buzzer().pulses, vec![50]);
    assert_eq!(device.sensor_mut().reads, 4);
    assert_eq!(device.controller().history_snapshot().len(), 4);
}

#[test]
fn touch_suppresses_alert_until_hold_expires() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[32.0]));

    device.touch_mut().active = true;
    let touched = step_at(&mut device, 4_000);
    device.touch_mut().active = false;
    assert_eq!(rendered_moods(&touched), vec![MoodState::Touched]);
    assert_eq!(device.buzzer().pulses, vec![100]);

    // The sample is taken, but classification waits for the overlay to end.
    step_at(&mut device, 5_000);
    assert_eq!(device.controller().current_mood(), MoodState::Touched);
    assert_eq!(device.controller().history_snapshot().len(), 1);

    let expired = step_at(&mut device, 6_000);
    assert_eq!(rendered_moods(&expired), vec![MoodState::Happy]);

    let alert = step_at(&mut device, 10_000);
    assert_eq!(rendered_moods(&alert), vec![MoodState::AlertHigh]);
    assert_eq!(device.buzzer().pulses, vec![100, 50]);
}

#[test]
fn display_sleeps_after_timeout_and_touch_wakes_it() {
    let mut settings = daytime_settings();
    settings.display_timeout_minutes = 1;
    let mut device = device(settings, ScriptedSensor::temps(&[22.0]));

    for now in (0..=70_000).step_by(1_000) {
        step_at(&mut device, now);
    }
    assert_eq!(device.display().power, vec![false]);
    assert_eq!(device.display().frames.len(), 1);
    assert!(!device.controller().is_display_on());

    device.touch_mut().active = true;
    step_at(&mut device, 75_000);
    device.touch_mut().active = false;

    assert_eq!(device.display().power, vec![false, true]);
    assert_eq!(device.display().frames.len(), 2);
    assert_eq!(device.controller().last_activity_ms(), 75_000);

    step_at(&mut device, 77_000);
    assert_eq!(device.controller().current_mood(), MoodState::Happy);
    assert_eq!(device.display().frames.len(), 3);
}

#[test]
fn zero_timeout_keeps_display_on_outside_quiet_hours() {
    let mut settings = daytime_settings();
    settings.display_timeout_minutes = 0;
    let mut device = device(settings, ScriptedSensor::temps(&[22.0]));

    for now in (0..=3_600_000).step_by(30_000) {
        step_at(&mut device, now);
    }

    assert!(device.display().power.is_empty());
}

#[test]
fn quiet_hours_silence_and_darken_the_panel() {
    let mut device = device(DeviceSettings::default(), ScriptedSensor::temps(&[35.0]));
    device.clock_mut().local = Some(LocalTime::new(23, 0));

    step_at(&mut device, 0);
    step_at(&mut device, 5_000);
    assert_eq!(device.controller().current_mood(), MoodState::AlertHigh);
    assert!(device.buzzer().pulses.is_empty());
    assert!(device.display().power.is_empty());

    step_at(&mut device, 10_000);
    assert_eq!(device.display().power, vec![false]);

    device.touch_mut().active = true;
    step_at(&mut device, 12_000);
    device.touch_mut().active = false;
    assert_eq!(device.display().power, vec![false, true]);
    assert!(device.buzzer().pulses.is_empty());

    step_at(&mut device, 21_999);
    assert_eq!(device.display().power, vec![false, true]);
    step_at(&mut device, 22_000);
    assert_eq!(device.display().power, vec![false, true, false]);
}

#[test]
fn boot_without_sensor_reports_invalid_until_first_good_read() {
    let mut device = device(
        daytime_settings(),
        ScriptedSensor::new(vec![
            Err(SensorError::Bus("nack".to_string())),
            Err(SensorError::NotReady),
            Err(SensorError::NotReady),
            Ok(reading(31.0)),
        ]),
    );

    device.start();
    step_at(&mut device, 5_000);
    step_at(&mut device, 10_000);

    let payload = device.controller().data_payload(10_000, None);
    assert!(!payload.sensor_valid);
    assert_eq!(payload.temp_c, 0.0);
    assert!(device.controller().history_snapshot().is_empty());
    assert_eq!(device.controller().current_mood(), MoodState::Happy);

    step_at(&mut device, 15_000);
    assert!(device.controller().sensor_valid());
    assert_eq!(device.controller().history_snapshot().len(), 1);
    assert_eq!(device.controller().current_mood(), MoodState::AlertHigh);
    assert_eq!(device.buzzer().pulses, vec![50]);
}

#[test]
fn start_primes_sample_without_history() {
    let mut device = device(daytime_settings(), ScriptedSensor::temps(&[21.5]));

    device.start();

    assert!(device.controller().sensor_valid());
    assert_eq!(device.controller().current_sample().temperature_c, 21.5);
    assert!(device.controller().history_snapshot().is_empty());

    let first = step_at(&mut device, 10);
    match first.as_slice() {
        [ControllerAction::Render { mood, sample }] => {
            assert_eq!(*mood, MoodState::Happy);
            assert_eq!(sample.temperature_c, 21.5);
        }
        other => panic!("unexpected actions: {other:?}"),
    }
    assert_eq!(device.display().frames[0].text[0].text, "T:21.5C");
}

#[test]
fn alarm_wakes_dark_panel_and_plays_pattern() {
    let mut settings = DeviceSettings::default();
    settings.display_timeout_minutes = 1;
    settings.alarm.enabled = true;
    settings.alarm.hour = 7;
    settings.alarm.minute = 30;
    let mut device = device(settings, ScriptedSensor::temps(&[22.0]));
    device.clock_mut().local = Some(LocalTime::new(7, 0));

    for now in (0..=110_000).step_by(10_000) {
        step_at(&mut device, now);
    }
    assert_eq!(device.display().power, vec![false]);

    device.clock_mut().local = Some(LocalTime::new(7, 30));
    step_at(&mut device, 120_000);

    assert_eq!(device.display().power, vec![false, true]);
    assert_eq!(device.buzzer().pulses, vec![200; 5]);
    assert_eq!(device.clock().slept_ms, vec![100; 5]);
    assert_eq!(device.clock().now_ms, 120_500);
    assert!(device.controller().alarm_triggered_today());
}

#[test]
fn alarm_fires_once_per_day_with_midnight_reset() {
    let mut settings = daytime_settings();
    settings.alarm.enabled = true;
    settings.alarm.hour = 7;
    settings.alarm.minute = 30;
    let mut device = device(settings, ScriptedSensor::temps(&[22.0]));

    let schedule = [
        (60_000, LocalTime::new(7, 30)),
        (120_000, LocalTime::new(7, 30)),
        (180_000, LocalTime::new(0, 0)),
        (240_000, LocalTime::new(7, 30)),
    ];
    for (now, local) in schedule {
        device.clock_mut().local = Some(local);
        step_at(&mut device, now);
    }

    assert_eq!(device.buzzer().pulses.len(), 10);
}

#[test]
fn alarm_needs_synchronised_time() {
    let mut settings = daytime_settings();
    settings.alarm.enabled = true;
    let mut device = device(settings, ScriptedSensor::temps(&[22.0]));

    for now in (0..=600_000).step_by(60_000) {
        step_at(&mut device, now);
    }

    assert!(device.buzzer().pulses.is_empty());
    assert!(!device.controller().alarm_triggered_today());
}

#[test]
fn updating_mode_owns_the_panel() {
    let mut settings = daytime_settings();
    settings.display_timeout_minutes = 1;
    let mut device = device(settings, ScriptedSensor::temps(&[35.0]));

    assert!(device.controller_mut().enter_updating());

    device.touch_mut().active = true;
    let first = step_at(&mut device, 1_000);
    device.touch_mut().active = false;
    assert_eq!(rendered_moods(&first), vec![MoodState::Updating]);

    for now in (2_000..=90_000).step_by(1_000) {
        step_at(&mut device, now);
    }
    assert_eq!(device.controller().current_mood(), MoodState::Updating);
    assert!(device.buzzer().pulses.is_empty());
    assert!(device.display().power.is_empty());
    assert_eq!(device.display().frames.len(), 1);
    assert_eq!(device.display().frames[0].text[0].text, "OTA UPDATE");
    assert_eq!(device.controller().history_snapshot().len(), 18);

    assert!(device.controller_mut().leave_updating());
    let resumed = step_at(&mut device, 90_500);
    assert_eq!(rendered_moods(&resumed), vec![MoodState::Happy]);

    let alert = step_at(&mut device, 95_000);
    assert_eq!(rendered_moods(&alert), vec![MoodState::AlertHigh]);
    assert_eq!(device.buzzer().pulses, vec![50]);
}
