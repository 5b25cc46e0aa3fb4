use chrono::{DateTime, FixedOffset};
use log::{info, warn};

use crate::{
    alarm::AlarmScheduler,
    cadence::TimerSet,
    config::{ControllerConfig, DeviceSettings},
    display_power::{should_be_off_with_grace, DisplayPower, PowerEdge},
    environment::classify,
    error::SensorError,
    history::HistoryBuffer,
    mood::{MoodIntent, MoodMachine},
    ports::EnvironmentSensor,
    types::{
        DataPayload, HistoryEntry, HistoryPayload, LocalTime, MoodState, Reading, SensorSample,
    },
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerAction {
    Render { mood: MoodState, sample: SensorSample },
    DisplayPower(bool),
    Pulse(u32),
    Delay(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    AlarmCheck,
    SensorSample,
}

/// Inputs sampled once at the top of a loop iteration.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub now_ms: u64,
    pub local_time: Option<LocalTime>,
    pub touch_active: bool,
}

/// Owns every piece of mutable device state. Driven by exactly one loop.
#[derive(Debug, Clone)]
pub struct MochiController {
    config: ControllerConfig,
    settings: DeviceSettings,
    mood: MoodMachine,
    sample: Option<SensorSample>,
    history: HistoryBuffer,
    alarm: AlarmScheduler,
    display: DisplayPower,
    last_activity_ms: u64,
    last_rendered: Option<MoodState>,
    timers: TimerSet<Task>,
}

impl MochiController {
    pub fn new(config: ControllerConfig, mut settings: DeviceSettings, now_ms: u64) -> Self {
        settings.sanitize();

        let mut timers = TimerSet::new();
        timers.add(Task::AlarmCheck, config.alarm_check_interval_ms, now_ms);
        timers.add(Task::SensorSample, config.sensor_interval_ms, now_ms);

        Self {
            mood: MoodMachine::new(config.touch_hold_ms),
            config,
            settings,
            sample: None,
            history: HistoryBuffer::new(),
            alarm: AlarmScheduler::new(),
            display: DisplayPower::default(),
            last_activity_ms: now_ms,
            last_rendered: None,
            timers,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn current_mood(&self) -> MoodState {
        self.mood.state()
    }

    /// Latest good sample, or zeros before the first successful read.
    pub fn current_sample(&self) -> SensorSample {
        self.sample.unwrap_or_default()
    }

    pub fn sensor_valid(&self) -> bool {
        self.sample.is_some()
    }

    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }

    pub fn history_payload(&self) -> HistoryPayload {
        HistoryPayload::from_entries(&self.history.snapshot())
    }

    pub fn is_display_on(&self) -> bool {
        !self.display.is_off()
    }

    pub fn alarm_triggered_today(&self) -> bool {
        self.alarm.triggered_today()
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    pub fn data_payload(&self, now_ms: u64, local: Option<&DateTime<FixedOffset>>) -> DataPayload {
        let sample = self.current_sample();
        DataPayload {
            temp_c: sample.temperature_c,
            humidity: sample.humidity_pct,
            pressure_hpa: sample.pressure_hpa,
            state: self.mood.state().as_str(),
            sensor_valid: self.sensor_valid(),
            display_on: self.is_display_on(),
            uptime: now_ms,
            time: local
                .map(|now| now.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "No Time Sync".to_string()),
        }
    }

    /// Replaces the settings after an external save. Runtime state (mood, history,
    /// alarm flag) is kept.
    pub fn reload_settings(&mut self, mut settings: DeviceSettings) {
        settings.sanitize();
        info!(
            "settings reloaded: high={:.1}C low={:.1}C quiet={}..{} alarm={} {:02}:{:02}",
            settings.thresholds.high_c,
            settings.thresholds.low_c,
            settings.quiet_hours.start_hour,
            settings.quiet_hours.end_hour,
            settings.alarm.enabled,
            settings.alarm.hour,
            settings.alarm.minute,
        );
        self.settings = settings;
    }

    /// Mode hook for firmware-update and provisioning flows.
    pub fn enter_updating(&mut self) -> bool {
        self.mood.enter_updating()
    }

    pub fn leave_updating(&mut self) -> bool {
        let changed = self.mood.leave_updating();
        if changed {
            // The mode owner drew over the panel; repaint on the next tick.
            self.last_rendered = None;
        }
        changed
    }

    /// Startup read: refreshes the current sample without touching history or mood.
    pub fn prime<S: EnvironmentSensor>(&mut self, sensor: &mut S, now_ms: u64) {
        self.read_sensor(sensor, now_ms);
    }

    pub fn tick<S: EnvironmentSensor>(
        &mut self,
        input: &TickInput,
        sensor: &mut S,
    ) -> Vec<ControllerAction> {
        let now_ms = input.now_ms;
        let local = input.local_time.as_ref();
        let mut actions = Vec::new();

        for task in self.timers.due(now_ms) {
            match task {
                Task::AlarmCheck => self.run_alarm(now_ms, local, &mut actions),
                Task::SensorSample => self.run_sampling(now_ms, local, sensor, &mut actions),
            }
        }

        if input.touch_active {
            self.register_activity(now_ms, &mut actions);
        }
        if let Some(intent) = self.mood.on_touch(input.touch_active, now_ms) {
            self.emit(intent, local, &mut actions);
        }
        self.mood.expire_touch(now_ms);

        if self.mood.state() == MoodState::Updating {
            // The update owner holds the panel awake; the idle timer restarts on exit.
            self.register_activity(now_ms, &mut actions);
        } else {
            self.apply_display_power(now_ms, local, &mut actions);
        }

        self.redraw_if_needed(&mut actions);
        actions
    }

    fn run_alarm(
        &mut self,
        now_ms: u64,
        local: Option<&LocalTime>,
        actions: &mut Vec<ControllerAction>,
    ) {
        if !self.alarm.check(local, &self.settings.alarm) {
            return;
        }

        // Alarm sound is not subject to quiet hours or the buzzer switch.
        self.register_activity(now_ms, actions);
        for _ in 0..self.config.alarm_pulse_count {
            actions.push(ControllerAction::Pulse(self.config.alarm_pulse_on_ms));
            actions.push(ControllerAction::Delay(self.config.alarm_pulse_gap_ms));
        }
    }

    fn run_sampling<S: EnvironmentSensor>(
        &mut self,
        now_ms: u64,
        local: Option<&LocalTime>,
        sensor: &mut S,
        actions: &mut Vec<ControllerAction>,
    ) {
        self.read_sensor(sensor, now_ms);

        let Some(sample) = self.sample else {
            return;
        };

        self.history.push(HistoryEntry {
            timestamp_ms: now_ms,
            temperature_c: sample.temperature_c,
            humidity_pct: sample.humidity_pct,
        });

        if self.mood.state().is_overlay() {
            return;
        }

        let class = classify(sample.temperature_c, &self.settings.thresholds);
        if let Some(intent) = self.mood.on_environment(class) {
            self.emit(intent, local, actions);
        }
    }

    fn read_sensor<S: EnvironmentSensor>(&mut self, sensor: &mut S, now_ms: u64) {
        match sensor
            .read_environment()
            .and_then(|reading| self.check_plausible(reading))
        {
            Ok(reading) => {
                self.sample = Some(SensorSample::from_reading(reading, now_ms));
            }
            Err(err) => warn!("sensor read failed, keeping last sample: {err}"),
        }
    }

    fn check_plausible(&self, reading: Reading) -> Result<Reading, SensorError> {
        let temp = reading.temperature_c;
        let in_range = temp >= self.config.min_valid_temp_c && temp <= self.config.max_valid_temp_c;
        if !in_range || !reading.humidity_pct.is_finite() || !reading.pressure_hpa.is_finite() {
            return Err(SensorError::Implausible {
                temperature_c: temp,
            });
        }
        Ok(reading)
    }

    fn emit(
        &self,
        intent: MoodIntent,
        local: Option<&LocalTime>,
        actions: &mut Vec<ControllerAction>,
    ) {
        if !self.sound_allowed(local) {
            return;
        }
        let duration_ms = match intent {
            MoodIntent::TouchPulse => self.config.touch_pulse_ms,
            MoodIntent::AlertPulse => self.config.alert_pulse_ms,
        };
        actions.push(ControllerAction::Pulse(duration_ms));
    }

    fn sound_allowed(&self, local: Option<&LocalTime>) -> bool {
        self.settings.buzzer_enabled && !self.settings.quiet_hours.is_quiet_at(local)
    }

    fn register_activity(&mut self, now_ms: u64, actions: &mut Vec<ControllerAction>) {
        self.last_activity_ms = now_ms;
        self.wake_display(actions);
    }

    fn wake_display(&mut self, actions: &mut Vec<ControllerAction>) {
        if let Some(PowerEdge::TurnOn) = self.display.wake() {
            actions.push(ControllerAction::DisplayPower(true));
            self.last_rendered = None;
        }
    }

    fn apply_display_power(
        &mut self,
        now_ms: u64,
        local: Option<&LocalTime>,
        actions: &mut Vec<ControllerAction>,
    ) {
        let off = should_be_off_with_grace(
            now_ms,
            self.last_activity_ms,
            self.settings.display_timeout_minutes,
            self.settings.quiet_hours.is_quiet_at(local),
            self.config.display_grace_ms,
        );
        if let Some(PowerEdge::TurnOff) = self.display.apply(off) {
            actions.push(ControllerAction::DisplayPower(false));
        }
    }

    fn redraw_if_needed(&mut self, actions: &mut Vec<ControllerAction>) {
        if self.display.is_off() {
            return;
        }
        let mood = self.mood.state();
        if self.last_rendered == Some(mood) {
            return;
        }
        actions.push(ControllerAction::Render {
            mood,
            sample: self.current_sample(),
        });
        self.last_rendered = Some(mood);
    }
}
