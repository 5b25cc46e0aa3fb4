//! Recording test doubles for every hardware port.

use std::collections::VecDeque;

use mochi_common::{
    Buzzer, Clock, ControllerConfig, DeviceSettings, Display, EnvironmentSensor, Frame, LocalTime,
    MochiController, Reading, SensorError, TouchInput,
};

pub type MockDevice =
    mochi_common::Device<MockClock, ScriptedSensor, MockTouch, MockDisplay, MockBuzzer>;

pub struct MockClock {
    pub now_ms: u64,
    pub local: Option<LocalTime>,
    pub slept_ms: Vec<u64>,
}

impl MockClock {
    pub fn at(now_ms: u64) -> Self {
        Self {
            now_ms,
            local: None,
            slept_ms: Vec::new(),
        }
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn local_time(&self) -> Option<LocalTime> {
        self.local
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.slept_ms.push(ms);
        self.now_ms += ms;
    }
}

/// Plays back a script of results; the last one repeats forever.
pub struct ScriptedSensor {
    script: VecDeque<Result<Reading, SensorError>>,
    pub reads: usize,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn temps(temps: &[f32]) -> Self {
        Self::new(temps.iter().map(|t| Ok(reading(*t))).collect())
    }

    pub fn new(script: Vec<Result<Reading, SensorError>>) -> Self {
        Self {
            script: script.into(),
            reads: 0,
        }
    }

    pub fn push(&mut self, result: Result<Reading, SensorError>) {
        self.script.push_back(result);
    }
}

impl EnvironmentSensor for ScriptedSensor {
    fn read_environment(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        if self.script.len() > 1 {
            if let Some(next) = self.script.pop_front() {
                return next;
            }
        }
        match self.script.front() {
            Some(Ok(reading)) => Ok(*reading),
            Some(Err(_)) | None => Err(SensorError::NotReady),
        }
    }
}

pub fn reading(temperature_c: f32) -> Reading {
    Reading {
        temperature_c,
        humidity_pct: 40.0,
        pressure_hpa: 1013.0,
    }
}

#[derive(Default)]
pub struct MockTouch {
    pub active: bool,
}

impl TouchInput for MockTouch {
    fn is_touch_active(&mut self) -> bool {
        self.active
    }
}

#[derive(Default)]
pub struct MockDisplay {
    pub frames: Vec<Frame>,
    pub power: Vec<bool>,
}

impl Display for MockDisplay {
    fn render(&mut self, frame: &Frame) {
        self.frames.push(frame.clone());
    }

    fn set_power(&mut self, on: bool) {
        self.power.push(on);
    }
}

#[derive(Default)]
pub struct MockBuzzer {
    pub pulses: Vec<u32>,
}

impl Buzzer for MockBuzzer {
    fn pulse(&mut self, duration_ms: u32) {
        self.pulses.push(duration_ms);
    }
}

/// Settings with the quiet window disabled so sound is never suppressed.
pub fn daytime_settings() -> DeviceSettings {
    let mut settings = DeviceSettings::default();
    settings.quiet_hours.start_hour = 0;
    settings.quiet_hours.end_hour = 0;
    settings
}

pub fn device(settings: DeviceSettings, sensor: ScriptedSensor) -> MockDevice {
    mochi_common::Device::new(
        MochiController::new(ControllerConfig::default(), settings, 0),
        MockClock::at(0),
        sensor,
        MockTouch::default(),
        MockDisplay::default(),
        MockBuzzer::default(),
    )
}

/// Steps the device at `now_ms` and returns the executed actions.
pub fn step_at(device: &mut MockDevice, now_ms: u64) -> Vec<mochi_common::ControllerAction> {
    device.clock_mut().now_ms = now_ms;
    device.step()
}
