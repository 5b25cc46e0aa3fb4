//! Hardware boundary. The controller only sees these traits; each board (or the host
//! simulator, or a test double) provides the implementations.

use crate::{
    error::SensorError,
    face::Frame,
    types::{LocalTime, Reading},
};

pub trait Clock {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Local wall-clock time, or `None` until the clock has been synchronised.
    fn local_time(&self) -> Option<LocalTime>;

    /// Blocks the control loop. Used for the idle delay and for buzzer patterns.
    fn sleep_ms(&mut self, ms: u64);
}

/// Sensor source consulted when the sampling cadence is due.
pub trait EnvironmentSensor {
    fn read_environment(&mut self) -> Result<Reading, SensorError>;
}

pub trait TouchInput {
    /// Current level of the touch pad. Edges are derived by the controller.
    fn is_touch_active(&mut self) -> bool;
}

pub trait Display {
    fn render(&mut self, frame: &Frame);
    fn set_power(&mut self, on: bool);
}

pub trait Buzzer {
    /// Sounds the buzzer for `duration_ms` and returns once it is silent again.
    fn pulse(&mut self, duration_ms: u32);
}
