pub mod alarm;
pub mod cadence;
pub mod config;
pub mod controller;
pub mod device;
pub mod display_power;
pub mod environment;
pub mod error;
pub mod face;
pub mod history;
pub mod mood;
pub mod ports;
pub mod quiet_hours;
pub mod raster;
pub mod sensor_codec;
pub mod types;

pub use alarm::AlarmScheduler;
pub use config::{
    AlarmConfig, AlarmReset, ControllerConfig, DeviceSettings, QuietHoursConfig, RuntimeConfig,
    ThresholdConfig,
};
pub use controller::{ControllerAction, MochiController, TickInput};
pub use device::Device;
pub use error::{ConfigError, SensorError};
pub use face::{face, Frame, Shape, TextLine};
pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use ports::{Buzzer, Clock, Display, EnvironmentSensor, TouchInput};
pub use raster::Framebuffer;
pub use types::{
    DataPayload, EnvironmentClass, HistoryEntry, HistoryPayload, LocalTime, MoodState, Reading,
    SensorSample,
};
