use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor bus error: {0}")]
    Bus(String),
    #[error("sensor not ready")]
    NotReady,
    #[error("implausible reading: {temperature_c} C")]
    Implausible { temperature_c: f32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse runtime config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(&'static str),
}
