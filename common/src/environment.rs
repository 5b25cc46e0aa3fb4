use crate::{config::ThresholdConfig, types::EnvironmentClass};

/// Classifies a temperature against the alert thresholds. No hysteresis band: the
/// result flips exactly at the threshold, and equality counts as normal.
pub fn classify(temperature_c: f32, thresholds: &ThresholdConfig) -> EnvironmentClass {
    if temperature_c > thresholds.high_c {
        EnvironmentClass::AlertHigh
    } else if temperature_c < thresholds.low_c {
        EnvironmentClass::AlertLow
    } else {
        EnvironmentClass::Normal
    }
}
