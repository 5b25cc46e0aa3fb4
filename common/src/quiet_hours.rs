use crate::{config::QuietHoursConfig, types::LocalTime};

/// Returns true when `hour` falls inside the quiet window. A window whose start is
/// after its end spans midnight.
pub fn is_quiet(hour: u8, start_hour: u8, end_hour: u8) -> bool {
    if start_hour > end_hour {
        hour >= start_hour || hour < end_hour
    } else {
        hour >= start_hour && hour < end_hour
    }
}

impl QuietHoursConfig {
    pub fn contains(&self, hour: u8) -> bool {
        is_quiet(hour, self.start_hour, self.end_hour)
    }

    /// Fails open: without wall-clock time nothing is suppressed.
    pub fn is_quiet_at(&self, now: Option<&LocalTime>) -> bool {
        now.map(|time| self.contains(time.hour)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overnight_window() {
        let quiet: Vec<u8> = (0..24).filter(|&h| is_quiet(h, 22, 7)).collect();

        assert_eq!(quiet, vec![0, 1, 2, 3, 4, 5, 6, 22, 23]);
    }

    #[test]
    fn same_day_window() {
        let quiet: Vec<u8> = (0..24).filter(|&h| is_quiet(h, 9, 17)).collect();

        assert_eq!(quiet, (9..17).collect::<Vec<u8>>());
    }

    #[test]
    fn equal_start_and_end_is_never_quiet() {
        assert!((0..24).all(|h| !is_quiet(h, 8, 8)));
    }

    #[test]
    fn unknown_time_is_not_quiet() {
        let config = QuietHoursConfig {
            start_hour: 0,
            end_hour: 23,
        };

        assert!(!config.is_quiet_at(None));
        assert!(config.is_quiet_at(Some(&LocalTime::new(12, 0))));
    }
}
