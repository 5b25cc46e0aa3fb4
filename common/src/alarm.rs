use chrono::NaiveDate;
use log::info;

use crate::{
    config::{AlarmConfig, AlarmReset},
    types::LocalTime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTick {
    pub fire: bool,
    pub triggered_today: bool,
}

/// One evaluation of the daily alarm. The midnight reset is applied first so that a
/// flag carried over from yesterday never blocks today's decision.
pub fn tick(now_hour: u8, now_minute: u8, config: &AlarmConfig, triggered_today: bool) -> AlarmTick {
    let mut triggered = triggered_today;

    if now_hour == 0 && now_minute == 0 && triggered {
        triggered = false;
    }

    let fire = config.enabled
        && now_hour == config.hour
        && now_minute == config.minute
        && !triggered;
    if fire {
        triggered = true;
    }

    AlarmTick {
        fire,
        triggered_today: triggered,
    }
}

/// Runtime-only alarm memory. Starts un-triggered on every boot.
#[derive(Debug, Clone, Default)]
pub struct AlarmScheduler {
    triggered_today: bool,
    last_fired_date: Option<NaiveDate>,
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggered_today(&self) -> bool {
        self.triggered_today
    }

    /// Returns true when the alarm should sound now. Without local time it never fires.
    pub fn check(&mut self, now: Option<&LocalTime>, config: &AlarmConfig) -> bool {
        let Some(now) = now else {
            return false;
        };

        if config.reset == AlarmReset::CalendarDate && self.triggered_today {
            if let (Some(today), Some(fired_on)) = (now.date, self.last_fired_date) {
                if today != fired_on {
                    info!("alarm flag cleared: date moved from {fired_on} to {today}");
                    self.triggered_today = false;
                }
            }
        }

        let result = tick(now.hour, now.minute, config, self.triggered_today);
        if self.triggered_today && !result.triggered_today {
            info!("alarm flag cleared at midnight");
        }
        self.triggered_today = result.triggered_today;

        if result.fire {
            self.last_fired_date = now.date;
            info!("alarm firing at {:02}:{:02}", now.hour, now.minute);
        }

        result.fire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlarmConfig {
        AlarmConfig {
            enabled: true,
            hour: 7,
            minute: 30,
            reset: AlarmReset::MidnightEdge,
        }
    }

    #[test]
    fn fires_once_until_midnight_reset() {
        let config = config();

        let first = tick(7, 30, &config, false);
        assert!(first.fire);
        assert!(first.triggered_today);

        let second = tick(7, 30, &config, first.triggered_today);
        assert!(!second.fire);
        assert!(second.triggered_today);

        let midnight = tick(0, 0, &config, second.triggered_today);
        assert!(!midnight.fire);
        assert!(!midnight.triggered_today);

        let next_day = tick(7, 30, &config, midnight.triggered_today);
        assert!(next_day.fire);
    }

    #[test]
    fn disabled_alarm_never_fires_but_still_resets() {
        let mut config = config();
        config.enabled = false;

        assert!(!tick(7, 30, &config, false).fire);
        assert!(!tick(0, 0, &config, true).triggered_today);
    }

    #[test]
    fn midnight_alarm_fires_after_reset_in_same_call() {
        let mut config = config();
        config.hour = 0;
        config.minute = 0;

        let result = tick(0, 0, &config, true);

        assert!(result.fire);
        assert!(result.triggered_today);
    }

    #[test]
    fn missing_time_never_fires() {
        let mut alarm = AlarmScheduler::new();

        assert!(!alarm.check(None, &config()));
        assert!(!alarm.triggered_today());
    }

    #[test]
    fn missed_midnight_keeps_flag_with_edge_policy() {
        let mut alarm = AlarmScheduler::new();
        let config = config();
        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        assert!(alarm.check(Some(&LocalTime::new(7, 30).with_date(day1)), &config));
        // 00:00 is never observed, e.g. the loop landed on 00:01.
        assert!(!alarm.check(Some(&LocalTime::new(0, 1).with_date(day2)), &config));
        assert!(!alarm.check(Some(&LocalTime::new(7, 30).with_date(day2)), &config));
    }

    #[test]
    fn calendar_policy_recovers_from_missed_midnight() {
        let mut alarm = AlarmScheduler::new();
        let mut config = config();
        config.reset = AlarmReset::CalendarDate;
        let day1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        assert!(alarm.check(Some(&LocalTime::new(7, 30).with_date(day1)), &config));
        assert!(!alarm.check(Some(&LocalTime::new(7, 30).with_date(day1)), &config));
        assert!(alarm.check(Some(&LocalTime::new(7, 30).with_date(day2)), &config));
    }
}
