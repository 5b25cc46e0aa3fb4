//! Interval timers for the cooperative control loop.
//!
//! Each timer owns its own "last fired" timestamp and is polled once per loop
//! iteration. Due-ness is an elapsed-time comparison, so the loop's idle delay only
//! changes latency, never how often a task runs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    period_ms: u64,
    last_fired_ms: u64,
}

impl IntervalTimer {
    pub fn new(period_ms: u64, start_ms: u64) -> Self {
        Self {
            period_ms,
            last_fired_ms: start_ms,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.wrapping_sub(self.last_fired_ms) >= self.period_ms
    }

    /// Marks the timer fired at `now_ms` if it was due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.is_due(now_ms) {
            self.last_fired_ms = now_ms;
            true
        } else {
            false
        }
    }
}

/// A small set of keyed interval timers, polled in registration order.
#[derive(Debug, Clone)]
pub struct TimerSet<K> {
    timers: Vec<(K, IntervalTimer)>,
}

impl<K> Default for TimerSet<K> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<K: Copy + PartialEq> TimerSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, period_ms: u64, start_ms: u64) {
        self.timers.retain(|(existing, _)| *existing != key);
        self.timers.push((key, IntervalTimer::new(period_ms, start_ms)));
    }

    /// Fires every due timer and returns their keys in registration order.
    pub fn due(&mut self, now_ms: u64) -> Vec<K> {
        self.timers
            .iter_mut()
            .filter_map(|(key, timer)| timer.poll(now_ms).then_some(*key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Job {
        Slow,
        Fast,
    }

    #[test]
    fn timer_fires_on_elapsed_time_not_poll_count() {
        let mut timer = IntervalTimer::new(5_000, 0);

        for now in (0..5_000).step_by(10) {
            assert!(!timer.poll(now));
        }
        assert!(timer.poll(5_000));
        assert!(!timer.poll(5_001));
        assert!(timer.poll(10_000));
    }

    #[test]
    fn late_poll_resets_phase_to_poll_time() {
        let mut timer = IntervalTimer::new(5_000, 0);

        assert!(timer.poll(7_500));
        assert!(!timer.poll(12_499));
        assert!(timer.poll(12_500));
    }

    #[test]
    fn set_interleaves_independent_cadences() {
        let mut timers = TimerSet::new();
        timers.add(Job::Slow, 60_000, 0);
        timers.add(Job::Fast, 5_000, 0);

        let mut fired = Vec::new();
        for now in (0..=60_000).step_by(1_000) {
            for job in timers.due(now) {
                fired.push((now, job));
            }
        }

        let fast = fired.iter().filter(|(_, job)| *job == Job::Fast).count();
        assert_eq!(fast, 12);
        assert_eq!(fired.last(), Some(&(60_000, Job::Fast)));
        assert!(fired.contains(&(60_000, Job::Slow)));

        let at_minute: Vec<Job> = fired
            .iter()
            .filter(|(now, _)| *now == 60_000)
            .map(|(_, job)| *job)
            .collect();
        assert_eq!(at_minute, vec![Job::Slow, Job::Fast]);
    }

    #[test]
    fn wrapped_clock_still_measures_elapsed() {
        let mut timer = IntervalTimer::new(1_000, u64::MAX - 500);

        assert!(!timer.poll(400));
        assert!(timer.poll(499));
    }
}
