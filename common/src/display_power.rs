use log::debug;

pub const DEFAULT_GRACE_MS: u64 = 10_000;

/// Display power-down decision. Timestamps are monotonic milliseconds; only their
/// difference is used, so counter wrap-around is harmless.
pub fn should_be_off(
    now_ms: u64,
    last_activity_ms: u64,
    timeout_minutes: u16,
    is_quiet_now: bool,
) -> bool {
    should_be_off_with_grace(
        now_ms,
        last_activity_ms,
        timeout_minutes,
        is_quiet_now,
        DEFAULT_GRACE_MS,
    )
}

pub fn should_be_off_with_grace(
    now_ms: u64,
    last_activity_ms: u64,
    timeout_minutes: u16,
    is_quiet_now: bool,
    grace_ms: u64,
) -> bool {
    let idle_ms = now_ms.wrapping_sub(last_activity_ms);
    if idle_ms < grace_ms {
        return false;
    }

    let timed_out = timeout_minutes > 0 && idle_ms > u64::from(timeout_minutes) * 60_000;
    timed_out || is_quiet_now
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEdge {
    TurnOff,
    TurnOn,
}

/// Tracks the applied on/off state so power changes are issued once per edge.
#[derive(Debug, Clone, Default)]
pub struct DisplayPower {
    is_off: bool,
}

impl DisplayPower {
    pub fn is_off(&self) -> bool {
        self.is_off
    }

    /// Applies a policy decision. Only the on-to-off edge is taken here; waking is
    /// driven by activity through [`DisplayPower::wake`].
    pub fn apply(&mut self, should_be_off: bool) -> Option<PowerEdge> {
        if should_be_off && !self.is_off {
            self.is_off = true;
            debug!("display powered down");
            return Some(PowerEdge::TurnOff);
        }
        None
    }

    pub fn wake(&mut self) -> Option<PowerEdge> {
        if self.is_off {
            self.is_off = false;
            debug!("display woken by activity");
            return Some(PowerEdge::TurnOn);
        }
        None
    }
}
