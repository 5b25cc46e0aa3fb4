use log::info;

use crate::types::{EnvironmentClass, MoodState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodEvent {
    Touch,
    HoldElapsed,
    Environment(EnvironmentClass),
    UpdateStarted,
    UpdateFinished,
}

/// Side effects requested by a transition. Sound gating is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoodIntent {
    TouchPulse,
    AlertPulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: MoodState,
    pub to: MoodState,
    pub intent: Option<MoodIntent>,
}

impl Transition {
    fn stay(state: MoodState) -> Self {
        Self {
            from: state,
            to: state,
            intent: None,
        }
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Pure mood transition table.
///
/// Priority: Updating beats everything; Touch beats environment; environment only
/// drives Happy/AlertHigh/AlertLow and only outside the Touched/Updating overlays.
pub fn transition(current: MoodState, event: MoodEvent) -> Transition {
    let to = match (current, event) {
        (MoodState::Updating, MoodEvent::UpdateFinished) => MoodState::Happy,
        (MoodState::Updating, _) => return Transition::stay(current),
        (_, MoodEvent::UpdateStarted) => MoodState::Updating,

        (MoodState::Touched, MoodEvent::Touch) => return Transition::stay(current),
        (_, MoodEvent::Touch) => {
            return Transition {
                from: current,
                to: MoodState::Touched,
                intent: Some(MoodIntent::TouchPulse),
            }
        }
        (MoodState::Touched, MoodEvent::HoldElapsed) => MoodState::Happy,

        (state, MoodEvent::Environment(_)) if state.is_overlay() => state,
        (_, MoodEvent::Environment(class)) => class.mood(),

        (state, MoodEvent::HoldElapsed | MoodEvent::UpdateFinished) => state,
    };

    if to == current {
        return Transition::stay(current);
    }

    let intent = matches!(to, MoodState::AlertHigh | MoodState::AlertLow)
        .then_some(MoodIntent::AlertPulse);

    Transition {
        from: current,
        to,
        intent,
    }
}

/// The stateful wrapper: current mood plus the Touched hold timer.
#[derive(Debug, Clone)]
pub struct MoodMachine {
    state: MoodState,
    touch_started_ms: Option<u64>,
    touch_hold_ms: u64,
}

impl MoodMachine {
    pub fn new(touch_hold_ms: u64) -> Self {
        Self {
            state: MoodState::Happy,
            touch_started_ms: None,
            touch_hold_ms,
        }
    }

    pub fn state(&self) -> MoodState {
        self.state
    }

    /// Feeds the touch level. Fires when the sensor is active and the machine is
    /// not already Touched.
    pub fn on_touch(&mut self, touch_active: bool, now_ms: u64) -> Option<MoodIntent> {
        if !touch_active {
            return None;
        }

        let step = self.apply(MoodEvent::Touch);
        if step.to == MoodState::Touched && step.changed() {
            self.touch_started_ms = Some(now_ms);
            info!("touch detected");
        }
        step.intent
    }

    /// Ends the Touched overlay once the hold has elapsed.
    pub fn expire_touch(&mut self, now_ms: u64) -> bool {
        let Some(started) = self.touch_started_ms else {
            return false;
        };
        if now_ms.wrapping_sub(started) < self.touch_hold_ms {
            return false;
        }

        self.touch_started_ms = None;
        self.apply(MoodEvent::HoldElapsed).changed()
    }

    pub fn on_environment(&mut self, class: EnvironmentClass) -> Option<MoodIntent> {
        let step = self.apply(MoodEvent::Environment(class));
        if step.changed() {
            match step.to {
                MoodState::AlertHigh => info!("high temperature alert"),
                MoodState::AlertLow => info!("low temperature alert"),
                _ => info!("temperature returned to normal"),
            }
        }
        step.intent
    }

    pub fn enter_updating(&mut self) -> bool {
        let changed = self.apply(MoodEvent::UpdateStarted).changed();
        if changed {
            // A running Touched hold is abandoned, not resumed.
            self.touch_started_ms = None;
            info!("entering update mode");
        }
        changed
    }

    pub fn leave_updating(&mut self) -> bool {
        let changed = self.apply(MoodEvent::UpdateFinished).changed();
        if changed {
            info!("leaving update mode");
        }
        changed
    }

    fn apply(&mut self, event: MoodEvent) -> Transition {
        let step = transition(self.state, event);
        self.state = step.to;
        step
    }
}
