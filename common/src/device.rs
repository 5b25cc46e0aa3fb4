use log::info;

use crate::{
    controller::{ControllerAction, MochiController, TickInput},
    face::face,
    ports::{Buzzer, Clock, Display, EnvironmentSensor, TouchInput},
};

/// A controller wired to its hardware ports. One `Device` is driven by one loop.
pub struct Device<C, S, T, D, B> {
    controller: MochiController,
    clock: C,
    sensor: S,
    touch: T,
    display: D,
    buzzer: B,
}

impl<C, S, T, D, B> Device<C, S, T, D, B>
where
    C: Clock,
    S: EnvironmentSensor,
    T: TouchInput,
    D: Display,
    B: Buzzer,
{
    pub fn new(
        controller: MochiController,
        clock: C,
        sensor: S,
        touch: T,
        display: D,
        buzzer: B,
    ) -> Self {
        Self {
            controller,
            clock,
            sensor,
            touch,
            display,
            buzzer,
        }
    }

    pub fn controller(&self) -> &MochiController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MochiController {
        &mut self.controller
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn touch_mut(&mut self) -> &mut T {
        &mut self.touch
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    /// Boot sequence: take one reading so the first frame has real values.
    pub fn start(&mut self) {
        let now_ms = self.clock.now_ms();
        self.controller.prime(&mut self.sensor, now_ms);
        info!(
            "device '{}' started, sensor valid: {}",
            self.controller.settings().device_name,
            self.controller.sensor_valid()
        );
    }

    /// One loop iteration without the trailing idle delay.
    pub fn step(&mut self) -> Vec<ControllerAction> {
        let input = TickInput {
            now_ms: self.clock.now_ms(),
            local_time: self.clock.local_time(),
            touch_active: self.touch.is_touch_active(),
        };

        let actions = self.controller.tick(&input, &mut self.sensor);
        for action in &actions {
            self.execute(*action, input.now_ms);
        }
        actions
    }

    pub fn idle(&mut self) {
        let idle_ms = self.controller.config().loop_idle_ms;
        self.clock.sleep_ms(idle_ms);
    }

    fn execute(&mut self, action: ControllerAction, now_ms: u64) {
        match action {
            ControllerAction::Render { mood, sample } => {
                self.display.render(&face(mood, &sample, now_ms));
            }
            ControllerAction::DisplayPower(on) => self.display.set_power(on),
            ControllerAction::Pulse(duration_ms) => self.buzzer.pulse(duration_ms),
            ControllerAction::Delay(ms) => self.clock.sleep_ms(u64::from(ms)),
        }
    }
}
