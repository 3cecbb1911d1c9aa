//! Property tests for gaze servo convergence.
//!
//! Runs on host only; the embedded target never compiles dev-dependencies.

use std::cell::Cell;
use std::rc::Rc;

use kibo_core::config::ServoConfig;
use kibo_core::traits::PwmChannel;
use kibo_drivers::GazeController;
use kibo_protocol::commands::ServoId;
use proptest::prelude::*;

#[derive(Clone, Default)]
struct SharedPulse(Rc<Cell<u16>>);

impl PwmChannel for SharedPulse {
    fn set_pulse_us(&mut self, pulse_us: u16) {
        self.0.set(pulse_us);
    }
}

proptest! {
    /// From home, any (angle, speed) command converges to exactly the
    /// target pulse, monotonically, without ever overshooting, within a
    /// tick count bounded by the travel distance.
    #[test]
    fn any_target_converges_without_overshoot(
        angle in 0u16..=180,
        speed in 1u8..=100,
    ) {
        let config = ServoConfig::default();
        let pulse = SharedPulse::default();
        let mut gaze = GazeController::new(config, pulse.clone(), SharedPulse::default());

        gaze.set_angle(ServoId::Horizontal, angle, speed);

        let span = (config.max_pulse_us - config.min_pulse_us) as u32;
        let target_pulse =
            config.min_pulse_us + (span * angle as u32 / 180) as u16;
        let start_pulse = pulse.0.get();
        let upward = target_pulse >= start_pulse;

        let mut prev = start_pulse;
        let mut ticks = 0u32;
        while gaze.is_moving() {
            gaze.tick();
            let current = pulse.0.get();
            if upward {
                prop_assert!(current >= prev, "must not reverse");
                prop_assert!(current <= target_pulse, "must not overshoot");
            } else {
                prop_assert!(current <= prev, "must not reverse");
                prop_assert!(current >= target_pulse, "must not overshoot");
            }
            prev = current;
            ticks += 1;
            prop_assert!(ticks <= 1100, "convergence must be bounded");
        }

        prop_assert_eq!(pulse.0.get(), target_pulse);
        prop_assert_eq!(gaze.angles().0, angle);
    }

    /// Faster speeds never take more ticks than slower ones for the
    /// same travel.
    #[test]
    fn convergence_time_monotone_in_speed(
        angle in 0u16..=180,
        slow in 1u8..=99,
    ) {
        let fast = slow + 1;
        let ticks_at = |speed: u8| {
            let mut gaze = GazeController::new(
                ServoConfig::default(),
                SharedPulse::default(),
                SharedPulse::default(),
            );
            gaze.set_angle(ServoId::Horizontal, angle, speed);
            let mut n = 0u32;
            while gaze.is_moving() {
                gaze.tick();
                n += 1;
                if n > 1100 {
                    break;
                }
            }
            n
        };

        prop_assert!(ticks_at(fast) <= ticks_at(slow));
    }
}
