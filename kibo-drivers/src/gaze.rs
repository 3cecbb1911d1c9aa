//! Gaze motion controller
//!
//! Two independent single-axis servos (pan and tilt) converge toward
//! their target angles at a commanded rate, one bounded step per
//! control-loop tick. The step is always clamped to the remaining
//! distance, so an axis approaches monotonically and never overshoots.
//!
//! # Usage
//!
//! ```ignore
//! let mut gaze = GazeController::new(ServoConfig::default(), h_pwm, v_pwm);
//! gaze.set_angle(ServoId::Horizontal, 135, 80);
//!
//! // In the control loop:
//! gaze.tick();
//! ```

use kibo_core::config::ServoConfig;
use kibo_core::traits::PwmChannel;
use kibo_protocol::commands::ServoId;

/// Full travel of each axis in degrees
pub const MAX_ANGLE: u16 = 180;

/// One gaze servo axis
#[derive(Debug, Clone, Copy)]
struct Axis {
    current_angle: u16,
    target_angle: u16,
    current_pulse: u16,
    target_pulse: u16,
    /// Commanded rate (1-100)
    speed: u8,
    moving: bool,
}

impl Axis {
    fn at(angle: u16, pulse: u16) -> Self {
        Self {
            current_angle: angle,
            target_angle: angle,
            current_pulse: pulse,
            target_pulse: pulse,
            speed: 0,
            moving: false,
        }
    }
}

/// Controller for both gaze axes
pub struct GazeController<H: PwmChannel, V: PwmChannel> {
    config: ServoConfig,
    horizontal: Axis,
    vertical: Axis,
    h_out: H,
    v_out: V,
    enabled: bool,
}

impl<H: PwmChannel, V: PwmChannel> GazeController<H, V> {
    /// Create the controller with both axes at the home angle.
    ///
    /// The home pulse is written to the hardware immediately so the
    /// mechanism does not slew from an undefined position at power-up.
    pub fn new(config: ServoConfig, mut h_out: H, mut v_out: V) -> Self {
        let home = config.home_angle.min(MAX_ANGLE);
        let pulse = angle_to_pulse(&config, home);
        h_out.set_pulse_us(pulse);
        v_out.set_pulse_us(pulse);

        Self {
            config,
            horizontal: Axis::at(home, pulse),
            vertical: Axis::at(home, pulse),
            h_out,
            v_out,
            enabled: true,
        }
    }

    /// Enable or disable motion. While disabled, commands and ticks are
    /// ignored and the axes hold position.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Command one axis toward `angle` (clamped to 180°) at `speed`
    /// (1-100; larger is faster).
    pub fn set_angle(&mut self, servo: ServoId, angle: u16, speed: u8) {
        if !self.enabled {
            return;
        }

        let angle = angle.min(MAX_ANGLE);
        let pulse = angle_to_pulse(&self.config, angle);
        let axis = self.axis_mut(servo);

        axis.target_angle = angle;
        axis.target_pulse = pulse;
        axis.speed = speed;
        axis.moving = true;
    }

    /// Aim both axes from normalized gaze coordinates in ±100.
    ///
    /// The coordinate origin is straight ahead; ±100 maps to the ends
    /// of each axis' travel. Driven at the configured home speed.
    pub fn set_gaze(&mut self, x: i16, y: i16) {
        let speed = self.config.home_speed;
        self.set_angle(ServoId::Horizontal, gaze_to_angle(x), speed);
        self.set_angle(ServoId::Vertical, gaze_to_angle(y), speed);
    }

    /// Halt one axis where it stands; the target is abandoned.
    pub fn stop(&mut self, servo: ServoId) {
        self.axis_mut(servo).moving = false;
    }

    /// Halt both axes.
    pub fn stop_all(&mut self) {
        self.horizontal.moving = false;
        self.vertical.moving = false;
    }

    /// Command both axes back to the home angle.
    pub fn home(&mut self) {
        let angle = self.config.home_angle;
        let speed = self.config.home_speed;
        self.set_angle(ServoId::Horizontal, angle, speed);
        self.set_angle(ServoId::Vertical, angle, speed);
    }

    /// Current angles as `(horizontal, vertical)`, for status reports.
    pub fn angles(&self) -> (u16, u16) {
        (self.horizontal.current_angle, self.vertical.current_angle)
    }

    /// Whether either axis is still converging
    pub fn is_moving(&self) -> bool {
        self.horizontal.moving || self.vertical.moving
    }

    /// Advance both axes one step. Called once per control-loop tick.
    pub fn tick(&mut self) {
        if !self.enabled {
            return;
        }

        if self.horizontal.moving {
            let pulse = step_axis(&self.config, &mut self.horizontal);
            self.h_out.set_pulse_us(pulse);
        }
        if self.vertical.moving {
            let pulse = step_axis(&self.config, &mut self.vertical);
            self.v_out.set_pulse_us(pulse);
        }
    }

    fn axis_mut(&mut self, servo: ServoId) -> &mut Axis {
        match servo {
            ServoId::Horizontal => &mut self.horizontal,
            ServoId::Vertical => &mut self.vertical,
        }
    }
}

/// Linear interpolation from angle to pulse width
pub fn angle_to_pulse(config: &ServoConfig, angle: u16) -> u16 {
    let angle = angle.min(MAX_ANGLE) as u32;
    let span = (config.max_pulse_us - config.min_pulse_us) as u32;
    config.min_pulse_us + (span * angle / MAX_ANGLE as u32) as u16
}

/// Inverse interpolation from pulse width to angle
pub fn pulse_to_angle(config: &ServoConfig, pulse: u16) -> u16 {
    let pulse = pulse.clamp(config.min_pulse_us, config.max_pulse_us);
    let span = (config.max_pulse_us - config.min_pulse_us) as u32;
    ((pulse - config.min_pulse_us) as u32 * MAX_ANGLE as u32 / span) as u16
}

/// Map a ±100 gaze coordinate onto 0-180°
fn gaze_to_angle(v: i16) -> u16 {
    let v = v.clamp(-100, 100) as i32;
    (90 + v * 90 / 100) as u16
}

/// One convergence step: snap when within a pulse count of 1, otherwise
/// move by `max(1, (speed+1)*10/100)` clamped to the remaining distance.
/// Returns the pulse width to write.
fn step_axis(config: &ServoConfig, axis: &mut Axis) -> u16 {
    let diff = axis.target_pulse.abs_diff(axis.current_pulse);

    if diff <= 1 {
        axis.current_pulse = axis.target_pulse;
        axis.current_angle = axis.target_angle;
        axis.moving = false;
    } else {
        let mut step = (axis.speed as u16 + 1) * 10 / 100;
        if step < 1 {
            step = 1;
        }
        if step > diff {
            step = diff;
        }

        if axis.target_pulse > axis.current_pulse {
            axis.current_pulse += step;
        } else {
            axis.current_pulse -= step;
        }

        axis.current_angle = pulse_to_angle(config, axis.current_pulse);
    }

    axis.current_pulse
}
