//! Actuator and sensor driver logic for the Kibo companion robot
//!
//! Board-agnostic implementations of the robot's four time-sensitive
//! components, generic over the hardware traits in `kibo-core`:
//!
//! - Gaze motion controller (pan/tilt servo convergence)
//! - Expression matrix renderer (8×8 RGB "eyes")
//! - Audio I/O manager (capture and playback buffers)
//! - Range/light sensor poller
//!
//! plus the [`controller::Robot`] orchestrator that runs them all from
//! a single fixed-period control loop. Everything here is exercised by
//! host tests against mock peripherals; the firmware crate supplies the
//! real ones.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod audio;
pub mod controller;
pub mod gaze;
pub mod matrix;
pub mod sensor;

pub use audio::{AudioManager, AudioMode, AUDIO_BUFFER_CAPACITY, AUDIO_CHUNK_BYTES};
pub use controller::{Robot, BATTERY_LOW_PERCENT};
pub use gaze::GazeController;
pub use matrix::{ExpressionMatrix, MATRIX_SIZE};
pub use sensor::{SensorPoller, SensorReading, DISTANCE_INVALID};
