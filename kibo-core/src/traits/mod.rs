//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and hardware-specific implementations.

pub mod actuator;
pub mod audio;
pub mod sensor;

pub use actuator::{ExpressionSink, LedBus, PwmChannel};
pub use audio::{AudioCapture, AudioPlayback};
pub use sensor::{EchoRanger, LightSensor};
