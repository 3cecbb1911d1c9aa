//! Actuator output traits
//!
//! The motion controller writes servo pulse widths through
//! [`PwmChannel`]; the expression renderer pushes whole LED frames
//! through [`LedBus`]. Both are fire-and-forget outputs: errors at this
//! level are hardware faults the drivers cannot recover from, so the
//! implementations absorb them.

/// A PWM output driving one servo axis.
///
/// Implementations convert the pulse width (high time per 20 ms period)
/// into whatever duty representation the timer hardware uses.
pub trait PwmChannel {
    /// Set the pulse high-time in microseconds
    fn set_pulse_us(&mut self, pulse_us: u16);
}

/// An addressable-LED bus accepting one complete frame per write.
///
/// The renderer hands over the full grid as a GRB byte stream (three
/// bytes per pixel, row-major) in a single batched call.
pub trait LedBus {
    fn write(&mut self, grb: &[u8]);
}

/// Consumer of expression ids, implemented by the expression renderer.
///
/// This is the seam between the interaction state machine (which decides
/// *what* face to show) and the renderer (which decides *how*): the
/// machine stays testable against a mock without pulling in the grid.
pub trait ExpressionSink {
    fn show_expression(&mut self, expression: u8);
}
