//! Sensor input traits

/// Pulse-echo ranging front end (HC-SR04 class).
///
/// One call performs a complete measurement: emit the trigger pulse,
/// time the echo pulse width, and return it in microseconds. The
/// implementation must bound the wait internally and return `None` on
/// timeout; the poller substitutes the invalid-distance sentinel.
pub trait EchoRanger {
    fn measure_us(&mut self) -> Option<u32>;
}

/// Ambient light input.
pub trait LightSensor {
    /// Raw full-scale reading (12-bit ADC range, 0-4095)
    fn read_raw(&mut self) -> u16;
}
