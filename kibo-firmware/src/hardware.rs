//! RP2040 peripheral implementations of the core hardware traits
//!
//! - Gaze servos: one PWM slice each, 50 Hz frame, 1 µs count rate
//! - Expression matrix: WS2812 chain driven by PIO0 + DMA
//! - Microphone / light / battery: the single ADC, shared through a
//!   RefCell (everything runs on the one robot task, so borrows never
//!   overlap)
//! - Speaker: PWM carrier at ~488 kHz, 8-bit samples paced in software
//! - Ranger: HC-SR04 trigger/echo pair timed with the system clock

use core::cell::RefCell;

use embassy_futures::block_on;
use embassy_rp::adc::{Adc, Blocking, Channel as AdcChannel};
use embassy_rp::gpio::{Input, Output};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio_programs::ws2812::PioWs2812;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::{block_for, Duration, Instant};
use fixed::traits::ToFixed;
use smart_leds::RGB8;

use kibo_core::traits::{
    AudioCapture, AudioPlayback, EchoRanger, LedBus, LightSensor, PwmChannel,
};
use kibo_drivers::MATRIX_SIZE;

/// LEDs on the expression matrix
pub const LED_COUNT: usize = MATRIX_SIZE * MATRIX_SIZE;

/// Servo PWM period in 1 µs counts: a 20 ms frame
const SERVO_PWM_TOP: u16 = 20_000;

/// Microphone bytes pulled per capture call (one tick of 16 kHz audio)
const MIC_BYTES_PER_READ: usize = 160;

/// Speaker samples accepted per playback call; pacing is in software,
/// so this bounds how long one call may block the loop
const SPEAKER_SAMPLES_PER_WRITE: usize = 64;

/// Sample pacing for ~16 kHz playback
const SPEAKER_SAMPLE_PERIOD_US: u64 = 62;

// ── Gaze servos ──────────────────────────────────────────────────────

/// One servo on PWM channel A of its slice
pub struct ServoPwm {
    pwm: Pwm<'static>,
    config: PwmConfig,
}

impl ServoPwm {
    pub fn new(pwm: Pwm<'static>) -> Self {
        let mut config = PwmConfig::default();
        // 125 MHz system clock / 125 = 1 count per microsecond
        config.divider = 125.to_fixed();
        config.top = SERVO_PWM_TOP;
        config.compare_a = 0;

        let mut servo = Self { pwm, config };
        servo.pwm.set_config(&servo.config);
        servo
    }
}

impl PwmChannel for ServoPwm {
    fn set_pulse_us(&mut self, pulse_us: u16) {
        self.config.compare_a = pulse_us.min(SERVO_PWM_TOP);
        self.pwm.set_config(&self.config);
    }
}

// ── Expression matrix ────────────────────────────────────────────────

/// WS2812 chain behind the renderer's batched GRB writes
pub struct MatrixBus {
    driver: PioWs2812<'static, PIO0, 0, LED_COUNT>,
}

impl MatrixBus {
    pub fn new(driver: PioWs2812<'static, PIO0, 0, LED_COUNT>) -> Self {
        Self { driver }
    }
}

impl LedBus for MatrixBus {
    fn write(&mut self, grb: &[u8]) {
        // The renderer serializes GRB; the PIO driver re-encodes from
        // logical RGB, so unpack accordingly
        let mut colors = [RGB8::default(); LED_COUNT];
        for (color, bytes) in colors.iter_mut().zip(grb.chunks_exact(3)) {
            *color = RGB8 {
                r: bytes[1],
                g: bytes[0],
                b: bytes[2],
            };
        }
        block_on(self.driver.write(&colors));
    }
}

// ── Shared ADC front end ─────────────────────────────────────────────

/// The ADC and its three channels
pub struct AdcParts {
    pub adc: Adc<'static, Blocking>,
    pub mic: AdcChannel<'static>,
    pub light: AdcChannel<'static>,
    pub vsys: AdcChannel<'static>,
}

/// Single-task sharing of the one ADC peripheral. All users run on the
/// robot task, so the RefCell borrows never overlap.
pub struct AdcShared {
    parts: RefCell<AdcParts>,
}

impl AdcShared {
    pub fn new(parts: AdcParts) -> Self {
        Self {
            parts: RefCell::new(parts),
        }
    }
}

/// Electret microphone on an ADC channel
pub struct AdcMic {
    shared: &'static AdcShared,
}

impl AdcMic {
    pub fn new(shared: &'static AdcShared) -> Self {
        Self { shared }
    }
}

impl AudioCapture for AdcMic {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut parts = self.shared.parts.borrow_mut();
        let AdcParts { adc, mic, .. } = &mut *parts;

        let take = buf.len().min(MIC_BYTES_PER_READ);
        for byte in buf[..take].iter_mut() {
            // Mid-scale on a conversion fault keeps the stream silent
            let raw = adc.blocking_read(mic).unwrap_or(2048);
            *byte = (raw >> 4) as u8;
        }
        take
    }
}

/// Ambient light on an ADC channel
pub struct AdcLight {
    shared: &'static AdcShared,
}

impl AdcLight {
    pub fn new(shared: &'static AdcShared) -> Self {
        Self { shared }
    }
}

impl LightSensor for AdcLight {
    fn read_raw(&mut self) -> u16 {
        let mut parts = self.shared.parts.borrow_mut();
        let AdcParts { adc, light, .. } = &mut *parts;
        adc.blocking_read(light).unwrap_or(0)
    }
}

/// VSYS divider on ADC3, mapped onto a Li-ion discharge window
pub struct BatteryMonitor {
    shared: &'static AdcShared,
}

impl BatteryMonitor {
    pub fn new(shared: &'static AdcShared) -> Self {
        Self { shared }
    }

    /// Battery estimate in percent (0-100)
    pub fn percent(&mut self) -> u8 {
        let mut parts = self.shared.parts.borrow_mut();
        let AdcParts { adc, vsys, .. } = &mut *parts;

        let raw = adc.blocking_read(vsys).unwrap_or(0) as u32;
        // VSYS reaches the pin through an onboard 3:1 divider
        let millivolts = raw * 3300 * 3 / 4096;
        let clamped = millivolts.clamp(3000, 4200);
        ((clamped - 3000) * 100 / 1200) as u8
    }
}

// ── Speaker ──────────────────────────────────────────────────────────

/// PWM-DAC speaker output
///
/// TODO: move pacing to a DMA-fed ring so playback holds the full
/// 16 kHz rate instead of the bounded per-tick budget.
pub struct PwmSpeaker {
    pwm: Pwm<'static>,
    config: PwmConfig,
    volume: u8,
}

impl PwmSpeaker {
    pub fn new(pwm: Pwm<'static>) -> Self {
        let mut config = PwmConfig::default();
        // 8-bit samples; default divider gives a ~488 kHz carrier
        config.top = 255;
        config.compare_a = 0;

        let mut speaker = Self {
            pwm,
            config,
            volume: 100,
        };
        speaker.pwm.set_config(&speaker.config);
        speaker
    }
}

impl AudioPlayback for PwmSpeaker {
    fn write(&mut self, buf: &[u8]) -> usize {
        let take = buf.len().min(SPEAKER_SAMPLES_PER_WRITE);
        for &sample in &buf[..take] {
            self.config.compare_a = (sample as u32 * self.volume as u32 / 100) as u16;
            self.pwm.set_config(&self.config);
            block_for(Duration::from_micros(SPEAKER_SAMPLE_PERIOD_US));
        }
        take
    }

    fn set_volume(&mut self, percent: u8) {
        self.volume = percent.min(100);
    }
}

// ── Ultrasonic ranger ────────────────────────────────────────────────

/// HC-SR04 trigger/echo pair
pub struct HcSr04 {
    trig: Output<'static>,
    echo: Input<'static>,
    timeout_us: u32,
}

impl HcSr04 {
    pub fn new(trig: Output<'static>, echo: Input<'static>, timeout_us: u32) -> Self {
        Self {
            trig,
            echo,
            timeout_us,
        }
    }
}

impl EchoRanger for HcSr04 {
    fn measure_us(&mut self) -> Option<u32> {
        // 10 µs trigger pulse
        self.trig.set_low();
        block_for(Duration::from_micros(2));
        self.trig.set_high();
        block_for(Duration::from_micros(10));
        self.trig.set_low();

        let deadline = Instant::now() + Duration::from_micros(self.timeout_us as u64);

        // Wait for the echo to rise
        while self.echo.is_low() {
            if Instant::now() > deadline {
                return None;
            }
        }
        let rise = Instant::now();

        // Time the echo pulse width
        while self.echo.is_high() {
            if Instant::now() > deadline {
                return None;
            }
        }

        Some(rise.elapsed().as_micros() as u32)
    }
}
