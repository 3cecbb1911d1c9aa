//! Robot control loop
//!
//! Ties the protocol engine, state machine, and the four actuator/sensor
//! components together. One [`Robot::tick`] call per loop iteration, in
//! a fixed order: feed inbound bytes, drain the outbound queue, then
//! tick the state machine, motion controller, renderer, audio manager,
//! and sensor poller. Each component owns its state exclusively; the
//! only structure shared between them is the outbound frame queue.
//!
//! Command handlers are associated functions over [`Components`],
//! registered with the engine's dispatch table at construction.

use kibo_core::config::RobotConfig;
use kibo_core::state::InteractionMachine;
use kibo_core::traits::{
    AudioCapture, AudioPlayback, EchoRanger, LedBus, LightSensor, PwmChannel,
};
use kibo_protocol::commands::{
    CommandError, Component, ErrorCode, HostCommand, RobotReport, RobotState, Status,
    CMD_CAMERA_CONTROL, CMD_GET_STATUS, CMD_HEARTBEAT, CMD_PLAY_AUDIO, CMD_RECORD_CONTROL,
    CMD_SET_EXPRESSION, CMD_SET_GAZE, CMD_SET_SERVO, CMD_SET_STATE,
};
use kibo_protocol::engine::{ProtocolEngine, TxQueue};

use crate::audio::{AudioManager, SAMPLE_RATE_HZ};
use crate::gaze::GazeController;
use crate::matrix::ExpressionMatrix;
use crate::sensor::SensorPoller;

/// Battery percentage below which a BatteryLow report is pushed
pub const BATTERY_LOW_PERCENT: u8 = 10;

/// Recorded audio bytes pushed to the host per tick
pub const RECORD_PUSH_CHUNK: usize = 512;

/// Progress of a recorded-audio push toward the host
#[derive(Debug, Clone, Copy)]
struct RecordFlush {
    pos: usize,
    timestamp_s: u32,
}

/// True once `now` has reached the deadline, tolerant of the tick
/// counter wrapping
fn deadline_passed(now_ms: u32, deadline_ms: u32) -> bool {
    now_ms.wrapping_sub(deadline_ms) < u32::MAX / 2
}

/// Everything the command handlers may touch. The protocol engine holds
/// the dispatch table and threads a `&mut Components` through to each
/// handler alongside the outbound queue.
pub struct Components<H, V, B, I, O, R, L>
where
    H: PwmChannel,
    V: PwmChannel,
    B: LedBus,
    I: AudioCapture,
    O: AudioPlayback,
    R: EchoRanger,
    L: LightSensor,
{
    pub state: InteractionMachine,
    pub gaze: GazeController<H, V>,
    pub matrix: ExpressionMatrix<B>,
    pub audio: AudioManager<I, O>,
    pub sensor: SensorPoller<R, L>,
    /// Loop time, refreshed at the top of every tick so handlers see a
    /// consistent timestamp
    now_ms: u32,
    /// Platform-supplied free heap estimate for heartbeat replies
    free_mem: u32,
    battery_low_reported: bool,
    expression_override_until: Option<u32>,
    record_deadline_ms: Option<u32>,
    record_flush: Option<RecordFlush>,
}

impl<H, V, B, I, O, R, L> Components<H, V, B, I, O, R, L>
where
    H: PwmChannel,
    V: PwmChannel,
    B: LedBus,
    I: AudioCapture,
    O: AudioPlayback,
    R: EchoRanger,
    L: LightSensor,
{
    /// State transition plus the bookkeeping a transition implies
    fn transition_to(&mut self, new_state: RobotState, tx: &mut TxQueue) {
        let now = self.now_ms;
        self.state.transition(new_state, now, &mut self.matrix, tx);
        // Canonical expression takes over; any override lapses
        self.expression_override_until = None;
    }

    /// Freeze the current recording and stage it for pushing
    fn finish_recording(&mut self) {
        if self.audio.is_recording() {
            self.audio.stop_recording();
            if !self.audio.recorded().is_empty() {
                self.record_flush = Some(RecordFlush {
                    pos: 0,
                    timestamp_s: self.now_ms / 1000,
                });
            }
        }
        self.record_deadline_ms = None;
    }

    // ── Command handlers ──────────────────────────────────────────────
    //
    // Malformed payloads are dropped without a reply; the host's own
    // timeout handles the silence.

    fn on_heartbeat(c: &mut Self, tx: &mut TxQueue, _payload: &[u8]) {
        let report = RobotReport::Heartbeat {
            uptime_s: c.now_ms / 1000,
            free_mem: c.free_mem,
        };
        if let Ok(frame) = report.to_frame() {
            tx.send(frame);
        }
    }

    fn on_set_expression(c: &mut Self, _tx: &mut TxQueue, payload: &[u8]) {
        if let Ok(HostCommand::SetExpression {
            expression,
            brightness,
            duration_ms,
        }) = HostCommand::parse(CMD_SET_EXPRESSION, payload)
        {
            c.matrix.set_brightness(brightness);
            c.matrix.set_expression(expression);
            c.state.set_expression_override(expression);
            c.expression_override_until = if duration_ms > 0 {
                Some(c.now_ms.wrapping_add(duration_ms as u32))
            } else {
                None
            };
        }
    }

    fn on_set_servo(c: &mut Self, tx: &mut TxQueue, payload: &[u8]) {
        match HostCommand::parse(CMD_SET_SERVO, payload) {
            Ok(HostCommand::SetServo { servo, angle, speed }) => {
                let speed = speed.clamp(1, 100) as u8;
                c.gaze.set_angle(servo, angle, speed);
                if let Ok(frame) = (RobotReport::ServoAck { accepted: true }).to_frame() {
                    tx.send(frame);
                }
            }
            Err(CommandError::InvalidField) => {
                // Bad servo id: explicit rejection so the host can tell
                // it apart from a lost frame
                if let Ok(frame) = (RobotReport::ServoAck { accepted: false }).to_frame() {
                    tx.send(frame);
                }
            }
            _ => {}
        }
    }

    fn on_play_audio(c: &mut Self, _tx: &mut TxQueue, payload: &[u8]) {
        if let Ok(HostCommand::PlayAudio { pcm, .. }) = HostCommand::parse(CMD_PLAY_AUDIO, payload)
        {
            // Format and rate fields are informational; the codec path
            // is fixed-function on this hardware
            c.audio.play(pcm);
        }
    }

    fn on_set_state(c: &mut Self, tx: &mut TxQueue, payload: &[u8]) {
        if let Ok(HostCommand::SetState(state)) = HostCommand::parse(CMD_SET_STATE, payload) {
            c.transition_to(state, tx);
        }
    }

    fn on_get_status(c: &mut Self, tx: &mut TxQueue, _payload: &[u8]) {
        tx.send(c.state.status().to_frame(CMD_GET_STATUS));
    }

    fn on_record_control(c: &mut Self, _tx: &mut TxQueue, payload: &[u8]) {
        if let Ok(HostCommand::RecordControl {
            start,
            max_duration_s,
        }) = HostCommand::parse(CMD_RECORD_CONTROL, payload)
        {
            if start {
                c.record_flush = None;
                c.audio.start_recording();
                c.record_deadline_ms = if max_duration_s > 0 {
                    Some(c.now_ms.wrapping_add(max_duration_s as u32 * 1000))
                } else {
                    None
                };
            } else {
                c.finish_recording();
            }
        }
    }

    fn on_camera_control(_c: &mut Self, tx: &mut TxQueue, payload: &[u8]) {
        // No camera on this core: answer with an explicit error report
        // instead of leaving the host to time out
        let detail = payload.first().copied().unwrap_or(0);
        let report = RobotReport::Error {
            code: ErrorCode::InvalidParam,
            component: Component::Camera,
            detail,
        };
        if let Ok(frame) = report.to_frame() {
            tx.send(frame);
        }
    }

    fn on_set_gaze(c: &mut Self, _tx: &mut TxQueue, payload: &[u8]) {
        if let Ok(HostCommand::SetGaze { x, y }) = HostCommand::parse(CMD_SET_GAZE, payload) {
            c.gaze.set_gaze(x, y);
        }
    }
}

/// The assembled robot: protocol engine plus components, advanced by
/// one [`Robot::tick`] per control-loop iteration.
pub struct Robot<H, V, B, I, O, R, L>
where
    H: PwmChannel,
    V: PwmChannel,
    B: LedBus,
    I: AudioCapture,
    O: AudioPlayback,
    R: EchoRanger,
    L: LightSensor,
{
    engine: ProtocolEngine<Components<H, V, B, I, O, R, L>>,
    components: Components<H, V, B, I, O, R, L>,
}

impl<H, V, B, I, O, R, L> Robot<H, V, B, I, O, R, L>
where
    H: PwmChannel,
    V: PwmChannel,
    B: LedBus,
    I: AudioCapture,
    O: AudioPlayback,
    R: EchoRanger,
    L: LightSensor,
{
    /// Assemble the robot from its peripherals and register every
    /// command handler.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RobotConfig,
        servo_h: H,
        servo_v: V,
        led_bus: B,
        mic: I,
        speaker: O,
        ranger: R,
        light: L,
    ) -> Self {
        let components = Components {
            state: InteractionMachine::new(),
            gaze: GazeController::new(config.servo, servo_h, servo_v),
            matrix: ExpressionMatrix::new(config.matrix, led_bus),
            audio: AudioManager::new(config.audio.volume, mic, speaker),
            sensor: SensorPoller::new(config.sensor, ranger, light),
            now_ms: 0,
            free_mem: 0,
            battery_low_reported: false,
            expression_override_until: None,
            record_deadline_ms: None,
            record_flush: None,
        };

        let mut engine = ProtocolEngine::new();
        engine.register(CMD_HEARTBEAT, Components::on_heartbeat);
        engine.register(CMD_SET_EXPRESSION, Components::on_set_expression);
        engine.register(CMD_SET_SERVO, Components::on_set_servo);
        engine.register(CMD_PLAY_AUDIO, Components::on_play_audio);
        engine.register(CMD_SET_STATE, Components::on_set_state);
        engine.register(CMD_GET_STATUS, Components::on_get_status);
        engine.register(CMD_RECORD_CONTROL, Components::on_record_control);
        engine.register(CMD_CAMERA_CONTROL, Components::on_camera_control);
        engine.register(CMD_SET_GAZE, Components::on_set_gaze);

        Self { engine, components }
    }

    /// Start autonomous behavior (dwell timers) and show the boot face.
    pub fn start(&mut self, now_ms: u32) {
        self.components.state.start(now_ms);
        let expression = self.components.state.expression();
        self.components.matrix.set_expression(expression);
    }

    /// One control-loop iteration.
    ///
    /// `rx` holds whatever bytes the transport produced since the last
    /// tick (possibly none); `write` transmits serialized frames.
    pub fn tick<W: FnMut(&[u8])>(&mut self, now_ms: u32, rx: &[u8], write: W) {
        let Self { engine, components } = self;

        components.now_ms = now_ms;

        // Status frames built this tick must carry current angles
        let (h, v) = components.gaze.angles();
        components.state.set_servo_mirror(h, v);

        // 1. Inbound bytes through the parser and dispatch table
        engine.feed(rx, components);

        // 2. Outbound queue to the transport, FIFO
        engine.drain(write);

        // 3. State machine: expression-override expiry, then dwell table
        if components
            .expression_override_until
            .is_some_and(|deadline| deadline_passed(now_ms, deadline))
        {
            components.expression_override_until = None;
            components.state.clear_expression_override();
            let expression = components.state.expression();
            components.matrix.set_expression(expression);
        }
        components
            .state
            .tick(now_ms, &mut components.matrix, engine.tx());

        // 4. Motion controller
        components.gaze.tick();

        // 5. Renderer refresh (no-op when nothing changed)
        components.matrix.refresh();

        // 6. Audio: deadline-driven stop, chunk transfer, recorded push
        if components.audio.is_recording()
            && components
                .record_deadline_ms
                .is_some_and(|deadline| deadline_passed(now_ms, deadline))
        {
            components.finish_recording();
        }
        components.audio.tick();
        if let Some(flush) = components.record_flush.as_mut() {
            let pcm = components.audio.recorded();
            let end = (flush.pos + RECORD_PUSH_CHUNK).min(pcm.len());
            let report = RobotReport::RecordedAudio {
                timestamp_s: flush.timestamp_s,
                sample_rate: SAMPLE_RATE_HZ,
                pcm: &pcm[flush.pos..end],
            };
            if let Ok(frame) = report.to_frame() {
                // Advance only when the queue took the frame; a full
                // queue retries the same chunk next tick
                if engine.tx().send(frame) {
                    flush.pos = end;
                }
            }
            if flush.pos >= pcm.len() {
                components.record_flush = None;
            }
        }

        // 7. Sensor poll and push
        if components.sensor.poll(now_ms) {
            let reading = components.sensor.reading();
            let report = RobotReport::SensorData {
                distance_cm: reading.distance_cm,
                proximity: reading.proximity,
                light: reading.light_level,
            };
            if let Ok(frame) = report.to_frame() {
                engine.tx().send(frame);
            }
        }
        if components.sensor.take_fault() {
            let report = RobotReport::Error {
                code: ErrorCode::Timeout,
                component: Component::Sensor,
                detail: 0,
            };
            if let Ok(frame) = report.to_frame() {
                engine.tx().send(frame);
            }
        }
    }

    /// Inject the platform's battery estimate (0-100). A downward
    /// crossing of the low threshold pushes one BatteryLow report.
    pub fn set_battery_level(&mut self, level: u8) {
        self.components.state.set_battery_level(level);

        if level < BATTERY_LOW_PERCENT {
            if !self.components.battery_low_reported {
                self.components.battery_low_reported = true;
                let report = RobotReport::Error {
                    code: ErrorCode::BatteryLow,
                    component: Component::Sensor,
                    detail: level,
                };
                if let Ok(frame) = report.to_frame() {
                    self.engine.tx().send(frame);
                }
            }
        } else {
            self.components.battery_low_reported = false;
        }
    }

    /// Inject the platform's free-memory estimate for heartbeat replies
    pub fn set_free_memory(&mut self, bytes: u32) {
        self.components.free_mem = bytes;
    }

    /// Current status snapshot
    pub fn status(&self) -> Status {
        self.components.state.status()
    }

    /// Current interaction state
    pub fn state(&self) -> RobotState {
        self.components.state.state()
    }

    /// Component access for platform glue and tests
    pub fn parts(&self) -> &Components<H, V, B, I, O, R, L> {
        &self.components
    }

    pub fn parts_mut(&mut self) -> &mut Components<H, V, B, I, O, R, L> {
        &mut self.components
    }
}
