//! Integration tests for the assembled control loop.
//!
//! Every scenario drives the robot the way the host does: encoded
//! frames in, ticks at the loop cadence, decoded frames out. Mock
//! peripherals stand in for the hardware.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use kibo_core::config::RobotConfig;
use kibo_core::traits::{
    AudioCapture, AudioPlayback, EchoRanger, LedBus, LightSensor, PwmChannel,
};
use kibo_drivers::audio::AUDIO_CHUNK_BYTES;
use kibo_drivers::controller::{Robot, RECORD_PUSH_CHUNK};
use kibo_protocol::commands::{
    HostCommand, RobotState, ServoId, Status, CMD_ERROR, CMD_GET_STATUS, CMD_HEARTBEAT,
    CMD_RECORDED_AUDIO, CMD_SENSOR_DATA, CMD_SET_SERVO, CMD_SET_STATE,
};
use kibo_protocol::frame::{Frame, FrameParser, MAX_FRAME_SIZE};

// ── Mock peripherals ─────────────────────────────────────────────────

#[derive(Clone, Default)]
struct SharedPulse(Rc<Cell<u16>>);

impl PwmChannel for SharedPulse {
    fn set_pulse_us(&mut self, pulse_us: u16) {
        self.0.set(pulse_us);
    }
}

#[derive(Clone, Default)]
struct SharedBus(Rc<RefCell<Vec<Vec<u8>>>>);

impl LedBus for SharedBus {
    fn write(&mut self, grb: &[u8]) {
        self.0.borrow_mut().push(grb.to_vec());
    }
}

/// Microphone producing an endless ramp
struct RampMic {
    next: u8,
}

impl AudioCapture for RampMic {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        for byte in buf.iter_mut() {
            *byte = self.next;
            self.next = self.next.wrapping_add(1);
        }
        buf.len()
    }
}

#[derive(Clone, Default)]
struct SharedSpeaker {
    written: Rc<RefCell<Vec<u8>>>,
    volume: Rc<Cell<u8>>,
}

impl AudioPlayback for SharedSpeaker {
    fn write(&mut self, buf: &[u8]) -> usize {
        self.written.borrow_mut().extend_from_slice(buf);
        buf.len()
    }

    fn set_volume(&mut self, percent: u8) {
        self.volume.set(percent);
    }
}

#[derive(Clone)]
struct SharedRanger(Rc<Cell<Option<u32>>>);

impl EchoRanger for SharedRanger {
    fn measure_us(&mut self) -> Option<u32> {
        self.0.get()
    }
}

struct DimLight;

impl LightSensor for DimLight {
    fn read_raw(&mut self) -> u16 {
        1024
    }
}

// ── Harness ──────────────────────────────────────────────────────────

type TestRobot =
    Robot<SharedPulse, SharedPulse, SharedBus, RampMic, SharedSpeaker, SharedRanger, DimLight>;

struct Harness {
    robot: TestRobot,
    h_pulse: SharedPulse,
    bus: SharedBus,
    speaker: SharedSpeaker,
    echo: Rc<Cell<Option<u32>>>,
    wire: Vec<u8>,
}

impl Harness {
    fn new() -> Self {
        let h_pulse = SharedPulse::default();
        let v_pulse = SharedPulse::default();
        let bus = SharedBus::default();
        let speaker = SharedSpeaker::default();
        let echo = Rc::new(Cell::new(None));

        let mut robot = Robot::new(
            RobotConfig::default(),
            h_pulse.clone(),
            v_pulse.clone(),
            bus.clone(),
            RampMic { next: 0 },
            speaker.clone(),
            SharedRanger(echo.clone()),
            DimLight,
        );
        robot.start(0);

        Self {
            robot,
            h_pulse,
            bus,
            speaker,
            echo,
            wire: Vec::new(),
        }
    }

    /// One tick with no inbound bytes
    fn tick(&mut self, now_ms: u32) {
        let wire = &mut self.wire;
        self.robot.tick(now_ms, &[], |chunk| wire.extend_from_slice(chunk));
    }

    /// One tick delivering an encoded command
    fn send(&mut self, now_ms: u32, command: &HostCommand) {
        let frame = command.to_frame().expect("encodable");
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode(&mut buf).expect("encode");
        let wire = &mut self.wire;
        self.robot
            .tick(now_ms, &buf[..len], |chunk| wire.extend_from_slice(chunk));
    }

    /// Decode and drain everything the robot wrote so far
    fn take_frames(&mut self) -> Vec<Frame> {
        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for &byte in &self.wire {
            if let Ok(Some(frame)) = parser.feed(byte) {
                frames.push(frame);
            }
        }
        self.wire.clear();
        frames
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn wake_transition_reports_and_times_out_to_listen() {
    let mut h = Harness::new();

    // Host forces Wake at t=10
    h.send(10, &HostCommand::SetState(RobotState::Wake));
    assert_eq!(h.robot.state(), RobotState::Wake);
    assert_eq!(h.robot.status().expression, 0x01);

    // The transition's status frame goes out on the next drain
    h.tick(20);
    let frames = h.take_frames();
    let status_frame = frames
        .iter()
        .find(|f| f.command == CMD_SET_STATE)
        .expect("transition status frame");
    let status = Status::from_payload(&status_frame.payload).unwrap();
    assert_eq!(status.state, RobotState::Wake);
    assert_eq!(status.expression, 0x01);

    // No further commands: after the 2000 ms dwell the machine advances
    // on its own
    let mut now = 20;
    while now <= 2030 {
        now += 10;
        h.tick(now);
    }
    assert_eq!(h.robot.state(), RobotState::Listen);
    assert_eq!(h.robot.status().expression, 0x02);

    let frames = h.take_frames();
    let auto = frames
        .iter()
        .filter(|f| f.command == CMD_SET_STATE)
        .last()
        .expect("autonomous transition frame");
    let status = Status::from_payload(&auto.payload).unwrap();
    assert_eq!(status.state, RobotState::Listen);
}

#[test]
fn get_status_reflects_boot_defaults() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::GetStatus);
    let frames = h.take_frames();
    let reply = frames
        .iter()
        .find(|f| f.command == CMD_GET_STATUS)
        .expect("status reply");

    let status = Status::from_payload(&reply.payload).unwrap();
    assert_eq!(status.state, RobotState::Sleep);
    assert_eq!(status.battery, 100);
    assert_eq!(status.expression, 0x00);
    assert_eq!(status.servo_h, 90);
    assert_eq!(status.servo_v, 90);
}

#[test]
fn heartbeat_reports_uptime_and_free_memory() {
    let mut h = Harness::new();
    h.robot.set_free_memory(123_456);

    h.send(5_400, &HostCommand::Heartbeat);
    let frames = h.take_frames();
    let reply = frames
        .iter()
        .find(|f| f.command == CMD_HEARTBEAT)
        .expect("heartbeat reply");

    assert_eq!(reply.payload.len(), 8);
    let uptime = u32::from_le_bytes(reply.payload[..4].try_into().unwrap());
    let free = u32::from_le_bytes(reply.payload[4..].try_into().unwrap());
    assert_eq!(uptime, 5);
    assert_eq!(free, 123_456);
}

#[test]
fn servo_command_acks_and_converges_monotonically() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::SetServo {
        servo: ServoId::Horizontal,
        angle: 0,
        speed: 100,
    });

    let frames = h.take_frames();
    let ack = frames
        .iter()
        .find(|f| f.command == CMD_SET_SERVO)
        .expect("servo ack");
    assert_eq!(&ack.payload[..], &[0]); // accepted

    // Pulse walks strictly downward to MIN and never below
    let mut last = h.h_pulse.0.get();
    let mut now = 10;
    for _ in 0..200 {
        now += 10;
        h.tick(now);
        let pulse = h.h_pulse.0.get();
        assert!(pulse <= last, "no overshoot past the target");
        assert!(pulse >= 500);
        last = pulse;
    }
    assert_eq!(h.h_pulse.0.get(), 500);

    // Status mirrors the converged angle
    h.send(now + 10, &HostCommand::GetStatus);
    let frames = h.take_frames();
    let reply = frames.iter().find(|f| f.command == CMD_GET_STATUS).unwrap();
    let status = Status::from_payload(&reply.payload).unwrap();
    assert_eq!(status.servo_h, 0);
    assert_eq!(status.servo_v, 90);
}

#[test]
fn invalid_servo_id_is_rejected_with_ack() {
    let mut h = Harness::new();

    // servo id 3: parseable layout, invalid field
    let frame = Frame::new(CMD_SET_SERVO, &[3, 0, 0, 50, 0]).unwrap();
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let len = frame.encode(&mut buf).unwrap();
    let wire = &mut h.wire;
    h.robot.tick(10, &buf[..len], |c| wire.extend_from_slice(c));

    let frames = h.take_frames();
    let ack = frames.iter().find(|f| f.command == CMD_SET_SERVO).unwrap();
    assert_eq!(&ack.payload[..], &[1]); // rejected
}

#[test]
fn recording_stops_and_streams_back_in_chunks() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::RecordControl {
        start: true,
        max_duration_s: 0,
    });

    // Capture runs on the start tick and three more
    h.tick(20);
    h.tick(30);
    h.tick(40);
    let captured = 4 * AUDIO_CHUNK_BYTES;

    h.send(50, &HostCommand::RecordControl {
        start: false,
        max_duration_s: 0,
    });
    h.wire.clear();

    // The recording streams out one chunk frame per tick
    let expected_frames = captured.div_ceil(RECORD_PUSH_CHUNK);
    let mut now = 50;
    for _ in 0..expected_frames + 2 {
        now += 10;
        h.tick(now);
    }

    let frames = h.take_frames();
    let chunks: Vec<&Frame> = frames
        .iter()
        .filter(|f| f.command == CMD_RECORDED_AUDIO)
        .collect();
    assert_eq!(chunks.len(), expected_frames);

    // Reassemble: ramp data in order, constant header
    let mut pcm = Vec::new();
    for chunk in &chunks {
        assert_eq!(
            u16::from_le_bytes(chunk.payload[4..6].try_into().unwrap()),
            16_000
        );
        pcm.extend_from_slice(&chunk.payload[6..]);
    }
    assert_eq!(pcm.len(), captured);
    for (i, &byte) in pcm.iter().enumerate() {
        assert_eq!(byte, i as u8);
    }
}

#[test]
fn recording_auto_stops_at_max_duration() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::RecordControl {
        start: true,
        max_duration_s: 1,
    });
    assert!(h.robot.parts().audio.is_recording());

    let mut now = 10;
    while now < 1100 {
        now += 10;
        h.tick(now);
    }
    assert!(!h.robot.parts().audio.is_recording());

    // The deadline acted as a stop: chunks stream without an explicit one
    h.wire.clear();
    h.tick(now + 10);
    let frames = h.take_frames();
    assert!(frames.iter().any(|f| f.command == CMD_RECORDED_AUDIO));
}

#[test]
fn play_audio_reaches_speaker_and_finishes() {
    let mut h = Harness::new();

    let clip: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    h.send(10, &HostCommand::PlayAudio {
        format: 1,
        sample_rate: 16_000,
        channels: 1,
        pcm: &clip,
    });
    assert!(h.robot.parts().audio.is_playing());

    h.tick(20);
    h.tick(30);
    assert!(!h.robot.parts().audio.is_playing());
    assert_eq!(*h.speaker.written.borrow(), clip);
}

#[test]
fn sensor_refresh_pushes_once_per_interval() {
    let mut h = Harness::new();
    h.echo.set(Some(1000)); // 17 cm

    // Interval is 100 ms; ticks at 10 ms cadence
    let mut now = 0;
    for _ in 0..35 {
        now += 10;
        h.tick(now);
    }

    let frames = h.take_frames();
    let pushes: Vec<&Frame> = frames
        .iter()
        .filter(|f| f.command == CMD_SENSOR_DATA)
        .collect();
    // 350 ms of loop time: refreshes at ~100/200/300
    assert_eq!(pushes.len(), 3);

    let payload = &pushes[0].payload;
    assert_eq!(u16::from_le_bytes(payload[..2].try_into().unwrap()), 17);
    assert_eq!(payload[2], 1); // 17 cm < 30 cm threshold
    assert_eq!(payload[3], (1024u32 * 255 / 4096) as u8);
}

#[test]
fn ranging_timeout_pushes_sentinel_without_proximity() {
    let mut h = Harness::new();
    h.echo.set(None);

    let mut now = 0;
    for _ in 0..12 {
        now += 10;
        h.tick(now);
    }

    let frames = h.take_frames();
    let push = frames
        .iter()
        .find(|f| f.command == CMD_SENSOR_DATA)
        .expect("sensor push");
    assert_eq!(
        u16::from_le_bytes(push.payload[..2].try_into().unwrap()),
        0xFFFF
    );
    assert_eq!(push.payload[2], 0);
}

#[test]
fn camera_control_answers_with_error_report() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::CameraControl {
        action: 1,
        interval_s: 5,
    });
    let frames = h.take_frames();
    let error = frames
        .iter()
        .find(|f| f.command == CMD_ERROR)
        .expect("error report");
    // InvalidParam (7), Camera (3), echoed action
    assert_eq!(&error.payload[..], &[7, 3, 1]);
}

#[test]
fn battery_low_reports_once_per_crossing() {
    let mut h = Harness::new();

    h.robot.set_battery_level(8);
    h.robot.set_battery_level(7);
    h.tick(10);
    let frames = h.take_frames();
    let reports: Vec<&Frame> = frames.iter().filter(|f| f.command == CMD_ERROR).collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(&reports[0].payload[..], &[5, 5, 8]); // BatteryLow, Sensor, level

    // Recovery re-arms the report
    h.robot.set_battery_level(60);
    h.robot.set_battery_level(9);
    h.tick(20);
    let frames = h.take_frames();
    assert_eq!(frames.iter().filter(|f| f.command == CMD_ERROR).count(), 1);
}

#[test]
fn corrupted_frames_between_noise_leave_state_untouched() {
    let mut h = Harness::new();

    // A valid Think command, its checksum-corrupted twin, and noise
    let good = HostCommand::SetState(RobotState::Think).to_frame().unwrap();
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let len = good.encode(&mut buf).unwrap();

    let mut corrupted = buf[..len].to_vec();
    corrupted[len - 1] ^= 0xFF;
    // Swap Think for Talk inside the corrupted copy's payload so a
    // wrongly accepted frame would be visible
    corrupted[4] = RobotState::Talk.to_wire();

    let mut stream = vec![0x00u8, 0x55, 0x13];
    stream.extend_from_slice(&corrupted);
    stream.extend_from_slice(&[0x99, 0x00]);
    stream.extend_from_slice(&buf[..len]);

    let wire = &mut h.wire;
    h.robot.tick(10, &stream, |c| wire.extend_from_slice(c));

    assert_eq!(h.robot.state(), RobotState::Think);
}

#[test]
fn expression_override_expires_back_to_canonical() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::SetExpression {
        expression: 0x0B, // angry
        brightness: 255,
        duration_ms: 500,
    });
    assert_eq!(h.robot.status().expression, 0x0B);
    let renders_before = h.bus.0.borrow().len();

    // Before the deadline: override holds
    h.tick(400);
    assert_eq!(h.robot.status().expression, 0x0B);

    // Past it: canonical expression restored and repainted
    h.tick(520);
    assert_eq!(h.robot.status().expression, 0x00);
    assert!(h.bus.0.borrow().len() > renders_before);
}

#[test]
fn indefinite_override_lapses_only_on_transition() {
    let mut h = Harness::new();

    h.send(10, &HostCommand::SetExpression {
        expression: 0x0C, // love
        brightness: 255,
        duration_ms: 0,
    });
    h.tick(5_000);
    assert_eq!(h.robot.status().expression, 0x0C);

    h.send(5_010, &HostCommand::SetState(RobotState::Wake));
    assert_eq!(h.robot.status().expression, 0x01);
}
