//! Command table for the host link
//!
//! Commands are divided into two categories:
//! - Host → robot: control commands (state, expression, servo, audio)
//! - Robot → host: replies and unsolicited pushes (status, sensor data,
//!   recorded audio, error reports)
//!
//! Several replies reuse the command id of the request that triggered
//! them (the host correlates on the id), so status payloads carry no id
//! of their own and are framed under the id of their trigger.

use crate::frame::{Frame, FrameError, MAX_PAYLOAD};
use heapless::Vec;

// Command ids: host → robot (replies reuse the same id)
pub const CMD_HEARTBEAT: u8 = 0x01;
pub const CMD_SET_EXPRESSION: u8 = 0x02;
pub const CMD_SET_SERVO: u8 = 0x03;
pub const CMD_PLAY_AUDIO: u8 = 0x04;
pub const CMD_SET_STATE: u8 = 0x07;
pub const CMD_GET_STATUS: u8 = 0x08;
pub const CMD_RECORD_CONTROL: u8 = 0x0A;
pub const CMD_CAMERA_CONTROL: u8 = 0x0B;
pub const CMD_SET_GAZE: u8 = 0x0C;

// Command ids: robot → host pushes
pub const CMD_RECORDED_AUDIO: u8 = 0x05;
pub const CMD_IMAGE_FRAME: u8 = 0x06;
pub const CMD_SENSOR_DATA: u8 = 0x09;
pub const CMD_ERROR: u8 = 0xFF;

/// Interaction states as encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RobotState {
    Idle,
    Sleep,
    Wake,
    Listen,
    Think,
    Talk,
}

impl RobotState {
    /// Decode a wire state byte
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(RobotState::Idle),
            1 => Some(RobotState::Sleep),
            2 => Some(RobotState::Wake),
            3 => Some(RobotState::Listen),
            4 => Some(RobotState::Think),
            5 => Some(RobotState::Talk),
            _ => None,
        }
    }

    /// Wire encoding of this state
    pub fn to_wire(self) -> u8 {
        match self {
            RobotState::Idle => 0,
            RobotState::Sleep => 1,
            RobotState::Wake => 2,
            RobotState::Listen => 3,
            RobotState::Think => 4,
            RobotState::Talk => 5,
        }
    }
}

/// Servo axis selector for the gaze mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoId {
    Horizontal,
    Vertical,
}

impl ServoId {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ServoId::Horizontal),
            2 => Some(ServoId::Vertical),
            _ => None,
        }
    }
}

/// Error codes carried by the 0xFF error report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    Ok = 0,
    Memory = 1,
    Timeout = 2,
    Sensor = 3,
    Actuator = 4,
    BatteryLow = 5,
    Overheat = 6,
    InvalidParam = 7,
}

/// Component ids carried by the 0xFF error report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Component {
    Led = 1,
    Servo = 2,
    Camera = 3,
    Audio = 4,
    Sensor = 5,
}

/// Errors from decoding a command payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Payload shorter than the command requires
    Truncated,
    /// A field holds a value outside its defined range
    InvalidField,
    /// Command id is not one the robot accepts
    UnknownCommand,
}

/// Commands received from the host, decoded from a frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand<'a> {
    /// Empty ping; the robot replies with uptime and free memory
    Heartbeat,
    /// Override the rendered expression
    SetExpression {
        expression: u8,
        brightness: u8,
        /// 0 = hold until the next state transition
        duration_ms: u16,
    },
    /// Drive one gaze axis to an angle
    SetServo { servo: ServoId, angle: u16, speed: u16 },
    /// Play a PCM clip through the speaker
    PlayAudio {
        format: u8,
        sample_rate: u16,
        channels: u8,
        pcm: &'a [u8],
    },
    /// Force an interaction state transition
    SetState(RobotState),
    /// Request a status report
    GetStatus,
    /// Start or stop microphone capture
    RecordControl { start: bool, max_duration_s: u8 },
    /// Camera streaming control (no camera on this core)
    CameraControl { action: u8, interval_s: u8 },
    /// Aim both gaze axes from normalized coordinates
    SetGaze { x: i16, y: i16 },
}

impl<'a> HostCommand<'a> {
    /// Decode a host command from its id and raw payload
    pub fn parse(command: u8, payload: &'a [u8]) -> Result<Self, CommandError> {
        match command {
            CMD_HEARTBEAT => Ok(HostCommand::Heartbeat),
            CMD_SET_EXPRESSION => {
                if payload.len() < 4 {
                    return Err(CommandError::Truncated);
                }
                Ok(HostCommand::SetExpression {
                    expression: payload[0],
                    brightness: payload[1],
                    duration_ms: u16::from_le_bytes([payload[2], payload[3]]),
                })
            }
            CMD_SET_SERVO => {
                if payload.len() < 5 {
                    return Err(CommandError::Truncated);
                }
                let servo = ServoId::from_wire(payload[0]).ok_or(CommandError::InvalidField)?;
                Ok(HostCommand::SetServo {
                    servo,
                    angle: u16::from_le_bytes([payload[1], payload[2]]),
                    speed: u16::from_le_bytes([payload[3], payload[4]]),
                })
            }
            CMD_PLAY_AUDIO => {
                if payload.len() < 4 {
                    return Err(CommandError::Truncated);
                }
                Ok(HostCommand::PlayAudio {
                    format: payload[0],
                    sample_rate: u16::from_le_bytes([payload[1], payload[2]]),
                    channels: payload[3],
                    pcm: &payload[4..],
                })
            }
            CMD_SET_STATE => {
                if payload.is_empty() {
                    return Err(CommandError::Truncated);
                }
                let state = RobotState::from_wire(payload[0]).ok_or(CommandError::InvalidField)?;
                Ok(HostCommand::SetState(state))
            }
            CMD_GET_STATUS => Ok(HostCommand::GetStatus),
            CMD_RECORD_CONTROL => {
                if payload.len() < 2 {
                    return Err(CommandError::Truncated);
                }
                let start = match payload[0] {
                    1 => true,
                    2 => false,
                    _ => return Err(CommandError::InvalidField),
                };
                Ok(HostCommand::RecordControl {
                    start,
                    max_duration_s: payload[1],
                })
            }
            CMD_CAMERA_CONTROL => {
                if payload.len() < 2 {
                    return Err(CommandError::Truncated);
                }
                Ok(HostCommand::CameraControl {
                    action: payload[0],
                    interval_s: payload[1],
                })
            }
            CMD_SET_GAZE => {
                if payload.len() < 4 {
                    return Err(CommandError::Truncated);
                }
                Ok(HostCommand::SetGaze {
                    x: i16::from_le_bytes([payload[0], payload[1]]),
                    y: i16::from_le_bytes([payload[2], payload[3]]),
                })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }

    /// Encode this command into a frame (for testing or host simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            HostCommand::Heartbeat => Ok(Frame::empty(CMD_HEARTBEAT)),
            HostCommand::SetExpression {
                expression,
                brightness,
                duration_ms,
            } => {
                let d = duration_ms.to_le_bytes();
                Frame::new(CMD_SET_EXPRESSION, &[*expression, *brightness, d[0], d[1]])
            }
            HostCommand::SetServo { servo, angle, speed } => {
                let id = match servo {
                    ServoId::Horizontal => 1,
                    ServoId::Vertical => 2,
                };
                let a = angle.to_le_bytes();
                let s = speed.to_le_bytes();
                Frame::new(CMD_SET_SERVO, &[id, a[0], a[1], s[0], s[1]])
            }
            HostCommand::PlayAudio {
                format,
                sample_rate,
                channels,
                pcm,
            } => {
                let mut payload = Vec::<u8, MAX_PAYLOAD>::new();
                let r = sample_rate.to_le_bytes();
                payload
                    .extend_from_slice(&[*format, r[0], r[1], *channels])
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(pcm)
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                Frame::new(CMD_PLAY_AUDIO, &payload)
            }
            HostCommand::SetState(state) => Frame::new(CMD_SET_STATE, &[state.to_wire()]),
            HostCommand::GetStatus => Ok(Frame::empty(CMD_GET_STATUS)),
            HostCommand::RecordControl {
                start,
                max_duration_s,
            } => {
                let action = if *start { 1 } else { 2 };
                Frame::new(CMD_RECORD_CONTROL, &[action, *max_duration_s])
            }
            HostCommand::CameraControl { action, interval_s } => {
                Frame::new(CMD_CAMERA_CONTROL, &[*action, *interval_s])
            }
            HostCommand::SetGaze { x, y } => {
                let xb = x.to_le_bytes();
                let yb = y.to_le_bytes();
                Frame::new(CMD_SET_GAZE, &[xb[0], xb[1], yb[0], yb[1]])
            }
        }
    }
}

/// Status report payload, framed under 0x07 (transition notification)
/// or 0x08 (status request reply)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub state: RobotState,
    pub battery: u8,
    pub expression: u8,
    pub servo_h: u16,
    pub servo_v: u16,
}

impl Status {
    /// Encode under the given command id.
    ///
    /// The host expects a 9-byte payload; the two trailing bytes are
    /// reserved and always zero.
    pub fn to_frame(&self, command: u8) -> Frame {
        let h = self.servo_h.to_le_bytes();
        let v = self.servo_v.to_le_bytes();
        let payload = [
            self.state.to_wire(),
            self.battery,
            self.expression,
            h[0],
            h[1],
            v[0],
            v[1],
            0,
            0,
        ];
        // 9-byte payload always fits
        Frame::new(command, &payload).unwrap_or_else(|_| Frame::empty(command))
    }

    /// Decode a status payload (host side / tests)
    pub fn from_payload(payload: &[u8]) -> Result<Self, CommandError> {
        if payload.len() < 7 {
            return Err(CommandError::Truncated);
        }
        let state = RobotState::from_wire(payload[0]).ok_or(CommandError::InvalidField)?;
        Ok(Status {
            state,
            battery: payload[1],
            expression: payload[2],
            servo_h: u16::from_le_bytes([payload[3], payload[4]]),
            servo_v: u16::from_le_bytes([payload[5], payload[6]]),
        })
    }
}

/// Unsolicited reports and replies from the robot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RobotReport<'a> {
    /// Heartbeat reply: uptime in seconds, free memory in bytes
    Heartbeat { uptime_s: u32, free_mem: u32 },
    /// One-byte acceptance reply to a set-servo command
    ServoAck { accepted: bool },
    /// A chunk of captured microphone audio
    RecordedAudio {
        timestamp_s: u32,
        sample_rate: u16,
        pcm: &'a [u8],
    },
    /// Periodic sensor refresh
    SensorData {
        distance_cm: u16,
        proximity: bool,
        light: u8,
    },
    /// Operationally significant fault, pushed rather than logged
    Error {
        code: ErrorCode,
        component: Component,
        detail: u8,
    },
}

impl<'a> RobotReport<'a> {
    /// Encode this report into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            RobotReport::Heartbeat { uptime_s, free_mem } => {
                let mut payload = [0u8; 8];
                payload[..4].copy_from_slice(&uptime_s.to_le_bytes());
                payload[4..].copy_from_slice(&free_mem.to_le_bytes());
                Frame::new(CMD_HEARTBEAT, &payload)
            }
            RobotReport::ServoAck { accepted } => {
                Frame::new(CMD_SET_SERVO, &[if *accepted { 0 } else { 1 }])
            }
            RobotReport::RecordedAudio {
                timestamp_s,
                sample_rate,
                pcm,
            } => {
                let mut payload = Vec::<u8, MAX_PAYLOAD>::new();
                payload
                    .extend_from_slice(&timestamp_s.to_le_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(&sample_rate.to_le_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(pcm)
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                Frame::new(CMD_RECORDED_AUDIO, &payload)
            }
            RobotReport::SensorData {
                distance_cm,
                proximity,
                light,
            } => {
                let d = distance_cm.to_le_bytes();
                Frame::new(
                    CMD_SENSOR_DATA,
                    &[d[0], d[1], u8::from(*proximity), *light],
                )
            }
            RobotReport::Error {
                code,
                component,
                detail,
            } => Frame::new(CMD_ERROR, &[*code as u8, *component as u8, *detail]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_roundtrip() {
        for byte in 0..=5u8 {
            let state = RobotState::from_wire(byte).unwrap();
            assert_eq!(state.to_wire(), byte);
        }
        assert_eq!(RobotState::from_wire(6), None);
        assert_eq!(RobotState::from_wire(0xFF), None);
    }

    #[test]
    fn test_parse_set_state() {
        let cmd = HostCommand::parse(CMD_SET_STATE, &[2]).unwrap();
        assert_eq!(cmd, HostCommand::SetState(RobotState::Wake));

        assert_eq!(
            HostCommand::parse(CMD_SET_STATE, &[9]),
            Err(CommandError::InvalidField)
        );
        assert_eq!(
            HostCommand::parse(CMD_SET_STATE, &[]),
            Err(CommandError::Truncated)
        );
    }

    #[test]
    fn test_parse_set_servo() {
        // horizontal, 135°, speed 80
        let payload = [1, 0x87, 0x00, 0x50, 0x00];
        let cmd = HostCommand::parse(CMD_SET_SERVO, &payload).unwrap();
        assert_eq!(
            cmd,
            HostCommand::SetServo {
                servo: ServoId::Horizontal,
                angle: 135,
                speed: 80,
            }
        );

        // servo id 3 does not exist
        assert_eq!(
            HostCommand::parse(CMD_SET_SERVO, &[3, 0, 0, 0, 0]),
            Err(CommandError::InvalidField)
        );
    }

    #[test]
    fn test_parse_play_audio() {
        let payload = [1, 0x80, 0x3E, 1, 0xAB, 0xCD];
        let cmd = HostCommand::parse(CMD_PLAY_AUDIO, &payload).unwrap();
        match cmd {
            HostCommand::PlayAudio {
                format,
                sample_rate,
                channels,
                pcm,
            } => {
                assert_eq!(format, 1);
                assert_eq!(sample_rate, 16000);
                assert_eq!(channels, 1);
                assert_eq!(pcm, &[0xAB, 0xCD]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_gaze_negative() {
        let cmd = HostCommand::parse(CMD_SET_GAZE, &[0x9C, 0xFF, 0x64, 0x00]).unwrap();
        assert_eq!(cmd, HostCommand::SetGaze { x: -100, y: 100 });
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            HostCommand::parse(0x42, &[]),
            Err(CommandError::UnknownCommand)
        );
    }

    #[test]
    fn test_host_command_frame_roundtrip() {
        let original = HostCommand::SetExpression {
            expression: 0x05,
            brightness: 200,
            duration_ms: 1500,
        };
        let frame = original.to_frame().unwrap();
        let parsed = HostCommand::parse(frame.command, &frame.payload).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_status_roundtrip() {
        let status = Status {
            state: RobotState::Listen,
            battery: 87,
            expression: 0x02,
            servo_h: 120,
            servo_v: 60,
        };
        let frame = status.to_frame(CMD_GET_STATUS);
        assert_eq!(frame.command, CMD_GET_STATUS);
        assert_eq!(frame.payload.len(), 9);
        assert_eq!(&frame.payload[7..], &[0, 0]);

        let decoded = Status::from_payload(&frame.payload).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_heartbeat_reply_layout() {
        let report = RobotReport::Heartbeat {
            uptime_s: 3601,
            free_mem: 150_000,
        };
        let frame = report.to_frame().unwrap();
        assert_eq!(frame.command, CMD_HEARTBEAT);
        assert_eq!(&frame.payload[..4], &3601u32.to_le_bytes());
        assert_eq!(&frame.payload[4..], &150_000u32.to_le_bytes());
    }

    #[test]
    fn test_sensor_report_layout() {
        let report = RobotReport::SensorData {
            distance_cm: 23,
            proximity: true,
            light: 140,
        };
        let frame = report.to_frame().unwrap();
        assert_eq!(frame.command, CMD_SENSOR_DATA);
        assert_eq!(&frame.payload[..], &[23, 0, 1, 140]);
    }

    #[test]
    fn test_error_report_layout() {
        let report = RobotReport::Error {
            code: ErrorCode::BatteryLow,
            component: Component::Sensor,
            detail: 8,
        };
        let frame = report.to_frame().unwrap();
        assert_eq!(frame.command, CMD_ERROR);
        assert_eq!(&frame.payload[..], &[5, 5, 8]);
    }
}
