//! Frame encoding and decoding for the host link protocol.
//!
//! Frame format:
//! - HEAD (1 byte): 0xAA synchronization byte
//! - CMD (1 byte): command identifier
//! - LEN (2 bytes, little-endian): payload length (0-1024)
//! - DATA (0-1024 bytes): command-specific payload
//! - CRC (1 byte): CRC-8 over CMD, LEN, and all DATA bytes

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_HEAD: u8 = 0xAA;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD: usize = 1024;

/// Maximum complete frame size (HEAD + CMD + LEN + MAX_PAYLOAD + CRC)
pub const MAX_FRAME_SIZE: usize = 1 + 1 + 2 + MAX_PAYLOAD + 1;

/// CRC-8 over the input: polynomial 0x07, initial value 0x00, no
/// reflection, no final xor. Part of the wire contract with the host
/// peer, so the algorithm must not change.
pub fn crc8(data: &[u8]) -> u8 {
    crc8_update(0, data)
}

/// Continue a CRC-8 computation over another chunk of input.
pub fn crc8_update(mut crc: u8, data: &[u8]) -> u8 {
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// Checksum mismatch
    InvalidChecksum,
    /// Declared length exceeds the maximum, or the receive byte budget
    /// was exhausted without completing a frame
    FrameTooLong,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command identifier
    pub command: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    /// Create a new frame with the given command and payload
    pub fn new(command: u8, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge);
        }

        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            command,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(command: u8) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    /// Checksum over CMD, LEN (little-endian), and payload
    fn checksum(command: u8, length: u16, payload: &[u8]) -> u8 {
        let crc = crc8_update(0, &[command, length as u8, (length >> 8) as u8]);
        crc8_update(crc, payload)
    }

    /// Total encoded size of this frame in bytes
    pub fn encoded_len(&self) -> usize {
        5 + self.payload.len()
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.payload.len() as u16;
        let checksum = Self::checksum(self.command, length, &self.payload);

        buffer[0] = FRAME_HEAD;
        buffer[1] = self.command;
        buffer[2] = length as u8;
        buffer[3] = (length >> 8) as u8;
        buffer[4..4 + self.payload.len()].copy_from_slice(&self.payload);
        buffer[4 + self.payload.len()] = checksum;

        Ok(frame_len)
    }
}

/// State machine for parsing incoming frames
///
/// Exactly one partial frame is tracked at a time; the parser consumes a
/// raw byte stream and reassembles complete, checksum-validated frames
/// out of it, discarding noise between frames.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_PAYLOAD>,
    expected_length: u16,
    command: u8,
    /// Bytes consumed since the head marker, for the desync guard
    consumed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Scanning for the HEAD marker
    Idle,
    /// Got HEAD, waiting for CMD
    Command,
    /// Waiting for the low length byte
    LengthLow,
    /// Waiting for the high length byte
    LengthHigh,
    /// Reading payload bytes
    Payload,
    /// Waiting for CRC
    Checksum,
}

/// Receive byte budget: CMD + LEN + max payload + CRC, measured from the
/// head marker. Exceeding it without a complete frame forces a reset so
/// line noise cannot desynchronize the parser indefinitely.
const RX_BYTE_BUDGET: usize = 4 + MAX_PAYLOAD + 1;

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            buffer: Vec::new(),
            expected_length: 0,
            command: 0,
            consumed: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.buffer.clear();
        self.expected_length = 0;
        self.command = 0;
        self.consumed = 0;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    /// After any error the parser has already reset itself and resumes
    /// scanning for the next head marker.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        if self.state == ParseState::Idle {
            if byte == FRAME_HEAD {
                self.consumed = 0;
                self.state = ParseState::Command;
            }
            // Silently ignore noise while scanning
            return Ok(None);
        }

        self.consumed += 1;
        if self.consumed >= RX_BYTE_BUDGET && self.state != ParseState::Checksum {
            self.reset();
            return Err(FrameError::FrameTooLong);
        }

        match self.state {
            ParseState::Idle => Ok(None),
            ParseState::Command => {
                self.command = byte;
                self.state = ParseState::LengthLow;
                Ok(None)
            }
            ParseState::LengthLow => {
                self.expected_length = byte as u16;
                self.state = ParseState::LengthHigh;
                Ok(None)
            }
            ParseState::LengthHigh => {
                self.expected_length |= (byte as u16) << 8;
                if self.expected_length as usize > MAX_PAYLOAD {
                    self.reset();
                    return Err(FrameError::FrameTooLong);
                }
                if self.expected_length == 0 {
                    self.state = ParseState::Checksum;
                } else {
                    self.buffer.clear();
                    self.state = ParseState::Payload;
                }
                Ok(None)
            }
            ParseState::Payload => {
                // Cannot fail: expected_length was validated against MAX_PAYLOAD
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_length as usize {
                    self.state = ParseState::Checksum;
                }
                Ok(None)
            }
            ParseState::Checksum => {
                let expected = Frame::checksum(self.command, self.expected_length, &self.buffer);

                if byte != expected {
                    self.reset();
                    return Err(FrameError::InvalidChecksum);
                }

                let frame = Frame {
                    command: self.command,
                    payload: self.buffer.clone(),
                };

                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
