//! Host Communication Protocol
//!
//! This crate defines the UART-based protocol between the robot's host
//! computer (dialogue and orchestration side) and the Kibo firmware core.
//! The protocol is designed for simplicity, low latency, and robustness
//! against line noise.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌──────┬─────┬─────────┬──────────────┬─────┐
//! │ HEAD │ CMD │ LEN(le) │ DATA         │ CRC │
//! │ 1B   │ 1B  │ 2B      │ 0–1024B      │ 1B  │
//! └──────┴─────┴─────────┴──────────────┴─────┘
//! ```
//!
//! The firmware acts as the command sink: all dialogue and planning
//! logic stays on the host. The firmware's replies and pushes reuse the
//! command ids of the table in [`commands`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod commands;
pub mod engine;
pub mod frame;

pub use commands::{
    CommandError, Component, ErrorCode, HostCommand, RobotReport, RobotState, ServoId, Status,
};
pub use engine::{Handler, ProtocolEngine, TxQueue, TX_QUEUE_DEPTH};
pub use frame::{crc8, Frame, FrameError, FrameParser, FRAME_HEAD, MAX_FRAME_SIZE, MAX_PAYLOAD};
