//! Board-agnostic core logic for the Kibo companion robot firmware
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (servo PWM, LED bus, audio, ranging)
//! - Interaction state machine
//! - Tuning configuration type definitions

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod state;
pub mod traits;
