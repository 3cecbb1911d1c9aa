//! Interaction state machine
//!
//! Defines the authoritative runtime behavior of the robot's
//! interaction cycle. The machine is explicit, finite, and
//! deterministic; the host drives it through set-state commands and it
//! advances on its own only through the dwell table.

pub mod machine;

pub use machine::{canonical_expression, InteractionMachine, WAKE_DWELL_MS};
