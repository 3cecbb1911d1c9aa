//! Interaction state machine
//!
//! The robot is always in exactly one interaction state. Transitions
//! come from the host (set-state command) or from the dwell table; every
//! transition updates the rendered expression and pushes a status frame
//! so the host never has to poll for the change.

use kibo_protocol::commands::{RobotState, Status, CMD_SET_STATE};
use kibo_protocol::engine::TxQueue;

use crate::traits::ExpressionSink;

/// Time spent in Wake before the machine advances to Listen on its own
pub const WAKE_DWELL_MS: u32 = 2000;

/// Dwell table: `(state, dwell_ms, next_state)`. States not listed only
/// leave through an explicit set-state command.
const AUTO_ADVANCE: &[(RobotState, u32, RobotState)] = &[(
    RobotState::Wake,
    WAKE_DWELL_MS,
    RobotState::Listen,
)];

/// Canonical expression for a state. An explicit set-expression command
/// may override this until the next transition.
pub fn canonical_expression(state: RobotState) -> u8 {
    match state {
        RobotState::Idle | RobotState::Sleep => 0x00,
        RobotState::Wake => 0x01,
        RobotState::Listen => 0x02,
        RobotState::Think => 0x03,
        RobotState::Talk => 0x04,
    }
}

/// Interaction state machine
///
/// Created once at boot (state = Sleep) and lives for the process
/// lifetime. Only [`InteractionMachine::transition`] mutates the state.
#[derive(Debug)]
pub struct InteractionMachine {
    current: RobotState,
    previous: RobotState,
    entered_at_ms: u32,
    battery: u8,
    expression: u8,
    /// Servo angle mirrors for status reporting, refreshed by the
    /// control loop before any status frame is built
    servo_h: u16,
    servo_v: u16,
    running: bool,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self {
            current: RobotState::Sleep,
            previous: RobotState::Sleep,
            entered_at_ms: 0,
            battery: 100,
            expression: canonical_expression(RobotState::Sleep),
            servo_h: 90,
            servo_v: 90,
            running: false,
        }
    }

    /// Begin autonomous operation. Until started, the dwell table is
    /// inert; explicit transitions still work during boot.
    pub fn start(&mut self, now_ms: u32) {
        self.running = true;
        self.entered_at_ms = now_ms;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn state(&self) -> RobotState {
        self.current
    }

    pub fn previous_state(&self) -> RobotState {
        self.previous
    }

    pub fn expression(&self) -> u8 {
        self.expression
    }

    pub fn battery_level(&self) -> u8 {
        self.battery
    }

    /// Store the platform's battery estimate (0-100 by caller contract)
    pub fn set_battery_level(&mut self, level: u8) {
        self.battery = level;
    }

    /// Record the current servo angles for status reporting
    pub fn set_servo_mirror(&mut self, horizontal: u16, vertical: u16) {
        self.servo_h = horizontal;
        self.servo_v = vertical;
    }

    /// Out-of-band expression override (set-expression command). Holds
    /// until the next transition rewrites the canonical mapping.
    pub fn set_expression_override(&mut self, expression: u8) {
        self.expression = expression;
    }

    /// Restore the canonical expression for the current state
    pub fn clear_expression_override(&mut self) {
        self.expression = canonical_expression(self.current);
    }

    /// Build the current status report
    pub fn status(&self) -> Status {
        Status {
            state: self.current,
            battery: self.battery,
            expression: self.expression,
            servo_h: self.servo_h,
            servo_v: self.servo_v,
        }
    }

    /// Transition into `new_state`.
    ///
    /// A no-op when already in `new_state` (`entered_at` is not reset).
    /// Otherwise updates the expression through `expressions` and queues
    /// a status frame; both complete before this returns.
    pub fn transition<E: ExpressionSink>(
        &mut self,
        new_state: RobotState,
        now_ms: u32,
        expressions: &mut E,
        tx: &mut TxQueue,
    ) {
        if new_state == self.current {
            return;
        }

        self.previous = self.current;
        self.current = new_state;
        self.entered_at_ms = now_ms;
        self.expression = canonical_expression(new_state);

        expressions.show_expression(self.expression);
        tx.send(self.status().to_frame(CMD_SET_STATE));
    }

    /// Advance the dwell table. Called once per control-loop tick.
    pub fn tick<E: ExpressionSink>(&mut self, now_ms: u32, expressions: &mut E, tx: &mut TxQueue) {
        if !self.running {
            return;
        }

        let elapsed = now_ms.wrapping_sub(self.entered_at_ms);
        for &(from, dwell_ms, to) in AUTO_ADVANCE {
            if self.current == from && elapsed > dwell_ms {
                self.transition(to, now_ms, expressions, tx);
                return;
            }
        }
    }

    #[cfg(test)]
    fn entered_at(&self) -> u32 {
        self.entered_at_ms
    }
}
