//! CoreXY kinematics
//!
//! Logical X moves drive motors A and B the same way; logical Y moves drive
//! them in opposite directions. The sign convention is configuration, see
//! [`CoreXyConvention`].

use inspectkit_core::{Axis, CoreXyConvention};

/// Physical motor motion realizing one logical axis move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMove {
    /// Both belt motors, stepped together
    Pair {
        /// Signed steps of motor A
        a: i64,
        /// Signed steps of motor B
        b: i64,
    },
    /// The vertical motor alone
    Z(i64),
}

impl MotorMove {
    /// Number of pulse periods needed to realize the move
    pub fn steps(&self) -> u64 {
        match self {
            MotorMove::Pair { a, b } => a.unsigned_abs().max(b.unsigned_abs()),
            MotorMove::Z(z) => z.unsigned_abs(),
        }
    }
}

/// Motor motion for `delta` logical steps along `axis`
pub fn motor_move(convention: CoreXyConvention, axis: Axis, delta: i64) -> MotorMove {
    match axis {
        Axis::X => {
            let (a, b) = convention.motor_deltas(delta, 0);
            MotorMove::Pair { a, b }
        }
        Axis::Y => {
            let (a, b) = convention.motor_deltas(0, delta);
            MotorMove::Pair { a, b }
        }
        Axis::Z => MotorMove::Z(delta),
    }
}
