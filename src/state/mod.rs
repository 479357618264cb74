//! Sans-I/O state machines for MySQL command responses.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They consume one packet per `step()` and produce `Action` values that
//! tell the caller what to do next.

pub mod action;
pub mod prepare;
pub mod query;

pub use action::Action;
pub use prepare::{PrepareStateMachine, StatementInfo};
pub use query::QueryStateMachine;
