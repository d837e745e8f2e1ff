//! Test support: a scripted native driver and small fixtures.

mod scripted;
pub mod test_helpers;

pub use scripted::{Event, Outcome, ScriptedConnection, ScriptedCursor, ScriptedDriver};
pub use test_helpers::{create_test_row, test_options};
