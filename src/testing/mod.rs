//! Test harness
//!
//! Stand-ins for the parts of a run that touch hardware or a human: a
//! [`FakeSystem`] that records what it was asked to do, a [`ScriptedMenu`]
//! that answers from a list, and a [`Workspace`] fixture holding a template
//! in a temporary root.

mod fakes;
mod workspace;

pub use fakes::{FakeSystem, ScriptedMenu};
pub use workspace::Workspace;
