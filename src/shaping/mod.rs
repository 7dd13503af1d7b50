//! Traffic shaping for the node's interface.
//!
//! - Parameters: the four adjustable values and their validation
//! - Command: translation into wondershaper invocations and their execution
//! - Controller: the single owner of the live configuration

pub mod command;
mod controller;
mod params;

pub use command::{CommandRunner, SystemRunner, Wondershaper};
pub use controller::*;
pub use params::{ParamKey, ShapingParameters, ValidationError};
