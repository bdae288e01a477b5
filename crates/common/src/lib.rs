//! Common utilities and types shared across FlowLB components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
