//! Process-wide logging setup shared by the binary and the black-box tests.

pub mod tracing;

pub use crate::tracing::{LogFormat, init, init_with};
