//! Command implementations for kata-cli

pub mod scans;
pub mod submit;
pub mod wait;

pub use scans::scans;
pub use submit::{submit, SubmitOptions};
pub use wait::{wait, WaitArgs};
