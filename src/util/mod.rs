//! Utility modules: user prompting, versioned file rotation.

pub mod prompt;
pub mod versioned;

pub use prompt::{NonInteractive, Prompter, StdinPrompter};
pub use versioned::versioned_path;
