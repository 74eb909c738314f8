//! CLI command implementations.

mod content;
mod init;
mod watch;

pub use content::content;
pub use init::init;
pub use watch::{watch, TerminalGate};
