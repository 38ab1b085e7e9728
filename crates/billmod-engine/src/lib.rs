//! The invocation engine: argument vocabulary, configuration, the error
//! journal, the per-invocation context and the dispatcher tying a plugin's
//! [`Capabilities`] to the panel's command-line protocol.

pub mod args;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod journal;
pub mod logcap;
pub mod runner;

pub use args::ModuleArgs;
pub use capabilities::Capabilities;
pub use config::Config;
pub use context::ModuleContext;
pub use journal::{ErrorJournal, MessageKind};
pub use logcap::LogCapture;
pub use runner::{Module, VENDOR_BANNER};
