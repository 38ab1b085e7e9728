//! Testing infrastructure for processing-module integration tests.
//!
//! - `ScriptedHost`: a panel transport with per-query scripted outcomes
//! - `fixtures`: seeded in-memory stores with a small vendor fleet
//! - `world`: isolated config/database environment for binary tests

pub mod fixtures;
pub mod host;
pub mod world;

pub use host::ScriptedHost;
pub use world::TestPanel;
