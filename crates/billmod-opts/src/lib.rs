//! Declarative flag registry and command-line parser.
//!
//! The panel core invokes processing modules with a fixed, flat flag
//! vocabulary (`--command open --item 42 ...`). This parser covers exactly
//! that surface: long flags, clustered short flags, positional binding, and
//! conditional-requirement edges ("item is required when command is open")
//! evaluated as a first-match-wins rule table.
//!
//! The library never terminates the process. Parsing yields a
//! [`ParseOutcome`] and the binary decides how to print and which exit code
//! to use, which keeps every branch testable.
//!
//! Known quirk, kept on purpose: a short flag that takes a value only
//! consumes the following token when its letter is the *last* character of a
//! cluster. `-ab value` with value-taking `-a` leaves `-a` present but
//! valueless, and validation reports it.

mod parser;
mod registry;

pub use parser::{ParseOutcome, Problem};
pub use registry::{ArgId, ArgSet, ArgSpec};

/// Stock validators for flag values.
pub mod validate {
    /// Non-empty string of ASCII digits.
    pub fn numeric(value: &str) -> bool {
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
    }
}
