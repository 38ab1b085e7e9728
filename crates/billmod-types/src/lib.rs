//! Core types shared by every billmod crate.
//!
//! A processing module is a short-lived executable the billing panel invokes
//! with `--command <operation>`. Everything it reports back travels as either
//! a structured error value ([`Error`]) or an XML document ([`xml::Document`]),
//! so both live here, next to the fixed [`Operation`] vocabulary.

mod error;
mod operation;
pub mod xml;

pub use error::{Error, Result};
pub use operation::Operation;
pub use xml::{Document, Node};

use std::collections::BTreeMap;

/// Ordered string-to-string map used for module and item parameters.
///
/// Ordered so that serialized parameter lists are deterministic.
pub type StringMap = BTreeMap<String, String>;
