//! Abstract syntax tree for drun task programs.
//!
//! The tree is produced by an external parser (out of scope here — see
//! SPEC_FULL.md §1) and handed to the engine already built. Every node type
//! derives `serde::Deserialize` so a program can also be supplied directly as
//! a YAML or JSON fixture, which is how the test suite and embedders without
//! a parser construct one.

pub mod types;

pub use types::*;
