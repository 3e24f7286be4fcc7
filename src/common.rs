//! Common definitions that are shared between different parts of the compiler.

// Sorted maps and sets keep symbol listings and debug dumps deterministic.
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

/// Identifiers.  Interning makes them cheap to copy and compare, which the
/// symbol and define tables lean on.
pub type Id = internment::Intern<String>;
