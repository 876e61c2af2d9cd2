//! Deterministic, pure logic for base/head resolution.
//!
//! Core modules must be free of I/O side effects. Collaborator lookups are
//! passed in as data or predicates so the rules can be tested in isolation.

pub mod guard;
pub mod scan;
pub mod types;
