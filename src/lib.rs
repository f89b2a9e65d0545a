//! Commit Quest — a repository's commit history, played as a story.
//!
//! Commit metadata drives everything: a statistical analysis seeds a
//! deterministic procedural score, and a turn-based story machine walks the
//! history one commit per choice, narrated by a language model when one is
//! configured and by style templates otherwise.

pub mod config;
pub mod core;
pub mod schema;
