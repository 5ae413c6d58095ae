//! Response unification engine for multi-annotator feedback datasets.
//!
//! Everything in this crate is pure and synchronous: records go in, the
//! `unified_responses` slot of each record is written, records come out.

pub mod core_domain;

pub use core_domain as core;
