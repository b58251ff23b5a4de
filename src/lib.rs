//! coup - project-scoped package isolation for the Haskell toolchain
//!
//! Turns a project's declared package list into content-addressed package
//! databases, one per (package, dependency-set) pair, shared across projects
//! and registered incrementally.

pub mod cache;
pub mod cli;
pub mod config;
pub mod declaration;
pub mod digest;
pub mod error;
pub mod plan;
pub mod project;
pub mod state;
pub mod toolchain;

pub use error::{CoupError, CoupResult};
