//! Core library for the kobosync command line application.
//!
//! The library flattens semi-structured survey submissions into a relational
//! set of tables and synchronises them incrementally to a spreadsheet store.
//! The modules are structured to keep responsibilities narrow and composable:
//! data representations live in [`model`], the flattening logic in
//! [`flatten`], multi-value row expansion in [`expand`], natural-key diffing
//! in [`diff`], orchestration in [`sync`], and the network and file adapters
//! under [`io`].

pub mod config;
pub mod diff;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod io;
pub mod model;
pub mod names;
pub mod sync;

pub use error::{Result, SyncError};
