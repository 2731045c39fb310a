//! Command handlers for the `p2pnode` binary

pub mod commands;

pub use commands::*;
