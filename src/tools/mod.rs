//! Standalone utilities shipped alongside the server
//!
//! None of these are used by the accept loop.

pub mod command;
pub mod threading;
pub mod writer;
