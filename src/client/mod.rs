//! ReplayLog client implementation

pub mod replay;

pub use replay::ReplayClient;
