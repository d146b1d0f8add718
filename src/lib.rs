pub mod aws;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod mfa;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
