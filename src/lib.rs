#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod asynch;
pub mod command;
pub mod config;
pub mod error;
pub mod ingress;
pub mod registration;
pub mod urc;

#[cfg(test)]
mod test_helpers;

pub use asynch::{new, Resources};
pub use config::Config;
pub use error::{Error, PktError};
