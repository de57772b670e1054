//! PayPal Orders v2 integration for credit packs.

pub mod client;
pub mod types;

pub use client::{PayPalClient, PayPalError};
pub use types::*;
