//! CR AudioViz AI credits client.
//!
//! Product features call this crate to charge credits for an operation and
//! give them back when the operation fails.
//!
//! # Example
//!
//! ```no_run
//! use crav_client::CreditsClient;
//!
//! # async fn example(user_jwt: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let client = CreditsClient::new("https://api.craudiovizai.com")?;
//!
//! let balance = client.balance(user_jwt).await?;
//! println!("{} credits left", balance.balance);
//!
//! // Charge 5 credits, refund them if rendering fails.
//! let url = client
//!     .with_credits(user_jwt, "image_generation", 1, |_receipt| async {
//!         render_image().await
//!     })
//!     .await?;
//! # let _ = url;
//! # Ok(())
//! # }
//! # async fn render_image() -> Result<String, std::io::Error> { Ok(String::new()) }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, CreditsClient, AUTO_REFUND_REASON};
pub use error::{ClientError, WithCreditsError};
pub use types::*;
