//! Core types for the CR AudioViz AI back office.
//!
//! This crate holds the domain types shared by the store, the HTTP service
//! and the client SDK:
//!
//! - **Identifiers**: `UserId`, `TransactionId` and row ids
//! - **Credits**: `CreditAccount`, `CreditTransaction`, `Plan`, `PricingConfig`
//! - **Operations**: `FeatureFlag`, `CronLease`
//! - **Chat widget**: canned replies and the avatar glow engine
//! - **Records**: collectibles, marketplace, moderation, grants, newsletter
//!
//! # Credits
//!
//! Credits are whole numbers stored as `i64`. A feature's price comes from
//! [`PricingConfig`]; a balance never goes below zero.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod avatar;
pub mod catalog;
pub mod chat;
pub mod credits;
pub mod error;
pub mod flags;
pub mod grants;
pub mod ids;
pub mod lease;
pub mod moderation;
pub mod newsletter;
pub mod pricing;

pub use account::{
    CreditAccount, Plan, SubscriptionStatus, BILLING_PERIOD_DAYS, SIGNUP_BONUS_CREDITS,
};
pub use avatar::{glow_for, AvatarState, GlowParams};
pub use catalog::{Category, Collectible, CollectibleKind, Vendor};
pub use chat::{reply_to, ChatReply};
pub use credits::{CreditTransaction, TransactionKind};
pub use error::{CoreError, Result};
pub use flags::FeatureFlag;
pub use grants::{Grant, GrantStatus};
pub use ids::{CollectibleId, GrantId, IdError, ReportId, TransactionId, UserId, VendorId};
pub use lease::{CronLease, LockOutcome};
pub use moderation::{ModerationReport, ReportStatus, ReportTarget};
pub use newsletter::Subscriber;
pub use pricing::{CreditPack, PricingConfig};
