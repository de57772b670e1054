//! API handlers.

pub mod admin;
pub mod avatar;
pub mod chat;
pub mod checkout;
pub mod collectibles;
pub mod credits;
pub mod cron;
pub mod flags;
pub mod health;
pub mod marketplace;
pub mod newsletter;
pub mod pricing;
pub mod reports;
pub mod webhooks;

/// Default page size for list endpoints.
pub(crate) const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a list endpoint returns.
pub(crate) const MAX_PAGE_SIZE: usize = 100;

pub(crate) const fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}
