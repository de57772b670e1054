//! Identifier types.
//!
//! Rows keyed by Supabase or generated UUIDs get a UUID newtype each. Ledger
//! rows use ULIDs, whose string order is creation order, so the ledger can be
//! listed newest-first by sorting on the id alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

fn parse_uuid(s: &str) -> Result<Uuid, IdError> {
    Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)
}

fn parse_ulid(s: &str) -> Result<Ulid, IdError> {
    Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)
}

/// Newtype over `$inner` that serializes as its string form.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $parse:path, $new:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name($inner);

        impl $name {
            /// A fresh identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self($new)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $parse(s).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

/// Extra accessors for the UUID-backed ids, which PostgreSQL stores as `uuid`.
macro_rules! uuid_columns {
    ($($name:ident),+) => {$(
        impl $name {
            /// Wrap a UUID read from the database.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The UUID to bind in queries.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }
    )+};
}

string_id!(
    /// Supabase Auth user id, the JWT `sub` claim.
    UserId(Uuid), parse_uuid, Uuid::new_v4()
);
string_id!(
    /// Moderation report.
    ReportId(Uuid), parse_uuid, Uuid::new_v4()
);
string_id!(
    /// Marketplace vendor.
    VendorId(Uuid), parse_uuid, Uuid::new_v4()
);
string_id!(
    /// Item in a collector catalog.
    CollectibleId(Uuid), parse_uuid, Uuid::new_v4()
);
string_id!(
    /// Grant opportunity in the CRM.
    GrantId(Uuid), parse_uuid, Uuid::new_v4()
);
string_id!(
    /// Ledger row. Stored as its 26-character ULID text.
    TransactionId(Ulid), parse_ulid, Ulid::new()
);

uuid_columns!(UserId, ReportId, VendorId, CollectibleId, GrantId);
