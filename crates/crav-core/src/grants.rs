//! Grants CRM records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::GrantId;

/// Pipeline stage of a grant opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Spotted, not yet evaluated.
    Prospect,
    /// Application being written.
    Drafting,
    /// Application sent.
    Submitted,
    /// Funded.
    Awarded,
    /// Turned down.
    Rejected,
}

impl GrantStatus {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prospect => "prospect",
            Self::Drafting => "drafting",
            Self::Submitted => "submitted",
            Self::Awarded => "awarded",
            Self::Rejected => "rejected",
        }
    }

    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Awarded | Self::Rejected)
    }
}

impl std::str::FromStr for GrantStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prospect" => Ok(Self::Prospect),
            "drafting" => Ok(Self::Drafting),
            "submitted" => Ok(Self::Submitted),
            "awarded" => Ok(Self::Awarded),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::UnknownVariant {
                kind: "grant status",
                value: other.to_string(),
            }),
        }
    }
}

/// A tracked grant opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant id.
    pub id: GrantId,
    /// Programme name.
    pub title: String,
    /// Funding body.
    pub funder: String,
    /// Requested or offered amount in US cents.
    pub amount_cents: Option<i64>,
    /// Application deadline.
    pub deadline: Option<NaiveDate>,
    /// Pipeline stage.
    pub status: GrantStatus,
    /// Internal notes.
    pub notes: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl Grant {
    /// Move the grant to `next`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the grant is already awarded or rejected.
    pub fn transition(&mut self, next: GrantStatus) -> Result<(), CoreError> {
        if self.status.is_final() && next != self.status {
            return Err(CoreError::InvalidInput(format!(
                "grant is already {}",
                self.status.as_str()
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(status: GrantStatus) -> Grant {
        Grant {
            id: GrantId::generate(),
            title: "Arts Innovation Fund".into(),
            funder: "State Arts Council".into(),
            amount_cents: Some(2_500_000),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1),
            status,
            notes: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_grants_move_freely() {
        let mut g = grant(GrantStatus::Prospect);
        g.transition(GrantStatus::Submitted).unwrap();
        g.transition(GrantStatus::Drafting).unwrap();
        assert_eq!(g.status, GrantStatus::Drafting);
    }

    #[test]
    fn final_grants_are_locked() {
        let mut g = grant(GrantStatus::Awarded);
        assert!(g.transition(GrantStatus::Drafting).is_err());
        assert!(g.transition(GrantStatus::Awarded).is_ok());
    }
}
