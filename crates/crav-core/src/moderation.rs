//! Moderation reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{ReportId, UserId};

/// What kind of content a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    /// A user profile.
    User,
    /// Generated or uploaded media.
    Content,
    /// A chat or comment message.
    Message,
    /// A marketplace vendor listing.
    Vendor,
}

impl ReportTarget {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Content => "content",
            Self::Message => "message",
            Self::Vendor => "vendor",
        }
    }
}

impl std::str::FromStr for ReportTarget {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "content" => Ok(Self::Content),
            "message" => Ok(Self::Message),
            "vendor" => Ok(Self::Vendor),
            other => Err(CoreError::UnknownVariant {
                kind: "report target",
                value: other.to_string(),
            }),
        }
    }
}

/// Review state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Waiting for review.
    Open,
    /// Action taken.
    Resolved,
    /// No action needed.
    Dismissed,
}

impl ReportStatus {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(CoreError::UnknownVariant {
                kind: "report status",
                value: other.to_string(),
            }),
        }
    }
}

/// A user-submitted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationReport {
    /// Report id.
    pub id: ReportId,
    /// Who filed it.
    pub reporter_id: UserId,
    /// Kind of target.
    pub target_type: ReportTarget,
    /// Id of the target in its own table.
    pub target_id: String,
    /// Short reason.
    pub reason: String,
    /// Optional free text.
    pub details: Option<String>,
    /// Review state.
    pub status: ReportStatus,
    /// Filing time.
    pub created_at: DateTime<Utc>,
    /// When a moderator closed it.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Moderator note.
    pub resolution_note: Option<String>,
}

impl ModerationReport {
    /// Close the report.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the report is already closed or `status` is `Open`.
    pub fn close(&mut self, status: ReportStatus, note: Option<String>) -> Result<(), CoreError> {
        if status == ReportStatus::Open {
            return Err(CoreError::InvalidInput(
                "a report can only be closed as resolved or dismissed".into(),
            ));
        }
        if self.status != ReportStatus::Open {
            return Err(CoreError::InvalidInput(format!(
                "report is already {}",
                self.status.as_str()
            )));
        }
        self.status = status;
        self.resolution_note = note;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_report() -> ModerationReport {
        ModerationReport {
            id: ReportId::generate(),
            reporter_id: UserId::generate(),
            target_type: ReportTarget::Content,
            target_id: "vid_42".into(),
            reason: "spam".into(),
            details: None,
            status: ReportStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            resolution_note: None,
        }
    }

    #[test]
    fn closing_sets_timestamp_once() {
        let mut report = open_report();
        report
            .close(ReportStatus::Resolved, Some("removed".into()))
            .unwrap();
        assert!(report.resolved_at.is_some());
        assert!(report.close(ReportStatus::Dismissed, None).is_err());
    }

    #[test]
    fn cannot_close_as_open() {
        assert!(open_report().close(ReportStatus::Open, None).is_err());
    }
}
