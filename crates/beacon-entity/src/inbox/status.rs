//! Inbox message status and query filters.

code_enum! {
    /// User-facing status of an inbox message.
    ///
    /// A freshly delivered message has no status at all.
    pub enum InboxStatus {
        /// Shown to the user.
        Viewed = 0 => "viewed",
        /// Opened by the user.
        Read = 1 => "read",
        /// Removed by the user. Terminal.
        Deleted = 2 => "deleted",
    }
}

/// How a requested status change resolves against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Store the requested status.
    Apply,
    /// The current status already ranks at or above the request.
    Keep,
    /// The record is Deleted and cannot change.
    Forbidden,
}

impl InboxStatus {
    fn rank(status: Option<InboxStatus>) -> u8 {
        match status {
            None => 0,
            Some(Self::Viewed) => 1,
            Some(Self::Read) => 2,
            Some(Self::Deleted) => 3,
        }
    }

    /// Resolve a change from `current` to `requested`.
    ///
    /// Statuses only move forward (delivered, viewed, read, deleted);
    /// a request for a lower rank keeps the current status.
    pub fn resolve(current: Option<InboxStatus>, requested: InboxStatus) -> StatusUpdate {
        if current == Some(Self::Deleted) {
            return StatusUpdate::Forbidden;
        }
        if Self::rank(Some(requested)) > Self::rank(current) {
            StatusUpdate::Apply
        } else {
            StatusUpdate::Keep
        }
    }
}

code_enum! {
    /// Filter applied to inbox queries.
    pub enum InboxFilter {
        /// Every stored message, deleted ones included.
        All = 0 => "all",
        /// Messages still in the inbox (not deleted).
        InboxOnly = 1 => "inbox",
        /// Messages the user has opened.
        ReadOnly = 2 => "read",
        /// Messages neither opened nor deleted.
        UnreadOnly = 3 => "unread",
    }
}

impl InboxFilter {
    /// Whether a message with `status` passes this filter.
    pub fn matches(&self, status: Option<InboxStatus>) -> bool {
        match self {
            Self::All => true,
            Self::InboxOnly => status != Some(InboxStatus::Deleted),
            Self::ReadOnly => status == Some(InboxStatus::Read),
            Self::UnreadOnly => !matches!(
                status,
                Some(InboxStatus::Read) | Some(InboxStatus::Deleted)
            ),
        }
    }
}
