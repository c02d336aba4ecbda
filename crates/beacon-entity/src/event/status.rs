//! Event record status machine.

code_enum! {
    /// Delivery status of an event record.
    pub enum EventStatus {
        /// Waiting to be picked up by the dispatcher.
        Pending = 1 => "pending",
        /// Claimed by a dispatch batch, send in flight.
        InProgress = 2 => "in_progress",
        /// Accepted by the backend.
        Success = 3 => "success",
        /// Send failed; eligible for retry once its backoff elapses.
        Failed = 4 => "failed",
    }
}

impl EventStatus {
    /// Whether `self -> next` is a legal transition.
    ///
    /// Pending -> InProgress -> {Success, Failed}, and Failed -> Pending
    /// for a retry. Everything else, self-loops included, is illegal.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Success)
                | (Self::InProgress, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }

    /// Check if the record will never be sent again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success)
    }
}
