use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created locally, not yet sent
    Pending,
    /// Accepted by the venue, nothing filled yet
    Submitted,
    /// Partially filled
    Partial,
    /// Completely filled
    Filled,
    /// Cancelled before completion
    Cancelled,
    /// Refused locally (risk) or by the venue
    Failed,
}

impl OrderStatus {
    /// Returns true if the order can still change
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Submitted | OrderStatus::Partial
        )
    }

    /// Cancellation is allowed exactly while the order is active
    pub fn can_cancel(&self) -> bool {
        self.is_active()
    }

    /// Returns true if the order is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}
