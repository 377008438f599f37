use std::fmt;

/// Lifecycle of an entity or a component.
///
/// `Constructing -> Active <-> Disabled -> PendingDestroy -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Created, not yet seen by a flush. Components stay here until `start` has run.
    Constructing,
    Active,
    Disabled,
    /// Logically gone; reclaimed at the next flush.
    PendingDestroy,
    /// Terminal. Reported for stale handles.
    Destroyed,
}

impl LifecycleState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Pending-destroy or already destroyed.
    pub fn is_dying(self) -> bool {
        matches!(self, Self::PendingDestroy | Self::Destroyed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constructing => "constructing",
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::PendingDestroy => "pending-destroy",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
