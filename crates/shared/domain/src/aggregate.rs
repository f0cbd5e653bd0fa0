//! Versioned aggregate base shared by Role and User.
//!
//! Composition instead of inheritance: each aggregate embeds an
//! [`AggregateBase`] by value and exposes its accessors explicitly.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::events::{DomainEvent, EventPayload};

/// Version assigned to a freshly created aggregate.
pub const INITIAL_VERSION: u64 = 1;

/// Identity, tenant, version and pending events of an aggregate.
#[derive(Debug, Clone)]
pub struct AggregateBase {
    id: Uuid,
    tenant_id: Uuid,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl AggregateBase {
    pub fn new(tenant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            version: INITIAL_VERSION,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        }
    }

    /// Rehydrate persisted state. No events are buffered.
    pub fn restore(
        id: Uuid,
        tenant_id: Uuid,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            version,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bump the version by one and stamp `updated_at`.
    pub(crate) fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub(crate) fn record(&mut self, payload: EventPayload) {
        self.events
            .push(DomainEvent::new(self.id, self.tenant_id, payload));
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Return and clear the buffered events.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Read access to the embedded base, used by generic persistence code.
pub trait Aggregate {
    fn base(&self) -> &AggregateBase;
}

/// Optimistic concurrency expectation for a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the stored aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        match self {
            ExpectedVersion::Exact(expected) if expected != actual => {
                Err(DomainError::version_conflict(expected, actual))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_new_base_starts_at_initial_version() {
        let base = AggregateBase::new(Uuid::new_v4());
        assert_eq!(base.version(), INITIAL_VERSION);
        assert_eq!(base.created_at(), base.updated_at());
        assert!(base.pending_events().is_empty());
    }

    #[test]
    fn test_touch_increments_by_one() {
        let mut base = AggregateBase::new(Uuid::new_v4());
        let before = base.updated_at();
        base.touch();
        assert_eq!(base.version(), INITIAL_VERSION + 1);
        assert!(base.updated_at() >= before);
    }

    #[test]
    fn test_drain_clears_buffer() {
        let mut base = AggregateBase::new(Uuid::new_v4());
        base.record(EventPayload::RoleEnabled { code: "X1".into() });
        assert_eq!(base.drain_events().len(), 1);
        assert!(base.drain_events().is_empty());
    }

    #[test]
    fn test_expected_version_check() {
        assert!(ExpectedVersion::Any.check(7).is_ok());
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());

        let err = ExpectedVersion::Exact(2).check(3).unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionConflict);
    }
}
