//! Domain events emitted by Role and User mutations.
//!
//! Events are buffered on the aggregate and handed to an outbox/event bus by
//! the application layer after a successful save.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::permission::DataScopeType;
use crate::user::UserStatus;

/// Envelope shared by every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub tenant_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(aggregate_id: Uuid, tenant_id: Uuid, payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            tenant_id,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    pub fn aggregate_type(&self) -> &'static str {
        self.payload.aggregate_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "PascalCase")]
pub enum EventPayload {
    RoleCreated {
        code: String,
        name: String,
        is_system_role: bool,
    },
    RoleUpdated {
        code: String,
        name: String,
        description: String,
    },
    RoleDeleted {
        code: String,
    },
    RoleEnabled {
        code: String,
    },
    RoleDisabled {
        code: String,
    },
    RolePermissionGranted {
        code: String,
        permission_code: String,
    },
    RolePermissionRevoked {
        code: String,
        permission_code: String,
    },
    RoleDataScopeChanged {
        code: String,
        resource: String,
        scope_type: DataScopeType,
        scope_values: Vec<String>,
    },
    UserCreated {
        username: String,
        status: UserStatus,
    },
    UserDeactivated {
        username: String,
    },
    UserPasswordChanged {
        username: String,
    },
    UserRoleAssigned {
        username: String,
        role_id: Uuid,
    },
    UserRoleRemoved {
        username: String,
        role_id: Uuid,
    },
    UserStatusChanged {
        username: String,
        old_status: UserStatus,
        new_status: UserStatus,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::RoleCreated { .. } => "RoleCreated",
            EventPayload::RoleUpdated { .. } => "RoleUpdated",
            EventPayload::RoleDeleted { .. } => "RoleDeleted",
            EventPayload::RoleEnabled { .. } => "RoleEnabled",
            EventPayload::RoleDisabled { .. } => "RoleDisabled",
            EventPayload::RolePermissionGranted { .. } => "RolePermissionGranted",
            EventPayload::RolePermissionRevoked { .. } => "RolePermissionRevoked",
            EventPayload::RoleDataScopeChanged { .. } => "RoleDataScopeChanged",
            EventPayload::UserCreated { .. } => "UserCreated",
            EventPayload::UserDeactivated { .. } => "UserDeactivated",
            EventPayload::UserPasswordChanged { .. } => "UserPasswordChanged",
            EventPayload::UserRoleAssigned { .. } => "UserRoleAssigned",
            EventPayload::UserRoleRemoved { .. } => "UserRoleRemoved",
            EventPayload::UserStatusChanged { .. } => "UserStatusChanged",
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            EventPayload::RoleCreated { .. }
            | EventPayload::RoleUpdated { .. }
            | EventPayload::RoleDeleted { .. }
            | EventPayload::RoleEnabled { .. }
            | EventPayload::RoleDisabled { .. }
            | EventPayload::RolePermissionGranted { .. }
            | EventPayload::RolePermissionRevoked { .. }
            | EventPayload::RoleDataScopeChanged { .. } => "Role",
            _ => "User",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = DomainEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            EventPayload::RoleEnabled {
                code: "SALES".into(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "RoleEnabled");
        assert_eq!(json["payload"]["code"], "SALES");
        assert_eq!(event.event_type(), "RoleEnabled");
        assert_eq!(event.aggregate_type(), "Role");
    }

    #[test]
    fn test_user_events_report_user_aggregate() {
        let payload = EventPayload::UserStatusChanged {
            username: "alice".into(),
            old_status: UserStatus::Pending,
            new_status: UserStatus::Active,
        };
        assert_eq!(payload.aggregate_type(), "User");
        assert_eq!(payload.event_type(), "UserStatusChanged");
    }
}
