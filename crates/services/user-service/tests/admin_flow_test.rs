//! Role and user administration over the in-memory stores.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use common::PageRequest;
use domain::{DataScope, DataScopeType, ErrorCode, RowFilter, UserStatus};
use user_service_lib::config::UserServiceConfig;
use user_service_lib::events::InMemoryEventPublisher;
use user_service_lib::repository::UserFilter;
use user_service_lib::service::{
    CreateRoleInput, CreateUserInput, RoleService, UpdateProfileInput, UpdateRoleInput,
    UserService,
};
use user_service_lib::{in_memory, InMemoryServices};

fn setup() -> (InMemoryServices, Arc<InMemoryEventPublisher>) {
    let events = Arc::new(InMemoryEventPublisher::new());
    let services = in_memory(UserServiceConfig::default(), events.clone());
    (services, events)
}

fn role_input(tenant_id: Uuid, code: &str) -> CreateRoleInput {
    CreateRoleInput {
        tenant_id,
        code: code.to_string(),
        name: format!("{code} role"),
        ..Default::default()
    }
}

fn user_input(tenant_id: Uuid, username: &str) -> CreateUserInput {
    CreateUserInput {
        tenant_id,
        username: username.to_string(),
        password: "Passw0rd1".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_role_code_is_unique_per_tenant_in_any_case() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();

    let role = services
        .role_service
        .create_role(role_input(tenant, "sales_rep"))
        .await
        .unwrap();
    assert_eq!(role.code(), "SALES_REP");

    let err = services
        .role_service
        .create_role(role_input(tenant, "SALES_REP"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RoleCodeExists));
    assert_eq!(err.status().as_u16(), 409);

    // Another tenant may reuse the code
    services
        .role_service
        .create_role(role_input(Uuid::new_v4(), "Sales_Rep"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_pending_user_lifecycle() {
    let (services, events) = setup();
    let tenant = Uuid::new_v4();

    let user = services
        .user_service
        .create_user(user_input(tenant, "TestUser"))
        .await
        .unwrap();
    assert_eq!(user.username(), "testuser");
    assert_eq!(user.status(), UserStatus::Pending);

    let user = services
        .user_service
        .activate_user(tenant, user.id())
        .await
        .unwrap();
    assert!(user.is_active());

    let err = services
        .user_service
        .activate_user(tenant, user.id())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::AlreadyActive));

    let types = events.event_types().await;
    assert_eq!(types, vec!["UserCreated", "UserStatusChanged"]);
}

#[tokio::test]
async fn test_role_in_use_cannot_be_deleted() {
    let (services, events) = setup();
    let tenant = Uuid::new_v4();

    let role = services
        .role_service
        .create_role(role_input(tenant, "picker"))
        .await
        .unwrap();
    let user = services
        .user_service
        .create_user(CreateUserInput {
            role_ids: vec![role.id()],
            ..user_input(tenant, "henry")
        })
        .await
        .unwrap();

    let err = services
        .role_service
        .delete_role(tenant, role.id())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RoleInUse));

    services
        .user_service
        .assign_roles(tenant, user.id(), Vec::new())
        .await
        .unwrap();
    services
        .role_service
        .delete_role(tenant, role.id())
        .await
        .unwrap();

    assert!(events.event_types().await.contains(&"RoleDeleted"));
    let err = services
        .role_service
        .get_role(tenant, role.id())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::RoleNotFound));
}

#[tokio::test]
async fn test_system_role_cannot_be_deleted() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();

    let role = services
        .role_service
        .create_role(CreateRoleInput {
            is_system_role: true,
            ..role_input(tenant, "admin")
        })
        .await
        .unwrap();

    let err = services
        .role_service
        .delete_role(tenant, role.id())
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::SystemRoleNotDeletable));
}

#[tokio::test]
async fn test_permissions_and_scopes_reach_access_profile() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();
    let roles = &services.role_service;

    let clerk = roles.create_role(role_input(tenant, "clerk")).await.unwrap();
    roles
        .grant_permission(tenant, clerk.id(), "order:read")
        .await
        .unwrap();
    roles
        .grant_permission(tenant, clerk.id(), "order:create")
        .await
        .unwrap();
    let err = roles
        .grant_permission(tenant, clerk.id(), "ORDER:READ")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::PermissionAlreadyGranted));

    roles
        .set_data_scope(
            tenant,
            clerk.id(),
            DataScope::new("order", DataScopeType::SelfOnly).unwrap(),
        )
        .await
        .unwrap();

    let manager = roles.create_role(role_input(tenant, "manager")).await.unwrap();
    roles
        .set_permissions(tenant, manager.id(), vec!["report:read".into()])
        .await
        .unwrap();

    let user = services
        .user_service
        .create_user(CreateUserInput {
            role_ids: vec![clerk.id(), manager.id()],
            active: true,
            ..user_input(tenant, "ivy")
        })
        .await
        .unwrap();

    let profile = services
        .user_service
        .access_profile(tenant, user.id())
        .await
        .unwrap();
    assert_eq!(
        profile.permissions(),
        vec!["order:create", "order:read", "report:read"]
    );
    assert_eq!(profile.row_filter("order"), RowFilter::CreatedBy(user.id()));

    // Disabled roles stop contributing
    roles.disable_role(tenant, manager.id()).await.unwrap();
    let profile = services
        .user_service
        .access_profile(tenant, user.id())
        .await
        .unwrap();
    assert!(!profile.has_permission("report:read"));

    let granting = roles
        .roles_with_permission(tenant, "Order:Read")
        .await
        .unwrap();
    assert_eq!(granting.len(), 1);
    assert_eq!(granting[0].id(), clerk.id());
}

#[tokio::test]
async fn test_revoke_and_remove_scope_errors() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();
    let roles = &services.role_service;
    let role = roles.create_role(role_input(tenant, "viewer")).await.unwrap();

    let err = roles
        .revoke_permission(tenant, role.id(), "order:delete")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::PermissionNotFound));

    let err = roles
        .remove_data_scope(tenant, role.id(), "order")
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::DataScopeNotFound));

    let role = roles
        .update_role(
            tenant,
            role.id(),
            UpdateRoleInput {
                description: Some("Read only".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(role.name(), "viewer role");
    assert_eq!(role.description(), "Read only");
}

#[tokio::test]
async fn test_email_unique_per_tenant() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();

    services
        .user_service
        .create_user(CreateUserInput {
            email: "jack@example.com".into(),
            ..user_input(tenant, "jack")
        })
        .await
        .unwrap();
    let kate = services
        .user_service
        .create_user(user_input(tenant, "kate"))
        .await
        .unwrap();

    let err = services
        .user_service
        .update_profile(
            tenant,
            kate.id(),
            UpdateProfileInput {
                email: Some("JACK@example.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::EmailExists));
}

#[tokio::test]
async fn test_admin_lock_and_unlock() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();
    let user = services
        .user_service
        .create_user(CreateUserInput {
            active: true,
            ..user_input(tenant, "liam")
        })
        .await
        .unwrap();

    let user = services
        .user_service
        .lock_user(tenant, user.id(), Duration::zero())
        .await
        .unwrap();
    assert!(user.is_locked());
    assert!(user.locked_until().is_none());

    let user = services
        .user_service
        .unlock_user(tenant, user.id())
        .await
        .unwrap();
    assert!(user.is_active());

    services
        .user_service
        .deactivate_user(tenant, user.id())
        .await
        .unwrap();
    let err = services
        .user_service
        .lock_user(tenant, user.id(), Duration::minutes(5))
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::UserDeactivated));
}

#[tokio::test]
async fn test_list_and_count_with_filter() {
    let (services, _) = setup();
    let tenant = Uuid::new_v4();

    for name in ["mia", "noah", "olivia"] {
        services
            .user_service
            .create_user(user_input(tenant, name))
            .await
            .unwrap();
    }
    let active = services
        .user_service
        .create_user(CreateUserInput {
            active: true,
            ..user_input(tenant, "paul")
        })
        .await
        .unwrap();

    let filter = UserFilter {
        status: Some(UserStatus::Active),
        ..Default::default()
    };
    let page = services
        .user_service
        .list_users(tenant, filter.clone(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id(), active.id());
    assert_eq!(page.page_size, 20);

    let all = services
        .user_service
        .count_users(tenant, UserFilter::default())
        .await
        .unwrap();
    assert_eq!(all, 4);

    let other_tenant = services
        .user_service
        .count_users(Uuid::new_v4(), UserFilter::default())
        .await
        .unwrap();
    assert_eq!(other_tenant, 0);
}
