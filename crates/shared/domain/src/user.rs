//! User aggregate: credentials, account state machine and role assignments.
//!
//! Status transitions:
//!
//! ```text
//! pending ──activate──▶ active ──lock──▶ locked ──unlock──▶ active
//!    │                    │                │
//!    └──────deactivate────┴────────────────┴──▶ deactivated
//! ```
//!
//! Lock expiry is lazy: [`User::is_locked_at`] compares `locked_until` with the
//! given instant, so an elapsed lock reads as unlocked while the stored status
//! still says `locked`. Code that needs the authoritative status must call
//! [`User::unlock`] (or [`User::release_expired_lock_at`]) and persist.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, AggregateBase};
use crate::constants::{
    MAX_AVATAR_LENGTH, MAX_DISPLAY_NAME_LENGTH, MAX_EMAIL_LENGTH, MAX_PHONE_LENGTH,
    MAX_USERNAME_LENGTH, MIN_USERNAME_LENGTH,
};
use crate::error::{DomainError, DomainResult, ErrorCode};
use crate::events::{DomainEvent, EventPayload};
use crate::password::Password;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-.]+$").expect("valid username regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Locked,
    Deactivated,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Locked => "locked",
            UserStatus::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct User {
    base: AggregateBase,
    username: String,
    email: String,
    phone: String,
    password: Password,
    display_name: String,
    avatar: String,
    department_id: Option<Uuid>,
    notes: String,
    status: UserStatus,
    role_ids: Vec<Uuid>,
    last_login_at: Option<DateTime<Utc>>,
    last_login_ip: String,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
    password_changed_at: DateTime<Utc>,
    must_change_password: bool,
}

/// Flat persisted form of a user, used by storage adapters to rehydrate.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub display_name: String,
    pub avatar: String,
    pub department_id: Option<Uuid>,
    pub notes: String,
    pub status: UserStatus,
    pub role_ids: Vec<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: String,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub password_changed_at: DateTime<Utc>,
    pub must_change_password: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a `pending` user. The password is validated and hashed here.
    pub fn create(tenant_id: Uuid, username: &str, password: &str) -> DomainResult<Self> {
        Self::build(tenant_id, username, password, UserStatus::Pending)
    }

    /// Create a user that can log in immediately.
    pub fn create_active(tenant_id: Uuid, username: &str, password: &str) -> DomainResult<Self> {
        Self::build(tenant_id, username, password, UserStatus::Active)
    }

    fn build(
        tenant_id: Uuid,
        username: &str,
        password: &str,
        status: UserStatus,
    ) -> DomainResult<Self> {
        let username = normalize_username(username)?;
        let password = Password::new(password)?;
        let base = AggregateBase::new(tenant_id);
        let now = base.created_at();

        let mut user = Self {
            base,
            username,
            email: String::new(),
            phone: String::new(),
            password,
            display_name: String::new(),
            avatar: String::new(),
            department_id: None,
            notes: String::new(),
            status,
            role_ids: Vec::new(),
            last_login_at: None,
            last_login_ip: String::new(),
            failed_attempts: 0,
            locked_until: None,
            password_changed_at: now,
            must_change_password: false,
        };
        user.base.record(EventPayload::UserCreated {
            username: user.username.clone(),
            status,
        });
        Ok(user)
    }

    pub fn restore(record: UserRecord) -> Self {
        Self {
            base: AggregateBase::restore(
                record.id,
                record.tenant_id,
                record.version,
                record.created_at,
                record.updated_at,
            ),
            username: record.username,
            email: record.email,
            phone: record.phone,
            password: Password::from_hash(record.password_hash),
            display_name: record.display_name,
            avatar: record.avatar,
            department_id: record.department_id,
            notes: record.notes,
            status: record.status,
            role_ids: record.role_ids,
            last_login_at: record.last_login_at,
            last_login_ip: record.last_login_ip,
            failed_attempts: record.failed_attempts,
            locked_until: record.locked_until,
            password_changed_at: record.password_changed_at,
            must_change_password: record.must_change_password,
        }
    }

    /// Snapshot for storage. Pending events are not part of it.
    pub fn to_record(&self) -> UserRecord {
        UserRecord {
            id: self.id(),
            tenant_id: self.tenant_id(),
            username: self.username.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            password_hash: self.password.as_str().to_string(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            department_id: self.department_id,
            notes: self.notes.clone(),
            status: self.status,
            role_ids: self.role_ids.clone(),
            last_login_at: self.last_login_at,
            last_login_ip: self.last_login_ip.clone(),
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
            password_changed_at: self.password_changed_at,
            must_change_password: self.must_change_password,
            version: self.version(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.base.id()
    }

    pub fn tenant_id(&self) -> Uuid {
        self.base.tenant_id()
    }

    pub fn version(&self) -> u64 {
        self.base.version()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.base.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.base.updated_at()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn password_hash(&self) -> &str {
        self.password.as_str()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn avatar(&self) -> &str {
        &self.avatar
    }

    pub fn department_id(&self) -> Option<Uuid> {
        self.department_id
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn role_ids(&self) -> &[Uuid] {
        &self.role_ids
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn last_login_ip(&self) -> &str {
        &self.last_login_ip
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
    }

    pub fn password_changed_at(&self) -> DateTime<Utc> {
        self.password_changed_at
    }

    pub fn must_change_password(&self) -> bool {
        self.must_change_password
    }

    pub fn display_name_or_username(&self) -> &str {
        if self.display_name.is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        self.base.pending_events()
    }

    /// Hand buffered events to the caller and clear the buffer.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        self.base.drain_events()
    }

    // -------------------------------------------------------------------------
    // Profile
    // -------------------------------------------------------------------------

    /// Set or clear (empty string) the email. Stored lowercase.
    pub fn set_email(&mut self, email: &str) -> DomainResult<()> {
        let email = email.trim().to_lowercase();
        if !email.is_empty() {
            if email.len() > MAX_EMAIL_LENGTH {
                return Err(DomainError::validation(
                    ErrorCode::InvalidEmail,
                    format!("Email cannot exceed {MAX_EMAIL_LENGTH} characters"),
                ));
            }
            if !EMAIL_RE.is_match(&email) {
                return Err(DomainError::validation(
                    ErrorCode::InvalidEmail,
                    "Invalid email format",
                ));
            }
        }
        self.email = email;
        self.base.touch();
        Ok(())
    }

    pub fn set_phone(&mut self, phone: &str) -> DomainResult<()> {
        let phone = bounded(phone, MAX_PHONE_LENGTH, ErrorCode::InvalidPhone, "Phone")?;
        self.phone = phone;
        self.base.touch();
        Ok(())
    }

    pub fn set_display_name(&mut self, display_name: &str) -> DomainResult<()> {
        let display_name = bounded(
            display_name,
            MAX_DISPLAY_NAME_LENGTH,
            ErrorCode::InvalidDisplayName,
            "Display name",
        )?;
        self.display_name = display_name;
        self.base.touch();
        Ok(())
    }

    pub fn set_avatar(&mut self, avatar: &str) -> DomainResult<()> {
        let avatar = bounded(avatar, MAX_AVATAR_LENGTH, ErrorCode::InvalidAvatar, "Avatar URL")?;
        self.avatar = avatar;
        self.base.touch();
        Ok(())
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.notes = notes.to_string();
        self.base.touch();
    }

    pub fn set_department(&mut self, department_id: Option<Uuid>) {
        self.department_id = department_id;
        self.base.touch();
    }

    // -------------------------------------------------------------------------
    // Credentials
    // -------------------------------------------------------------------------

    pub fn verify_password(&self, plain_text: &str) -> bool {
        self.password.verify(plain_text)
    }

    /// Verify `old` before replacing the password with `new`.
    pub fn change_password(&mut self, old: &str, new: &str) -> DomainResult<()> {
        if !self.password.verify(old) {
            return Err(DomainError::auth(
                ErrorCode::PasswordMismatch,
                "Current password is incorrect",
            ));
        }
        self.set_password(new)
    }

    pub fn set_password(&mut self, new: &str) -> DomainResult<()> {
        self.password = Password::new(new)?;
        self.password_changed_at = Utc::now();
        self.must_change_password = false;
        self.base.touch();
        self.base.record(EventPayload::UserPasswordChanged {
            username: self.username.clone(),
        });
        Ok(())
    }

    /// Require a new password at next login. The hash is untouched.
    pub fn force_password_change(&mut self) {
        self.must_change_password = true;
        self.base.touch();
    }

    // -------------------------------------------------------------------------
    // Role assignment
    // -------------------------------------------------------------------------

    pub fn assign_role(&mut self, role_id: Uuid) -> DomainResult<()> {
        if role_id.is_nil() {
            return Err(invalid_role_id());
        }
        if self.has_role(role_id) {
            return Err(DomainError::conflict(
                ErrorCode::RoleAlreadyAssigned,
                "Role is already assigned to user",
            ));
        }
        self.role_ids.push(role_id);
        self.base.touch();
        self.base.record(EventPayload::UserRoleAssigned {
            username: self.username.clone(),
            role_id,
        });
        Ok(())
    }

    pub fn remove_role(&mut self, role_id: Uuid) -> DomainResult<()> {
        let Some(idx) = self.role_ids.iter().position(|id| *id == role_id) else {
            return Err(DomainError::not_found(
                ErrorCode::RoleNotAssigned,
                "Role is not assigned to user",
            ));
        };
        self.role_ids.remove(idx);
        self.base.touch();
        self.base.record(EventPayload::UserRoleRemoved {
            username: self.username.clone(),
            role_id,
        });
        Ok(())
    }

    /// Replace all role assignments, keeping first-seen order.
    pub fn set_roles(&mut self, role_ids: &[Uuid]) -> DomainResult<()> {
        if role_ids.iter().any(Uuid::is_nil) {
            return Err(invalid_role_id());
        }
        let mut unique = Vec::with_capacity(role_ids.len());
        for id in role_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        self.role_ids = unique;
        self.base.touch();
        Ok(())
    }

    pub fn has_role(&self, role_id: Uuid) -> bool {
        self.role_ids.contains(&role_id)
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    pub fn activate(&mut self) -> DomainResult<()> {
        if self.status == UserStatus::Active {
            return Err(DomainError::state(
                ErrorCode::AlreadyActive,
                "User is already active",
            ));
        }
        self.failed_attempts = 0;
        self.locked_until = None;
        self.transition(UserStatus::Active);
        self.base.touch();
        Ok(())
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if self.status == UserStatus::Deactivated {
            return Err(DomainError::state(
                ErrorCode::AlreadyDeactivated,
                "User is already deactivated",
            ));
        }
        self.locked_until = None;
        self.base.record(EventPayload::UserDeactivated {
            username: self.username.clone(),
        });
        self.transition(UserStatus::Deactivated);
        self.base.touch();
        Ok(())
    }

    /// Lock the account. A zero or negative duration locks until [`User::unlock`].
    pub fn lock(&mut self, duration: Duration) -> DomainResult<()> {
        if self.status == UserStatus::Deactivated {
            return Err(DomainError::state(
                ErrorCode::UserDeactivated,
                "Cannot lock a deactivated user",
            ));
        }
        self.apply_lock(duration);
        self.base.touch();
        Ok(())
    }

    pub fn unlock(&mut self) -> DomainResult<()> {
        if self.status != UserStatus::Locked {
            return Err(DomainError::state(ErrorCode::NotLocked, "User is not locked"));
        }
        self.failed_attempts = 0;
        self.locked_until = None;
        self.transition(UserStatus::Active);
        self.base.touch();
        Ok(())
    }

    /// Unlock when the stored status is `locked` but the lock has elapsed.
    /// Returns whether the state changed.
    pub fn release_expired_lock_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == UserStatus::Locked && !self.is_locked_at(now) {
            return self.unlock().is_ok();
        }
        false
    }

    /// A duration past the representable range locks indefinitely.
    fn apply_lock(&mut self, duration: Duration) {
        self.locked_until = if duration > Duration::zero() {
            Utc::now().checked_add_signed(duration)
        } else {
            None
        };
        self.transition(UserStatus::Locked);
    }

    fn transition(&mut self, new_status: UserStatus) {
        let old_status = self.status;
        self.status = new_status;
        self.base.record(EventPayload::UserStatusChanged {
            username: self.username.clone(),
            old_status,
            new_status,
        });
    }

    // -------------------------------------------------------------------------
    // Login bookkeeping
    // -------------------------------------------------------------------------

    pub fn record_login_success(&mut self, ip: &str) {
        self.last_login_at = Some(Utc::now());
        self.last_login_ip = ip.to_string();
        self.failed_attempts = 0;
        self.base.touch();
    }

    /// Count a failed login and lock once `max_attempts` is reached.
    /// Returns `true` only on the call that locked the account.
    pub fn record_login_failure(&mut self, max_attempts: u32, lock_duration: Duration) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        let locks = self.failed_attempts >= max_attempts
            && self.status != UserStatus::Deactivated
            && !self.is_locked();
        if locks {
            self.apply_lock(lock_duration);
        }
        self.base.touch();
        locks
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != UserStatus::Locked {
            return false;
        }
        match self.locked_until {
            None => true,
            Some(until) => now < until,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now())
    }

    pub fn can_login_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            UserStatus::Deactivated | UserStatus::Pending => false,
            _ => !self.is_locked_at(now),
        }
    }

    pub fn can_login(&self) -> bool {
        self.can_login_at(Utc::now())
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_pending(&self) -> bool {
        self.status == UserStatus::Pending
    }

    pub fn is_deactivated(&self) -> bool {
        self.status == UserStatus::Deactivated
    }
}

impl Aggregate for User {
    fn base(&self) -> &AggregateBase {
        &self.base
    }
}

/// Trim, check and lowercase a username.
pub fn normalize_username(username: &str) -> DomainResult<String> {
    let username = username.trim();
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidUsername,
            format!("Username must be at least {MIN_USERNAME_LENGTH} characters"),
        ));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(DomainError::validation(
            ErrorCode::InvalidUsername,
            format!("Username cannot exceed {MAX_USERNAME_LENGTH} characters"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(DomainError::validation(
            ErrorCode::InvalidUsername,
            "Username can only contain letters, numbers, underscores, hyphens, and dots",
        ));
    }
    Ok(username.to_lowercase())
}

fn bounded(value: &str, max: usize, code: ErrorCode, field: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(DomainError::validation(
            code,
            format!("{field} cannot exceed {max} characters"),
        ));
    }
    Ok(value.to_string())
}

fn invalid_role_id() -> DomainError {
    DomainError::validation(ErrorCode::InvalidRoleId, "Role ID cannot be empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::INITIAL_VERSION;
    use crate::error::ErrorKind;

    const PASSWORD: &str = "Password123";

    fn pending() -> User {
        User::create(Uuid::new_v4(), "TestUser", PASSWORD).unwrap()
    }

    fn active() -> User {
        User::create_active(Uuid::new_v4(), "alice", PASSWORD).unwrap()
    }

    fn status_changes(user: &mut User) -> Vec<(UserStatus, UserStatus)> {
        user.drain_events()
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::UserStatusChanged {
                    old_status,
                    new_status,
                    ..
                } => Some((old_status, new_status)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pending_user_activates_once() {
        let mut user = pending();
        assert_eq!(user.username(), "testuser");
        assert_eq!(user.status(), UserStatus::Pending);
        assert_eq!(user.version(), INITIAL_VERSION);
        assert!(!user.can_login());

        user.activate().unwrap();
        assert!(user.is_active());

        let err = user.activate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyActive);
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn test_create_validates_username_and_password() {
        let tenant = Uuid::new_v4();
        for name in ["ab", "bad name", "semi;colon", &"a".repeat(101)] {
            let err = User::create(tenant, name, PASSWORD).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidUsername, "{name}");
        }
        assert!(User::create(tenant, "john.doe-1_x", PASSWORD).is_ok());

        let err = User::create(tenant, "bob", "password").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPassword);
    }

    #[test]
    fn test_lockout_after_max_failures() {
        let mut user = active();
        let lock = Duration::minutes(15);

        for attempt in 1..5 {
            assert!(!user.record_login_failure(5, lock), "attempt {attempt}");
            assert_eq!(user.failed_attempts(), attempt);
            assert!(!user.is_locked());
        }

        assert!(user.record_login_failure(5, lock));
        assert_eq!(user.status(), UserStatus::Locked);
        assert!(user.is_locked());
        assert!(!user.can_login());
    }

    #[test]
    fn test_failure_that_locks_bumps_version_once() {
        let mut user = active();
        let before = user.version();
        assert!(user.record_login_failure(1, Duration::minutes(1)));
        assert_eq!(user.version(), before + 1);
    }

    #[test]
    fn test_indefinite_lock() {
        let mut user = active();
        user.lock(Duration::zero()).unwrap();

        assert!(user.locked_until().is_none());
        assert!(user.is_locked());
        assert!(user.is_locked_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_unrepresentable_lock_is_indefinite() {
        let mut user = active();
        user.lock(Duration::MAX).unwrap();

        assert!(user.locked_until().is_none());
        assert!(user.is_locked());
    }

    #[test]
    fn test_timed_lock_expires_lazily() {
        let mut user = active();
        user.lock(Duration::minutes(10)).unwrap();
        let until = user.locked_until().unwrap();

        assert!(user.is_locked_at(until - Duration::seconds(1)));
        assert!(!user.is_locked_at(until));
        assert!(!user.is_locked_at(until + Duration::seconds(1)));
        assert_eq!(user.status(), UserStatus::Locked);
        assert!(user.can_login_at(until));
    }

    #[test]
    fn test_release_expired_lock() {
        let mut user = active();
        user.lock(Duration::minutes(10)).unwrap();
        let until = user.locked_until().unwrap();

        assert!(!user.release_expired_lock_at(until - Duration::seconds(1)));
        assert!(user.release_expired_lock_at(until));
        assert_eq!(user.status(), UserStatus::Active);
        assert!(user.locked_until().is_none());
    }

    #[test]
    fn test_lock_rejected_for_deactivated_user() {
        let mut user = active();
        user.deactivate().unwrap();

        let err = user.lock(Duration::minutes(1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserDeactivated);
        assert!(!user.record_login_failure(1, Duration::minutes(1)));
        assert_eq!(user.status(), UserStatus::Deactivated);
    }

    #[test]
    fn test_unlock_resets_counters() {
        let mut user = active();
        assert_eq!(user.unlock().unwrap_err().code(), ErrorCode::NotLocked);

        user.record_login_failure(2, Duration::minutes(5));
        user.record_login_failure(2, Duration::minutes(5));
        user.unlock().unwrap();

        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.failed_attempts(), 0);
        assert!(user.locked_until().is_none());
    }

    #[test]
    fn test_activate_from_locked_clears_lock() {
        let mut user = active();
        user.lock(Duration::minutes(5)).unwrap();
        user.drain_events();

        user.activate().unwrap();
        assert!(user.locked_until().is_none());
        assert_eq!(
            status_changes(&mut user),
            vec![(UserStatus::Locked, UserStatus::Active)]
        );
    }

    #[test]
    fn test_deactivate_emits_both_events() {
        let mut user = active();
        user.drain_events();

        user.deactivate().unwrap();
        let types: Vec<_> = user.pending_events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["UserDeactivated", "UserStatusChanged"]);

        let err = user.deactivate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyDeactivated);
        assert!(!user.can_login());
    }

    #[test]
    fn test_change_password_round_trip() {
        let mut user = active();
        let err = user.change_password("Wrong1234", "NewPassword9").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PasswordMismatch);

        user.force_password_change();
        user.change_password(PASSWORD, "NewPassword9").unwrap();

        assert!(user.verify_password("NewPassword9"));
        assert!(!user.verify_password(PASSWORD));
        assert!(!user.must_change_password());
    }

    #[test]
    fn test_force_password_change_keeps_hash() {
        let mut user = active();
        let hash = user.password_hash().to_string();
        user.force_password_change();
        assert!(user.must_change_password());
        assert_eq!(user.password_hash(), hash);
    }

    #[test]
    fn test_role_assignment() {
        let mut user = active();
        let role = Uuid::new_v4();

        assert_eq!(user.assign_role(Uuid::nil()).unwrap_err().code(), ErrorCode::InvalidRoleId);
        user.assign_role(role).unwrap();
        assert_eq!(
            user.assign_role(role).unwrap_err().code(),
            ErrorCode::RoleAlreadyAssigned
        );

        user.remove_role(role).unwrap();
        assert_eq!(user.remove_role(role).unwrap_err().code(), ErrorCode::RoleNotAssigned);
    }

    #[test]
    fn test_set_roles_dedups_and_rejects_nil() {
        let mut user = active();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        user.set_roles(&[a, b, a]).unwrap();
        assert_eq!(user.role_ids(), [a, b]);

        let version = user.version();
        assert!(user.set_roles(&[a, Uuid::nil()]).is_err());
        assert_eq!(user.role_ids(), [a, b]);
        assert_eq!(user.version(), version);
    }

    #[test]
    fn test_profile_setters() {
        let mut user = active();
        user.set_email(" Alice@Example.COM ").unwrap();
        assert_eq!(user.email(), "alice@example.com");
        assert_eq!(user.set_email("not-an-email").unwrap_err().code(), ErrorCode::InvalidEmail);
        user.set_email("").unwrap();
        assert_eq!(user.email(), "");

        assert!(user.set_phone(&"1".repeat(51)).is_err());
        assert!(user.set_avatar(&"a".repeat(501)).is_err());
        assert_eq!(user.display_name_or_username(), "alice");
        user.set_display_name("Alice A.").unwrap();
        assert_eq!(user.display_name_or_username(), "Alice A.");
    }

    #[test]
    fn test_login_success_resets_failures() {
        let mut user = active();
        user.record_login_failure(5, Duration::minutes(1));
        user.record_login_success("10.0.0.1");

        assert_eq!(user.failed_attempts(), 0);
        assert_eq!(user.last_login_ip(), "10.0.0.1");
        assert!(user.last_login_at().is_some());
    }

    #[test]
    fn test_every_mutation_bumps_version_once() {
        let mut user = active();
        let mut expected = user.version();
        let role = Uuid::new_v4();

        let steps: Vec<Box<dyn Fn(&mut User)>> = vec![
            Box::new(|u| u.set_email("a@b.io").unwrap()),
            Box::new(|u| u.set_phone("123").unwrap()),
            Box::new(|u| u.set_display_name("A").unwrap()),
            Box::new(|u| u.set_avatar("http://x/y.png").unwrap()),
            Box::new(|u| u.set_notes("n")),
            Box::new(|u| u.set_department(Some(Uuid::new_v4()))),
            Box::new(|u| u.force_password_change()),
            Box::new(move |u| u.assign_role(role).unwrap()),
            Box::new(move |u| u.remove_role(role).unwrap()),
            Box::new(move |u| u.set_roles(&[role]).unwrap()),
            Box::new(|u| u.lock(Duration::minutes(1)).unwrap()),
            Box::new(|u| u.unlock().unwrap()),
            Box::new(|u| u.record_login_success("1.1.1.1")),
            Box::new(|u| {
                u.record_login_failure(9, Duration::minutes(1));
            }),
            Box::new(|u| u.deactivate().unwrap()),
            Box::new(|u| u.activate().unwrap()),
        ];

        for step in steps {
            step(&mut user);
            expected += 1;
            assert_eq!(user.version(), expected);
        }
    }

    #[test]
    fn test_record_round_trip() {
        let mut user = active();
        user.set_email("alice@example.com").unwrap();
        user.lock(Duration::minutes(3)).unwrap();

        let restored = User::restore(user.to_record());
        assert_eq!(restored.id(), user.id());
        assert_eq!(restored.version(), user.version());
        assert_eq!(restored.status(), UserStatus::Locked);
        assert_eq!(restored.locked_until(), user.locked_until());
        assert!(restored.verify_password(PASSWORD));
        assert!(restored.pending_events().is_empty());
    }

    #[test]
    fn test_unrelated_mutation_isolation() {
        let mut user = active();
        let role = Uuid::new_v4();
        user.assign_role(role).unwrap();
        user.set_email("alice@example.com").unwrap();

        user.set_phone("555-0100").unwrap();

        assert_eq!(user.email(), "alice@example.com");
        assert_eq!(user.role_ids(), [role]);
        assert_eq!(user.status(), UserStatus::Active);
        assert_eq!(user.failed_attempts(), 0);
    }
}
