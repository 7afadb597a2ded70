//! User identity aggregate (event-sourced).
//!
//! A single identity record with a `role` discriminator and a role-specific
//! profile bundle - no subtype hierarchy. Users are deactivated, never
//! deleted: orders and reviews keep referencing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookforge_core::{Aggregate, AggregateRoot, DomainError, UserId};
use bookforge_events::Event;

use crate::roles::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Role-specific attributes, selected by tagged variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Member {
        joined_at: DateTime<Utc>,
        orders_placed: u64,
    },
    Staff,
    Admin,
}

impl Profile {
    pub fn for_role(role: Role, now: DateTime<Utc>) -> Self {
        match role {
            Role::Member => Profile::Member {
                joined_at: now,
                orders_placed: 0,
            },
            Role::Staff => Profile::Staff,
            Role::Admin => Profile::Admin,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User identity.
///
/// # Invariants
/// - Exactly one role per user; only an admin actor may change it.
/// - Email is normalized to lowercase at registration (uniqueness is a
///   read-model concern, enforced at the registration boundary).
/// - Deactivated users cannot mutate their identity or place orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    pub profile: Profile,
    pub version: u64,
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            email: String::new(),
            display_name: String::new(),
            role: Role::Member,
            password_hash: String::new(),
            active: false,
            profile: Profile::Staff,
            version: 0,
            created: false,
        }
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.active {
            return Err(DomainError::invariant("user is deactivated"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command to register a new identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Hash produced by the external password facility; never the raw password.
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to update mutable profile data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to change a user's role (admin only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRole {
    pub user_id: UserId,
    pub role: Role,
    /// Role of the actor performing the change (escalation check).
    pub actor_role: Role,
    pub occurred_at: DateTime<Utc>,
}

/// Command to deactivate a user (soft delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateUser {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command to reactivate a deactivated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactivateUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to record that a member placed an order (profile counter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOrderPlaced {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All user commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    UpdateProfile(UpdateProfile),
    ChangeRole(ChangeRole),
    Deactivate(DeactivateUser),
    Reactivate(ReactivateUser),
    RecordOrderPlaced(RecordOrderPlaced),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub display_name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChanged {
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeactivated {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReactivated {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecorded {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// All user events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    ProfileUpdated(ProfileUpdated),
    RoleChanged(RoleChanged),
    Deactivated(UserDeactivated),
    Reactivated(UserReactivated),
    OrderRecorded(OrderRecorded),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "identity.user.registered",
            UserEvent::ProfileUpdated(_) => "identity.user.profile_updated",
            UserEvent::RoleChanged(_) => "identity.user.role_changed",
            UserEvent::Deactivated(_) => "identity.user.deactivated",
            UserEvent::Reactivated(_) => "identity.user.reactivated",
            UserEvent::OrderRecorded(_) => "identity.user.order_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::RoleChanged(e) => e.occurred_at,
            UserEvent::Deactivated(e) => e.occurred_at,
            UserEvent::Reactivated(e) => e.occurred_at,
            UserEvent::OrderRecorded(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => self.apply_registered(e),
            UserEvent::ProfileUpdated(e) => self.apply_profile_updated(e),
            UserEvent::RoleChanged(e) => self.apply_role_changed(e),
            UserEvent::Deactivated(_) => self.active = false,
            UserEvent::Reactivated(_) => self.active = true,
            UserEvent::OrderRecorded(_) => self.apply_order_recorded(),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::ChangeRole(cmd) => self.handle_change_role(cmd),
            UserCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            UserCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
            UserCommand::RecordOrderPlaced(cmd) => self.handle_record_order(cmd),
        }
    }
}

impl User {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invariant("user already exists"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash missing"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            role: cmd.role,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: cmd.user_id,
            display_name: cmd.display_name.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_role(&self, cmd: &ChangeRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        // Only admins may move identities between roles.
        if cmd.actor_role != Role::Admin {
            return Err(DomainError::Unauthorized);
        }

        if cmd.role == self.role {
            return Err(DomainError::invariant("role already assigned"));
        }

        Ok(vec![UserEvent::RoleChanged(RoleChanged {
            user_id: cmd.user_id,
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        if !self.active {
            return Err(DomainError::invariant("user already deactivated"));
        }

        Ok(vec![UserEvent::Deactivated(UserDeactivated {
            user_id: cmd.user_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        if self.active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Reactivated(UserReactivated {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_order(&self, cmd: &RecordOrderPlaced) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        self.ensure_active()?;

        if self.role != Role::Member {
            return Err(DomainError::invariant("only members place orders"));
        }

        Ok(vec![UserEvent::OrderRecorded(OrderRecorded {
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Appliers
    // ─────────────────────────────────────────────────────────────────────────

    fn apply_registered(&mut self, e: &UserRegistered) {
        self.id = e.user_id;
        self.email = e.email.clone();
        self.display_name = e.display_name.clone();
        self.role = e.role;
        self.password_hash = e.password_hash.clone();
        self.active = true;
        self.profile = Profile::for_role(e.role, e.occurred_at);
        self.created = true;
    }

    fn apply_profile_updated(&mut self, e: &ProfileUpdated) {
        self.display_name = e.display_name.clone();
    }

    fn apply_role_changed(&mut self, e: &RoleChanged) {
        self.role = e.role;
        // Switching roles swaps the attribute bundle; member history lives in
        // the event stream, not the snapshot.
        self.profile = Profile::for_role(e.role, e.occurred_at);
    }

    fn apply_order_recorded(&mut self) {
        if let Profile::Member { orders_placed, .. } = &mut self.profile {
            *orders_placed += 1;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_user(role: Role) -> User {
        let user_id = UserId::new();
        let mut user = User::empty(user_id);
        let cmd = UserCommand::Register(RegisterUser {
            user_id,
            email: "Reader@Example.com".to_string(),
            display_name: "Avid Reader".to_string(),
            role,
            password_hash: "$argon2id$stub".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }
        user
    }

    #[test]
    fn register_normalizes_email_and_starts_active() {
        let user = registered_user(Role::Member);
        assert!(user.active);
        assert_eq!(user.email, "reader@example.com");
        assert!(matches!(user.profile, Profile::Member { orders_placed: 0, .. }));
    }

    #[test]
    fn register_rejects_invalid_email() {
        let user_id = UserId::new();
        let user = User::empty(user_id);
        let cmd = UserCommand::Register(RegisterUser {
            user_id,
            email: "not-an-email".to_string(),
            display_name: "X".to_string(),
            role: Role::Member,
            password_hash: "h".to_string(),
            occurred_at: now(),
        });
        assert!(user.handle(&cmd).is_err());
    }

    #[test]
    fn register_twice_is_an_invariant_violation() {
        let user = registered_user(Role::Member);
        let cmd = UserCommand::Register(RegisterUser {
            user_id: user.id,
            email: "again@example.com".to_string(),
            display_name: "Again".to_string(),
            role: Role::Member,
            password_hash: "h".to_string(),
            occurred_at: now(),
        });
        assert!(user.handle(&cmd).is_err());
    }

    #[test]
    fn only_admin_actor_may_change_role() {
        let user = registered_user(Role::Member);

        let by_staff = UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: Role::Staff,
            actor_role: Role::Staff,
            occurred_at: now(),
        });
        assert!(matches!(
            user.handle(&by_staff).unwrap_err(),
            DomainError::Unauthorized
        ));

        let by_admin = UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: Role::Staff,
            actor_role: Role::Admin,
            occurred_at: now(),
        });
        assert_eq!(user.handle(&by_admin).unwrap().len(), 1);
    }

    #[test]
    fn role_change_swaps_profile_bundle() {
        let mut user = registered_user(Role::Member);
        let cmd = UserCommand::ChangeRole(ChangeRole {
            user_id: user.id,
            role: Role::Staff,
            actor_role: Role::Admin,
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }
        assert_eq!(user.role, Role::Staff);
        assert_eq!(user.profile, Profile::Staff);
    }

    #[test]
    fn deactivated_user_cannot_mutate() {
        let mut user = registered_user(Role::Member);
        let cmd = UserCommand::Deactivate(DeactivateUser {
            user_id: user.id,
            reason: "account closure request".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }
        assert!(!user.active);

        let update = UserCommand::UpdateProfile(UpdateProfile {
            user_id: user.id,
            display_name: "New Name".to_string(),
            occurred_at: now(),
        });
        assert!(user.handle(&update).is_err());

        // Double-deactivation is detectable, not silent.
        let again = UserCommand::Deactivate(DeactivateUser {
            user_id: user.id,
            reason: "again".to_string(),
            occurred_at: now(),
        });
        assert!(user.handle(&again).is_err());
    }

    #[test]
    fn reactivate_restores_access() {
        let mut user = registered_user(Role::Member);
        for event in user
            .handle(&UserCommand::Deactivate(DeactivateUser {
                user_id: user.id,
                reason: "test".to_string(),
                occurred_at: now(),
            }))
            .unwrap()
        {
            user.apply(&event);
        }
        for event in user
            .handle(&UserCommand::Reactivate(ReactivateUser {
                user_id: user.id,
                occurred_at: now(),
            }))
            .unwrap()
        {
            user.apply(&event);
        }
        assert!(user.active);
    }

    #[test]
    fn order_counter_tracks_member_placements() {
        let mut user = registered_user(Role::Member);
        for _ in 0..3 {
            for event in user
                .handle(&UserCommand::RecordOrderPlaced(RecordOrderPlaced {
                    user_id: user.id,
                    occurred_at: now(),
                }))
                .unwrap()
            {
                user.apply(&event);
            }
        }
        assert!(matches!(user.profile, Profile::Member { orders_placed: 3, .. }));
    }

    #[test]
    fn staff_cannot_record_order_placement() {
        let user = registered_user(Role::Staff);
        let cmd = UserCommand::RecordOrderPlaced(RecordOrderPlaced {
            user_id: user.id,
            occurred_at: now(),
        });
        assert!(user.handle(&cmd).is_err());
    }
}
