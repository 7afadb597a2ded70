//! Infrastructure wiring and application services.
//!
//! `AppServices` owns the dispatcher, read models, session store, password
//! facility, and token issuer. Handlers call these methods; domain decisions
//! stay inside the aggregates.
//!
//! Committed events are applied to the projections synchronously after each
//! dispatch (read-your-writes for the request that caused them) *and* by the
//! background bus subscriber. Projections are idempotent, so the double
//! delivery is harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use bookforge_auth::user::{
    ChangeRole, DeactivateUser, ReactivateUser, RecordOrderPlaced, RegisterUser, UpdateProfile,
    User, UserCommand,
};
use bookforge_auth::{
    IssuedIdentity, Role, TokenConfig, TokenIssuer, TokenValidator, role_claims,
};
use bookforge_core::{OrderId, SessionId, UserId};
use bookforge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use bookforge_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use bookforge_infra::event_store::{InMemoryEventStore, StoredEvent};
use bookforge_infra::password::{Argon2Facility, PasswordFacility};
use bookforge_infra::projections::{OrderReadModel, OrdersProjection, UserReadModel, UsersProjection};
use bookforge_infra::session_store::{SessionStore, token_fingerprint};
use bookforge_orders::{
    AdvanceStatus, CancelOrder, ClaimCode, ConfirmOrder, DEFAULT_CLAIM_CODE_LEN, Discount, Order,
    OrderCommand, OrderLine, OrderStatus, PlaceOrder, RedeemOrder,
};

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

const USER_AGGREGATE: &str = "identity.user";
const ORDER_AGGREGATE: &str = "orders.order";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("email already registered")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    Password(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchErrorWrapper),
}

/// `DispatchError` is not `std::error::Error`; wrap it for `thiserror`.
#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct DispatchErrorWrapper(pub DispatchError);

#[derive(Debug, Error)]
pub enum LoginError {
    /// Unknown email, wrong password, or deactivated account - one
    /// indistinguishable answer for all three.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("login failed: {0}")]
    Internal(String),
}

/// Everything a client needs after login; permissions are echoed so UI
/// decisions don't require decoding the token.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub user_id: UserId,
    pub token: String,
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
    pub permissions: Vec<String>,
}

pub struct AppServices {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
    pub users: Arc<UsersProjection>,
    pub orders: Arc<OrdersProjection>,
    pub sessions: Arc<SessionStore>,
    passwords: Arc<dyn PasswordFacility>,
    issuer: TokenIssuer,
    claim_code_len: usize,
}

/// Build the in-memory service graph and start the bus → projections
/// subscriber.
pub fn build_services(config: TokenConfig) -> (Arc<AppServices>, Arc<TokenValidator>) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let users: Arc<UsersProjection> = Arc::new(UsersProjection::new());
    let orders: Arc<OrdersProjection> = Arc::new(OrdersProjection::new());

    // Background subscriber: bus -> projections (at-least-once, idempotent).
    {
        let sub = bus.subscribe();
        let users = users.clone();
        let orders = orders.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let result = match env.aggregate_type() {
                            USER_AGGREGATE => users.apply_envelope(&env).map_err(|e| e.to_string()),
                            ORDER_AGGREGATE => orders.apply_envelope(&env).map_err(|e| e.to_string()),
                            _ => Ok(()),
                        };
                        if let Err(e) = result {
                            tracing::warn!("projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let validator = Arc::new(TokenValidator::new(&config));
    let issuer = TokenIssuer::new(config);

    let services = Arc::new(AppServices {
        dispatcher: CommandDispatcher::new(store, bus),
        users,
        orders,
        sessions: Arc::new(SessionStore::new()),
        passwords: Arc::new(Argon2Facility::new()),
        issuer,
        claim_code_len: DEFAULT_CLAIM_CODE_LEN,
    });

    services.bootstrap_admin_from_env();

    (services, validator)
}

impl AppServices {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    /// Public self-registration: always a member.
    pub fn register_member(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, RegistrationError> {
        self.register(email, password, display_name, Role::Member)
    }

    /// Admin provisioning path: any role.
    pub fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<UserId, RegistrationError> {
        // Uniqueness backstop at the boundary; the read model is the
        // email directory.
        if self.users.email_taken(email) {
            return Err(RegistrationError::EmailTaken);
        }

        let password_hash = self
            .passwords
            .hash_password(password)
            .map_err(|e| RegistrationError::Password(e.to_string()))?;

        let user_id = UserId::new();
        let committed = self
            .dispatcher
            .dispatch::<User>(
                user_id.into(),
                USER_AGGREGATE,
                UserCommand::Register(RegisterUser {
                    user_id,
                    email: email.to_string(),
                    display_name: display_name.to_string(),
                    role,
                    password_hash,
                    occurred_at: Utc::now(),
                }),
                |id| User::empty(id.into()),
            )
            .map_err(DispatchErrorWrapper)?;
        self.project(&committed);

        tracing::info!(user_id = %user_id, role = %role, "user registered");
        Ok(user_id)
    }

    /// Verify credentials, mint a session, and issue a token whose claims
    /// carry the role's full permission bundle.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginSuccess, LoginError> {
        let user = self
            .users
            .find_by_email(email)
            .ok_or(LoginError::InvalidCredentials)?;

        if !user.active {
            return Err(LoginError::InvalidCredentials);
        }

        if !self.passwords.verify_password(password, &user.password_hash) {
            return Err(LoginError::InvalidCredentials);
        }

        let permissions = role_claims(user.role);
        let identity = IssuedIdentity {
            user_id: user.user_id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            permissions: permissions.clone(),
        };

        // The session id is minted first so the token can embed it; the
        // session then stores the issued token's fingerprint.
        let session_id = SessionId::new();
        let now = Utc::now();
        let issued = self
            .issuer
            .issue(&identity, session_id, now)
            .map_err(|e| LoginError::Internal(e.to_string()))?;

        self.sessions.create(
            session_id,
            user.user_id,
            token_fingerprint(&issued.token),
            self.issuer.ttl(),
            now,
        );

        tracing::info!(user_id = %user.user_id, session_id = %session_id, "login");

        Ok(LoginSuccess {
            user_id: user.user_id,
            token: issued.token,
            session_id,
            expires_at: issued.expires_at,
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
        })
    }

    /// Revoke the presented session. Idempotent.
    pub fn logout(&self, session_id: SessionId) {
        if self.sessions.revoke(session_id).is_ok() {
            tracing::info!(session_id = %session_id, "logout");
        }
    }

    pub fn revoke_user_sessions(&self, user_id: UserId) -> usize {
        let revoked = self.sessions.revoke_all(user_id);
        tracing::info!(user_id = %user_id, revoked, "sessions revoked");
        revoked
    }

    pub fn update_display_name(
        &self,
        user_id: UserId,
        display_name: &str,
    ) -> Result<(), DispatchError> {
        let committed = self.dispatcher.dispatch::<User>(
            user_id.into(),
            USER_AGGREGATE,
            UserCommand::UpdateProfile(UpdateProfile {
                user_id,
                display_name: display_name.to_string(),
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;
        self.project(&committed);
        Ok(())
    }

    pub fn change_role(
        &self,
        user_id: UserId,
        role: Role,
        actor_role: Role,
    ) -> Result<(), DispatchError> {
        let committed = self.dispatcher.dispatch::<User>(
            user_id.into(),
            USER_AGGREGATE,
            UserCommand::ChangeRole(ChangeRole {
                user_id,
                role,
                actor_role,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;
        self.project(&committed);

        // A role change invalidates the permission bundle embedded in any
        // outstanding token for this user.
        self.revoke_user_sessions(user_id);
        Ok(())
    }

    pub fn deactivate_user(&self, user_id: UserId, reason: &str) -> Result<(), DispatchError> {
        let committed = self.dispatcher.dispatch::<User>(
            user_id.into(),
            USER_AGGREGATE,
            UserCommand::Deactivate(DeactivateUser {
                user_id,
                reason: reason.to_string(),
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;
        self.project(&committed);
        self.revoke_user_sessions(user_id);
        Ok(())
    }

    pub fn reactivate_user(&self, user_id: UserId) -> Result<(), DispatchError> {
        let committed = self.dispatcher.dispatch::<User>(
            user_id.into(),
            USER_AGGREGATE,
            UserCommand::Reactivate(ReactivateUser {
                user_id,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;
        self.project(&committed);
        Ok(())
    }

    pub fn user_by_id(&self, user_id: &UserId) -> Option<UserReadModel> {
        self.users.find_by_id(user_id)
    }

    pub fn users_list(&self) -> Vec<UserReadModel> {
        self.users.list()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Member checkout: freezes totals/discount and generates the claim code.
    pub fn place_order(
        &self,
        member_id: UserId,
        lines: Vec<OrderLine>,
        discounts: Vec<Discount>,
    ) -> Result<OrderReadModel, DispatchError> {
        let order_id = OrderId::new();
        let claim_code = ClaimCode::generate(self.claim_code_len);

        let committed = self.dispatcher.dispatch::<Order>(
            order_id.into(),
            ORDER_AGGREGATE,
            OrderCommand::Place(PlaceOrder {
                order_id,
                member_id,
                lines,
                discounts,
                claim_code,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )?;
        self.project(&committed);

        tracing::info!(order_id = %order_id, member_id = %member_id, "order placed");

        // Advisory member counter; the order itself is already durable.
        let counter = self.dispatcher.dispatch::<User>(
            member_id.into(),
            USER_AGGREGATE,
            UserCommand::RecordOrderPlaced(RecordOrderPlaced {
                user_id: member_id,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        );
        match counter {
            Ok(committed) => self.project(&committed),
            Err(e) => tracing::warn!(member_id = %member_id, "order counter update failed: {e:?}"),
        }

        self.orders
            .find_by_id(&order_id)
            .ok_or(DispatchError::NotFound)
    }

    /// Staff redemption: the claim code releases the order exactly once.
    pub fn redeem_order(
        &self,
        order_id: OrderId,
        supplied_code: &str,
        staff_id: UserId,
    ) -> Result<OrderReadModel, DispatchError> {
        let committed = self.dispatcher.dispatch::<Order>(
            order_id.into(),
            ORDER_AGGREGATE,
            OrderCommand::Redeem(RedeemOrder {
                order_id,
                supplied_code: supplied_code.to_string(),
                staff_id,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )?;
        self.project(&committed);

        tracing::info!(order_id = %order_id, staff_id = %staff_id, "order redeemed");

        self.orders
            .find_by_id(&order_id)
            .ok_or(DispatchError::NotFound)
    }

    pub fn confirm_order(
        &self,
        order_id: OrderId,
        staff_id: UserId,
    ) -> Result<OrderReadModel, DispatchError> {
        let committed = self.dispatcher.dispatch::<Order>(
            order_id.into(),
            ORDER_AGGREGATE,
            OrderCommand::Confirm(ConfirmOrder {
                order_id,
                staff_id,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )?;
        self.project(&committed);

        self.orders
            .find_by_id(&order_id)
            .ok_or(DispatchError::NotFound)
    }

    pub fn advance_order_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        staff_id: UserId,
    ) -> Result<OrderReadModel, DispatchError> {
        let committed = self.dispatcher.dispatch::<Order>(
            order_id.into(),
            ORDER_AGGREGATE,
            OrderCommand::AdvanceStatus(AdvanceStatus {
                order_id,
                to,
                staff_id,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )?;
        self.project(&committed);

        self.orders
            .find_by_id(&order_id)
            .ok_or(DispatchError::NotFound)
    }

    pub fn cancel_order(
        &self,
        order_id: OrderId,
        cancelled_by: UserId,
        staff_override: bool,
    ) -> Result<OrderReadModel, DispatchError> {
        let committed = self.dispatcher.dispatch::<Order>(
            order_id.into(),
            ORDER_AGGREGATE,
            OrderCommand::Cancel(CancelOrder {
                order_id,
                cancelled_by,
                staff_override,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )?;
        self.project(&committed);

        tracing::info!(order_id = %order_id, cancelled_by = %cancelled_by, "order cancelled");

        self.orders
            .find_by_id(&order_id)
            .ok_or(DispatchError::NotFound)
    }

    pub fn order_by_id(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.orders.find_by_id(order_id)
    }

    pub fn orders_by_status(&self, status: Option<OrderStatus>) -> Vec<OrderReadModel> {
        match status {
            Some(status) => self.orders.find_by_status(status),
            None => self.orders.list(),
        }
    }

    pub fn orders_by_member(
        &self,
        member_id: UserId,
        status: Option<OrderStatus>,
    ) -> Vec<OrderReadModel> {
        self.orders
            .find_by_member(member_id)
            .into_iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wiring helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Synchronously fold committed events into the read models so the
    /// request that caused them can read its own writes.
    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let env = stored.to_envelope();
            let result = match env.aggregate_type() {
                USER_AGGREGATE => self.users.apply_envelope(&env).map_err(|e| e.to_string()),
                ORDER_AGGREGATE => self.orders.apply_envelope(&env).map_err(|e| e.to_string()),
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::warn!("projection apply failed: {e}");
            }
        }
    }

    /// Seed the first admin account from the environment, if configured and
    /// not already present.
    fn bootstrap_admin_from_env(&self) {
        let (Ok(email), Ok(password)) = (
            std::env::var("BOOKFORGE_ADMIN_EMAIL"),
            std::env::var("BOOKFORGE_ADMIN_PASSWORD"),
        ) else {
            return;
        };

        if self.users.email_taken(&email) {
            return;
        }

        match self.register(&email, &password, "Administrator", Role::Admin) {
            Ok(user_id) => tracing::info!(user_id = %user_id, "bootstrap admin provisioned"),
            Err(e) => tracing::error!("bootstrap admin failed: {e}"),
        }
    }
}
