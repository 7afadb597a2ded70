//! Permission catalog: role → permission bundles and the
//! operation → required-permission table.
//!
//! Both tables are `'static` and read-only after process start. Roles exist
//! for operator convenience; gating is always done against the individual
//! permission strings, so new operations can be guarded without redefining
//! roles.

use std::collections::BTreeSet;

use crate::permissions::Permission;
use crate::roles::Role;

// Fulfillment (staff).
pub const PROCESS_ORDERS: &str = "process_orders";
pub const UPDATE_ORDER_STATUS: &str = "update_order_status";
pub const VIEW_ORDERS: &str = "view_orders";

// Storefront (member).
pub const PLACE_ORDERS: &str = "place_orders";
pub const CANCEL_OWN_ORDER: &str = "cancel_own_order";
pub const VIEW_OWN_ORDERS: &str = "view_own_orders";

// Administration.
pub const MANAGE_USERS: &str = "manage_users";
pub const REVOKE_SESSIONS: &str = "revoke_sessions";
pub const VIEW_RBAC: &str = "view_rbac";

/// Staff bundle: the narrow fulfillment list - redeem/process claim codes,
/// move order status forward, read any order. Nothing else.
const STAFF_BUNDLE: &[&str] = &[PROCESS_ORDERS, UPDATE_ORDER_STATUS, VIEW_ORDERS];

/// Member bundle: place and follow their own orders.
const MEMBER_BUNDLE: &[&str] = &[PLACE_ORDERS, CANCEL_OWN_ORDER, VIEW_OWN_ORDERS];

/// Admin bundle: everything staff can do, plus identity and session
/// administration. Admin accounts are not shoppers, so the member bundle is
/// deliberately absent.
const ADMIN_BUNDLE: &[&str] = &[
    PROCESS_ORDERS,
    UPDATE_ORDER_STATUS,
    VIEW_ORDERS,
    MANAGE_USERS,
    REVOKE_SESSIONS,
    VIEW_RBAC,
];

/// Permission bundle for a role.
pub fn permissions_for_role(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => ADMIN_BUNDLE,
        Role::Staff => STAFF_BUNDLE,
        Role::Member => MEMBER_BUNDLE,
    }
}

/// The same bundle as typed [`Permission`] claims (what gets embedded in a
/// token at issuance).
pub fn role_claims(role: Role) -> Vec<Permission> {
    permissions_for_role(role)
        .iter()
        .map(|p| Permission::new(*p))
        .collect()
}

/// Union of every role's bundle.
pub fn all_permissions() -> BTreeSet<&'static str> {
    Role::ALL
        .iter()
        .flat_map(|r| permissions_for_role(*r).iter().copied())
        .collect()
}

/// Guarded operations, named for the route/action they protect.
pub mod operations {
    pub const ORDER_PLACE: &str = "orders.place";
    pub const ORDER_REDEEM: &str = "orders.redeem";
    pub const ORDER_CONFIRM: &str = "orders.confirm";
    pub const ORDER_ADVANCE_STATUS: &str = "orders.advance_status";
    pub const ORDER_CANCEL_ANY: &str = "orders.cancel_any";
    pub const ORDER_CANCEL_OWN: &str = "orders.cancel_own";
    pub const ORDER_VIEW_ANY: &str = "orders.view_any";
    pub const ORDER_VIEW_OWN: &str = "orders.view_own";
    pub const USERS_MANAGE: &str = "users.manage";
    pub const SESSIONS_REVOKE: &str = "sessions.revoke";
    pub const RBAC_VIEW: &str = "rbac.view";
}

/// Static operation → required-permission table.
///
/// Unknown operations yield `None`; the enforcement layer treats that as a
/// deny (nothing is guarded implicitly).
pub fn required_permission(operation: &str) -> Option<&'static str> {
    match operation {
        operations::ORDER_PLACE => Some(PLACE_ORDERS),
        operations::ORDER_REDEEM => Some(PROCESS_ORDERS),
        operations::ORDER_CONFIRM => Some(UPDATE_ORDER_STATUS),
        operations::ORDER_ADVANCE_STATUS => Some(UPDATE_ORDER_STATUS),
        operations::ORDER_CANCEL_ANY => Some(UPDATE_ORDER_STATUS),
        operations::ORDER_CANCEL_OWN => Some(CANCEL_OWN_ORDER),
        operations::ORDER_VIEW_ANY => Some(VIEW_ORDERS),
        operations::ORDER_VIEW_OWN => Some(VIEW_OWN_ORDERS),
        operations::USERS_MANAGE => Some(MANAGE_USERS),
        operations::SESSIONS_REVOKE => Some(REVOKE_SESSIONS),
        operations::RBAC_VIEW => Some(VIEW_RBAC),
        _ => None,
    }
}
