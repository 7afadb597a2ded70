use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookforge_core::{Aggregate, AggregateRoot, BookId, DomainError, OrderId, UserId};
use bookforge_events::Event;

use crate::claim::ClaimCode;
use crate::discount::{Discount, discount_amount_cents, effective_rate_bps};

/// Order status lifecycle.
///
/// `Completed` and `Cancelled` are terminal; status only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// A redeemable order can still release inventory against its code.
    pub fn is_redeemable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Order line: book, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: BookId,
    pub quantity: u32,
    /// Price in smallest currency unit (cents).
    pub unit_price_cents: u64,
}

impl OrderLine {
    pub fn total_cents(&self) -> u64 {
        u64::from(self.quantity) * self.unit_price_cents
    }
}

/// Aggregate root: Order.
///
/// # Invariants
/// - The claim code is generated at placement and never changes.
/// - Totals and the applied discount are frozen at placement.
/// - Transitions are forward-only; terminal states accept no command.
/// - Exactly one redemption can succeed (enforced here by the redeemable
///   check, and across concurrent requests by the store's version check).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    member_id: Option<UserId>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total_cents: u64,
    discount_cents: u64,
    claim_code: Option<ClaimCode>,
    placed_at: Option<DateTime<Utc>>,
    processed_by: Option<UserId>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            member_id: None,
            status: OrderStatus::Pending,
            lines: Vec::new(),
            total_cents: 0,
            discount_cents: 0,
            claim_code: None,
            placed_at: None,
            processed_by: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn member_id(&self) -> Option<UserId> {
        self.member_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_cents(&self) -> u64 {
        self.total_cents
    }

    pub fn discount_cents(&self) -> u64 {
        self.discount_cents
    }

    pub fn claim_code(&self) -> Option<&ClaimCode> {
        self.claim_code.as_ref()
    }

    pub fn processed_by(&self) -> Option<UserId> {
        self.processed_by
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

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

/// Command: place an order (member checkout).
///
/// The claim code is generated at the service boundary and carried in, so
/// decision logic stays pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub member_id: UserId,
    pub lines: Vec<OrderLine>,
    /// Candidate discounts supplied by the promotions collaborator.
    pub discounts: Vec<Discount>,
    pub claim_code: ClaimCode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: confirm an order (partial-fulfillment staging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub order_id: OrderId,
    pub staff_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: redeem the claim code and release inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemOrder {
    pub order_id: OrderId,
    pub supplied_code: String,
    pub staff_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: move status one step forward without a claim code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceStatus {
    pub order_id: OrderId,
    pub to: OrderStatus,
    pub staff_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: cancel an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub cancelled_by: UserId,
    /// Staff/admin path: any non-terminal order, regardless of ownership.
    /// Member path: own order, while still pending.
    pub staff_override: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    Place(PlaceOrder),
    Confirm(ConfirmOrder),
    Redeem(RedeemOrder),
    AdvanceStatus(AdvanceStatus),
    Cancel(CancelOrder),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub member_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    /// Frozen at placement; later discount changes never touch this.
    pub discount_cents: u64,
    pub claim_code: ClaimCode,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub order_id: OrderId,
    pub staff_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub order_id: OrderId,
    pub staff_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    Placed(OrderPlaced),
    Confirmed(OrderConfirmed),
    Completed(OrderCompleted),
    Cancelled(OrderCancelled),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "orders.order.placed",
            OrderEvent::Confirmed(_) => "orders.order.confirmed",
            OrderEvent::Completed(_) => "orders.order.completed",
            OrderEvent::Cancelled(_) => "orders.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.occurred_at,
            OrderEvent::Confirmed(e) => e.occurred_at,
            OrderEvent::Completed(e) => e.occurred_at,
            OrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::Placed(e) => {
                self.id = e.order_id;
                self.member_id = Some(e.member_id);
                self.status = OrderStatus::Pending;
                self.lines = e.lines.clone();
                self.total_cents = e.total_cents;
                self.discount_cents = e.discount_cents;
                self.claim_code = Some(e.claim_code.clone());
                self.placed_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::Confirmed(e) => {
                self.status = OrderStatus::Confirmed;
                self.updated_at = Some(e.occurred_at);
            }
            OrderEvent::Completed(e) => {
                self.status = OrderStatus::Completed;
                self.processed_by = Some(e.staff_id);
                self.updated_at = Some(e.occurred_at);
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::Place(cmd) => self.handle_place(cmd),
            OrderCommand::Confirm(cmd) => self.handle_confirm(cmd),
            OrderCommand::Redeem(cmd) => self.handle_redeem(cmd),
            OrderCommand::AdvanceStatus(cmd) => self.handle_advance(cmd),
            OrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Order {
    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if line.unit_price_cents == 0 {
                return Err(DomainError::validation("unit_price must be positive"));
            }
        }

        if cmd.claim_code.as_str().is_empty() {
            return Err(DomainError::validation("claim code cannot be empty"));
        }

        let total_cents: u64 = cmd.lines.iter().map(OrderLine::total_cents).sum();
        let rate = effective_rate_bps(&cmd.discounts);
        let discount_cents = discount_amount_cents(total_cents, rate);

        Ok(vec![OrderEvent::Placed(OrderPlaced {
            order_id: cmd.order_id,
            member_id: cmd.member_id,
            lines: cmd.lines.clone(),
            total_cents,
            discount_cents,
            claim_code: cmd.claim_code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        if self.status != OrderStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot confirm order in status '{}'",
                self.status
            )));
        }

        Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
            order_id: cmd.order_id,
            staff_id: cmd.staff_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_redeem(&self, cmd: &RedeemOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        // State is checked before the code: a replay against a completed or
        // cancelled order is a transition error, and reveals nothing about
        // whether the code would have matched.
        if !self.status.is_redeemable() {
            return Err(DomainError::invalid_transition(format!(
                "cannot redeem order in status '{}'",
                self.status
            )));
        }

        let code = self
            .claim_code
            .as_ref()
            .ok_or_else(|| DomainError::invariant("order has no claim code"))?;
        if !code.matches(&cmd.supplied_code) {
            return Err(DomainError::ClaimCodeMismatch);
        }

        Ok(vec![OrderEvent::Completed(OrderCompleted {
            order_id: cmd.order_id,
            staff_id: cmd.staff_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvanceStatus) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        // Forward-only, one step at a time. Cancellation has its own command,
        // and the usual completion path is redemption.
        match (self.status, cmd.to) {
            (OrderStatus::Pending, OrderStatus::Confirmed) => {
                Ok(vec![OrderEvent::Confirmed(OrderConfirmed {
                    order_id: cmd.order_id,
                    staff_id: cmd.staff_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            (OrderStatus::Confirmed, OrderStatus::Completed) => {
                Ok(vec![OrderEvent::Completed(OrderCompleted {
                    order_id: cmd.order_id,
                    staff_id: cmd.staff_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            (from, to) => Err(DomainError::invalid_transition(format!(
                "cannot move order from '{from}' to '{to}'"
            ))),
        }
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }

        // Terminal orders (cancelled included) reject the command outright so
        // double-cancel bugs stay visible to callers.
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel order in status '{}'",
                self.status
            )));
        }

        if !cmd.staff_override {
            if self.member_id != Some(cmd.cancelled_by) {
                return Err(DomainError::Unauthorized);
            }
            if self.status != OrderStatus::Pending {
                return Err(DomainError::invalid_transition(format!(
                    "members can only cancel pending orders (status is '{}')",
                    self.status
                )));
            }
        }

        Ok(vec![OrderEvent::Cancelled(OrderCancelled {
            order_id: cmd.order_id,
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
