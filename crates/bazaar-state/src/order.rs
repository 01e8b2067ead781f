//! # Order Model
//!
//! An [`Order`] owns its line items, its derived total, and an append-only
//! history log. Fields are private: the status moves only through
//! [`crate::OrderStateMachine`], and the total is recomputed whenever the
//! items change. Orders are never deleted; cancellation is a status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{Money, OrderId, ProductId, Role, UserId, ValidationError};

use crate::status::OrderStatus;

/// Upper bound on line items per order.
pub const MAX_LINE_ITEMS: usize = 200;

/// Order construction and mutation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("an order must contain at least one line item")]
    NoItems,

    #[error("an order may contain at most {MAX_LINE_ITEMS} line items")]
    TooManyItems,

    #[error("line item for product {0} must have a positive quantity")]
    ZeroQuantity(String),

    #[error("line items can only change while the order is pending (current: {0})")]
    ItemsLocked(OrderStatus),

    #[error("order record is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One product line. The unit price is captured when the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn subtotal(&self) -> Result<Money, ValidationError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2.
    pub country: String,
}

impl ShippingAddress {
    fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::Field(format!(
                    "shippingAddress.{field} must not be empty"
                )));
            }
        }
        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::Field(format!(
                "shippingAddress.country must be a two-letter code, got \"{}\"",
                self.country
            )));
        }
        Ok(())
    }
}

/// Payment state, tracked alongside the order status but owned by the
/// payments service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub actor: UserId,
    pub actor_role: Role,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An order and its full status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    owner: UserId,
    items: Vec<LineItem>,
    total_amount: Money,
    status: OrderStatus,
    payment_status: PaymentStatus,
    shipping_address: ShippingAddress,
    #[serde(default)]
    tracking_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    history: Vec<HistoryEntry>,
}

fn validate_items(items: &[LineItem]) -> Result<Money, OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    if items.len() > MAX_LINE_ITEMS {
        return Err(OrderError::TooManyItems);
    }
    let mut subtotals = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::ZeroQuantity(item.product_id.as_str().to_string()));
        }
        subtotals.push(item.subtotal()?);
    }
    Ok(Money::checked_sum(subtotals)?)
}

impl Order {
    /// Place a new order. The order starts in the initial status with an
    /// empty history and version 1.
    pub fn create(
        owner: UserId,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        let total_amount = validate_items(&items)?;
        shipping_address.validate()?;
        Ok(Self {
            id: OrderId::new(),
            owner,
            items,
            total_amount,
            status: OrderStatus::INITIAL,
            payment_status: PaymentStatus::Unpaid,
            shipping_address,
            tracking_reference: None,
            created_at: now,
            updated_at: now,
            version: 1,
            history: Vec::new(),
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn tracking_reference(&self) -> Option<&str> {
        self.tracking_reference.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Incremented on every accepted mutation. Writers compare-and-set on it.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// Replace the line items and recompute the total. Only allowed while the
    /// order is still in the initial status.
    pub fn replace_items(
        &self,
        items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if self.status != OrderStatus::INITIAL {
            return Err(OrderError::ItemsLocked(self.status));
        }
        let total_amount = validate_items(&items)?;
        let mut next = self.clone();
        next.items = items;
        next.total_amount = total_amount;
        next.updated_at = now;
        next.version += 1;
        Ok(next)
    }

    /// Apply an accepted transition. Callers go through the state machine.
    pub(crate) fn push_transition(
        &mut self,
        entry: HistoryEntry,
        tracking_reference: Option<String>,
    ) {
        self.status = entry.new_status;
        self.updated_at = entry.at;
        if tracking_reference.is_some() {
            self.tracking_reference = tracking_reference;
        }
        self.history.push(entry);
        self.version += 1;
    }

    /// The sequence of statuses this order has held, oldest first, as
    /// reconstructed from the history log.
    pub fn status_sequence(&self) -> Vec<OrderStatus> {
        let mut sequence = vec![OrderStatus::INITIAL];
        sequence.extend(self.history.iter().map(|e| e.new_status));
        sequence
    }

    /// Whether the history chain starts at the initial status, links each
    /// entry's previous status to the prior entry's new status, and ends at
    /// the current status.
    pub fn history_is_consistent(&self) -> bool {
        let mut current = OrderStatus::INITIAL;
        for entry in &self.history {
            if entry.previous_status != current {
                return false;
            }
            current = entry.new_status;
        }
        current == self.status
    }

    /// Check a record read back from storage.
    pub fn verify_integrity(&self) -> Result<(), OrderError> {
        let expected = validate_items(&self.items)?;
        if expected != self.total_amount {
            return Err(OrderError::Corrupt(format!(
                "order {} total {} does not match line items ({expected})",
                self.id, self.total_amount
            )));
        }
        if !self.history_is_consistent() {
            return Err(OrderError::Corrupt(format!(
                "order {} history does not reconstruct status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}
