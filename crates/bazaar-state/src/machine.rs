//! # Order State Machine
//!
//! Status changes are adjacency lookups in [`OrderStatus::adjacent`], never
//! free-form assignment. A requested transition is checked in a fixed order:
//!
//! 1. The target must be in the current status's adjacency set
//!    (`InvalidTransition`).
//! 2. The target must be active in the registry (`InvalidTransition`).
//! 3. The actor's role must permit this transition class (`Forbidden`).
//!
//! On acceptance the machine returns a new [`Order`] with one more history
//! entry, the new status, a new `updated_at`, and a bumped version. The input
//! order is never modified, so a rejected transition leaves no trace.
//!
//! ## Permissions
//!
//! | Role                  | May perform                                  |
//! |-----------------------|----------------------------------------------|
//! | admin, sales-staff    | every transition the graph allows            |
//! | customer (owner only) | `pending → cancelled`                        |
//! | technician, repair    | nothing                                      |

use chrono::{DateTime, Utc};
use thiserror::Error;

use bazaar_core::{ErrorKind, Role, UserId, ValidationError};

use crate::order::{HistoryEntry, Order};
use crate::status::{OrderStatus, StatusRegistry};

/// Longest free-text note or tracking reference accepted on a transition.
pub const MAX_NOTE_LEN: usize = 1_000;

/// Who is asking for a transition. The role is the freshly resolved one,
/// not the role claimed in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    pub note: Option<String>,
    pub tracking_reference: Option<String>,
}

impl TransitionRequest {
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            note: None,
            tracking_reference: None,
        }
    }
}

/// Transition rejections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot move order from {from} to {to}; allowed: [{}]", fmt_statuses(.allowed))]
    NotAdjacent {
        from: OrderStatus,
        to: OrderStatus,
        allowed: Vec<OrderStatus>,
    },

    #[error("status {0} is inactive and cannot be assigned")]
    InactiveTarget(OrderStatus),

    #[error("role {role} may not move order from {from} to {to}")]
    Forbidden {
        role: Role,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn fmt_statuses(statuses: &[OrderStatus]) -> String {
    statuses
        .iter()
        .map(OrderStatus::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl TransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAdjacent { .. } | Self::InactiveTarget(_) => ErrorKind::InvalidTransition,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

fn validate_text(field: &str, value: &Option<String>) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.len() > MAX_NOTE_LEN => Err(ValidationError::Field(format!(
            "{field} exceeds {MAX_NOTE_LEN} characters"
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Validates and applies transitions against a status registry.
#[derive(Debug, Clone, Copy)]
pub struct OrderStateMachine<'a> {
    registry: &'a StatusRegistry,
}

impl<'a> OrderStateMachine<'a> {
    pub fn new(registry: &'a StatusRegistry) -> Self {
        Self { registry }
    }

    /// Whether `actor` may move `order` to `target`, assuming the edge exists.
    pub fn is_permitted(order: &Order, target: OrderStatus, actor: &Actor) -> bool {
        if actor.role.is_order_staff() {
            return true;
        }
        actor.role == Role::Customer
            && order.is_owned_by(&actor.id)
            && order.status() == OrderStatus::Pending
            && target == OrderStatus::Cancelled
    }

    /// Validate `request` against `order` and return the updated order.
    pub fn transition(
        &self,
        order: &Order,
        request: &TransitionRequest,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Order, TransitionError> {
        let from = order.status();
        let to = request.target;

        if !from.can_reach(to) {
            return Err(TransitionError::NotAdjacent {
                from,
                to,
                allowed: from.adjacent().to_vec(),
            });
        }
        if !self.registry.is_active(to) {
            return Err(TransitionError::InactiveTarget(to));
        }
        if !Self::is_permitted(order, to, actor) {
            return Err(TransitionError::Forbidden {
                role: actor.role,
                from,
                to,
            });
        }

        let note = validate_text("note", &request.note)?;
        let tracking_reference = validate_text("trackingReference", &request.tracking_reference)?;

        let mut next = order.clone();
        next.push_transition(
            HistoryEntry {
                previous_status: from,
                new_status: to,
                actor: actor.id.clone(),
                actor_role: actor.role,
                at,
                note,
            },
            tracking_reference,
        );
        Ok(next)
    }

    /// Statuses reachable from the order's current status in one step,
    /// restricted to active statuses and ordered by sort order. Does not
    /// consider the caller's role.
    pub fn next_valid_statuses(&self, order: &Order) -> Vec<OrderStatus> {
        let mut next: Vec<OrderStatus> = order
            .status()
            .adjacent()
            .iter()
            .copied()
            .filter(|s| self.registry.is_active(*s))
            .collect();
        next.sort_by_key(|s| (self.registry.sort_order(*s), *s));
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LineItem, ShippingAddress};
    use crate::status::StatusUpdate;
    use bazaar_core::{Money, ProductId};
    use proptest::prelude::*;

    fn owner() -> UserId {
        UserId::new("customer-1").unwrap()
    }

    fn customer() -> Actor {
        Actor::new(owner(), Role::Customer)
    }

    fn admin() -> Actor {
        Actor::new(UserId::new("admin-1").unwrap(), Role::Admin)
    }

    fn new_order() -> Order {
        Order::create(
            owner(),
            vec![LineItem {
                product_id: ProductId::new("p-1").unwrap(),
                quantity: 2,
                unit_price: Money::from_minor(500).unwrap(),
            }],
            ShippingAddress {
                recipient: "Grace Hopper".into(),
                line1: "1 Compiler Way".into(),
                line2: None,
                city: "Arlington".into(),
                postal_code: "22201".into(),
                country: "US".into(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn drive(order: &Order, path: &[OrderStatus]) -> Order {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        path.iter().fold(order.clone(), |o, s| {
            machine
                .transition(&o, &TransitionRequest::to(*s), &admin(), Utc::now())
                .unwrap()
        })
    }

    #[test]
    fn customer_cancels_then_cannot_ship() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let order = new_order();

        let cancelled = machine
            .transition(
                &order,
                &TransitionRequest::to(OrderStatus::Cancelled),
                &customer(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(cancelled.history().len(), 1);

        let err = machine
            .transition(
                &cancelled,
                &TransitionRequest::to(OrderStatus::Shipped),
                &customer(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn customer_cannot_confirm() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let order = new_order();
        let err = machine
            .transition(
                &order,
                &TransitionRequest::to(OrderStatus::Confirmed),
                &customer(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn customer_cannot_cancel_after_confirmation() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let confirmed = drive(&new_order(), &[OrderStatus::Confirmed]);
        let err = machine
            .transition(
                &confirmed,
                &TransitionRequest::to(OrderStatus::Cancelled),
                &customer(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::Forbidden { .. }));
    }

    #[test]
    fn customer_cannot_cancel_someone_elses_order() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let stranger = Actor::new(UserId::new("customer-2").unwrap(), Role::Customer);
        let err = machine
            .transition(
                &new_order(),
                &TransitionRequest::to(OrderStatus::Cancelled),
                &stranger,
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn sales_staff_drive_full_lifecycle() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let staff = Actor::new(UserId::new("sales-1").unwrap(), Role::SalesStaff);
        let mut order = new_order();
        for target in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let request = TransitionRequest {
                target,
                note: None,
                tracking_reference: (target == OrderStatus::Shipped).then(|| "1Z999".to_string()),
            };
            order = machine.transition(&order, &request, &staff, Utc::now()).unwrap();
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.tracking_reference(), Some("1Z999"));
        assert_eq!(order.history().len(), 4);
        assert_eq!(order.version(), 5);
        assert!(order.history_is_consistent());
    }

    #[test]
    fn technician_and_repair_staff_cannot_transition() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        for role in [Role::Technician, Role::RepairStaff] {
            let actor = Actor::new(UserId::new("tech-1").unwrap(), role);
            let err = machine
                .transition(
                    &new_order(),
                    &TransitionRequest::to(OrderStatus::Confirmed),
                    &actor,
                    Utc::now(),
                )
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden, "{role}");
        }
    }

    #[test]
    fn adjacency_checked_before_permission() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let actor = Actor::new(UserId::new("tech-1").unwrap(), Role::Technician);
        let err = machine
            .transition(
                &new_order(),
                &TransitionRequest::to(OrderStatus::Delivered),
                &actor,
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn inactive_target_rejected() {
        let mut registry = StatusRegistry::standard();
        registry
            .apply(
                OrderStatus::Returned,
                &StatusUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let shipped = drive(
            &new_order(),
            &[
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipped,
            ],
        );
        let machine = OrderStateMachine::new(&registry);
        let err = machine
            .transition(
                &shipped,
                &TransitionRequest::to(OrderStatus::Returned),
                &admin(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, TransitionError::InactiveTarget(OrderStatus::Returned));
        assert_eq!(machine.next_valid_statuses(&shipped), vec![OrderStatus::Delivered]);
    }

    #[test]
    fn next_valid_statuses_follow_sort_order() {
        let mut registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        assert_eq!(
            machine.next_valid_statuses(&new_order()),
            vec![OrderStatus::Confirmed, OrderStatus::Cancelled]
        );

        registry
            .apply(
                OrderStatus::Cancelled,
                &StatusUpdate {
                    sort_order: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        let machine = OrderStateMachine::new(&registry);
        assert_eq!(
            machine.next_valid_statuses(&new_order()),
            vec![OrderStatus::Cancelled, OrderStatus::Confirmed]
        );
    }

    #[test]
    fn overlong_note_rejected() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let request = TransitionRequest {
            target: OrderStatus::Confirmed,
            note: Some("x".repeat(MAX_NOTE_LEN + 1)),
            tracking_reference: None,
        };
        let err = machine
            .transition(&new_order(), &request, &admin(), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn error_message_lists_allowed_targets() {
        let registry = StatusRegistry::standard();
        let machine = OrderStateMachine::new(&registry);
        let err = machine
            .transition(
                &new_order(),
                &TransitionRequest::to(OrderStatus::Shipped),
                &admin(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot move order from pending to shipped; allowed: [confirmed, cancelled]"
        );
    }

    fn arb_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn random_walk_keeps_history_consistent(
            steps in prop::collection::vec((arb_status(), arb_role()), 0..20)
        ) {
            let registry = StatusRegistry::standard();
            let machine = OrderStateMachine::new(&registry);
            let mut order = new_order();
            for (target, role) in steps {
                let actor = Actor::new(owner(), role);
                let before = order.clone();
                match machine.transition(&order, &TransitionRequest::to(target), &actor, Utc::now()) {
                    Ok(next) => {
                        prop_assert!(before.status().can_reach(target));
                        prop_assert_eq!(next.history().len(), before.history().len() + 1);
                        let last = next.history().last().unwrap();
                        prop_assert_eq!((last.previous_status, last.new_status), (before.status(), target));
                        prop_assert_eq!(next.version(), before.version() + 1);
                        order = next;
                    }
                    Err(TransitionError::NotAdjacent { .. }) => {
                        prop_assert!(!before.status().can_reach(target));
                    }
                    Err(TransitionError::Forbidden { .. }) => {
                        prop_assert!(!OrderStateMachine::is_permitted(&before, target, &actor));
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
                prop_assert!(order.history_is_consistent());
            }
            let sequence = order.status_sequence();
            prop_assert_eq!(*sequence.last().unwrap(), order.status());
        }

        #[test]
        fn terminal_statuses_absorb(target in arb_status(), role in arb_role()) {
            let registry = StatusRegistry::standard();
            let machine = OrderStateMachine::new(&registry);
            for path in [
                vec![OrderStatus::Cancelled],
                vec![OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered],
                vec![OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Returned],
            ] {
                let terminal = drive(&new_order(), &path);
                prop_assert!(terminal.status().is_terminal());
                let actor = Actor::new(owner(), role);
                let result = machine.transition(&terminal, &TransitionRequest::to(target), &actor, Utc::now());
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);
                prop_assert!(machine.next_valid_statuses(&terminal).is_empty());
            }
        }
    }
}
