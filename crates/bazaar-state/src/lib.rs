//! # bazaar-state: Order Lifecycle
//!
//! Owns every rule about how an order's status may change.
//!
//! - **Status registry** (`status.rs`): the closed set of statuses, the
//!   transition graph, and per-status display metadata (color, sort order,
//!   active flag).
//! - **Order** (`order.rs`): line items, derived total, and the append-only
//!   history log. Fields are private; status only changes through the
//!   state machine.
//! - **State machine** (`machine.rs`): adjacency lookup, active-status check,
//!   and the per-role transition permissions.
//!
//! ## Transition Graph
//!
//! ```text
//! pending ──▶ confirmed ──▶ processing ──▶ shipped ──▶ delivered
//!    │            │              │             │
//!    └────────────┴──────────────┴─▶ cancelled └──▶ returned
//! ```
//!
//! `delivered`, `cancelled` and `returned` are terminal.
//!
//! Nothing in this crate performs I/O. Persistence and concurrency control
//! (compare-and-set on the order version) live in the order service.

pub mod machine;
pub mod order;
pub mod status;

pub use machine::{Actor, OrderStateMachine, TransitionError, TransitionRequest};
pub use order::{HistoryEntry, LineItem, Order, OrderError, PaymentStatus, ShippingAddress};
pub use status::{OrderStatus, RegistryError, StatusDescriptor, StatusRegistry, StatusUpdate};
