//! # Order Operations
//!
//! Every order mutation goes through here:
//!
//! ```text
//! snapshot = store.get(id)            visibility check → NotFound
//! next     = machine.transition(...)  InvalidTransition / Forbidden
//! db::orders::update(.., snapshot.version)   Conflict if the row moved
//! store.install(next)                        only after the row accepted it
//! ```
//!
//! With a database the row's version column is the compare-and-set, and the
//! in-memory store is updated only once the write has landed, so memory never
//! holds a version the database refused. Without one, `store.commit` does the
//! compare-and-set under one short write lock. No lock is held across the
//! database write.
//!
//! Order staff (admin, sales-staff) see every order. Everyone else sees only
//! the orders they own, and someone else's order is reported as missing.

use std::future::Future;

use chrono::Utc;

use bazaar_core::{OrderId, Role, UserId};
use bazaar_state::{
    Actor, LineItem, Order, OrderStateMachine, OrderStatus, ShippingAddress, StatusDescriptor,
    StatusUpdate, TransitionRequest,
};

use crate::db;
use crate::error::AppError;
use crate::query::OrderFilter;
use crate::state::{AppState, OrderStore, StoreError};

/// A validated order placement.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Set only when staff place an order on a customer's behalf.
    pub owner: Option<UserId>,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
}

fn can_see(actor: &Actor, order: &Order) -> bool {
    actor.role.is_order_staff() || order.is_owned_by(&actor.id)
}

/// Fetch an order the actor is allowed to see.
pub fn visible_order(state: &AppState, id: OrderId, actor: &Actor) -> Result<Order, AppError> {
    state
        .orders
        .get(id)
        .filter(|order| can_see(actor, order))
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Restrict a list or stats filter to what the actor may see.
pub fn scope_filter(actor: &Actor, filter: &mut OrderFilter) -> Result<(), AppError> {
    if actor.role.is_order_staff() {
        return Ok(());
    }
    match &filter.user_id {
        Some(user) if user != &actor.id => Err(AppError::Forbidden(
            "customers may only list their own orders".into(),
        )),
        _ => {
            filter.user_id = Some(actor.id.clone());
            Ok(())
        }
    }
}

fn check_prices(state: &AppState, items: &[LineItem]) -> Result<(), AppError> {
    match &state.prices {
        Some(prices) => Ok(prices.check(items)?),
        None => Ok(()),
    }
}

/// Place an order in the initial status. The total is computed from the
/// line items.
pub async fn create_order(
    state: &AppState,
    actor: &Actor,
    new: NewOrder,
) -> Result<Order, AppError> {
    let owner = match new.owner {
        Some(owner) if owner != actor.id && !actor.role.is_order_staff() => {
            return Err(AppError::Forbidden(
                "only order staff may place orders for another user".into(),
            ))
        }
        Some(owner) => owner,
        None => actor.id.clone(),
    };
    check_prices(state, &new.items)?;
    let order = Order::create(owner, new.items, new.shipping_address, Utc::now())?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = db::orders::insert(pool, &order).await {
            tracing::error!(order_id = %order.id(), error = %e, "failed to persist new order");
            return Err(AppError::Internal("order could not be persisted".into()));
        }
    }
    state.orders.insert(order.clone());

    tracing::info!(
        order_id = %order.id(),
        owner = %order.owner(),
        total = %order.total_amount(),
        items = order.items().len(),
        "order created"
    );
    Ok(order)
}

/// Move an order to a new status.
pub async fn transition(
    state: &AppState,
    id: OrderId,
    request: &TransitionRequest,
    actor: &Actor,
) -> Result<Order, AppError> {
    let snapshot = visible_order(state, id, actor)?;
    apply_transition(state, &snapshot, request, actor).await
}

/// Validate a transition against `snapshot` and commit it iff the stored
/// order is still at the snapshot's version.
pub async fn apply_transition(
    state: &AppState,
    snapshot: &Order,
    request: &TransitionRequest,
    actor: &Actor,
) -> Result<Order, AppError> {
    let registry = state.registry();
    let next = OrderStateMachine::new(&registry).transition(snapshot, request, actor, Utc::now())?;
    let committed = commit(state, snapshot, next).await?;

    tracing::info!(
        order_id = %committed.id(),
        from = %snapshot.status(),
        to = %committed.status(),
        subject = %actor.id,
        role = %actor.role.as_str(),
        version = committed.version(),
        "order transitioned"
    );
    Ok(committed)
}

/// Replace the line items of a pending order and recompute its total.
pub async fn replace_items(
    state: &AppState,
    id: OrderId,
    items: Vec<LineItem>,
    actor: &Actor,
) -> Result<Order, AppError> {
    let snapshot = visible_order(state, id, actor)?;
    check_prices(state, &items)?;
    let next = snapshot.replace_items(items, Utc::now())?;
    let committed = commit(state, &snapshot, next).await?;

    tracing::info!(
        order_id = %committed.id(),
        total = %committed.total_amount(),
        items = committed.items().len(),
        version = committed.version(),
        "order items replaced"
    );
    Ok(committed)
}

/// Statuses the order may move to next, ignoring the caller's role.
pub fn next_statuses(state: &AppState, order: &Order) -> Vec<StatusDescriptor> {
    let registry = state.registry();
    OrderStateMachine::new(&registry)
        .next_valid_statuses(order)
        .into_iter()
        .filter_map(|status| registry.descriptor(status).cloned())
        .collect()
}

/// Edit a status's display metadata. Admin only.
pub async fn update_status(
    state: &AppState,
    status: OrderStatus,
    update: StatusUpdate,
    actor: &Actor,
) -> Result<StatusDescriptor, AppError> {
    if actor.role != Role::Admin {
        return Err(AppError::Forbidden(format!(
            "role 'admin' required, caller has '{}'",
            actor.role.as_str()
        )));
    }

    let descriptor = state
        .edit_registry(|mut registry| async move {
            let descriptor = registry.apply(status, &update)?.clone();
            if let Some(pool) = &state.db_pool {
                if let Err(e) = db::statuses::upsert(pool, &descriptor, Utc::now()).await {
                    tracing::error!(%status, error = %e, "failed to persist status descriptor");
                    return Err(AppError::Internal(
                        "status update could not be persisted".into(),
                    ));
                }
            }
            Ok::<_, AppError>((registry, descriptor))
        })
        .await?;

    tracing::info!(
        %status,
        active = descriptor.active,
        sort_order = descriptor.sort_order,
        subject = %actor.id,
        "status descriptor updated"
    );
    Ok(descriptor)
}

async fn commit(state: &AppState, snapshot: &Order, next: Order) -> Result<Order, AppError> {
    match &state.db_pool {
        None => Ok(state.orders.commit(snapshot.version(), next)?),
        Some(pool) => {
            commit_durable(&state.orders, snapshot.version(), next, |order, expected| async move {
                db::orders::update(pool, &order, expected).await
            })
            .await
        }
    }
}

/// Persist first, then install. The row's version check picks the winner,
/// and memory only ever holds versions the database accepted.
async fn commit_durable<F, Fut>(
    orders: &OrderStore,
    expected_version: u64,
    next: Order,
    persist: F,
) -> Result<Order, AppError>
where
    F: FnOnce(Order, u64) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    let id = next.id();
    match orders.get(id) {
        None => return Err(StoreError::NotFound(id).into()),
        Some(current) if current.version() != expected_version => {
            return Err(StoreError::Conflict {
                id,
                expected: expected_version,
                actual: current.version(),
            }
            .into())
        }
        Some(_) => {}
    }

    match persist(next.clone(), expected_version).await {
        Ok(true) => {
            if !orders.install(next.clone()) {
                tracing::warn!(
                    order_id = %id,
                    version = next.version(),
                    "newer version already in memory"
                );
            }
            Ok(next)
        }
        Ok(false) => {
            tracing::warn!(
                order_id = %id,
                expected_version,
                "stored order moved on; update rejected"
            );
            Err(AppError::Conflict(format!("order {id} was modified concurrently")))
        }
        Err(e) => {
            tracing::error!(order_id = %id, error = %e, "failed to persist order update");
            Err(AppError::Internal("order update could not be persisted".into()))
        }
    }
}
