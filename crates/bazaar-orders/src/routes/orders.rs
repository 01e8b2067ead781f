//! Order endpoints.
//!
//! | Method | Path                     | Operation                         |
//! |--------|--------------------------|-----------------------------------|
//! | POST   | `/`                      | place an order                    |
//! | GET    | `/`                      | list with filter, page and sort   |
//! | GET    | `/stats`                 | counts per status and revenue     |
//! | GET    | `/{id}`                  | one order                         |
//! | GET    | `/{id}/history`          | status history                    |
//! | GET    | `/{id}/next-statuses`    | legal next statuses               |
//! | POST   | `/{id}/transitions`      | change status                     |
//! | PUT    | `/{id}/items`            | replace line items while pending  |

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use bazaar_core::{Money, OrderId, ProductId, UserId};
use bazaar_state::{
    HistoryEntry, LineItem, Order, OrderStatus, ShippingAddress, StatusDescriptor,
    TransitionRequest,
};

use super::{extract_json, extract_query};
use crate::auth::Caller;
use crate::error::AppError;
use crate::query::{self, ListParams, OrderFilter, OrderStats, Page, PageRequest, Sort};
use crate::service::{self, NewOrder};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/stats", get(order_stats))
        .route("/{id}", get(get_order))
        .route("/{id}/history", get(order_history))
        .route("/{id}/next-statuses", get(next_statuses))
        .route("/{id}/transitions", post(transition_order))
        .route("/{id}/items", put(replace_items))
}

// -- Request / response bodies ------------------------------------------------

/// A line item as submitted. Amounts are minor units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LineItemInput {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl LineItemInput {
    fn into_line_item(self) -> Result<LineItem, AppError> {
        Ok(LineItem {
            product_id: ProductId::new(&self.product_id)?,
            quantity: self.quantity,
            unit_price: Money::from_minor(self.unit_price)?,
        })
    }
}

fn line_items(inputs: Vec<LineItemInput>) -> Result<Vec<LineItem>, AppError> {
    inputs.into_iter().map(LineItemInput::into_line_item).collect()
}

/// The total is always computed; a body carrying one is rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub items: Vec<LineItemInput>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplaceItemsRequest {
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionBody {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tracking_reference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStatusesResponse {
    pub current: OrderStatus,
    pub next: Vec<StatusDescriptor>,
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    Ok(OrderId::parse(raw)?)
}

// -- Handlers -----------------------------------------------------------------

/// POST /: place an order owned by the caller.
async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let req = extract_json(body)?;
    let new = NewOrder {
        owner: req.owner_id.as_deref().map(UserId::new).transpose()?,
        items: line_items(req.items)?,
        shipping_address: req.shipping_address,
    };
    let order = service::create_order(&state, &caller.actor(), new).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /: list visible orders.
async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<Order>>, AppError> {
    let params = extract_query(params)?;
    let mut filter = OrderFilter::from_params(&params)?;
    let page = PageRequest::from_params(&params)?;
    let sort = Sort::from_params(&params)?;
    service::scope_filter(&caller.actor(), &mut filter)?;

    let registry = state.registry();
    Ok(Json(query::list(
        state.orders.list(),
        &filter,
        page,
        sort,
        &registry,
    )))
}

/// GET /stats: aggregates over the same filter `list` accepts.
async fn order_stats(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<OrderStats>, AppError> {
    let params = extract_query(params)?;
    let mut filter = OrderFilter::from_params(&params)?;
    service::scope_filter(&caller.actor(), &mut filter)?;

    let registry = state.registry();
    let orders = state.orders.list();
    Ok(Json(query::stats(&orders, &filter, &registry)))
}

/// GET /{id}
async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let id = parse_order_id(&id)?;
    Ok(Json(service::visible_order(&state, id, &caller.actor())?))
}

/// GET /{id}/history
async fn order_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = parse_order_id(&id)?;
    let order = service::visible_order(&state, id, &caller.actor())?;
    Ok(Json(HistoryResponse {
        order_id: order.id(),
        status: order.status(),
        history: order.history().to_vec(),
    }))
}

/// GET /{id}/next-statuses
async fn next_statuses(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<NextStatusesResponse>, AppError> {
    let id = parse_order_id(&id)?;
    let order = service::visible_order(&state, id, &caller.actor())?;
    Ok(Json(NextStatusesResponse {
        current: order.status(),
        next: service::next_statuses(&state, &order),
    }))
}

/// POST /{id}/transitions: `{status, note?, trackingReference?}`.
async fn transition_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<TransitionBody>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let id = parse_order_id(&id)?;
    let req = extract_json(body)?;
    let request = TransitionRequest {
        target: req.status.parse()?,
        note: req.note,
        tracking_reference: req.tracking_reference,
    };
    let order = service::transition(&state, id, &request, &caller.actor()).await?;
    Ok(Json(order))
}

/// PUT /{id}/items
async fn replace_items(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<ReplaceItemsRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let id = parse_order_id(&id)?;
    let req = extract_json(body)?;
    let items = line_items(req.items)?;
    let order = service::replace_items(&state, id, items, &caller.actor()).await?;
    Ok(Json(order))
}
