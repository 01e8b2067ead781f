//! # Order Query Engine
//!
//! Read path only: filtering, offset pagination, allow-listed sorting, and
//! aggregate statistics. [`list`] and [`stats`] share [`OrderFilter`], so
//! stats for a filter always agree with summing the listed orders.
//!
//! Query parameters arrive as strings and are parsed here, so a bad value is
//! a `ValidationError` with a useful message rather than a generic rejection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{UserId, ValidationError};
use bazaar_state::{Order, OrderStatus, StatusRegistry};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw query parameters for listing and stats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

// ── Filter ──────────────────────────────────────────────────────────────────

/// Conjunctive filter. Absent fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    /// Inclusive lower bound on `createdAt`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `createdAt`.
    pub to: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn from_params(params: &ListParams) -> Result<Self, ValidationError> {
        let filter = Self {
            status: params
                .status
                .as_deref()
                .map(str::parse::<OrderStatus>)
                .transpose()?,
            user_id: params.user_id.as_deref().map(UserId::new).transpose()?,
            from: params.from.as_deref().map(|v| parse_time("from", v)).transpose()?,
            to: params.to.as_deref().map(|v| parse_time("to", v)).transpose()?,
        };
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ValidationError::Field(
                    "from must not be later than to".into(),
                ));
            }
        }
        Ok(filter)
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status() == s)
            && self.user_id.as_ref().map_or(true, |u| order.is_owned_by(u))
            && self.from.map_or(true, |from| order.created_at() >= from)
            && self.to.map_or(true, |to| order.created_at() < to)
    }
}

fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ValidationError::Field(format!("{field} must be an RFC 3339 timestamp: {e}")))
}

// ── Pagination ──────────────────────────────────────────────────────────────

/// A 1-based page request. `page_size` is already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn from_params(params: &ListParams) -> Result<Self, ValidationError> {
        let page = match params.page.as_deref() {
            Some(raw) => parse_positive("page", raw)?,
            None => 1,
        };
        let page_size = match params.page_size.as_deref() {
            Some(raw) => parse_positive("pageSize", raw)?.min(MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Self { page, page_size })
    }

    fn offset(&self) -> usize {
        (self.page as usize)
            .saturating_sub(1)
            .saturating_mul(self.page_size as usize)
    }
}

fn parse_positive(field: &str, raw: &str) -> Result<u32, ValidationError> {
    match raw.trim().parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ValidationError::Field(format!(
            "{field} must be a positive integer, got \"{raw}\""
        ))),
    }
}

// ── Sorting ─────────────────────────────────────────────────────────────────

/// Allow-listed sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    TotalAmount,
    /// By the registry's sort order, not by name.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            key: SortKey::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl Sort {
    pub fn from_params(params: &ListParams) -> Result<Self, ValidationError> {
        let key = match params.sort.as_deref() {
            None | Some("createdAt") => SortKey::CreatedAt,
            Some("totalAmount") => SortKey::TotalAmount,
            Some("status") => SortKey::Status,
            Some(other) => {
                return Err(ValidationError::Field(format!(
                    "unknown sort field \"{other}\" (allowed: createdAt, totalAmount, status)"
                )))
            }
        };
        let direction = match params.order.as_deref() {
            None => match key {
                SortKey::Status => SortDirection::Asc,
                SortKey::CreatedAt | SortKey::TotalAmount => SortDirection::Desc,
            },
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(ValidationError::Field(format!(
                    "order must be asc or desc, got \"{other}\""
                )))
            }
        };
        Ok(Self { key, direction })
    }

    /// Ties are broken by order id, ascending, whatever the direction.
    fn compare(&self, a: &Order, b: &Order, registry: &StatusRegistry) -> Ordering {
        let primary = match self.key {
            SortKey::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortKey::TotalAmount => a.total_amount().cmp(&b.total_amount()),
            SortKey::Status => registry
                .sort_order(a.status())
                .cmp(&registry.sort_order(b.status())),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id().cmp(&b.id()))
    }
}

// ── Results ─────────────────────────────────────────────────────────────────

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: usize,
}

/// Aggregates over a filtered set, amounts in minor units.
///
/// Revenue is summed in `u128`: every order total fits an `i64`, but a sum
/// across many orders need not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// One entry per registry status, zero-filled.
    pub counts: BTreeMap<OrderStatus, u64>,
    pub total_orders: u64,
    /// Sum of all totals.
    pub gross_revenue: u128,
    /// Sum of totals excluding cancelled and returned orders.
    pub net_revenue: u128,
}

/// Filter, sort and paginate. An out-of-range page is empty, not an error.
pub fn list(
    orders: impl IntoIterator<Item = Order>,
    filter: &OrderFilter,
    page: PageRequest,
    sort: Sort,
    registry: &StatusRegistry,
) -> Page<Order> {
    let mut matching: Vec<Order> = orders.into_iter().filter(|o| filter.matches(o)).collect();
    let total_count = matching.len();
    matching.sort_by(|a, b| sort.compare(a, b, registry));

    let items = matching
        .into_iter()
        .skip(page.offset())
        .take(page.page_size as usize)
        .collect();
    Page {
        items,
        page: page.page,
        page_size: page.page_size,
        total_count,
    }
}

/// Counts per status and revenue totals over the orders `filter` selects.
pub fn stats<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    filter: &OrderFilter,
    registry: &StatusRegistry,
) -> OrderStats {
    let mut counts: BTreeMap<OrderStatus, u64> = registry
        .ordered()
        .into_iter()
        .map(|d| (d.status, 0))
        .collect();
    let mut total_orders = 0;
    let mut gross_revenue: u128 = 0;
    let mut net_revenue: u128 = 0;

    for order in orders.into_iter().filter(|o| filter.matches(o)) {
        *counts.entry(order.status()).or_insert(0) += 1;
        total_orders += 1;
        let total = u128::from(order.total_amount().minor_units().unsigned_abs());
        gross_revenue += total;
        if !matches!(order.status(), OrderStatus::Cancelled | OrderStatus::Returned) {
            net_revenue += total;
        }
    }

    OrderStats {
        counts,
        total_orders,
        gross_revenue,
        net_revenue,
    }
}
