//! # Order Status Registry
//!
//! [`OrderStatus`] is the single definition of the status names and of the
//! transition graph. [`StatusRegistry`] carries the display metadata that
//! operators may edit at runtime: description, color, sort order, and the
//! active flag.
//!
//! Sort order is the canonical lifecycle sequence for reporting and UI. It is
//! independent of the transition graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::ValidationError;

// ── Status ──────────────────────────────────────────────────────────────────

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting confirmation. Initial status of every order.
    Pending,
    /// Accepted by the shop.
    Confirmed,
    /// Being picked and packed.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer. Terminal.
    Delivered,
    /// Cancelled before shipment. Terminal.
    Cancelled,
    /// Returned after shipment. Terminal.
    Returned,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// The status every new order starts in.
    pub const INITIAL: OrderStatus = OrderStatus::Pending;

    /// Return the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    /// The adjacency set: statuses reachable from this one in a single
    /// transition.
    pub fn adjacent(&self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Returned],
            Self::Delivered | Self::Cancelled | Self::Returned => &[],
        }
    }

    /// Whether `target` is in this status's adjacency set.
    pub fn can_reach(&self, target: OrderStatus) -> bool {
        self.adjacent().contains(&target)
    }

    /// A terminal status has an empty adjacency set.
    pub fn is_terminal(&self) -> bool {
        self.adjacent().is_empty()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

// ── Descriptors ─────────────────────────────────────────────────────────────

/// Display metadata for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDescriptor {
    pub status: OrderStatus,
    pub description: String,
    /// `#RRGGBB`.
    pub color: String,
    pub sort_order: u32,
    /// Inactive statuses remain valid on existing orders but may not be
    /// newly assigned.
    pub active: bool,
}

/// Partial update of a descriptor. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sort_order: Option<u32>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Registry edit failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid color \"{0}\" (expected #RRGGBB)")]
    InvalidColor(String),

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("sort order {sort_order} is already used by status {taken_by}")]
    DuplicateSortOrder {
        sort_order: u32,
        taken_by: OrderStatus,
    },

    #[error("status {0} is the initial status and cannot be deactivated")]
    InitialStatusRequired(OrderStatus),
}

fn validate_color(color: &str) -> Result<(), RegistryError> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(RegistryError::InvalidColor(color.to_string()))
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// The full set of status descriptors. Always contains an entry for every
/// [`OrderStatus`]; sort orders are unique so the registry defines a total
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRegistry {
    entries: BTreeMap<OrderStatus, StatusDescriptor>,
}

impl StatusRegistry {
    /// The standard registry: every status active, sort orders 10..70.
    pub fn standard() -> Self {
        let rows: [(OrderStatus, &str, &str); 7] = [
            (OrderStatus::Pending, "Order placed, awaiting confirmation", "#F5A623"),
            (OrderStatus::Confirmed, "Order confirmed by the shop", "#4A90E2"),
            (OrderStatus::Processing, "Order is being prepared", "#9013FE"),
            (OrderStatus::Shipped, "Order handed to the carrier", "#50E3C2"),
            (OrderStatus::Delivered, "Order delivered to the customer", "#7ED321"),
            (OrderStatus::Cancelled, "Order cancelled", "#D0021B"),
            (OrderStatus::Returned, "Order returned by the customer", "#8B572A"),
        ];
        let entries = rows
            .into_iter()
            .zip(1u32..)
            .map(|((status, description, color), rank)| {
                (
                    status,
                    StatusDescriptor {
                        status,
                        description: description.to_string(),
                        color: color.to_string(),
                        sort_order: rank * 10,
                        active: true,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Start from the standard registry and apply a list of updates, as
    /// loaded from configuration.
    pub fn with_overrides(
        overrides: &BTreeMap<OrderStatus, StatusUpdate>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::standard();
        for (status, update) in overrides {
            registry.apply(*status, update)?;
        }
        Ok(registry)
    }

    /// Replace descriptors wholesale, as read back from storage. Statuses
    /// without a replacement keep their current descriptor. The result is
    /// validated as a whole, so two statuses may swap sort orders.
    pub fn with_descriptors(
        &self,
        descriptors: impl IntoIterator<Item = StatusDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut next = self.clone();
        for descriptor in descriptors {
            validate_color(&descriptor.color)?;
            if descriptor.description.trim().is_empty() {
                return Err(RegistryError::EmptyDescription);
            }
            next.entries.insert(descriptor.status, descriptor);
        }

        let mut seen: BTreeMap<u32, OrderStatus> = BTreeMap::new();
        for descriptor in next.entries.values() {
            if let Some(taken_by) = seen.insert(descriptor.sort_order, descriptor.status) {
                return Err(RegistryError::DuplicateSortOrder {
                    sort_order: descriptor.sort_order,
                    taken_by,
                });
            }
        }
        if !next.is_active(OrderStatus::INITIAL) {
            return Err(RegistryError::InitialStatusRequired(OrderStatus::INITIAL));
        }
        Ok(next)
    }

    /// Descriptor for a status.
    pub fn descriptor(&self, status: OrderStatus) -> Option<&StatusDescriptor> {
        self.entries.get(&status)
    }

    /// Whether a status may be newly assigned.
    pub fn is_active(&self, status: OrderStatus) -> bool {
        self.entries.get(&status).is_some_and(|d| d.active)
    }

    /// Sort rank of a status. Statuses are always present; the fallback only
    /// keeps the function total.
    pub fn sort_order(&self, status: OrderStatus) -> u32 {
        self.entries
            .get(&status)
            .map_or(u32::MAX, |d| d.sort_order)
    }

    /// All descriptors ordered by sort order.
    pub fn ordered(&self) -> Vec<&StatusDescriptor> {
        let mut all: Vec<&StatusDescriptor> = self.entries.values().collect();
        all.sort_by_key(|d| (d.sort_order, d.status));
        all
    }

    /// Active statuses ordered by sort order.
    pub fn active_statuses(&self) -> Vec<OrderStatus> {
        self.ordered()
            .into_iter()
            .filter(|d| d.active)
            .map(|d| d.status)
            .collect()
    }

    /// Apply a partial update. Either the whole update applies or nothing
    /// changes.
    pub fn apply(
        &mut self,
        status: OrderStatus,
        update: &StatusUpdate,
    ) -> Result<&StatusDescriptor, RegistryError> {
        if let Some(color) = &update.color {
            validate_color(color)?;
        }
        if let Some(description) = &update.description {
            if description.trim().is_empty() {
                return Err(RegistryError::EmptyDescription);
            }
        }
        if let Some(sort_order) = update.sort_order {
            if let Some(other) = self
                .entries
                .values()
                .find(|d| d.sort_order == sort_order && d.status != status)
            {
                return Err(RegistryError::DuplicateSortOrder {
                    sort_order,
                    taken_by: other.status,
                });
            }
        }
        if update.active == Some(false) && status == OrderStatus::INITIAL {
            return Err(RegistryError::InitialStatusRequired(status));
        }

        let entry = self
            .entries
            .entry(status)
            .or_insert_with(|| StatusDescriptor {
                status,
                description: status.as_str().to_string(),
                color: "#000000".to_string(),
                sort_order: u32::MAX,
                active: true,
            });
        if let Some(description) = &update.description {
            entry.description = description.trim().to_string();
        }
        if let Some(color) = &update.color {
            entry.color = color.clone();
        }
        if let Some(sort_order) = update.sort_order {
            entry.sort_order = sort_order;
        }
        if let Some(active) = update.active {
            entry.active = active;
        }
        Ok(entry)
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
            assert!(status.adjacent().is_empty());
        }
    }

    #[test]
    fn non_terminal_statuses_have_outgoing_edges() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn graph_has_no_self_loops() {
        for status in OrderStatus::ALL {
            assert!(!status.can_reach(status), "{status} reaches itself");
        }
    }

    #[test]
    fn cancellation_only_before_shipment() {
        assert!(OrderStatus::Pending.can_reach(OrderStatus::Cancelled));
        assert!(OrderStatus::Confirmed.can_reach(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_reach(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_reach(OrderStatus::Cancelled));
    }

    #[test]
    fn every_status_reachable_from_initial() {
        let mut seen = vec![OrderStatus::INITIAL];
        let mut frontier = vec![OrderStatus::INITIAL];
        while let Some(next) = frontier.pop() {
            for target in next.adjacent() {
                if !seen.contains(target) {
                    seen.push(*target);
                    frontier.push(*target);
                }
            }
        }
        assert_eq!(seen.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn status_names_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!(matches!(
            "lost".parse::<OrderStatus>(),
            Err(ValidationError::UnknownStatus(_))
        ));
    }

    #[test]
    fn standard_registry_is_ordered_by_lifecycle() {
        let registry = StatusRegistry::standard();
        let ordered: Vec<OrderStatus> = registry.ordered().iter().map(|d| d.status).collect();
        assert_eq!(ordered, OrderStatus::ALL.to_vec());
        assert!(OrderStatus::ALL.iter().all(|s| registry.is_active(*s)));
    }

    #[test]
    fn deactivate_status() {
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
        assert!(!registry.is_active(OrderStatus::Returned));
        assert!(!registry.active_statuses().contains(&OrderStatus::Returned));
    }

    #[test]
    fn initial_status_cannot_be_deactivated() {
        let mut registry = StatusRegistry::standard();
        let err = registry
            .apply(
                OrderStatus::Pending,
                &StatusUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, RegistryError::InitialStatusRequired(OrderStatus::Pending));
        assert!(registry.is_active(OrderStatus::Pending));
    }

    #[test]
    fn duplicate_sort_order_rejected_without_partial_apply() {
        let mut registry = StatusRegistry::standard();
        let before = registry.clone();
        let err = registry
            .apply(
                OrderStatus::Shipped,
                &StatusUpdate {
                    color: Some("#123456".into()),
                    sort_order: Some(10),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateSortOrder {
                taken_by: OrderStatus::Pending,
                ..
            }
        ));
        assert_eq!(registry, before);
    }

    #[test]
    fn invalid_color_rejected() {
        let mut registry = StatusRegistry::standard();
        for bad in ["red", "#12345", "#GGGGGG", "123456"] {
            let result = registry.apply(
                OrderStatus::Pending,
                &StatusUpdate {
                    color: Some(bad.into()),
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(RegistryError::InvalidColor(_))), "{bad}");
        }
    }

    #[test]
    fn reordering_changes_ordered_view() {
        let mut registry = StatusRegistry::standard();
        registry
            .apply(
                OrderStatus::Cancelled,
                &StatusUpdate {
                    sort_order: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(registry.ordered()[0].status, OrderStatus::Cancelled);
    }

    #[test]
    fn overrides_load_from_yaml() {
        let yaml = "returned:\n  active: false\nshipped:\n  color: \"#000000\"\n";
        let overrides: BTreeMap<OrderStatus, StatusUpdate> = serde_yaml::from_str(yaml).unwrap();
        let registry = StatusRegistry::with_overrides(&overrides).unwrap();
        assert!(!registry.is_active(OrderStatus::Returned));
        assert_eq!(
            registry.descriptor(OrderStatus::Shipped).unwrap().color,
            "#000000"
        );
    }

    #[test]
    fn stored_descriptors_may_swap_sort_orders() {
        let standard = StatusRegistry::standard();
        let mut pending = standard.descriptor(OrderStatus::Pending).unwrap().clone();
        let mut confirmed = standard.descriptor(OrderStatus::Confirmed).unwrap().clone();
        std::mem::swap(&mut pending.sort_order, &mut confirmed.sort_order);

        let registry = standard.with_descriptors([pending, confirmed]).unwrap();
        assert_eq!(registry.ordered()[0].status, OrderStatus::Confirmed);
    }

    #[test]
    fn stored_descriptors_validated_as_a_whole() {
        let standard = StatusRegistry::standard();
        let mut shipped = standard.descriptor(OrderStatus::Shipped).unwrap().clone();
        shipped.sort_order = 10;
        assert!(matches!(
            standard.with_descriptors([shipped]),
            Err(RegistryError::DuplicateSortOrder { sort_order: 10, .. })
        ));

        let mut pending = standard.descriptor(OrderStatus::Pending).unwrap().clone();
        pending.active = false;
        assert!(matches!(
            standard.with_descriptors([pending]),
            Err(RegistryError::InitialStatusRequired(OrderStatus::Pending))
        ));
    }
}
