//! # Roles
//!
//! The closed set of roles an authenticated subject can hold. Role names are
//! kebab-case on the wire (`sales-staff`, `repair-staff`).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role assigned to a subject by the user/role store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Shopper. May only act on resources they own.
    Customer,
    /// Full access, including staff management.
    Admin,
    /// Field technician.
    Technician,
    /// Sales desk. Manages orders alongside admins.
    SalesStaff,
    /// Repair workshop staff.
    RepairStaff,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 5] = [
        Role::Customer,
        Role::Admin,
        Role::Technician,
        Role::SalesStaff,
        Role::RepairStaff,
    ];

    /// Return the wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Technician => "technician",
            Self::SalesStaff => "sales-staff",
            Self::RepairStaff => "repair-staff",
        }
    }

    /// Whether this role may manage orders it does not own.
    pub fn is_order_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::SalesStaff)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_roundtrip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Role::SalesStaff).unwrap();
        assert_eq!(json, "\"sales-staff\"");
        let back: Role = serde_json::from_str("\"repair-staff\"").unwrap();
        assert_eq!(back, Role::RepairStaff);
    }

    #[test]
    fn unknown_role_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn only_admin_and_sales_manage_orders() {
        let staff: Vec<Role> = Role::ALL
            .into_iter()
            .filter(Role::is_order_staff)
            .collect();
        assert_eq!(staff, vec![Role::Admin, Role::SalesStaff]);
    }
}
