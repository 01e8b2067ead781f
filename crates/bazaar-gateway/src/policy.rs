//! # Access Policy
//!
//! A pure decision function. No I/O and no knowledge of tokens: the caller
//! has already authenticated and resolved the role freshly from the role
//! store, and passes the result in as an optional [`Identity`].
//!
//! Two decision shapes exist besides `public` and `authenticated`:
//!
//! - **Role-gated**: allow iff the resolved role is in the required set.
//! - **Self-or-admin**: allow iff the resolved role is `admin`, or the
//!   subject id equals a named path parameter.

use std::collections::{BTreeMap, BTreeSet};

use bazaar_auth::Identity;
use bazaar_core::Role;

/// Path parameters captured by a policy pattern, e.g. `{id}`.
pub type PathParams = BTreeMap<String, String>;

/// What a route requires of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No credential needed. A valid one is still attached if presented.
    Public,
    /// Any subject with a resolvable role.
    Authenticated,
    /// Resolved role must be one of these. Never empty.
    Roles(BTreeSet<Role>),
    /// Admin, or the subject named by this path parameter.
    SelfOrAdmin { param: String },
}

impl Access {
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Roles(roles) => {
                let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
                write!(f, "roles[{}]", names.join(","))
            }
            Self::SelfOrAdmin { param } => write!(f, "self_or_admin({param})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// A credential is required and none was established.
    Unauthenticated,
    Deny(String),
}

pub fn decide(access: &Access, identity: Option<&Identity>, params: &PathParams) -> Decision {
    let identity = match (access, identity) {
        (Access::Public, _) => return Decision::Allow,
        (_, None) => return Decision::Unauthenticated,
        (_, Some(identity)) => identity,
    };

    match access {
        Access::Public | Access::Authenticated => Decision::Allow,
        Access::Roles(required) => {
            if required.contains(&identity.role) {
                Decision::Allow
            } else {
                Decision::Deny(format!("role {} may not access this route", identity.role))
            }
        }
        Access::SelfOrAdmin { param } => {
            if identity.role == Role::Admin {
                return Decision::Allow;
            }
            match params.get(param) {
                Some(value) if value == identity.subject.as_str() => Decision::Allow,
                _ => Decision::Deny("only the subject or an admin may access this resource".into()),
            }
        }
    }
}
