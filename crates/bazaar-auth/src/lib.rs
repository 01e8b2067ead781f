//! # bazaar-auth: Credentials and Roles
//!
//! Two questions are answered here, in this order, for every request that
//! needs an identity:
//!
//! 1. **Who is calling?** [`TokenVerifier`] checks an HS256 bearer token's
//!    signature and expiry and yields [`Claims`]. No network calls.
//! 2. **What may they do right now?** A [`RoleResolver`] looks the subject up
//!    in the user/role store. The role embedded in the token is only a hint;
//!    authorization always uses the resolved role so that a revoked role
//!    stops working before the token expires.
//!
//! [`authenticate`] composes both steps into an [`Identity`] and classifies
//! failures the same way on every HTTP surface:
//!
//! | Failure                           | Kind           |
//! |-----------------------------------|----------------|
//! | no bearer token                   | `Unauthorized` |
//! | bad signature, malformed, expired | `Forbidden`    |
//! | subject unknown to the role store | `Forbidden`    |
//! | role store unreachable            | `BadGateway`   |

pub mod identity;
pub mod resolver;
pub mod token;

pub use identity::{authenticate, bearer_token, AuthError, Identity};
pub use resolver::{
    HttpRoleResolver, ResolverError, RoleResolver, RoleStoreConfig, StaticRoleResolver,
};
pub use token::{Claims, TokenError, TokenVerifier};
