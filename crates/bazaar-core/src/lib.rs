//! # bazaar-core: Foundational Types
//!
//! Every other crate in the workspace depends on `bazaar-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `UserId`, `OrderId`, `ProductId`
//!    cannot be confused with one another or with bare strings.
//!
//! 2. **A closed `Role` enumeration.** Role names are parsed once at the edge;
//!    authorization code matches on variants, never on string literals.
//!
//! 3. **Integer money.** Amounts are minor currency units in an `i64`. There
//!    are no floats anywhere in pricing or revenue arithmetic.
//!
//! 4. **One error taxonomy.** [`ErrorKind`] is shared by the gateway and the
//!    order service so both surfaces reject requests with the same codes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `bazaar-*` crates.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod money;
pub mod role;

pub use error::{ErrorBody, ErrorDetail, ErrorKind, ValidationError};
pub use identity::{OrderId, ProductId, UserId};
pub use money::Money;
pub use role::Role;
