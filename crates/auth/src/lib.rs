//! `storefront-auth`: authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: the API layer hands tokens in and gets
//! verified claims and policy decisions back.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::{Permission, permissions_for_roles};
pub use principal::TenantMembership;
pub use roles::Role;
