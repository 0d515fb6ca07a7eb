//! Inbound authentication for the admin service.
//!
//! - `jwks`: signing key set with refresh-on-miss caching
//! - `jwt`: bearer token validation
//! - `claims`: the validated `Principal`
//! - `policy`: audience-to-role rules
//! - `authorizer`: API gateway policy documents

pub mod authorizer;
pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod policy;

pub use authorizer::{AuthorizerRequest, AuthorizerResponse, GatewayAuthorizer};
pub use claims::Principal;
pub use jwks::{JwksClient, JwksError};
pub use jwt::{JwtValidator, TokenValidationError, ValidatorConfig};
pub use policy::{AudiencePolicy, PolicyDenial, Requirement};
