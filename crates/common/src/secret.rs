//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used throughout the admin backend.
//! Anything that grants access to Auth0 goes through these wrappers:
//!
//! - the machine-to-machine client secret in the credential bundle
//! - cached Management API access tokens
//! - temporary passwords generated when inviting users
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` over a secret field stays safe to pass to `tracing`. Reading the
//! value requires an explicit `expose_secret()` call, which keeps every use
//! site greppable.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct MachineCredentials {
//!     client_id: String,
//!     client_secret: SecretString,
//! }
//!
//! let creds = MachineCredentials {
//!     client_id: "m2m-client".to_string(),
//!     client_secret: SecretString::from("s3cr3t"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("s3cr3t"));
//! assert_eq!(creds.client_secret.expose_secret(), "s3cr3t");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
