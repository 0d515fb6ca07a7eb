//! Audience-to-role policy.
//!
//! Each known audience maps to a requirement. A principal is allowed when
//! at least one of its audiences is known and that audience's requirement
//! is met. Unknown audiences are skipped.

use crate::auth::Principal;

/// What an audience demands of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any validated principal.
    AnyPrincipal,
    /// The principal must carry this role.
    Role(String),
}

impl Requirement {
    fn is_met_by(&self, principal: &Principal) -> bool {
        match self {
            Requirement::AnyPrincipal => true,
            Requirement::Role(role) => principal.has_role(role),
        }
    }
}

/// Why a policy denied a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDenial {
    /// None of the token's audiences is governed by this policy.
    NoKnownAudience,
    /// A known audience matched but its role was missing.
    MissingRole,
}

impl PolicyDenial {
    #[must_use]
    pub fn reason_code(self) -> &'static str {
        match self {
            PolicyDenial::NoKnownAudience => "unknown_audience",
            PolicyDenial::MissingRole => "missing_role",
        }
    }
}

/// Ordered audience rules.
#[derive(Debug, Clone, Default)]
pub struct AudiencePolicy {
    rules: Vec<(String, Requirement)>,
}

impl AudiencePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, audience: impl Into<String>, requirement: Requirement) -> Self {
        self.rules.push((audience.into(), requirement));
        self
    }

    /// Gateway policy: admin audience needs `admin_role`, viewer audience
    /// admits anyone.
    #[must_use]
    pub fn gateway(admin_audience: &str, admin_role: &str, viewer_audience: &str) -> Self {
        Self::new()
            .with_rule(admin_audience, Requirement::Role(admin_role.to_string()))
            .with_rule(viewer_audience, Requirement::AnyPrincipal)
    }

    /// Only the admin audience, with the admin role.
    #[must_use]
    pub fn admin_only(admin_audience: &str, admin_role: &str) -> Self {
        Self::new().with_rule(admin_audience, Requirement::Role(admin_role.to_string()))
    }

    /// Decide whether `principal` is allowed.
    ///
    /// On success returns the audience that granted access.
    ///
    /// # Errors
    ///
    /// `MissingRole` when a known audience was present but unsatisfied,
    /// otherwise `NoKnownAudience`.
    pub fn evaluate<'a>(&'a self, principal: &Principal) -> Result<&'a str, PolicyDenial> {
        let mut denial = PolicyDenial::NoKnownAudience;

        for audience in &principal.audiences {
            let Some((known, requirement)) = self.rules.iter().find(|(aud, _)| aud == audience)
            else {
                continue;
            };

            if requirement.is_met_by(principal) {
                return Ok(known.as_str());
            }
            denial = PolicyDenial::MissingRole;
        }

        Err(denial)
    }
}
