use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The OS random source could not produce bytes
#[derive(Debug, Error)]
#[error("secure random source unavailable")]
pub struct EntropySourceError(#[from] pub rand::Error);

/// Failure reported by an external collaborator (identity provider, document store, token endpoint)
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("call did not complete within {0:?}")]
    Timeout(Duration),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid credentials: {0}")]
    Credentials(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    CreateIdentity,
    AssignClaim,
    WriteProfile,
}

impl ProvisioningStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningStep::CreateIdentity => "create identity",
            ProvisioningStep::AssignClaim => "assign role claim",
            ProvisioningStep::WriteProfile => "write profile document",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("identity creation failed for {email}")]
    IdentityCreation {
        email: String,
        #[source]
        source: ProviderError,
    },
    #[error("identity lookup failed for {email}")]
    IdentityLookup {
        email: String,
        #[source]
        source: ProviderError,
    },
    #[error("existing identity {uid} for {email} is disabled; enable it before re-running")]
    DisabledIdentity { email: String, uid: String },
    #[error("claim assignment failed for uid {uid}")]
    ClaimAssignment {
        uid: String,
        #[source]
        source: ProviderError,
    },
    #[error("profile write failed for {path}")]
    ProfileWrite {
        uid: String,
        path: String,
        #[source]
        source: ProviderError,
    },
}

impl ProvisioningError {
    pub fn step(&self) -> ProvisioningStep {
        match self {
            ProvisioningError::IdentityCreation { .. }
            | ProvisioningError::IdentityLookup { .. }
            | ProvisioningError::DisabledIdentity { .. } => ProvisioningStep::CreateIdentity,
            ProvisioningError::ClaimAssignment { .. } => ProvisioningStep::AssignClaim,
            ProvisioningError::ProfileWrite { .. } => ProvisioningStep::WriteProfile,
        }
    }

    /// Uid of the identity left behind without a complete setup, if any
    pub fn orphaned_uid(&self) -> Option<&str> {
        match self {
            ProvisioningError::IdentityCreation { .. }
            | ProvisioningError::IdentityLookup { .. }
            | ProvisioningError::DisabledIdentity { .. } => None,
            ProvisioningError::ClaimAssignment { uid, .. }
            | ProvisioningError::ProfileWrite { uid, .. } => Some(uid),
        }
    }

    /// Collaborator failure behind this error; `None` when the run stopped on its own check
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ProvisioningError::IdentityCreation { source, .. }
            | ProvisioningError::IdentityLookup { source, .. }
            | ProvisioningError::ClaimAssignment { source, .. }
            | ProvisioningError::ProfileWrite { source, .. } => Some(source),
            ProvisioningError::DisabledIdentity { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_is_reported_once_in_chain() {
        let err = ProvisioningError::ClaimAssignment {
            uid: "abc123".to_string(),
            source: ProviderError::Api {
                status: 503,
                message: "UNAVAILABLE".to_string(),
            },
        };

        assert_eq!(err.to_string(), "claim assignment failed for uid abc123");

        let chain = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(chain.matches("UNAVAILABLE").count(), 1, "cause repeated: {}", chain);
        assert!(chain.starts_with("claim assignment failed for uid abc123: API error (status 503)"));
    }

    #[test]
    fn test_lookup_and_disabled_errors_belong_to_identity_step() {
        let lookup = ProvisioningError::IdentityLookup {
            email: "admin@decompas.com".to_string(),
            source: ProviderError::Timeout(Duration::from_secs(10)),
        };
        assert_eq!(lookup.step(), ProvisioningStep::CreateIdentity);
        assert!(lookup.to_string().contains("lookup"));

        let disabled = ProvisioningError::DisabledIdentity {
            email: "admin@decompas.com".to_string(),
            uid: "abc123".to_string(),
        };
        assert_eq!(disabled.step(), ProvisioningStep::CreateIdentity);
        assert!(disabled.orphaned_uid().is_none());
        assert!(disabled.provider_error().is_none());
    }
}
