use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::IdentityProvider;
use crate::config::{Config, DEFAULT_USERS_COLLECTION};
use crate::db::DocumentStore;
use crate::error::{ProviderError, ProvisioningError, ProvisioningStep};
use crate::models::{AdminAccountRequest, IdentityRecord, ProfileDocument, ProvisionedAdmin, RoleClaim};

#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Collection holding profile documents
    pub collection: String,
    /// Upper bound for each remote call
    pub call_timeout: Duration,
    /// Look the email up first and skip creation when the identity exists
    pub reuse_existing_identity: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_USERS_COLLECTION.to_string(),
            call_timeout: Duration::from_secs(10),
            reuse_existing_identity: false,
        }
    }
}

impl From<&Config> for ProvisionOptions {
    fn from(config: &Config) -> Self {
        Self {
            collection: config.users_collection.clone(),
            call_timeout: config.request_timeout(),
            reuse_existing_identity: config.reuse_existing_identity,
        }
    }
}

/// Where a provisioning run stands. Runs only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    Idle,
    IdentityCreated { uid: String },
    ClaimAssigned { uid: String },
    DocumentWritten { uid: String },
    Done,
    Failed { step: ProvisioningStep },
}

impl ProvisioningState {
    fn rank(&self) -> u8 {
        match self {
            ProvisioningState::Idle => 0,
            ProvisioningState::IdentityCreated { .. } => 1,
            ProvisioningState::ClaimAssigned { .. } => 2,
            ProvisioningState::DocumentWritten { .. } => 3,
            ProvisioningState::Done => 4,
            ProvisioningState::Failed { .. } => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Done | ProvisioningState::Failed { .. })
    }

    /// Only the next state in sequence, or `Failed` from any non-terminal state
    pub fn can_transition_to(&self, next: &ProvisioningState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ProvisioningState::Failed { .. } => true,
            _ => next.rank() == self.rank() + 1,
        }
    }
}

struct Progress {
    state: ProvisioningState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: ProvisioningState::Idle,
        }
    }

    fn advance(&mut self, next: ProvisioningState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal provisioning transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Provisioning state changed");
        self.state = next;
    }

    fn fail(&mut self, err: ProvisioningError) -> ProvisioningError {
        self.advance(ProvisioningState::Failed { step: err.step() });
        debug!(step = %err.step(), "Provisioning stopped");
        if let Some(uid) = err.orphaned_uid() {
            warn!(uid = %uid, "⚠️  Identity left without a complete admin setup; fix it manually");
        }
        err
    }
}

async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}

/// Create the administrator: identity, then admin role claim, then profile
/// document. Steps run strictly in order and the first failure stops the run.
/// Nothing is rolled back.
pub async fn provision_admin<I, D>(
    identity: &I,
    store: &D,
    request: &AdminAccountRequest,
    options: &ProvisionOptions,
) -> Result<ProvisionedAdmin, ProvisioningError>
where
    I: IdentityProvider + ?Sized,
    D: DocumentStore + ?Sized,
{
    let mut progress = Progress::new();
    let limit = options.call_timeout;

    info!("🚀 Provisioning admin account {}", request.email);

    // Step 1: identity
    let (record, reused_identity) = match obtain_identity(identity, request, options).await {
        Ok(found) => found,
        Err(err) => return Err(progress.fail(err)),
    };
    let uid = record.uid.clone();
    progress.advance(ProvisioningState::IdentityCreated { uid: uid.clone() });
    if reused_identity {
        info!(uid = %uid, "♻️  Reusing existing identity");
    } else {
        info!(uid = %uid, "✅ Identity created");
    }

    // Step 2: role claim
    let claim = RoleClaim::admin(Utc::now());
    if let Err(source) = bounded(limit, identity.set_custom_claims(&uid, &claim.to_claims())).await {
        return Err(progress.fail(ProvisioningError::ClaimAssignment { uid, source }));
    }
    progress.advance(ProvisioningState::ClaimAssigned { uid: uid.clone() });
    info!(uid = %uid, role = %claim.role, "✅ Role claim assigned");

    // Step 3: profile document keyed by the identity's uid
    let profile = ProfileDocument::admin(&record, request);
    let path = format!("{}/{}", options.collection, uid);
    if let Err(source) = bounded(
        limit,
        store.set_document(&options.collection, &profile.uid, &profile.to_fields()),
    )
    .await
    {
        return Err(progress.fail(ProvisioningError::ProfileWrite { uid, path, source }));
    }
    progress.advance(ProvisioningState::DocumentWritten { uid: uid.clone() });
    info!(path = %path, "✅ Profile document written");

    progress.advance(ProvisioningState::Done);
    info!("🎉 Admin account ready");

    Ok(ProvisionedAdmin {
        identity: record,
        claim,
        document_path: path,
        reused_identity,
    })
}

/// Step 1. A reused identity must be enabled, same as a freshly created one.
async fn obtain_identity<I>(
    identity: &I,
    request: &AdminAccountRequest,
    options: &ProvisionOptions,
) -> Result<(IdentityRecord, bool), ProvisioningError>
where
    I: IdentityProvider + ?Sized,
{
    let limit = options.call_timeout;

    if options.reuse_existing_identity {
        let found = bounded(limit, identity.find_identity_by_email(&request.email))
            .await
            .map_err(|source| ProvisioningError::IdentityLookup {
                email: request.email.clone(),
                source,
            })?;

        if let Some(existing) = found {
            if existing.disabled {
                return Err(ProvisioningError::DisabledIdentity {
                    email: request.email.clone(),
                    uid: existing.uid,
                });
            }
            return Ok((existing, true));
        }
    }

    let created = bounded(limit, identity.create_identity(request))
        .await
        .map_err(|source| ProvisioningError::IdentityCreation {
            email: request.email.clone(),
            source,
        })?;
    Ok((created, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_only_move_forward() {
        let idle = ProvisioningState::Idle;
        let created = ProvisioningState::IdentityCreated { uid: "u".into() };
        let claimed = ProvisioningState::ClaimAssigned { uid: "u".into() };
        let written = ProvisioningState::DocumentWritten { uid: "u".into() };
        let failed = ProvisioningState::Failed {
            step: ProvisioningStep::AssignClaim,
        };

        assert!(idle.can_transition_to(&created));
        assert!(created.can_transition_to(&claimed));
        assert!(claimed.can_transition_to(&written));
        assert!(written.can_transition_to(&ProvisioningState::Done));

        assert!(!idle.can_transition_to(&claimed));
        assert!(!claimed.can_transition_to(&created));
        assert!(!ProvisioningState::Done.can_transition_to(&failed));
    }

    #[test]
    fn test_failed_reachable_from_any_live_state() {
        let failed = ProvisioningState::Failed {
            step: ProvisioningStep::WriteProfile,
        };
        for state in [
            ProvisioningState::Idle,
            ProvisioningState::IdentityCreated { uid: "u".into() },
            ProvisioningState::ClaimAssigned { uid: "u".into() },
            ProvisioningState::DocumentWritten { uid: "u".into() },
        ] {
            assert!(state.can_transition_to(&failed), "{:?} should fail over", state);
        }
        assert!(!failed.can_transition_to(&ProvisioningState::Idle));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), ProviderError> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }
}
