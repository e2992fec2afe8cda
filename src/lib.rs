pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod google_api;
pub mod logging;
pub mod models;
pub mod provisioning;
pub mod security;

pub use auth::{FirebaseAuthClient, IdentityProvider};
pub use db::{DocumentStore, FirestoreClient};
pub use error::{EntropySourceError, ProviderError, ProvisioningError, ProvisioningStep};
pub use provisioning::{provision_admin, ProvisionOptions, ProvisioningState};
pub use security::generate_secret;
