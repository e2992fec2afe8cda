use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::google_api::{check_response, emulator_base_url};
use crate::models::{AdminAccountRequest, IdentityRecord};
use crate::security::credentials::AccessTokenSource;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";
/// Firebase rejects serialized custom claims above this size
const MAX_CLAIMS_BYTES: usize = 1000;
/// Claim names Firebase reserves for the ID token itself
const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase",
    "iat", "iss", "jti", "nbf", "nonce", "sub",
];

/// Identity service that owns user accounts and their custom claims
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an enabled account for the request
    async fn create_identity(&self, request: &AdminAccountRequest) -> Result<IdentityRecord, ProviderError>;

    /// Replace the custom claims of `uid`
    async fn set_custom_claims(&self, uid: &str, claims: &Map<String, Value>) -> Result<(), ProviderError>;

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, ProviderError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    async fn create_identity(&self, request: &AdminAccountRequest) -> Result<IdentityRecord, ProviderError> {
        (**self).create_identity(request).await
    }

    async fn set_custom_claims(&self, uid: &str, claims: &Map<String, Value>) -> Result<(), ProviderError> {
        (**self).set_custom_claims(uid, claims).await
    }

    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, ProviderError> {
        (**self).find_identity_by_email(email).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountBody<'a> {
    email: &'a str,
    password: &'a str,
    display_name: &'a str,
    disabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountBody<'a> {
    local_id: &'a str,
    custom_attributes: String,
}

#[derive(Debug, Serialize)]
struct LookupBody<'a> {
    email: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

impl From<AccountInfo> for IdentityRecord {
    fn from(info: AccountInfo) -> Self {
        IdentityRecord {
            uid: info.local_id,
            email: info.email,
            display_name: info.display_name,
            disabled: info.disabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

/// Firebase Authentication through the Identity Toolkit admin REST API
pub struct FirebaseAuthClient {
    client: Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirebaseAuthClient {
    pub fn new(client: Client, project_id: impl Into<String>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client,
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            project_id: project_id.into(),
            tokens,
        }
    }

    /// Point the client at the Auth emulator, e.g. `localhost:9099`
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.base_url = format!("{}/identitytoolkit.googleapis.com", emulator_base_url(host));
        self
    }

    fn accounts_url(&self, method: Option<&str>) -> String {
        let base = format!("{}/v1/projects/{}/accounts", self.base_url, self.project_id);
        match method {
            Some(method) => format!("{}:{}", base, method),
            None => base,
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        operation: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let token = self.tokens.access_token().await?;
        debug!(url = %url, operation, "Calling Identity Toolkit");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        check_response(response, operation).await
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn create_identity(&self, request: &AdminAccountRequest) -> Result<IdentityRecord, ProviderError> {
        let body = CreateAccountBody {
            email: &request.email,
            password: &request.password,
            display_name: &request.display_name,
            disabled: false,
        };

        let response = self.post(&self.accounts_url(None), &body, "createAccount").await?;
        let info: AccountInfo = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("createAccount: {e}")))?;

        let mut record = IdentityRecord::from(info);
        // The create response may omit profile fields that were just set
        if record.email.is_none() {
            record.email = Some(request.email.clone());
        }
        if record.display_name.is_none() {
            record.display_name = Some(request.display_name.clone());
        }
        Ok(record)
    }

    #[instrument(skip(self, claims))]
    async fn set_custom_claims(&self, uid: &str, claims: &Map<String, Value>) -> Result<(), ProviderError> {
        let custom_attributes = encode_custom_claims(claims)?;
        let body = UpdateAccountBody {
            local_id: uid,
            custom_attributes,
        };

        self.post(&self.accounts_url(Some("update")), &body, "setAccountInfo").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_identity_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, ProviderError> {
        let body = LookupBody { email: [email] };

        let response = self.post(&self.accounts_url(Some("lookup")), &body, "lookup").await?;
        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("lookup: {e}")))?;

        Ok(lookup.users.into_iter().next().map(IdentityRecord::from))
    }
}

/// Serialize claims the way the Identity Toolkit expects them: a JSON string
pub fn encode_custom_claims(claims: &Map<String, Value>) -> Result<String, ProviderError> {
    if let Some(reserved) = claims.keys().find(|k| RESERVED_CLAIMS.contains(&k.as_str())) {
        return Err(ProviderError::InvalidRequest(format!(
            "custom claim {:?} is reserved",
            reserved
        )));
    }

    let encoded = serde_json::to_string(claims)
        .map_err(|e| ProviderError::InvalidRequest(format!("claims are not serializable: {e}")))?;

    if encoded.len() > MAX_CLAIMS_BYTES {
        return Err(ProviderError::InvalidRequest(format!(
            "custom claims exceed {} bytes",
            MAX_CLAIMS_BYTES
        )));
    }

    Ok(encoded)
}
