use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const ADMIN_ROLE: &str = "admin";
pub const ACTIVE_STATUS: &str = "active";

/// Account the provisioner creates. Lives only for one provisioning run.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccountRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl AdminAccountRequest {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Debug for AdminAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccountRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// User record as returned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub disabled: bool,
}

/// Custom claim attached to an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaim {
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl RoleClaim {
    pub fn admin(created_at: DateTime<Utc>) -> Self {
        Self {
            role: ADMIN_ROLE.to_string(),
            created_at,
        }
    }

    /// Claims map in the shape downstream authorization checks read
    pub fn to_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("role".to_string(), Value::String(self.role.clone()));
        claims.insert(
            "createdAt".to_string(),
            Value::String(self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        claims
    }
}

/// A single document field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    /// Resolved by the store at commit time
    ServerTimestamp,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

pub type Document = BTreeMap<String, FieldValue>;

/// Profile written to `users/{uid}` once the identity carries the admin claim
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDocument {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub verified: bool,
    pub created_at: FieldValue,
    pub updated_at: FieldValue,
}

impl ProfileDocument {
    /// Admin profile for a freshly created identity
    pub fn admin(identity: &IdentityRecord, request: &AdminAccountRequest) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone().unwrap_or_else(|| request.email.clone()),
            name: request.display_name.clone(),
            role: ADMIN_ROLE.to_string(),
            status: ACTIVE_STATUS.to_string(),
            verified: true,
            created_at: FieldValue::ServerTimestamp,
            updated_at: FieldValue::ServerTimestamp,
        }
    }

    pub fn to_fields(&self) -> Document {
        let mut fields = Document::new();
        fields.insert("uid".to_string(), self.uid.clone().into());
        fields.insert("email".to_string(), self.email.clone().into());
        fields.insert("name".to_string(), self.name.clone().into());
        fields.insert("role".to_string(), self.role.clone().into());
        fields.insert("status".to_string(), self.status.clone().into());
        fields.insert("verified".to_string(), self.verified.into());
        fields.insert("createdAt".to_string(), self.created_at.clone());
        fields.insert("updatedAt".to_string(), self.updated_at.clone());
        fields
    }
}

/// 32 random bytes rendered as lowercase hex
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

/// Outcome of a successful provisioning run
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedAdmin {
    pub identity: IdentityRecord,
    pub claim: RoleClaim,
    pub document_path: String,
    /// True when the identity already existed and creation was skipped
    pub reused_identity: bool,
}
