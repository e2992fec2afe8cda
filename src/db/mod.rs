use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::ProviderError;
use crate::google_api::{check_response, emulator_base_url};
use crate::models::{Document, FieldValue};
use crate::security::credentials::AccessTokenSource;

const FIRESTORE_URL: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";

/// Schemaless document storage keyed by collection and id
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or fully replace the document at `collection/id`.
    /// `FieldValue::ServerTimestamp` fields are resolved by the store at commit.
    async fn set_document(&self, collection: &str, id: &str, fields: &Document) -> Result<(), ProviderError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn set_document(&self, collection: &str, id: &str, fields: &Document) -> Result<(), ProviderError> {
        (**self).set_document(collection, id, fields).await
    }
}

/// Cloud Firestore through the v1 REST API
pub struct FirestoreClient {
    client: Client,
    base_url: String,
    project_id: String,
    database_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirestoreClient {
    pub fn new(client: Client, project_id: impl Into<String>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client,
            base_url: FIRESTORE_URL.to_string(),
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE.to_string(),
            tokens,
        }
    }

    /// Point the client at the Firestore emulator, e.g. `localhost:8080`
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.base_url = emulator_base_url(host);
        self
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Full resource name of a document
    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), collection, id)
    }

    fn commit_url(&self) -> String {
        format!("{}/v1/{}/documents:commit", self.base_url, self.database_path())
    }

    /// Body of a single-write commit that replaces the document
    pub fn commit_body(&self, collection: &str, id: &str, fields: &Document) -> Value {
        let mut encoded = Map::new();
        let mut transforms = Vec::new();

        for (name, value) in fields {
            match value {
                FieldValue::ServerTimestamp => transforms.push(json!({
                    "fieldPath": quote_field_path(name),
                    "setToServerValue": "REQUEST_TIME",
                })),
                other => {
                    encoded.insert(name.clone(), encode_value(other));
                }
            }
        }

        let mut write = json!({
            "update": {
                "name": self.document_name(collection, id),
                "fields": encoded,
            }
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = Value::Array(transforms);
        }

        json!({ "writes": [write] })
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, fields), fields(field_count = fields.len()))]
    async fn set_document(&self, collection: &str, id: &str, fields: &Document) -> Result<(), ProviderError> {
        validate_segment(collection)?;
        validate_segment(id)?;

        let body = self.commit_body(collection, id, fields);
        let token = self.tokens.access_token().await?;
        let url = self.commit_url();
        debug!(url = %url, "Committing document write");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        check_response(response, "commit").await?;
        Ok(())
    }
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Bool(b) => json!({ "booleanValue": b }),
        FieldValue::ServerTimestamp => Value::Null,
    }
}

fn quote_field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn validate_segment(segment: &str) -> Result<(), ProviderError> {
    if segment.is_empty() || segment.contains('/') || segment == "." || segment == ".." {
        return Err(ProviderError::InvalidRequest(format!(
            "invalid document path segment {:?}",
            segment
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::credentials::StaticTokenSource;

    fn firestore() -> FirestoreClient {
        FirestoreClient::new(Client::new(), "decompas", Arc::new(StaticTokenSource::emulator()))
    }

    #[test]
    fn test_commit_url_and_document_name() {
        let store = firestore();
        assert_eq!(
            store.commit_url(),
            "https://firestore.googleapis.com/v1/projects/decompas/databases/(default)/documents:commit"
        );
        assert_eq!(
            store.document_name("users", "abc123"),
            "projects/decompas/databases/(default)/documents/users/abc123"
        );

        let store = firestore().with_emulator("localhost:8080");
        assert!(store.commit_url().starts_with("http://localhost:8080/v1/projects/decompas/"));
    }

    #[test]
    fn test_commit_body_moves_sentinels_to_transforms() {
        let mut fields = Document::new();
        fields.insert("uid".to_string(), "abc123".into());
        fields.insert("verified".to_string(), true.into());
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);
        fields.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);

        let body = firestore().commit_body("users", "abc123", &fields);
        let write = &body["writes"][0];

        assert_eq!(
            write["update"]["name"],
            "projects/decompas/databases/(default)/documents/users/abc123"
        );
        assert_eq!(write["update"]["fields"]["uid"]["stringValue"], "abc123");
        assert_eq!(write["update"]["fields"]["verified"]["booleanValue"], true);
        assert!(write["update"]["fields"].get("createdAt").is_none());

        let transforms = write["updateTransforms"].as_array().unwrap();
        assert_eq!(transforms.len(), 2);
        assert_eq!(transforms[0]["fieldPath"], "createdAt");
        assert_eq!(transforms[0]["setToServerValue"], "REQUEST_TIME");
    }

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(
            encode_value(&FieldValue::from("active")),
            json!({"stringValue": "active"})
        );
        assert_eq!(encode_value(&FieldValue::Bool(false)), json!({"booleanValue": false}));
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(quote_field_path("createdAt"), "createdAt");
        assert_eq!(quote_field_path("created-at"), "`created-at`");
        assert_eq!(quote_field_path("1st"), "`1st`");
    }

    #[tokio::test]
    async fn test_rejects_nested_ids() {
        let store = firestore();
        let err = store
            .set_document("users", "abc/123", &Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }
}
