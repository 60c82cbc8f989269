//! REST document-store adapter.
//!
//! Talks to a plain JSON API: one route per collection, documents
//! addressed by id, list filtered by owner. The change stream is
//! poll-based — the API is an opaque store with no push channel, so the
//! adapter re-lists on an interval and delivers each result as a full
//! snapshot.

use crate::backend::{RemoteBackend, RemoteRecord, Subscription};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use larder_types::{Collection, OwnerId, Payload, RemoteId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for the REST adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL of the document-store API, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request, when set.
    pub api_key: Option<String>,
    /// How often the change stream re-lists a collection (seconds).
    pub poll_interval_secs: u64,
    /// Per-request timeout (seconds).
    pub request_timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            poll_interval_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

/// REST adapter for an opaque JSON document store.
#[derive(Clone)]
pub struct RestBackend {
    config: RestConfig,
    client: Client,
}

impl RestBackend {
    /// Creates a new adapter.
    pub fn new(config: RestConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    /// Resolves a logical collection to its remote route segment.
    fn remote_name(collection: Collection) -> &'static str {
        match collection {
            Collection::Pantry => "pantryItems",
            Collection::Recipes => "recipes",
            Collection::MealPlans => "mealPlans",
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.config.base_url, Self::remote_name(collection))
    }

    fn doc_url(&self, collection: Collection, doc_id: &RemoteId) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(doc_id.as_str())
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Unreachable(format!(
            "remote returned {status}: {body}"
        )))
    }

    /// Lists the documents of one owner.
    async fn list(&self, collection: Collection, owner: &OwnerId) -> RemoteResult<Vec<RemoteRecord>> {
        let response = self
            .request(self.client.get(self.collection_url(collection)))
            .query(&[("ownerId", owner.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("list failed: {e}")))?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("invalid list response: {e}")))
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn create(&self, collection: Collection, payload: &Payload) -> RemoteResult<RemoteId> {
        let response = self
            .request(self.client.post(self.collection_url(collection)))
            .json(payload)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("create failed: {e}")))?;

        let created: CreateResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("invalid create response: {e}")))?;

        debug!(collection = %collection, id = %created.id, "created remote document");
        Ok(RemoteId::new(created.id))
    }

    async fn update(
        &self,
        collection: Collection,
        doc_id: &RemoteId,
        payload: &Payload,
    ) -> RemoteResult<()> {
        let response = self
            .request(self.client.patch(self.doc_url(collection, doc_id)))
            .json(payload)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("update failed: {e}")))?;

        Self::check_status(response).await?;
        debug!(collection = %collection, id = %doc_id, "updated remote document");
        Ok(())
    }

    async fn delete(&self, collection: Collection, doc_id: &RemoteId) -> RemoteResult<()> {
        let response = self
            .request(self.client.delete(self.doc_url(collection, doc_id)))
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("delete failed: {e}")))?;

        Self::check_status(response).await?;
        debug!(collection = %collection, id = %doc_id, "deleted remote document");
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: Collection,
        owner: &OwnerId,
    ) -> RemoteResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = self.clone();
        let owner = owner.clone();
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        let task = tokio::spawn(async move {
            loop {
                let delivery = backend.list(collection, &owner).await;
                if let Err(e) = &delivery {
                    warn!(collection = %collection, "poll failed: {e}");
                }
                if tx.send(delivery).is_err() {
                    // Subscriber gone; stop polling.
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(Subscription::new(rx, Some(task)))
    }
}
