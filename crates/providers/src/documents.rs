//! Document store management for hosted file search.
//!
//! Thin wrappers over the vector store and file endpoints. A store is
//! created once, documents are uploaded and attached to it, and its id is
//! then handed to the `file_search` tool.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use turnwise_core::error::ProviderError;

use crate::responses::{ResponsesProvider, check_status};

/// A vector store as reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Attachment status of one file inside a store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreFile {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Deletion {
    #[serde(default)]
    deleted: bool,
}

impl ResponsesProvider {
    /// Create a store that expires after `expire_after_days` of inactivity.
    pub async fn create_vector_store(
        &self,
        name: &str,
        expire_after_days: Option<u32>,
    ) -> Result<VectorStore, ProviderError> {
        let mut body = json!({ "name": name });
        if let Some(days) = expire_after_days {
            body["expires_after"] = json!({ "anchor": "last_active_at", "days": days });
        }

        let response = self
            .authorized(self.client.post(format!("{}/vector_stores", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let store: VectorStore = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        info!(store_id = %store.id, name, "Created vector store");
        Ok(store)
    }

    /// Upload a local file for retrieval use; returns the file id.
    pub async fn upload_document(&self, path: &Path) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ProviderError::Io(format!("cannot read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        debug!(file = %file_name, size = bytes.len(), "Uploading document");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .authorized(self.client.post(format!("{}/files", self.base_url)))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let uploaded: UploadedFile = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        info!(file = %file_name, file_id = %uploaded.id, "Uploaded document");
        Ok(uploaded.id)
    }

    /// Attach an uploaded file to a store.
    pub async fn attach_document(
        &self,
        store_id: &str,
        file_id: &str,
    ) -> Result<StoreFile, ProviderError> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/vector_stores/{store_id}/files", self.base_url)),
            )
            .json(&json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Delete a store. Returns whether the service confirmed the deletion.
    pub async fn delete_vector_store(&self, store_id: &str) -> Result<bool, ProviderError> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/vector_stores/{store_id}", self.base_url)),
            )
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let deletion: Deletion = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        info!(store_id, deleted = deletion.deleted, "Deleted vector store");
        Ok(deletion.deleted)
    }
}
