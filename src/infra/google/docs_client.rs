use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use super::auth::ServiceAccountAuth;
use crate::core::document::StructuredDocument;
use crate::core::source::{DocsClient, SourceError};

/// Docs REST client: fetches the structured body of one document.
pub struct GoogleDocsClient {
    client: Client,
    auth: Arc<ServiceAccountAuth>,
    base_url: String,
}

impl GoogleDocsClient {
    pub fn new(auth: Arc<ServiceAccountAuth>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: "https://docs.googleapis.com/v1".to_string(),
        }
    }
}

#[async_trait]
impl DocsClient for GoogleDocsClient {
    async fn fetch_document(&self, document_id: &str) -> Result<StructuredDocument, SourceError> {
        let token = self.auth.get_access_token().await?;
        let url = format!("{}/documents/{}", self.base_url, document_id);

        tracing::debug!(document_id = %document_id, "Fetching Google Doc");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|err| SourceError::Docs(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| SourceError::Docs(err.to_string()))?;
            return Err(SourceError::Docs(format!(
                "Fetching document {document_id} failed ({status}): {text}. \
                 Make sure the document is shared with the service account email."
            )));
        }

        response
            .json::<StructuredDocument>()
            .await
            .map_err(|err| SourceError::Docs(err.to_string()))
    }
}
