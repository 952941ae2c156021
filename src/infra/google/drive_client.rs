use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::auth::ServiceAccountAuth;
use crate::core::source::{DriveClient, FileDescriptor, SourceError};

const DOCUMENT_MIME_TYPE: &str = "application/vnd.google-apps.document";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Hard ceiling the Drive API puts on `pageSize`.
const MAX_PAGE_SIZE: usize = 1000;

/// Drive REST client that walks folders recursively and returns one
/// descriptor per Google Docs document found.
pub struct GoogleDriveClient {
    client: Client,
    auth: Arc<ServiceAccountAuth>,
    base_url: String,
}

impl GoogleDriveClient {
    pub fn new(auth: Arc<ServiceAccountAuth>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
        }
    }

    /// Listing query for one folder: its direct children that are either
    /// documents or subfolders, skipping trashed files.
    fn folder_query(folder_id: &str) -> String {
        format!(
            "'{folder_id}' in parents and trashed = false \
             and (mimeType = '{DOCUMENT_MIME_TYPE}' or mimeType = '{FOLDER_MIME_TYPE}')"
        )
    }

    /// Field projection for the listing response. The identity fields are
    /// always requested; configured fields are added on top.
    fn files_projection(fields: &[String]) -> String {
        let mut names: Vec<&str> = vec!["id", "name", "mimeType", "createdTime"];
        for field in fields {
            if !names.contains(&field.as_str()) {
                names.push(field);
            }
        }
        format!("nextPageToken, files({})", names.join(","))
    }

    async fn list_folder(
        &self,
        folder_id: &str,
        page_size: usize,
        fields: &[String],
    ) -> Result<Vec<ApiFile>, SourceError> {
        let token = self.auth.get_access_token().await?;
        let url = format!("{}/files", self.base_url);
        let query = Self::folder_query(folder_id);
        let projection = Self::files_projection(fields);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {token}"))
                .query(&[
                    ("q", query.as_str()),
                    ("fields", projection.as_str()),
                    ("pageSize", page_size.as_str()),
                ]);
            if let Some(page_token) = &page_token {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|err| SourceError::Drive(err.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|err| SourceError::Drive(err.to_string()))?;
                return Err(SourceError::Drive(format!(
                    "Listing folder {folder_id} failed ({status}): {text}"
                )));
            }

            let page: ApiFileList = response
                .json()
                .await
                .map_err(|err| SourceError::Drive(err.to_string()))?;
            files.extend(page.files);

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl DriveClient for GoogleDriveClient {
    async fn list_documents(
        &self,
        folder_ids: &[String],
        page_size: usize,
        fields: &[String],
    ) -> Result<Vec<FileDescriptor>, SourceError> {
        let mut pending: VecDeque<String> = folder_ids.iter().cloned().collect();
        let mut visited: HashSet<String> = folder_ids.iter().cloned().collect();
        let mut descriptors = Vec::new();

        while let Some(folder_id) = pending.pop_front() {
            tracing::debug!(folder_id = %folder_id, "Listing Drive folder");
            for file in self.list_folder(&folder_id, page_size, fields).await? {
                let mime_type = file.mime_type.clone();
                match mime_type.as_deref() {
                    Some(FOLDER_MIME_TYPE) => {
                        if let Some(id) = &file.id {
                            // Folders can be shared into each other; the
                            // visited set keeps the walk from looping.
                            if visited.insert(id.clone()) {
                                pending.push_back(id.clone());
                            }
                        }
                    }
                    Some(DOCUMENT_MIME_TYPE) => {
                        if let Some(descriptor) = map_file(file) {
                            descriptors.push(descriptor);
                        }
                    }
                    _ => {}
                }
            }
        }

        tracing::info!(count = descriptors.len(), "Drive listing complete");
        Ok(descriptors)
    }
}

fn map_file(file: ApiFile) -> Option<FileDescriptor> {
    let id = file.id?;
    let name = file.name.unwrap_or_default();
    let created_time = parse_datetime(file.created_time.as_deref());

    let mut metadata: BTreeMap<String, Value> = BTreeMap::new();
    metadata.insert("name".to_string(), Value::String(name.clone()));
    if let Some(created) = &file.created_time {
        metadata.insert("createdTime".to_string(), Value::String(created.clone()));
    }
    for (key, value) in file.extra {
        metadata.insert(key, value);
    }

    Some(FileDescriptor {
        id,
        name,
        created_time,
        metadata,
    })
}

fn parse_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
    created_time: Option<String>,
    /// Any extra fields requested via configuration land here.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}
