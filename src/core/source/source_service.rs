// The content-sourcing pipeline. This module has NO HTTP or filesystem
// code: the Drive listing, Docs fetch and store registration are traits
// implemented by the infra layer, so the whole run is testable with mocks.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::core::document::{
    parse_document, render_markdown, render_text, ConvertError, ConvertedDocument,
    StructuredDocument,
};
use crate::core::nodes::{assemble_node, AssemblyError, ContentNode, FieldConfig};

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One file found by the Drive listing. The metadata map carries the raw
/// Drive fields that were requested via the `fields` configuration.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub created_time: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, Value>,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised by the sourcing pipeline.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Google auth error: {0}")]
    Auth(String),

    #[error("Google Drive API error: {0}")]
    Drive(String),

    #[error("Google Docs API error: {0}")]
    Docs(String),

    #[error("Failed to convert document {id}: {source}")]
    Document {
        id: String,
        #[source]
        source: ConvertError,
    },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("Conversion worker failed: {0}")]
    Worker(String),

    #[error("Content store error: {0}")]
    Store(String),
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// What to do when a single document fails to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentErrorPolicy {
    /// Fail the whole run on the first failing document.
    Abort,
    /// Log a warning and keep going without that document.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceConfig {
    /// Name of the collection registered with the store.
    pub type_name: String,
    /// Drive folder ids to walk recursively.
    pub folder_ids: Vec<String>,
    /// Page-size hint for the Drive listing.
    pub num_nodes: usize,
    /// Extra Drive fields to request per file (id and name are implied).
    pub fields: Vec<String>,
    /// Renames from Drive field names to node field names.
    pub fields_mapper: BTreeMap<String, String>,
    /// Node field defaults, applied only when the source has no value.
    pub fields_default: BTreeMap<String, Value>,
    /// How many documents to fetch and convert at once.
    pub concurrency: usize,
    pub on_document_error: DocumentErrorPolicy,
    /// Where the JSON store writes the collection.
    pub output_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let mut fields_mapper = BTreeMap::new();
        fields_mapper.insert("createdTime".to_string(), "date".to_string());
        fields_mapper.insert("name".to_string(), "title".to_string());

        let mut fields_default = BTreeMap::new();
        fields_default.insert("draft".to_string(), Value::Bool(false));

        Self {
            type_name: "GoogleDocs".to_string(),
            folder_ids: Vec::new(),
            num_nodes: 10,
            fields: vec!["createdTime".to_string()],
            fields_mapper,
            fields_default,
            concurrency: 4,
            on_document_error: DocumentErrorPolicy::Abort,
            output_dir: "content".to_string(),
        }
    }
}

impl SourceConfig {
    /// Check the configuration before any network call is made.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.folder_ids.is_empty() {
            return Err(SourceError::Config("missing folder ids".to_string()));
        }
        if self.type_name.trim().is_empty() {
            return Err(SourceError::Config("typeName must not be empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(SourceError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn field_config(&self) -> FieldConfig {
        FieldConfig {
            mapper: self.fields_mapper.clone(),
            defaults: self.fields_default.clone(),
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Trait describing the Drive listing operation the pipeline needs.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// List all Google Docs documents under the given folders, recursing
    /// into subfolders.
    async fn list_documents(
        &self,
        folder_ids: &[String],
        page_size: usize,
        fields: &[String],
    ) -> Result<Vec<FileDescriptor>, SourceError>;
}

/// Trait describing the Docs fetch operation the pipeline needs.
#[async_trait]
pub trait DocsClient: Send + Sync {
    async fn fetch_document(&self, document_id: &str)
        -> Result<StructuredDocument, SourceError>;
}

/// Destination for assembled nodes. The core registers a collection and
/// adds nodes; what the store does with them is its own business.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn add_collection(&self, type_name: &str) -> Result<(), SourceError>;
    async fn add_node(&self, type_name: &str, node: &ContentNode) -> Result<(), SourceError>;
}

// ============================================================================
// SOURCE SERVICE
// ============================================================================

/// Orchestrates one sourcing run: list, fetch, convert, assemble, register.
pub struct SourceService<D, G, S> {
    drive: D,
    docs: Arc<G>,
    store: S,
    config: SourceConfig,
}

impl<D, G, S> SourceService<D, G, S>
where
    D: DriveClient,
    G: DocsClient + 'static,
    S: ContentStore,
{
    pub fn new(drive: D, docs: G, store: S, config: SourceConfig) -> Self {
        Self {
            drive,
            docs: Arc::new(docs),
            store,
            config,
        }
    }

    /// Run the pipeline once and return the assembled nodes. Nodes are
    /// registered with the store in listing order; each node's id is the
    /// Drive file id, unchanged.
    pub async fn run(&self) -> Result<Vec<ContentNode>, SourceError> {
        self.config.validate()?;

        let files = self
            .drive
            .list_documents(
                &self.config.folder_ids,
                self.config.num_nodes,
                &self.config.fields,
            )
            .await?;
        tracing::info!(count = files.len(), "Listed Google Docs documents");

        let converted = self.convert_all(files).await?;

        let field_config = self.config.field_config();
        let mut nodes = Vec::with_capacity(converted.len());
        for (file, document) in &converted {
            tracing::debug!(document_id = %document.id, "Assembling node");
            nodes.push(assemble_node(file, document, &field_config)?);
        }

        self.store.add_collection(&self.config.type_name).await?;
        for node in &nodes {
            self.store.add_node(&self.config.type_name, node).await?;
        }
        tracing::info!(
            collection = %self.config.type_name,
            count = nodes.len(),
            "Registered content nodes"
        );

        Ok(nodes)
    }

    /// Fetch and convert every listed file under the concurrency limit.
    /// Conversions share no state, so workers just drain a queue; results
    /// are re-sorted into listing order afterwards.
    async fn convert_all(
        &self,
        files: Vec<FileDescriptor>,
    ) -> Result<Vec<(FileDescriptor, ConvertedDocument)>, SourceError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let worker_count = self.config.concurrency.max(1).min(files.len());
        let queue: Arc<Mutex<VecDeque<(usize, FileDescriptor)>>> =
            Arc::new(Mutex::new(files.into_iter().enumerate().collect()));

        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let docs = Arc::clone(&self.docs);
            workers.spawn(async move {
                let mut results = Vec::new();
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, file)) = next else { break };
                    tracing::debug!(document_id = %file.id, "Fetching document");
                    let outcome = fetch_and_convert(docs.as_ref(), &file).await;
                    results.push((index, file, outcome));
                }
                results
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = workers.join_next().await {
            let results = joined.map_err(|err| SourceError::Worker(err.to_string()))?;
            all.extend(results);
        }
        all.sort_by_key(|(index, _, _)| *index);

        let mut converted = Vec::new();
        for (_, file, outcome) in all {
            match outcome {
                Ok(document) => converted.push((file, document)),
                Err(err) => match self.config.on_document_error {
                    DocumentErrorPolicy::Abort => return Err(err),
                    DocumentErrorPolicy::Skip => {
                        tracing::warn!(
                            document_id = %file.id,
                            error = %err,
                            "Skipping document that failed to convert"
                        );
                    }
                },
            }
        }
        Ok(converted)
    }
}

async fn fetch_and_convert<G: DocsClient>(
    docs: &G,
    file: &FileDescriptor,
) -> Result<ConvertedDocument, SourceError> {
    let raw = docs.fetch_document(&file.id).await?;
    convert_file(file, &raw)
}

/// Pure conversion of one fetched document. The document's own title is
/// kept as a fallback in case no metadata mapping provides one.
fn convert_file(
    file: &FileDescriptor,
    raw: &StructuredDocument,
) -> Result<ConvertedDocument, SourceError> {
    let content = parse_document(raw).map_err(|source| SourceError::Document {
        id: file.id.clone(),
        source,
    })?;
    let markdown = render_markdown(&content);
    let text = render_text(&content);

    Ok(ConvertedDocument {
        id: file.id.clone(),
        date: file
            .created_time
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true)),
        title: raw.title.clone().unwrap_or_else(|| file.name.clone()),
        content,
        markdown,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file(id: &str) -> FileDescriptor {
        let mut metadata = BTreeMap::new();
        metadata.insert("name".to_string(), json!(format!("Doc {id}")));
        metadata.insert("createdTime".to_string(), json!("2023-01-01T00:00:00Z"));
        FileDescriptor {
            id: id.to_string(),
            name: format!("Doc {id}"),
            created_time: None,
            metadata,
        }
    }

    fn sample_document() -> StructuredDocument {
        serde_json::from_value(json!({
            "title": "Fetched",
            "body": {"content": [
                {"paragraph": {
                    "paragraphStyle": {"namedStyleType": "HEADING_2"},
                    "elements": [{"textRun": {"content": "Intro\n"}}]
                }},
                {"paragraph": {"elements": [
                    {"textRun": {"content": "Hello\n", "textStyle": {"bold": true}}}
                ]}}
            ]}
        }))
        .unwrap()
    }

    struct MockDrive {
        files: Vec<FileDescriptor>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DriveClient for MockDrive {
        async fn list_documents(
            &self,
            _folder_ids: &[String],
            _page_size: usize,
            _fields: &[String],
        ) -> Result<Vec<FileDescriptor>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.files.clone())
        }
    }

    struct MockDocs {
        fail_ids: HashSet<String>,
    }

    #[async_trait]
    impl DocsClient for MockDocs {
        async fn fetch_document(
            &self,
            document_id: &str,
        ) -> Result<StructuredDocument, SourceError> {
            if self.fail_ids.contains(document_id) {
                return Err(SourceError::Docs(format!("boom: {document_id}")));
            }
            Ok(sample_document())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingStore {
        collections: Arc<Mutex<Vec<String>>>,
        nodes: Arc<Mutex<Vec<ContentNode>>>,
    }

    #[async_trait]
    impl ContentStore for RecordingStore {
        async fn add_collection(&self, type_name: &str) -> Result<(), SourceError> {
            self.collections.lock().await.push(type_name.to_string());
            Ok(())
        }

        async fn add_node(&self, _type_name: &str, node: &ContentNode) -> Result<(), SourceError> {
            self.nodes.lock().await.push(node.clone());
            Ok(())
        }
    }

    fn config_with_folders() -> SourceConfig {
        SourceConfig {
            folder_ids: vec!["folder-1".to_string()],
            concurrency: 2,
            ..SourceConfig::default()
        }
    }

    fn service(
        files: Vec<FileDescriptor>,
        fail_ids: &[&str],
        config: SourceConfig,
    ) -> (
        SourceService<MockDrive, MockDocs, RecordingStore>,
        Arc<AtomicUsize>,
        RecordingStore,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let drive = MockDrive {
            files,
            calls: Arc::clone(&calls),
        };
        let docs = MockDocs {
            fail_ids: fail_ids.iter().map(|id| id.to_string()).collect(),
        };
        let store = RecordingStore::default();
        let service = SourceService::new(drive, docs, store.clone(), config);
        (service, calls, store)
    }

    #[tokio::test]
    async fn missing_folder_ids_fails_before_any_listing() {
        let (service, calls, _store) = service(vec![file("f1")], &[], SourceConfig::default());

        let err = service.run().await.unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_produces_one_node_per_document_in_listing_order() {
        let files = vec![file("f1"), file("f2"), file("f3")];
        let (service, _calls, store) = service(files, &[], config_with_folders());

        let nodes = service.run().await.unwrap();
        let ids: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);

        let stored = store.nodes.lock().await;
        let stored_ids: Vec<&str> = stored.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(stored_ids, vec!["f1", "f2", "f3"]);
        assert_eq!(*store.collections.lock().await, vec!["GoogleDocs"]);
    }

    #[tokio::test]
    async fn nodes_carry_markdown_metadata_and_defaults() {
        let (service, _calls, _store) = service(vec![file("f1")], &[], config_with_folders());

        let nodes = service.run().await.unwrap();
        let node = &nodes[0];
        assert_eq!(node.body, "## Intro\n\n**Hello**\n");
        assert_eq!(node.date.as_deref(), Some("2023-01-01T00:00:00Z"));
        assert_eq!(node.title, "Doc f1");
        assert_eq!(node.slug, "doc-f1");
        assert_eq!(node.fields.get("draft"), Some(&json!(false)));
        assert!(node.json.contains("\"heading\""));
    }

    #[tokio::test]
    async fn abort_policy_surfaces_the_failing_document() {
        let files = vec![file("f1"), file("f2"), file("f3")];
        let (service, _calls, _store) = service(files, &["f2"], config_with_folders());

        let err = service.run().await.unwrap_err();
        assert!(matches!(err, SourceError::Docs(_)));
    }

    #[tokio::test]
    async fn skip_policy_drops_only_the_failing_document() {
        let files = vec![file("f1"), file("f2"), file("f3")];
        let config = SourceConfig {
            on_document_error: DocumentErrorPolicy::Skip,
            ..config_with_folders()
        };
        let (service, _calls, store) = service(files, &["f2"], config);

        let nodes = service.run().await.unwrap();
        let ids: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f3"]);
        assert_eq!(store.nodes.lock().await.len(), 2);
    }

    #[test]
    fn config_parses_with_defaults_filling_the_gaps() {
        let config: SourceConfig = serde_json::from_str(
            r#"{"typeName": "Docs", "folderIds": ["a"], "onDocumentError": "skip"}"#,
        )
        .unwrap();

        assert_eq!(config.type_name, "Docs");
        assert_eq!(config.folder_ids, vec!["a"]);
        assert_eq!(config.on_document_error, DocumentErrorPolicy::Skip);
        assert_eq!(config.num_nodes, 10);
        assert_eq!(
            config.fields_mapper.get("createdTime").map(String::as_str),
            Some("date")
        );
        assert_eq!(config.fields_default.get("draft"), Some(&json!(false)));
    }

    #[test]
    fn created_time_formats_as_rfc3339_utc() {
        let mut descriptor = file("f1");
        descriptor.created_time = Some(
            DateTime::parse_from_rfc3339("2023-01-01T00:00:00+00:00")
                .unwrap()
                .with_timezone(&Utc),
        );
        let raw: StructuredDocument = serde_json::from_value(json!({"title": "T"})).unwrap();

        let converted = convert_file(&descriptor, &raw).unwrap();
        assert_eq!(converted.date.as_deref(), Some("2023-01-01T00:00:00Z"));
    }
}
