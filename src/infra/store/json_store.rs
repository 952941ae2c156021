use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::core::nodes::ContentNode;
use crate::core::source::{ContentStore, SourceError};

/// Content store that writes each collection to a pretty-printed JSON
/// file under the output directory. Stands in for a host data store so a
/// run's output can be inspected and diffed.
pub struct JsonContentStore {
    dir: PathBuf,
    nodes: Mutex<Vec<ContentNode>>,
}

impl JsonContentStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            nodes: Mutex::new(Vec::new()),
        }
    }

    async fn write(&self, type_name: &str, nodes: &[ContentNode]) -> Result<(), SourceError> {
        let text = serde_json::to_string_pretty(nodes)
            .map_err(|err| SourceError::Store(err.to_string()))?;
        let path = self.dir.join(format!("{type_name}.json"));
        fs::write(&path, text)
            .await
            .map_err(|err| SourceError::Store(format!("Failed to write {}: {err}", path.display())))
    }
}

#[async_trait]
impl ContentStore for JsonContentStore {
    async fn add_collection(&self, type_name: &str) -> Result<(), SourceError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| SourceError::Store(err.to_string()))?;
        self.nodes.lock().await.clear();
        self.write(type_name, &[]).await
    }

    async fn add_node(&self, type_name: &str, node: &ContentNode) -> Result<(), SourceError> {
        let snapshot = {
            let mut nodes = self.nodes.lock().await;
            nodes.push(node.clone());
            nodes.clone()
        };
        self.write(type_name, &snapshot).await
    }
}
