//! List tool: translatable files in one directory

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::paths::{format_timestamp, resolve};
use super::{LoopOptions, ToolError, ToolTrait};

const DEFAULT_EXTENSIONS: [&str; 2] = [".txt", ".md"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub extension: String,
    pub modified_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOutput {
    pub files: Vec<FileEntry>,
    pub total: usize,
}

#[derive(Deserialize)]
struct ListArgs {
    directory: Option<String>,
    extensions: Option<Vec<String>>,
}

pub struct ListTool {
    root: PathBuf,
}

impl ListTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Regular files in `dir` whose extension is in `extensions`, sorted by name.
    pub async fn list(&self, dir: &Path, extensions: &[String]) -> std::io::Result<ListOutput> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = tokio::fs::metadata(entry.path()).await?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let extension = Path::new(&name)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            if !extensions.iter().any(|allowed| *allowed == extension) {
                continue;
            }

            let path = entry.path().to_string_lossy().into_owned();
            let modified_at = metadata
                .modified()
                .map(format_timestamp)
                .unwrap_or_default();

            files.push(FileEntry {
                id: path.clone(),
                name,
                path,
                size: metadata.len(),
                extension,
                modified_at,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        let total = files.len();
        Ok(ListOutput { files, total })
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{}", ext)
    }
}

#[async_trait]
impl ToolTrait for ListTool {
    fn name(&self) -> &str {
        "List"
    }

    fn description(&self) -> &str {
        "List files in a directory that can be translated. Supports text files like .txt and .md."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to search (defaults to the session root)"
                },
                "extensions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "File extensions to include (defaults to .txt, .md)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, _options: &LoopOptions) -> Result<Value, ToolError> {
        let args: ListArgs = serde_json::from_value(args)?;

        let dir = match args.directory.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(d) => resolve(&self.root, d),
            None => self.root.clone(),
        };
        let extensions: Vec<String> = match args.extensions {
            Some(exts) => exts.iter().map(|e| normalize_extension(e)).collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };

        debug!(dir = %dir.display(), ?extensions, "listing files");
        let output = match self.list(&dir, &extensions).await {
            Ok(output) => output,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "listing failed");
                ListOutput::default()
            }
        };

        Ok(serde_json::to_value(output)?)
    }
}
