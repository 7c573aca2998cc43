//! Export artifacts and where they are written

use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RouteError;
use crate::services::export::{export_file_name, Page, PAGE_HEIGHT_PT, PAGE_WIDTH_PT};

/// Paginated export with its embedded map image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Unique per export; keys the file on disk
    pub export_id: Uuid,
    pub organization_id: Uuid,
    pub route_id: Uuid,
    /// Name offered to the user, not unique
    pub file_name: String,
    pub page_width: u32,
    pub page_height: u32,
    pub pages: Vec<Page>,
    pub map_image_png_base64: String,
}

impl ExportDocument {
    pub fn new(
        organization_id: Uuid,
        route_id: Uuid,
        route_name: &str,
        pages: Vec<Page>,
        map_png: &[u8],
    ) -> Self {
        Self {
            export_id: Uuid::new_v4(),
            organization_id,
            route_id,
            file_name: export_file_name(route_name),
            page_width: PAGE_WIDTH_PT,
            page_height: PAGE_HEIGHT_PT,
            pages,
            map_image_png_base64: base64::engine::general_purpose::STANDARD.encode(map_png),
        }
    }
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    pub location: String,
    pub size_bytes: usize,
}

#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Persist the document. Nothing is left behind on failure.
    async fn write(&self, document: &ExportDocument) -> Result<ExportArtifact, RouteError>;
}

/// Writes exports as JSON files, one subdirectory per organization.
/// Files are named `{export_id}_{file_name}`, so exports never replace
/// each other.
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, document: &ExportDocument) -> (PathBuf, PathBuf) {
        let dir = self.dir.join(document.organization_id.to_string());
        let stored_name = format!("{}_{}", document.export_id, document.file_name);
        (dir.join(&stored_name), dir.join(format!(".{}.tmp", stored_name)))
    }
}

fn export_error(context: &str, e: impl std::fmt::Display) -> RouteError {
    RouteError::ExportFailed(format!("{}: {}", context, e))
}

#[async_trait]
impl ExportSink for FileExportSink {
    async fn write(&self, document: &ExportDocument) -> Result<ExportArtifact, RouteError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| export_error("Failed to serialize export", e))?;

        let (target, temp) = self.path_for(document);
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| export_error("Failed to create export directory", e))?;
        }

        let written = async {
            tokio::fs::write(&temp, &bytes)
                .await
                .map_err(|e| export_error("Failed to write export", e))?;
            tokio::fs::rename(&temp, &target)
                .await
                .map_err(|e| export_error("Failed to finalize export", e))
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                warn!("Could not remove temporary export {}: {}", temp.display(), cleanup);
            }
            return Err(e);
        }

        info!("Export written to {} ({} bytes)", target.display(), bytes.len());

        Ok(ExportArtifact {
            file_name: document.file_name.clone(),
            location: target.display().to_string(),
            size_bytes: bytes.len(),
        })
    }
}
