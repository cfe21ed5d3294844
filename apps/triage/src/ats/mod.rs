//! ATS client: paginated listings, stage history and artifact downloads.
//!
//! All HTTP goes through an injected `AtsTransport`; the client itself only
//! knows paths, paging and record shapes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod intake;
pub mod models;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

use models::{Application, Artifact, Contact, Page, StageHistoryEntry};
pub use transport::{AtsTransport, HttpTransport};

/// How many history entries to ask for when resolving a contact's stage.
const STAGE_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum AtsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ATS returned status {status} for {path}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },

    #[error("Unexpected response shape from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Query-parameter convention for paging, which differs between API versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PageStyle {
    /// `limit` / `offset` (api3).
    #[default]
    LimitOffset,
    /// `$top` / `$skip` (pub/v1).
    TopSkip,
}

impl PageStyle {
    fn keys(self) -> (&'static str, &'static str) {
        match self {
            PageStyle::LimitOffset => ("limit", "offset"),
            PageStyle::TopSkip => ("$top", "$skip"),
        }
    }
}

impl FromStr for PageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "limit_offset" | "limit-offset" => Ok(PageStyle::LimitOffset),
            "top_skip" | "top-skip" => Ok(PageStyle::TopSkip),
            other => Err(format!("unknown page style '{other}'")),
        }
    }
}

/// The ATS client, constructed once per process and passed to every
/// operation that talks to the ATS.
#[derive(Clone)]
pub struct AtsClient {
    transport: Arc<dyn AtsTransport>,
    page_style: PageStyle,
    page_size: usize,
}

impl AtsClient {
    pub fn new(transport: Arc<dyn AtsTransport>, page_style: PageStyle, page_size: usize) -> Self {
        Self {
            transport,
            page_style,
            page_size: page_size.max(1),
        }
    }

    /// Drains a paginated listing.
    ///
    /// Stops on the first of: an empty page, a short page, or the running
    /// total reported in `Metadata` being reached. A 404 on the listing itself
    /// yields whatever was collected so far.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>, AtsError> {
        let (limit_key, offset_key) = self.page_style.keys();
        let mut items: Vec<T> = Vec::new();
        let mut offset = 0usize;
        let mut total: Option<usize> = None;

        loop {
            let mut query: Vec<(String, String)> = filters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            query.push((limit_key.to_string(), self.page_size.to_string()));
            query.push((offset_key.to_string(), offset.to_string()));

            let Some(body) = self.transport.get_json(path, &query).await? else {
                warn!("Listing {path} returned 404 at offset {offset}");
                break;
            };

            let page: Page<T> = serde_json::from_value(body).map_err(|source| AtsError::Decode {
                path: path.to_string(),
                source,
            })?;

            if total.is_none() {
                total = page.metadata.total();
            }

            let batch = page.data.unwrap_or_default();
            let count = batch.len();
            if count == 0 {
                break;
            }

            items.extend(batch);
            offset += count;
            debug!("Fetched {count} items from {path} (running total {offset})");

            if count < self.page_size || total.is_some_and(|t| offset >= t) {
                break;
            }
        }

        Ok(items)
    }

    /// All contacts pipelined into `job_id`.
    pub async fn list_job_contacts(&self, job_id: &str) -> Result<Vec<Contact>, AtsError> {
        self.fetch_all("/contacts", &[("job_ids", job_id)]).await
    }

    /// All document artifacts attached to `job_id`.
    pub async fn list_job_documents(&self, job_id: &str) -> Result<Vec<Artifact>, AtsError> {
        self.fetch_all(
            "/artifacts",
            &[("parent_ids", job_id), ("is_document", "true")],
        )
        .await
    }

    /// All applications submitted to `job_id`.
    pub async fn list_job_applications(&self, job_id: &str) -> Result<Vec<Application>, AtsError> {
        self.fetch_all("/applications", &[("job_ids", job_id)]).await
    }

    /// Title of the most recent stage a contact holds on a job.
    ///
    /// The API does not promise any ordering, so the bounded history is sorted
    /// by `Date` here. Entries with unreadable dates sort last. `None` means
    /// "no stage": a 404, an empty history, or a top entry without a title.
    pub async fn latest_stage(
        &self,
        job_id: &str,
        contact_id: &str,
    ) -> Result<Option<String>, AtsError> {
        let path = format!("/jobs/{job_id}/contacts/history");
        let (limit_key, _) = self.page_style.keys();
        let query = vec![
            ("contact_id".to_string(), contact_id.to_string()),
            (limit_key.to_string(), STAGE_HISTORY_LIMIT.to_string()),
        ];

        let Some(body) = self.transport.get_json(&path, &query).await? else {
            return Ok(None);
        };

        let page: Page<StageHistoryEntry> =
            serde_json::from_value(body).map_err(|source| AtsError::Decode {
                path: path.clone(),
                source,
            })?;

        let mut history: Vec<_> = page
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| (entry.timestamp(), entry))
            .collect();

        // Stable sort, newest first; `None` timestamps compare lowest.
        history.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(history
            .first()
            .and_then(|(_, entry)| entry.stage_title())
            .map(str::to_string))
    }

    /// Writes a contact's primary attachment to `<output_dir>/<contact id>/<name>`.
    ///
    /// Returns `None` without touching the filesystem when the contact has no
    /// primary attachment or the artifact is gone (404).
    pub async fn download_contact_resume(
        &self,
        contact: &Contact,
        output_dir: &Path,
    ) -> Result<Option<PathBuf>, AtsError> {
        let Some((artifact_id, file_name)) = contact.resume_attachment() else {
            debug!("Contact {} has no primary attachment", contact.id);
            return Ok(None);
        };

        let Some(content) = self
            .transport
            .get_bytes(&format!("/artifacts/{artifact_id}/content"))
            .await?
        else {
            warn!("Attachment {artifact_id} for contact {} not found", contact.id);
            return Ok(None);
        };

        let dest_dir = output_dir.join(models::safe_file_name(Some(&contact.id), "contact"));
        let dest = dest_dir.join(file_name);
        write_file(&dest_dir, &dest, &content).await?;
        Ok(Some(dest))
    }

    /// Downloads every document attached to a job into `output_dir`.
    /// Individual artifacts that 404 are skipped. A name already taken by an
    /// earlier document is prefixed with the artifact id.
    pub async fn download_job_documents(
        &self,
        job_id: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, AtsError> {
        let documents = self.list_job_documents(job_id).await?;
        info!("Job {job_id} has {} attached documents", documents.len());

        let mut written = Vec::with_capacity(documents.len());
        let mut used_names = HashSet::new();
        for artifact in &documents {
            let Some(content) = self
                .transport
                .get_bytes(&format!("/artifacts/{}/content", artifact.id))
                .await?
            else {
                warn!("Job document {} not found, skipping", artifact.id);
                continue;
            };

            let mut name = artifact.local_file_name();
            if !used_names.insert(name.clone()) {
                let unique = format!("{}-{name}", artifact.id);
                warn!(
                    "Job document {} reuses the name '{name}'; saving it as '{unique}'",
                    artifact.id
                );
                name = models::safe_file_name(Some(&unique), &artifact.id);
                used_names.insert(name.clone());
            }

            let dest = output_dir.join(name);
            write_file(output_dir, &dest, &content).await?;
            written.push(dest);
        }

        Ok(written)
    }
}

async fn write_file(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), AtsError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| AtsError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(dest, content)
        .await
        .map_err(|source| AtsError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
    debug!("Wrote {} bytes to {}", content.len(), dest.display());
    Ok(())
}
