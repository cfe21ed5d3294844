use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of any ATS listing: `{"Data": [...], "Metadata": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Page<T> {
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageMetadata {
    pub total_count: Option<u64>,
    pub total_records: Option<u64>,
}

impl PageMetadata {
    /// Running total reported by the API, if any. Zero counts as unreported.
    pub fn total(&self) -> Option<usize> {
        [self.total_records, self.total_count]
            .into_iter()
            .flatten()
            .find(|n| *n > 0)
            .map(|n| n as usize)
    }
}

/// Reference to another ATS entity, as embedded in list records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityRef {
    pub id: Option<String>,
    pub title: Option<String>,
}

/// A contact pipelined into a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// The ATS's default resume for this contact.
    #[serde(default, rename = "PrimaryDocumentAttachmentId")]
    pub primary_attachment: Option<EntityRef>,
}

impl Contact {
    /// Artifact id and target file name of the primary attachment, if the
    /// contact has one.
    pub fn resume_attachment(&self) -> Option<(&str, String)> {
        let attachment = self.primary_attachment.as_ref()?;
        let id = attachment.id.as_deref().filter(|id| !id.is_empty())?;
        Some((id, safe_file_name(attachment.title.as_deref(), id)))
    }
}

/// A binary document stored in the ATS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Artifact {
    pub id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Artifact {
    pub fn local_file_name(&self) -> String {
        let preferred = self
            .file_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.name.as_deref());
        safe_file_name(preferred, &self.id)
    }
}

/// A candidate's application to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub id: String,
    #[serde(default, rename = "ContactId")]
    pub contact: Option<EntityRef>,
    #[serde(default, rename = "JobId")]
    pub job: Option<EntityRef>,
}

/// One timestamped entry of a (job, contact) stage history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StageHistoryEntry {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub stage: Option<EntityRef>,
}

impl StageHistoryEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_timestamp)
    }

    pub fn stage_title(&self) -> Option<&str> {
        self.stage.as_ref().and_then(|s| s.title.as_deref())
    }
}

/// Accepts RFC 3339 and the zone-less ISO form the ATS emits (`2024-03-01T10:00:00.123Z`
/// or without the trailing `Z`), interpreting the latter as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Reduces an ATS-supplied name to a bare file name so it cannot escape the
/// output directory. Falls back to `fallback` (usually the artifact id).
pub fn safe_file_name(candidate: Option<&str>, fallback: &str) -> String {
    candidate
        .map(|c| c.replace('\\', "/"))
        .and_then(|c| {
            Path::new(&c)
                .file_name()
                .map(|n| n.to_string_lossy().trim().to_string())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
