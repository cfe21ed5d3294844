//! Resume intake: pulls the resumes of candidates in a target stage plus the
//! job's own documents onto local disk.
//!
//! Flow: list contacts → latest stage per contact → download matching resumes
//!       → download job documents.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::models::{Application, Artifact, Contact};
use super::{AtsClient, AtsError};

/// Counters reported at the end of `process_job`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub contacts_seen: usize,
    pub contacts_in_stage: usize,
    pub resumes_written: usize,
    /// Contacts whose stage lookup or download failed and were left out.
    pub contacts_skipped: usize,
    pub documents_written: usize,
}

/// Selection policy: the contact's latest stage title, trimmed, must equal the
/// trimmed target exactly. A contact with no stage never matches.
pub fn stage_matches(latest: Option<&str>, target: &str) -> bool {
    latest.is_some_and(|stage| stage.trim() == target.trim())
}

/// Downloads the resume of every contact whose latest stage on `job_id` is
/// `target_stage`, then every job-level document.
///
/// A failure on one contact (stage lookup or download) is logged and that
/// contact is skipped. Failing to list the contacts or to fetch a job
/// document is fatal.
pub async fn process_job(
    ats: &AtsClient,
    job_id: &str,
    target_stage: &str,
    resume_dir: &Path,
    docs_dir: &Path,
) -> Result<JobSummary, AtsError> {
    let mut summary = JobSummary::default();

    let contacts = ats.list_job_contacts(job_id).await?;
    summary.contacts_seen = contacts.len();
    info!("Job {job_id}: {} contacts in pipeline", contacts.len());

    for contact in &contacts {
        let stage = match ats.latest_stage(job_id, &contact.id).await {
            Ok(stage) => stage,
            Err(e) => {
                warn!("Stage lookup failed for contact {}: {e}", contact.id);
                summary.contacts_skipped += 1;
                continue;
            }
        };

        if !stage_matches(stage.as_deref(), target_stage) {
            continue;
        }
        summary.contacts_in_stage += 1;

        match ats.download_contact_resume(contact, resume_dir).await {
            Ok(Some(path)) => {
                info!("Downloaded resume for {} to {}", contact.id, path.display());
                summary.resumes_written += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Resume download failed for contact {}: {e}", contact.id);
                summary.contacts_skipped += 1;
            }
        }
    }

    let documents = ats.download_job_documents(job_id, docs_dir).await?;
    summary.documents_written = documents.len();

    info!(
        "Job {job_id} intake done: {} of {} contacts in stage '{}', {} resumes, {} skipped, {} documents",
        summary.contacts_in_stage,
        summary.contacts_seen,
        target_stage.trim(),
        summary.resumes_written,
        summary.contacts_skipped,
        summary.documents_written
    );

    Ok(summary)
}

/// Everything the ATS knows about a job's candidates and documents, without
/// downloading any content.
#[derive(Debug, Serialize)]
pub struct JobListing {
    pub job_id: String,
    pub contacts: Vec<Contact>,
    pub applications: Vec<Application>,
    pub documents: Vec<Artifact>,
}

pub async fn inspect_job(ats: &AtsClient, job_id: &str) -> Result<JobListing, AtsError> {
    Ok(JobListing {
        job_id: job_id.to_string(),
        contacts: ats.list_job_contacts(job_id).await?,
        applications: ats.list_job_applications(job_id).await?,
        documents: ats.list_job_documents(job_id).await?,
    })
}
