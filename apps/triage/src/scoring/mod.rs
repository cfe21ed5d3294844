//! Candidate scoring: one batched model call ranks every resume against a
//! job description.
//!
//! Flow: extract job documents → extract resumes → build prompt → one
//!       `ChatModel::complete` → parse JSON array → clamp → rank.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::extract::DocumentExtractor;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, ChatModel};

pub mod prompts;

use prompts::{RESPONSE_FORMAT_INSTRUCTION, SCORING_SYSTEM_TEMPLATE};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// The model's verdict on one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub filename: String,
    /// Always within [0, 100].
    pub score: f64,
    pub rationale: String,
}

pub fn system_prompt() -> String {
    SCORING_SYSTEM_TEMPLATE.replace("{json_only}", JSON_ONLY_SYSTEM)
}

/// Job description first, then every candidate under its own header, then the
/// response-format instruction.
pub fn build_user_prompt(candidates: &BTreeMap<String, String>, job_description: &str) -> String {
    let mut prompt = format!("Job Description:\n{job_description}\n\n");
    for (filename, text) in candidates {
        prompt.push_str(&format!("### Resume: {filename}\n{text}\n\n"));
    }
    prompt.push_str(RESPONSE_FORMAT_INSTRUCTION);
    prompt
}

/// Coerces a model-reported score into [0, 100]. Numbers and numeric strings
/// are accepted; anything else (missing, null, non-numeric, NaN) is 0.
pub fn coerce_score(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(score) if score.is_finite() => score.clamp(MIN_SCORE, MAX_SCORE),
        _ => MIN_SCORE,
    }
}

/// Parses the model's reply into validated results, in response order.
///
/// The reply must be a JSON array (optionally fenced). Anything else fails the
/// whole batch with `AppError::MalformedResponse` carrying the raw text.
/// Entries naming a file outside the batch, or repeating one already seen,
/// are dropped.
pub fn parse_scores(
    raw: &str,
    candidates: &BTreeMap<String, String>,
) -> Result<Vec<ScoreResult>, AppError> {
    let malformed = |reason: String| AppError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let parsed: Value =
        serde_json::from_str(strip_json_fences(raw)).map_err(|e| malformed(e.to_string()))?;
    let Value::Array(entries) = parsed else {
        return Err(malformed("expected a JSON array".to_string()));
    };

    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(filename) = entry.get("filename").and_then(Value::as_str) else {
            warn!("Dropping score entry without a filename: {entry}");
            continue;
        };
        if !candidates.contains_key(filename) {
            warn!("Dropping score for unknown file '{filename}'");
            continue;
        }
        if !seen.insert(filename.to_string()) {
            warn!("Dropping duplicate score for '{filename}'");
            continue;
        }

        results.push(ScoreResult {
            filename: filename.to_string(),
            score: coerce_score(entry.get("score")),
            rationale: entry
                .get("rationale")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let missing = candidates.len().saturating_sub(results.len());
    if missing > 0 {
        warn!("Model returned no usable score for {missing} candidate(s)");
    }

    Ok(results)
}

/// Sorts by score, highest first. Stable: ties keep response order.
pub fn rank(results: &mut [ScoreResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Scores every candidate against `job_description` with exactly one model
/// call. An empty batch returns an empty list without calling the model.
pub async fn score_candidates(
    model: &dyn ChatModel,
    candidates: &BTreeMap<String, String>,
    job_description: &str,
) -> Result<Vec<ScoreResult>, AppError> {
    if candidates.is_empty() {
        warn!("No candidate documents to score");
        return Ok(Vec::new());
    }

    info!(
        "Scoring {} candidates with {} ({} chars of job description)",
        candidates.len(),
        model.model(),
        job_description.len()
    );

    let reply = model
        .complete(&system_prompt(), &build_user_prompt(candidates, job_description))
        .await?;

    let mut results = parse_scores(&reply, candidates)?;
    rank(&mut results);
    Ok(results)
}

/// Extracts job documents and resumes from disk and scores them.
///
/// Both folders are checked before any extraction starts. Job documents are
/// joined with blank lines into a single description.
pub async fn find_best_candidates(
    model: &dyn ChatModel,
    extractor: &DocumentExtractor,
    resume_dir: &Path,
    job_docs_dir: &Path,
) -> Result<Vec<ScoreResult>, AppError> {
    for dir in [resume_dir, job_docs_dir] {
        if !dir.is_dir() {
            return Err(AppError::NotFound(dir.to_path_buf()));
        }
    }

    let job_docs = extractor.scan_folder_blocking(job_docs_dir).await?;
    let job_description = job_docs.into_values().collect::<Vec<_>>().join("\n\n");
    if job_description.trim().is_empty() {
        warn!("Job description is empty; scores will be unreliable");
    }

    let resumes = extractor.scan_folder_blocking(resume_dir).await?;
    score_candidates(model, &resumes, &job_description).await
}
