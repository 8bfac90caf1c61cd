use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of one try-on attempt, unique per submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A captured or selected image, in whichever representation the caller holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaRef {
    /// Remote image already hosted somewhere.
    Url { url: String },
    /// Inline `data:` URI, as produced by a canvas snapshot.
    DataUri { uri: String },
    /// Raw encoded image bytes.
    Blob { content_type: String, bytes: Vec<u8> },
}

impl MediaRef {
    pub fn url(url: impl Into<String>) -> Self {
        MediaRef::Url { url: url.into() }
    }

    /// Short human-readable label for logs; never includes the payload.
    pub fn describe(&self) -> String {
        match self {
            MediaRef::Url { url } => format!("url:{url}"),
            MediaRef::DataUri { uri } => format!("data-uri({} chars)", uri.len()),
            MediaRef::Blob {
                content_type,
                bytes,
            } => format!("blob:{content_type}({} bytes)", bytes.len()),
        }
    }
}

/// One logical unit of background processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub garment: MediaRef,
    pub photo: MediaRef,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, garment: MediaRef, photo: MediaRef) -> Self {
        Self {
            id,
            garment,
            photo,
            created_at: Utc::now(),
        }
    }
}

/// Flat status as reported by the processing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a channel saw for a job. The URL exists only on completion and the
/// error only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum JobOutcome {
    Pending {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
    },
    Completed {
        result_url: String,
    },
    Failed {
        error: String,
    },
}

/// An immutable observation of a job's status, produced by any channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: JobId,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn pending(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Pending { progress: None },
        }
    }

    pub fn completed(job_id: impl Into<JobId>, result_url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Completed {
                result_url: result_url.into(),
            },
        }
    }

    pub fn failed(job_id: impl Into<JobId>, error: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: JobOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn status(&self) -> JobStatus {
        match self.outcome {
            JobOutcome::Pending { .. } => JobStatus::Pending,
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn result_url(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Completed { result_url } => Some(result_url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Completed or failed; no further observation of this job can change anything.
    pub fn is_final(&self) -> bool {
        self.status() != JobStatus::Pending
    }
}

/// Contact details captured by the user-information form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactInfo {
    /// Returns the name of the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if !self.email.contains('@') {
            Some("email")
        } else {
            None
        }
    }
}

/// Everything `createOrder` needs for one committed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub job_id: JobId,
    pub result_url: String,
    pub contact: ContactInfo,
}

/// An order record written once per committed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub job_id: JobId,
    pub result_url: String,
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_request(id: String, request: OrderRequest) -> Self {
        Self {
            id,
            job_id: request.job_id,
            result_url: request.result_url,
            contact: request.contact,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_result_accessors_follow_status() {
        let done = JobResult::completed("j1", "https://cdn/out.png");
        assert_eq!(done.status(), JobStatus::Completed);
        assert_eq!(done.result_url(), Some("https://cdn/out.png"));
        assert_eq!(done.error(), None);
        assert!(done.is_final());

        let failed = JobResult::failed("j1", "model crashed");
        assert_eq!(failed.status(), JobStatus::Failed);
        assert_eq!(failed.result_url(), None);
        assert_eq!(failed.error(), Some("model crashed"));

        let pending = JobResult::pending("j1");
        assert!(!pending.is_final());
    }

    #[test]
    fn job_result_deserializes_from_wire_format() {
        let json = r#"{"jobId":"abc","status":"completed","resultUrl":"https://x/y.jpg"}"#;
        let result: JobResult = serde_json::from_str(json).unwrap();
        assert_eq!(result, JobResult::completed("abc", "https://x/y.jpg"));

        let json = r#"{"jobId":"abc","status":"failed","error":"timeout"}"#;
        let result: JobResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.error(), Some("timeout"));

        let json = r#"{"jobId":"abc","status":"pending","progress":40}"#;
        let result: JobResult = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.outcome,
            JobOutcome::Pending {
                progress: Some(40)
            }
        );
    }

    #[test]
    fn completed_without_url_is_rejected() {
        let json = r#"{"jobId":"abc","status":"completed"}"#;
        assert!(serde_json::from_str::<JobResult>(json).is_err());
    }

    #[test]
    fn media_ref_describe_hides_payload() {
        let blob = MediaRef::Blob {
            content_type: "image/png".into(),
            bytes: vec![0; 16],
        };
        assert_eq!(blob.describe(), "blob:image/png(16 bytes)");
        assert_eq!(MediaRef::url("https://a/b").describe(), "url:https://a/b");
    }

    #[test]
    fn contact_info_validation() {
        let mut info = ContactInfo {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: None,
        };
        assert_eq!(info.missing_field(), None);

        info.email = "nope".into();
        assert_eq!(info.missing_field(), Some("email"));

        info.name = "  ".into();
        assert_eq!(info.missing_field(), Some("name"));
    }
}
