//! Per-test result records
//!
//! One JSON file per finished test, `<uuid>-result.json`, in the shared
//! results directory. Records are written once and only read afterwards.

use std::path::{Path, PathBuf};

use playrun_common::{now_millis, Status};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::E2eResult;
use crate::identity::{display_label, TestIdentity};

/// Suffix shared by every record file
pub const RESULT_SUFFIX: &str = "-result.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub stop: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Older writers nest details and steps under a test stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStage {
    #[serde(default)]
    pub status_details: Option<StatusDetails>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

/// Persisted outcome of one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub uuid: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Raw status as written; see [`ResultRecord::status`]
    #[serde(default)]
    pub status: Option<String>,

    /// Epoch milliseconds
    #[serde(default)]
    pub start: Option<i64>,

    #[serde(default)]
    pub stop: Option<i64>,

    #[serde(default)]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    #[serde(default)]
    pub steps: Vec<StepRecord>,

    #[serde(default)]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_stage: Option<TestStage>,
}

impl ResultRecord {
    /// A fresh record for a test that is starting now
    pub fn new(identity: &TestIdentity) -> Self {
        let mut labels: Vec<Label> = identity
            .tags
            .iter()
            .map(|t| Label::new("tag", t.as_str()))
            .collect();
        labels.push(Label::new("module", identity.module.as_str()));
        if let Some(category) = &identity.category {
            labels.push(Label::new("category", category.as_str()));
        }

        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name: identity.title.clone(),
            full_name: Some(identity.node_id.clone()),
            description: identity.description.clone(),
            status: None,
            start: Some(now_millis()),
            stop: None,
            labels,
            status_details: None,
            steps: Vec::new(),
            attachments: Vec::new(),
            test_stage: None,
        }
    }

    /// Stamp the final status and stop time
    pub fn finish(&mut self, status: Status, details: Option<StatusDetails>) {
        self.status = Some(status.as_str().to_string());
        self.status_details = details;
        self.stop = Some(now_millis());
    }

    /// Canonical status; `broken` reads as failed
    pub fn status(&self) -> Status {
        Status::normalize(self.status.as_deref())
    }

    /// Non-empty values of every label called `name`, in order
    pub fn label_values(&self, name: &str) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|l| l.name == name)
            .filter_map(|l| l.value.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.label_values(name).first().copied()
    }

    /// `display_name` label, else the record name
    pub fn title(&self) -> &str {
        self.label("display_name").unwrap_or_else(|| self.name.trim())
    }

    /// `test_description` label, else the description, else empty
    pub fn description_text(&self) -> &str {
        self.label("test_description")
            .or_else(|| self.description.as_deref().map(str::trim))
            .unwrap_or("")
    }

    /// Display category, or `-`
    pub fn category(&self) -> String {
        let raw = self.label("category").or_else(|| self.label("tag"));
        match raw {
            Some(raw) if raw.len() <= 3 => raw.to_uppercase(),
            Some(raw) => display_label(raw),
            None => "-".to_string(),
        }
    }

    /// Display module: `module`, `feature` or `suite` label, else the second
    /// tag; `-` when none of them is set
    pub fn module(&self) -> String {
        self.label("module")
            .or_else(|| self.label("feature"))
            .or_else(|| self.label("suite"))
            .or_else(|| self.label_values("tag").get(1).copied())
            .map(display_label)
            .unwrap_or_else(|| "-".to_string())
    }

    /// Message and trace, falling back to the test stage
    pub fn failure_details(&self) -> (String, String) {
        let top = self.status_details.clone().unwrap_or_default();
        let mut message = top.message.unwrap_or_default();
        let mut trace = top.trace.unwrap_or_default();

        if message.trim().is_empty() && trace.trim().is_empty() {
            if let Some(stage) = self.test_stage.as_ref().and_then(|s| s.status_details.as_ref()) {
                message = stage.message.clone().unwrap_or_default();
                trace = stage.trace.clone().unwrap_or_default();
            }
        }
        (message.trim().to_string(), trace.trim().to_string())
    }

    /// All steps at every nesting level
    pub fn step_count(&self) -> usize {
        fn count(steps: &[StepRecord]) -> usize {
            steps.iter().map(|s| 1 + count(&s.steps)).sum()
        }

        if self.steps.is_empty() {
            self.test_stage.as_ref().map(|s| count(&s.steps)).unwrap_or(0)
        } else {
            count(&self.steps)
        }
    }

    /// Wall time of this test, when both timestamps are present and ordered
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) if start > 0 && stop >= start => Some(stop - start),
            _ => None,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.uuid, RESULT_SUFFIX)
    }

    /// Write `<uuid>-result.json` into `dir`. The file appears complete or
    /// not at all.
    pub fn write(&self, dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let tmp = dir.join(format!(".{}.tmp", self.file_name()));

        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!("Wrote result record {}", path.display());
        Ok(path)
    }

    pub fn read(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Store `bytes` next to the record and list it as an attachment
    pub fn attach_bytes(
        &mut self,
        dir: &Path,
        name: &str,
        bytes: &[u8],
        mime_type: &str,
        extension: &str,
    ) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let file_name = format!("{}-attachment.{}", uuid::Uuid::new_v4(), extension);
        let path = dir.join(&file_name);
        std::fs::write(&path, bytes)?;
        self.attachments.push(Attachment::new(name, file_name, mime_type));
        Ok(path)
    }
}
