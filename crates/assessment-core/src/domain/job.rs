//! Provisioning job: the ephemeral aggregate for one provisioning run.

use assessment_remote::{ImportReport, ObjectKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::template::DatasetType;

/// Terminal outcome for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    Created,
    Reused,
    Failed,
}

/// A template after the provisioning engine is done with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedObject {
    pub kind: ObjectKind,
    pub dataset_type: DatasetType,
    /// Semantic label of the template this object came from.
    pub template_ref: String,
    /// Code last submitted (after any regeneration).
    pub code: String,
    pub remote_id: Option<String>,
    pub status: ProvisionStatus,
    pub error: Option<String>,
    /// Number of create requests sent for this template.
    pub create_attempts: u8,
}

impl ProvisionedObject {
    pub fn is_failed(&self) -> bool {
        self.status == ProvisionStatus::Failed
    }
}

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Coarse-grained stages of a run, independent of the number of templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SelectCategoryCombo,
    ExpandTemplates,
    LoadExisting,
    DataElements,
    Datasets,
    Finalize,
}

impl Stage {
    pub const TOTAL: u8 = 6;

    /// 1-based step number shown to the user.
    pub fn step(&self) -> u8 {
        match self {
            Stage::SelectCategoryCombo => 1,
            Stage::ExpandTemplates => 2,
            Stage::LoadExisting => 3,
            Stage::DataElements => 4,
            Stage::Datasets => 5,
            Stage::Finalize => 6,
        }
    }
}

/// One entry in the append-only progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Monotonic sequence number within the job.
    pub seq: u64,
    pub step: u8,
    pub total_steps: u8,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle of a provisioning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    /// Finished, but at least one template ended `Failed`.
    CompletedWithFailures,
    Cancelled,
}

/// Final summary returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningSummary {
    pub data_elements: Vec<ProvisionedObject>,
    pub datasets: Vec<ProvisionedObject>,
    pub category_combo: String,
}

/// Aggregate root for one provisioning run. Never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningJob {
    pub job_id: Uuid,
    pub assessment: String,
    pub status: JobStatus,
    pub stage: Stage,
    pub events: Vec<ProgressEvent>,
    pub data_elements: Vec<ProvisionedObject>,
    pub datasets: Vec<ProvisionedObject>,
    pub category_combo: String,
    /// Verbatim bulk import report, when the bulk strategy ran.
    pub import_report: Option<ImportReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProvisioningJob {
    pub fn new(assessment: &str) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            assessment: assessment.to_string(),
            status: JobStatus::Running,
            stage: Stage::SelectCategoryCombo,
            events: Vec::new(),
            data_elements: Vec::new(),
            datasets: Vec::new(),
            category_combo: String::new(),
            import_report: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Every provisioned object, data elements first.
    pub fn objects(&self) -> impl Iterator<Item = &ProvisionedObject> {
        self.data_elements.iter().chain(self.datasets.iter())
    }

    pub fn count(&self, status: ProvisionStatus) -> usize {
        self.objects().filter(|o| o.status == status).count()
    }

    pub fn failed(&self) -> Vec<&ProvisionedObject> {
        self.objects().filter(|o| o.is_failed()).collect()
    }

    pub fn summary(&self) -> ProvisioningSummary {
        ProvisioningSummary {
            data_elements: self.data_elements.clone(),
            datasets: self.datasets.clone(),
            category_combo: self.category_combo.clone(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(status: ProvisionStatus) -> ProvisionedObject {
        ProvisionedObject {
            kind: ObjectKind::DataElement,
            dataset_type: DatasetType::Register,
            template_ref: "REG - ANC".to_string(),
            code: "REG_X".to_string(),
            remote_id: None,
            status,
            error: None,
            create_attempts: 1,
        }
    }

    #[test]
    fn test_stage_steps_are_one_based_and_bounded() {
        assert_eq!(Stage::SelectCategoryCombo.step(), 1);
        assert_eq!(Stage::Finalize.step(), Stage::TOTAL);
    }

    #[test]
    fn test_job_counts_by_status() {
        let mut job = ProvisioningJob::new("Survey");
        job.data_elements = vec![
            object(ProvisionStatus::Created),
            object(ProvisionStatus::Reused),
            object(ProvisionStatus::Failed),
        ];
        job.datasets = vec![object(ProvisionStatus::Created)];
        assert_eq!(job.count(ProvisionStatus::Created), 2);
        assert_eq!(job.count(ProvisionStatus::Reused), 1);
        assert_eq!(job.failed().len(), 1);
    }
}
