//! Bulk submission: every new object goes out in one metadata import.
//!
//! Ids are assigned before submission so datasets can reference data
//! elements created in the same import. There is no per-object conflict
//! resolution here; objects the import rejects are `Failed` with the
//! remote's message, and the report is kept on the job unchanged.

use assessment_remote::{ImportReport, ImportStatus, MetadataPayload, ObjectKind};

use super::engine::Run;
use super::payload::{dataset_payload, element_payload};
use super::plan::ProvisioningPlan;
use crate::domain::{DatasetType, ProvisionStatus, ProvisionedObject, Severity, Stage};
use crate::existing::ExistingMetadataIndex;

/// A template whose fate is decided either now (reuse) or by the import.
enum Slot {
    Done(ProvisionedObject),
    Pending(ProvisionedObject),
}

impl Slot {
    fn object(&self) -> &ProvisionedObject {
        match self {
            Slot::Done(o) | Slot::Pending(o) => o,
        }
    }
}

fn pending(
    kind: ObjectKind,
    dataset_type: DatasetType,
    label: &str,
    code: &str,
    id: String,
) -> ProvisionedObject {
    ProvisionedObject {
        kind,
        dataset_type,
        template_ref: label.to_string(),
        code: code.to_string(),
        remote_id: Some(id),
        status: ProvisionStatus::Created,
        error: None,
        create_attempts: 1,
    }
}

impl Run<'_> {
    pub(super) async fn submit_bulk(&mut self, plan: &ProvisioningPlan, existing: &ExistingMetadataIndex) {
        let engine = self.engine;
        let reuse = self.request.reuse_existing;
        let mut payload = MetadataPayload::default();

        self.progress.stage(
            &mut self.job,
            Stage::DataElements,
            format!("Preparing {} data elements for import", plan.element_count()),
        );
        let mut elements = Vec::with_capacity(plan.element_count());
        for template in plan.elements() {
            if self.cancelled() {
                return self.keep_done(elements, Vec::new());
            }
            let found = reuse
                .then(|| existing.find_reusable(ObjectKind::DataElement, &template.name, &template.label))
                .flatten();
            let slot = match found {
                Some(obj) => {
                    let base = pending(
                        ObjectKind::DataElement,
                        template.dataset_type,
                        &template.label,
                        &template.code,
                        obj.id.clone(),
                    );
                    let base = ProvisionedObject {
                        create_attempts: 0,
                        ..base
                    };
                    Slot::Done(self.reused(base, obj.id.clone(), "already exists"))
                }
                None => {
                    let id = engine.ids.new_object_id();
                    payload
                        .data_elements
                        .push(element_payload(template, &id, engine.config.sharing));
                    Slot::Pending(pending(
                        ObjectKind::DataElement,
                        template.dataset_type,
                        &template.label,
                        &template.code,
                        id,
                    ))
                }
            };
            elements.push(slot);
        }

        self.progress.stage(
            &mut self.job,
            Stage::Datasets,
            format!("Preparing {} datasets for import", plan.datasets.len()),
        );
        let mut datasets = Vec::with_capacity(plan.datasets.len());
        for template in &plan.datasets {
            if self.cancelled() {
                return self.keep_done(elements, datasets);
            }
            let found = reuse
                .then(|| existing.find_reusable(ObjectKind::DataSet, &template.name, &template.label))
                .flatten();
            let slot = match found {
                Some(obj) => {
                    let base = pending(
                        ObjectKind::DataSet,
                        template.dataset_type,
                        &template.label,
                        &template.code,
                        obj.id.clone(),
                    );
                    let base = ProvisionedObject {
                        create_attempts: 0,
                        ..base
                    };
                    Slot::Done(self.reused(base, obj.id.clone(), "already exists"))
                }
                None => {
                    let members: Vec<String> = elements
                        .iter()
                        .map(Slot::object)
                        .filter(|o| o.dataset_type == template.dataset_type)
                        .filter_map(|o| o.remote_id.clone())
                        .collect();
                    let id = engine.ids.new_object_id();
                    payload.data_sets.push(dataset_payload(template, &id, &members));
                    Slot::Pending(pending(
                        ObjectKind::DataSet,
                        template.dataset_type,
                        &template.label,
                        &template.code,
                        id,
                    ))
                }
            };
            datasets.push(slot);
        }

        if self.cancelled() {
            return self.keep_done(elements, datasets);
        }

        if payload.is_empty() {
            self.progress
                .info(&mut self.job, "Nothing to import; every object already exists");
            return self.keep_done(elements, datasets);
        }

        self.progress.info(
            &mut self.job,
            format!("Submitting metadata import with {} objects", payload.len()),
        );
        match engine.store.bulk_import(&payload).await {
            Ok(report) => {
                self.report_import(&report, payload.len());
                let settled_elements: Vec<_> = elements
                    .into_iter()
                    .map(|slot| self.settle(slot, Ok(&report)))
                    .collect();
                let settled_datasets: Vec<_> = datasets
                    .into_iter()
                    .map(|slot| self.settle(slot, Ok(&report)))
                    .collect();
                self.job.data_elements = settled_elements;
                self.job.datasets = settled_datasets;
                self.job.import_report = Some(report);
            }
            Err(err) => {
                let message = err.to_string();
                self.progress
                    .error(&mut self.job, format!("Metadata import failed: {}", message));
                let settled_elements: Vec<_> = elements
                    .into_iter()
                    .map(|slot| self.settle(slot, Err(message.as_str())))
                    .collect();
                let settled_datasets: Vec<_> = datasets
                    .into_iter()
                    .map(|slot| self.settle(slot, Err(message.as_str())))
                    .collect();
                self.job.data_elements = settled_elements;
                self.job.datasets = settled_datasets;
            }
        }
    }

    fn report_import(&mut self, report: &ImportReport, submitted: usize) {
        let severity = match report.status {
            ImportStatus::Ok => Severity::Success,
            ImportStatus::Warning => Severity::Warning,
            ImportStatus::Error => Severity::Error,
        };
        let de = &report.data_elements;
        let ds = &report.data_sets;
        self.progress.emit(
            &mut self.job,
            severity,
            format!(
                "Import {:?}: data elements {} created, {} updated, {} ignored; datasets {} created, {} updated, {} ignored",
                report.status, de.created, de.updated, de.ignored, ds.created, ds.updated, ds.ignored
            ),
        );
        let accounted = (report.created_count() + report.updated_count()) as usize + report.errors.len();
        if accounted != submitted {
            self.progress.warning(
                &mut self.job,
                format!(
                    "Import accounted for {} of {} submitted objects",
                    accounted, submitted
                ),
            );
        }
    }

    /// Final status of a slot given the import outcome.
    fn settle(&mut self, slot: Slot, outcome: Result<&ImportReport, &str>) -> ProvisionedObject {
        let object = match slot {
            Slot::Done(object) => return object,
            Slot::Pending(object) => object,
        };
        let id = object.remote_id.clone().unwrap_or_default();
        match outcome {
            Err(message) => self.failed(object, message.to_string()),
            Ok(report) => match report.error_for(object.kind, &id) {
                Some(err) => {
                    let message = err.message.clone();
                    self.failed(object, message)
                }
                None if report.status == ImportStatus::Error => {
                    self.failed(object, "import finished with status ERROR".to_string())
                }
                None => self.created(object, id),
            },
        }
    }

    /// Cancelled before submission: only decided (reused) objects are kept.
    fn keep_done(&mut self, elements: Vec<Slot>, datasets: Vec<Slot>) {
        let done = |slots: Vec<Slot>| -> Vec<ProvisionedObject> {
            slots
                .into_iter()
                .filter_map(|slot| match slot {
                    Slot::Done(o) => Some(o),
                    Slot::Pending(_) => None,
                })
                .collect()
        };
        self.job.data_elements = done(elements);
        self.job.datasets = done(datasets);
    }
}
