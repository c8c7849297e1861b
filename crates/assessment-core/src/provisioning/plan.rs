//! Expanded templates for a request, before anything touches the remote.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::config::ProvisioningConfig;
use super::request::ProvisioningRequest;
use crate::category_combo::select_category_combo;
use crate::domain::{DataElementTemplate, DatasetTemplate, DatasetType, Result};
use crate::ids::IdGenerator;
use crate::templates::TemplateResolver;

/// Every template a run will try to provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningPlan {
    pub category_combo: String,
    pub data_elements: BTreeMap<DatasetType, Vec<DataElementTemplate>>,
    pub datasets: Vec<DatasetTemplate>,
}

impl ProvisioningPlan {
    /// Validate `request` and expand its templates for all four dataset types.
    pub fn build(request: &ProvisioningRequest, config: &ProvisioningConfig, ids: &dyn IdGenerator) -> Result<Self> {
        let category_combo = select_category_combo(&request.sources, &config.default_category_combo);
        Self::build_with(request, config, ids, category_combo)
    }

    /// Like `build`, with an already selected category combination.
    pub fn build_with(
        request: &ProvisioningRequest,
        config: &ProvisioningConfig,
        ids: &dyn IdGenerator,
        category_combo: String,
    ) -> Result<Self> {
        request.validate()?;

        let resolver = TemplateResolver::new(
            ids,
            &request.assessment_name,
            &request.assessment_description,
            config.code_length,
            &config.default_category_combo,
        )
        .with_category_combo(&category_combo);

        let org_unit_ids: Vec<String> = request
            .org_unit_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            data_elements: resolver.expand(&request.sources, &DatasetType::ALL),
            datasets: resolver.datasets(&DatasetType::ALL, &org_unit_ids, &config.period_type, config.sharing),
            category_combo,
        })
    }

    pub fn element_count(&self) -> usize {
        self.data_elements.values().map(Vec::len).sum()
    }

    /// Data-element templates in provisioning order (by dataset type).
    pub fn elements(&self) -> impl Iterator<Item = &DataElementTemplate> {
        self.data_elements.values().flatten()
    }

    /// Data-element templates belonging to `dataset_type`.
    pub fn elements_for(&self, dataset_type: DatasetType) -> &[DataElementTemplate] {
        self.data_elements
            .get(&dataset_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
