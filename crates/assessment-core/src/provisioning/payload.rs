//! Template -> wire payload conversion.

use assessment_remote::{DataElementPayload, DataSetElement, DataSetPayload, IdRef, ObjectPayload};

use crate::domain::{DataElementTemplate, DatasetTemplate, Sharing};

pub fn element_payload(template: &DataElementTemplate, id: &str, sharing: Sharing) -> DataElementPayload {
    DataElementPayload {
        id: id.to_string(),
        name: template.name.clone(),
        short_name: template.short_name.clone(),
        code: template.code.clone(),
        description: template.description.clone(),
        value_type: template.value_type.clone(),
        aggregation_type: template.aggregation_type.clone(),
        domain_type: template.domain_type.clone(),
        category_combo: IdRef::new(template.category_combo.as_str()),
        public_access: sharing.public_access().to_string(),
    }
}

/// `members` are remote ids of the data elements the dataset references.
pub fn dataset_payload(template: &DatasetTemplate, id: &str, members: &[String]) -> DataSetPayload {
    DataSetPayload {
        id: id.to_string(),
        name: template.name.clone(),
        short_name: template.short_name.clone(),
        code: template.code.clone(),
        description: template.description.clone(),
        period_type: template.period_type.clone(),
        category_combo: IdRef::new(template.category_combo.as_str()),
        data_set_elements: members
            .iter()
            .map(|m| DataSetElement {
                data_element: IdRef::new(m.as_str()),
            })
            .collect(),
        organisation_units: template.org_unit_ids.iter().map(|ou| IdRef::new(ou.as_str())).collect(),
        public_access: template.sharing.public_access().to_string(),
    }
}

pub fn element_object(template: &DataElementTemplate, id: &str, sharing: Sharing) -> ObjectPayload {
    ObjectPayload::DataElement(element_payload(template, id, sharing))
}

pub fn dataset_object(template: &DatasetTemplate, id: &str, members: &[String]) -> ObjectPayload {
    ObjectPayload::DataSet(dataset_payload(template, id, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatasetType;

    #[test]
    fn test_dataset_payload_references_members_and_org_units() {
        let template = DatasetTemplate {
            dataset_type: DatasetType::Summary,
            label: "Survey - Summary".to_string(),
            name: "Survey - Summary".to_string(),
            code: "DS_SUM_0001".to_string(),
            short_name: "SUM - Survey".to_string(),
            description: "Summary dataset for Survey".to_string(),
            period_type: "Monthly".to_string(),
            category_combo: "bjDvmb4bfuf".to_string(),
            org_unit_ids: vec!["OU1".to_string()],
            sharing: Sharing::ReadWrite,
        };
        let payload = dataset_payload(&template, "ds1", &["de1".to_string(), "de2".to_string()]);
        assert_eq!(payload.data_set_elements.len(), 2);
        assert_eq!(payload.data_set_elements[1].data_element.id, "de2");
        assert_eq!(payload.organisation_units, vec![IdRef::new("OU1")]);
        assert_eq!(payload.public_access, "rw------");
    }
}
