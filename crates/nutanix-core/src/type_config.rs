//! Per-entity-type configuration.
//!
//! A [`TypeConfig`] is the whole contract an entity type has to fill in to be
//! exported: where its document lives, how to find the entities in it, which
//! fields identify an entity and which fields carry measurements.

use crate::coerce::SemanticHint;

/// Name of the info-style series carrying identity labels.
pub const PROPERTIES_KEY: &str = "properties";

/// Where the entities live inside a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityList {
    /// The document root is the single entity (cluster-level data).
    Root,
    /// The named root field holds an array of entities.
    Field(&'static str),
}

/// A label attached to measurement series, taken from an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelDimension {
    /// Label name in the exposed series.
    pub label: &'static str,
    /// Entity field supplying the label value.
    pub field: &'static str,
}

impl LabelDimension {
    /// A label whose name equals its source field.
    pub const fn same(name: &'static str) -> Self {
        Self {
            label: name,
            field: name,
        }
    }
}

/// A field that is always published when present on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticField {
    /// Entity field name.
    pub name: &'static str,
    /// How string values of the field are interpreted.
    pub hint: Option<SemanticHint>,
}

impl StaticField {
    /// A plain numeric field.
    pub const fn plain(name: &'static str) -> Self {
        Self { name, hint: None }
    }

    /// A field with an enum-like string encoding.
    pub const fn hinted(name: &'static str, hint: SemanticHint) -> Self {
        Self {
            name,
            hint: Some(hint),
        }
    }
}

/// Immutable description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConfig {
    /// Short collector name (`hosts`, `vms`, ...).
    pub name: &'static str,
    /// Metric name prefix.
    pub namespace: &'static str,
    /// API path of the document.
    pub endpoint_path: &'static str,
    /// Location of the entities in the document.
    pub entity_list: EntityList,
    /// Fields aggregated into the properties series, in label order.
    pub identity_labels: &'static [&'static str],
    /// Labels attached to every measurement series, in order.
    pub label_dimensions: &'static [LabelDimension],
    /// Fields always published when present.
    pub static_fields: &'static [StaticField],
    /// Per-entity sub-documents whose keys are discovered at runtime.
    pub nested_sections: &'static [&'static str],
    /// Document-root sub-documents whose keys are discovered at runtime.
    pub document_sections: &'static [&'static str],
}

impl TypeConfig {
    /// Label names of measurement series.
    pub fn label_names(&self) -> Vec<String> {
        self.label_dimensions
            .iter()
            .map(|d| d.label.to_string())
            .collect()
    }

    /// Label names of the properties series.
    pub fn identity_label_names(&self) -> Vec<String> {
        self.identity_labels.iter().map(|s| s.to_string()).collect()
    }
}
