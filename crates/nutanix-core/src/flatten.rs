//! Flattening of entity records into publishable samples.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::coerce::{label_value, SemanticHint};
use crate::type_config::{TypeConfig, PROPERTIES_KEY};

/// Raw entity record as returned by the API.
pub type RawEntity = Map<String, Value>;

/// Where a flattened sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin<'a> {
    /// The info-style properties series.
    Properties,
    /// A key of a per-entity sub-document.
    Section(&'a str),
    /// A configured static field.
    Static,
    /// A key of a document-root sub-document.
    Document(&'a str),
}

/// Value of a flattened sample before coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue<'a> {
    /// A value taken from the document.
    Raw(&'a Value),
    /// A fixed value (the properties series is always 1).
    Constant(f64),
}

/// One (key, labels, value) tuple produced from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSample<'a> {
    /// Field name as it appears in the document.
    pub raw_key: &'a str,
    /// Where the field was found.
    pub origin: Origin<'a>,
    /// Label names, parallel to `label_values`.
    pub label_names: Vec<String>,
    /// Label values in label-name order.
    pub label_values: Vec<String>,
    /// Value to coerce.
    pub value: SampleValue<'a>,
    /// Interpretation hint for string values.
    pub hint: Option<SemanticHint>,
}

impl FlatSample<'_> {
    /// Path of the field in the document, e.g. `stats.iops`.
    pub fn source(&self) -> String {
        match self.origin {
            Origin::Section(section) | Origin::Document(section) => {
                format!("{}.{}", section, self.raw_key)
            }
            Origin::Properties | Origin::Static => self.raw_key.to_string(),
        }
    }

    /// Help text describing where the series comes from.
    pub fn help(&self, config: &TypeConfig) -> String {
        match self.origin {
            Origin::Properties => format!(
                "Properties of Nutanix {} entities (always 1)",
                config.name
            ),
            Origin::Section(section) | Origin::Document(section) => format!(
                "Value of {}.{} reported by {}",
                section, self.raw_key, config.endpoint_path
            ),
            Origin::Static => format!(
                "Value of {} reported by {}",
                self.raw_key, config.endpoint_path
            ),
        }
    }
}

/// Flattens one entity into its samples.
///
/// The properties sample comes first, then every key of every nested section,
/// then the static fields present on the entity. Missing sections and fields
/// are skipped; a section that is not an object is dropped for this entity.
pub fn flatten_entity<'a>(entity: &'a RawEntity, config: &'a TypeConfig) -> Vec<FlatSample<'a>> {
    let label_names = config.label_names();
    let label_values: Vec<String> = config
        .label_dimensions
        .iter()
        .map(|d| label_value(entity.get(d.field)))
        .collect();

    let mut out = Vec::new();
    out.push(FlatSample {
        raw_key: PROPERTIES_KEY,
        origin: Origin::Properties,
        label_names: config.identity_label_names(),
        label_values: config
            .identity_labels
            .iter()
            .map(|f| label_value(entity.get(*f)))
            .collect(),
        value: SampleValue::Constant(1.0),
        hint: None,
    });

    for &section in config.nested_sections {
        let Some(fields) = section_object(entity, section, config, &label_values) else {
            continue;
        };
        for (key, value) in fields {
            out.push(FlatSample {
                raw_key: key,
                origin: Origin::Section(section),
                label_names: label_names.clone(),
                label_values: label_values.clone(),
                value: SampleValue::Raw(value),
                hint: None,
            });
        }
    }

    for field in config.static_fields {
        match entity.get(field.name) {
            Some(value) => out.push(FlatSample {
                raw_key: field.name,
                origin: Origin::Static,
                label_names: label_names.clone(),
                label_values: label_values.clone(),
                value: SampleValue::Raw(value),
                hint: field.hint,
            }),
            None => debug!(
                namespace = config.namespace,
                field = field.name,
                labels = ?label_values,
                "Static field missing on entity"
            ),
        }
    }

    out
}

/// Flattens the document-root sections of a type, which carry no labels.
pub fn flatten_document<'a>(document: &'a Value, config: &'a TypeConfig) -> Vec<FlatSample<'a>> {
    let mut out = Vec::new();
    let Some(root) = document.as_object() else {
        return out;
    };
    for &section in config.document_sections {
        let Some(fields) = section_object(root, section, config, &[]) else {
            continue;
        };
        for (key, value) in fields {
            out.push(FlatSample {
                raw_key: key,
                origin: Origin::Document(section),
                label_names: Vec::new(),
                label_values: Vec::new(),
                value: SampleValue::Raw(value),
                hint: None,
            });
        }
    }
    out
}

fn section_object<'a>(
    owner: &'a RawEntity,
    section: &str,
    config: &TypeConfig,
    labels: &[String],
) -> Option<&'a RawEntity> {
    match owner.get(section) {
        Some(Value::Object(fields)) => Some(fields),
        None | Some(Value::Null) => {
            debug!(
                namespace = config.namespace,
                section,
                labels = ?labels,
                "Section missing"
            );
            None
        }
        Some(other) => {
            warn!(
                namespace = config.namespace,
                section,
                labels = ?labels,
                kind = value_kind(other),
                "Malformed section dropped"
            );
            None
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
