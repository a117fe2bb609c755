#![warn(missing_docs)]

//! Nutanix exporter core: dynamic metric schema engine
//!
//! Prism returns semi-structured entity documents whose stat keys are not known
//! in advance. This crate discovers the series those documents contain,
//! normalizes field names into metric keys, coerces JSON values into sample
//! values, and keeps the declared schema consistent with the values populated
//! on every scrape.

pub mod coerce;
pub mod collector;
pub mod entities;
pub mod error;
pub mod flatten;
pub mod normalize;
pub mod registry;
pub mod type_config;

pub use coerce::{coerce, SemanticHint};
pub use collector::{DocumentSource, EntityCollector, ScrapeReport};
pub use error::{CollectorError, CollectorResult, FetchError, SchemaError};
pub use flatten::{flatten_document, flatten_entity, FlatSample, Origin, RawEntity, SampleValue};
pub use normalize::{normalize, SeriesKey};
pub use registry::{Sample, SchemaRegistry, SchemaSnapshot, ScrapeBatch, SeriesDefinition};
pub use type_config::{EntityList, LabelDimension, StaticField, TypeConfig, PROPERTIES_KEY};
