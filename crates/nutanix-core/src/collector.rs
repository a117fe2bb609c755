//! Per-entity-type collectors.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::coerce::coerce;
use crate::error::{CollectorError, CollectorResult, FetchError, SchemaError};
use crate::flatten::{flatten_document, flatten_entity, FlatSample, SampleValue};
use crate::registry::{Sample, ScrapeBatch, SchemaRegistry, SeriesDefinition};
use crate::type_config::{EntityList, TypeConfig, PROPERTIES_KEY};

/// Source of raw API documents.
///
/// Implementations own authentication and timeouts; a failed fetch fails
/// the scrape of the requesting collector only.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches the JSON document at `path`, relative to the API root.
    async fn fetch(&self, path: &str) -> Result<Value, FetchError>;
}

/// Outcome of one successful scrape.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    /// Collector name.
    pub collector: &'static str,
    /// Recorded samples, ordered by series key then label values.
    pub samples: Vec<Sample>,
    /// Number of entities found in the document.
    pub entities: usize,
    /// Values that could not be coerced and were left out.
    pub skipped: usize,
    /// Series first declared by this scrape.
    pub new_series: usize,
    /// Fetch plus populate time.
    pub duration: Duration,
}

/// Collects one entity type into its own schema registry.
pub struct EntityCollector {
    config: &'static TypeConfig,
    source: Arc<dyn DocumentSource>,
    registry: SchemaRegistry,
    scrape_lock: Mutex<()>,
}

impl std::fmt::Debug for EntityCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCollector")
            .field("name", &self.config.name)
            .field("series", &self.registry.len())
            .finish()
    }
}

impl EntityCollector {
    /// Creates a collector and declares its properties and static series.
    pub fn new(
        config: &'static TypeConfig,
        source: Arc<dyn DocumentSource>,
    ) -> Result<Self, SchemaError> {
        let registry = SchemaRegistry::new(config.namespace);
        registry.declare(
            PROPERTIES_KEY,
            &config.identity_label_names(),
            &format!("Properties of Nutanix {} entities (always 1)", config.name),
        )?;
        let labels = config.label_names();
        for field in config.static_fields {
            registry.declare(
                field.name,
                &labels,
                &format!("Value of {} reported by {}", field.name, config.endpoint_path),
            )?;
        }

        Ok(Self {
            config,
            source,
            registry,
            scrape_lock: Mutex::new(()),
        })
    }

    /// Collector name, e.g. `hosts`.
    pub fn name(&self) -> &'static str {
        self.config.name
    }

    /// Entity type configuration.
    pub fn config(&self) -> &'static TypeConfig {
        self.config
    }

    /// Schema registry owned by this collector.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Currently declared series, ordered by key.
    pub fn series(&self) -> Vec<Arc<SeriesDefinition>> {
        self.registry.series()
    }

    /// Fetches the document and records its samples.
    ///
    /// Scrapes of the same collector are serialized; a second call waits for
    /// the first to finish. Dropping the future before it completes leaves the
    /// registry untouched.
    pub async fn scrape(&self) -> CollectorResult<ScrapeReport> {
        let _guard = self.scrape_lock.lock().await;
        let start = Instant::now();

        let result = match self.source.fetch(self.config.endpoint_path).await {
            Ok(document) => self.populate(&document),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(mut report) => {
                report.duration = start.elapsed();
                info!(
                    collector = self.config.name,
                    entities = report.entities,
                    samples = report.samples.len(),
                    skipped = report.skipped,
                    new_series = report.new_series,
                    duration_ms = report.duration.as_millis() as u64,
                    "Scrape complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!(collector = self.config.name, error = %e, "Scrape failed");
                Err(e)
            }
        }
    }

    /// Records the samples of an already fetched document.
    pub fn populate(&self, document: &Value) -> CollectorResult<ScrapeReport> {
        let entities = self.entities(document)?;
        let mut batch = self.registry.begin();
        let mut skipped = 0usize;

        for (index, item) in entities.iter().enumerate() {
            let Some(entity) = item.as_object() else {
                warn!(
                    collector = self.config.name,
                    index,
                    "Entity is not an object, skipped"
                );
                continue;
            };
            for sample in flatten_entity(entity, self.config) {
                if !self.ingest(&mut batch, sample)? {
                    skipped += 1;
                }
            }
        }
        for sample in flatten_document(document, self.config) {
            if !self.ingest(&mut batch, sample)? {
                skipped += 1;
            }
        }

        let new_series = batch.new_series_count();
        let samples = self.registry.commit(batch).map_err(|e| self.schema_error(e))?;

        Ok(ScrapeReport {
            collector: self.config.name,
            samples,
            entities: entities.len(),
            skipped,
            new_series,
            duration: Duration::ZERO,
        })
    }

    fn entities<'a>(&self, document: &'a Value) -> CollectorResult<Vec<&'a Value>> {
        match self.config.entity_list {
            EntityList::Root if document.is_object() => Ok(vec![document]),
            EntityList::Root => Err(self.malformed("document root is not an object")),
            EntityList::Field(field) => match document.get(field) {
                Some(Value::Array(items)) => Ok(items.iter().collect()),
                Some(_) => Err(self.malformed(&format!("`{field}` is not an array"))),
                // document sections are published even without entities
                None if !self.config.document_sections.is_empty() => {
                    debug!(collector = self.config.name, field, "Entity list missing, no entities");
                    Ok(Vec::new())
                }
                None => Err(self.malformed(&format!("`{field}` is missing"))),
            },
        }
    }

    /// Declares and records one sample. Returns false if its value was skipped.
    fn ingest(&self, batch: &mut ScrapeBatch, sample: FlatSample<'_>) -> CollectorResult<bool> {
        let series = batch
            .declare_or_reuse(sample.raw_key, &sample.label_names, || {
                sample.help(self.config)
            })
            .map_err(|e| self.schema_error(e))?;

        let value = match sample.value {
            SampleValue::Constant(v) => Some(v),
            SampleValue::Raw(raw) => coerce(raw, sample.hint),
        };
        let Some(value) = value else {
            debug!(
                collector = self.config.name,
                field = sample.raw_key,
                labels = ?sample.label_values,
                "Value not coercible, skipped"
            );
            return Ok(false);
        };

        batch.note_source(&series, &sample.source());
        batch
            .record_value(&series, sample.label_values, value)
            .map_err(|e| self.schema_error(e))?;
        Ok(true)
    }

    fn schema_error(&self, source: SchemaError) -> CollectorError {
        CollectorError::Schema {
            namespace: self.config.namespace.to_string(),
            source,
        }
    }

    fn malformed(&self, reason: &str) -> CollectorError {
        CollectorError::Malformed {
            path: self.config.endpoint_path.to_string(),
            reason: reason.to_string(),
        }
    }
}
