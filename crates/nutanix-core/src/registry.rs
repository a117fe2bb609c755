//! Dynamic schema registry.
//!
//! The registry maps normalized series keys to their declarations. It only ever
//! grows: a key that disappears from later documents keeps its declaration and
//! simply has no sample in that scrape.
//!
//! Updates go through a [`ScrapeBatch`]. A batch is built against the snapshot
//! that was current when the scrape started and is applied in one step by
//! [`SchemaRegistry::commit`], so readers either see the registry before the
//! scrape or after it, never in between. Readers take a cheap `Arc` clone of
//! the current [`SchemaSnapshot`] and never wait on a scrape in progress.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::normalize::{normalize, SeriesKey};

/// Declaration of one exposed series.
#[derive(Debug)]
pub struct SeriesDefinition {
    key: SeriesKey,
    name: String,
    label_names: Vec<String>,
    help: String,
    raw_name: String,
}

impl SeriesDefinition {
    /// Normalized key within the namespace.
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Fully qualified metric name (`<namespace>_<key>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered label names.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// HELP text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Field name of the first sighting.
    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }
}

/// A recorded value for one series and one set of label values.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Series the value belongs to.
    pub series: Arc<SeriesDefinition>,
    /// Values in the order of the series' label names.
    pub label_values: Vec<String>,
    /// Sample value.
    pub value: f64,
}

/// Immutable view of the registry at one point in time.
#[derive(Debug, Default)]
pub struct SchemaSnapshot {
    generation: u64,
    series: BTreeMap<SeriesKey, Arc<SeriesDefinition>>,
}

impl SchemaSnapshot {
    /// Number of commits that added series so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Definition of a normalized key.
    pub fn get(&self, key: &SeriesKey) -> Option<&Arc<SeriesDefinition>> {
        self.series.get(key)
    }

    /// Whether `key` is declared; the key is normalized first.
    pub fn contains(&self, key: &str) -> bool {
        self.series.contains_key(&normalize(key))
    }

    /// Number of declared series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether no series is declared.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Declared series ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SeriesDefinition>> {
        self.series.values()
    }
}

/// Series declarations of one collector.
#[derive(Debug)]
pub struct SchemaRegistry {
    namespace: String,
    current: RwLock<Arc<SchemaSnapshot>>,
}

impl SchemaRegistry {
    /// Creates an empty registry whose series are named `<namespace>_<key>`.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            current: RwLock::new(Arc::new(SchemaSnapshot::default())),
        }
    }

    /// Current snapshot. Holding it does not block commits.
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// All declared series ordered by key.
    pub fn series(&self) -> Vec<Arc<SeriesDefinition>> {
        self.snapshot().iter().cloned().collect()
    }

    /// Number of declared series.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no series is declared.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Declares a series immediately, outside of any scrape.
    ///
    /// Used for series that must exist before their first value (static
    /// fields, the properties series).
    pub fn declare(
        &self,
        raw_key: &str,
        label_names: &[String],
        help: &str,
    ) -> Result<Arc<SeriesDefinition>, SchemaError> {
        let mut batch = self.begin();
        let def = batch.declare_or_reuse(raw_key, label_names, || help.to_string())?;
        batch.keep.insert(def.key.clone());
        self.commit(batch)?;
        Ok(self
            .snapshot()
            .get(def.key())
            .cloned()
            .unwrap_or(def))
    }

    /// Starts a batch against the current snapshot.
    pub fn begin(&self) -> ScrapeBatch {
        ScrapeBatch {
            namespace: self.namespace.clone(),
            base: self.snapshot(),
            pending: BTreeMap::new(),
            values: BTreeMap::new(),
            keep: HashSet::new(),
            sources: HashMap::new(),
            collisions: HashSet::new(),
        }
    }

    /// Applies a batch and returns its samples.
    ///
    /// New definitions are published only if they received a value (or were
    /// declared explicitly). On error nothing is applied.
    pub fn commit(&self, batch: ScrapeBatch) -> Result<Vec<Sample>, SchemaError> {
        let ScrapeBatch {
            pending,
            values,
            keep,
            ..
        } = batch;

        let published = {
            let mut current = self.current.write();
            let mut series = current.series.clone();
            let mut added = 0usize;

            for (key, def) in pending {
                if !values.contains_key(&key) && !keep.contains(&key) {
                    continue;
                }
                match series.get(&key) {
                    Some(existing) if existing.label_names != def.label_names => {
                        return Err(SchemaError::DimensionConflict {
                            key: key.to_string(),
                            existing: existing.label_names.clone(),
                            requested: def.label_names.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        debug!(namespace = %self.namespace, series = %def.name, "Declared series");
                        series.insert(key, def);
                        added += 1;
                    }
                }
            }

            if added > 0 {
                *current = Arc::new(SchemaSnapshot {
                    generation: current.generation + 1,
                    series,
                });
            }
            Arc::clone(&current)
        };

        let mut samples = Vec::new();
        for (key, by_labels) in values {
            let Some(def) = published.get(&key) else {
                continue;
            };
            for (label_values, value) in by_labels {
                samples.push(Sample {
                    series: Arc::clone(def),
                    label_values,
                    value,
                });
            }
        }
        Ok(samples)
    }
}

/// Declarations and values gathered during one scrape.
#[derive(Debug)]
pub struct ScrapeBatch {
    namespace: String,
    base: Arc<SchemaSnapshot>,
    pending: BTreeMap<SeriesKey, Arc<SeriesDefinition>>,
    values: BTreeMap<SeriesKey, BTreeMap<Vec<String>, f64>>,
    keep: HashSet<SeriesKey>,
    /// First source that wrote each key in this batch.
    sources: HashMap<SeriesKey, String>,
    collisions: HashSet<SeriesKey>,
}

impl ScrapeBatch {
    /// Looks up the series for `raw_key`, declaring it in this batch if new.
    ///
    /// Returns the existing definition when the label names match and
    /// [`SchemaError::DimensionConflict`] when they do not.
    pub fn declare_or_reuse<F>(
        &mut self,
        raw_key: &str,
        label_names: &[String],
        help: F,
    ) -> Result<Arc<SeriesDefinition>, SchemaError>
    where
        F: FnOnce() -> String,
    {
        let key = normalize(raw_key);

        let existing = self
            .pending
            .get(&key)
            .or_else(|| self.base.get(&key))
            .cloned();

        if let Some(def) = existing {
            if def.label_names != label_names {
                return Err(SchemaError::DimensionConflict {
                    key: key.to_string(),
                    existing: def.label_names.clone(),
                    requested: label_names.to_vec(),
                });
            }
            return Ok(def);
        }

        let def = Arc::new(SeriesDefinition {
            name: format!("{}_{}", self.namespace, key),
            key: key.clone(),
            label_names: label_names.to_vec(),
            help: help(),
            raw_name: raw_key.to_string(),
        });
        self.pending.insert(key, Arc::clone(&def));
        Ok(def)
    }

    /// Notes that `source` (a field path such as `stats.iops`) wrote to
    /// `series` in this batch.
    ///
    /// Returns true, and logs a warning, the first time a second distinct
    /// source writes the same key. Values of both sources share the series
    /// and the last one recorded wins.
    pub fn note_source(&mut self, series: &SeriesDefinition, source: &str) -> bool {
        let Some(first) = self.sources.get(&series.key) else {
            self.sources.insert(series.key.clone(), source.to_string());
            return false;
        };
        if first == source || !self.collisions.insert(series.key.clone()) {
            return false;
        }
        warn!(
            namespace = %self.namespace,
            series = %series.name,
            first = %first,
            other = source,
            "Distinct fields map to the same series, last value wins"
        );
        true
    }

    /// Records a value; a later value for the same labels replaces it.
    pub fn record_value(
        &mut self,
        series: &SeriesDefinition,
        label_values: Vec<String>,
        value: f64,
    ) -> Result<(), SchemaError> {
        if label_values.len() != series.label_names.len() {
            return Err(SchemaError::LabelArity {
                key: series.key.to_string(),
                expected: series.label_names.len(),
                actual: label_values.len(),
            });
        }
        self.values
            .entry(series.key.clone())
            .or_default()
            .insert(label_values, value);
        Ok(())
    }

    /// Number of distinct (series, labels) values recorded so far.
    pub fn value_count(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    /// Number of series first seen in this batch.
    pub fn new_series_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn help() -> String {
        "test".to_string()
    }

    #[test]
    fn test_same_dimensions_reuse_definition() {
        let registry = SchemaRegistry::new("nutanix_hosts");
        let mut batch = registry.begin();
        let dims = labels(&["uuid", "cluster_uuid"]);
        let a = batch.declare_or_reuse("num_vms", &dims, help).unwrap();
        let b = batch.declare_or_reuse("num_vms", &dims, help).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "nutanix_hosts_num_vms");
    }

    #[test]
    fn test_reuse_across_scrapes_keeps_identity() {
        let registry = SchemaRegistry::new("ns");
        let dims = labels(&["uuid"]);

        let mut batch = registry.begin();
        let first = batch.declare_or_reuse("cpu", &dims, help).unwrap();
        batch.record_value(&first, labels(&["a"]), 1.0).unwrap();
        registry.commit(batch).unwrap();

        let mut batch = registry.begin();
        let second = batch.declare_or_reuse("cpu", &dims, help).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_different_dimensions_conflict() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        batch
            .declare_or_reuse("count", &labels(&["uuid"]), help)
            .unwrap();
        let err = batch
            .declare_or_reuse("count", &labels(&[]), help)
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DimensionConflict {
                key: "count".to_string(),
                existing: labels(&["uuid"]),
                requested: vec![],
            }
        );
    }

    #[test]
    fn test_conflict_against_committed_series() {
        let registry = SchemaRegistry::new("ns");
        registry
            .declare("properties", &labels(&["uuid", "name"]), "info")
            .unwrap();
        let mut batch = registry.begin();
        assert!(batch
            .declare_or_reuse("Properties", &labels(&["uuid"]), help)
            .is_err());
    }

    #[test]
    fn test_values_only_visible_after_commit() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("a.b", &labels(&["x"]), help).unwrap();
        batch.record_value(&def, labels(&["1"]), 5.0).unwrap();

        let before = registry.snapshot();
        assert!(registry.is_empty());

        let samples = registry.commit(batch).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 5.0);
        assert!(registry.snapshot().contains("a_b"));
        // snapshots taken earlier are unaffected
        assert!(before.is_empty());
    }

    #[test]
    fn test_unvalued_discoveries_not_published() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        batch.declare_or_reuse("never_valued", &[], help).unwrap();
        let def = batch.declare_or_reuse("valued", &[], help).unwrap();
        batch.record_value(&def, vec![], 1.0).unwrap();
        registry.commit(batch).unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.contains("valued"));
        assert!(!snapshot.contains("never_valued"));
    }

    #[test]
    fn test_last_write_wins() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("v", &labels(&["id"]), help).unwrap();
        batch.record_value(&def, labels(&["e1"]), 1.0).unwrap();
        batch.record_value(&def, labels(&["e1"]), 2.0).unwrap();
        batch.record_value(&def, labels(&["e2"]), 3.0).unwrap();
        assert_eq!(batch.value_count(), 2);

        let samples = registry.commit(batch).unwrap();
        let e1: Vec<_> = samples
            .iter()
            .filter(|s| s.label_values == labels(&["e1"]))
            .collect();
        assert_eq!(e1.len(), 1);
        assert_eq!(e1[0].value, 2.0);
    }

    #[test]
    fn test_collision_is_accepted() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let a = batch.declare_or_reuse("storage.usage_bytes", &[], help).unwrap();
        assert!(!batch.note_source(&a, "usage_stats.storage.usage_bytes"));
        batch.record_value(&a, vec![], 1.0).unwrap();
        let b = batch.declare_or_reuse("storage_usage_bytes", &[], help).unwrap();
        assert!(batch.note_source(&b, "stats.storage_usage_bytes"));
        batch.record_value(&b, vec![], 2.0).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // reported once per key and batch
        assert!(!batch.note_source(&b, "stats.other"));

        let samples = registry.commit(batch).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 2.0);
        assert_eq!(samples[0].series.raw_name(), "storage.usage_bytes");
    }

    #[test]
    fn test_same_source_is_not_a_collision() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("iops", &labels(&["id"]), help).unwrap();
        for id in ["e1", "e2", "e3"] {
            assert!(!batch.note_source(&def, "stats.iops"));
            batch.record_value(&def, labels(&[id]), 1.0).unwrap();
        }
        registry.commit(batch).unwrap();
    }

    #[test]
    fn test_renamed_field_in_later_batch_is_not_a_collision() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("a.b", &[], help).unwrap();
        batch.note_source(&def, "stats.a.b");
        batch.record_value(&def, vec![], 1.0).unwrap();
        registry.commit(batch).unwrap();

        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("a_b", &[], help).unwrap();
        assert_eq!(def.raw_name(), "a.b");
        assert!(!batch.note_source(&def, "stats.a_b"));
    }

    #[test]
    fn test_label_arity_checked() {
        let registry = SchemaRegistry::new("ns");
        let mut batch = registry.begin();
        let def = batch
            .declare_or_reuse("v", &labels(&["uuid", "cluster_uuid"]), help)
            .unwrap();
        let err = batch.record_value(&def, labels(&["only-one"]), 1.0).unwrap_err();
        assert!(matches!(err, SchemaError::LabelArity { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_generation_bumps_only_on_growth() {
        let registry = SchemaRegistry::new("ns");
        assert_eq!(registry.snapshot().generation(), 0);
        registry.declare("a", &[], "a").unwrap();
        assert_eq!(registry.snapshot().generation(), 1);

        let mut batch = registry.begin();
        let def = batch.declare_or_reuse("a", &[], help).unwrap();
        batch.record_value(&def, vec![], 1.0).unwrap();
        registry.commit(batch).unwrap();
        assert_eq!(registry.snapshot().generation(), 1);
    }

    #[test]
    fn test_declare_is_idempotent() {
        let registry = SchemaRegistry::new("ns");
        let a = registry.declare("num_nodes", &labels(&["uuid"]), "n").unwrap();
        let b = registry.declare("num_nodes", &labels(&["uuid"]), "n").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }
}
