//! End-to-end scrape scenarios against an in-memory document source.

use async_trait::async_trait;
use nutanix_core::entities::{CLUSTER, HOSTS, STORAGE_CONTAINERS, VMS};
use nutanix_core::{
    CollectorError, DocumentSource, EntityCollector, FetchError, ScrapeReport, TypeConfig,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Serves canned documents by path; paths without a document fail to fetch.
#[derive(Default)]
struct FakePrism {
    documents: Mutex<HashMap<String, Value>>,
}

impl FakePrism {
    fn with(docs: &[(&str, Value)]) -> Arc<Self> {
        let fake = Self::default();
        for (path, doc) in docs {
            fake.set(path, doc.clone());
        }
        Arc::new(fake)
    }

    fn set(&self, path: &str, doc: Value) {
        self.documents.lock().insert(path.to_string(), doc);
    }
}

#[async_trait]
impl DocumentSource for FakePrism {
    async fn fetch(&self, path: &str) -> Result<Value, FetchError> {
        self.documents
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                path: path.to_string(),
                reason: "connection reset by peer".to_string(),
            })
    }
}

fn collector(config: &'static TypeConfig, source: &Arc<FakePrism>) -> EntityCollector {
    let source: Arc<dyn DocumentSource> = source.clone();
    EntityCollector::new(config, source).unwrap()
}

fn find<'a>(report: &'a ScrapeReport, key: &str) -> Vec<(&'a [String], f64)> {
    report
        .samples
        .iter()
        .filter(|s| s.series.key().as_str() == key)
        .map(|s| (s.label_values.as_slice(), s.value))
        .collect()
}

fn host_doc(extra_stats: Value) -> Value {
    json!({
        "metadata": {"grand_total_entities": 1},
        "entities": [{
            "uuid": "h1",
            "cluster_uuid": "c1",
            "name": "host1",
            "host_type": "HYPER_CONVERGED",
            "hypervisor_address": "10.0.0.11",
            "serial": "SN-1",
            "num_vms": 7,
            "usage_stats": {"storage.usage_bytes": 1024},
            "stats": extra_stats
        }]
    })
}

#[tokio::test]
async fn test_host_properties_and_usage_stats() {
    let prism = FakePrism::with(&[("/hosts/", host_doc(json!({})))]);
    let hosts = collector(&HOSTS, &prism);

    let report = hosts.scrape().await.unwrap();

    let props = find(&report, "properties");
    assert_eq!(props.len(), 1);
    let (labels, value) = props[0];
    assert_eq!(value, 1.0);
    assert_eq!(
        labels,
        &["h1", "c1", "host1", "HYPER_CONVERGED", "10.0.0.11", "SN-1"]
    );

    let usage = find(&report, "storage_usage_bytes");
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].0, &["h1", "c1"]);
    assert_eq!(usage[0].1, 1024.0);

    let def = hosts
        .series()
        .into_iter()
        .find(|s| s.key().as_str() == "storage_usage_bytes")
        .unwrap();
    assert_eq!(def.name(), "nutanix_hosts_storage_usage_bytes");
    assert_eq!(def.label_names(), &["uuid", "cluster_uuid"]);
}

#[tokio::test]
async fn test_vm_power_state_encoding() {
    let prism = FakePrism::with(&[(
        "/vms/",
        json!({
            "metadata": {"total_entities": 3},
            "entities": [
                {"uuid": "v-on", "host_uuid": "h1", "power_state": "on"},
                {"uuid": "v-off", "host_uuid": "h1", "power_state": "off"},
                {"uuid": "v-odd", "host_uuid": null, "power_state": "suspended"}
            ]
        }),
    )]);
    let vms = collector(&VMS, &prism);

    let report = vms.scrape().await.unwrap();
    let power = find(&report, "power_state");

    let on: Vec<_> = power.iter().filter(|(l, _)| l[0] == "v-on").collect();
    let off: Vec<_> = power.iter().filter(|(l, _)| l[0] == "v-off").collect();
    let odd: Vec<_> = power.iter().filter(|(l, _)| l[0] == "v-odd").collect();
    assert_eq!(on.len(), 1);
    assert_eq!(on[0].1, 1.0);
    assert_eq!(off.len(), 1);
    assert_eq!(off[0].1, 0.0);
    assert!(odd.is_empty(), "unknown power state must be omitted, not zeroed");

    // the VM without a host still gets its properties series
    let props = find(&report, "properties");
    assert!(props.iter().any(|(l, _)| l[0] == "v-odd" && l[1].is_empty()));
}

#[tokio::test]
async fn test_new_stat_key_declared_on_later_scrape() {
    let prism = FakePrism::with(&[("/hosts/", host_doc(json!({"controller_num_iops": 10})))]);
    let hosts = collector(&HOSTS, &prism);

    hosts.scrape().await.unwrap();
    let first: Vec<String> = hosts.series().iter().map(|s| s.name().to_string()).collect();
    assert!(!first.contains(&"nutanix_hosts_new_metric".to_string()));

    prism.set(
        "/hosts/",
        host_doc(json!({"controller_num_iops": 12, "new_metric": 3})),
    );
    let report = hosts.scrape().await.unwrap();
    assert_eq!(report.new_series, 1);
    assert_eq!(find(&report, "new_metric")[0].1, 3.0);

    let second: Vec<String> = hosts.series().iter().map(|s| s.name().to_string()).collect();
    assert!(second.contains(&"nutanix_hosts_new_metric".to_string()));
    for name in &first {
        assert!(second.contains(name), "{name} was removed");
    }
}

#[tokio::test]
async fn test_vanished_key_stays_declared_without_value() {
    let prism = FakePrism::with(&[("/hosts/", host_doc(json!({"old_metric": 1})))]);
    let hosts = collector(&HOSTS, &prism);
    hosts.scrape().await.unwrap();

    prism.set("/hosts/", host_doc(json!({})));
    let report = hosts.scrape().await.unwrap();

    assert!(find(&report, "old_metric").is_empty());
    assert!(hosts.registry().snapshot().contains("old_metric"));
}

#[tokio::test]
async fn test_storage_container_failure_isolated() {
    let prism = FakePrism::with(&[
        (
            "/cluster/",
            json!({"uuid": "c1", "name": "prod", "num_nodes": 3, "stats": {}, "usage_stats": {}}),
        ),
        ("/hosts/", host_doc(json!({}))),
        (
            "/vms/",
            json!({"metadata": {}, "entities": [{"uuid": "v1", "host_uuid": "h1", "num_vcpus": 2}]}),
        ),
    ]);
    let cluster = collector(&CLUSTER, &prism);
    let hosts = collector(&HOSTS, &prism);
    let containers = collector(&STORAGE_CONTAINERS, &prism);
    let vms = collector(&VMS, &prism);
    let declared_before = containers.series().len();

    let (c, h, s, v) = tokio::join!(
        cluster.scrape(),
        hosts.scrape(),
        containers.scrape(),
        vms.scrape()
    );

    assert!(matches!(
        s,
        Err(CollectorError::Fetch(FetchError::Transport { .. }))
    ));
    assert_eq!(containers.series().len(), declared_before);

    let c = c.unwrap();
    assert_eq!(find(&c, "num_nodes")[0].1, 3.0);
    let h = h.unwrap();
    assert_eq!(find(&h, "num_vms")[0].1, 7.0);
    let v = v.unwrap();
    assert_eq!(find(&v, "num_vcpus")[0].1, 2.0);
}

#[tokio::test]
async fn test_failed_scrape_does_not_republish_values() {
    let prism = FakePrism::with(&[("/hosts/", host_doc(json!({"iops": 5})))]);
    let hosts = collector(&HOSTS, &prism);
    assert!(!hosts.scrape().await.unwrap().samples.is_empty());

    prism.documents.lock().clear();
    assert!(hosts.scrape().await.is_err());

    // the schema survives the failure
    assert!(hosts.registry().snapshot().contains("iops"));
}

#[tokio::test]
async fn test_concurrent_scrapes_are_serialized() {
    let prism = FakePrism::with(&[("/hosts/", host_doc(json!({"iops": 5, "latency": 2})))]);
    let hosts = Arc::new(collector(&HOSTS, &prism));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hosts = Arc::clone(&hosts);
            tokio::spawn(async move { hosts.scrape().await })
        })
        .collect();

    let mut new_series_total = 0;
    for handle in handles {
        new_series_total += handle.await.unwrap().unwrap().new_series;
    }
    // only one of the passes can have introduced the discovered keys
    assert_eq!(new_series_total, 3);
    assert!(hosts.registry().snapshot().contains("latency"));
}
