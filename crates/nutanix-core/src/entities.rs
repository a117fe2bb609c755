//! The four supported Prism entity types.

use crate::coerce::SemanticHint;
use crate::type_config::{EntityList, LabelDimension, StaticField, TypeConfig};

/// Cluster-level document, a single entity at the root of `/cluster/`.
pub static CLUSTER: TypeConfig = TypeConfig {
    name: "cluster",
    namespace: "nutanix_cluster",
    endpoint_path: "/cluster/",
    entity_list: EntityList::Root,
    identity_labels: &["uuid", "name", "cluster_external_ipaddress", "version"],
    label_dimensions: &[LabelDimension::same("uuid")],
    static_fields: &[StaticField::plain("num_nodes")],
    nested_sections: &["stats", "usage_stats"],
    document_sections: &[],
};

/// Hosts of the cluster.
pub static HOSTS: TypeConfig = TypeConfig {
    name: "hosts",
    namespace: "nutanix_hosts",
    endpoint_path: "/hosts/",
    entity_list: EntityList::Field("entities"),
    identity_labels: &[
        "uuid",
        "cluster_uuid",
        "name",
        "host_type",
        "hypervisor_address",
        "serial",
    ],
    label_dimensions: &[
        LabelDimension::same("uuid"),
        LabelDimension::same("cluster_uuid"),
    ],
    static_fields: &[
        StaticField::plain("num_vms"),
        StaticField::plain("num_cpu_cores"),
        StaticField::plain("num_cpu_sockets"),
        StaticField::plain("num_cpu_threads"),
        StaticField::plain("cpu_frequency_in_hz"),
        StaticField::plain("cpu_capacity_in_hz"),
        StaticField::plain("memory_capacity_in_bytes"),
        StaticField::plain("boot_time_in_usecs"),
    ],
    nested_sections: &["stats", "usage_stats"],
    document_sections: &[],
};

/// Storage containers.
pub static STORAGE_CONTAINERS: TypeConfig = TypeConfig {
    name: "storage_containers",
    namespace: "nutanix_storage_containers",
    endpoint_path: "/storage_containers/",
    entity_list: EntityList::Field("entities"),
    identity_labels: &[
        "storage_container_uuid",
        "cluster_uuid",
        "name",
        "replication_factor",
        "compression_enabled",
        "max_capacity",
    ],
    label_dimensions: &[
        LabelDimension::same("storage_container_uuid"),
        LabelDimension::same("cluster_uuid"),
    ],
    static_fields: &[],
    nested_sections: &["usage_stats"],
    document_sections: &[],
};

/// Virtual machines. Power state is exported as 1 (on) / 0 (off).
pub static VMS: TypeConfig = TypeConfig {
    name: "vms",
    namespace: "nutanix_vms",
    endpoint_path: "/vms/",
    entity_list: EntityList::Field("entities"),
    identity_labels: &[
        "uuid",
        "host_uuid",
        "name",
        "memory_mb",
        "num_vcpus",
        "power_state",
    ],
    label_dimensions: &[
        LabelDimension::same("uuid"),
        LabelDimension::same("host_uuid"),
    ],
    static_fields: &[
        StaticField::plain("num_cores_per_vcpu"),
        StaticField::plain("memory_mb"),
        StaticField::plain("num_vcpus"),
        StaticField::hinted("power_state", SemanticHint::PowerState),
        StaticField::plain("vcpu_reservation_hz"),
    ],
    nested_sections: &[],
    document_sections: &["metadata"],
};

/// Every built-in entity type, in exposition order.
pub fn all() -> [&'static TypeConfig; 4] {
    [&CLUSTER, &HOSTS, &STORAGE_CONTAINERS, &VMS]
}

/// Looks up a built-in entity type by collector name.
pub fn by_name(name: &str) -> Option<&'static TypeConfig> {
    all().into_iter().find(|c| c.name == name)
}
