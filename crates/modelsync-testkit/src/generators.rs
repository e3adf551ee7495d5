//! Proptest generators for property-based testing.
//!
//! Generated ids are unique within each collection. Cross references
//! (a table's domain, a relationship's endpoints) may point at entities that
//! do not exist.

use proptest::prelude::*;
use serde_json::{json, Value};

use modelsync_core::{Domain, Relationship, System, Table, Workspace, WorkspaceData};

/// Generate an entity name.
pub fn entity_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_map(String::from)
}

/// Generate opaque attributes.
pub fn attributes() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({})),
        entity_name().prop_map(|d| json!({ "description": d })),
        (any::<u16>(), any::<u16>()).prop_map(|(x, y)| json!({ "position": { "x": x, "y": y } })),
    ]
}

/// Generate a reference to one of `count` ids with the given prefix, or to a
/// missing one.
fn reference(prefix: &'static str, count: usize) -> impl Strategy<Value = String> {
    (0..count + 1).prop_map(move |i| {
        if i < count {
            format!("{}{}", prefix, i)
        } else {
            format!("{}missing", prefix)
        }
    })
}

/// Generate a workspace graph with up to `max` entities per collection.
pub fn workspace_data_with(max: usize) -> impl Strategy<Value = WorkspaceData> {
    let sizes = (0..=max, 0..=max, 0..=max, 0..=max);

    (entity_name(), sizes).prop_flat_map(|(ws_name, (n_domains, n_tables, n_systems, n_rels))| {
        let domains = prop::collection::vec((entity_name(), attributes()), n_domains);
        let tables = prop::collection::vec(
            (entity_name(), reference("d", n_domains), attributes()),
            n_tables,
        );
        let systems = prop::collection::vec((entity_name(), reference("d", n_domains)), n_systems);
        let rels = prop::collection::vec(
            (
                reference("d", n_domains),
                reference("t", n_tables),
                reference("t", n_tables),
            ),
            n_rels,
        );

        (Just(ws_name), domains, tables, systems, rels).prop_map(
            |(ws_name, domains, tables, systems, rels)| {
                let ws = "ws";
                let mut data = WorkspaceData::new(Workspace::new(ws, ws_name));

                data.domains = domains
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, attrs))| {
                        Domain::new(format!("d{}", i), ws, name).with_attributes(attrs)
                    })
                    .collect();
                data.tables = tables
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, domain, attrs))| {
                        Table::new(format!("t{}", i), ws, domain, name).with_attributes(attrs)
                    })
                    .collect();
                data.systems = systems
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, domain))| System::new(format!("s{}", i), ws, domain, name))
                    .collect();
                data.relationships = rels
                    .into_iter()
                    .enumerate()
                    .map(|(i, (domain, source, target))| {
                        Relationship::new(format!("r{}", i), ws, domain, source, target)
                    })
                    .collect();

                data
            },
        )
    })
}

/// Generate a workspace graph of modest size.
pub fn workspace_data() -> impl Strategy<Value = WorkspaceData> {
    workspace_data_with(6)
}
