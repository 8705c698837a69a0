//! Prefab manifest interface.
//!
//! A prefab manifest maps prefab ids to document paths; a prefab document
//! carries `{components: {kind_name: fields}, children: [{key, ...}]}`. The
//! engine consumes exactly that shape -- authoring, directory scanning, and
//! asset pipelines live with collaborators.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use ember_ecs::command::CommandBuffer;
use ember_ecs::component::ComponentTypeId;
use ember_ecs::world::World;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// Prefab id -> path of its document.
pub type PrefabManifest = HashMap<String, PathBuf>;

/// One child entry. Only `key` is interpreted here; the remaining fields are
/// collaborator data carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabChild {
    pub key: String,
    #[serde(default)]
    pub components: HashMap<String, Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A prefab document: component data by kind name, plus optional children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrefabDocument {
    #[serde(default)]
    pub components: HashMap<String, Value>,
    #[serde(default)]
    pub children: Vec<PrefabChild>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a manifest file (`{prefab_id: "path/to/doc.json"}`).
pub fn load_manifest(path: &Path) -> Result<PrefabManifest, EngineError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Load one prefab document.
pub fn load_document(path: &Path) -> Result<PrefabDocument, EngineError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Resolve a `kind name -> fields` map against the registry.
fn resolve_components(
    world: &World,
    components: &HashMap<String, Value>,
) -> Result<Vec<(ComponentTypeId, Value)>, EngineError> {
    // Sorted for a deterministic command payload regardless of map order.
    let mut names: Vec<&String> = components.keys().collect();
    names.sort_unstable();
    names
        .into_iter()
        .map(|name| {
            world
                .registry()
                .type_id_of(name)
                .map(|id| (id, components[name].clone()))
                .ok_or_else(|| EngineError::UnknownKind { name: name.clone() })
        })
        .collect()
}

/// Record creation commands for a document: the root entity first, then one
/// entity per child. Returns the command indices, root first; the spawned
/// ids come out of the flush report at the next tick boundary.
pub fn instantiate(
    document: &PrefabDocument,
    world: &World,
    commands: &mut CommandBuffer,
) -> Result<Vec<u32>, EngineError> {
    let mut indices = Vec::with_capacity(1 + document.children.len());
    indices.push(commands.create_entity(resolve_components(world, &document.components)?));
    for child in &document.children {
        debug!(key = %child.key, "prefab child queued");
        indices.push(commands.create_entity(resolve_components(world, &child.components)?));
    }
    Ok(indices)
}

/// Load every document a manifest names and queue its instantiation.
///
/// Returns `prefab_id -> command indices`. Paths in the manifest are
/// resolved relative to `base`.
pub fn instantiate_manifest(
    manifest: &PrefabManifest,
    base: &Path,
    world: &World,
    commands: &mut CommandBuffer,
) -> anyhow::Result<HashMap<String, Vec<u32>>> {
    let mut out = HashMap::with_capacity(manifest.len());
    let mut ids: Vec<&String> = manifest.keys().collect();
    ids.sort_unstable();
    for id in ids {
        let path = base.join(&manifest[id]);
        let document = load_document(&path)
            .with_context(|| format!("prefab '{id}' at {}", path.display()))?;
        let indices = instantiate(&document, world, commands)
            .with_context(|| format!("prefab '{id}'"))?;
        out.insert(id.clone(), indices);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ecs::prelude::*;
    use serde_json::json;

    fn sample_world() -> World {
        let mut world = World::new();
        world
            .register_component(
                "position",
                Schema::new().field("x", FieldKind::F32).field("y", FieldKind::F32),
            )
            .unwrap();
        world
            .register_component("health", Schema::new().field("hp", FieldKind::U32))
            .unwrap();
        world
    }

    #[test]
    fn document_parses_with_children() {
        let doc: PrefabDocument = serde_json::from_value(json!({
            "components": {"position": {"x": 1.0, "y": 2.0}},
            "children": [
                {"key": "muzzle", "components": {"position": {"x": 0.5, "y": 0.0}}, "offset": 3}
            ]
        }))
        .unwrap();
        assert_eq!(doc.children.len(), 1);
        assert_eq!(doc.children[0].key, "muzzle");
        assert_eq!(doc.children[0].extra["offset"], json!(3));
    }

    #[test]
    fn instantiate_creates_root_and_children() {
        let mut world = sample_world();
        let doc: PrefabDocument = serde_json::from_value(json!({
            "components": {"position": {"x": 1.0, "y": 2.0}, "health": {"hp": 10}},
            "children": [{"key": "shadow", "components": {"position": {"x": 1.0, "y": 1.5}}}]
        }))
        .unwrap();

        let mut commands = CommandBuffer::new();
        let indices = instantiate(&doc, &world, &mut commands).unwrap();
        assert_eq!(indices.len(), 2);

        let report = commands.flush(&mut world).unwrap();
        let root = report.created_by(indices[0])[0];
        let child = report.created_by(indices[1])[0];
        let position = world.registry().type_id_of("position").unwrap();
        assert_eq!(world.field_value(root, position, "x"), Some(json!(1.0)));
        assert_eq!(world.field_value(child, position, "y"), Some(json!(1.5)));
        assert_eq!(world.entity_types(child).unwrap().len(), 1);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let world = sample_world();
        let doc: PrefabDocument = serde_json::from_value(json!({
            "components": {"sprite": {"sheet": "hero"}}
        }))
        .unwrap();
        let mut commands = CommandBuffer::new();
        assert!(matches!(
            instantiate(&doc, &world, &mut commands),
            Err(EngineError::UnknownKind { .. })
        ));
    }
}
