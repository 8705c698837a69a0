//! Ember engine shell: the tick scheduler and the collaborator-facing
//! interfaces around the core.
//!
//! The [`tick::Scheduler`] runs registered systems in order and flushes the
//! core's command buffer at every tick boundary. [`prefab`] defines the
//! prefab manifest/document shapes and turns documents into creation
//! commands. Component and system *discovery* (directory scanning, category
//! maps) belongs to collaborators; this crate only fixes the mapping shape
//! and the registration entry points.

pub mod prefab;
pub mod tick;

use std::collections::HashMap;

use ember_ecs::component::{ComponentTypeId, Schema};
use ember_ecs::world::World;
use ember_ecs::EcsError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine shell.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// A document names a component kind the registry does not know.
    #[error("unknown component kind '{name}'")]
    UnknownKind { name: String },

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

// ---------------------------------------------------------------------------
// Discovery mappings
// ---------------------------------------------------------------------------

/// `{category: [name]}` discovery shape produced by external loaders.
pub type DiscoveryMap = HashMap<String, Vec<String>>;

/// Register a batch of data-declared component kinds. Names are processed in
/// sorted order so the assigned type ids are deterministic.
pub fn register_components(
    world: &mut World,
    schemas: &HashMap<String, Schema>,
) -> Result<HashMap<String, ComponentTypeId>, EcsError> {
    let mut names: Vec<&String> = schemas.keys().collect();
    names.sort_unstable();
    let mut out = HashMap::with_capacity(schemas.len());
    for name in names {
        let id = world.register_component(name, schemas[name].clone())?;
        out.insert(name.clone(), id);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Install the tracing subscriber. `ENV=production` quiets the default
/// filter to warnings; anything else (including unset) is development and
/// keeps debug output. `RUST_LOG` overrides both.
pub fn init_diagnostics() {
    let default_filter = match std::env::var("ENV").as_deref() {
        Ok("production") => "warn",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ecs::component::FieldKind;

    #[test]
    fn register_components_is_deterministic() {
        let mut schemas = HashMap::new();
        schemas.insert(
            "velocity".to_owned(),
            Schema::new().field("dx", FieldKind::F32).field("dy", FieldKind::F32),
        );
        schemas.insert(
            "position".to_owned(),
            Schema::new().field("x", FieldKind::F32).field("y", FieldKind::F32),
        );
        schemas.insert("anchor".to_owned(), Schema::new());

        let mut world_a = World::new();
        let ids_a = register_components(&mut world_a, &schemas).unwrap();
        let mut world_b = World::new();
        let ids_b = register_components(&mut world_b, &schemas).unwrap();

        assert_eq!(ids_a, ids_b);
        // Sorted registration: anchor < position < velocity.
        assert!(ids_a["anchor"] < ids_a["position"]);
        assert!(ids_a["position"] < ids_a["velocity"]);
    }
}
