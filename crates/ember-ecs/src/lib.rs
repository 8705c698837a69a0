//! Ember ECS -- the storage, query, and mutation core of the Ember engine.
//!
//! Entities live in archetypes (one per unique set of component kinds) as
//! fixed-size chunks of Structure-of-Arrays columns. Component kinds are
//! declared from data: a [`Schema`](component::Schema) compiles into a column
//! plan (primitives, interned strings, enums, bitmasks, flat arrays, compiled
//! formulas, shared payload groups), so gameplay data defined outside Rust
//! flows straight into cache-friendly storage.
//!
//! Per-row dirty ticks make queries reactive: a system asks each chunk which
//! rows changed since it last ran. Structural edits are recorded in a
//! [`CommandBuffer`](command::CommandBuffer) and applied in one deterministic
//! flush per tick.
//!
//! # Quick Start
//!
//! ```
//! use ember_ecs::prelude::*;
//! use serde_json::json;
//!
//! let mut world = World::new();
//! let position = world
//!     .register_component(
//!         "position",
//!         Schema::new().field("x", FieldKind::F32).field("y", FieldKind::F32),
//!     )
//!     .unwrap();
//!
//! let mut commands = CommandBuffer::new();
//! let index = commands.create_entity(vec![(position, json!({"x": 1.0, "y": 2.0}))]);
//! let report = commands.flush(&mut world).unwrap();
//!
//! let entity = report.created_by(index)[0];
//! assert_eq!(world.field_value(entity, position, "x"), Some(json!(1.0)));
//! ```

#![deny(unsafe_code)]

pub mod archetype;
pub mod command;
pub mod component;
pub mod entity;
pub mod freelist;
pub mod intern;
pub mod query;
pub mod rpn;
pub mod shared;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The component kind is not registered, or not present on the target
    /// entity.
    #[error("unknown component '{name}'")]
    UnknownComponent { name: String },

    /// The entity handle's generation no longer matches the directory.
    #[error("entity {entity} is dead (stale generation)")]
    DeadEntity { entity: entity::EntityId },

    /// A shared allocator is exhausted and a rehost did not make room. Fatal
    /// for the flush that hits it.
    #[error("out of space: {what}")]
    OutOfSpace { what: String },

    /// Malformed schema or data. Fatal at registration time, recoverable
    /// (field skipped, logged) at write time.
    #[error("schema violation: {detail}")]
    SchemaViolation { detail: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::archetype::{ArchetypeId, DirtyMarker, Scalar, CHUNK_SIZE};
    pub use crate::command::{Command, CommandBuffer, CommandKind, FlushReport};
    pub use crate::component::{
        ComponentInfo, ComponentRegistry, ComponentTypeId, FieldKind, PrimKind, Schema,
    };
    pub use crate::entity::{EntityId, EntityLocation};
    pub use crate::intern::{StrRef, StringTable};
    pub use crate::query::{ChunkRef, ChunkViewMut, QueryId, QuerySpec};
    pub use crate::shared::{GroupId, SharedPayload, SharedValue};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------
