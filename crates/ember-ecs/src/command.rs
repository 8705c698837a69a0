//! Deferred structural edits, applied atomically at tick boundaries.
//!
//! The [`CommandBuffer`] is the sole mutator of structural state during a
//! frame. Systems record edits while they iterate; the scheduler flushes the
//! buffer once per tick. The flush is phased so that, within one boundary:
//!
//! 1. every `set_component_data` lands first (no structural effect),
//! 2. add/remove pairs collapse into one net move per entity, batched by
//!    `(from, to)` archetype pair,
//! 3. creations fill whole SoA runs grouped by target archetype,
//! 4. destroys run grouped by archetype, highest rows first,
//! 5. the tick advances.
//!
//! Data written through the buffer is marked dirty with the tick being
//! entered, so reactive queries observe it exactly once, on the next tick.
//! In-place writes made directly by systems mark with the current tick and
//! are observed by later systems in the same tick.
//!
//! Recoverable command failures are collected into the [`FlushReport`];
//! commands aimed at dead entities are dropped silently (destroy is
//! idempotent). Allocator exhaustion that survives a rehost aborts the flush
//! -- the world may then hold a partially applied boundary and the scheduler
//! halts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::component::ComponentTypeId;
use crate::entity::EntityId;
use crate::query::QueryId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The payload of one recorded edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandKind {
    /// Allocate an entity, insert a row in the archetype of `components`,
    /// populate columns.
    Create {
        components: Vec<(ComponentTypeId, Value)>,
    },
    /// Bulk creation: one archetype resolution, one SoA fill per column run.
    CreateBatch {
        components: Vec<(ComponentTypeId, Value)>,
        count: u32,
    },
    /// Swap-and-pop removal; the handle generation is bumped.
    Destroy { entity: EntityId },
    /// Removal of a query's rows, snapshotted when the command was recorded.
    DestroyMatched { entities: Vec<EntityId> },
    /// Move to `current ∪ {type_id}`, then populate `data`.
    AddComponent {
        entity: EntityId,
        type_id: ComponentTypeId,
        data: Value,
    },
    /// Move to `current \ {type_id}`.
    RemoveComponent {
        entity: EntityId,
        type_id: ComponentTypeId,
    },
    /// In-place column writes plus dirty marks; never changes archetype.
    SetComponentData {
        entity: EntityId,
        type_id: ComponentTypeId,
        fields: Value,
    },
}

/// One recorded edit. `index` is the record order within the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub index: u32,
}

// ---------------------------------------------------------------------------
// FlushReport
// ---------------------------------------------------------------------------

/// Outcome of one flush.
///
/// `created` maps each `Create`/`CreateBatch` command index to the entities
/// it produced. `errors` carries recoverable per-command failures; commands
/// against dead entities are dropped silently and only counted in
/// `failed_count`.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub created: Vec<(u32, Vec<EntityId>)>,
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<(u32, EcsError)>,
}

impl FlushReport {
    /// Entities created by the command recorded at `index`.
    pub fn created_by(&self, index: u32) -> &[EntityId] {
        self.created
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, e)| e.as_slice())
            .unwrap_or(&[])
    }
}

fn is_fatal(error: &EcsError) -> bool {
    matches!(error, EcsError::OutOfSpace { .. })
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Collects edits during a tick and applies them in one deterministic flush.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: CommandKind) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command { kind, index });
        index
    }

    /// Queue an entity creation. Returns the command index, which maps to
    /// the created entity through [`FlushReport::created_by`].
    pub fn create_entity(&mut self, components: Vec<(ComponentTypeId, Value)>) -> u32 {
        self.push(CommandKind::Create { components })
    }

    /// Queue a bulk creation of `count` identical entities.
    pub fn create_entities(
        &mut self,
        components: Vec<(ComponentTypeId, Value)>,
        count: u32,
    ) -> u32 {
        self.push(CommandKind::CreateBatch { components, count })
    }

    pub fn destroy_entity(&mut self, entity: EntityId) -> u32 {
        self.push(CommandKind::Destroy { entity })
    }

    /// Queue destruction of every entity a query currently matches. The row
    /// set is snapshotted here, not at flush time.
    pub fn destroy_entities_in_query(&mut self, world: &World, query: QueryId) -> u32 {
        let entities = world.query_entities(query);
        self.push(CommandKind::DestroyMatched { entities })
    }

    pub fn add_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        data: Value,
    ) -> u32 {
        self.push(CommandKind::AddComponent {
            entity,
            type_id,
            data,
        })
    }

    pub fn remove_component(&mut self, entity: EntityId, type_id: ComponentTypeId) -> u32 {
        self.push(CommandKind::RemoveComponent { entity, type_id })
    }

    pub fn set_component_data(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        fields: Value,
    ) -> u32 {
        self.push(CommandKind::SetComponentData {
            entity,
            type_id,
            fields,
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop all recorded commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    /// Apply every recorded command and advance the tick.
    ///
    /// Returns `Err` only for fatal allocator exhaustion; everything else is
    /// reported per command in the [`FlushReport`]. The buffer is cleared
    /// either way.
    pub fn flush(&mut self, world: &mut World) -> Result<FlushReport, EcsError> {
        let commands = std::mem::take(&mut self.commands);
        self.next_index = 0;
        let boundary_tick = world.current_tick() + 1;
        let mut report = FlushReport::default();

        // -- phase 1: data writes ------------------------------------------
        for cmd in &commands {
            let CommandKind::SetComponentData {
                entity,
                type_id,
                fields,
            } = &cmd.kind
            else {
                continue;
            };
            match world.apply_component_data(*entity, *type_id, fields, boundary_tick) {
                Ok(()) => report.success_count += 1,
                Err(e) if is_fatal(&e) => return Err(e),
                Err(EcsError::DeadEntity { entity }) => {
                    debug!(%entity, index = cmd.index, "data write for dead entity dropped");
                    report.failed_count += 1;
                }
                Err(e) => {
                    warn!(index = cmd.index, error = %e, "data write dropped");
                    report.failed_count += 1;
                    report.errors.push((cmd.index, e));
                }
            }
        }

        // -- phase 2: net moves, batched by (from, to) ---------------------
        #[derive(Default)]
        struct Edit {
            adds: Vec<(ComponentTypeId, Value)>,
            removes: Vec<ComponentTypeId>,
            indices: Vec<u32>,
        }
        let mut edit_order: Vec<EntityId> = Vec::new();
        let mut edits: HashMap<EntityId, Edit> = HashMap::new();
        for cmd in &commands {
            match &cmd.kind {
                CommandKind::AddComponent {
                    entity,
                    type_id,
                    data,
                } => {
                    let edit = edits.entry(*entity).or_insert_with(|| {
                        edit_order.push(*entity);
                        Edit::default()
                    });
                    edit.removes.retain(|t| t != type_id);
                    edit.adds.retain(|(t, _)| t != type_id);
                    edit.adds.push((*type_id, data.clone()));
                    edit.indices.push(cmd.index);
                }
                CommandKind::RemoveComponent { entity, type_id } => {
                    let edit = edits.entry(*entity).or_insert_with(|| {
                        edit_order.push(*entity);
                        Edit::default()
                    });
                    edit.adds.retain(|(t, _)| t != type_id);
                    if !edit.removes.contains(type_id) {
                        edit.removes.push(*type_id);
                    }
                    edit.indices.push(cmd.index);
                }
                _ => {}
            }
        }

        type MoveGroup = Vec<(EntityId, Vec<(ComponentTypeId, Value)>)>;
        let mut group_order: Vec<(crate::archetype::ArchetypeId, crate::archetype::ArchetypeId)> =
            Vec::new();
        let mut groups: HashMap<
            (crate::archetype::ArchetypeId, crate::archetype::ArchetypeId),
            MoveGroup,
        > = HashMap::new();

        for entity in edit_order {
            let mut edit = edits.remove(&entity).expect("recorded above");
            let Some(from_types) = world.entity_types(entity).map(<[_]>::to_vec) else {
                debug!(%entity, "structural edit for dead entity dropped");
                report.failed_count += edit.indices.len();
                continue;
            };

            // Unknown kinds drop their own command, not the whole edit.
            edit.adds.retain(|(type_id, _)| {
                if world.registry().info(*type_id).is_some() {
                    true
                } else {
                    report.failed_count += 1;
                    report.errors.push((
                        edit.indices.first().copied().unwrap_or(0),
                        EcsError::UnknownComponent {
                            name: format!("#{}", type_id.index()),
                        },
                    ));
                    false
                }
            });
            edit.removes.retain(|type_id| {
                if world.registry().info(*type_id).is_some() {
                    true
                } else {
                    report.failed_count += 1;
                    report.errors.push((
                        edit.indices.first().copied().unwrap_or(0),
                        EcsError::UnknownComponent {
                            name: format!("#{}", type_id.index()),
                        },
                    ));
                    false
                }
            });

            let mut to_types = from_types.clone();
            for (type_id, _) in &edit.adds {
                if !to_types.contains(type_id) {
                    to_types.push(*type_id);
                }
            }
            to_types.retain(|t| !edit.removes.contains(t));
            to_types.sort_unstable();

            if to_types == from_types {
                // Pure data effect: adds of already-present kinds.
                for (type_id, data) in &edit.adds {
                    match world.apply_component_data(entity, *type_id, data, boundary_tick) {
                        Ok(()) => {}
                        Err(e) if is_fatal(&e) => return Err(e),
                        Err(e) => {
                            warn!(%entity, error = %e, "add-in-place data dropped");
                        }
                    }
                }
                report.success_count += edit.indices.len();
                continue;
            }

            let from = world.location(entity).expect("entity checked alive").archetype;
            let to = match world.get_or_create_archetype(&to_types) {
                Ok(id) => id,
                Err(e) => {
                    report.failed_count += edit.indices.len();
                    report
                        .errors
                        .push((edit.indices.first().copied().unwrap_or(0), e));
                    continue;
                }
            };
            let key = (from, to);
            if !groups.contains_key(&key) {
                group_order.push(key);
            }
            groups.entry(key).or_default().push((entity, edit.adds));
            report.success_count += edit.indices.len();
        }

        for key in group_order {
            let moves = groups.remove(&key).expect("grouped above");
            world.move_batch(key.0, key.1, &moves, boundary_tick)?;
        }

        // -- phase 3: creations grouped by target archetype ----------------
        let mut create_order: Vec<crate::archetype::ArchetypeId> = Vec::new();
        let mut creates: HashMap<crate::archetype::ArchetypeId, Vec<&Command>> = HashMap::new();
        for cmd in &commands {
            let components = match &cmd.kind {
                CommandKind::Create { components } => components,
                CommandKind::CreateBatch { components, .. } => components,
                _ => continue,
            };
            let mut type_ids: Vec<ComponentTypeId> =
                components.iter().map(|(t, _)| *t).collect();
            type_ids.sort_unstable();
            type_ids.dedup();
            match world.get_or_create_archetype(&type_ids) {
                Ok(arch) => {
                    if !creates.contains_key(&arch) {
                        create_order.push(arch);
                    }
                    creates.entry(arch).or_default().push(cmd);
                }
                Err(e) => {
                    warn!(index = cmd.index, error = %e, "creation dropped");
                    report.failed_count += 1;
                    report.errors.push((cmd.index, e));
                }
            }
        }
        for arch in create_order {
            for cmd in creates.remove(&arch).expect("grouped above") {
                let created = match &cmd.kind {
                    CommandKind::Create { components } => world
                        .spawn_with_tick(components, boundary_tick)
                        .map(|e| vec![e]),
                    CommandKind::CreateBatch { components, count } => {
                        world.create_batch(components, *count as usize, boundary_tick)
                    }
                    _ => unreachable!("only creations are grouped"),
                };
                match created {
                    Ok(entities) => {
                        report.success_count += 1;
                        report.created.push((cmd.index, entities));
                    }
                    Err(e) if is_fatal(&e) => return Err(e),
                    Err(e) => {
                        report.failed_count += 1;
                        report.errors.push((cmd.index, e));
                    }
                }
            }
        }

        // -- phase 4: destroys, grouped by archetype, high rows first ------
        let mut doomed: Vec<EntityId> = Vec::new();
        for cmd in &commands {
            match &cmd.kind {
                CommandKind::Destroy { entity } => doomed.push(*entity),
                CommandKind::DestroyMatched { entities } => doomed.extend_from_slice(entities),
                _ => {}
            }
        }
        // Liveness is re-checked per entity at destroy time, so rows that
        // moved (or died) earlier in this flush are handled correctly.
        doomed.sort_unstable_by(|a, b| {
            let la = world.location(*a).map(|l| (l.archetype, l.chunk, l.row));
            let lb = world.location(*b).map(|l| (l.archetype, l.chunk, l.row));
            lb.cmp(&la)
        });
        for entity in doomed {
            if world.despawn(entity) {
                report.success_count += 1;
            } else {
                // Idempotent destroy: dead targets are not errors.
                report.failed_count += 1;
            }
        }

        // -- phase 5: the boundary -----------------------------------------
        let advanced = world.advance_tick();
        debug_assert_eq!(advanced, boundary_tick);
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{FieldKind, Schema};
    use crate::query::QuerySpec;
    use serde_json::json;

    fn setup() -> (World, ComponentTypeId, ComponentTypeId) {
        let mut world = World::new();
        let value = world
            .register_component("value", Schema::new().field("v", FieldKind::U32))
            .unwrap();
        let tag = world.register_tag("flag").unwrap();
        (world, value, tag)
    }

    // -- 1. Recording ------------------------------------------------------

    #[test]
    fn records_in_order_with_indices() {
        let (world, value, tag) = setup();
        drop(world);
        let entity = EntityId::new(0, 0);

        let mut buf = CommandBuffer::new();
        let i0 = buf.create_entity(vec![(value, json!({"v": 1}))]);
        let i1 = buf.add_component(entity, tag, Value::Null);
        let i2 = buf.destroy_entity(entity);
        assert_eq!((i0, i1, i2), (0, 1, 2));
        assert_eq!(buf.len(), 3);
        assert!(matches!(buf.commands()[0].kind, CommandKind::Create { .. }));
        assert!(matches!(buf.commands()[2].kind, CommandKind::Destroy { .. }));
    }

    // -- 2. Creation -------------------------------------------------------

    #[test]
    fn create_entity_via_flush() {
        let (mut world, value, _) = setup();
        let mut buf = CommandBuffer::new();
        let index = buf.create_entity(vec![(value, json!({"v": 7}))]);

        let report = buf.flush(&mut world).unwrap();
        assert!(buf.is_empty());
        let created = report.created_by(index);
        assert_eq!(created.len(), 1);
        assert!(world.is_alive(created[0]));
        assert_eq!(world.field_value(created[0], value, "v"), Some(json!(7)));
    }

    #[test]
    fn create_entities_bulk() {
        let (mut world, value, _) = setup();
        let mut buf = CommandBuffer::new();
        let index = buf.create_entities(vec![(value, json!({"v": 3}))], 200);

        let report = buf.flush(&mut world).unwrap();
        let created = report.created_by(index).to_vec();
        assert_eq!(created.len(), 200);
        assert_eq!(world.entity_count(), 200);
        for e in [created[0], created[150]] {
            assert_eq!(world.field_value(e, value, "v"), Some(json!(3)));
        }
    }

    // -- 3. Archetype transition by add ------------------------------------

    #[test]
    fn add_component_moves_archetype_and_keeps_data() {
        let (mut world, value, tag) = setup();
        let e = world.spawn(&[(value, json!({"v": 7}))]).unwrap();
        assert_eq!(world.entity_types(e).unwrap(), &[value]);

        let mut buf = CommandBuffer::new();
        buf.add_component(e, tag, Value::Null);
        buf.flush(&mut world).unwrap();

        assert_eq!(world.entity_types(e).unwrap(), &[value, tag]);
        assert_eq!(world.field_value(e, value, "v"), Some(json!(7)));
    }

    // -- 4. Add + remove in one tick collapse ------------------------------

    #[test]
    fn add_then_remove_is_net_noop() {
        let (mut world, value, tag) = setup();
        let e = world.spawn(&[(value, json!({"v": 1}))]).unwrap();
        let loc_before = world.location(e).unwrap();
        let archetypes_before = world.archetype_count();

        let mut buf = CommandBuffer::new();
        buf.add_component(e, tag, Value::Null);
        buf.remove_component(e, tag);
        buf.flush(&mut world).unwrap();

        // Net move collapsed to nothing: same archetype, same row, and the
        // {value, flag} archetype was never created.
        assert_eq!(world.location(e).unwrap(), loc_before);
        assert_eq!(world.archetype_count(), archetypes_before);
    }

    #[test]
    fn remove_then_add_ends_with_component() {
        let (mut world, value, tag) = setup();
        let e = world
            .spawn(&[(value, json!({"v": 1})), (tag, Value::Null)])
            .unwrap();

        let mut buf = CommandBuffer::new();
        buf.remove_component(e, tag);
        buf.add_component(e, tag, Value::Null);
        buf.flush(&mut world).unwrap();

        assert!(world.entity_types(e).unwrap().contains(&tag));
    }

    // -- 5. Data writes land before structure ------------------------------

    #[test]
    fn set_data_then_destroy_same_tick() {
        let (mut world, value, _) = setup();
        let e = world.spawn(&[(value, json!({"v": 0}))]).unwrap();

        let mut buf = CommandBuffer::new();
        buf.set_component_data(e, value, json!({"v": 5}));
        buf.destroy_entity(e);
        let report = buf.flush(&mut world).unwrap();

        assert!(!world.is_alive(e));
        assert_eq!(report.success_count, 2);
    }

    // -- 6. Destroy idempotence --------------------------------------------

    #[test]
    fn double_destroy_is_one_destroy() {
        let (mut world, value, _) = setup();
        let e = world.spawn(&[(value, json!({"v": 0}))]).unwrap();

        let mut buf = CommandBuffer::new();
        buf.destroy_entity(e);
        buf.destroy_entity(e);
        let report = buf.flush(&mut world).unwrap();

        assert!(!world.is_alive(e));
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failed_count, 1);
        assert!(report.errors.is_empty(), "dead targets are silent");
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn commands_on_stale_entity_drop_silently() {
        let (mut world, value, tag) = setup();
        let e = world.spawn(&[(value, json!({"v": 0}))]).unwrap();
        world.despawn(e);

        let mut buf = CommandBuffer::new();
        buf.set_component_data(e, value, json!({"v": 1}));
        buf.add_component(e, tag, Value::Null);
        let report = buf.flush(&mut world).unwrap();

        assert_eq!(report.success_count, 0);
        assert_eq!(report.failed_count, 2);
        assert!(report.errors.is_empty());
    }

    // -- 7. Query-scoped destruction snapshots at record time --------------

    #[test]
    fn destroy_in_query_uses_recorded_snapshot() {
        let (mut world, value, _) = setup();
        for i in 0..3 {
            world.spawn(&[(value, json!({"v": i}))]).unwrap();
        }
        let q = world.create_query(QuerySpec::new().with(value));

        let mut buf = CommandBuffer::new();
        buf.destroy_entities_in_query(&world, q);
        // Spawned after the snapshot: survives the flush.
        let late = world.spawn(&[(value, json!({"v": 99}))]).unwrap();
        buf.flush(&mut world).unwrap();

        assert_eq!(world.entity_count(), 1);
        assert!(world.is_alive(late));
    }

    // -- 8. Dense removal (swap-and-pop through the buffer) ----------------

    #[test]
    fn destroy_middle_entity_keeps_chunk_dense() {
        let (mut world, value, _) = setup();
        let e1 = world.spawn(&[(value, json!({"v": 1}))]).unwrap();
        let e2 = world.spawn(&[(value, json!({"v": 2}))]).unwrap();
        let e3 = world.spawn(&[(value, json!({"v": 3}))]).unwrap();

        let mut buf = CommandBuffer::new();
        buf.destroy_entity(e2);
        buf.flush(&mut world).unwrap();

        let loc1 = world.location(e1).unwrap();
        let loc3 = world.location(e3).unwrap();
        assert_eq!(loc1.row, 0);
        assert_eq!(loc3.row, 1, "last row swapped into the vacated slot");
        assert_eq!(world.field_value(e3, value, "v"), Some(json!(3)));
    }

    // -- 9. Unknown component surfaces an error ----------------------------

    #[test]
    fn unknown_component_is_reported() {
        let (mut world, value, _) = setup();
        let e = world.spawn(&[(value, json!({"v": 0}))]).unwrap();

        let mut buf = CommandBuffer::new();
        buf.set_component_data(e, ComponentTypeId(4242), json!({"v": 1}));
        let report = buf.flush(&mut world).unwrap();

        assert_eq!(report.failed_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0].1,
            EcsError::UnknownComponent { .. }
        ));
    }

    // -- 10. The flush owns the tick boundary ------------------------------

    #[test]
    fn flush_advances_tick_once() {
        let (mut world, value, _) = setup();
        let before = world.current_tick();
        let mut buf = CommandBuffer::new();
        buf.create_entity(vec![(value, json!({"v": 0}))]);
        buf.flush(&mut world).unwrap();
        assert_eq!(world.current_tick(), before + 1);

        // An empty flush is still a boundary.
        buf.flush(&mut world).unwrap();
        assert_eq!(world.current_tick(), before + 2);
    }

    // -- 11. Buffered writes become visible on the next tick ---------------

    #[test]
    fn buffered_write_marks_next_tick() {
        let (mut world, value, _) = setup();
        let e = world.spawn(&[(value, json!({"v": 0}))]).unwrap();
        let q = world.create_query(QuerySpec::new().react(value));

        let write_tick = world.current_tick();
        let mut buf = CommandBuffer::new();
        buf.set_component_data(e, value, json!({"v": 1}));
        buf.flush(&mut world).unwrap();

        // A system whose last run was the write tick sees exactly this row.
        let chunks = world.read_chunks(q, write_tick);
        let changed: Vec<bool> = (0..chunks[0].count())
            .map(|row| chunks[0].has_changed(row))
            .collect();
        assert_eq!(changed, vec![true]);

        // One boundary later, with the system now caught up, nothing changed.
        let caught_up = world.current_tick();
        let mut buf = CommandBuffer::new();
        buf.flush(&mut world).unwrap();
        let chunks = world.read_chunks(q, caught_up);
        assert!(!chunks[0].has_changed(0));
    }

    // -- 12. Net moves of several entities batch by (from, to) -------------

    #[test]
    fn batched_moves_preserve_all_rows() {
        let (mut world, value, tag) = setup();
        let entities: Vec<EntityId> = (0..50)
            .map(|i| world.spawn(&[(value, json!({"v": i}))]).unwrap())
            .collect();

        let mut buf = CommandBuffer::new();
        for e in &entities {
            buf.add_component(*e, tag, Value::Null);
        }
        buf.flush(&mut world).unwrap();

        for (i, e) in entities.iter().enumerate() {
            assert!(world.entity_types(*e).unwrap().contains(&tag));
            assert_eq!(world.field_value(*e, value, "v"), Some(json!(i)));
        }
    }
}
