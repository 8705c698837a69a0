//! The [`World`] is the top-level container for the runtime. It owns the
//! component registry, the string table, the shared-group registry, all
//! archetype storage, the entity directory, the live queries, and the tick
//! counter.
//!
//! Direct mutation methods ([`spawn`](World::spawn),
//! [`despawn`](World::despawn), [`add_component`](World::add_component), ...)
//! exist for setup and tests; during a frame, systems mutate structure only
//! through the command buffer, which drives the same internals with the tick
//! boundary's semantics.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::archetype::{Archetype, ArchetypeId, Chunk, CompColumns, Scalar};
use crate::component::{
    ComponentInfo, ComponentRegistry, ComponentTypeId, FieldPlan, PrimKind, Schema,
};
use crate::entity::{EntityDirectory, EntityId, EntityLocation};
use crate::intern::{StrRef, StringTable};
use crate::query::{ChunkRef, ChunkViewMut, QueryId, QuerySpec, QueryState};
use crate::rpn::{self, VarTable};
use crate::shared::{GroupId, SharedGroupRegistry, SharedPayload, SharedValue};
use crate::EcsError;

// ---------------------------------------------------------------------------
// JSON bridging helpers
// ---------------------------------------------------------------------------

fn json_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Some(Scalar::Int(v))
            } else if let Some(v) = n.as_u64() {
                Some(Scalar::Int(v as i64))
            } else {
                n.as_f64().map(Scalar::Float)
            }
        }
        Value::Bool(b) => Some(Scalar::Bool(*b)),
        _ => None,
    }
}

fn scalar_json(value: Scalar) -> Value {
    match value {
        Scalar::Int(v) => Value::from(v),
        Scalar::Float(v) => Value::from(v),
        Scalar::Bool(v) => Value::from(v),
    }
}

fn json_shared(prim: PrimKind, value: &Value) -> Option<SharedValue> {
    match prim {
        PrimKind::F32 | PrimKind::F64 => value.as_f64().map(SharedValue::Float),
        PrimKind::Bool => value.as_bool().map(SharedValue::Bool),
        _ => value.as_i64().map(SharedValue::Int),
    }
}

fn shared_json(value: SharedValue) -> Value {
    match value {
        SharedValue::Int(v) => Value::from(v),
        SharedValue::Float(v) => Value::from(v),
        SharedValue::Bool(v) => Value::from(v),
    }
}

/// Columns owned by formula fields carry stream offsets that must never be
/// bulk-copied between rows; span fills and moves skip them.
fn rpn_col_mask(info: &ComponentInfo) -> Vec<bool> {
    let mut mask = vec![false; info.columns.len()];
    for plan in &info.fields {
        if let FieldPlan::Rpn {
            first_col,
            instance_capacity,
            ..
        } = plan
        {
            for col in *first_col..first_col + instance_capacity * 2 {
                mask[col] = true;
            }
        }
    }
    mask
}

// ---------------------------------------------------------------------------
// Field write path
// ---------------------------------------------------------------------------

/// Store a formula span, rehosting the stream once when it is full.
///
/// The rehost walks every live `(offset, length)` pair of this field's
/// columns to repack the stream, then patches the offsets back in.
fn store_rpn_span(
    comp: &mut CompColumns,
    row_count: usize,
    first_col: usize,
    stream_idx: usize,
    instance_capacity: usize,
    words: &[u16],
) -> Result<u16, EcsError> {
    if let Some(offset) = comp.streams[stream_idx].store(words) {
        return Ok(offset);
    }

    let mut owners: Vec<(usize, usize)> = Vec::new();
    let mut spans: Vec<(u16, u16)> = Vec::new();
    for row in 0..row_count {
        for slot in 0..instance_capacity {
            let len = comp.columns[first_col + slot * 2 + 1].as_u16().unwrap()[row];
            if len > 0 {
                let offset = comp.columns[first_col + slot * 2].as_u16().unwrap()[row];
                owners.push((row, slot));
                spans.push((offset, len));
            }
        }
    }
    comp.streams[stream_idx].rehost(&mut spans, words.len() as u32)?;
    for (&(row, slot), &(offset, _)) in owners.iter().zip(&spans) {
        comp.columns[first_col + slot * 2].as_u16_mut().unwrap()[row] = offset;
    }

    comp.streams[stream_idx]
        .store(words)
        .ok_or_else(|| EcsError::OutOfSpace {
            what: "formula token stream".to_owned(),
        })
}

/// Translate one component's field map into column writes on `(chunk, row)`.
///
/// Per-field data errors are recoverable: the field is skipped and logged.
/// Only allocator exhaustion (after one rehost) is fatal. Marks the
/// component's dirty slot when anything was written.
#[allow(clippy::too_many_arguments)]
fn write_component_fields(
    info: &ComponentInfo,
    chunk: &mut Chunk,
    comp_idx: usize,
    row: usize,
    fields: &serde_json::Map<String, Value>,
    tick: u32,
    strings: &mut StringTable,
    shared: &mut SharedGroupRegistry,
    vars: &mut VarTable,
) -> Result<(), EcsError> {
    let mut wrote = false;
    let mut shared_writes: Vec<(&str, PrimKind, &Value)> = Vec::new();

    for (name, value) in fields {
        let Some(plan) = info.field(name) else {
            warn!(component = %info.name, field = %name, "unknown field skipped");
            continue;
        };
        match plan {
            FieldPlan::Scalar { col, .. } => {
                let ok = json_scalar(value)
                    .map(|s| chunk.comps[comp_idx].columns[*col].set(row, s))
                    .unwrap_or(false);
                if ok {
                    wrote = true;
                } else {
                    warn!(component = %info.name, field = %name, %value, "value kind mismatch, field skipped");
                }
            }
            FieldPlan::Str { col } => match value.as_str() {
                Some(s) => {
                    let r = strings.intern(s);
                    chunk.comps[comp_idx].columns[*col].as_u32_mut().unwrap()[row] = r.0;
                    wrote = true;
                }
                None => {
                    warn!(component = %info.name, field = %name, %value, "expected string, field skipped");
                }
            },
            FieldPlan::Enum {
                col,
                labels,
                index_of,
            } => {
                let index = match value {
                    Value::String(label) => index_of.get(label).copied(),
                    Value::Number(n) => n
                        .as_u64()
                        .filter(|&v| (v as usize) < labels.len())
                        .map(|v| v as u32),
                    _ => None,
                };
                match index {
                    Some(i) => {
                        chunk.comps[comp_idx].columns[*col].set(row, Scalar::Int(i as i64));
                        wrote = true;
                    }
                    None => {
                        warn!(component = %info.name, field = %name, %value, "unknown enum label, field skipped");
                    }
                }
            }
            FieldPlan::Bitmask { col, flags } => {
                let mask = match value {
                    Value::Array(items) => {
                        let mut mask = 0u32;
                        let mut ok = true;
                        for item in items {
                            match item.as_str().and_then(|s| flags.iter().position(|f| f == s)) {
                                Some(bit) => mask |= 1 << bit,
                                None => {
                                    ok = false;
                                    break;
                                }
                            }
                        }
                        ok.then_some(mask)
                    }
                    Value::Number(n) => n
                        .as_u64()
                        .map(|v| (v as u32) & (u32::MAX >> (32 - flags.len()))),
                    _ => None,
                };
                match mask {
                    Some(m) => {
                        chunk.comps[comp_idx].columns[*col].set(row, Scalar::Int(m as i64));
                        wrote = true;
                    }
                    None => {
                        warn!(component = %info.name, field = %name, %value, "bad bitmask value, field skipped");
                    }
                }
            }
            FieldPlan::FlatArray {
                first_col,
                len_col,
                capacity,
                ..
            } => {
                let Some(items) = value.as_array() else {
                    warn!(component = %info.name, field = %name, %value, "expected array, field skipped");
                    continue;
                };
                if items.len() > *capacity {
                    warn!(
                        component = %info.name, field = %name,
                        len = items.len(), capacity = *capacity,
                        "array exceeds capacity, field skipped"
                    );
                    continue;
                }
                let Some(scalars) = items
                    .iter()
                    .map(json_scalar)
                    .collect::<Option<Vec<Scalar>>>()
                else {
                    warn!(component = %info.name, field = %name, "non-scalar element, field skipped");
                    continue;
                };
                for (i, s) in scalars.iter().enumerate() {
                    chunk.comps[comp_idx].columns[first_col + i].set(row, *s);
                }
                for i in scalars.len()..*capacity {
                    chunk.comps[comp_idx].columns[first_col + i].zero_row(row);
                }
                chunk.comps[comp_idx].columns[*len_col]
                    .set(row, Scalar::Int(scalars.len() as i64));
                wrote = true;
            }
            FieldPlan::Rpn {
                first_col,
                stream,
                instance_capacity,
            } => {
                let sources: Vec<&str> = match value {
                    Value::String(s) => vec![s.as_str()],
                    Value::Array(items) => {
                        match items.iter().map(|v| v.as_str()).collect::<Option<Vec<_>>>() {
                            Some(list) => list,
                            None => {
                                warn!(component = %info.name, field = %name, "non-string formula, field skipped");
                                continue;
                            }
                        }
                    }
                    _ => {
                        warn!(component = %info.name, field = %name, %value, "expected formula list, field skipped");
                        continue;
                    }
                };
                if sources.len() > *instance_capacity {
                    warn!(
                        component = %info.name, field = %name,
                        len = sources.len(), capacity = *instance_capacity,
                        "too many formulas, field skipped"
                    );
                    continue;
                }
                let compiled: Result<Vec<Vec<u16>>, EcsError> =
                    sources.iter().map(|src| rpn::compile(src, vars)).collect();
                let compiled = match compiled {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(component = %info.name, field = %name, error = %e, "formula rejected, field skipped");
                        continue;
                    }
                };
                // Release every old span, then store the new set.
                let row_count = chunk.count;
                let comp = &mut chunk.comps[comp_idx];
                for slot in 0..*instance_capacity {
                    let len = comp.columns[first_col + slot * 2 + 1].as_u16().unwrap()[row];
                    if len > 0 {
                        let offset = comp.columns[first_col + slot * 2].as_u16().unwrap()[row];
                        comp.streams[*stream].release(offset, len);
                    }
                    comp.columns[first_col + slot * 2].as_u16_mut().unwrap()[row] = 0;
                    comp.columns[first_col + slot * 2 + 1].as_u16_mut().unwrap()[row] = 0;
                }
                for (slot, words) in compiled.iter().enumerate() {
                    let offset = store_rpn_span(
                        &mut chunk.comps[comp_idx],
                        row_count,
                        *first_col,
                        *stream,
                        *instance_capacity,
                        words,
                    )?;
                    let comp = &mut chunk.comps[comp_idx];
                    comp.columns[first_col + slot * 2].as_u16_mut().unwrap()[row] = offset;
                    comp.columns[first_col + slot * 2 + 1].as_u16_mut().unwrap()[row] =
                        words.len() as u16;
                }
                wrote = true;
            }
            FieldPlan::Shared { prim } => {
                shared_writes.push((name.as_str(), *prim, value));
            }
        }
    }

    if !shared_writes.is_empty() {
        let group_col = info
            .group_col
            .expect("shared field implies a group column");
        let current = chunk.comps[comp_idx].columns[group_col].as_u32().unwrap()[row];
        let mut record = shared
            .resolve(GroupId(current))
            .and_then(|p| p.records.get(&info.id))
            .cloned()
            .unwrap_or_default();
        let mut any = false;
        for (name, prim, value) in shared_writes {
            match json_shared(prim, value) {
                Some(v) => {
                    record.insert(name.to_owned(), v);
                    any = true;
                }
                None => {
                    warn!(component = %info.name, field = %name, %value, "bad shared value, field skipped");
                }
            }
        }
        if any {
            let mut payload = SharedPayload::new();
            payload.records.insert(info.id, record);
            let gid = shared.group_id(&payload);
            chunk.comps[comp_idx].columns[group_col].as_u32_mut().unwrap()[row] = gid.0;
            wrote = true;
        }
    }

    if wrote {
        chunk.mark(comp_idx, row, tick);
    }
    Ok(())
}

fn two_archetypes(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    let (ai, bi) = (a.index(), b.index());
    assert_ne!(ai, bi);
    if ai < bi {
        let (lo, hi) = archetypes.split_at_mut(bi);
        (&mut lo[ai], &mut hi[0])
    } else {
        let (lo, hi) = archetypes.split_at_mut(ai);
        (&mut hi[0], &mut lo[bi])
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level runtime container.
pub struct World {
    registry: ComponentRegistry,
    strings: StringTable,
    shared: SharedGroupRegistry,
    vars: VarTable,
    pub(crate) archetypes: Vec<Archetype>,
    /// Sorted component set -> archetype.
    archetype_index: HashMap<Vec<ComponentTypeId>, ArchetypeId>,
    directory: EntityDirectory,
    queries: Vec<QueryState>,
    /// Starts at 1 so zero-initialised dirty arrays read as "never modified".
    current_tick: u32,
}

impl World {
    pub fn new() -> Self {
        Self {
            registry: ComponentRegistry::new(),
            strings: StringTable::new(),
            shared: SharedGroupRegistry::new(),
            vars: VarTable::new(),
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            directory: EntityDirectory::new(),
            queries: Vec::new(),
            current_tick: 1,
        }
    }

    // -- registration -------------------------------------------------------

    pub fn register_component(
        &mut self,
        name: &str,
        schema: Schema,
    ) -> Result<ComponentTypeId, EcsError> {
        self.registry.register(name, schema)
    }

    pub fn register_tag(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.registry.register_tag(name)
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- strings / shared groups --------------------------------------------

    pub fn intern(&mut self, s: &str) -> StrRef {
        self.strings.intern(s)
    }

    pub fn resolve_str(&self, r: StrRef) -> Option<&str> {
        self.strings.resolve(r)
    }

    pub fn shared_group(&mut self, payload: &SharedPayload) -> GroupId {
        self.shared.group_id(payload)
    }

    pub fn resolve_group(&self, id: GroupId) -> Option<&SharedPayload> {
        self.shared.resolve(id)
    }

    // -- ticks --------------------------------------------------------------

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    /// Advance the tick boundary. Owned by the command-buffer flush.
    pub(crate) fn advance_tick(&mut self) -> u32 {
        self.current_tick += 1;
        self.current_tick
    }

    // -- archetype management -----------------------------------------------

    fn comp_name(&self, type_id: ComponentTypeId) -> String {
        self.registry
            .info(type_id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| format!("#{}", type_id.0))
    }

    /// Find or create the archetype for a sorted, deduplicated component set.
    /// Creation notifies every live query.
    pub(crate) fn get_or_create_archetype(
        &mut self,
        type_ids: &[ComponentTypeId],
    ) -> Result<ArchetypeId, EcsError> {
        debug_assert!(type_ids.windows(2).all(|w| w[0] < w[1]));
        if let Some(&id) = self.archetype_index.get(type_ids) {
            return Ok(id);
        }
        let mut infos = Vec::with_capacity(type_ids.len());
        for tid in type_ids {
            let info = self
                .registry
                .info(*tid)
                .ok_or_else(|| EcsError::UnknownComponent {
                    name: self.comp_name(*tid),
                })?;
            infos.push(info.clone());
        }
        let id = ArchetypeId(self.archetypes.len() as u32);
        debug!(archetype = id.0, types = ?type_ids, "archetype created");
        self.archetypes.push(Archetype::new(id, infos));
        self.archetype_index.insert(type_ids.to_vec(), id);

        let archetype = &self.archetypes[id.index()];
        for query in &mut self.queries {
            query.notify_new_archetype(archetype);
        }
        Ok(id)
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // -- entity lifecycle (direct; the command buffer defers to these) ------

    /// Spawn an entity immediately. `components` pairs each kind with a JSON
    /// object of field values (`Value::Null` for tags).
    pub fn spawn(&mut self, components: &[(ComponentTypeId, Value)]) -> Result<EntityId, EcsError> {
        let tick = self.current_tick;
        self.spawn_with_tick(components, tick)
    }

    pub(crate) fn spawn_with_tick(
        &mut self,
        components: &[(ComponentTypeId, Value)],
        tick: u32,
    ) -> Result<EntityId, EcsError> {
        let mut type_ids: Vec<ComponentTypeId> = components.iter().map(|(t, _)| *t).collect();
        type_ids.sort_unstable();
        type_ids.dedup();
        let arch_id = self.get_or_create_archetype(&type_ids)?;

        let entity = self.directory.allocate();
        let (chunk, row) = self.archetypes[arch_id.index()].allocate_row(entity);
        self.directory.set_location(
            entity,
            EntityLocation {
                archetype: arch_id,
                chunk,
                row,
            },
        );
        for (type_id, value) in components {
            self.apply_component_data(entity, *type_id, value, tick)?;
        }
        Ok(entity)
    }

    /// Spawn `n` entities with identical component data: one archetype
    /// resolution, one span fill per column per run of rows.
    pub(crate) fn create_batch(
        &mut self,
        components: &[(ComponentTypeId, Value)],
        n: usize,
        tick: u32,
    ) -> Result<Vec<EntityId>, EcsError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut type_ids: Vec<ComponentTypeId> = components.iter().map(|(t, _)| *t).collect();
        type_ids.sort_unstable();
        type_ids.dedup();
        let arch_id = self.get_or_create_archetype(&type_ids)?;

        let entities: Vec<EntityId> = (0..n).map(|_| self.directory.allocate()).collect();
        let runs = self.archetypes[arch_id.index()].allocate_rows(n);

        // Back-map and directory entries.
        let mut cursor = 0usize;
        for &(chunk, start, len) in &runs {
            for k in 0..len {
                let entity = entities[cursor];
                cursor += 1;
                self.archetypes[arch_id.index()].chunks[chunk as usize].entities
                    [(start + k) as usize] = entity;
                self.directory.set_location(
                    entity,
                    EntityLocation {
                        archetype: arch_id,
                        chunk,
                        row: start + k,
                    },
                );
            }
        }

        let World {
            archetypes,
            strings,
            shared,
            vars,
            ..
        } = self;
        let (comps, chunks) = archetypes[arch_id.index()].comps_and_chunks_mut();

        for &(chunk_idx, start, len) in &runs {
            let chunk = &mut chunks[chunk_idx as usize];
            let start = start as usize;
            let len = len as usize;

            // Populate the run's first row, then replicate.
            for (type_id, value) in components {
                if let Value::Object(map) = value {
                    let comp_idx = comps
                        .binary_search_by_key(type_id, |i| i.id)
                        .expect("component set defines the archetype");
                    write_component_fields(
                        &comps[comp_idx],
                        chunk,
                        comp_idx,
                        start,
                        map,
                        tick,
                        strings,
                        shared,
                        vars,
                    )?;
                }
            }

            if len > 1 {
                for (comp_idx, info) in comps.iter().enumerate() {
                    let mask = rpn_col_mask(info);
                    for (col_idx, skip) in mask.iter().enumerate() {
                        if !skip {
                            chunk.comps[comp_idx].columns[col_idx]
                                .fill_from_row(start, start + 1, len - 1);
                        }
                    }
                    // Formula spans are per-row allocations; replicate by
                    // re-storing the first row's tokens for every other row.
                    for plan in &info.fields {
                        let FieldPlan::Rpn {
                            first_col,
                            stream,
                            instance_capacity,
                        } = plan
                        else {
                            continue;
                        };
                        for slot in 0..*instance_capacity {
                            let span_len = chunk.comps[comp_idx].columns
                                [first_col + slot * 2 + 1]
                                .as_u16()
                                .unwrap()[start];
                            if span_len == 0 {
                                continue;
                            }
                            let offset = chunk.comps[comp_idx].columns[first_col + slot * 2]
                                .as_u16()
                                .unwrap()[start];
                            let words: Vec<u16> = chunk.comps[comp_idx].streams[*stream]
                                .span(offset, span_len)
                                .to_vec();
                            let row_count = chunk.count;
                            for extra in 1..len {
                                let row = start + extra;
                                let new_offset = store_rpn_span(
                                    &mut chunk.comps[comp_idx],
                                    row_count,
                                    *first_col,
                                    *stream,
                                    *instance_capacity,
                                    &words,
                                )?;
                                let comp = &mut chunk.comps[comp_idx];
                                comp.columns[first_col + slot * 2].as_u16_mut().unwrap()[row] =
                                    new_offset;
                                comp.columns[first_col + slot * 2 + 1].as_u16_mut().unwrap()
                                    [row] = span_len;
                            }
                        }
                    }
                }
            }

            // Fresh rows count as changed.
            for comp in &mut chunk.comps {
                if let Some(dirty) = comp.dirty.as_deref_mut() {
                    dirty[start..start + len].fill(tick);
                }
            }
        }
        Ok(entities)
    }

    /// Destroy an entity. Idempotent: dead or stale handles return `false`.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let Some(loc) = self.directory.location(entity) else {
            return false;
        };
        let swapped = self.archetypes[loc.archetype.index()].destroy_row(loc.chunk, loc.row);
        if let Some(moved) = swapped {
            self.directory.set_location(moved, loc);
        }
        self.directory.deallocate(entity);
        true
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.directory.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.directory.alive_count()
    }

    pub fn location(&self, entity: EntityId) -> Option<EntityLocation> {
        self.directory.location(entity)
    }

    /// The sorted component set of the entity's archetype.
    pub fn entity_types(&self, entity: EntityId) -> Option<&[ComponentTypeId]> {
        let loc = self.directory.location(entity)?;
        Some(self.archetypes[loc.archetype.index()].types())
    }

    // -- component data -----------------------------------------------------

    /// In-place column writes on an existing component, marking dirty at the
    /// current tick.
    pub fn set_component_data(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        fields: &Value,
    ) -> Result<(), EcsError> {
        let tick = self.current_tick;
        self.apply_component_data(entity, type_id, fields, tick)
    }

    pub(crate) fn apply_component_data(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        value: &Value,
        tick: u32,
    ) -> Result<(), EcsError> {
        let loc = self
            .directory
            .location(entity)
            .ok_or(EcsError::DeadEntity { entity })?;
        let name = self.comp_name(type_id);
        let World {
            archetypes,
            strings,
            shared,
            vars,
            ..
        } = self;
        let arch = &mut archetypes[loc.archetype.index()];
        let comp_idx = arch
            .comp_index(type_id)
            .ok_or(EcsError::UnknownComponent { name })?;
        let (comps, chunks) = arch.comps_and_chunks_mut();
        let chunk = &mut chunks[loc.chunk as usize];
        match value {
            Value::Object(map) => write_component_fields(
                &comps[comp_idx],
                chunk,
                comp_idx,
                loc.row as usize,
                map,
                tick,
                strings,
                shared,
                vars,
            ),
            Value::Null => Ok(()),
            other => {
                warn!(component = %comps[comp_idx].name, value = %other, "expected field object, data ignored");
                Ok(())
            }
        }
    }

    /// Add a component immediately (setup/test path). Present kinds become
    /// in-place writes; absent kinds move the entity.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        data: Value,
    ) -> Result<(), EcsError> {
        let loc = self
            .directory
            .location(entity)
            .ok_or(EcsError::DeadEntity { entity })?;
        if self.registry.info(type_id).is_none() {
            return Err(EcsError::UnknownComponent {
                name: self.comp_name(type_id),
            });
        }
        let arch = &self.archetypes[loc.archetype.index()];
        if arch.has_type(type_id) {
            let tick = self.current_tick;
            return self.apply_component_data(entity, type_id, &data, tick);
        }
        let mut new_types = arch.types().to_vec();
        new_types.push(type_id);
        new_types.sort_unstable();
        let to = self.get_or_create_archetype(&new_types)?;
        let tick = self.current_tick;
        self.move_entity(entity, loc.archetype, to, vec![(type_id, data)], tick)
    }

    /// Remove a component immediately (setup/test path). Absent kinds are a
    /// no-op.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
    ) -> Result<(), EcsError> {
        let loc = self
            .directory
            .location(entity)
            .ok_or(EcsError::DeadEntity { entity })?;
        let arch = &self.archetypes[loc.archetype.index()];
        if !arch.has_type(type_id) {
            return Ok(());
        }
        let new_types: Vec<ComponentTypeId> = arch
            .types()
            .iter()
            .copied()
            .filter(|t| *t != type_id)
            .collect();
        let to = self.get_or_create_archetype(&new_types)?;
        let tick = self.current_tick;
        self.move_entity(entity, loc.archetype, to, Vec::new(), tick)
    }

    /// Move one entity between archetypes.
    pub(crate) fn move_entity(
        &mut self,
        entity: EntityId,
        from: ArchetypeId,
        to: ArchetypeId,
        payload: Vec<(ComponentTypeId, Value)>,
        tick: u32,
    ) -> Result<(), EcsError> {
        self.move_batch(from, to, &[(entity, payload)], tick)
    }

    /// Move a batch of entities from one archetype to another.
    ///
    /// Overlapping columns are copied as contiguous spans (one
    /// memcpy-equivalent per column per run of consecutive rows); dirty ticks
    /// travel with their rows; formula spans are re-stored into the
    /// destination chunk's streams. New components come up zeroed and then
    /// receive their payload fields. Source rows are destroyed in descending
    /// order per chunk.
    pub(crate) fn move_batch(
        &mut self,
        from: ArchetypeId,
        to: ArchetypeId,
        moves: &[(EntityId, Vec<(ComponentTypeId, Value)>)],
        tick: u32,
    ) -> Result<(), EcsError> {
        debug_assert_ne!(from, to, "a same-archetype move is a data write");
        // Dead entities are dropped silently (idempotent destroy semantics).
        let mut ordered: Vec<(usize, EntityLocation)> = Vec::with_capacity(moves.len());
        for (i, (entity, _)) in moves.iter().enumerate() {
            if let Some(loc) = self.directory.location(*entity) {
                debug_assert_eq!(loc.archetype, from);
                ordered.push((i, loc));
            }
        }
        if ordered.is_empty() {
            return Ok(());
        }
        ordered.sort_by_key(|(_, l)| (l.chunk, l.row));
        let n = ordered.len();

        let runs = self.archetypes[to.index()].allocate_rows(n);
        let mut dst_pos: Vec<(u32, u32)> = Vec::with_capacity(n);
        for &(chunk, start, len) in &runs {
            for k in 0..len {
                dst_pos.push((chunk, start + k));
            }
        }

        let World {
            archetypes,
            directory,
            strings,
            shared,
            vars,
            ..
        } = self;
        let (from_arch, to_arch) = two_archetypes(archetypes, from, to);

        // Components present on both sides; plans are identical per kind so
        // column indices line up.
        let overlap: Vec<(usize, usize)> = to_arch
            .comps
            .iter()
            .enumerate()
            .filter_map(|(ti, info)| from_arch.comp_index(info.id).map(|fi| (fi, ti)))
            .collect();
        let (to_comps, to_chunks) = to_arch.comps_and_chunks_mut();
        let masks: Vec<Vec<bool>> = to_comps.iter().map(rpn_col_mask).collect();

        // Span copies over contiguous (source, destination) runs.
        let mut i = 0;
        while i < n {
            let (sc, sr) = (ordered[i].1.chunk, ordered[i].1.row);
            let (dc, dr) = dst_pos[i];
            let mut seg = 1u32;
            while (i + seg as usize) < n {
                let next = &ordered[i + seg as usize].1;
                let (ndc, ndr) = dst_pos[i + seg as usize];
                if next.chunk == sc && next.row == sr + seg && ndc == dc && ndr == dr + seg {
                    seg += 1;
                } else {
                    break;
                }
            }
            let src_chunk = &from_arch.chunks[sc as usize];
            let dst_chunk = &mut to_chunks[dc as usize];
            for &(fi, ti) in &overlap {
                for (col, skip) in masks[ti].iter().enumerate() {
                    if *skip {
                        continue; // stream offsets are re-stored per row below
                    }
                    dst_chunk.comps[ti].columns[col].copy_span_from(
                        dr as usize,
                        &src_chunk.comps[fi].columns[col],
                        sr as usize,
                        seg as usize,
                    );
                }
                if let (Some(dst_dirty), Some(src_dirty)) = (
                    dst_chunk.comps[ti].dirty.as_deref_mut(),
                    src_chunk.comps[fi].dirty.as_deref(),
                ) {
                    dst_dirty[dr as usize..(dr + seg) as usize]
                        .copy_from_slice(&src_dirty[sr as usize..(sr + seg) as usize]);
                }
            }
            i += seg as usize;
        }

        // Re-store formula spans row by row.
        for (k, (_, src_loc)) in ordered.iter().enumerate() {
            let (dc, dr) = dst_pos[k];
            for &(fi, ti) in &overlap {
                let info = &to_comps[ti];
                if info.streams.is_empty() {
                    continue;
                }
                for plan in &info.fields {
                    let FieldPlan::Rpn {
                        first_col,
                        stream,
                        instance_capacity,
                    } = plan
                    else {
                        continue;
                    };
                    for slot in 0..*instance_capacity {
                        let src_chunk = &from_arch.chunks[src_loc.chunk as usize];
                        let span_len = src_chunk.comps[fi].columns[first_col + slot * 2 + 1]
                            .as_u16()
                            .unwrap()[src_loc.row as usize];
                        if span_len == 0 {
                            continue;
                        }
                        let offset = src_chunk.comps[fi].columns[first_col + slot * 2]
                            .as_u16()
                            .unwrap()[src_loc.row as usize];
                        let words: Vec<u16> =
                            src_chunk.comps[fi].streams[*stream].span(offset, span_len).to_vec();
                        let dst_chunk = &mut to_chunks[dc as usize];
                        let row_count = dst_chunk.count;
                        let new_offset = store_rpn_span(
                            &mut dst_chunk.comps[ti],
                            row_count,
                            *first_col,
                            *stream,
                            *instance_capacity,
                            &words,
                        )?;
                        let comp = &mut dst_chunk.comps[ti];
                        comp.columns[first_col + slot * 2].as_u16_mut().unwrap()[dr as usize] =
                            new_offset;
                        comp.columns[first_col + slot * 2 + 1].as_u16_mut().unwrap()
                            [dr as usize] = span_len;
                    }
                }
            }
        }

        // Destination back-map, directory entries, and payload writes.
        for (k, (input_idx, _)) in ordered.iter().enumerate() {
            let (dc, dr) = dst_pos[k];
            let entity = moves[*input_idx].0;
            to_chunks[dc as usize].entities[dr as usize] = entity;
            directory.set_location(
                entity,
                EntityLocation {
                    archetype: to,
                    chunk: dc,
                    row: dr,
                },
            );
            for (type_id, value) in &moves[*input_idx].1 {
                let Ok(comp_idx) = to_comps.binary_search_by_key(type_id, |i| i.id) else {
                    continue;
                };
                if let Value::Object(map) = value {
                    write_component_fields(
                        &to_comps[comp_idx],
                        &mut to_chunks[dc as usize],
                        comp_idx,
                        dr as usize,
                        map,
                        tick,
                        strings,
                        shared,
                        vars,
                    )?;
                }
            }
        }

        // Vacate source rows, highest chunk and row first so pending
        // positions stay valid; fix directory entries of swapped rows.
        let mut sources: Vec<(u32, u32)> = ordered.iter().map(|(_, l)| (l.chunk, l.row)).collect();
        sources.sort_unstable_by(|a, b| b.cmp(a));
        for (chunk, row) in sources {
            if let Some(moved) = from_arch.destroy_row(chunk, row) {
                directory.set_location(
                    moved,
                    EntityLocation {
                        archetype: from,
                        chunk,
                        row,
                    },
                );
            }
        }
        Ok(())
    }

    // -- reads --------------------------------------------------------------

    /// Read one field back out as JSON (labels for enums, the resolved
    /// string for interned fields, the payload value for shared fields).
    /// Formula fields are not readable this way.
    pub fn field_value(
        &self,
        entity: EntityId,
        type_id: ComponentTypeId,
        field: &str,
    ) -> Option<Value> {
        let loc = self.directory.location(entity)?;
        let arch = &self.archetypes[loc.archetype.index()];
        let comp_idx = arch.comp_index(type_id)?;
        let info = &arch.comps[comp_idx];
        let chunk = &arch.chunks[loc.chunk as usize];
        let row = loc.row as usize;
        let plan = info.field(field)?;
        Some(match plan {
            FieldPlan::Scalar { col, .. } => scalar_json(chunk.column(comp_idx, *col).get(row)),
            FieldPlan::Str { col } => {
                let r = chunk.column(comp_idx, *col).as_u32()?[row];
                Value::String(self.strings.resolve(StrRef(r))?.to_owned())
            }
            FieldPlan::Enum { col, labels, .. } => {
                let Scalar::Int(index) = chunk.column(comp_idx, *col).get(row) else {
                    return None;
                };
                Value::String(labels.get(index as usize)?.clone())
            }
            FieldPlan::Bitmask { col, .. } => scalar_json(chunk.column(comp_idx, *col).get(row)),
            FieldPlan::FlatArray {
                first_col, len_col, ..
            } => {
                let Scalar::Int(len) = chunk.column(comp_idx, *len_col).get(row) else {
                    return None;
                };
                Value::Array(
                    (0..len as usize)
                        .map(|i| scalar_json(chunk.column(comp_idx, first_col + i).get(row)))
                        .collect(),
                )
            }
            FieldPlan::Rpn { .. } => Value::Null,
            FieldPlan::Shared { .. } => {
                let group_col = info.group_col?;
                let gid = chunk.column(comp_idx, group_col).as_u32()?[row];
                match self
                    .shared
                    .resolve(GroupId(gid))?
                    .records
                    .get(&type_id)
                    .and_then(|r| r.get(field))
                {
                    Some(v) => shared_json(*v),
                    None => Value::Null,
                }
            }
        })
    }

    /// The shared group an entity's component currently references.
    pub fn group_of(&self, entity: EntityId, type_id: ComponentTypeId) -> Option<GroupId> {
        let loc = self.directory.location(entity)?;
        let arch = &self.archetypes[loc.archetype.index()];
        let comp_idx = arch.comp_index(type_id)?;
        let group_col = arch.comps[comp_idx].group_col?;
        let gid = arch.chunks[loc.chunk as usize]
            .column(comp_idx, group_col)
            .as_u32()?[loc.row as usize];
        Some(GroupId(gid))
    }

    /// Evaluate a stored formula slot against a variable resolver.
    pub fn eval_formula(
        &self,
        entity: EntityId,
        type_id: ComponentTypeId,
        field: &str,
        slot: usize,
        resolver: impl Fn(&str) -> f32,
    ) -> Option<f32> {
        let loc = self.directory.location(entity)?;
        let arch = &self.archetypes[loc.archetype.index()];
        let comp_idx = arch.comp_index(type_id)?;
        let info = &arch.comps[comp_idx];
        let FieldPlan::Rpn {
            first_col,
            stream,
            instance_capacity,
        } = info.field(field)?
        else {
            return None;
        };
        if slot >= *instance_capacity {
            return None;
        }
        let chunk = &arch.chunks[loc.chunk as usize];
        let row = loc.row as usize;
        let len = chunk.column(comp_idx, first_col + slot * 2 + 1).as_u16()?[row];
        if len == 0 {
            return None;
        }
        let offset = chunk.column(comp_idx, first_col + slot * 2).as_u16()?[row];
        let span = chunk.comps[comp_idx].streams[*stream].span(offset, len);
        rpn::eval(span, |id| {
            self.vars.name_of(id).map(&resolver).unwrap_or(0.0)
        })
        .ok()
    }

    // -- queries ------------------------------------------------------------

    /// Register a query. It matches all existing archetypes now and is
    /// notified of every archetype created later, until released.
    pub fn create_query(&mut self, spec: QuerySpec) -> QueryId {
        spec.validate();
        let state = QueryState::new(spec, &self.archetypes);
        self.queries.push(state);
        QueryId(self.queries.len() as u32 - 1)
    }

    /// Stop archetype notifications for a query. Its id is never reused.
    pub fn release_query(&mut self, query: QueryId) {
        self.queries[query.0 as usize].alive = false;
    }

    /// Read-only chunk views for a query. `last_run_tick` feeds
    /// [`ChunkRef::has_changed`].
    pub fn read_chunks(&self, query: QueryId, last_run_tick: u32) -> Vec<ChunkRef<'_>> {
        let state = &self.queries[query.0 as usize];
        assert!(state.alive, "query was released");
        let mut out = Vec::new();
        for &arch_id in &state.matched {
            let arch = &self.archetypes[arch_id.index()];
            let react: Vec<usize> = state
                .spec
                .react
                .iter()
                .filter_map(|t| arch.comp_index(*t))
                .collect();
            for chunk in arch.chunks() {
                if chunk.count() > 0 {
                    out.push(ChunkRef {
                        comps: &arch.comps,
                        chunk,
                        react: react.clone(),
                        last_run_tick,
                    });
                }
            }
        }
        out
    }

    /// Visit every matched chunk with a mutable view. Writers mark what they
    /// touch; marks carry the current tick.
    pub fn for_each_chunk<F>(&mut self, query: QueryId, last_run_tick: u32, mut f: F)
    where
        F: FnMut(&mut ChunkViewMut<'_>),
    {
        let state = &self.queries[query.0 as usize];
        assert!(state.alive, "query was released");
        let matched = state.matched.clone();
        let react_types = state.spec.react.clone();
        let tick = self.current_tick;
        for arch_id in matched {
            let arch = &mut self.archetypes[arch_id.index()];
            let react: Vec<usize> = react_types
                .iter()
                .filter_map(|t| arch.comp_index(*t))
                .collect();
            let (comps, chunks) = arch.comps_and_chunks_mut();
            for chunk in chunks.iter_mut() {
                if chunk.count() == 0 {
                    continue;
                }
                let mut view = ChunkViewMut {
                    comps,
                    chunk,
                    react: &react,
                    tick,
                    last_run_tick,
                };
                f(&mut view);
            }
        }
    }

    /// Snapshot of every entity currently matched by a query.
    pub fn query_entities(&self, query: QueryId) -> Vec<EntityId> {
        let state = &self.queries[query.0 as usize];
        assert!(state.alive, "query was released");
        let mut out = Vec::new();
        for &arch_id in &state.matched {
            for chunk in self.archetypes[arch_id.index()].chunks() {
                out.extend_from_slice(chunk.entities());
            }
        }
        out
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.directory.alive_count())
            .field("archetypes", &self.archetypes.len())
            .field("tick", &self.current_tick)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
