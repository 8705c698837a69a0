//! Archetype storage: fixed-size chunks of SoA columns.
//!
//! An [`Archetype`] stores all entities that share the exact same set of
//! component kinds. Rows live in [`Chunk`]s of [`CHUNK_SIZE`] capacity; each
//! chunk pre-allocates one dense primitive array per planned column, a
//! row-to-entity back-map, and -- for every reactive component -- a dirty
//! tick array consulted by reactive queries.
//!
//! Chunks are dense: rows `[0, count)` are always live and destruction uses
//! swap-and-pop. Trailing empty chunks are popped; chunks are never compacted
//! across each other mid-tick.

use tracing::debug;

use crate::component::{ComponentInfo, ComponentTypeId, FieldPlan, PrimKind};
use crate::entity::EntityId;
use crate::rpn::RpnStream;

/// Rows per chunk.
pub const CHUNK_SIZE: usize = 128;

// ---------------------------------------------------------------------------
// ArchetypeId
// ---------------------------------------------------------------------------

/// Identifies an archetype within the world. Indexes `World::archetypes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Scalar -- bridge between client JSON values and typed columns
// ---------------------------------------------------------------------------

/// A primitive value on its way into or out of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn as_i64(self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(v),
            Scalar::Float(v) => Some(v as i64),
            Scalar::Bool(_) => None,
        }
    }

    fn as_f64(self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(v as f64),
            Scalar::Float(v) => Some(v),
            Scalar::Bool(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnData
// ---------------------------------------------------------------------------

/// One dense column of `CHUNK_SIZE` primitives.
#[derive(Debug)]
pub enum ColumnData {
    U8(Box<[u8]>),
    I8(Box<[i8]>),
    U16(Box<[u16]>),
    I16(Box<[i16]>),
    U32(Box<[u32]>),
    I32(Box<[i32]>),
    F32(Box<[f32]>),
    F64(Box<[f64]>),
    Bool(Box<[bool]>),
}

macro_rules! column_accessors {
    ($($variant:ident, $ty:ty, $as_ref:ident, $as_mut:ident;)*) => {
        $(
            pub fn $as_ref(&self) -> Option<&[$ty]> {
                match self {
                    ColumnData::$variant(data) => Some(data),
                    _ => None,
                }
            }

            pub fn $as_mut(&mut self) -> Option<&mut [$ty]> {
                match self {
                    ColumnData::$variant(data) => Some(data),
                    _ => None,
                }
            }
        )*
    };
}

impl ColumnData {
    pub fn new(prim: PrimKind) -> Self {
        match prim {
            PrimKind::U8 => ColumnData::U8(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::I8 => ColumnData::I8(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::U16 => ColumnData::U16(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::I16 => ColumnData::I16(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::U32 => ColumnData::U32(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::I32 => ColumnData::I32(vec![0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::F32 => ColumnData::F32(vec![0.0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::F64 => ColumnData::F64(vec![0.0; CHUNK_SIZE].into_boxed_slice()),
            PrimKind::Bool => ColumnData::Bool(vec![false; CHUNK_SIZE].into_boxed_slice()),
        }
    }

    column_accessors! {
        U8, u8, as_u8, as_u8_mut;
        I8, i8, as_i8, as_i8_mut;
        U16, u16, as_u16, as_u16_mut;
        I16, i16, as_i16, as_i16_mut;
        U32, u32, as_u32, as_u32_mut;
        I32, i32, as_i32, as_i32_mut;
        F32, f32, as_f32, as_f32_mut;
        F64, f64, as_f64, as_f64_mut;
        Bool, bool, as_bool, as_bool_mut;
    }

    /// Write a scalar into `row`. `false` when the scalar's kind does not
    /// match the column (numbers never coerce to bool or vice versa).
    pub fn set(&mut self, row: usize, value: Scalar) -> bool {
        match self {
            ColumnData::U8(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as u8;
                    true
                }
                None => false,
            },
            ColumnData::I8(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as i8;
                    true
                }
                None => false,
            },
            ColumnData::U16(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as u16;
                    true
                }
                None => false,
            },
            ColumnData::I16(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as i16;
                    true
                }
                None => false,
            },
            ColumnData::U32(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as u32;
                    true
                }
                None => false,
            },
            ColumnData::I32(d) => match value.as_i64() {
                Some(v) => {
                    d[row] = v as i32;
                    true
                }
                None => false,
            },
            ColumnData::F32(d) => match value.as_f64() {
                Some(v) => {
                    d[row] = v as f32;
                    true
                }
                None => false,
            },
            ColumnData::F64(d) => match value.as_f64() {
                Some(v) => {
                    d[row] = v;
                    true
                }
                None => false,
            },
            ColumnData::Bool(d) => match value {
                Scalar::Bool(v) => {
                    d[row] = v;
                    true
                }
                _ => false,
            },
        }
    }

    /// Read `row` back out as a scalar.
    pub fn get(&self, row: usize) -> Scalar {
        match self {
            ColumnData::U8(d) => Scalar::Int(d[row] as i64),
            ColumnData::I8(d) => Scalar::Int(d[row] as i64),
            ColumnData::U16(d) => Scalar::Int(d[row] as i64),
            ColumnData::I16(d) => Scalar::Int(d[row] as i64),
            ColumnData::U32(d) => Scalar::Int(d[row] as i64),
            ColumnData::I32(d) => Scalar::Int(d[row] as i64),
            ColumnData::F32(d) => Scalar::Float(d[row] as f64),
            ColumnData::F64(d) => Scalar::Float(d[row]),
            ColumnData::Bool(d) => Scalar::Bool(d[row]),
        }
    }

    /// Reset `row` to the column's zero default.
    pub fn zero_row(&mut self, row: usize) {
        match self {
            ColumnData::U8(d) => d[row] = 0,
            ColumnData::I8(d) => d[row] = 0,
            ColumnData::U16(d) => d[row] = 0,
            ColumnData::I16(d) => d[row] = 0,
            ColumnData::U32(d) => d[row] = 0,
            ColumnData::I32(d) => d[row] = 0,
            ColumnData::F32(d) => d[row] = 0.0,
            ColumnData::F64(d) => d[row] = 0.0,
            ColumnData::Bool(d) => d[row] = false,
        }
    }

    /// Copy one row within the same column (swap-and-pop support).
    pub fn copy_row_within(&mut self, dst: usize, src: usize) {
        macro_rules! arm {
            ($d:ident) => {{
                $d[dst] = $d[src];
            }};
        }
        match self {
            ColumnData::U8(d) => arm!(d),
            ColumnData::I8(d) => arm!(d),
            ColumnData::U16(d) => arm!(d),
            ColumnData::I16(d) => arm!(d),
            ColumnData::U32(d) => arm!(d),
            ColumnData::I32(d) => arm!(d),
            ColumnData::F32(d) => arm!(d),
            ColumnData::F64(d) => arm!(d),
            ColumnData::Bool(d) => arm!(d),
        }
    }

    /// Copy a contiguous span from another column of the same primitive
    /// kind. One memcpy-equivalent per call.
    pub fn copy_span_from(
        &mut self,
        dst_start: usize,
        src: &ColumnData,
        src_start: usize,
        len: usize,
    ) {
        macro_rules! arm {
            ($d:ident, $s:ident) => {{
                $d[dst_start..dst_start + len].copy_from_slice(&$s[src_start..src_start + len]);
            }};
        }
        match (self, src) {
            (ColumnData::U8(d), ColumnData::U8(s)) => arm!(d, s),
            (ColumnData::I8(d), ColumnData::I8(s)) => arm!(d, s),
            (ColumnData::U16(d), ColumnData::U16(s)) => arm!(d, s),
            (ColumnData::I16(d), ColumnData::I16(s)) => arm!(d, s),
            (ColumnData::U32(d), ColumnData::U32(s)) => arm!(d, s),
            (ColumnData::I32(d), ColumnData::I32(s)) => arm!(d, s),
            (ColumnData::F32(d), ColumnData::F32(s)) => arm!(d, s),
            (ColumnData::F64(d), ColumnData::F64(s)) => arm!(d, s),
            (ColumnData::Bool(d), ColumnData::Bool(s)) => arm!(d, s),
            _ => unreachable!("span copy between mismatched column kinds"),
        }
    }

    /// Replicate the value at `src_row` across `[dst_start, dst_start + len)`.
    pub fn fill_from_row(&mut self, src_row: usize, dst_start: usize, len: usize) {
        macro_rules! arm {
            ($d:ident) => {{
                let value = $d[src_row];
                $d[dst_start..dst_start + len].fill(value);
            }};
        }
        match self {
            ColumnData::U8(d) => arm!(d),
            ColumnData::I8(d) => arm!(d),
            ColumnData::U16(d) => arm!(d),
            ColumnData::I16(d) => arm!(d),
            ColumnData::U32(d) => arm!(d),
            ColumnData::I32(d) => arm!(d),
            ColumnData::F32(d) => arm!(d),
            ColumnData::F64(d) => arm!(d),
            ColumnData::Bool(d) => arm!(d),
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// Per-component storage bundle inside one chunk.
#[derive(Debug)]
pub struct CompColumns {
    pub(crate) columns: Vec<ColumnData>,
    /// Tick of the most recent modification per row; `None` for tags and
    /// kinds registered non-reactive.
    pub(crate) dirty: Option<Box<[u32]>>,
    /// One token stream per `rpn` field of the component.
    pub(crate) streams: Vec<RpnStream>,
}

impl CompColumns {
    fn new(info: &ComponentInfo) -> Self {
        Self {
            columns: info.columns.iter().map(|c| ColumnData::new(c.prim)).collect(),
            dirty: info
                .reactive
                .then(|| vec![0u32; CHUNK_SIZE].into_boxed_slice()),
            streams: info
                .streams
                .iter()
                .map(|s| RpnStream::new(s.stream_capacity))
                .collect(),
        }
    }
}

/// A fixed-capacity segment of an archetype's rows.
#[derive(Debug)]
pub struct Chunk {
    pub(crate) count: usize,
    /// Row -> entity back-map; only `[0, count)` is meaningful.
    pub(crate) entities: Box<[EntityId]>,
    /// Parallel to the archetype's component list.
    pub(crate) comps: Vec<CompColumns>,
}

impl Chunk {
    fn new(infos: &[ComponentInfo]) -> Self {
        Self {
            count: 0,
            entities: vec![EntityId::from_raw(0); CHUNK_SIZE].into_boxed_slice(),
            comps: infos.iter().map(CompColumns::new).collect(),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Live rows of the back-map.
    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities[..self.count]
    }

    pub fn column(&self, comp_idx: usize, col_idx: usize) -> &ColumnData {
        &self.comps[comp_idx].columns[col_idx]
    }

    pub fn column_mut(&mut self, comp_idx: usize, col_idx: usize) -> &mut ColumnData {
        &mut self.comps[comp_idx].columns[col_idx]
    }

    pub(crate) fn dirty(&self, comp_idx: usize) -> Option<&[u32]> {
        self.comps[comp_idx].dirty.as_deref()
    }

    pub(crate) fn mark(&mut self, comp_idx: usize, row: usize, tick: u32) {
        if let Some(dirty) = self.comps[comp_idx].dirty.as_deref_mut() {
            dirty[row] = tick;
        }
    }
}

// ---------------------------------------------------------------------------
// DirtyMarker
// ---------------------------------------------------------------------------

/// Write handle for one (component, chunk) dirty array at a fixed tick.
pub struct DirtyMarker<'a> {
    dirty: &'a mut [u32],
    tick: u32,
}

impl DirtyMarker<'_> {
    #[inline]
    pub fn mark(&mut self, row: usize) {
        self.dirty[row] = self.tick;
    }
}

// ---------------------------------------------------------------------------
// Archetype
// ---------------------------------------------------------------------------

/// All storage for one unique set of component kinds.
#[derive(Debug)]
pub struct Archetype {
    pub(crate) id: ArchetypeId,
    /// Canonically sorted component kind ids.
    types: Vec<ComponentTypeId>,
    /// Compiled plans, parallel to `types`.
    pub(crate) comps: Vec<ComponentInfo>,
    pub(crate) chunks: Vec<Chunk>,
}

impl Archetype {
    /// `infos` must be sorted by type id (the world's archetype index key).
    pub(crate) fn new(id: ArchetypeId, infos: Vec<ComponentInfo>) -> Self {
        debug_assert!(infos.windows(2).all(|w| w[0].id < w[1].id));
        Self {
            id,
            types: infos.iter().map(|i| i.id).collect(),
            comps: infos,
            chunks: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// The sorted component kind set defining this archetype.
    #[inline]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    #[inline]
    pub fn has_type(&self, type_id: ComponentTypeId) -> bool {
        self.types.binary_search(&type_id).is_ok()
    }

    /// Position of a component within this archetype's bundles.
    #[inline]
    pub fn comp_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.types.binary_search(&type_id).ok()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Total live rows across all chunks.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|c| c.count == 0)
    }

    /// Append a row for `entity`: last chunk with free space, or a new chunk.
    /// Columns come up zeroed. Returns `(chunk, row)`.
    pub(crate) fn allocate_row(&mut self, entity: EntityId) -> (u32, u32) {
        let needs_chunk = self
            .chunks
            .last()
            .map(|c| c.count == CHUNK_SIZE)
            .unwrap_or(true);
        if needs_chunk {
            debug!(archetype = self.id.0, chunks = self.chunks.len() + 1, "chunk added");
            self.chunks.push(Chunk::new(&self.comps));
        }
        let chunk_idx = self.chunks.len() - 1;
        let chunk = &mut self.chunks[chunk_idx];
        let row = chunk.count;
        chunk.entities[row] = entity;
        for comp in &mut chunk.comps {
            for col in &mut comp.columns {
                col.zero_row(row);
            }
            if let Some(dirty) = comp.dirty.as_deref_mut() {
                dirty[row] = 0;
            }
        }
        chunk.count += 1;
        (chunk_idx as u32, row as u32)
    }

    /// Reserve `n` rows, returning contiguous `(chunk, start, len)` runs.
    pub(crate) fn allocate_rows(&mut self, n: usize) -> Vec<(u32, u32, u32)> {
        let mut runs = Vec::new();
        let mut remaining = n;
        while remaining > 0 {
            let needs_chunk = self
                .chunks
                .last()
                .map(|c| c.count == CHUNK_SIZE)
                .unwrap_or(true);
            if needs_chunk {
                debug!(archetype = self.id.0, chunks = self.chunks.len() + 1, "chunk added");
                self.chunks.push(Chunk::new(&self.comps));
            }
            let chunk_idx = self.chunks.len() - 1;
            let chunk = &mut self.chunks[chunk_idx];
            let start = chunk.count;
            let len = remaining.min(CHUNK_SIZE - start);
            for comp in &mut chunk.comps {
                for col in &mut comp.columns {
                    for row in start..start + len {
                        col.zero_row(row);
                    }
                }
                if let Some(dirty) = comp.dirty.as_deref_mut() {
                    dirty[start..start + len].fill(0);
                }
            }
            chunk.count += len;
            remaining -= len;
            runs.push((chunk_idx as u32, start as u32, len as u32));
        }
        runs
    }

    /// Swap-and-pop the row at `(chunk, row)`. Formula spans owned by the
    /// destroyed row are released back to their streams. Returns the entity
    /// moved into `row`, if any; pops trailing empty chunks.
    pub(crate) fn destroy_row(&mut self, chunk_idx: u32, row: u32) -> Option<EntityId> {
        let row = row as usize;
        let comps = &self.comps;
        let chunk = &mut self.chunks[chunk_idx as usize];
        debug_assert!(row < chunk.count);

        Self::release_row_spans(comps, chunk, row);

        let last = chunk.count - 1;
        let swapped = if row < last {
            for comp in &mut chunk.comps {
                for col in &mut comp.columns {
                    col.copy_row_within(row, last);
                }
                if let Some(dirty) = comp.dirty.as_deref_mut() {
                    dirty[row] = dirty[last];
                }
            }
            chunk.entities[row] = chunk.entities[last];
            Some(chunk.entities[row])
        } else {
            None
        };
        chunk.count -= 1;

        while self.chunks.last().map(|c| c.count == 0).unwrap_or(false) {
            self.chunks.pop();
        }
        swapped
    }

    /// Return every formula span held by `row` to its stream allocator.
    fn release_row_spans(comps: &[ComponentInfo], chunk: &mut Chunk, row: usize) {
        for (comp_idx, info) in comps.iter().enumerate() {
            if info.streams.is_empty() {
                continue;
            }
            for plan in &info.fields {
                if let FieldPlan::Rpn {
                    first_col,
                    stream,
                    instance_capacity,
                } = plan
                {
                    for slot in 0..*instance_capacity {
                        let comp = &chunk.comps[comp_idx];
                        let offset =
                            comp.columns[first_col + slot * 2].as_u16().unwrap()[row];
                        let len = comp.columns[first_col + slot * 2 + 1].as_u16().unwrap()[row];
                        if len > 0 {
                            chunk.comps[comp_idx].streams[*stream].release(offset, len);
                        }
                    }
                }
            }
        }
    }

    /// Split borrow: compiled plans (shared) alongside mutable chunks.
    pub(crate) fn comps_and_chunks_mut(&mut self) -> (&[ComponentInfo], &mut [Chunk]) {
        (&self.comps, &mut self.chunks)
    }

    /// Marker writing `dirty[row] = tick` for one (component, chunk) pair.
    /// `None` for tags and non-reactive kinds.
    pub fn dirty_marker(
        &mut self,
        chunk_idx: u32,
        type_id: ComponentTypeId,
        tick: u32,
    ) -> Option<DirtyMarker<'_>> {
        let comp_idx = self.comp_index(type_id)?;
        let dirty = self.chunks[chunk_idx as usize].comps[comp_idx]
            .dirty
            .as_deref_mut()?;
        Some(DirtyMarker { dirty, tick })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentRegistry, FieldKind, Schema};

    fn single_comp_archetype() -> (Archetype, ComponentTypeId) {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "position",
                Schema::new().field("x", FieldKind::F32).field("y", FieldKind::F32),
            )
            .unwrap();
        let info = reg.info(id).unwrap().clone();
        (Archetype::new(ArchetypeId(0), vec![info]), id)
    }

    #[test]
    fn allocate_rows_are_dense() {
        let (mut arch, _) = single_comp_archetype();
        for i in 0..5u32 {
            let (chunk, row) = arch.allocate_row(EntityId::new(i, 0));
            assert_eq!((chunk, row), (0, i));
        }
        assert_eq!(arch.len(), 5);
        assert_eq!(arch.chunks()[0].count(), 5);
    }

    #[test]
    fn new_chunk_after_capacity() {
        let (mut arch, _) = single_comp_archetype();
        for i in 0..(CHUNK_SIZE as u32 + 1) {
            arch.allocate_row(EntityId::new(i, 0));
        }
        assert_eq!(arch.chunks().len(), 2);
        assert_eq!(arch.chunks()[0].count(), CHUNK_SIZE);
        assert_eq!(arch.chunks()[1].count(), 1);
    }

    #[test]
    fn destroy_swaps_last_row_in() {
        let (mut arch, id) = single_comp_archetype();
        let comp = arch.comp_index(id).unwrap();
        for i in 0..3u32 {
            let (c, r) = arch.allocate_row(EntityId::new(i, 0));
            let col = arch.chunks[c as usize].column_mut(comp, 0);
            col.set(r as usize, Scalar::Float(i as f64));
        }

        let swapped = arch.destroy_row(0, 1);
        assert_eq!(swapped, Some(EntityId::new(2, 0)));
        let chunk = &arch.chunks()[0];
        assert_eq!(chunk.count(), 2);
        assert_eq!(chunk.entities(), &[EntityId::new(0, 0), EntityId::new(2, 0)]);
        assert_eq!(chunk.column(comp, 0).as_f32().unwrap()[1], 2.0);
    }

    #[test]
    fn destroy_last_row_swaps_nothing() {
        let (mut arch, _) = single_comp_archetype();
        arch.allocate_row(EntityId::new(0, 0));
        arch.allocate_row(EntityId::new(1, 0));
        assert_eq!(arch.destroy_row(0, 1), None);
        assert_eq!(arch.len(), 1);
    }

    #[test]
    fn trailing_empty_chunks_are_popped() {
        let (mut arch, _) = single_comp_archetype();
        for i in 0..(CHUNK_SIZE as u32 + 2) {
            arch.allocate_row(EntityId::new(i, 0));
        }
        assert_eq!(arch.chunks().len(), 2);
        arch.destroy_row(1, 1);
        arch.destroy_row(1, 0);
        assert_eq!(arch.chunks().len(), 1);
    }

    #[test]
    fn reused_rows_come_up_zeroed() {
        let (mut arch, id) = single_comp_archetype();
        let comp = arch.comp_index(id).unwrap();
        let (c, r) = arch.allocate_row(EntityId::new(0, 0));
        arch.chunks[c as usize]
            .column_mut(comp, 0)
            .set(r as usize, Scalar::Float(9.0));
        arch.destroy_row(c, r);
        let (c2, r2) = arch.allocate_row(EntityId::new(1, 0));
        assert_eq!((c2, r2), (c, r));
        assert_eq!(arch.chunks[c2 as usize].column(comp, 0).as_f32().unwrap()[0], 0.0);
    }

    #[test]
    fn dirty_marker_writes_tick() {
        let (mut arch, id) = single_comp_archetype();
        arch.allocate_row(EntityId::new(0, 0));
        let mut marker = arch.dirty_marker(0, id, 42).unwrap();
        marker.mark(0);
        let comp = arch.comp_index(id).unwrap();
        assert_eq!(arch.chunks()[0].dirty(comp).unwrap()[0], 42);
    }

    #[test]
    fn tag_component_has_no_marker() {
        let mut reg = ComponentRegistry::new();
        let tag = reg.register_tag("frozen").unwrap();
        let info = reg.info(tag).unwrap().clone();
        let mut arch = Archetype::new(ArchetypeId(0), vec![info]);
        arch.allocate_row(EntityId::new(0, 0));
        assert!(arch.dirty_marker(0, tag, 1).is_none());
    }

    #[test]
    fn allocate_rows_returns_contiguous_runs() {
        let (mut arch, _) = single_comp_archetype();
        for i in 0..100u32 {
            arch.allocate_row(EntityId::new(i, 0));
        }
        let runs = arch.allocate_rows(60);
        assert_eq!(runs, vec![(0, 100, 28), (1, 0, 32)]);
        assert_eq!(arch.len(), 160);
    }
}
