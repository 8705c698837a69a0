//! Queries over archetype storage.
//!
//! A query names four disjoint component sets: `with` (required), `without`
//! (forbidden), `any` (at least one present), and `react` (the subset of
//! `with` whose dirty ticks feed [`has_changed`](ChunkRef::has_changed)).
//! Matching happens at archetype granularity when the query is created and
//! again whenever an archetype is created; reactive filtering is row-level
//! at iteration time.
//!
//! Queries are independent instances owned through a [`QueryId`] handle; an
//! owner releases its handle to stop receiving archetype notifications.

use crate::archetype::{Archetype, ArchetypeId, Chunk, ColumnData};
use crate::component::{ComponentInfo, ComponentTypeId};
use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// QueryId / QuerySpec
// ---------------------------------------------------------------------------

/// Handle to a live query registered with the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

/// The component sets a query matches on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub with: Vec<ComponentTypeId>,
    pub without: Vec<ComponentTypeId>,
    pub any: Vec<ComponentTypeId>,
    pub react: Vec<ComponentTypeId>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, type_id: ComponentTypeId) -> Self {
        self.with.push(type_id);
        self
    }

    pub fn without(mut self, type_id: ComponentTypeId) -> Self {
        self.without.push(type_id);
        self
    }

    pub fn any(mut self, type_id: ComponentTypeId) -> Self {
        self.any.push(type_id);
        self
    }

    /// Track `type_id` for reactive filtering. Implies `with`.
    pub fn react(mut self, type_id: ComponentTypeId) -> Self {
        if !self.with.contains(&type_id) {
            self.with.push(type_id);
        }
        self.react.push(type_id);
        self
    }

    /// Panics on overlapping sets; that is a caller bug, not data.
    pub(crate) fn validate(&self) {
        for id in &self.react {
            assert!(
                self.with.contains(id),
                "react set must be a subset of with: {id:?}"
            );
        }
        for id in &self.without {
            assert!(
                !self.with.contains(id) && !self.any.contains(id),
                "without overlaps with/any: {id:?}"
            );
        }
        for id in &self.any {
            assert!(!self.with.contains(id), "any overlaps with: {id:?}");
        }
    }

    /// Archetype-level match: `with` subset, `without` disjoint, `any`
    /// non-empty intersection (when declared).
    pub(crate) fn matches(&self, types: &[ComponentTypeId]) -> bool {
        self.with.iter().all(|id| types.binary_search(id).is_ok())
            && self.without.iter().all(|id| types.binary_search(id).is_err())
            && (self.any.is_empty()
                || self.any.iter().any(|id| types.binary_search(id).is_ok()))
    }
}

// ---------------------------------------------------------------------------
// QueryState
// ---------------------------------------------------------------------------

/// World-side record of one live query.
#[derive(Debug)]
pub(crate) struct QueryState {
    pub spec: QuerySpec,
    /// Matched archetypes in insertion (creation) order.
    pub matched: Vec<ArchetypeId>,
    pub alive: bool,
}

impl QueryState {
    pub fn new(spec: QuerySpec, archetypes: &[Archetype]) -> Self {
        let matched = archetypes
            .iter()
            .filter(|a| spec.matches(a.types()))
            .map(|a| a.id())
            .collect();
        Self {
            spec,
            matched,
            alive: true,
        }
    }

    /// Archetype-creation notification.
    pub fn notify_new_archetype(&mut self, archetype: &Archetype) {
        if self.alive && self.spec.matches(archetype.types()) {
            self.matched.push(archetype.id());
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk views
// ---------------------------------------------------------------------------

fn comp_index(comps: &[ComponentInfo], type_id: ComponentTypeId) -> Option<usize> {
    comps.binary_search_by_key(&type_id, |info| info.id).ok()
}

/// Read-only view of one matched chunk.
pub struct ChunkRef<'w> {
    pub(crate) comps: &'w [ComponentInfo],
    pub(crate) chunk: &'w Chunk,
    /// Component indices of the query's react set within this archetype.
    pub(crate) react: Vec<usize>,
    pub(crate) last_run_tick: u32,
}

impl<'w> ChunkRef<'w> {
    #[inline]
    pub fn count(&self) -> usize {
        self.chunk.count()
    }

    /// Row-to-entity back-map for rows `[0, count)`.
    #[inline]
    pub fn entities(&self) -> &'w [EntityId] {
        self.chunk.entities()
    }

    /// Raw column array for `(component, column name)`.
    pub fn column(&self, type_id: ComponentTypeId, name: &str) -> Option<&'w ColumnData> {
        let comp_idx = comp_index(self.comps, type_id)?;
        let col_idx = self.comps[comp_idx].column_index(name)?;
        Some(self.chunk.column(comp_idx, col_idx))
    }

    /// Dirty tick array of a reactive component in this chunk.
    pub fn dirty(&self, type_id: ComponentTypeId) -> Option<&'w [u32]> {
        let comp_idx = comp_index(self.comps, type_id)?;
        self.chunk.dirty(comp_idx)
    }

    /// True iff any tracked component changed on `row` since the querying
    /// system last ran. Always false for queries with an empty react set.
    pub fn has_changed(&self, row: usize) -> bool {
        self.react.iter().any(|&comp_idx| {
            self.chunk
                .dirty(comp_idx)
                .map(|d| d[row] > self.last_run_tick)
                .unwrap_or(false)
        })
    }
}

/// Mutable view of one matched chunk, handed to system callbacks.
///
/// Writers mark what they touch: [`mark`](Self::mark) stamps the current
/// tick into the component's dirty array so reactive queries observe the
/// change.
pub struct ChunkViewMut<'w> {
    pub(crate) comps: &'w [ComponentInfo],
    pub(crate) chunk: &'w mut Chunk,
    pub(crate) react: &'w [usize],
    pub(crate) tick: u32,
    pub(crate) last_run_tick: u32,
}

impl ChunkViewMut<'_> {
    #[inline]
    pub fn count(&self) -> usize {
        self.chunk.count()
    }

    #[inline]
    pub fn entities(&self) -> &[EntityId] {
        self.chunk.entities()
    }

    pub fn column(&self, type_id: ComponentTypeId, name: &str) -> Option<&ColumnData> {
        let comp_idx = comp_index(self.comps, type_id)?;
        let col_idx = self.comps[comp_idx].column_index(name)?;
        Some(self.chunk.column(comp_idx, col_idx))
    }

    pub fn column_mut(&mut self, type_id: ComponentTypeId, name: &str) -> Option<&mut ColumnData> {
        let comp_idx = comp_index(self.comps, type_id)?;
        let col_idx = self.comps[comp_idx].column_index(name)?;
        Some(self.chunk.column_mut(comp_idx, col_idx))
    }

    pub fn has_changed(&self, row: usize) -> bool {
        self.react.iter().any(|&comp_idx| {
            self.chunk
                .dirty(comp_idx)
                .map(|d| d[row] > self.last_run_tick)
                .unwrap_or(false)
        })
    }

    /// Stamp the current tick into `(type_id, row)`'s dirty slot. No-op for
    /// tags and non-reactive kinds.
    pub fn mark(&mut self, type_id: ComponentTypeId, row: usize) {
        if let Some(comp_idx) = comp_index(self.comps, type_id) {
            self.chunk.mark(comp_idx, row, self.tick);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(raw: u16) -> ComponentTypeId {
        ComponentTypeId(raw)
    }

    #[test]
    fn with_requires_all() {
        let spec = QuerySpec::new().with(tid(0)).with(tid(2));
        assert!(spec.matches(&[tid(0), tid(1), tid(2)]));
        assert!(!spec.matches(&[tid(0), tid(1)]));
    }

    #[test]
    fn without_forbids() {
        let spec = QuerySpec::new().with(tid(0)).without(tid(3));
        assert!(spec.matches(&[tid(0)]));
        assert!(!spec.matches(&[tid(0), tid(3)]));
    }

    #[test]
    fn any_needs_at_least_one() {
        let spec = QuerySpec::new().with(tid(0)).any(tid(4)).any(tid(5));
        assert!(!spec.matches(&[tid(0)]));
        assert!(spec.matches(&[tid(0), tid(4)]));
        assert!(spec.matches(&[tid(0), tid(5)]));
    }

    #[test]
    fn react_implies_with() {
        let spec = QuerySpec::new().react(tid(7));
        assert_eq!(spec.with, vec![tid(7)]);
        assert_eq!(spec.react, vec![tid(7)]);
        spec.validate();
    }

    #[test]
    #[should_panic(expected = "without overlaps")]
    fn overlapping_sets_panic() {
        QuerySpec::new().with(tid(1)).without(tid(1)).validate();
    }
}
