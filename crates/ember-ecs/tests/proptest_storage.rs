//! Property tests for the leaf storage structures.
//!
//! Random operation sequences against the free-list allocator, the string
//! table, and the shared-group registry, checking the laws the rest of the
//! core leans on.

use ember_ecs::freelist::FreeList;
use ember_ecs::prelude::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// FreeList
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// Any alloc/dealloc sequence that pairs up ends with one free block
    /// spanning the whole capacity.
    #[test]
    fn freelist_full_coalesce(sizes in prop::collection::vec(1u32..64, 1..40)) {
        const CAPACITY: u32 = 1024;
        let mut fl = FreeList::new(CAPACITY);
        let mut live: Vec<(u32, u32)> = Vec::new();
        for size in sizes {
            if let Some(offset) = fl.allocate(size) {
                live.push((offset, size));
            }
        }
        // Free in an order unrelated to allocation order.
        live.sort_by_key(|&(offset, _)| (offset % 7, offset));
        for (offset, size) in live {
            fl.deallocate(offset, size);
        }
        prop_assert_eq!(fl.max_free_block(), CAPACITY);
        prop_assert_eq!(fl.free_total(), CAPACITY);
    }

    /// Allocations never overlap and never leave the buffer.
    #[test]
    fn freelist_allocations_disjoint(sizes in prop::collection::vec(1u32..48, 1..60)) {
        const CAPACITY: u32 = 512;
        let mut fl = FreeList::new(CAPACITY);
        let mut live: Vec<(u32, u32)> = Vec::new();
        for size in sizes {
            if let Some(offset) = fl.allocate(size) {
                prop_assert!(offset + size <= CAPACITY);
                for &(other_offset, other_size) in &live {
                    let disjoint = offset + size <= other_offset
                        || other_offset + other_size <= offset;
                    prop_assert!(disjoint, "overlap at {offset}+{size} vs {other_offset}+{other_size}");
                }
                live.push((offset, size));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StringTable
// ---------------------------------------------------------------------------

proptest! {
    /// `s1 == s2 <=> intern(s1) == intern(s2)`, and refs resolve back.
    #[test]
    fn interning_is_a_bijection(strings in prop::collection::vec("[a-z]{0,12}", 1..60)) {
        let mut table = StringTable::new();
        let refs: Vec<StrRef> = strings.iter().map(|s| table.intern(s)).collect();
        for (a, ra) in strings.iter().zip(&refs) {
            prop_assert_eq!(table.resolve(*ra).unwrap(), a.as_str());
            for (b, rb) in strings.iter().zip(&refs) {
                prop_assert_eq!(a == b, ra == rb);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SharedGroupRegistry
// ---------------------------------------------------------------------------

proptest! {
    /// Structurally equal payloads get the same dense group id; the empty
    /// payload is always group 0.
    #[test]
    fn shared_groups_dedupe(values in prop::collection::vec((0u16..4, -100i64..100), 1..40)) {
        let mut world = World::new();
        let mut ids = Vec::new();
        for (kind, value) in &values {
            let mut payload = SharedPayload::new();
            // Stable kind ids without touching the registry: the payload is
            // keyed by raw component type ids.
            payload.set(fake_type_id(*kind), "v", SharedValue::Int(*value));
            ids.push(world.shared_group(&payload));
        }
        for (i, (kind_a, value_a)) in values.iter().enumerate() {
            for (j, (kind_b, value_b)) in values.iter().enumerate() {
                let equal_payload = kind_a == kind_b && value_a == value_b;
                prop_assert_eq!(equal_payload, ids[i] == ids[j]);
            }
        }
        prop_assert_eq!(world.shared_group(&SharedPayload::new()), GroupId::EMPTY);
    }
}

/// Payload keys are plain dense type ids; mint them through a registry so
/// the ids are real.
fn fake_type_id(raw: u16) -> ComponentTypeId {
    use std::sync::OnceLock;
    static IDS: OnceLock<Vec<ComponentTypeId>> = OnceLock::new();
    IDS.get_or_init(|| {
        let mut registry = ComponentRegistry::new();
        (0..4)
            .map(|i| registry.register_tag(&format!("kind{i}")).unwrap())
            .collect()
    })[raw as usize]
}
