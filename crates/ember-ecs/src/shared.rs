//! Content-addressed groups for shared component payloads.
//!
//! Fields declared `shared` are not stored per row. Instead the row carries a
//! dense [`GroupId`] into this registry, whose payload holds the field
//! values. Identical payloads across any number of entities deduplicate to
//! the same group.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;

// ---------------------------------------------------------------------------
// GroupId / payload values
// ---------------------------------------------------------------------------

/// Dense identifier of a shared payload group. Group 0 is the canonical
/// empty payload; ids are never reassigned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl GroupId {
    /// The empty payload.
    pub const EMPTY: GroupId = GroupId(0);
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

/// A primitive value inside a shared payload record.
///
/// Floats compare and hash by bit pattern so that payload equality is exact
/// and total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SharedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PartialEq for SharedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SharedValue::Int(a), SharedValue::Int(b)) => a == b,
            (SharedValue::Float(a), SharedValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SharedValue::Bool(a), SharedValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SharedValue {}

/// Field name -> value, one record per component type.
pub type SharedRecord = BTreeMap<String, SharedValue>;

/// A full shared payload: component type -> flat record of primitive fields.
///
/// The `BTreeMap` keys give the canonical (sorted) order the content hash
/// requires.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SharedPayload {
    pub records: BTreeMap<ComponentTypeId, SharedRecord>,
}

impl SharedPayload {
    /// An empty payload (always group 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one field value, creating the component record on demand.
    pub fn set(&mut self, type_id: ComponentTypeId, field: &str, value: SharedValue) {
        self.records
            .entry(type_id)
            .or_default()
            .insert(field.to_owned(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 32-bit content hash mixing type ids and field values in canonical
    /// order (first four bytes of the blake3 digest of the encoding below).
    fn content_hash(&self) -> u32 {
        let mut hasher = blake3::Hasher::new();
        for (type_id, record) in &self.records {
            hasher.update(&type_id.0.to_le_bytes());
            for (name, value) in record {
                hasher.update(name.as_bytes());
                hasher.update(&[0]);
                match value {
                    SharedValue::Int(v) => {
                        hasher.update(&[1]);
                        hasher.update(&v.to_le_bytes());
                    }
                    SharedValue::Float(v) => {
                        hasher.update(&[2]);
                        hasher.update(&v.to_bits().to_le_bytes());
                    }
                    SharedValue::Bool(v) => {
                        hasher.update(&[3, *v as u8]);
                    }
                }
            }
        }
        let digest = hasher.finalize();
        u32::from_le_bytes(digest.as_bytes()[..4].try_into().expect("digest >= 4 bytes"))
    }
}

// ---------------------------------------------------------------------------
// SharedGroupRegistry
// ---------------------------------------------------------------------------

/// Deduplicates shared payloads into dense, never-deleted group ids.
pub struct SharedGroupRegistry {
    /// Indexed by `GroupId.0`; entry 0 is the empty payload.
    payloads: Vec<SharedPayload>,
    /// Content hash -> candidate group ids; collisions resolved by equality.
    buckets: HashMap<u32, Vec<GroupId>>,
}

impl SharedGroupRegistry {
    pub fn new() -> Self {
        Self {
            payloads: vec![SharedPayload::new()],
            buckets: HashMap::new(),
        }
    }

    /// Return the group id for `payload`, minting a new dense id for content
    /// never seen before. The empty payload is always group 0.
    pub fn group_id(&mut self, payload: &SharedPayload) -> GroupId {
        if payload.is_empty() {
            return GroupId::EMPTY;
        }
        let hash = payload.content_hash();
        if let Some(candidates) = self.buckets.get(&hash) {
            for &id in candidates {
                if &self.payloads[id.0 as usize] == payload {
                    return id;
                }
            }
        }
        let id = GroupId(self.payloads.len() as u32);
        self.payloads.push(payload.clone());
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    /// Resolve a group id to its payload. O(1).
    pub fn resolve(&self, id: GroupId) -> Option<&SharedPayload> {
        self.payloads.get(id.0 as usize)
    }

    /// Number of groups, including the empty group.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.len() == 1
    }
}

impl Default for SharedGroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedGroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGroupRegistry")
            .field("groups", &self.payloads.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
