//! Component kinds, schemas, and the column-plan compiler.
//!
//! Every component kind is declared at runtime with a [`Schema`] describing
//! its fields. Registration compiles the schema into a *column plan*: the
//! list of fixed-width SoA columns a chunk allocates for the kind, plus the
//! per-field translation used when clients supply data by field name.
//!
//! A kind registered with an empty schema is a **tag**: pure archetype
//! membership with no columns and no dirty tracking.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Dense 16-bit identifier assigned at registration time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub(crate) u16);

impl ComponentTypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Field kinds
// ---------------------------------------------------------------------------

/// Primitive column element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
    Bool,
}

/// Storage kind of one schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// One dense array of the primitive per chunk.
    Prim(PrimKind),
    /// One `u32` array of interned string references per chunk.
    Str,
    /// One `u8` (<= 256 labels) or `u16` array of label indices per chunk.
    Enum { labels: Vec<String> },
    /// One integer array sized to fit all flags; flag bits are exposed by
    /// name through the registry.
    Bitmask { flags: Vec<String> },
    /// `capacity` element columns plus a `<field>_len: u8` column.
    FlatArray { elem: PrimKind, capacity: usize },
    /// A chunk-level compact token stream plus `instance_capacity` per-row
    /// offset/length pairs.
    Rpn {
        stream_capacity: usize,
        instance_capacity: usize,
    },
}

impl FieldKind {
    pub const U8: FieldKind = FieldKind::Prim(PrimKind::U8);
    pub const I8: FieldKind = FieldKind::Prim(PrimKind::I8);
    pub const U16: FieldKind = FieldKind::Prim(PrimKind::U16);
    pub const I16: FieldKind = FieldKind::Prim(PrimKind::I16);
    pub const U32: FieldKind = FieldKind::Prim(PrimKind::U32);
    pub const I32: FieldKind = FieldKind::Prim(PrimKind::I32);
    pub const F32: FieldKind = FieldKind::Prim(PrimKind::F32);
    pub const F64: FieldKind = FieldKind::Prim(PrimKind::F64);
    pub const BOOL: FieldKind = FieldKind::Prim(PrimKind::Bool);

    pub fn enumeration<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bitmask<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Bitmask {
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn flat_array(elem: PrimKind, capacity: usize) -> Self {
        FieldKind::FlatArray { elem, capacity }
    }

    /// Synonym of [`flat_array`](Self::flat_array).
    pub fn array(elem: PrimKind, capacity: usize) -> Self {
        Self::flat_array(elem, capacity)
    }

    pub fn rpn(stream_capacity: usize, instance_capacity: usize) -> Self {
        FieldKind::Rpn {
            stream_capacity,
            instance_capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Shared fields are deduplicated into the shared-group registry instead
    /// of being stored per row. Only primitive kinds may be shared.
    pub shared: bool,
}

/// A component kind declaration. Built with the fluent methods below or
/// deserialized from data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSchema>,
    /// Opt-out for dirty-tick tracking. Non-tag kinds track by default.
    #[serde(default = "default_reactive")]
    reactive: bool,
}

fn default_reactive() -> bool {
    true
}

impl Schema {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            reactive: true,
        }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_owned(),
            kind,
            shared: false,
        });
        self
    }

    pub fn shared_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldSchema {
            name: name.to_owned(),
            kind,
            shared: true,
        });
        self
    }

    pub fn reactive(mut self, reactive: bool) -> Self {
        self.reactive = reactive;
        self
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn is_tag(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Compiled column plan
// ---------------------------------------------------------------------------

/// One SoA column a chunk allocates for this kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub prim: PrimKind,
}

/// Token stream requirements of one `rpn` field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpnStreamSpec {
    pub stream_capacity: u32,
    pub instance_capacity: usize,
}

/// How one declared field maps onto columns (or the shared payload).
#[derive(Debug, Clone)]
pub(crate) enum FieldPlan {
    Scalar {
        col: usize,
    },
    Str {
        col: usize,
    },
    Enum {
        col: usize,
        labels: Vec<String>,
        index_of: HashMap<String, u32>,
    },
    Bitmask {
        col: usize,
        flags: Vec<String>,
    },
    FlatArray {
        first_col: usize,
        len_col: usize,
        capacity: usize,
    },
    Rpn {
        /// First of `2 * instance_capacity` u16 columns, ordered
        /// `o0, l0, o1, l1, ...`.
        first_col: usize,
        stream: usize,
        instance_capacity: usize,
    },
    /// Value lives in the shared-group payload; the row only carries the
    /// group id column.
    Shared {
        prim: PrimKind,
    },
}

/// Compiled metadata for one registered component kind.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub streams: Vec<RpnStreamSpec>,
    /// Column index of the shared-group id, when any field is shared.
    pub group_col: Option<usize>,
    pub reactive: bool,
    pub tag: bool,
    pub(crate) fields: Vec<FieldPlan>,
    pub(crate) field_index: HashMap<String, usize>,
}

impl ComponentInfo {
    pub(crate) fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    /// Column index by column name (linear scan; plans are small).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

const GROUP_COLUMN: &str = "__group";

fn violation(detail: String) -> EcsError {
    EcsError::SchemaViolation { detail }
}

/// Compile a schema into a [`ComponentInfo`]. Fatal on malformed schemas.
fn compile(name: &str, id: ComponentTypeId, schema: &Schema) -> Result<ComponentInfo, EcsError> {
    let mut columns: Vec<ColumnSpec> = Vec::new();
    let mut streams: Vec<RpnStreamSpec> = Vec::new();
    let mut fields: Vec<FieldPlan> = Vec::new();
    let mut field_index: HashMap<String, usize> = HashMap::new();
    let mut has_shared = false;

    fn push_col(columns: &mut Vec<ColumnSpec>, col_name: String, prim: PrimKind) -> usize {
        columns.push(ColumnSpec {
            name: col_name,
            prim,
        });
        columns.len() - 1
    }

    for field in schema.fields() {
        if field_index.contains_key(&field.name) {
            return Err(violation(format!(
                "component '{name}': duplicate field '{}'",
                field.name
            )));
        }
        if field.name == GROUP_COLUMN {
            return Err(violation(format!(
                "component '{name}': field name '{GROUP_COLUMN}' is reserved"
            )));
        }

        let plan = if field.shared {
            match &field.kind {
                FieldKind::Prim(prim) => {
                    has_shared = true;
                    FieldPlan::Shared { prim: *prim }
                }
                other => {
                    return Err(violation(format!(
                        "component '{name}': shared field '{}' must be a primitive, got {other:?}",
                        field.name
                    )));
                }
            }
        } else {
            match &field.kind {
                FieldKind::Prim(prim) => FieldPlan::Scalar {
                    col: push_col(&mut columns, field.name.clone(), *prim),
                },
                FieldKind::Str => FieldPlan::Str {
                    col: push_col(&mut columns, field.name.clone(), PrimKind::U32),
                },
                FieldKind::Enum { labels } => {
                    if labels.is_empty() {
                        return Err(violation(format!(
                            "component '{name}': enum field '{}' has no labels",
                            field.name
                        )));
                    }
                    if labels.len() > u16::MAX as usize + 1 {
                        return Err(violation(format!(
                            "component '{name}': enum field '{}' has {} labels (max 65536)",
                            field.name,
                            labels.len()
                        )));
                    }
                    let mut index_of = HashMap::with_capacity(labels.len());
                    for (i, label) in labels.iter().enumerate() {
                        if index_of.insert(label.clone(), i as u32).is_some() {
                            return Err(violation(format!(
                                "component '{name}': enum field '{}' repeats label '{label}'",
                                field.name
                            )));
                        }
                    }
                    let prim = if labels.len() <= 256 {
                        PrimKind::U8
                    } else {
                        PrimKind::U16
                    };
                    FieldPlan::Enum {
                        col: push_col(&mut columns, field.name.clone(), prim),
                        labels: labels.clone(),
                        index_of,
                    }
                }
                FieldKind::Bitmask { flags } => {
                    if flags.is_empty() {
                        return Err(violation(format!(
                            "component '{name}': bitmask field '{}' has no flags",
                            field.name
                        )));
                    }
                    if flags.len() > 32 {
                        return Err(violation(format!(
                            "component '{name}': bitmask field '{}' has {} flags (max 32)",
                            field.name,
                            flags.len()
                        )));
                    }
                    let mut seen = HashMap::new();
                    for (i, flag) in flags.iter().enumerate() {
                        if seen.insert(flag.clone(), i).is_some() {
                            return Err(violation(format!(
                                "component '{name}': bitmask field '{}' repeats flag '{flag}'",
                                field.name
                            )));
                        }
                    }
                    let prim = match flags.len() {
                        0..=8 => PrimKind::U8,
                        9..=16 => PrimKind::U16,
                        _ => PrimKind::U32,
                    };
                    FieldPlan::Bitmask {
                        col: push_col(&mut columns, field.name.clone(), prim),
                        flags: flags.clone(),
                    }
                }
                FieldKind::FlatArray { elem, capacity } => {
                    if *capacity == 0 || *capacity > 255 {
                        return Err(violation(format!(
                            "component '{name}': flat_array field '{}' capacity {capacity} \
                             out of range 1..=255",
                            field.name
                        )));
                    }
                    let first_col = columns.len();
                    for i in 0..*capacity {
                        push_col(&mut columns, format!("{}_f{i}", field.name), *elem);
                    }
                    let len_col =
                        push_col(&mut columns, format!("{}_len", field.name), PrimKind::U8);
                    FieldPlan::FlatArray {
                        first_col,
                        len_col,
                        capacity: *capacity,
                    }
                }
                FieldKind::Rpn {
                    stream_capacity,
                    instance_capacity,
                } => {
                    if *stream_capacity == 0 || *instance_capacity == 0 {
                        return Err(violation(format!(
                            "component '{name}': rpn field '{}' capacities must be nonzero",
                            field.name
                        )));
                    }
                    if *stream_capacity > u16::MAX as usize {
                        return Err(violation(format!(
                            "component '{name}': rpn field '{}' stream capacity {stream_capacity} \
                             exceeds the u16 offset space",
                            field.name
                        )));
                    }
                    let first_col = columns.len();
                    for i in 0..*instance_capacity {
                        push_col(&mut columns, format!("{}_o{i}", field.name), PrimKind::U16);
                        push_col(&mut columns, format!("{}_l{i}", field.name), PrimKind::U16);
                    }
                    let stream = streams.len();
                    streams.push(RpnStreamSpec {
                        stream_capacity: *stream_capacity as u32,
                        instance_capacity: *instance_capacity,
                    });
                    FieldPlan::Rpn {
                        first_col,
                        stream,
                        instance_capacity: *instance_capacity,
                    }
                }
            }
        };

        field_index.insert(field.name.clone(), fields.len());
        fields.push(plan);
    }

    let group_col = if has_shared {
        Some(push_col(&mut columns, GROUP_COLUMN.to_owned(), PrimKind::U32))
    } else {
        None
    };

    let tag = schema.is_tag();
    Ok(ComponentInfo {
        id,
        name: name.to_owned(),
        columns,
        streams,
        group_col,
        reactive: !tag && schema.reactive,
        tag,
        fields,
        field_index,
    })
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping kind names to dense [`ComponentTypeId`]s and compiled
/// column plans.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_name: HashMap<String, ComponentTypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component kind. Schema errors are fatal here; write-time
    /// data errors are not.
    pub fn register(&mut self, name: &str, schema: Schema) -> Result<ComponentTypeId, EcsError> {
        if self.by_name.contains_key(name) {
            return Err(violation(format!(
                "component name '{name}' is already registered"
            )));
        }
        if self.infos.len() > u16::MAX as usize {
            return Err(violation("component type id space exhausted".to_owned()));
        }
        let id = ComponentTypeId(self.infos.len() as u16);
        let info = compile(name, id, &schema)?;
        self.infos.push(info);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Register a tag kind (pure membership, no columns).
    pub fn register_tag(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        self.register(name, Schema::new())
    }

    pub fn type_id_of(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    pub fn is_tag(&self, id: ComponentTypeId) -> bool {
        self.info(id).map(|i| i.tag).unwrap_or(false)
    }

    pub fn is_reactive(&self, id: ComponentTypeId) -> bool {
        self.info(id).map(|i| i.reactive).unwrap_or(false)
    }

    /// Label index of an enum field (`None` for unknown field or label).
    pub fn enum_index(&self, id: ComponentTypeId, field: &str, label: &str) -> Option<u32> {
        match self.info(id)?.field(field)? {
            FieldPlan::Enum { index_of, .. } => index_of.get(label).copied(),
            _ => None,
        }
    }

    /// Label of an enum field index.
    pub fn enum_label(&self, id: ComponentTypeId, field: &str, index: u32) -> Option<&str> {
        match self.info(id)?.field(field)? {
            FieldPlan::Enum { labels, .. } => labels.get(index as usize).map(String::as_str),
            _ => None,
        }
    }

    /// Bit position of a named bitmask flag.
    pub fn flag_bit(&self, id: ComponentTypeId, field: &str, flag: &str) -> Option<u32> {
        match self.info(id)?.field(field)? {
            FieldPlan::Bitmask { flags, .. } => {
                flags.iter().position(|f| f == flag).map(|i| i as u32)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Names of all registered kinds, sorted. Used in error messages.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_dense_ids() {
        let mut reg = ComponentRegistry::new();
        let a = reg
            .register("position", Schema::new().field("x", FieldKind::F32))
            .unwrap();
        let b = reg
            .register("velocity", Schema::new().field("dx", FieldKind::F32))
            .unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(reg.type_id_of("velocity"), Some(b));
    }

    #[test]
    fn duplicate_name_is_fatal() {
        let mut reg = ComponentRegistry::new();
        reg.register_tag("dead").unwrap();
        assert!(reg.register_tag("dead").is_err());
    }

    #[test]
    fn tag_has_no_columns_and_is_not_reactive() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register_tag("frozen").unwrap();
        assert!(reg.is_tag(id));
        assert!(!reg.is_reactive(id));
        assert!(reg.info(id).unwrap().columns.is_empty());
    }

    #[test]
    fn non_tag_is_reactive_by_default() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register("health", Schema::new().field("hp", FieldKind::U32))
            .unwrap();
        assert!(reg.is_reactive(id));

        let quiet = reg
            .register(
                "debug_label",
                Schema::new().field("text", FieldKind::Str).reactive(false),
            )
            .unwrap();
        assert!(!reg.is_reactive(quiet));
    }

    #[test]
    fn string_field_compiles_to_u32_column() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register("named", Schema::new().field("label", FieldKind::Str))
            .unwrap();
        let info = reg.info(id).unwrap();
        assert_eq!(info.columns.len(), 1);
        assert_eq!(info.columns[0].prim, PrimKind::U32);
    }

    #[test]
    fn enum_round_trip() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "tooltip",
                Schema::new().field(
                    "visibility",
                    FieldKind::enumeration(["hidden", "pending", "visible"]),
                ),
            )
            .unwrap();
        for (i, label) in ["hidden", "pending", "visible"].iter().enumerate() {
            assert_eq!(reg.enum_index(id, "visibility", label), Some(i as u32));
            assert_eq!(reg.enum_label(id, "visibility", i as u32), Some(*label));
        }
        assert_eq!(reg.enum_index(id, "visibility", "glowing"), None);
        // Three labels fit a u8 column.
        assert_eq!(reg.info(id).unwrap().columns[0].prim, PrimKind::U8);
    }

    #[test]
    fn wide_enum_uses_u16() {
        let labels: Vec<String> = (0..300).map(|i| format!("l{i}")).collect();
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register("wide", Schema::new().field("v", FieldKind::enumeration(labels)))
            .unwrap();
        assert_eq!(reg.info(id).unwrap().columns[0].prim, PrimKind::U16);
    }

    #[test]
    fn bitmask_width_fits_flags() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "contact",
                Schema::new().field(
                    "sides",
                    FieldKind::bitmask(["top", "bottom", "left", "right"]),
                ),
            )
            .unwrap();
        assert_eq!(reg.info(id).unwrap().columns[0].prim, PrimKind::U8);
        assert_eq!(reg.flag_bit(id, "sides", "left"), Some(2));

        let many: Vec<String> = (0..20).map(|i| format!("f{i}")).collect();
        let wide = reg
            .register("states", Schema::new().field("m", FieldKind::bitmask(many)))
            .unwrap();
        assert_eq!(reg.info(wide).unwrap().columns[0].prim, PrimKind::U32);
    }

    #[test]
    fn flat_array_plan() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "path",
                Schema::new().field("points", FieldKind::array(PrimKind::F32, 4)),
            )
            .unwrap();
        let info = reg.info(id).unwrap();
        let names: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["points_f0", "points_f1", "points_f2", "points_f3", "points_len"]
        );
        assert_eq!(info.columns[4].prim, PrimKind::U8);
    }

    #[test]
    fn rpn_plan_columns_and_stream() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "modifier",
                Schema::new().field("formulas", FieldKind::rpn(256, 2)),
            )
            .unwrap();
        let info = reg.info(id).unwrap();
        let names: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["formulas_o0", "formulas_l0", "formulas_o1", "formulas_l1"]
        );
        assert_eq!(info.streams.len(), 1);
        assert_eq!(info.streams[0].stream_capacity, 256);
    }

    #[test]
    fn shared_field_adds_group_column() {
        let mut reg = ComponentRegistry::new();
        let id = reg
            .register(
                "cooldown",
                Schema::new()
                    .shared_field("duration", FieldKind::F32)
                    .field("remaining", FieldKind::F32),
            )
            .unwrap();
        let info = reg.info(id).unwrap();
        // One per-row column plus the group id column.
        assert_eq!(info.columns.len(), 2);
        assert_eq!(info.group_col, Some(1));
        assert_eq!(info.columns[1].prim, PrimKind::U32);
    }

    #[test]
    fn shared_non_primitive_is_fatal() {
        let mut reg = ComponentRegistry::new();
        let result = reg.register(
            "bad",
            Schema::new().shared_field("name", FieldKind::Str),
        );
        assert!(matches!(result, Err(EcsError::SchemaViolation { .. })));
    }

    #[test]
    fn duplicate_field_is_fatal() {
        let mut reg = ComponentRegistry::new();
        let result = reg.register(
            "bad",
            Schema::new()
                .field("v", FieldKind::U32)
                .field("v", FieldKind::F32),
        );
        assert!(matches!(result, Err(EcsError::SchemaViolation { .. })));
    }

    #[test]
    fn schema_round_trips_through_json() {
        let schema = Schema::new()
            .field("x", FieldKind::F32)
            .field("kind", FieldKind::enumeration(["a", "b"]))
            .shared_field("scale", FieldKind::F64);
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, back);
    }
}
