//! 字段行为解析：把字段选项上的注解折叠为封闭的 [`FieldBehavior`]。
//!
//! # 教案式说明
//! - **意图 (Why)**：注解只在定义构建时读取一次；转换路径按枚举分支，无需反复查询扩展；
//! - **契约 (What)**：`map_by` / `map` / `set` / `counter` / `succession` 至多一个生效，
//!   冲突或形状不符时返回 [`SchemaError`]，整个定义构建失败；
//! - **执行 (How)**：扩展描述符按名称从字段所在的 `DescriptorPool` 中查找，
//!   未引入 `protomap/extensions.proto` 的 Schema 查不到任何扩展，所有字段退化为 `Plain`。

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use prost_reflect::{
    Cardinality, DescriptorPool, DynamicMessage, ExtensionDescriptor, FieldDescriptor, Kind,
    MessageDescriptor, Value as WireValue,
};

use crate::{error::SchemaError, value::Key};

/// 合并同键元素时参考的标记子字段。
///
/// - **契约 (What)**：两个标记均为元素消息中的单值 `bool` 子字段；`exists` 优先于 `deleted`。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeMarkers {
    pub exists: Option<FieldDescriptor>,
    pub deleted: Option<FieldDescriptor>,
}

impl MergeMarkers {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exists.is_none() && self.deleted.is_none()
    }
}

/// 字段的逻辑行为。
///
/// # 教案式说明
/// - **意图 (Why)**：以封闭枚举替代“运行时检查注解 + 检查值形状”的动态分派；
/// - **契约 (What)**：
///   - `Plain`：单值字段原样转换，repeated 字段转换为列表；
///   - `NativeMap`：Protobuf 原生 `map<K, V>` 字段，读出为按键排序的有序映射；
///   - `MapBy`：repeated 消息按元素的 `key` 子字段建立有序映射；
///   - `Map`：repeated `{key, val}` 元素视为有序映射；
///   - `Set`：repeated `{item, exists}` 元素折叠为有序集合；
///   - `Counter`：repeated 数值求和；
///   - `Succession`：repeated 字段只保留最后一个元素。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldBehavior {
    Plain,
    NativeMap,
    MapBy {
        key: FieldDescriptor,
        markers: MergeMarkers,
    },
    Map {
        key: FieldDescriptor,
        val: FieldDescriptor,
        markers: MergeMarkers,
    },
    Set {
        item: FieldDescriptor,
        exists: FieldDescriptor,
    },
    Counter,
    Succession,
}

impl FieldBehavior {
    pub fn label(&self) -> &'static str {
        match self {
            FieldBehavior::Plain => "plain",
            FieldBehavior::NativeMap => "native map",
            FieldBehavior::MapBy { .. } => "map-by",
            FieldBehavior::Map { .. } => "map",
            FieldBehavior::Set { .. } => "set",
            FieldBehavior::Counter => "counter",
            FieldBehavior::Succession => "succession",
        }
    }

    /// 同键元素合并时使用的标记；只有 `MapBy` 与 `Map` 携带。
    pub fn markers(&self) -> Option<&MergeMarkers> {
        match self {
            FieldBehavior::MapBy { markers, .. } | FieldBehavior::Map { markers, .. } => {
                Some(markers)
            }
            _ => None,
        }
    }
}

/// 枚举值编号与逻辑标识符之间的双向表，标识符经命名策略驻留。
#[derive(Debug, Default)]
pub(crate) struct EnumKeys {
    by_number: HashMap<i32, Key>,
    by_key: HashMap<Key, i32>,
}

impl EnumKeys {
    pub(crate) fn insert(&mut self, number: i32, key: Key) {
        self.by_number.entry(number).or_insert_with(|| key.clone());
        self.by_key.entry(key).or_insert(number);
    }

    pub(crate) fn key(&self, number: i32) -> Option<&Key> {
        self.by_number.get(&number)
    }

    pub(crate) fn number(&self, key: &str) -> Option<i32> {
        self.by_key.get(key).copied()
    }
}

/// 单个字段在某个定义下解析完成的全部元数据。
#[derive(Debug)]
pub struct FieldDef {
    pub(crate) descriptor: FieldDescriptor,
    pub(crate) key: Key,
    pub(crate) behavior: FieldBehavior,
    pub(crate) null_sentinel: Option<WireValue>,
    pub(crate) has_default: bool,
    pub(crate) enum_keys: Option<EnumKeys>,
}

/// 字段句柄，克隆只复制 `Arc`。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方可以先解析一次键，再以句柄反复读写，跳过命名策略与缓存查询；
/// - **契约 (What)**：相等性与哈希基于底层字段描述符，与命名策略无关；
///   把句柄交回所属定义的 `field_for` 会原样返回。
#[derive(Clone)]
pub struct FieldHandle(pub(crate) Arc<FieldDef>);

impl FieldHandle {
    #[inline]
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.0.descriptor
    }

    /// 该字段在当前命名策略下的逻辑键。
    #[inline]
    pub fn key(&self) -> &Key {
        &self.0.key
    }

    #[inline]
    pub fn behavior(&self) -> &FieldBehavior {
        &self.0.behavior
    }

    /// `nullable` 字段的哨兵线上值。
    #[inline]
    pub fn null_sentinel(&self) -> Option<&WireValue> {
        self.0.null_sentinel.as_ref()
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.0.null_sentinel.is_some()
    }

    /// `.proto` 中是否显式声明了 `[default = ...]`。
    #[inline]
    pub fn has_declared_default(&self) -> bool {
        self.0.has_default
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.0.descriptor.cardinality() == Cardinality::Required
    }

    /// repeated 字段（含原生 map）。
    #[inline]
    pub fn is_repeated(&self) -> bool {
        self.0.descriptor.is_list() || self.0.descriptor.is_map()
    }

    pub fn name(&self) -> &str {
        self.0.descriptor.name()
    }

    pub fn full_name(&self) -> &str {
        self.0.descriptor.full_name()
    }

    pub(crate) fn enum_keys(&self) -> Option<&EnumKeys> {
        self.0.enum_keys.as_ref()
    }
}

impl PartialEq for FieldHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.descriptor == other.0.descriptor
    }
}

impl Eq for FieldHandle {}

impl Hash for FieldHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.descriptor.hash(state);
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("field", &self.full_name())
            .field("key", self.key())
            .field("behavior", &self.behavior().label())
            .finish()
    }
}

/// 从 `DescriptorPool` 中查到的注解扩展描述符。
#[derive(Debug, Default)]
pub(crate) struct Annotations {
    nullable: Option<ExtensionDescriptor>,
    null_int: Option<ExtensionDescriptor>,
    null_long: Option<ExtensionDescriptor>,
    null_float: Option<ExtensionDescriptor>,
    null_double: Option<ExtensionDescriptor>,
    null_string: Option<ExtensionDescriptor>,
    null_enum: Option<ExtensionDescriptor>,
    map_by: Option<ExtensionDescriptor>,
    map_exists: Option<ExtensionDescriptor>,
    map_deleted: Option<ExtensionDescriptor>,
    map: Option<ExtensionDescriptor>,
    set: Option<ExtensionDescriptor>,
    counter: Option<ExtensionDescriptor>,
    succession: Option<ExtensionDescriptor>,
}

impl Annotations {
    pub(crate) fn load(pool: &DescriptorPool) -> Self {
        let ext = |name: &str| pool.get_extension_by_name(&format!("protomap.{name}"));
        Self {
            nullable: ext("nullable"),
            null_int: ext("null_int"),
            null_long: ext("null_long"),
            null_float: ext("null_float"),
            null_double: ext("null_double"),
            null_string: ext("null_string"),
            null_enum: ext("null_enum"),
            map_by: ext("map_by"),
            map_exists: ext("map_exists"),
            map_deleted: ext("map_deleted"),
            map: ext("map"),
            set: ext("set"),
            counter: ext("counter"),
            succession: ext("succession"),
        }
    }
}

fn flag(options: &DynamicMessage, ext: &Option<ExtensionDescriptor>) -> bool {
    ext.as_ref().is_some_and(|ext| {
        options.has_extension(ext) && options.get_extension(ext).as_bool() == Some(true)
    })
}

fn text(options: &DynamicMessage, ext: &Option<ExtensionDescriptor>) -> Option<String> {
    let ext = ext.as_ref()?;
    if !options.has_extension(ext) {
        return None;
    }
    options
        .get_extension(ext)
        .as_str()
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
}

/// 未设置时取扩展自身的默认值（数值 0、空串）。
fn sentinel_of(options: &DynamicMessage, ext: &Option<ExtensionDescriptor>) -> Option<WireValue> {
    ext.as_ref()
        .map(|ext| options.get_extension(ext).into_owned())
}

/// 用于错误信息的字段类型名称。
pub(crate) fn kind_label(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".into(),
        Kind::Float => "float".into(),
        Kind::Int32 => "int32".into(),
        Kind::Int64 => "int64".into(),
        Kind::Uint32 => "uint32".into(),
        Kind::Uint64 => "uint64".into(),
        Kind::Sint32 => "sint32".into(),
        Kind::Sint64 => "sint64".into(),
        Kind::Fixed32 => "fixed32".into(),
        Kind::Fixed64 => "fixed64".into(),
        Kind::Sfixed32 => "sfixed32".into(),
        Kind::Sfixed64 => "sfixed64".into(),
        Kind::Bool => "bool".into(),
        Kind::String => "string".into(),
        Kind::Bytes => "bytes".into(),
        Kind::Message(message) => format!("message `{}`", message.full_name()),
        Kind::Enum(enumeration) => format!("enum `{}`", enumeration.full_name()),
    }
}

fn is_numeric(kind: &Kind) -> bool {
    matches!(
        kind,
        Kind::Double
            | Kind::Float
            | Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Fixed32
            | Kind::Fixed64
            | Kind::Sfixed32
            | Kind::Sfixed64
    )
}

/// 字段上声明的行为注解（尚未校验）。
enum Declared {
    MapBy(String),
    Map,
    Set,
    Counter,
    Succession,
}

impl Declared {
    fn label(&self) -> &'static str {
        match self {
            Declared::MapBy(_) => "map-by",
            Declared::Map => "map",
            Declared::Set => "set",
            Declared::Counter => "counter",
            Declared::Succession => "succession",
        }
    }
}

/// 解析并校验单个字段的行为与哨兵。
pub(crate) fn resolve_field(
    field: &FieldDescriptor,
    annotations: &Annotations,
    key: Key,
    enum_keys: Option<EnumKeys>,
) -> Result<FieldDef, SchemaError> {
    let options = field.options();

    let mut declared = Vec::new();
    if let Some(name) = text(&options, &annotations.map_by) {
        declared.push(Declared::MapBy(name));
    }
    if flag(&options, &annotations.map) {
        declared.push(Declared::Map);
    }
    if flag(&options, &annotations.set) {
        declared.push(Declared::Set);
    }
    if flag(&options, &annotations.counter) {
        declared.push(Declared::Counter);
    }
    if flag(&options, &annotations.succession) {
        declared.push(Declared::Succession);
    }

    if declared.len() > 1 || (field.is_map() && !declared.is_empty()) {
        let mut behaviors: Vec<&'static str> = declared.iter().map(Declared::label).collect();
        if field.is_map() {
            behaviors.insert(0, "native map");
        }
        return Err(SchemaError::ConflictingBehaviors {
            field: field.full_name().to_owned(),
            behaviors,
        });
    }

    let behavior = match declared.pop() {
        None if field.is_map() => FieldBehavior::NativeMap,
        None => FieldBehavior::Plain,
        Some(declared) => resolve_declared(field, declared, annotations, &options)?,
    };

    let null_sentinel = if flag(&options, &annotations.nullable) {
        Some(null_sentinel(field, annotations, &options)?)
    } else {
        None
    };

    Ok(FieldDef {
        descriptor: field.clone(),
        key,
        behavior,
        null_sentinel,
        has_default: field.field_descriptor_proto().default_value.is_some(),
        enum_keys,
    })
}

fn resolve_declared(
    field: &FieldDescriptor,
    declared: Declared,
    annotations: &Annotations,
    options: &DynamicMessage,
) -> Result<FieldBehavior, SchemaError> {
    let behavior = declared.label();
    if !field.is_list() {
        return Err(SchemaError::NotRepeated {
            field: field.full_name().to_owned(),
            behavior,
        });
    }

    match declared {
        Declared::Counter => {
            let kind = field.kind();
            if is_numeric(&kind) {
                Ok(FieldBehavior::Counter)
            } else {
                Err(SchemaError::CounterNotNumeric {
                    field: field.full_name().to_owned(),
                    kind: kind_label(&kind),
                })
            }
        }
        Declared::Succession => Ok(FieldBehavior::Succession),
        Declared::MapBy(name) => {
            let element = element_type(field, behavior)?;
            let key = sub_field(field, behavior, &element, &name)?;
            let markers = markers(field, annotations, options, Some(&element))?;
            Ok(FieldBehavior::MapBy { key, markers })
        }
        Declared::Map => {
            let element = element_type(field, behavior)?;
            let key = sub_field(field, behavior, &element, "key")?;
            let val = sub_field(field, behavior, &element, "val")?;
            let target = val.kind().as_message().cloned();
            let markers = markers(field, annotations, options, target.as_ref())?;
            Ok(FieldBehavior::Map { key, val, markers })
        }
        Declared::Set => {
            let element = element_type(field, behavior)?;
            let item = sub_field(field, behavior, &element, "item")?;
            let exists = sub_field(field, behavior, &element, "exists")?;
            require_bool(field, &element, &exists)?;
            Ok(FieldBehavior::Set { item, exists })
        }
    }
}

fn element_type(
    field: &FieldDescriptor,
    behavior: &'static str,
) -> Result<MessageDescriptor, SchemaError> {
    field
        .kind()
        .as_message()
        .cloned()
        .ok_or_else(|| SchemaError::NotMessage {
            field: field.full_name().to_owned(),
            behavior,
        })
}

fn sub_field(
    field: &FieldDescriptor,
    behavior: &'static str,
    element: &MessageDescriptor,
    name: &str,
) -> Result<FieldDescriptor, SchemaError> {
    element
        .get_field_by_name(name)
        .ok_or_else(|| SchemaError::MissingSubField {
            field: field.full_name().to_owned(),
            behavior,
            element: element.full_name().to_owned(),
            sub_field: name.to_owned(),
        })
}

fn require_bool(
    field: &FieldDescriptor,
    element: &MessageDescriptor,
    sub: &FieldDescriptor,
) -> Result<(), SchemaError> {
    if matches!(sub.kind(), Kind::Bool) && !sub.is_list() {
        Ok(())
    } else {
        Err(SchemaError::SubFieldKind {
            field: field.full_name().to_owned(),
            element: element.full_name().to_owned(),
            sub_field: sub.name().to_owned(),
            expected: "a singular bool",
        })
    }
}

/// `map_exists` / `map_deleted` 只在元素（或 `val`）为消息时有意义。
fn markers(
    field: &FieldDescriptor,
    annotations: &Annotations,
    options: &DynamicMessage,
    target: Option<&MessageDescriptor>,
) -> Result<MergeMarkers, SchemaError> {
    let resolve = |ext: &Option<ExtensionDescriptor>,
                   behavior: &'static str|
     -> Result<Option<FieldDescriptor>, SchemaError> {
        let Some(name) = text(options, ext) else {
            return Ok(None);
        };
        let target = target.ok_or_else(|| SchemaError::NotMessage {
            field: field.full_name().to_owned(),
            behavior,
        })?;
        let sub = sub_field(field, behavior, target, &name)?;
        require_bool(field, target, &sub)?;
        Ok(Some(sub))
    };

    Ok(MergeMarkers {
        exists: resolve(&annotations.map_exists, "map-exists")?,
        deleted: resolve(&annotations.map_deleted, "map-deleted")?,
    })
}

fn null_sentinel(
    field: &FieldDescriptor,
    annotations: &Annotations,
    options: &DynamicMessage,
) -> Result<WireValue, SchemaError> {
    let kind = field.kind();
    let sentinel = match &kind {
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => sentinel_of(options, &annotations.null_int),
        Kind::Uint32 | Kind::Fixed32 => sentinel_of(options, &annotations.null_int)
            .and_then(|v| v.as_i32())
            .map(|v| WireValue::U32(v as u32)),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            sentinel_of(options, &annotations.null_long)
        }
        Kind::Uint64 | Kind::Fixed64 => sentinel_of(options, &annotations.null_long)
            .and_then(|v| v.as_i64())
            .map(|v| WireValue::U64(v as u64)),
        Kind::Float => sentinel_of(options, &annotations.null_float),
        Kind::Double => sentinel_of(options, &annotations.null_double),
        Kind::String => sentinel_of(options, &annotations.null_string),
        Kind::Enum(_) => sentinel_of(options, &annotations.null_enum)
            .and_then(|v| v.as_i32())
            .map(WireValue::EnumNumber),
        Kind::Bool | Kind::Bytes | Kind::Message(_) => None,
    };

    sentinel.ok_or_else(|| SchemaError::UnsupportedNullable {
        field: field.full_name().to_owned(),
        kind: kind_label(&kind),
    })
}
