//! # record 模块说明
//!
//! ## 角色定位（Why）
//! - [`RecordView`] 是对外暴露的关联值：一条不可变的线上消息 + 一张可选的扩展表，
//!   通过 [`SchemaDef`] 解析键、通过 codec 转换值，实现查找、插入、删除、合并与迭代；
//! - 扩展表承接 Schema 无法识别的键，写入时不丢弃，复制与合并时保留。
//!
//! ## 契约（What）
//! - 每次修改都产生新的 `RecordView`；已发布的消息永不原地修改；
//! - 失败的写操作不产生任何可见的部分写入，原记录保持不变；
//! - 相等性是结构相等：同一消息类型，且（字段键值序列 + 扩展表）相等，与底层字节无关。
//!
//! ## 执行（How）
//! - 写操作在私有的 `Draft` 上进行：首次写字段时才从共享消息克隆出可变副本，
//!   全部成功后冻结为新的 `Arc<DynamicMessage>`。

mod iter;
mod stream;

use std::{
    fmt,
    hash::{Hash, Hasher},
    io::{Read, Write},
    sync::Arc,
};

use indexmap::IndexMap;
use prost::Message;
use prost_reflect::{DynamicMessage, ReflectMessage, Value as WireValue};

pub use iter::{Entries, Keys};
pub use stream::DelimitedReader;

use crate::{
    codec,
    error::{ProtoMapError, Result},
    schema::{FieldHandle, KeyRef, SchemaDef},
    value::{Key, OrderedMap, Value},
};

type Ext = IndexMap<Key, Value>;

/// 以 Schema 反射呈现的关联记录。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方以“键 → 逻辑值”的方式读写 Protobuf 消息，无需生成代码；
/// - **契约 (What)**：
///   - 克隆只复制三个引用计数；实例可在线程间自由共享；
///   - 字段“存在”的判定：repeated 字段非空；单值字段已设置或声明了默认值；
///   - 迭代顺序：按声明顺序的存在字段，随后是扩展表条目（按插入顺序）。
/// - **风险 (Trade-offs)**：读取值时按需解码，重复读取同一字段会重复转换。
#[derive(Clone)]
pub struct RecordView {
    def: Arc<SchemaDef>,
    message: Arc<DynamicMessage>,
    ext: Option<Arc<Ext>>,
}

impl RecordView {
    /// 空记录，共享定义上的空消息。
    pub fn empty(def: Arc<SchemaDef>) -> Self {
        let message = def.empty_arc();
        Self {
            def,
            message,
            ext: None,
        }
    }

    pub(crate) fn from_parts(
        def: Arc<SchemaDef>,
        message: Arc<DynamicMessage>,
        ext: Option<Arc<Ext>>,
    ) -> Self {
        Self { def, message, ext }
    }

    /// 解析完整消息字节。
    pub fn from_bytes(def: Arc<SchemaDef>, bytes: &[u8]) -> Result<Self> {
        let message = def.parse(bytes)?;
        Ok(Self::from_parts(def, Arc::new(message), None))
    }

    /// 从流中读取一条长度前缀记录；流在前缀之前干净结束时返回 `Ok(None)`。
    pub fn from_delimited<R: Read>(def: Arc<SchemaDef>, reader: &mut R) -> Result<Option<Self>> {
        Ok(def
            .parse_delimited(reader)?
            .map(|message| Self::from_parts(def, Arc::new(message), None)))
    }

    /// 包装已有的动态消息，类型必须与定义一致。
    pub fn from_message(def: Arc<SchemaDef>, message: DynamicMessage) -> Result<Self> {
        if message.descriptor() != *def.descriptor() {
            return Err(ProtoMapError::SchemaMismatch {
                expected: def.full_name().to_owned(),
                found: message.descriptor().full_name().to_owned(),
            });
        }
        Ok(Self::from_parts(def, Arc::new(message), None))
    }

    /// 依次 `assoc` 每个键值对构建记录。
    pub fn from_entries<K, V, I>(def: Arc<SchemaDef>, entries: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut draft = Draft::new(&Self::empty(def));
        for (key, value) in entries {
            draft.assoc(KeyRef::Name(key.as_ref()), value.into())?;
        }
        Ok(draft.finish())
    }

    /// 由逻辑值构建记录。
    ///
    /// - **契约 (What)**：接受同类型记录、逻辑映射或由二元列表组成的列表；
    ///   映射键必须是字符串或枚举标识符（`InvalidRecordKey`），其它形状返回 `NotAPair`。
    pub fn from_value(def: Arc<SchemaDef>, value: &Value) -> Result<Self> {
        match value {
            Value::Record(record) if record.same_definition(&def) => Ok(Self {
                def,
                message: Arc::clone(&record.message),
                ext: record.ext.clone(),
            }),
            other => {
                let mut draft = Draft::new(&Self::empty(def));
                draft.conj_all(other)?;
                Ok(draft.finish())
            }
        }
    }

    fn same_definition(&self, def: &Arc<SchemaDef>) -> bool {
        Arc::ptr_eq(&self.def, def)
            || (self.def.descriptor() == def.descriptor() && self.def.options() == def.options())
    }

    /// 记录所属的定义。
    #[inline]
    pub fn schema(&self) -> &Arc<SchemaDef> {
        &self.def
    }

    /// 底层线上消息。
    #[inline]
    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    pub fn to_message(&self) -> DynamicMessage {
        DynamicMessage::clone(&self.message)
    }

    pub fn into_message(self) -> DynamicMessage {
        Arc::try_unwrap(self.message).unwrap_or_else(|shared| DynamicMessage::clone(&shared))
    }

    /// 读取键对应的逻辑值；字段不存在时回退到扩展表。
    pub fn get<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<Value> {
        self.lookup(key.into(), true)
    }

    /// 同 [`get`](Self::get)，但 repeated 字段一律读为原始列表，不应用行为注解。
    pub fn get_raw<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<Value> {
        self.lookup(key.into(), false)
    }

    pub fn get_or<'k>(&self, key: impl Into<KeyRef<'k>>, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    fn lookup(&self, key: KeyRef<'_>, behaviors: bool) -> Option<Value> {
        if let Some(field) = self.def.field_for(key)
            && self.contains_field(&field)
        {
            return Some(self.decode(&field, behaviors));
        }
        self.ext_get(key)
    }

    pub(crate) fn decode(&self, field: &FieldHandle, behaviors: bool) -> Value {
        let wire = self.message.get_field(field.descriptor());
        codec::decode_field(&self.def, field, &wire, behaviors)
    }

    fn ext_get(&self, key: KeyRef<'_>) -> Option<Value> {
        let ext = self.ext.as_ref()?;
        let name = match key {
            KeyRef::Name(name) => name,
            KeyRef::Field(handle) => handle.key().as_str(),
        };
        ext.get(name).cloned()
    }

    /// repeated 字段非空；单值字段已设置或声明了默认值。
    pub(crate) fn contains_field(&self, field: &FieldHandle) -> bool {
        let descriptor = field.descriptor();
        if field.is_repeated() {
            match self.message.get_field(descriptor).as_ref() {
                WireValue::List(items) => !items.is_empty(),
                WireValue::Map(entries) => !entries.is_empty(),
                _ => false,
            }
        } else {
            self.message.has_field(descriptor) || field.has_declared_default()
        }
    }

    pub fn contains_key<'k>(&self, key: impl Into<KeyRef<'k>>) -> bool {
        let key = key.into();
        if let Some(field) = self.def.field_for(key)
            && self.contains_field(&field)
        {
            return true;
        }
        self.ext_get(key).is_some()
    }

    /// 写入键值，返回新记录。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：
    ///   - 可解析为字段：编码并整体替换该字段（repeated 先清空再写入），扩展表不变；
    ///   - 无法解析：消息不变，键值写入扩展表；
    ///   - 编码失败时返回错误，`self` 不受影响。
    pub fn assoc<'k>(&self, key: impl Into<KeyRef<'k>>, value: impl Into<Value>) -> Result<Self> {
        let mut draft = Draft::new(self);
        draft.assoc(key.into(), value.into())?;
        Ok(draft.finish())
    }

    /// 仅在键尚不存在时写入，否则返回 `KeyAlreadyPresent`。
    pub fn assoc_unique<'k>(
        &self,
        key: impl Into<KeyRef<'k>>,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let key = key.into();
        if self.contains_key(key) {
            return Err(ProtoMapError::KeyAlreadyPresent {
                key: key.to_key().to_string(),
            });
        }
        self.assoc(key, value)
    }

    /// 移除键。
    ///
    /// - **契约 (What)**：required 字段返回 `RequiredField`；未设置的字段与扩展表中不存在的键
    ///   原样返回当前记录（共享同一消息）。
    pub fn dissoc<'k>(&self, key: impl Into<KeyRef<'k>>) -> Result<Self> {
        let key = key.into();
        match self.def.field_for(key) {
            Some(field) if field.is_required() => Err(ProtoMapError::RequiredField {
                field: field.full_name().to_owned(),
            }),
            Some(field) if !self.message.has_field(field.descriptor()) => Ok(self.clone()),
            Some(field) => {
                let mut message = self.to_message();
                message.clear_field(field.descriptor());
                Ok(Self::from_parts(
                    Arc::clone(&self.def),
                    Arc::new(message),
                    self.ext.clone(),
                ))
            }
            None => {
                let name = key.to_key();
                match &self.ext {
                    Some(ext) if ext.contains_key(name.as_str()) => {
                        let mut ext = Ext::clone(ext);
                        ext.shift_remove(name.as_str());
                        let ext = (!ext.is_empty()).then(|| Arc::new(ext));
                        Ok(Self::from_parts(
                            Arc::clone(&self.def),
                            Arc::clone(&self.message),
                            ext,
                        ))
                    }
                    _ => Ok(self.clone()),
                }
            }
        }
    }

    /// 追加一个键值对或一组条目。
    ///
    /// - **契约 (What)**：二元列表视为一个键值对；映射或记录逐条 `assoc`；其它值返回 `NotAPair`。
    pub fn conj(&self, value: &Value) -> Result<Self> {
        let mut draft = Draft::new(self);
        draft.conj(value)?;
        Ok(draft.finish())
    }

    /// 合并另一条同类型记录。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：
    ///   - `other` 中已设置的单值字段覆盖当前值，repeated 字段追加，嵌套消息递归合并；
    ///   - `other` 的扩展表条目覆盖写入当前扩展表；
    ///   - 类型不同返回 `SchemaMismatch`。
    /// - **风险 (Trade-offs)**：这是整条消息的字段级合并，与 map-by / map 中同键元素的合并规则不同。
    pub fn append(&self, other: &RecordView) -> Result<Self> {
        if self.def.descriptor() != other.def.descriptor() {
            return Err(ProtoMapError::SchemaMismatch {
                expected: self.def.full_name().to_owned(),
                found: other.def.full_name().to_owned(),
            });
        }
        Ok(self.merged(other))
    }

    /// 合并一个逻辑值：记录直接合并，逻辑映射先按本定义构建为记录。
    pub fn merge_value(&self, value: &Value) -> Result<Self> {
        match value {
            Value::Record(other) => self.append(other),
            Value::Map(_) => {
                let other = Self::from_value(Arc::clone(&self.def), value)?;
                Ok(self.merged(&other))
            }
            other => Err(ProtoMapError::NotAPair {
                found: other.kind_name(),
            }),
        }
    }

    /// 同类型合并，调用方保证类型一致。
    pub(crate) fn merged(&self, other: &RecordView) -> Self {
        let mut message = self.to_message();
        codec::merge_message(&mut message, &other.message);

        let ext = match (&self.ext, &other.ext) {
            (ext, None) => ext.clone(),
            (None, Some(theirs)) => Some(Arc::clone(theirs)),
            (Some(ours), Some(theirs)) => {
                let mut ext = Ext::clone(ours);
                ext.extend(theirs.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(Arc::new(ext))
            }
        };
        Self::from_parts(Arc::clone(&self.def), Arc::new(message), ext)
    }

    /// 同类型的空记录，扩展表一并清空。
    pub fn clear(&self) -> Self {
        Self::empty(Arc::clone(&self.def))
    }

    /// 存在的字段数 + 扩展表条目数。
    pub fn len(&self) -> usize {
        let fields = self
            .def
            .fields()
            .iter()
            .filter(|field| self.contains_field(field))
            .count();
        fields + self.ext_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ext_len() == 0 && !self.def.fields().iter().any(|field| self.contains_field(field))
    }

    fn ext_len(&self) -> usize {
        self.ext.as_ref().map_or(0, |ext| ext.len())
    }

    /// 键值对迭代器；可重复调用，每次从头开始。
    pub fn entries(&self) -> Entries<'_> {
        Entries::new(self)
    }

    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    /// 扩展表条目，按插入顺序。
    pub fn ext(&self) -> impl Iterator<Item = (&Key, &Value)> + '_ {
        self.ext.iter().flat_map(|ext| ext.iter())
    }

    pub(crate) fn ext_map(&self) -> Option<&Ext> {
        self.ext.as_deref()
    }

    /// 逻辑映射形式，键为字符串。
    pub fn to_map(&self) -> OrderedMap {
        self.entries()
            .map(|(key, value)| (Value::String(key.to_string()), value))
            .collect()
    }

    /// 消息字节；扩展表不参与序列化。
    pub fn to_bytes(&self) -> Vec<u8> {
        self.message.encode_to_vec()
    }

    pub fn to_delimited_bytes(&self) -> Vec<u8> {
        self.message.encode_length_delimited_to_vec()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn write_delimited_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_delimited_bytes())?;
        Ok(())
    }

    fn ext_eq(&self, other: &Self) -> bool {
        match (&self.ext, &other.ext) {
            (Some(ours), Some(theirs)) => ours == theirs,
            (ours, theirs) => {
                ours.as_ref().is_none_or(|ext| ext.is_empty())
                    && theirs.as_ref().is_none_or(|ext| ext.is_empty())
            }
        }
    }
}

impl PartialEq for RecordView {
    fn eq(&self, other: &Self) -> bool {
        if self.def.descriptor() != other.def.descriptor() || !self.ext_eq(other) {
            return false;
        }
        if Arc::ptr_eq(&self.message, &other.message) && self.def.naming() == other.def.naming() {
            return true;
        }
        iter::FieldEntries::new(self).eq(iter::FieldEntries::new(other))
    }
}

impl Eq for RecordView {}

impl Hash for RecordView {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.def.full_name().hash(state);
        for (key, value) in iter::FieldEntries::new(self) {
            key.hash(state);
            value.hash(state);
        }
        self.ext_len().hash(state);
    }
}

impl fmt::Debug for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl<'a> IntoIterator for &'a RecordView {
    type Item = (Key, Value);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

/// 写操作的暂存区：首次写字段时才克隆消息，全部成功后冻结。
struct Draft {
    def: Arc<SchemaDef>,
    base: Arc<DynamicMessage>,
    message: Option<DynamicMessage>,
    ext: Option<Arc<Ext>>,
}

impl Draft {
    fn new(record: &RecordView) -> Self {
        Self {
            def: Arc::clone(&record.def),
            base: Arc::clone(&record.message),
            message: None,
            ext: record.ext.clone(),
        }
    }

    fn assoc(&mut self, key: KeyRef<'_>, value: Value) -> Result<()> {
        match self.def.field_for(key) {
            Some(field) => {
                let base = &self.base;
                let message = self
                    .message
                    .get_or_insert_with(|| DynamicMessage::clone(base));
                codec::write_field(&self.def, message, &field, &value)
            }
            None => {
                Arc::make_mut(self.ext.get_or_insert_with(Default::default))
                    .insert(key.to_key(), value);
                Ok(())
            }
        }
    }

    /// 单个条目：二元列表，或映射 / 记录中的全部条目。
    fn conj(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::List(pair) if pair.len() == 2 => {
                let key = record_key(&pair[0])?;
                self.assoc(KeyRef::Name(&key), pair[1].clone())
            }
            Value::Map(_) | Value::Record(_) => self.conj_all(value),
            other => Err(ProtoMapError::NotAPair {
                found: other.kind_name(),
            }),
        }
    }

    /// 条目集合：映射、记录，或由二元列表组成的列表。
    fn conj_all(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Map(entries) => {
                for (key, value) in entries {
                    let key = record_key(key)?;
                    self.assoc(KeyRef::Name(&key), value.clone())?;
                }
                Ok(())
            }
            Value::Record(record) => {
                for (key, value) in record.entries() {
                    self.assoc(KeyRef::Name(&key), value)?;
                }
                Ok(())
            }
            Value::List(pairs) => {
                for pair in pairs {
                    match pair {
                        Value::List(items) if items.len() == 2 => self.conj(pair)?,
                        other => {
                            return Err(ProtoMapError::NotAPair {
                                found: other.kind_name(),
                            });
                        }
                    }
                }
                Ok(())
            }
            other => Err(ProtoMapError::NotAPair {
                found: other.kind_name(),
            }),
        }
    }

    fn finish(self) -> RecordView {
        let message = self.message.map(Arc::new).unwrap_or(self.base);
        let ext = self.ext.filter(|ext| !ext.is_empty());
        RecordView::from_parts(self.def, message, ext)
    }
}

fn record_key(value: &Value) -> Result<Key> {
    value
        .as_record_key()
        .ok_or_else(|| ProtoMapError::InvalidRecordKey {
            found: value.kind_name(),
        })
}
