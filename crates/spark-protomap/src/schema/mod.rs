//! # schema 模块说明
//!
//! ## 角色定位（Why）
//! - [`SchemaDef`] 是某个消息类型在一份 [`DefOptions`] 下的不可变定义：字段句柄、行为、哨兵、
//!   键解析缓存，以及解析/分帧读取入口；
//! - [`SchemaRegistry`] 负责以（消息类型, 配置）为键记忆化定义，进程级实例创建后永不淘汰。
//!
//! ## 契约（What）
//! - 定义一经发布不再改变，只有键解析缓存会被并发追加（先写者胜）；
//! - 无法解析的键不是错误，`field_for` 返回 `None`，调用方据此退回扩展表；
//! - 解码失败与超限以 [`ProtoMapError`] 返回，不会产出半成品消息。
//!
//! ## 执行（How）
//! - 构建某类型的定义时一并构建其可达的全部嵌套类型，Schema 注解错误在顶层调用点暴露，
//!   转换过程中的嵌套查询全部命中缓存。

mod behavior;
mod registry;

use std::{
    collections::HashMap,
    fmt,
    io::{self, Read},
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, Value as WireValue};
use tracing::trace;

pub use behavior::{FieldBehavior, FieldDef, FieldHandle, MergeMarkers};
pub use registry::SchemaRegistry;

pub(crate) use behavior::kind_label;

use crate::{
    codec,
    config::DefOptions,
    error::{ProtoMapError, Result, SchemaError},
    naming::Naming,
    value::{Key, Value},
};

use behavior::{Annotations, EnumKeys};

/// 传给 [`SchemaDef::field_for`] 的键：逻辑名称或已解析的字段句柄。
#[derive(Clone, Copy, Debug)]
pub enum KeyRef<'a> {
    Name(&'a str),
    Field(&'a FieldHandle),
}

impl KeyRef<'_> {
    /// 无法解析为字段时写入扩展表所用的键。
    pub(crate) fn to_key(self) -> Key {
        match self {
            KeyRef::Name(name) => Key::new(name),
            KeyRef::Field(handle) => handle.key().clone(),
        }
    }
}

impl<'a> From<&'a str> for KeyRef<'a> {
    fn from(value: &'a str) -> Self {
        KeyRef::Name(value)
    }
}

impl<'a> From<&'a String> for KeyRef<'a> {
    fn from(value: &'a String) -> Self {
        KeyRef::Name(value)
    }
}

impl<'a> From<&'a Key> for KeyRef<'a> {
    fn from(value: &'a Key) -> Self {
        KeyRef::Name(value.as_str())
    }
}

impl<'a> From<&'a FieldHandle> for KeyRef<'a> {
    fn from(value: &'a FieldHandle) -> Self {
        KeyRef::Field(value)
    }
}

/// 消息类型在一份配置下的定义。
///
/// # 教案式说明
/// - **意图 (Why)**：把命名映射、行为注解与哨兵的解析成本摊到一次构建中；
/// - **契约 (What)**：
///   - `fields()` 按 `.proto` 声明顺序排列；
///   - `field_for` 的结果（含“无此字段”）被缓存，缓存只增不减；
///   - 只能通过 [`SchemaRegistry::def_for`] 获得，同一注册表内同键定义唯一；
/// - **风险 (Trade-offs)**：负缓存对任意外部键无上限增长，适用于键集合有限的调用方。
pub struct SchemaDef {
    descriptor: MessageDescriptor,
    options: DefOptions,
    fields: Vec<FieldHandle>,
    by_number: HashMap<u32, usize>,
    by_key: HashMap<Key, usize>,
    lookups: DashMap<Key, Option<FieldHandle>>,
    empty: Arc<DynamicMessage>,
    registry: Weak<SchemaRegistry>,
}

impl SchemaDef {
    /// 解析并校验 `descriptor` 的全部字段。
    pub(crate) fn build(
        registry: &Arc<SchemaRegistry>,
        descriptor: &MessageDescriptor,
        options: &DefOptions,
    ) -> std::result::Result<Self, SchemaError> {
        let naming = options.naming();
        let annotations = Annotations::load(descriptor.parent_pool());

        let mut fields = Vec::new();
        let mut by_number = HashMap::new();
        let mut by_key = HashMap::new();

        for field in descriptor.fields() {
            let key = registry.intern(naming, field.name());
            let enum_keys = enum_keys(registry, naming, &field);
            let def = behavior::resolve_field(&field, &annotations, key.clone(), enum_keys)?;

            by_number.insert(field.number(), fields.len());
            by_key.entry(key).or_insert(fields.len());
            fields.push(FieldHandle(Arc::new(def)));
        }

        Ok(Self {
            descriptor: descriptor.clone(),
            options: options.clone(),
            fields,
            by_number,
            by_key,
            lookups: DashMap::new(),
            empty: Arc::new(DynamicMessage::new(descriptor.clone())),
            registry: Arc::downgrade(registry),
        })
    }

    /// 将外部键解析为字段句柄。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：
    ///   - 同类型的句柄按描述符换成本定义的句柄，命名策略不同的定义签发的句柄
    ///     因此也按本定义的键与枚举标识符解码；其它类型的句柄按其逻辑键重新解析；
    ///   - 名称先匹配字段自身的逻辑键，再经命名策略转换为线上名称查找；
    ///   - 结果（含 `None`）写入缓存，并发填充时先写者胜。
    pub fn field_for<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<FieldHandle> {
        match key.into() {
            KeyRef::Field(handle) if *handle.descriptor().parent_message() == self.descriptor => {
                self.handle_for(handle.descriptor()).cloned()
            }
            KeyRef::Field(handle) => self.lookup(handle.key()),
            KeyRef::Name(name) => self.lookup(name),
        }
    }

    fn lookup(&self, name: &str) -> Option<FieldHandle> {
        if let Some(&index) = self.by_key.get(name) {
            return Some(self.fields[index].clone());
        }
        if let Some(hit) = self.lookups.get(name) {
            return hit.value().clone();
        }

        let wire_name = self.options.naming().wire_name(name);
        let resolved = self
            .descriptor
            .get_field_by_name(&wire_name)
            .and_then(|field| self.handle_for(&field).cloned());
        if resolved.is_none() {
            trace!(schema = %self.full_name(), key = name, "caching negative field lookup");
        }

        self.lookups
            .entry(Key::new(name))
            .or_insert(resolved)
            .value()
            .clone()
    }

    /// 按描述符取本类型的字段句柄。
    pub(crate) fn handle_for(&self, field: &FieldDescriptor) -> Option<&FieldHandle> {
        self.by_number
            .get(&field.number())
            .map(|&index| &self.fields[index])
            .filter(|handle| handle.descriptor() == field)
    }

    /// 全部字段句柄，按声明顺序。
    #[inline]
    pub fn fields(&self) -> &[FieldHandle] {
        &self.fields
    }

    #[inline]
    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    #[inline]
    pub fn options(&self) -> &DefOptions {
        &self.options
    }

    #[inline]
    pub fn naming(&self) -> &Naming {
        self.options.naming()
    }

    #[inline]
    pub fn size_limit(&self) -> usize {
        self.options.size_limit()
    }

    /// 空消息；空记录共享这一实例。
    #[inline]
    pub fn empty_message(&self) -> &DynamicMessage {
        &self.empty
    }

    pub(crate) fn empty_arc(&self) -> Arc<DynamicMessage> {
        Arc::clone(&self.empty)
    }

    /// 全新的可变消息，供构建新记录使用。
    pub fn new_builder(&self) -> DynamicMessage {
        DynamicMessage::new(self.descriptor.clone())
    }

    /// 解析完整的消息字节。
    ///
    /// - **契约 (What)**：超过大小上限返回 `MessageTooLarge`，不进入解码；格式错误返回 `Decode`。
    pub fn parse(&self, bytes: &[u8]) -> Result<DynamicMessage> {
        if bytes.len() > self.size_limit() {
            return Err(self.too_large(bytes.len()));
        }
        DynamicMessage::decode(self.descriptor.clone(), bytes)
            .map_err(|source| self.decode_error(source))
    }

    /// 从流中读取一条长度前缀消息。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：
    ///   - 在第一个前缀字节之前遇到流结束：`Ok(None)`，表示干净结束；
    ///   - 在前缀或负载中途结束：`Truncated`；
    ///   - 前缀声明的长度超过上限：`MessageTooLarge`，负载不会被读取。
    /// - **执行 (How)**：逐字节读取 varint 前缀，避免越过当前消息的边界多读。
    pub fn parse_delimited<R: Read>(&self, reader: &mut R) -> Result<Option<DynamicMessage>> {
        let mut prefix = [0u8; 10];
        let mut len = 0;
        loop {
            let mut byte = [0u8; 1];
            match reader.read(&mut byte) {
                Ok(0) if len == 0 => return Ok(None),
                Ok(0) => return Err(self.truncated()),
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
            prefix[len] = byte[0];
            len += 1;
            if byte[0] & 0x80 == 0 || len == prefix.len() {
                break;
            }
        }

        let size = prost::decode_length_delimiter(&prefix[..len])
            .map_err(|source| self.decode_error(source))?;
        if size > self.size_limit() {
            return Err(self.too_large(size));
        }

        let mut payload = Vec::with_capacity(size);
        reader.by_ref().take(size as u64).read_to_end(&mut payload)?;
        if payload.len() < size {
            return Err(self.truncated());
        }

        DynamicMessage::decode(self.descriptor.clone(), payload.as_slice())
            .map(Some)
            .map_err(|source| self.decode_error(source))
    }

    /// 字段的默认逻辑值。
    ///
    /// - **契约 (What)**：无法解析的键返回 `None`；单值字段取 Schema 默认值并经行为转换；
    ///   repeated 字段得到空集合（`counter`/`succession` 为 `Null`）；单值消息字段得到空记录。
    pub fn default_value<'k>(&self, key: impl Into<KeyRef<'k>>) -> Option<Value> {
        let field = self.field_for(key)?;
        let wire = WireValue::default_value_for_field(&field.descriptor());
        Some(codec::decode_field(self, &field, &wire, true))
    }

    /// 同一配置下嵌套消息类型的定义。
    pub(crate) fn nested(&self, descriptor: &MessageDescriptor) -> Arc<SchemaDef> {
        self.registry()
            .def_for(descriptor, &self.options)
            .expect("nested definitions are built and validated together with their parent")
    }

    /// 定义所属的注册表；隔离注册表已释放时退回进程级注册表。
    pub(crate) fn registry(&self) -> Arc<SchemaRegistry> {
        self.registry.upgrade().unwrap_or_else(SchemaRegistry::global)
    }

    pub(crate) fn decode_error(&self, source: prost::DecodeError) -> ProtoMapError {
        ProtoMapError::Decode {
            message: self.full_name().to_owned(),
            source,
        }
    }

    fn too_large(&self, size: usize) -> ProtoMapError {
        ProtoMapError::MessageTooLarge {
            message: self.full_name().to_owned(),
            size,
            limit: self.size_limit(),
        }
    }

    fn truncated(&self) -> ProtoMapError {
        ProtoMapError::Truncated {
            message: self.full_name().to_owned(),
        }
    }
}

impl fmt::Debug for SchemaDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDef")
            .field("message", &self.full_name())
            .field("naming", self.naming())
            .field("size_limit", &self.size_limit())
            .field("fields", &self.fields.len())
            .finish()
    }
}

fn enum_keys(
    registry: &SchemaRegistry,
    naming: &Naming,
    field: &FieldDescriptor,
) -> Option<EnumKeys> {
    let Kind::Enum(enumeration) = field.kind() else {
        return None;
    };
    let mut keys = EnumKeys::default();
    for value in enumeration.values() {
        keys.insert(value.number(), registry.intern(naming, value.name()));
    }
    Some(keys)
}
