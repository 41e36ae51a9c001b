//! # naming 模块说明
//!
//! ## 角色定位（Why）
//! - 记录对外暴露的键（`Key`）与 `.proto` 中的字段名/枚举值名之间需要一层可插拔映射：
//!   有的调用方直接沿用 Protobuf 命名，有的习惯连字符风格（`first-name` ↔ `first_name`）。
//! - 定义缓存以（消息类型, 命名策略）为键进行记忆化，因此策略必须是纯函数，且身份稳定。
//!
//! ## 契约（What）
//! - [`NamingStrategy::id`] 即策略身份：两个 `id` 相同的策略被视为同一策略，必须产生相同映射；
//! - [`Naming`] 是策略的共享句柄，`Eq`/`Hash` 仅比较 `id`，可直接用作缓存键的一部分。

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use crate::value::Key;

/// 逻辑键与线上名称之间的双向映射。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `wire_name`：逻辑键 → `.proto` 字段名或枚举值名；
///   - `logical_key`：线上名称 → 逻辑键；
///   - 两个方向都必须是确定性的纯函数，同一输入永远得到同一输出。
/// - **风险 (Trade-offs)**：策略结果会被注册表永久缓存，非确定性实现会导致缓存与实际映射不一致。
pub trait NamingStrategy: Send + Sync + 'static {
    /// 策略身份，参与定义缓存的键。
    fn id(&self) -> &'static str;

    fn wire_name(&self, key: &str) -> String;

    fn logical_key(&self, wire_name: &str) -> Key;
}

/// 直接使用 Protobuf 名称，逻辑键统一小写。
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtobufNames;

impl NamingStrategy for ProtobufNames {
    fn id(&self) -> &'static str {
        "protobuf-names"
    }

    fn wire_name(&self, key: &str) -> String {
        key.to_owned()
    }

    fn logical_key(&self, wire_name: &str) -> Key {
        Key::from(wire_name.to_lowercase())
    }
}

/// 线上使用下划线、逻辑键使用连字符。
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertUnderscores;

impl NamingStrategy for ConvertUnderscores {
    fn id(&self) -> &'static str {
        "convert-underscores"
    }

    fn wire_name(&self, key: &str) -> String {
        key.replace('-', "_")
    }

    fn logical_key(&self, wire_name: &str) -> Key {
        Key::from(wire_name.replace('_', "-").to_lowercase())
    }
}

static PROTOBUF_NAMES: LazyLock<Naming> = LazyLock::new(|| Naming::custom(ProtobufNames));
static CONVERT_UNDERSCORES: LazyLock<Naming> =
    LazyLock::new(|| Naming::custom(ConvertUnderscores));

/// 命名策略的共享句柄。
///
/// - **契约 (What)**：克隆只复制 `Arc`；相等性与哈希仅基于 [`NamingStrategy::id`]。
#[derive(Clone)]
pub struct Naming(Arc<dyn NamingStrategy>);

impl Naming {
    /// 内置策略：Protobuf 原名。
    pub fn protobuf() -> Self {
        PROTOBUF_NAMES.clone()
    }

    /// 内置策略：下划线 ↔ 连字符。
    pub fn convert_underscores() -> Self {
        CONVERT_UNDERSCORES.clone()
    }

    /// 包装自定义策略。调用方需保证 `id` 不与其它映射不同的策略重复。
    pub fn custom(strategy: impl NamingStrategy) -> Self {
        Self(Arc::new(strategy))
    }

    #[inline]
    pub fn id(&self) -> &'static str {
        self.0.id()
    }

    #[inline]
    pub fn wire_name(&self, key: &str) -> String {
        self.0.wire_name(key)
    }

    #[inline]
    pub fn logical_key(&self, wire_name: &str) -> Key {
        self.0.logical_key(wire_name)
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self::protobuf()
    }
}

impl PartialEq for Naming {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Naming {}

impl Hash for Naming {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Naming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Naming({})", self.id())
    }
}
