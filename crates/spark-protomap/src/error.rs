//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两类失败：Schema 作者在注解上犯的错误（[`SchemaError`]，在定义构建期一次性暴露），
//!   与单次调用的失败（[`ProtoMapError`]，只影响当前调用，原记录保持不变）；
//! - 未能解析到字段的键不是错误：写入时落入扩展表，读取时表现为“不存在”，因此这里没有对应变体；
//! - 枚举名/编号与 Schema 不匹配属于可恢复诊断，通过 `tracing::warn!` 上报而非返回错误。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接用 `?` 传播；
//! - 变体携带字段全名等上下文，便于定位 Schema 偏差。

use std::io;

use thiserror::Error;

/// 定义构建期发现的 Schema 注解错误。
///
/// # 教案式说明
/// - **意图 (Why)**：多个互斥注解、缺失子字段等问题若延迟到读写时才暴露，会让错误与调用点脱节；
///   因此在 `SchemaDef` 构建时整体校验，可达的嵌套类型一并校验。
/// - **契约 (What)**：`field` 均为字段全名（`package.Message.field`），便于直接回查 `.proto`。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SchemaError {
    /// 同一字段同时声明了多个互斥行为。
    #[error("field `{field}` declares conflicting behaviors: {}", .behaviors.join(", "))]
    ConflictingBehaviors {
        field: String,
        behaviors: Vec<&'static str>,
    },

    /// 行为注解出现在非 repeated 字段上。
    #[error("field `{field}` uses `{behavior}` but is not a repeated field")]
    NotRepeated {
        field: String,
        behavior: &'static str,
    },

    /// 行为要求元素为消息类型。
    #[error("field `{field}` uses `{behavior}` but its elements are not messages")]
    NotMessage {
        field: String,
        behavior: &'static str,
    },

    /// 元素消息缺失行为所需的子字段（例如 `map` 的 `key`/`val`）。
    #[error("field `{field}` uses `{behavior}` but element type `{element}` has no `{sub_field}` field")]
    MissingSubField {
        field: String,
        behavior: &'static str,
        element: String,
        sub_field: String,
    },

    /// 子字段存在但类型不符合要求（例如 `exists` 不是 bool）。
    #[error("field `{field}`: sub-field `{sub_field}` of `{element}` must be {expected}")]
    SubFieldKind {
        field: String,
        element: String,
        sub_field: String,
        expected: &'static str,
    },

    /// `counter` 只能用于数值字段。
    #[error("field `{field}` uses `counter` but its kind `{kind}` is not numeric")]
    CounterNotNumeric { field: String, kind: String },

    /// 当前类型不存在可用的 null 哨兵。
    #[error("field `{field}` is `nullable` but kind `{kind}` has no null sentinel")]
    UnsupportedNullable { field: String, kind: String },
}

/// 单次读写调用的失败。
///
/// # 教案式说明
/// - **意图 (Why)**：调用失败时原 `RecordView` 不受影响，错误只描述“这次为什么不行”；
/// - **契约 (What)**：
///   - 解码类（`Decode`/`MessageTooLarge`/`Truncated`/`Io`）不会返回半成品记录；
///   - 结构误用类（`NotAPair`/`TypeMismatch`/`InvalidRecordKey`/`RequiredField`）在任何构建器修改前给出；
///   - `KeyAlreadyPresent` 只由 `assoc_unique` 产生，用于区分“插入”与“更新”。
#[derive(Debug, Error)]
pub enum ProtoMapError {
    /// 字节无法解析为目标消息。
    #[error("failed to decode `{message}`: {source}")]
    Decode {
        message: String,
        #[source]
        source: prost::DecodeError,
    },

    /// 负载超过定义上配置的消息大小上限。
    #[error("`{message}` payload of {size} bytes exceeds the size limit of {limit} bytes")]
    MessageTooLarge {
        message: String,
        size: usize,
        limit: usize,
    },

    /// 长度前缀或负载在流中途结束。
    #[error("stream ended inside a length-delimited `{message}`")]
    Truncated { message: String },

    /// 底层读写失败。
    #[error(transparent)]
    Io(#[from] io::Error),

    /// `assoc_unique` 发现键已存在。
    #[error("key `{key}` already present")]
    KeyAlreadyPresent { key: String },

    /// 试图移除 required 字段。
    #[error("can't remove required field `{field}`")]
    RequiredField { field: String },

    /// 需要键值对的位置收到了其它形状的值。
    #[error("expected a key/value pair, got {found}")]
    NotAPair { found: &'static str },

    /// 逻辑值无法编码为字段的线上类型。
    #[error("can't encode {found} into {expected} field `{field}`")]
    TypeMismatch {
        field: String,
        expected: String,
        found: &'static str,
    },

    /// 作为记录使用的逻辑映射中出现了无法充当字段键的键。
    #[error("record key must be a string or keyword, got {found}")]
    InvalidRecordKey { found: &'static str },

    /// 线上消息类型与定义不一致。
    #[error("expected a `{expected}` message, got `{found}`")]
    SchemaMismatch { expected: String, found: String },

    /// 定义构建失败。
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// crate 内统一的结果别名。
pub type Result<T, E = ProtoMapError> = std::result::Result<T, E>;
