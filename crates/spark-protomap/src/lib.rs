#![deny(unsafe_code)]

//! # spark-protomap
//!
//! ## 定位与职责（Why）
//! - 以描述符反射把任意 Protobuf 消息呈现为关联值（[`RecordView`]），无需为每个消息生成代码；
//! - 在普通 repeated 字段之上叠加由字段选项声明的语义：有序映射（`map_by` / `map`）、
//!   有序集合（`set`，支持墓碑）、计数器（`counter`）、后继（`succession`）与可空哨兵（`nullable`）；
//! - 线上编码本身交给 `prost` / `prost-reflect`，本 crate 只负责语义叠加层。
//!
//! ## 架构嵌入（Where）
//! - `naming`：逻辑键与线上名称的双向映射策略；
//! - `schema`：每个（消息类型, 配置）一份的不可变定义与进程级注册表；
//! - `codec`：线上值 ⇄ 逻辑值的转换与合并规则（crate 内部）；
//! - `record`：对外的记录视图、迭代器与分帧读取；
//! - `value`：逻辑值模型（有序映射、有序集合、枚举标识符等）；
//! - `error`：`thiserror` 风格的错误类型。
//!
//! ## 使用方式（How）
//! ```ignore
//! let pool = /* 含 protomap/extensions.proto 的 DescriptorPool */;
//! let person = pool.get_message_by_name("people.Person").unwrap();
//! let def = SchemaRegistry::global().def_for(&person, &DefOptions::default())?;
//! let record = RecordView::empty(def).assoc("name", "alice")?.assoc("nickname", "al")?;
//! assert_eq!(record.get("name"), Some(Value::from("alice")));
//! ```
//!
//! ## Feature 策略（Trade-offs）
//! - `serde` 特性为逻辑值与记录提供 `Serialize`，用于审计导出与调试快照；默认关闭以保持依赖面最小。

mod codec;

/// 构建期配置。
///
/// - **契约定位 (What)**：[`DefOptions`] 整体参与定义缓存键；
/// - **默认值**：Protobuf 原名 + 64 MiB 大小上限。
pub mod config;

/// 错误类型集中声明处。
///
/// - **意图说明 (Why)**：区分 Schema 作者错误与单次调用失败，便于上层决定是修复 `.proto` 还是处理输入；
/// - **风险提示 (Trade-offs)**：枚举不匹配不在此列，它以 `tracing::warn!` 上报后继续。
pub mod error;

/// 命名策略。
pub mod naming;

/// 记录视图与分帧读取。
pub mod record;

/// 消息定义、字段句柄与注册表。
///
/// - **意图说明 (Why)**：把注解解析与键解析的成本摊到一次构建中，并以注册表显式管理其生命周期；
/// - **扩展指引 (How)**：测试可用 [`SchemaRegistry::new`] 获得隔离实例。
pub mod schema;

/// 逻辑值模型。
pub mod value;

#[cfg(feature = "serde")]
mod serde_impl;

pub use config::{DEFAULT_SIZE_LIMIT, DefOptions};
pub use error::{ProtoMapError, Result, SchemaError};
pub use naming::{ConvertUnderscores, Naming, NamingStrategy, ProtobufNames};
pub use record::{DelimitedReader, Entries, Keys, RecordView};
pub use schema::{
    FieldBehavior, FieldDef, FieldHandle, KeyRef, MergeMarkers, SchemaDef, SchemaRegistry,
};
pub use value::{Key, OrderedMap, OrderedSet, Value};

/// `protomap/extensions.proto` 的源码，供调用方在编译自己的 Schema 时一并加载。
pub const EXTENSIONS_PROTO: &str = include_str!("../proto/protomap/extensions.proto");
