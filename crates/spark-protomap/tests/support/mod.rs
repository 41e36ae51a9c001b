//! 集成测试共享夹具。
//!
//! - **意图 (Why)**：测试直接编译 `tests/fixtures/people.proto`（连同 `proto/protomap/extensions.proto`），
//!   不依赖构建脚本或预生成的描述符集合；
//! - **契约 (What)**：描述符池只编译一次；`def` 使用进程级注册表，需要隔离的测试自行调用
//!   [`SchemaRegistry::new`]。
#![allow(dead_code)]

use std::sync::{Arc, LazyLock};

use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value as WireValue};
use spark_protomap::{DefOptions, SchemaDef, SchemaError, SchemaRegistry};

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    let root = env!("CARGO_MANIFEST_DIR");
    let mut compiler = protox::Compiler::new([
        format!("{root}/tests/fixtures"),
        format!("{root}/proto"),
    ])
    .expect("fixture include paths exist");
    compiler
        .open_files(["people.proto"])
        .expect("people.proto compiles");
    compiler.descriptor_pool()
});

pub fn pool() -> &'static DescriptorPool {
    &POOL
}

pub fn message(name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(&format!("people.{name}"))
        .unwrap_or_else(|| panic!("people.{name} is declared in the fixture"))
}

pub fn try_def(name: &str) -> Result<Arc<SchemaDef>, SchemaError> {
    SchemaRegistry::global().def_for(&message(name), &DefOptions::default())
}

pub fn def(name: &str) -> Arc<SchemaDef> {
    try_def(name).expect("fixture schema is valid")
}

pub fn person() -> Arc<SchemaDef> {
    def("Person")
}

/// 按字段名构造线上子消息，用于模拟“同一键出现多次”的事件流。
pub fn wire_message(name: &str, fields: &[(&str, WireValue)]) -> DynamicMessage {
    let mut message = DynamicMessage::new(message(name));
    for (field, value) in fields {
        message.set_field_by_name(field, value.clone());
    }
    message
}

/// 带 required `id` 的 `Person`，其 repeated 字段 `field` 由给定元素组成。
pub fn person_with(field: &str, items: Vec<WireValue>) -> DynamicMessage {
    wire_message(
        "Person",
        &[("id", WireValue::I32(1)), (field, WireValue::List(items))],
    )
}

pub fn s(text: &str) -> WireValue {
    WireValue::String(text.to_owned())
}
