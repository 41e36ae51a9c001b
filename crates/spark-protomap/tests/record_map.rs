//! `RecordView` 的关联值协议：查找、写入、删除、合并、迭代与字节往返。
//!
//! # 教案级说明
//! - **核心目标 (Why)**：记录对调用方表现为一张普通的不可变映射，Schema 之外的键也不会丢失；
//! - **覆盖范围 (What)**：
//!   - 键解析与扩展表（写入、迭代顺序、序列化时丢弃）；
//!   - `assoc_unique` / `dissoc` 的失败语义与原记录不变性；
//!   - `conj` / `append` / `from_value` 的形状约束；
//!   - 完整字节与长度前缀流的往返、大小上限与截断。

mod support;

use std::{io::Cursor, sync::Arc};

use spark_protomap::{
    DefOptions, DelimitedReader, Key, Naming, NamingStrategy, OrderedMap, ProtoMapError,
    RecordView, SchemaRegistry, Value,
};
use support::{message, person, wire_message};

fn alice() -> RecordView {
    RecordView::from_entries(
        person(),
        [
            ("id", Value::from(1)),
            ("name", Value::from("alice")),
            ("likes", Value::List(vec!["tea".into(), "chess".into()])),
        ],
    )
    .expect("alice is a valid person")
}

#[test]
fn assoc_then_get_reads_logical_values() {
    let record = alice();

    assert_eq!(record.get("id"), Some(Value::Int(1)));
    assert_eq!(record.get("name"), Some(Value::from("alice")));
    assert_eq!(
        record.get("likes"),
        Some(Value::List(vec!["tea".into(), "chess".into()]))
    );
    assert_eq!(record.get("nickname"), None);
    assert_eq!(record.get_or("nickname", Value::from("?")), Value::from("?"));
}

#[test]
fn writes_leave_the_original_record_untouched() {
    let original = alice();
    let renamed = original.assoc("name", "bob").unwrap();

    assert_eq!(original.get("name"), Some(Value::from("alice")));
    assert_eq!(renamed.get("name"), Some(Value::from("bob")));
    assert_ne!(original, renamed);
}

#[test]
fn unresolved_keys_go_to_the_extension_map_and_iterate_last() {
    let record = alice().assoc("mood", "cheerful").unwrap();

    assert_eq!(record.get("mood"), Some(Value::from("cheerful")));
    assert!(record.contains_key("mood"));

    let keys: Vec<Key> = record.keys().collect();
    assert_eq!(keys.last().map(Key::as_str), Some("mood"));
    assert_eq!(keys.iter().filter(|key| key.as_str() == "mood").count(), 1);
    assert_eq!(record.len(), keys.len());

    let ext: Vec<_> = record.ext().collect();
    assert_eq!(ext.len(), 1);

    let reparsed = RecordView::from_bytes(person(), &record.to_bytes()).unwrap();
    assert_eq!(reparsed.get("mood"), None);
    assert_eq!(reparsed, alice());
}

#[test]
fn iteration_is_restartable_and_in_declaration_order() {
    let record = alice().assoc("age", 30).unwrap();

    let first: Vec<(Key, Value)> = record.entries().collect();
    let second: Vec<(Key, Value)> = (&record).into_iter().collect();
    assert_eq!(first, second);

    let keys: Vec<&str> = first.iter().map(|(key, _)| key.as_str()).collect();
    // `rank` 声明了默认值，因此在空字段上也算存在。
    assert_eq!(keys, ["id", "name", "age", "likes", "rank"]);
}

#[test]
fn declared_defaults_count_as_present() {
    let record = RecordView::empty(person());

    assert!(record.contains_key("rank"));
    assert_eq!(record.get("rank"), Some(Value::Int(7)));
    assert!(!record.contains_key("name"));
    assert!(!record.contains_key("likes"));
    assert_eq!(record.len(), 1);
    assert!(!record.is_empty());
}

#[test]
fn default_value_follows_field_behavior() {
    let def = person();

    assert_eq!(def.default_value("rank"), Some(Value::Int(7)));
    assert_eq!(def.default_value("likes"), Some(Value::List(Vec::new())));
    assert_eq!(def.default_value("friends"), Some(Value::Map(OrderedMap::new())));
    assert_eq!(def.default_value("visits"), Some(Value::Null));
    assert_eq!(def.default_value("status"), Some(Value::Null));
    let address = def.default_value("address").and_then(Value::into_record);
    assert!(address.is_some_and(|record| record.is_empty()));
    assert_eq!(def.default_value("no-such-field"), None);
}

#[test]
fn assoc_unique_rejects_present_keys() {
    let record = alice();

    let err = record.assoc_unique("name", "bob").unwrap_err();
    assert!(matches!(err, ProtoMapError::KeyAlreadyPresent { ref key } if key == "name"));
    assert_eq!(record.get("name"), Some(Value::from("alice")));

    let with_nickname = record.assoc_unique("nickname", "al").unwrap();
    assert_eq!(with_nickname.get("nickname"), Some(Value::from("al")));

    let with_ext = record.assoc_unique("mood", 1).unwrap();
    assert!(matches!(
        with_ext.assoc_unique("mood", 2),
        Err(ProtoMapError::KeyAlreadyPresent { .. })
    ));
}

#[test]
fn dissoc_refuses_required_fields() {
    let err = alice().dissoc("id").unwrap_err();
    assert!(matches!(
        err,
        ProtoMapError::RequiredField { ref field } if field == "people.Person.id"
    ));
}

#[test]
fn dissoc_removes_fields_and_extension_entries() {
    let record = alice().assoc("mood", "calm").unwrap();

    let without_name = record.dissoc("name").unwrap();
    assert!(!without_name.contains_key("name"));
    assert_eq!(without_name.get("mood"), Some(Value::from("calm")));

    let without_mood = record.dissoc("mood").unwrap();
    assert!(!without_mood.contains_key("mood"));
    assert_eq!(without_mood, alice());

    let untouched = record.dissoc("nickname").unwrap();
    assert_eq!(untouched, record);
    assert_eq!(untouched.dissoc("nickname").unwrap(), untouched);
}

#[test]
fn conj_accepts_pairs_and_maps() {
    let record = RecordView::empty(person());

    let pair = Value::List(vec!["name".into(), "carol".into()]);
    let record = record.conj(&pair).unwrap();
    assert_eq!(record.get("name"), Some(Value::from("carol")));

    let entries: OrderedMap = [
        ("id", Value::from(9)),
        ("status", Value::from(vec![Value::from("new")])),
    ]
    .into_iter()
    .collect();
    let record = record.conj(&Value::Map(entries)).unwrap();
    assert_eq!(record.get("id"), Some(Value::Int(9)));
    assert_eq!(record.get("status"), Some(Value::from("new")));

    assert!(matches!(
        record.conj(&Value::from(3)),
        Err(ProtoMapError::NotAPair { found: "int" })
    ));
    assert!(matches!(
        record.conj(&Value::List(vec![Value::from(1), Value::from("x")])),
        Err(ProtoMapError::InvalidRecordKey { .. })
    ));
}

#[test]
fn from_value_builds_records_from_maps_and_pair_lists() {
    let pairs = Value::List(vec![
        Value::List(vec!["id".into(), 4.into()]),
        Value::List(vec!["name".into(), "dora".into()]),
    ]);
    let record = RecordView::from_value(person(), &pairs).unwrap();
    assert_eq!(record.get("name"), Some(Value::from("dora")));

    let shared = RecordView::from_value(person(), &Value::Record(record.clone())).unwrap();
    assert!(std::ptr::eq(shared.message(), record.message()));

    let bad = Value::List(vec![Value::from("id")]);
    assert!(matches!(
        RecordView::from_value(person(), &bad),
        Err(ProtoMapError::NotAPair { .. })
    ));
}

#[test]
fn type_mismatch_keeps_the_record_unchanged() {
    let record = alice();

    let err = record.assoc("id", "not a number").unwrap_err();
    assert!(matches!(
        err,
        ProtoMapError::TypeMismatch { ref field, found: "string", .. } if field == "people.Person.id"
    ));
    assert_eq!(record.get("id"), Some(Value::Int(1)));
}

#[test]
fn append_overlays_scalars_and_concatenates_repeated_fields() {
    let left = alice()
        .assoc("mood", "calm")
        .and_then(|record| record.assoc("age", 30))
        .unwrap();
    let right = RecordView::from_entries(
        person(),
        [
            ("id", Value::from(1)),
            ("name", Value::from("alicia")),
            ("likes", Value::List(vec!["go".into()])),
            ("mood", Value::from("busy")),
        ],
    )
    .unwrap();

    let merged = left.append(&right).unwrap();
    assert_eq!(merged.get("name"), Some(Value::from("alicia")));
    assert_eq!(merged.get("age"), Some(Value::Int(30)));
    assert_eq!(
        merged.get("likes"),
        Some(Value::List(vec!["tea".into(), "chess".into(), "go".into()]))
    );
    assert_eq!(merged.get("mood"), Some(Value::from("busy")));

    let address = RecordView::empty(support::def("Address"));
    assert!(matches!(
        left.append(&address),
        Err(ProtoMapError::SchemaMismatch { .. })
    ));
}

#[test]
fn nested_messages_are_written_from_maps_and_read_as_records() {
    let address: OrderedMap = [("city", "Paris"), ("street", "Rue Oberkampf")]
        .into_iter()
        .collect();
    let record = alice().assoc("address", Value::Map(address)).unwrap();

    let nested = record.get("address").and_then(Value::into_record).unwrap();
    assert_eq!(nested.schema().full_name(), "people.Address");
    assert_eq!(nested.get("city"), Some(Value::from("Paris")));

    let moved = record
        .assoc("address", Value::Record(nested.assoc("city", "Lyon").unwrap()))
        .unwrap();
    let city = moved
        .get("address")
        .and_then(Value::into_record)
        .and_then(|address| address.get("city"));
    assert_eq!(city, Some(Value::from("Lyon")));

    let wrong_type = Value::Record(RecordView::empty(support::def("Attr")));
    assert!(matches!(
        record.assoc("address", wrong_type),
        Err(ProtoMapError::SchemaMismatch { .. })
    ));
}

#[test]
fn field_handles_resolve_without_name_lookup() {
    let def = person();
    let name = def.field_for("name").unwrap();

    assert_eq!(def.field_for(&name), Some(name.clone()));
    assert_eq!(alice().get(&name), Some(Value::from("alice")));
    assert!(def.field_for("nope").is_none());
    assert!(def.field_for("nope").is_none());
}

#[test]
fn convert_underscores_naming_uses_hyphenated_keys() {
    let options = DefOptions::default().with_naming(Naming::convert_underscores());
    let def = SchemaRegistry::global()
        .def_for(&message("Person"), &options)
        .unwrap();

    let record = RecordView::empty(def)
        .assoc("id", 3)
        .unwrap()
        .assoc("first-name", "Ada")
        .unwrap();

    assert_eq!(record.get("first-name"), Some(Value::from("Ada")));
    assert!(record.keys().any(|key| key.as_str() == "first-name"));
    assert_eq!(
        record.message().get_field_by_name("first_name").as_deref(),
        Some(&prost_reflect::Value::String("Ada".to_owned()))
    );
}

/// 逻辑键全部大写的命名策略，枚举标识符因此与默认策略不同。
struct UpperNames;

impl NamingStrategy for UpperNames {
    fn id(&self) -> &'static str {
        "upper-names"
    }

    fn wire_name(&self, key: &str) -> String {
        key.to_lowercase()
    }

    fn logical_key(&self, wire_name: &str) -> Key {
        Key::from(wire_name.to_uppercase())
    }
}

#[test]
fn handles_from_another_naming_decode_with_the_records_own_naming() {
    let options = DefOptions::default().with_naming(Naming::custom(UpperNames));
    let upper = SchemaRegistry::global()
        .def_for(&message("Person"), &options)
        .unwrap();
    let gender = person().field_for("gender").unwrap();

    let own = upper.field_for(&gender).unwrap();
    assert_eq!(own.key().as_str(), "GENDER");

    let wire = wire_message(
        "Person",
        &[
            ("id", prost_reflect::Value::I32(1)),
            ("gender", prost_reflect::Value::EnumNumber(1)),
        ],
    );
    let record = RecordView::from_message(upper, wire).unwrap();
    assert_eq!(record.get(&gender), Some(Value::Enum(Key::new("FEMALE"))));
    assert_eq!(record.get("GENDER"), Some(Value::Enum(Key::new("FEMALE"))));
}

#[test]
fn to_map_uses_string_keys() {
    let map = alice().to_map();
    assert_eq!(map.get_str("name"), Some(&Value::from("alice")));
    assert_eq!(map.get(&Value::from("id")), Some(&Value::Int(1)));
}

#[test]
fn clear_drops_fields_and_extension_entries() {
    let cleared = alice().assoc("mood", "calm").unwrap().clear();
    assert_eq!(cleared, RecordView::empty(person()));
    assert_eq!(cleared.ext().count(), 0);
}

#[test]
fn bytes_round_trip_preserves_structure() {
    let scores: OrderedMap = [("go", 3)].into_iter().collect();
    let record = alice().assoc("scores", Value::Map(scores)).unwrap();
    let bytes = record.to_bytes();

    let parsed = RecordView::from_bytes(person(), &bytes).unwrap();
    assert_eq!(parsed, record);

    let mut written = Vec::new();
    record.write_to(&mut written).unwrap();
    assert_eq!(written, bytes);

    assert!(matches!(
        RecordView::from_bytes(person(), &[0xff, 0xff, 0xff]),
        Err(ProtoMapError::Decode { .. })
    ));
}

#[test]
fn size_limit_rejects_oversized_payloads_before_decoding() {
    let options = DefOptions::default().with_size_limit(8);
    let def = SchemaRegistry::new()
        .def_for(&message("Person"), &options)
        .unwrap();
    let bytes = alice().to_bytes();
    assert!(bytes.len() > 8);

    let err = RecordView::from_bytes(Arc::clone(&def), &bytes).unwrap_err();
    assert!(matches!(err, ProtoMapError::MessageTooLarge { limit: 8, .. }));

    let framed = alice().to_delimited_bytes();
    let err = RecordView::from_delimited(def, &mut Cursor::new(framed)).unwrap_err();
    assert!(matches!(err, ProtoMapError::MessageTooLarge { .. }));
}

#[test]
fn delimited_stream_yields_each_record_then_ends() {
    let records: Vec<RecordView> = (1..=3)
        .map(|id| alice().assoc("id", id).unwrap())
        .collect();

    let mut stream = Vec::new();
    for record in &records {
        record.write_delimited_to(&mut stream).unwrap();
    }

    let read: Vec<RecordView> = DelimitedReader::new(person(), Cursor::new(stream.clone()))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(read, records);

    stream.pop();
    let mut reader = DelimitedReader::new(person(), Cursor::new(stream));
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(
        reader.next(),
        Some(Err(ProtoMapError::Truncated { .. }))
    ));
    assert!(reader.next().is_none());
}

#[test]
fn empty_stream_ends_cleanly() {
    let mut empty = Cursor::new(Vec::<u8>::new());
    assert!(RecordView::from_delimited(person(), &mut empty).unwrap().is_none());
}
