//! `serde` 特性下的记录导出。
#![cfg(feature = "serde")]

mod support;

use serde_json::json;
use spark_protomap::{Key, OrderedSet, RecordView, Value};
use support::person;

#[test]
fn records_serialize_as_maps_in_iteration_order() {
    let labels: OrderedSet = ["b", "a"].into_iter().collect();
    let record = RecordView::from_entries(
        person(),
        [
            ("id", Value::from(7)),
            ("name", Value::from("zoe")),
            ("gender", Value::Enum(Key::new("female"))),
            ("labels", Value::Set(labels)),
            ("age", Value::Null),
            ("mood", Value::from("ok")),
        ],
    )
    .unwrap();

    let exported = serde_json::to_value(&record).unwrap();
    assert_eq!(
        exported,
        json!({
            "id": 7,
            "name": "zoe",
            "gender": "female",
            "age": null,
            "labels": ["b", "a"],
            "rank": 7,
            "mood": "ok",
        })
    );

    let text = serde_json::to_string(&record).unwrap();
    let mood = text.find("\"mood\"").unwrap();
    let id = text.find("\"id\"").unwrap();
    assert!(id < mood);
}
