//! 记录视图的性质测试。
//!
//! # 教案级说明
//! - **核心目标 (Why)**：对随机生成的记录验证三条与具体取值无关的性质：
//!   1. 字节往返后结构相等；
//!   2. `dissoc` 幂等，且不影响其它键；
//!   3. 计数器读出的值等于写入元素的和。
//! - **生成策略 (How)**：字符串限定为短小写字母，数值限定在 `i32` 范围内，
//!   保证生成的值都能无损写入 `people.Person`；每种字段行为（映射、map-by、集合、计数器、
//!   接替、可空、枚举、嵌套消息）都有对应的生成器。

mod support;

use proptest::prelude::*;
use spark_protomap::{Key, OrderedMap, OrderedSet, RecordView, Value};
use support::person;

#[derive(Debug, Clone)]
struct PersonInput {
    id: i32,
    name: Option<String>,
    nickname: Option<Option<String>>,
    gender: Option<&'static str>,
    age: Option<Option<i32>>,
    likes: Vec<String>,
    attrs: Vec<(String, String)>,
    visits: Vec<i32>,
    labels: Vec<String>,
    status: Vec<String>,
    friends: Vec<(String, Option<String>, Option<i32>)>,
    scores: Vec<(String, i64)>,
    address: Option<(Option<String>, Option<i32>)>,
    mood: Option<String>,
}

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn person_input() -> impl Strategy<Value = PersonInput> {
    let scalars = (
        any::<i32>(),
        proptest::option::of(word()),
        proptest::option::of(proptest::option::of(word())),
        proptest::option::of(prop::sample::select(vec!["male", "female", "undisclosed"])),
        proptest::option::of(proptest::option::of(0..120i32)),
        proptest::option::of((
            proptest::option::of(word()),
            proptest::option::of(10000..99999i32),
        )),
        proptest::option::of(word()),
    );
    let repeated = (
        proptest::collection::vec(word(), 0..4),
        proptest::collection::vec((word(), word()), 0..4),
        proptest::collection::vec(-1000..1000i32, 0..6),
        proptest::collection::vec(word(), 0..4),
        proptest::collection::vec(word(), 0..3),
        proptest::collection::vec(
            (
                word(),
                proptest::option::of(word()),
                proptest::option::of(0..2000i32),
            ),
            0..4,
        ),
        proptest::collection::vec((word(), any::<i64>()), 0..4),
    );
    (scalars, repeated).prop_map(
        |(
            (id, name, nickname, gender, age, address, mood),
            (likes, attrs, visits, labels, status, friends, scores),
        )| PersonInput {
            id,
            name,
            nickname,
            gender,
            age,
            likes,
            attrs,
            visits,
            labels,
            status,
            friends,
            scores,
            address,
            mood,
        },
    )
}

fn words(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| s.as_str().into()).collect())
}

fn build(input: &PersonInput) -> RecordView {
    let friends: OrderedMap = input
        .friends
        .iter()
        .map(|(name, note, since)| {
            let mut friend = OrderedMap::new();
            if let Some(note) = note {
                friend.insert("note", note.as_str());
            }
            if let Some(since) = since {
                friend.insert("since", *since);
            }
            (name.as_str(), Value::Map(friend))
        })
        .collect();

    let mut entries: Vec<(&str, Value)> = vec![
        ("id", input.id.into()),
        ("likes", words(&input.likes)),
        (
            "attrs",
            Value::Map(
                input
                    .attrs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect::<OrderedMap>(),
            ),
        ),
        (
            "visits",
            Value::List(input.visits.iter().copied().map(Value::from).collect()),
        ),
        (
            "labels",
            Value::Set(input.labels.iter().map(String::as_str).collect::<OrderedSet>()),
        ),
        ("status", words(&input.status)),
        ("friends", Value::Map(friends)),
        (
            "scores",
            Value::Map(
                input
                    .scores
                    .iter()
                    .map(|(k, v)| (k.as_str(), *v))
                    .collect::<OrderedMap>(),
            ),
        ),
    ];
    if let Some(name) = &input.name {
        entries.push(("name", name.as_str().into()));
    }
    if let Some(nickname) = &input.nickname {
        entries.push(("nickname", nickname.as_deref().into()));
    }
    if let Some(gender) = input.gender {
        entries.push(("gender", Value::Enum(Key::new(gender))));
    }
    if let Some(age) = input.age {
        entries.push(("age", age.into()));
    }
    if let Some((city, zip)) = &input.address {
        let mut address = OrderedMap::new();
        if let Some(city) = city {
            address.insert("city", city.as_str());
        }
        if let Some(zip) = zip {
            address.insert("zip", *zip);
        }
        entries.push(("address", Value::Map(address)));
    }
    RecordView::from_entries(person(), entries).expect("generated values fit the schema")
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_bytes_round_trip_is_structurally_equal(input in person_input()) {
        let record = build(&input);
        let parsed = RecordView::from_bytes(person(), &record.to_bytes()).unwrap();
        prop_assert_eq!(&parsed, &record);

        let mut framed = std::io::Cursor::new(record.to_delimited_bytes());
        let streamed = RecordView::from_delimited(person(), &mut framed).unwrap();
        prop_assert_eq!(streamed.as_ref(), Some(&record));
    }

    #[test]
    fn prop_dissoc_is_idempotent(input in person_input(), key in prop::sample::select(vec![
        "name", "nickname", "gender", "age", "likes", "attrs", "visits", "labels", "status",
        "friends", "scores", "address", "mood", "unknown",
    ])) {
        let mut record = build(&input);
        if let Some(mood) = &input.mood {
            record = record.assoc("mood", mood.as_str()).unwrap();
        }

        let once = record.dissoc(key).unwrap();
        let twice = once.dissoc(key).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.contains_key(key));
        prop_assert_eq!(once.get("id"), record.get("id"));

        for (other, value) in record.entries() {
            if other.as_str() != key {
                prop_assert_eq!(once.get(&other), Some(value));
            }
        }
    }

    #[test]
    fn prop_counter_reads_the_sum(visits in proptest::collection::vec(-1000..1000i32, 1..16)) {
        let record = RecordView::empty(person())
            .assoc("id", 1)
            .and_then(|r| r.assoc("visits", Value::List(visits.iter().copied().map(Value::from).collect())))
            .unwrap();
        let expected: i64 = visits.iter().copied().map(i64::from).sum();
        prop_assert_eq!(record.get("visits"), Some(Value::Int(expected)));
    }
}
