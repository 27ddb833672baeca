use domain::{CacheContent, CacheEntry, ContentType, TimeValue, TimeValueData};
use std::path::PathBuf;

#[test]
fn cache_entry_reports_content_type() {
    let values = CacheEntry {
        seq: 1,
        source_id: "south-1".to_string(),
        created_at_ms: 1000,
        size_bytes: 10,
        content: CacheContent::TimeValues {
            values: vec![TimeValue::new("p1", 1000, TimeValueData::F64(1.5))],
        },
    };
    let file = CacheEntry {
        seq: 2,
        source_id: "south-1".to_string(),
        created_at_ms: 1000,
        size_bytes: 10,
        content: CacheContent::Raw {
            path: PathBuf::from("/tmp/a.csv"),
        },
    };

    assert_eq!(values.content_type(), ContentType::TimeValues);
    assert_eq!(values.value_count(), 1);
    assert!(!values.is_file());
    assert_eq!(file.content_type().as_str(), "raw");
    assert!(file.is_file());
    assert_eq!(file.content.file_path(), Some(PathBuf::from("/tmp/a.csv").as_path()));
}

#[test]
fn time_value_json_is_untagged() {
    let value = TimeValue::new("p1", 1000, TimeValueData::I64(42));
    let json = serde_json::to_string(&value).expect("json");
    assert_eq!(json, r#"{"pointId":"p1","tsMs":1000,"value":42}"#);

    let parsed: TimeValue = serde_json::from_str(r#"{"pointId":"p2","tsMs":5,"value":"on","quality":"good"}"#)
        .expect("parsed");
    assert_eq!(parsed.value, TimeValueData::String("on".to_string()));
    assert_eq!(parsed.quality.as_deref(), Some("good"));
}

#[test]
fn cache_content_round_trips_through_store_format() {
    let content = CacheContent::Raw {
        path: PathBuf::from("files/a-1.csv"),
    };
    let json = serde_json::to_string(&content).expect("json");
    assert!(json.contains(r#""type":"raw""#));
    let back: CacheContent = serde_json::from_str(&json).expect("back");
    assert_eq!(back, content);
}
