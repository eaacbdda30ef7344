use std::collections::HashMap;

use serde_json::json;

use eventsql::eventsql::sql::context::EvalContext;
use eventsql::eventsql::sql::execution::evaluator::EvalInput;
use eventsql::eventsql::sql::execution::project::ProjectOperator;
use eventsql::eventsql::sql::execution::types::{FieldValue, JoinTuple, Tuple};
use eventsql::eventsql::sql::parser::EventSqlParser;

fn tuple(emitter: &str, message: &str) -> Tuple {
    let payload = match FieldValue::from_json_str(message).unwrap() {
        FieldValue::Map(m) => m,
        other => panic!("message must be a JSON object, got {:?}", other),
    };
    Tuple::new(emitter).with_message(payload)
}

fn with_meta(mut t: Tuple, metadata: &str) -> Tuple {
    let meta = match FieldValue::from_json_str(metadata).unwrap() {
        FieldValue::Map(m) => m,
        other => panic!("metadata must be a JSON object, got {:?}", other),
    };
    t.metadata = meta;
    t
}

fn project(sql: &str, input: EvalInput) -> serde_json::Value {
    let stmt = EventSqlParser::new().parse(sql).unwrap();
    let op = ProjectOperator::from_statement(&stmt);
    let bytes = op.apply_json(&EvalContext::new("test"), input).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn project_err(sql: &str, input: EvalInput) -> String {
    let stmt = EventSqlParser::new().parse(sql).unwrap();
    let op = ProjectOperator::from_statement(&stmt);
    op.apply_json(&EvalContext::new("test"), input)
        .unwrap_err()
        .to_string()
}

#[test]
fn test_md5_projection() {
    let data = tuple(
        "test",
        r#"{"a": "The quick brown fox jumps over the lazy dog", "b": "myb", "c": "myc"}"#,
    );
    assert_eq!(
        project("SELECT md5(a) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "9e107d9d372bb6826bd81d3542a419d6"}])
    );

    // a missing input column projects nothing at all
    assert_eq!(
        project("SELECT md5(d) AS a FROM test", EvalInput::Single(&data)),
        json!([{}])
    );
}

#[test]
fn test_sha_family_projection() {
    let data = tuple(
        "test",
        r#"{"a": "The quick brown fox jumps over the lazy dog"}"#,
    );
    assert_eq!(
        project("SELECT sha1(a) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"}])
    );
    assert_eq!(
        project("SELECT sha256(a) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592"}])
    );
    assert_eq!(
        project("SELECT sha384(a) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "ca737f1014a48f4c0b6dd43cb177b0afd9e5169367544c494011e3317dbf9a509cb1e5dc1e85a941bbee3d7f2afbc9b1"}])
    );
    assert_eq!(
        project("SELECT sha512(a) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "07e547d9586f6a73f73fbac0435ed76951218fb7d0c8d788a309d785436bbb642e93a252a954f23912547d1e8a3b5ed6e1bfd7097821233fa0538f3db854fee6"}])
    );
}

#[test]
fn test_mqtt_metadata_access() {
    let data = with_meta(
        tuple("test", "{}"),
        r#"{"topic": "devices/device_001/message"}"#,
    );
    assert_eq!(
        project("SELECT mqtt(topic) AS a FROM test", EvalInput::Single(&data)),
        json!([{"a": "devices/device_001/message"}])
    );

    // the message column and the metadata entry are different namespaces
    let data = with_meta(
        tuple("test", r#"{"topic": "fff"}"#),
        r#"{"topic": "devices/device_001/message"}"#,
    );
    assert_eq!(
        project("SELECT topic, mqtt(topic) AS a FROM test", EvalInput::Single(&data)),
        json!([{"topic": "fff", "a": "devices/device_001/message"}])
    );
}

#[test]
fn test_meta_function() {
    let data = with_meta(
        tuple("test", r#"{"temperature": 43.2}"#),
        r#"{"temperature": {"id": "dfadfasfas", "device": "device2"}, "device": "gateway"}"#,
    );
    assert_eq!(
        project(
            "SELECT meta(device) as d, meta(temperature->device) as r FROM test",
            EvalInput::Single(&data)
        ),
        json!([{"d": "gateway", "r": "device2"}])
    );
    assert_eq!(
        project("SELECT meta(*) as r FROM test", EvalInput::Single(&data)),
        json!([{"r": {"temperature": {"id": "dfadfasfas", "device": "device2"}, "device": "gateway"}}])
    );

    let data = with_meta(
        tuple("test", r#"{"topic": "fff"}"#),
        r#"{"Light-diming": {"device": "device2"}}"#,
    );
    assert_eq!(
        project(
            "SELECT topic, meta(`Light-diming`->device) AS a FROM test",
            EvalInput::Single(&data)
        ),
        json!([{"topic": "fff", "a": "device2"}])
    );
}

#[test]
fn test_cardinality_and_isnull() {
    let data = tuple("test", r#"{"temperature": 43.2, "arr": []}"#);
    assert_eq!(
        project("SELECT cardinality(arr) as r FROM test", EvalInput::Single(&data)),
        json!([{"r": 0}])
    );
    assert_eq!(
        project("SELECT isNull(arr) as r FROM test", EvalInput::Single(&data)),
        json!([{"r": false}])
    );

    let data = tuple("test", r#"{"temperature": 43.2, "arr": [1, 2, 3, 4, 5]}"#);
    assert_eq!(
        project("SELECT cardinality(arr) AS r FROM test", EvalInput::Single(&data)),
        json!([{"r": 5}])
    );

    let data = tuple("test", r#"{"temperature": 43.2, "rec": null}"#);
    assert_eq!(
        project("SELECT isNull(rec) as r FROM test", EvalInput::Single(&data)),
        json!([{"r": true}])
    );
}

#[test]
fn test_cast_datetime_scenario() {
    let data = tuple("test", r#"{"a": 1.62000273e+09, "b": "ya", "c": "myc"}"#);
    assert_eq!(
        project(
            "SELECT cast(a * 1000, \"datetime\") AS a FROM test",
            EvalInput::Single(&data)
        ),
        json!([{"a": "2021-05-03T00:45:30Z"}])
    );
}

#[test]
fn test_join_tuple_projection() {
    let left = with_meta(
        tuple("src1", r#"{"id1": "1", "f1": "v1"}"#),
        r#"{"topic": "devices/type1/device001"}"#,
    );
    let right = with_meta(
        tuple("src2", r#"{"id2": "1", "f2": "w1"}"#),
        r#"{"topic": "devices/type2/device001"}"#,
    );
    let joined = JoinTuple::new(vec![left, right]);

    assert_eq!(
        project(
            "SELECT id1, mqtt(src1.topic) AS a, mqtt(src2.topic) as b FROM src1 LEFT JOIN src2 ON src1.id1 = src2.id1",
            EvalInput::Joined(&joined)
        ),
        json!([{"id1": "1", "a": "devices/type1/device001", "b": "devices/type2/device001"}])
    );
}

#[test]
fn test_wildcard_join_merge_overwrites_left_to_right() {
    let left = tuple("src1", r#"{"id": "L", "f1": "v1"}"#);
    let right = tuple("src2", r#"{"id": "R", "f2": "w1"}"#);
    let joined = JoinTuple::new(vec![left, right]);

    assert_eq!(
        project(
            "SELECT * FROM src1 LEFT JOIN src2 ON src1.f1 = src2.f2",
            EvalInput::Joined(&joined)
        ),
        json!([{"id": "R", "f1": "v1", "f2": "w1"}])
    );

    assert_eq!(
        project(
            "SELECT src1.* FROM src1 LEFT JOIN src2 ON src1.f1 = src2.f2",
            EvalInput::Joined(&joined)
        ),
        json!([{"id": "L", "f1": "v1"}])
    );
}

fn warrior() -> Tuple {
    tuple(
        "test",
        r#"{
            "class": "warrior",
            "equipment": {
                "rings": [
                    {"name": "ring of despair", "weight": 0.1},
                    {"name": "ring of strength", "weight": 2.4}
                ],
                "arm_right": "Sword of flame",
                "arm_left": "Shield of faith"
            }
        }"#,
    )
}

#[test]
fn test_json_path_query_scenarios() {
    let data = warrior();
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$.arm_right") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": "Sword of flame"}])
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$.rings[*].weight") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": [0.1, 2.4]}])
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query_first(equipment, "$.rings[*].weight") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": 0.1}])
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$.rings[? @.weight>1]") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": [{"name": "ring of strength", "weight": 2.4}]}])
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$.rings[? @.weight>1].name") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": ["ring of strength"]}])
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$.rings[? (@.weight>1)].name") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": ["ring of strength"]}])
    );
}

#[test]
fn test_json_path_exists_scenarios() {
    let data = warrior();
    for (path, expected) in [
        ("$.rings[? @.weight>5]", false),
        ("$.ring1", false),
        ("$.rings", true),
    ] {
        assert_eq!(
            project(
                &format!(r#"SELECT json_path_exists(equipment, "{}") AS a FROM test"#, path),
                EvalInput::Single(&data)
            ),
            json!([{"a": expected}])
        );
    }
}

#[test]
fn test_json_path_over_json_strings() {
    let data = tuple(
        "test",
        r#"{"class": "warrior",
            "equipment": "{\"rings\": [0.1, 2.4],\"arm.right\": \"Sword of flame\",\"arm.left\":  \"Shield of faith\"}"}"#,
    );
    assert_eq!(
        project(
            r#"SELECT json_path_query(equipment, "$[\"arm.left\"]") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        json!([{"a": "Shield of faith"}])
    );
}

#[test]
fn test_json_path_error_on_missing_input() {
    let data = tuple("test", r#"{"class": "warrior"}"#);
    assert_eq!(
        project_err(
            r#"SELECT json_path_query(equipment, "$.arm_right") AS a FROM test"#,
            EvalInput::Single(&data)
        ),
        "run json_path_query function error: the first argument must be a map but got nil"
    );
}

#[test]
fn test_index_chain_scenario() {
    let data = tuple(
        "test",
        r#"{
            "all": [
                {"SystemPowerMode": 0, "ts": 0},
                {"SystemPowerMode": 0, "ts": 500},
                {"SystemPowerMode": 2, "ts": 1000},
                {"SystemPowerMode": 2, "ts": 60000}
            ],
            "poi": [0, 1]
        }"#,
    );
    assert_eq!(
        project(
            "SELECT all[poi[-1] + 1]->ts as powerOnTs FROM test",
            EvalInput::Single(&data)
        ),
        json!([{"powerOnTs": 1000}])
    );
}

#[test]
fn test_case_projection() {
    let data = tuple("test", r#"{"temperature": 30, "humidity": 60}"#);
    assert_eq!(
        project(
            "SELECT CASE temperature WHEN 25 THEN \"bingo\" WHEN 30 THEN \"high\" ELSE \"low\" END AS label FROM tbl",
            EvalInput::Single(&data)
        ),
        json!([{"label": "high"}])
    );
}

#[test]
fn test_grouped_aggregates() {
    let tuples: Vec<Tuple> = [1, 2, 4]
        .iter()
        .map(|v| tuple("t", &format!(r#"{{"data": {}, "tag": "x"}}"#, v)))
        .collect();

    assert_eq!(
        project("SELECT count(*) AS c FROM t", EvalInput::Grouped(&tuples)),
        json!([{"c": 3}])
    );
    assert_eq!(
        project("SELECT sum(data) AS s FROM t", EvalInput::Grouped(&tuples)),
        json!([{"s": 7}])
    );
    // integer average keeps the integer branch
    assert_eq!(
        project("SELECT avg(data) AS a FROM t", EvalInput::Grouped(&tuples)),
        json!([{"a": 2}])
    );
    assert_eq!(
        project(
            "SELECT min(data) AS lo, max(data) AS hi FROM t",
            EvalInput::Grouped(&tuples)
        ),
        json!([{"lo": 1, "hi": 4}])
    );
    assert_eq!(
        project("SELECT collect(data) AS all FROM t", EvalInput::Grouped(&tuples)),
        json!([{"all": [1, 2, 4]}])
    );
    assert_eq!(
        project("SELECT count(*)-10 AS c FROM t", EvalInput::Grouped(&tuples)),
        json!([{"c": -7}])
    );
}

#[test]
fn test_deduplicate_projection() {
    let tuples: Vec<Tuple> = [20, 30, 20]
        .iter()
        .map(|v| tuple("t", &format!(r#"{{"temperature": {}}}"#, v)))
        .collect();

    // latest-only form: the last temperature was already seen
    assert_eq!(
        project(
            "SELECT deduplicate(temperature, false) AS r FROM t",
            EvalInput::Grouped(&tuples)
        ),
        json!([{}])
    );

    // keep-all form returns the first-seen records
    assert_eq!(
        project(
            "SELECT deduplicate(temperature, true) AS r FROM t",
            EvalInput::Grouped(&tuples)
        ),
        json!([{"r": [{"temperature": 20}, {"temperature": 30}]}])
    );

    let tuples: Vec<Tuple> = [20, 30, 25]
        .iter()
        .map(|v| tuple("t", &format!(r#"{{"temperature": {}}}"#, v)))
        .collect();
    assert_eq!(
        project(
            "SELECT deduplicate(temperature, false) AS r FROM t",
            EvalInput::Grouped(&tuples)
        ),
        json!([{"r": {"temperature": 25}}])
    );
}

#[test]
fn test_aggregate_error_fails_group() {
    let tuples = vec![
        tuple("t", r#"{"data": 1}"#),
        tuple("t", r#"{"data": 2.5}"#),
    ];
    let err = project_err("SELECT sum(data) AS s FROM t", EvalInput::Grouped(&tuples));
    assert_eq!(err, "run sum function error: requires int but found float(2.5)");
}

#[test]
fn test_group_key_fields_read_first_tuple() {
    let tuples = vec![
        tuple("t", r#"{"tag": "x", "data": 1}"#),
        tuple("t", r#"{"tag": "x", "data": 2}"#),
    ];
    assert_eq!(
        project(
            "SELECT tag, count(*) AS c FROM t GROUP BY tag",
            EvalInput::Grouped(&tuples)
        ),
        json!([{"tag": "x", "c": 2}])
    );
}

#[test]
fn test_where_condition_evaluation() {
    use eventsql::eventsql::sql::execution::evaluator::ExpressionEvaluator;

    let stmt = EventSqlParser::new()
        .parse(r#"SELECT abc FROM tbl WHERE abc > 12 AND name = "dname""#)
        .unwrap();
    let condition = stmt.condition.unwrap();
    let ctx = EvalContext::new("test");

    let matching = tuple("tbl", r#"{"abc": 20, "name": "dname"}"#);
    assert!(ExpressionEvaluator::eval_condition(&ctx, &condition, EvalInput::Single(&matching)).unwrap());

    let too_small = tuple("tbl", r#"{"abc": 5, "name": "dname"}"#);
    assert!(!ExpressionEvaluator::eval_condition(&ctx, &condition, EvalInput::Single(&too_small)).unwrap());

    // unknown (null) reads as false
    let missing = tuple("tbl", r#"{"name": "dname"}"#);
    assert!(!ExpressionEvaluator::eval_condition(&ctx, &condition, EvalInput::Single(&missing)).unwrap());
}

#[test]
fn test_string_payload_lengths() {
    let data = tuple("test", r#"{"a": "中文", "b": "ascii"}"#);
    assert_eq!(
        project("SELECT length(a) AS la, length(b) AS lb FROM test", EvalInput::Single(&data)),
        json!([{"la": 2, "lb": 5}])
    );
}

#[test]
fn test_deterministic_output() {
    let data = warrior();
    let first = project(
        r#"SELECT json_path_query(equipment, "$.rings[*].weight") AS a, class FROM test"#,
        EvalInput::Single(&data),
    );
    for _ in 0..5 {
        let again = project(
            r#"SELECT json_path_query(equipment, "$.rings[*].weight") AS a, class FROM test"#,
            EvalInput::Single(&data),
        );
        assert_eq!(first, again);
    }
}

#[test]
fn test_wildcard_omits_null_values() {
    let mut message = HashMap::new();
    message.insert("a".to_string(), FieldValue::Integer(1));
    message.insert("n".to_string(), FieldValue::Null);
    let data = Tuple::new("test").with_message(message);
    assert_eq!(
        project("SELECT * FROM test", EvalInput::Single(&data)),
        json!([{"a": 1}])
    );
}
