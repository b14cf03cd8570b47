#![cfg(target_arch = "wasm32")]

use gantt_engine::GanttEngine;
use serde::Serialize;
use serde_json::{json, Value};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Plain JS objects, the way a host passes them
fn js(value: Value) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap()
}

fn rust(value: JsValue) -> Value {
    serde_wasm_bindgen::from_value(value).unwrap()
}

fn project() -> Value {
    json!([
        {"id": "A", "start": "2024-01-01", "end": "2024-01-05"},
        {"id": "B", "start": "2024-01-06", "end": "2024-01-10",
         "dependencies": [{"sourceId": "A", "sourceTarget": "endOfTask", "ownTarget": "startOfTask"}]}
    ])
}

fn ready_engine() -> GanttEngine {
    let mut engine = GanttEngine::new();
    engine
        .initialize(js(project()), js(json!({"isAdjustToWorkingDates": false})))
        .unwrap();
    engine
}

#[wasm_bindgen_test]
fn calls_before_initialize_fail() {
    let engine = GanttEngine::new();
    assert!(!engine.is_initialized());
    assert!(engine.layout().is_err());
}

#[wasm_bindgen_test]
fn date_change_cascades_to_dependents() {
    let mut engine = ready_engine();
    assert_eq!(engine.task_count(), 2);

    let original = json!({"id": "A", "start": "2024-01-01", "end": "2024-01-05"});
    let changed = json!({"id": "A", "start": "2024-01-01", "end": "2024-01-08"});
    let change = rust(
        engine
            .on_date_change(JsValue::from_str("end"), js(changed), js(original))
            .unwrap(),
    );

    assert_eq!(change["descriptor"]["type"], "date_change_cascade");
    assert_eq!(change["tasks"][1]["start"], "2024-01-09T00:00:00");
    assert_eq!(change["tasks"][1]["end"], "2024-01-13T00:00:00");

    let tasks = rust(engine.get_tasks().unwrap());
    assert_eq!(tasks[0]["end"], "2024-01-08T00:00:00");
}

#[wasm_bindgen_test]
fn layout_frame_has_a_row_per_task() {
    let engine = ready_engine();
    let frame = rust(engine.layout().unwrap());

    assert_eq!(frame["rows"].as_array().map(Vec::len), Some(2));
    assert_eq!(frame["arrows"].as_array().map(Vec::len), Some(1));
    assert_eq!(frame["arrows"][0]["sourceId"], "A");
}

#[wasm_bindgen_test]
fn refused_relation_returns_null() {
    let mut engine = ready_engine();
    let a = json!({"id": "A", "start": "2024-01-01", "end": "2024-01-05"});

    let result = engine
        .relation_change(
            js(a.clone()),
            JsValue::from_str("endOfTask"),
            js(a),
            JsValue::from_str("startOfTask"),
        )
        .unwrap();
    assert!(result.is_null());
}

#[wasm_bindgen_test]
fn holiday_check_from_js() {
    let mut engine = GanttEngine::new();
    engine
        .initialize(js(project()), JsValue::UNDEFINED)
        .unwrap();
    // every 7th of the month is off
    let check = js_sys::Function::new_with_args("date, extremity", "return date.slice(8, 10) === '07';");
    engine.set_holiday_check(Some(check));

    let original = json!({"id": "A", "start": "2024-01-01", "end": "2024-01-05"});
    let changed = json!({"id": "A", "start": "2024-01-01", "end": "2024-01-07"});
    let change = rust(
        engine
            .on_date_change(JsValue::from_str("end"), js(changed), js(original))
            .unwrap(),
    );

    assert_eq!(change["tasks"][0]["end"], "2024-01-08T00:00:00");

    engine.dispose();
    assert!(!engine.is_initialized());
    assert_eq!(engine.task_count(), 0);
}
