// ==========================================
// 操作分发边界 E2E 测试
// ==========================================
// 测试目标: 行分隔 JSON 请求/响应、稳定错误码、序列化形态
// ==========================================


use serde_json::Value;
use wms_core::domain::types::LocationType;

use test_helpers::{
    build_dispatcher, create_test_db, open_shared_connection, seed_location,
    seed_location_with_capacity, seed_product,
};

fn parse(response: &str) -> Value {
    serde_json::from_str(response).expect("响应必须是合法 JSON")
}

#[test]
fn test_adjust_then_stock_level_roundtrip() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-E2E", "端到端品");
    seed_location_with_capacity(&db_path, "C-01", "C", 200);

    let conn = open_shared_connection(&db_path);
    let dispatcher = build_dispatcher(&conn);

    let response = dispatcher.dispatch_json(
        r#"{"op":"adjust_stock","payload":{"sku":"SKU-E2E","location_code":"C-01","delta":80,"movement_kind":"receiving","performed_by":"e2e"}}"#,
    );
    let value = parse(&response);
    assert_eq!(value["ok"]["new_on_hand"], 80);
    assert_eq!(value["ok"]["movement_kind"], "receiving");

    let response = dispatcher.dispatch_json(
        r#"{"op":"allocate_stock","payload":{"sku":"SKU-E2E","location_code":"C-01","quantity":30,"order_reference":"ORD-E2E"}}"#,
    );
    let value = parse(&response);
    assert_eq!(value["ok"]["remaining_available"], 50);

    let response =
        dispatcher.dispatch_json(r#"{"op":"stock_level","payload":{"sku":"SKU-E2E"}}"#);
    let value = parse(&response);
    assert_eq!(value["ok"]["total_on_hand"], 80);
    assert_eq!(value["ok"]["total_allocated"], 30);
    assert_eq!(value["ok"]["total_available"], 50);
    assert_eq!(value["ok"]["status"], "ok");
    assert_eq!(value["ok"]["locations"].as_array().unwrap().len(), 1);
}

#[test]
fn test_error_codes_are_stable() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-ERR", "错误品");
    seed_location_with_capacity(&db_path, "C-02", "C", 100);

    let conn = open_shared_connection(&db_path);
    let dispatcher = build_dispatcher(&conn);

    // 未知产品
    let response =
        dispatcher.dispatch_json(r#"{"op":"stock_level","payload":{"sku":"SKU-404"}}"#);
    let value = parse(&response);
    assert_eq!(value["error"]["code"], "not_found");

    // 可用不足
    let response = dispatcher.dispatch_json(
        r#"{"op":"allocate_stock","payload":{"sku":"SKU-ERR","location_code":"C-02","quantity":5,"order_reference":"ORD-1"}}"#,
    );
    let value = parse(&response);
    assert_eq!(value["error"]["code"], "insufficient_available");

    // 非法请求
    let response = dispatcher.dispatch_json(r#"{"op":"no_such_op","payload":{}}"#);
    let value = parse(&response);
    assert_eq!(value["error"]["code"], "invalid_request");

    // 非 JSON
    let response = dispatcher.dispatch_json("not json at all");
    let value = parse(&response);
    assert_eq!(value["error"]["code"], "invalid_request");
}

#[test]
fn test_reconcile_and_audit_via_dispatch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-REC", "对账品");
    seed_location_with_capacity(&db_path, "C-03", "C", 100);

    let conn = open_shared_connection(&db_path);
    let dispatcher = build_dispatcher(&conn);

    dispatcher.dispatch_json(
        r#"{"op":"adjust_stock","payload":{"sku":"SKU-REC","location_code":"C-03","delta":40,"movement_kind":"receiving","performed_by":"e2e"}}"#,
    );
    let response = dispatcher.dispatch_json(
        r#"{"op":"reconcile_stock","payload":{"sku":"SKU-REC","location_code":"C-03","counted_quantity":37,"performed_by":"盘点员"}}"#,
    );
    let value = parse(&response);
    assert_eq!(value["ok"]["variance"], -3);
    assert_eq!(value["ok"]["adjustment_made"], true);

    // 审计流水: 调整 + 对账各一条
    let response =
        dispatcher.dispatch_json(r#"{"op":"recent_audit","payload":{"limit":10}}"#);
    let value = parse(&response);
    let entries = value["ok"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_generate_route_via_dispatch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-RT", "路径品");
    seed_location(&db_path, "S-01", "A", "1", LocationType::Shipping, -5.0, 0.0);
    seed_location(&db_path, "A-01", "A", "1", LocationType::Storage, 0.0, 0.0);

    let conn = open_shared_connection(&db_path);
    let dispatcher = build_dispatcher(&conn);

    dispatcher.dispatch_json(
        r#"{"op":"adjust_stock","payload":{"sku":"SKU-RT","location_code":"A-01","delta":20,"movement_kind":"receiving","performed_by":"e2e"}}"#,
    );
    let response = dispatcher.dispatch_json(
        r#"{"op":"generate_route","payload":{"demands":[{"sku":"SKU-RT","quantity":5}]}}"#,
    );
    let value = parse(&response);
    assert_eq!(value["ok"]["start_location"], "S-01");
    assert_eq!(value["ok"]["steps"].as_array().unwrap().len(), 1);
    assert_eq!(value["ok"]["steps"][0]["location_code"], "A-01");
    assert_eq!(value["ok"]["total_units"], 5);
}

#[test]
fn test_warehouse_utilization_via_dispatch() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_location_with_capacity(&db_path, "A-01", "A", 100);

    let conn = open_shared_connection(&db_path);
    let dispatcher = build_dispatcher(&conn);

    let response = dispatcher.dispatch_json(r#"{"op":"warehouse_utilization"}"#);
    let value = parse(&response);
    assert_eq!(value["ok"]["warehouse_id"], "WH001");
    assert_eq!(value["ok"]["location_count"], 1);
}
