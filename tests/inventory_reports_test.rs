// ==========================================
// InventoryApi 报表集成测试
// ==========================================
// 测试目标: 库位明细、到期扫描分级、补货建议
// ==========================================


use wms_core::domain::types::MovementKind;
use wms_core::engine::replenishment::CoverStatus;

use test_helpers::{
    build_inventory_api, build_ledger, create_test_db, open_shared_connection,
    open_test_connection, seed_location_with_capacity, seed_product, seed_product_with,
};

const OPERATOR: &str = "tester";

#[test]
fn test_inventory_by_location_lists_items_and_utilization() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-A", "甲产品");
    seed_product(&db_path, "SKU-B", "乙产品");
    seed_location_with_capacity(&db_path, "C-01", "C", 100);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);
    ledger
        .adjust("SKU-A", "C-01", None, 30, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger
        .adjust("SKU-B", "C-01", Some("LOT-9"), 20, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    let api = build_inventory_api(&conn);
    let report = api.inventory_by_location("C-01").unwrap();

    assert_eq!(report.location_code, "C-01");
    assert_eq!(report.current_units, 50);
    assert!((report.utilization_percent - 50.0).abs() < 1e-9);
    assert_eq!(report.items.len(), 2);
    let lot_item = report.items.iter().find(|i| i.sku == "SKU-B").unwrap();
    assert_eq!(lot_item.lot_number.as_deref(), Some("LOT-9"));
    assert_eq!(lot_item.quantity_on_hand, 20);
}

#[test]
fn test_expiring_items_severity_classification() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-EXP", "生鲜品");
    seed_location_with_capacity(&db_path, "F-01", "F", 100);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);
    ledger
        .adjust("SKU-EXP", "F-01", Some("LOT-OLD"), 10, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger
        .adjust("SKU-EXP", "F-01", Some("LOT-SOON"), 10, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger
        .adjust("SKU-EXP", "F-01", Some("LOT-LATER"), 10, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    // 三个批次: 已过期 / 3 天内 / 20 天后
    let raw = open_test_connection(&db_path).unwrap();
    let now = chrono::Utc::now();
    let set_expiry = |lot: &str, days: i64| {
        raw.execute(
            "UPDATE stock_records SET expiry_date = ?1 WHERE product_id = ?2 AND lot_number = ?3",
            rusqlite::params![
                (now + chrono::Duration::days(days)).to_rfc3339(),
                product.id,
                lot
            ],
        )
        .unwrap();
    };
    set_expiry("LOT-OLD", -2);
    set_expiry("LOT-SOON", 3);
    set_expiry("LOT-LATER", 20);

    let api = build_inventory_api(&conn);
    let report = api.expiring_items(30).unwrap();

    assert_eq!(report.items.len(), 3);
    assert_eq!(report.expired_count, 1);
    // 到期时间升序
    assert_eq!(report.items[0].lot_number.as_deref(), Some("LOT-OLD"));
    assert_eq!(report.items[1].lot_number.as_deref(), Some("LOT-SOON"));
    assert_eq!(report.items[2].lot_number.as_deref(), Some("LOT-LATER"));

    // 窗口收紧后远期批次不再出现
    let report = api.expiring_items(7).unwrap();
    assert_eq!(report.items.len(), 2);
}

#[test]
fn test_replenishment_advice_with_demand_history() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product_with(&db_path, "SKU-RPL", "常销品", wms_core::domain::types::VelocityClass::B, 10.0);
    seed_location_with_capacity(&db_path, "C-02", "C", 2000);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);
    ledger
        .adjust("SKU-RPL", "C-02", None, 300, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    // 近 30 天拣出 270 件 -> 日均 9
    ledger
        .adjust("SKU-RPL", "C-02", None, -270, MovementKind::Pick, Some("出库"), None, OPERATOR)
        .unwrap();

    let api = build_inventory_api(&conn);
    let report = api.replenishment_advice("SKU-RPL").unwrap();

    assert!((report.avg_daily_demand - 9.0).abs() < 1e-9);
    assert_eq!(report.total_available, 30);
    // 再订货点 = 9 * (7 + 3) = 90, 可用 30 -> 建议补货
    assert_eq!(report.reorder_point.reorder_point, 90);
    assert!(report.reorder_recommended);
    assert!(report.recommended_order_quantity > 0);
    // 覆盖 30/9 ≈ 3.3 天 < 提前期 7 天
    assert_eq!(report.days_of_cover.status, CoverStatus::BelowLeadTime);
    // 单位成本已维护 -> 产生 EOQ
    assert!(report.eoq.is_some());
}

#[test]
fn test_replenishment_advice_zero_demand_unlimited_cover() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-SLOW", "滞销品");
    seed_location_with_capacity(&db_path, "C-03", "C", 100);

    let conn = open_shared_connection(&db_path);
    build_ledger(&conn)
        .adjust("SKU-SLOW", "C-03", None, 40, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    let api = build_inventory_api(&conn);
    let report = api.replenishment_advice("SKU-SLOW").unwrap();

    // 无出库历史: 日均需求 0, 覆盖无限, 不触发除零
    assert!((report.avg_daily_demand - 0.0).abs() < 1e-12);
    assert!(report.days_of_cover.days_of_cover.is_none());
    assert_eq!(report.days_of_cover.status, CoverStatus::Unlimited);
    assert_eq!(report.reorder_point.reorder_point, 0);
    assert!(!report.reorder_recommended);
}
