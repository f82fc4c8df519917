// ==========================================
// StockLedger 台账集成测试
// ==========================================
// 测试目标: 四个台账操作的数量不变量、审计配对与事务原子性
// ==========================================


use wms_core::domain::audit::ENTITY_STOCK_RECORD;
use wms_core::domain::types::{AuditAction, MovementKind};
use wms_core::engine::EngineError;
use wms_core::repository::{AuditLogRepository, LocationRepository, StockRepository};

use test_helpers::{
    build_ledger, create_test_db, open_shared_connection, seed_location,
    seed_location_with_capacity, seed_product,
};

const OPERATOR: &str = "tester";

#[test]
fn test_adjust_creates_record_and_audit_in_one_transaction() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-100", "螺丝刀");
    let location = seed_location_with_capacity(&db_path, "C-01", "C", 100);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    let outcome = ledger
        .adjust(
            "SKU-100",
            "C-01",
            Some("LOT-1"),
            40,
            MovementKind::Receiving,
            Some("首次收货"),
            None,
            OPERATOR,
        )
        .unwrap();

    assert_eq!(outcome.previous_on_hand, 0);
    assert_eq!(outcome.new_on_hand, 40);

    // 库存记录
    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].quantity_on_hand, 40);
    assert_eq!(records[0].quantity_available, 40);
    assert!(records[0].invariants_hold());

    // 库位占用同事务更新
    let location_repo = LocationRepository::new(&db_path).unwrap();
    let refreshed = location_repo.find_by_id(&location.id).unwrap().unwrap();
    assert_eq!(refreshed.current_units, 40);

    // 审计配对: 恰好一条, before/after/delta 正确
    let audit_repo = AuditLogRepository::new(&db_path).unwrap();
    let entries = audit_repo
        .list_for_entity(ENTITY_STOCK_RECORD, &records[0].id)
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::StockUpdate);
    assert_eq!(entries[0].quantity_before, Some(0));
    assert_eq!(entries[0].quantity_after, Some(40));
    assert_eq!(entries[0].quantity_delta, Some(40));
    assert_eq!(entries[0].movement_kind, Some(MovementKind::Receiving));
}

#[test]
fn test_adjust_below_zero_rejected_and_nothing_written() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-101", "扳手");
    seed_location_with_capacity(&db_path, "C-01", "C", 100);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-101", "C-01", None, 10, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    let err = ledger
        .adjust("SKU-101", "C-01", None, -15, MovementKind::Pick, None, None, OPERATOR)
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientStock { on_hand: 10, requested: 15, .. }));

    // 拒绝后状态不变: 数量、库位占用、审计条数
    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_on_hand, 10);

    let audit_repo = AuditLogRepository::new(&db_path).unwrap();
    assert_eq!(
        audit_repo.count_for_entity(ENTITY_STOCK_RECORD, &records[0].id).unwrap(),
        1
    );
}

#[test]
fn test_capacity_exceeded_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-102", "电钻");
    seed_location_with_capacity(&db_path, "C-02", "C", 50);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    let err = ledger
        .adjust("SKU-102", "C-02", None, 60, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::CapacityExceeded { capacity: 50, resulting: 60, .. }
    ));
}

#[test]
fn test_unknown_product_and_location() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-103", "锤子");
    seed_location(&db_path, "C-03", "C", "1", wms_core::domain::types::LocationType::Storage, 0.0, 0.0);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    let err = ledger
        .adjust("SKU-404", "C-03", None, 5, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownProduct(_)));

    let err = ledger
        .adjust("SKU-103", "X-99", None, 5, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownLocation(_)));
}

#[test]
fn test_allocate_then_over_deallocate_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-110", "胶带");
    seed_location_with_capacity(&db_path, "C-05", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-110", "C-05", None, 100, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    let outcome = ledger
        .allocate("SKU-110", "C-05", 30, "ORD-1", OPERATOR)
        .unwrap();
    assert_eq!(outcome.remaining_available, 70);

    // 超量释放
    let err = ledger
        .deallocate("SKU-110", "C-05", 40, "订单取消", OPERATOR)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::OverDeallocation { allocated: 30, requested: 40, .. }
    ));

    // 足量释放成功
    let outcome = ledger
        .deallocate("SKU-110", "C-05", 30, "订单取消", OPERATOR)
        .unwrap();
    assert_eq!(outcome.new_available, 100);

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_allocated, 0);
    assert!(records[0].invariants_hold());
}

#[test]
fn test_allocate_more_than_available_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-111", "手套");
    seed_location_with_capacity(&db_path, "C-06", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-111", "C-06", None, 20, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger.allocate("SKU-111", "C-06", 15, "ORD-2", OPERATOR).unwrap();

    let err = ledger
        .allocate("SKU-111", "C-06", 10, "ORD-3", OPERATOR)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientAvailable { available: 5, requested: 10, .. }
    ));
}

#[test]
fn test_reconcile_applies_variance_with_audit() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-120", "轴承");
    let location = seed_location_with_capacity(&db_path, "C-07", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-120", "C-07", None, 50, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    // 实盘 42, 差异 -8
    let outcome = ledger
        .reconcile("SKU-120", "C-07", 42, OPERATOR, Some("周期盘点"))
        .unwrap();
    assert_eq!(outcome.system_quantity, 50);
    assert_eq!(outcome.variance, -8);
    assert!(outcome.adjustment_made);
    assert!(outcome.audit_id.is_some());

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_on_hand, 42);
    assert!(records[0].last_counted_at.is_some());

    // 库位占用随差异同步
    let location_repo = LocationRepository::new(&db_path).unwrap();
    let refreshed = location_repo.find_by_id(&location.id).unwrap().unwrap();
    assert_eq!(refreshed.current_units, 42);

    // 审计携带有符号差异
    let audit_repo = AuditLogRepository::new(&db_path).unwrap();
    let entries = audit_repo
        .list_for_entity(ENTITY_STOCK_RECORD, &records[0].id)
        .unwrap();
    let recon = entries
        .iter()
        .find(|e| e.action == AuditAction::Reconciliation)
        .unwrap();
    assert_eq!(recon.quantity_delta, Some(-8));
}

#[test]
fn test_reconcile_zero_variance_is_stamp_only() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-121", "链条");
    seed_location_with_capacity(&db_path, "C-08", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-121", "C-08", None, 30, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();

    let outcome = ledger.reconcile("SKU-121", "C-08", 30, OPERATOR, None).unwrap();
    assert_eq!(outcome.variance, 0);
    assert!(!outcome.adjustment_made);
    assert!(outcome.audit_id.is_none());

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert!(records[0].last_counted_at.is_some());

    // 无差异不产生审计
    let audit_repo = AuditLogRepository::new(&db_path).unwrap();
    let entries = audit_repo
        .list_for_entity(ENTITY_STOCK_RECORD, &records[0].id)
        .unwrap();
    assert!(entries.iter().all(|e| e.action != AuditAction::Reconciliation));
}

#[test]
fn test_reconcile_below_allocated_rejected() {
    let (_tmp, db_path) = create_test_db().unwrap();
    seed_product(&db_path, "SKU-122", "滑轮");
    seed_location_with_capacity(&db_path, "C-09", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    ledger
        .adjust("SKU-122", "C-09", None, 50, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger.allocate("SKU-122", "C-09", 20, "ORD-9", OPERATOR).unwrap();

    let err = ledger
        .reconcile("SKU-122", "C-09", 15, OPERATOR, None)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::ReconciliationBelowAllocated { counted: 15, allocated: 20, .. }
    ));
}

#[test]
fn test_reconcile_creates_record_for_found_stock() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-123", "弹簧");
    seed_location_with_capacity(&db_path, "C-10", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    // 账上无记录, 实盘发现 12 件
    let outcome = ledger.reconcile("SKU-123", "C-10", 12, OPERATOR, None).unwrap();
    assert_eq!(outcome.system_quantity, 0);
    assert_eq!(outcome.variance, 12);

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].quantity_on_hand, 12);
}

#[test]
fn test_symmetric_operations_audit_deltas_sum_to_zero() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-130", "垫片");
    seed_location_with_capacity(&db_path, "C-11", "C", 200);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    // 对称操作序列: +25/-25, 分配 10/释放 10
    ledger
        .adjust("SKU-130", "C-11", None, 25, MovementKind::Receiving, None, None, OPERATOR)
        .unwrap();
    ledger.allocate("SKU-130", "C-11", 10, "ORD-5", OPERATOR).unwrap();
    ledger.deallocate("SKU-130", "C-11", 10, "订单取消", OPERATOR).unwrap();
    ledger
        .adjust("SKU-130", "C-11", None, -25, MovementKind::WriteOff, Some("报废"), None, OPERATOR)
        .unwrap();

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_on_hand, 0);
    assert_eq!(records[0].quantity_allocated, 0);

    let audit_repo = AuditLogRepository::new(&db_path).unwrap();
    let entries = audit_repo
        .list_for_entity(ENTITY_STOCK_RECORD, &records[0].id)
        .unwrap();
    assert_eq!(entries.len(), 4);
    let delta_sum: i64 = entries.iter().filter_map(|e| e.quantity_delta).sum();
    assert_eq!(delta_sum, 0);
}
