// ==========================================
// 并发分配控制测试
// ==========================================
// 测试目标: check-then-write 在事务内完成, 并发分配不得超卖
// ==========================================


use std::sync::Arc;
use std::thread;

use wms_core::domain::types::MovementKind;
use wms_core::engine::StockLedger;
use wms_core::repository::StockRepository;

use test_helpers::{
    build_ledger, create_test_db, open_shared_connection, seed_location_with_capacity,
    seed_product,
};

#[test]
fn test_concurrent_allocations_never_oversell() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-200", "热销品");
    seed_location_with_capacity(&db_path, "A-01", "A", 500);

    let conn = open_shared_connection(&db_path);
    let ledger = build_ledger(&conn);

    // 可用 100, 两个并发请求各要 60: 至多一个成功
    ledger
        .adjust("SKU-200", "A-01", None, 100, MovementKind::Receiving, None, None, "seeder")
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..2 {
        let conn = Arc::clone(&conn);
        handles.push(thread::spawn(move || {
            let ledger = StockLedger::from_connection(conn);
            ledger
                .allocate("SKU-200", "A-01", 60, &format!("ORD-{}", i), "worker")
                .is_ok()
        }));
    }

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    // 总分配量不超过在手量
    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_allocated, 60);
    assert!(records[0].invariants_hold());
}

#[test]
fn test_many_small_concurrent_allocations_respect_available() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let product = seed_product(&db_path, "SKU-201", "促销品");
    seed_location_with_capacity(&db_path, "A-02", "A", 500);

    let conn = open_shared_connection(&db_path);
    build_ledger(&conn)
        .adjust("SKU-201", "A-02", None, 50, MovementKind::Receiving, None, None, "seeder")
        .unwrap();

    // 8 个线程各抢 10 件: 恰好 5 个成功
    let mut handles = Vec::new();
    for i in 0..8 {
        let conn = Arc::clone(&conn);
        handles.push(thread::spawn(move || {
            let ledger = StockLedger::from_connection(conn);
            ledger
                .allocate("SKU-201", "A-02", 10, &format!("ORD-{}", i), "worker")
                .is_ok()
        }));
    }
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 5);

    let stock_repo = StockRepository::new(&db_path).unwrap();
    let records = stock_repo.list_by_product(&product.id).unwrap();
    assert_eq!(records[0].quantity_allocated, 50);
    assert_eq!(records[0].quantity_available, 0);
    assert!(records[0].invariants_hold());
}
