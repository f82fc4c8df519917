// ==========================================
// 仓储决策核心 - 产品主数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::product::Product;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ProductRepository - 产品主数据仓储
// ==========================================
/// 职责: 管理 products 表的数据访问
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 创建新的 ProductRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行映射: products 表 -> Product
    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            sku: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            unit_of_measure: row.get(4)?,
            requires_cold_storage: row.get(5)?,
            is_hazmat: row.get(6)?,
            is_fragile: row.get(7)?,
            shelf_life_days: row.get(8)?,
            reorder_point: row.get(9)?,
            reorder_quantity: row.get(10)?,
            min_stock_level: row.get(11)?,
            max_stock_level: row.get(12)?,
            velocity_class: row
                .get::<_, String>(13)?
                .parse()
                .unwrap_or(crate::domain::types::VelocityClass::C),
            unit_cost: row.get(14)?,
            is_active: row.get(15)?,
            created_at: row
                .get::<_, String>(16)?
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: row
                .get::<_, String>(17)?
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap_or_else(|_| chrono::Utc::now()),
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        id, sku, name, category, unit_of_measure,
        requires_cold_storage, is_hazmat, is_fragile, shelf_life_days,
        reorder_point, reorder_quantity, min_stock_level, max_stock_level,
        velocity_class, unit_cost, is_active, created_at, updated_at
    "#;

    /// 插入产品（INSERT OR REPLACE 实现 upsert 语义）
    pub fn insert(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO products (
                id, sku, name, category, unit_of_measure,
                requires_cold_storage, is_hazmat, is_fragile, shelf_life_days,
                reorder_point, reorder_quantity, min_stock_level, max_stock_level,
                velocity_class, unit_cost, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                product.id,
                product.sku,
                product.name,
                product.category,
                product.unit_of_measure,
                product.requires_cold_storage,
                product.is_hazmat,
                product.is_fragile,
                product.shelf_life_days,
                product.reorder_point,
                product.reorder_quantity,
                product.min_stock_level,
                product.max_stock_level,
                product.velocity_class.as_str(),
                product.unit_cost,
                product.is_active,
                product.created_at.to_rfc3339(),
                product.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按 SKU 查询产品
    ///
    /// # 返回
    /// - Ok(Some(Product)): 找到记录
    /// - Ok(None): 未找到记录（与零库存是不同信号）
    pub fn find_by_sku(&self, sku: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM products WHERE sku = ?1", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![sku], Self::map_row);
        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按内部 id 查询产品
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM products WHERE id = ?1", Self::SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![id], Self::map_row);
        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询全部启用产品（按 SKU 排序，保证确定性）
    pub fn list_active(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY sku",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map([], Self::map_row)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }
}
