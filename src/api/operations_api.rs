// ==========================================
// 仓储决策核心 - 作业 API
// ==========================================
// 职责: 拣选路径生成 / 上架建议 / 仓库利用率 / 距离核算
// 红线: 需求 -> 库位解析用 FIFO（最早收货且可用量足额，不拆批）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::engine::error::EngineError;
use crate::engine::graph::{WarehouseGraph, WarehouseGraphBuilder};
use crate::engine::putaway::{PutawayAdvisor, PutawaySuggestion};
use crate::engine::route::{
    PickDemand, PickRoute, PickTask, RouteDistanceReport, RouteOptimizer,
};
use crate::repository::{LocationRepository, ProductRepository, StockRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

// ==========================================
// 报表结构
// ==========================================

/// 单个区域的利用率统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneUtilization {
    pub zone: String,
    pub location_count: usize,
    pub capacity_units: i64,
    pub current_units: i64,
    pub utilization_percent: f64,
}

/// 仓库利用率报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseUtilizationReport {
    pub warehouse_id: String,
    pub location_count: usize,
    pub total_capacity_units: i64,
    pub total_current_units: i64,
    pub overall_utilization_percent: f64,
    /// 区域统计（区域编码升序）
    pub zones: Vec<ZoneUtilization>,
}

// ==========================================
// OperationsApi - 作业 API
// ==========================================
pub struct OperationsApi {
    product_repo: ProductRepository,
    location_repo: LocationRepository,
    stock_repo: StockRepository,
    config: ConfigManager,
}

impl OperationsApi {
    pub fn new(
        product_repo: ProductRepository,
        location_repo: LocationRepository,
        stock_repo: StockRepository,
        config: ConfigManager,
    ) -> Self {
        Self {
            product_repo,
            location_repo,
            stock_repo,
            config,
        }
    }

    /// 生成拣选路径。
    ///
    /// 流程: 需求校验 -> FIFO 库位解析 -> 图构建（可配超时）->
    /// 最近邻路径 -> ETA 估算
    pub fn generate_route(&self, demands: &[PickDemand]) -> ApiResult<PickRoute> {
        if demands.is_empty() {
            return Err(ApiError::InvalidInput("拣选需求为空".to_string()));
        }
        for demand in demands {
            if demand.quantity <= 0 {
                return Err(ApiError::InvalidInput(format!(
                    "需求数量必须为正: sku={}",
                    demand.sku
                )));
            }
        }

        let mut tasks: Vec<PickTask> = Vec::with_capacity(demands.len());
        for demand in demands {
            let product = self
                .product_repo
                .find_by_sku(&demand.sku)?
                .ok_or_else(|| EngineError::UnknownProduct(demand.sku.clone()))?;

            let (record, location) = self
                .stock_repo
                .find_fifo_candidate(&product.id, demand.quantity)?
                .ok_or_else(|| EngineError::InsufficientStockForPick(demand.sku.clone()))?;

            tasks.push(PickTask {
                sku: product.sku,
                product_name: product.name,
                quantity: demand.quantity,
                location_code: location.code,
                zone: location.zone,
                aisle: location.aisle,
                lot_number: record.lot_number,
                x: location.x_coordinate,
                y: location.y_coordinate,
                z: location.z_coordinate,
            });
        }

        let graph = self.build_graph()?;
        let optimizer = self.optimizer()?;
        let route = optimizer.optimize(&graph, &tasks)?;

        info!(
            demands = demands.len(),
            stops = route.steps.len(),
            distance_m = route.total_distance_m,
            "拣选路径生成: 预计 {} 分钟",
            route.estimated_minutes
        );
        Ok(route)
    }

    /// 上架建议
    pub fn suggest_putaway(
        &self,
        sku: &str,
        quantity: i64,
        lot_number: Option<&str>,
    ) -> ApiResult<Vec<PutawaySuggestion>> {
        let product = self
            .product_repo
            .find_by_sku(sku)?
            .ok_or_else(|| EngineError::UnknownProduct(sku.to_string()))?;

        let location_type = PutawayAdvisor::required_location_type(&product);
        let candidates = self.location_repo.find_putaway_candidates(
            location_type,
            quantity,
            product.requires_cold_storage,
        )?;
        let existing = self.stock_repo.list_by_product_with_location(&product.id)?;

        let suggestions =
            PutawayAdvisor::suggest(&product, quantity, lot_number, &candidates, &existing)?;
        Ok(suggestions)
    }

    /// 仓库利用率（总量 + 分区域，区域编码升序）
    pub fn warehouse_utilization(&self) -> ApiResult<WarehouseUtilizationReport> {
        let warehouse_id = self
            .config
            .get_warehouse_id()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let locations = self.location_repo.list_active()?;

        let mut total_capacity = 0_i64;
        let mut total_current = 0_i64;
        let mut by_zone: BTreeMap<String, (usize, i64, i64)> = BTreeMap::new();
        for location in &locations {
            total_capacity += location.capacity_units;
            total_current += location.current_units;
            let entry = by_zone.entry(location.zone.clone()).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += location.capacity_units;
            entry.2 += location.current_units;
        }

        let zones = by_zone
            .into_iter()
            .map(|(zone, (count, capacity, current))| ZoneUtilization {
                zone,
                location_count: count,
                capacity_units: capacity,
                current_units: current,
                utilization_percent: percent(current, capacity),
            })
            .collect();

        Ok(WarehouseUtilizationReport {
            warehouse_id,
            location_count: locations.len(),
            total_capacity_units: total_capacity,
            total_current_units: total_current,
            overall_utilization_percent: percent(total_current, total_capacity),
            zones,
        })
    }

    /// 给定途经点序列核算行走距离
    pub fn route_distance(&self, codes: &[String]) -> ApiResult<RouteDistanceReport> {
        let graph = self.build_graph()?;
        let optimizer = self.optimizer()?;
        Ok(optimizer.route_distance(&graph, codes)?)
    }

    fn build_graph(&self) -> ApiResult<WarehouseGraph> {
        let locations = self.location_repo.list_active()?;
        let timeout = self
            .config
            .get_graph_build_timeout_ms()
            .map_err(|e| ApiError::Config(e.to_string()))?
            .map(Duration::from_millis);
        Ok(WarehouseGraphBuilder::default().build(&locations, timeout)?)
    }

    fn optimizer(&self) -> ApiResult<RouteOptimizer> {
        let speed = self
            .config
            .get_walking_speed_mps()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let pick_seconds = self
            .config
            .get_pick_time_seconds()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(RouteOptimizer::new(speed, pick_seconds))
    }
}

fn percent(current: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    (current as f64 / capacity as f64) * 100.0
}
