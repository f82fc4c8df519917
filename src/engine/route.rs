// ==========================================
// 仓储决策核心 - 拣选路径引擎
// ==========================================
// 算法: 最近邻启发式 + 图最短路距离（不可达回退欧氏距离）
// 起点: 发货库位（编码最小）; 无发货库位时取编码最小节点
// 红线: 相同输入必得相同路径（并列取编码升序）
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::graph::WarehouseGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// 步行速度默认值（米/秒）
pub const DEFAULT_WALKING_SPEED_MPS: f64 = 2.0;

/// 单步拣选耗时默认值（秒）
pub const DEFAULT_PICK_TIME_SECONDS: f64 = 30.0;

// ==========================================
// 输入与输出结构
// ==========================================

/// 拣选需求: 一个 SKU 的出库量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickDemand {
    pub sku: String,
    pub quantity: i64,
}

/// 拣选任务: 需求解析到具体库位/批次后的中间形态
#[derive(Debug, Clone)]
pub struct PickTask {
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub location_code: String,
    pub zone: String,
    pub aisle: String,
    pub lot_number: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 路径中的一步
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickStep {
    pub sequence: usize,
    pub location_code: String,
    pub zone: String,
    pub aisle: String,
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub lot_number: Option<String>,
    /// 与上一停留点的行走距离（同库位多任务时为 0）
    pub distance_from_previous_m: f64,
    pub x: f64,
    pub y: f64,
}

/// 优化后的完整拣选路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRoute {
    pub start_location: String,
    pub steps: Vec<PickStep>,
    /// 任务条目数
    pub total_items: usize,
    /// 拣选总件数
    pub total_units: i64,
    /// 含返回起点的总行走距离（米）
    pub total_distance_m: f64,
    /// 预计耗时（整分钟, 截断）
    pub estimated_minutes: i64,
}

/// route_distance 的分段明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSegment {
    pub from: String,
    pub to: String,
    pub distance_m: f64,
    pub path: Vec<String>,
}

/// 给定途经点序列的距离核算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDistanceReport {
    pub total_distance_m: f64,
    pub segments: Vec<RouteSegment>,
}

// ==========================================
// RouteOptimizer - 路径优化器
// ==========================================
pub struct RouteOptimizer {
    walking_speed_mps: f64,
    pick_time_seconds: f64,
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self {
            walking_speed_mps: DEFAULT_WALKING_SPEED_MPS,
            pick_time_seconds: DEFAULT_PICK_TIME_SECONDS,
        }
    }
}

impl RouteOptimizer {
    pub fn new(walking_speed_mps: f64, pick_time_seconds: f64) -> Self {
        Self {
            walking_speed_mps,
            pick_time_seconds,
        }
    }

    /// 最近邻遍历全部任务库位。
    ///
    /// - 任务为空 -> InvalidInput
    /// - 图无节点 -> EmptyWarehouse
    /// - 距离优先取图最短路，图不可达时回退欧氏距离
    /// - 并列距离取库位编码更小者，保证确定性
    /// - 结束后计入返回起点的距离（可解析时）
    pub fn optimize(&self, graph: &WarehouseGraph, tasks: &[PickTask]) -> EngineResult<PickRoute> {
        if tasks.is_empty() {
            return Err(EngineError::InvalidInput("拣选任务为空".to_string()));
        }

        let anchor = self.select_anchor(graph)?;

        // 库位 -> 任务分组（BTreeMap 保证库位与组内顺序确定）
        let mut by_location: BTreeMap<String, Vec<&PickTask>> = BTreeMap::new();
        for task in tasks {
            by_location
                .entry(task.location_code.clone())
                .or_default()
                .push(task);
        }
        for group in by_location.values_mut() {
            group.sort_by(|a, b| a.sku.cmp(&b.sku));
        }

        let mut remaining: Vec<String> = by_location.keys().cloned().collect();
        let mut steps: Vec<PickStep> = Vec::with_capacity(tasks.len());
        let mut current = anchor.clone();
        let mut total_distance = 0.0_f64;
        let mut sequence = 0_usize;

        while !remaining.is_empty() {
            // 最近邻选择: 距离严格更小才替换，编码升序遍历保证并列确定
            let mut best_idx = 0_usize;
            let mut best_distance = f64::INFINITY;
            for (idx, code) in remaining.iter().enumerate() {
                let candidate = self.travel_distance(graph, &by_location, &current, code);
                if candidate < best_distance {
                    best_distance = candidate;
                    best_idx = idx;
                }
            }

            let next_code = remaining.remove(best_idx);
            let leg = if best_distance.is_finite() {
                best_distance
            } else {
                0.0
            };
            total_distance += leg;

            let group = &by_location[&next_code];
            for (i, task) in group.iter().enumerate() {
                sequence += 1;
                steps.push(PickStep {
                    sequence,
                    location_code: task.location_code.clone(),
                    zone: task.zone.clone(),
                    aisle: task.aisle.clone(),
                    sku: task.sku.clone(),
                    product_name: task.product_name.clone(),
                    quantity: task.quantity,
                    lot_number: task.lot_number.clone(),
                    distance_from_previous_m: if i == 0 { leg } else { 0.0 },
                    x: task.x,
                    y: task.y,
                });
            }
            current = next_code;
        }

        // 返回起点（距离可解析时计入）
        let return_leg = self.travel_distance(graph, &by_location, &current, &anchor);
        if return_leg.is_finite() {
            total_distance += return_leg;
        }

        let total_units: i64 = tasks.iter().map(|t| t.quantity).sum();
        let walk_seconds = if self.walking_speed_mps > 0.0 {
            total_distance / self.walking_speed_mps
        } else {
            0.0
        };
        let estimated_minutes =
            ((walk_seconds + steps.len() as f64 * self.pick_time_seconds) / 60.0) as i64;

        debug!(
            start = %anchor,
            stops = steps.len(),
            distance_m = total_distance,
            "拣选路径生成完成"
        );

        Ok(PickRoute {
            start_location: anchor,
            steps,
            total_items: tasks.len(),
            total_units,
            total_distance_m: total_distance,
            estimated_minutes,
        })
    }

    /// 给定途经点序列核算总距离（逐段图最短路）。
    ///
    /// - 少于 2 个途经点 -> InvalidInput
    /// - 编码不在图中 -> UnknownLocation
    /// - 两点不连通 -> GraphUnreachable
    pub fn route_distance(
        &self,
        graph: &WarehouseGraph,
        codes: &[String],
    ) -> EngineResult<RouteDistanceReport> {
        if codes.len() < 2 {
            return Err(EngineError::InvalidInput(
                "距离核算至少需要 2 个途经点".to_string(),
            ));
        }
        for code in codes {
            if !graph.contains(code) {
                return Err(EngineError::UnknownLocation(code.clone()));
            }
        }

        let mut segments = Vec::with_capacity(codes.len() - 1);
        let mut total = 0.0_f64;
        for pair in codes.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let (distance, path) =
                graph
                    .shortest_path(from, to)
                    .ok_or_else(|| EngineError::GraphUnreachable {
                        from: from.clone(),
                        to: to.clone(),
                    })?;
            total += distance;
            segments.push(RouteSegment {
                from: from.clone(),
                to: to.clone(),
                distance_m: distance,
                path,
            });
        }

        Ok(RouteDistanceReport {
            total_distance_m: total,
            segments,
        })
    }

    /// 起点选择: 编码最小的发货库位，缺省取编码最小节点
    fn select_anchor(&self, graph: &WarehouseGraph) -> EngineResult<String> {
        let shipping = graph
            .nodes()
            .find(|n| n.location_type == crate::domain::types::LocationType::Shipping);
        if let Some(node) = shipping {
            return Ok(node.code.clone());
        }
        graph
            .nodes()
            .next()
            .map(|n| n.code.clone())
            .ok_or(EngineError::EmptyWarehouse)
    }

    /// 两个库位编码间的行走距离。
    ///
    /// 图最短路优先; 图不可达时回退两点欧氏距离（坐标取图节点，
    /// 节点缺失时取任务携带的坐标）。都解析不了返回 INFINITY。
    fn travel_distance(
        &self,
        graph: &WarehouseGraph,
        by_location: &BTreeMap<String, Vec<&PickTask>>,
        from: &str,
        to: &str,
    ) -> f64 {
        if from == to {
            return 0.0;
        }
        if let Some(d) = graph.shortest_path_distance(from, to) {
            return d;
        }
        let from_xy = self.coordinates_of(graph, by_location, from);
        let to_xy = self.coordinates_of(graph, by_location, to);
        match (from_xy, to_xy) {
            (Some((x1, y1, z1)), Some((x2, y2, z2))) => {
                let (dx, dy, dz) = (x1 - x2, y1 - y2, z1 - z2);
                (dx * dx + dy * dy + dz * dz).sqrt()
            }
            _ => f64::INFINITY,
        }
    }

    fn coordinates_of(
        &self,
        graph: &WarehouseGraph,
        by_location: &BTreeMap<String, Vec<&PickTask>>,
        code: &str,
    ) -> Option<(f64, f64, f64)> {
        if let Some(node) = graph.node(code) {
            return Some((node.x, node.y, node.z));
        }
        by_location
            .get(code)
            .and_then(|group| group.first())
            .map(|task| (task.x, task.y, task.z))
    }
}
