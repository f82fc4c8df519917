// ==========================================
// 仓储决策核心 - 仓库图引擎
// ==========================================
// 节点: 有效库位; 边: 同区同巷道（欧氏距离权重）
//       或同区近距（< 阈值, 权重 x 跨巷道系数）
// 红线: 图构建确定性 - 相同库位集合必得相同图
// 红线: 超时不返回部分图
// ==========================================

use crate::domain::location::Location;
use crate::domain::types::LocationType;
use crate::engine::error::{EngineError, EngineResult};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::time::{Duration, Instant};
use tracing::debug;

/// 同区跨巷道连边的距离阈值（米）
pub const DEFAULT_PROXIMITY_THRESHOLD_M: f64 = 20.0;

/// 跨巷道边的权重放大系数（绕行代价）
pub const AISLE_CROSS_PENALTY: f64 = 1.5;

// ==========================================
// GraphNode - 图节点
// ==========================================
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub code: String,
    pub zone: String,
    pub aisle: String,
    pub location_type: LocationType,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GraphNode {
    fn from_location(loc: &Location) -> Self {
        Self {
            code: loc.code.clone(),
            zone: loc.zone.clone(),
            aisle: loc.aisle.clone(),
            location_type: loc.location_type,
            x: loc.x_coordinate,
            y: loc.y_coordinate,
            z: loc.z_coordinate,
        }
    }

    /// 与另一节点的欧氏距离（米）
    pub fn euclidean_to(&self, other: &GraphNode) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ==========================================
// WarehouseGraph - 仓库无向加权图
// ==========================================
/// 邻接表与节点表均使用 BTreeMap，保证遍历顺序确定。
#[derive(Debug, Clone)]
pub struct WarehouseGraph {
    nodes: BTreeMap<String, GraphNode>,
    adjacency: BTreeMap<String, Vec<(String, f64)>>,
}

impl WarehouseGraph {
    pub fn node(&self, code: &str) -> Option<&GraphNode> {
        self.nodes.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.nodes.contains_key(code)
    }

    /// 节点迭代（编码升序）
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// 无向边数
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|v| v.len()).sum::<usize>() / 2
    }

    pub fn neighbors(&self, code: &str) -> &[(String, f64)] {
        self.adjacency
            .get(code)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 最短路径距离（Dijkstra）。不可达或节点缺失返回 None。
    pub fn shortest_path_distance(&self, from: &str, to: &str) -> Option<f64> {
        self.shortest_path(from, to).map(|(dist, _)| dist)
    }

    /// 最短路径（Dijkstra），返回 (距离, 途经编码序列)。
    ///
    /// 权重为非负距离，f64 用 total_cmp 比较保证堆序良定。
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<(f64, Vec<String>)> {
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return None;
        }
        if from == to {
            return Some((0.0, vec![from.to_string()]));
        }

        let mut dist: BTreeMap<&str, f64> = BTreeMap::new();
        let mut prev: BTreeMap<&str, &str> = BTreeMap::new();
        let mut heap: BinaryHeap<HeapEntry<'_>> = BinaryHeap::new();

        dist.insert(from, 0.0);
        heap.push(HeapEntry {
            cost: 0.0,
            code: from,
        });

        while let Some(HeapEntry { cost, code }) = heap.pop() {
            if code == to {
                // 回溯路径
                let mut path = vec![to.to_string()];
                let mut cursor = to;
                while let Some(&p) = prev.get(cursor) {
                    path.push(p.to_string());
                    cursor = p;
                }
                path.reverse();
                return Some((cost, path));
            }
            if let Some(&best) = dist.get(code) {
                if cost > best {
                    continue;
                }
            }
            if let Some(edges) = self.adjacency.get(code) {
                for (next, weight) in edges {
                    let next_cost = cost + weight;
                    let better = match dist.get(next.as_str()) {
                        Some(&d) => next_cost < d,
                        None => true,
                    };
                    if better {
                        dist.insert(next.as_str(), next_cost);
                        prev.insert(next.as_str(), code);
                        heap.push(HeapEntry {
                            cost: next_cost,
                            code: next.as_str(),
                        });
                    }
                }
            }
        }
        None
    }
}

/// Dijkstra 堆元素（最小堆: 反转比较; 代价相同按编码升序）
struct HeapEntry<'a> {
    cost: f64,
    code: &'a str,
}

impl PartialEq for HeapEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.code == other.code
    }
}

impl Eq for HeapEntry<'_> {}

impl Ord for HeapEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.code.cmp(self.code))
    }
}

impl PartialOrd for HeapEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ==========================================
// WarehouseGraphBuilder - 图构建器
// ==========================================
pub struct WarehouseGraphBuilder {
    proximity_threshold_m: f64,
}

impl Default for WarehouseGraphBuilder {
    fn default() -> Self {
        Self {
            proximity_threshold_m: DEFAULT_PROXIMITY_THRESHOLD_M,
        }
    }
}

impl WarehouseGraphBuilder {
    pub fn new(proximity_threshold_m: f64) -> Self {
        Self {
            proximity_threshold_m,
        }
    }

    /// 从库位集合构建图。
    ///
    /// - 仅纳入 is_active 的库位
    /// - 同区同巷道: 必连，权重 = 欧氏距离
    /// - 同区跨巷道且距离 < 阈值: 连边，权重 = 欧氏距离 x 1.5
    /// - deadline 给定时，O(n^2) 连边过程逐行检查耗时，超时返回
    ///   Timeout 且不产生部分图
    pub fn build(
        &self,
        locations: &[Location],
        deadline: Option<Duration>,
    ) -> EngineResult<WarehouseGraph> {
        let started = Instant::now();

        let mut nodes: BTreeMap<String, GraphNode> = BTreeMap::new();
        for loc in locations.iter().filter(|l| l.is_active) {
            nodes.insert(loc.code.clone(), GraphNode::from_location(loc));
        }

        let mut adjacency: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
        for code in nodes.keys() {
            adjacency.insert(code.clone(), Vec::new());
        }

        let codes: Vec<&String> = nodes.keys().collect();
        for (i, a_code) in codes.iter().enumerate() {
            if let Some(limit) = deadline {
                let elapsed = started.elapsed();
                if elapsed > limit {
                    return Err(EngineError::Timeout {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
            let a = &nodes[*a_code];
            for b_code in codes.iter().skip(i + 1) {
                let b = &nodes[*b_code];
                if a.zone != b.zone {
                    continue;
                }
                let distance = a.euclidean_to(b);
                let weight = if a.aisle == b.aisle {
                    distance
                } else if distance < self.proximity_threshold_m {
                    distance * AISLE_CROSS_PENALTY
                } else {
                    continue;
                };
                adjacency
                    .entry((*a_code).clone())
                    .or_default()
                    .push(((*b_code).clone(), weight));
                adjacency
                    .entry((*b_code).clone())
                    .or_default()
                    .push(((*a_code).clone(), weight));
            }
        }

        // 邻接表内部排序，消除构建顺序的影响
        for edges in adjacency.values_mut() {
            edges.sort_by(|(c1, w1), (c2, w2)| c1.cmp(c2).then(w1.total_cmp(w2)));
        }

        let graph = WarehouseGraph { nodes, adjacency };
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "仓库图构建完成"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LocationType;

    fn loc(code: &str, zone: &str, aisle: &str, x: f64, y: f64) -> Location {
        let mut l = Location::new(code, zone, aisle, LocationType::Storage);
        l.x_coordinate = x;
        l.y_coordinate = y;
        l
    }

    #[test]
    fn test_same_aisle_edge_weight_is_euclidean() {
        let locations = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("A-02", "A", "1", 3.0, 4.0)];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        let edges = graph.neighbors("A-01");
        assert_eq!(edges.len(), 1);
        assert!((edges[0].1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_aisle_edge_gets_penalty() {
        let locations = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("A-11", "A", "2", 0.0, 10.0)];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        let edges = graph.neighbors("A-01");
        assert_eq!(edges.len(), 1);
        assert!((edges[0].1 - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_zone_never_connected() {
        let locations = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("B-01", "B", "1", 1.0, 0.0)];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.shortest_path_distance("A-01", "B-01").is_none());
    }

    #[test]
    fn test_cross_aisle_at_threshold_not_connected() {
        // 阈值为严格上界: 恰好 20.0 米不连边, 略小于阈值连边
        let at_threshold = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("A-21", "A", "2", 0.0, 20.0)];
        let graph = WarehouseGraphBuilder::default()
            .build(&at_threshold, None)
            .unwrap();
        assert_eq!(graph.edge_count(), 0);

        let just_under = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("A-21", "A", "2", 0.0, 19.9)];
        let graph = WarehouseGraphBuilder::default()
            .build(&just_under, None)
            .unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_far_cross_aisle_not_connected() {
        let locations = vec![loc("A-01", "A", "1", 0.0, 0.0), loc("A-99", "A", "2", 0.0, 50.0)];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_inactive_location_excluded() {
        let mut inactive = loc("A-02", "A", "1", 1.0, 0.0);
        inactive.is_active = false;
        let locations = vec![loc("A-01", "A", "1", 0.0, 0.0), inactive];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(!graph.contains("A-02"));
    }

    #[test]
    fn test_shortest_path_prefers_cheaper_route() {
        // A-01 -> A-02 直连 10; A-01 -> A-03 -> A-02 共 4 + 4 = 8
        let locations = vec![
            loc("A-01", "A", "1", 0.0, 0.0),
            loc("A-02", "A", "1", 10.0, 0.0),
            loc("A-03", "A", "1", 4.0, 0.0),
        ];
        let graph = WarehouseGraphBuilder::default()
            .build(&locations, None)
            .unwrap();
        let (dist, path) = graph.shortest_path("A-01", "A-02").unwrap();
        // 共线节点: 途经 A-03 与直连等价，距离都是 10
        assert!((dist - 10.0).abs() < 1e-9);
        assert_eq!(path.first().map(String::as_str), Some("A-01"));
        assert_eq!(path.last().map(String::as_str), Some("A-02"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let forward = vec![
            loc("A-01", "A", "1", 0.0, 0.0),
            loc("A-02", "A", "1", 5.0, 0.0),
            loc("A-11", "A", "2", 0.0, 8.0),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let builder = WarehouseGraphBuilder::default();
        let g1 = builder.build(&forward, None).unwrap();
        let g2 = builder.build(&reversed, None).unwrap();

        assert_eq!(g1.node_count(), g2.node_count());
        assert_eq!(g1.edge_count(), g2.edge_count());
        for node in g1.nodes() {
            assert_eq!(g1.neighbors(&node.code).len(), g2.neighbors(&node.code).len());
            for (e1, e2) in g1.neighbors(&node.code).iter().zip(g2.neighbors(&node.code)) {
                assert_eq!(e1.0, e2.0);
                assert!((e1.1 - e2.1).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_deadline_times_out() {
        let locations: Vec<Location> = (0..64)
            .map(|i| loc(&format!("A-{:02}", i), "A", "1", i as f64, 0.0))
            .collect();
        let err = WarehouseGraphBuilder::default()
            .build(&locations, Some(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }));
    }
}
