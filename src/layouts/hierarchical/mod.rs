//! Layered layout for directed graphs.
//!
//! Cycles are broken by reversing DFS back edges, ranks come from the longest path,
//! edges spanning several ranks get virtual nodes, and barycenter sweeps reduce
//! crossings. Disconnected components are packed side by side.

use std::collections::{BTreeSet, HashMap, VecDeque};

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

use crate::{
    errors::LayoutError,
    layouts::{LayoutSnapshot, NodePosition},
    NodeId, SettingsSimulation,
};

const SWEEPS: usize = 8;

/// Orientation of the hierarchical layout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Ranks grow downward.
    #[default]
    TopDown,
    /// Ranks grow to the right.
    LeftRight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchical {
    /// Distance between ranks.
    pub level_distance: f32,
    /// Distance between neighbours within a rank, also the gap between components.
    pub node_separation: f32,
    pub orientation: Orientation,
}

impl Default for Hierarchical {
    fn default() -> Self {
        Self::new(&SettingsSimulation::default(), Orientation::default())
    }
}

impl Hierarchical {
    pub fn new(settings: &SettingsSimulation, orientation: Orientation) -> Self {
        Self {
            level_distance: settings.dag_level_distance,
            node_separation: settings.dag_node_separation,
            orientation,
        }
    }

    /// Lays out the whole snapshot in one pass, centred on `center`.
    ///
    /// Pins are ignored and every returned position releases its node's pin.
    pub fn layout(
        &self,
        snapshot: &LayoutSnapshot,
        center: Pos2,
    ) -> Result<Vec<NodePosition>, LayoutError> {
        snapshot.validate()?;
        let n = snapshot.nodes.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let index_of: HashMap<&NodeId, usize> = snapshot
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (&node.id, i))
            .collect();
        let edges: BTreeSet<(usize, usize)> = snapshot
            .edges
            .iter()
            .filter_map(|e| Some((*index_of.get(&e.source)?, *index_of.get(&e.target)?)))
            .filter(|(s, t)| s != t)
            .collect();

        // (cross axis, rank axis) before orientation is applied
        let mut coords = vec![Vec2::ZERO; n];
        let mut cursor = 0.0_f32;
        for component in components(n, &edges) {
            let local: HashMap<usize, usize> =
                component.iter().enumerate().map(|(l, g)| (*g, l)).collect();
            let local_edges: Vec<(usize, usize)> = edges
                .iter()
                .filter_map(|(s, t)| Some((*local.get(s)?, *local.get(t)?)))
                .collect();

            let placed = self.place_component(component.len(), &local_edges);
            let min = placed.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
            let max = placed.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
            for (l, p) in placed.into_iter().enumerate() {
                coords[component[l]] = Vec2::new(p.x - min + cursor, p.y);
            }
            cursor += max - min + self.node_separation * 2.0;
        }

        let oriented: Vec<Vec2> = coords
            .into_iter()
            .map(|c| match self.orientation {
                Orientation::TopDown => c,
                Orientation::LeftRight => Vec2::new(c.y, c.x),
            })
            .collect();
        let lo = oriented.iter().fold(Vec2::splat(f32::INFINITY), |a, p| a.min(*p));
        let hi = oriented.iter().fold(Vec2::splat(f32::NEG_INFINITY), |a, p| a.max(*p));
        let shift = center.to_vec2() - (lo + hi) * 0.5;

        Ok(snapshot
            .nodes
            .iter()
            .zip(oriented)
            .map(|(node, p)| NodePosition {
                id: node.id.clone(),
                location: (p + shift).to_pos2(),
                pinned: None,
            })
            .collect())
    }

    /// Places one connected component. Returns (cross, rank) coordinates per local node.
    fn place_component(&self, n: usize, edges: &[(usize, usize)]) -> Vec<Vec2> {
        let acyclic = break_cycles(n, edges);
        let rank = longest_path_ranks(n, &acyclic);
        let (mut layers, preds, succs) = build_layers(n, &acyclic, &rank);
        minimize_crossings(&mut layers, &preds, &succs);

        let mut res = vec![Vec2::ZERO; n];
        for (r, layer) in layers.iter().enumerate() {
            let mid = (layer.len() as f32 - 1.0) * 0.5;
            for (i, v) in layer.iter().enumerate() {
                if *v < n {
                    res[*v] = Vec2::new(
                        (i as f32 - mid) * self.node_separation,
                        r as f32 * self.level_distance,
                    );
                }
            }
        }
        res
    }
}

/// Weakly connected components, each sorted, ordered by their smallest node.
fn components(n: usize, edges: &BTreeSet<(usize, usize)>) -> Vec<Vec<usize>> {
    let mut adj = vec![Vec::new(); n];
    for (s, t) in edges {
        adj[*s].push(*t);
        adj[*t].push(*s);
    }

    let mut seen = vec![false; n];
    let mut res = Vec::new();
    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut comp = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for w in &adj[v] {
                if !seen[*w] {
                    seen[*w] = true;
                    comp.push(*w);
                    queue.push_back(*w);
                }
            }
        }
        comp.sort_unstable();
        res.push(comp);
    }
    res
}

/// Reverses DFS back edges. Sources are visited first so natural roots stay on top.
fn break_cycles(n: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut out = vec![Vec::new(); n];
    let mut indegree = vec![0; n];
    for (i, (s, t)) in edges.iter().enumerate() {
        out[*s].push(i);
        indegree[*t] += 1;
    }

    let starts = (0..n)
        .filter(|v| indegree[*v] == 0)
        .chain((0..n).filter(|v| indegree[*v] != 0));

    let mut mark = vec![Mark::New; n];
    let mut reversed = vec![false; edges.len()];
    for start in starts {
        if mark[start] != Mark::New {
            continue;
        }
        mark[start] = Mark::Active;
        let mut stack = vec![(start, 0_usize)];
        while let Some((v, next)) = stack.last_mut() {
            let Some(&e) = out[*v].get(*next) else {
                mark[*v] = Mark::Done;
                stack.pop();
                continue;
            };
            *next += 1;
            let w = edges[e].1;
            match mark[w] {
                Mark::Active => reversed[e] = true,
                Mark::New => {
                    mark[w] = Mark::Active;
                    stack.push((w, 0));
                }
                Mark::Done => {}
            }
        }
    }

    edges
        .iter()
        .zip(reversed)
        .map(|((s, t), r)| if r { (*t, *s) } else { (*s, *t) })
        .collect()
}

/// Rank of every node on a DAG: 0 for sources, otherwise one more than its deepest predecessor.
fn longest_path_ranks(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut out = vec![Vec::new(); n];
    let mut indegree = vec![0; n];
    for (s, t) in edges {
        out[*s].push(*t);
        indegree[*t] += 1;
    }

    let mut rank = vec![0; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|v| indegree[*v] == 0).collect();
    while let Some(v) = queue.pop_front() {
        for w in &out[v] {
            rank[*w] = rank[*w].max(rank[v] + 1);
            indegree[*w] -= 1;
            if indegree[*w] == 0 {
                queue.push_back(*w);
            }
        }
    }
    rank
}

type Layers = (Vec<Vec<usize>>, Vec<Vec<usize>>, Vec<Vec<usize>>);

/// Splits long edges with virtual nodes (ids `>= n`) and groups vertices by rank.
/// Returns the layers plus predecessor and successor lists per vertex.
fn build_layers(n: usize, edges: &[(usize, usize)], rank: &[usize]) -> Layers {
    let depth = rank.iter().max().map_or(0, |r| r + 1);
    let mut layers = vec![Vec::new(); depth];
    let mut vertex_rank = rank.to_vec();
    for v in 0..n {
        layers[rank[v]].push(v);
    }

    let mut segments = Vec::new();
    for (s, t) in edges {
        let mut prev = *s;
        for r in rank[*s] + 1..rank[*t] {
            let virt = vertex_rank.len();
            vertex_rank.push(r);
            layers[r].push(virt);
            segments.push((prev, virt));
            prev = virt;
        }
        segments.push((prev, *t));
    }

    let mut preds = vec![Vec::new(); vertex_rank.len()];
    let mut succs = vec![Vec::new(); vertex_rank.len()];
    for (s, t) in segments {
        succs[s].push(t);
        preds[t].push(s);
    }
    (layers, preds, succs)
}

fn minimize_crossings(layers: &mut [Vec<usize>], preds: &[Vec<usize>], succs: &[Vec<usize>]) {
    let mut order = vec![0.0_f32; preds.len()];
    for layer in layers.iter() {
        for (i, v) in layer.iter().enumerate() {
            order[*v] = i as f32;
        }
    }

    let mut best = layers.to_vec();
    let mut best_crossings = count_crossings(layers, succs, &order);
    for _ in 0..SWEEPS {
        if best_crossings == 0 {
            break;
        }
        for r in 1..layers.len() {
            reorder(&mut layers[r], preds, &mut order);
        }
        for r in (0..layers.len().saturating_sub(1)).rev() {
            reorder(&mut layers[r], succs, &mut order);
        }
        let crossings = count_crossings(layers, succs, &order);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = layers.to_vec();
        }
    }
    layers.clone_from_slice(&best);
}

/// Sorts a layer by the mean position of each vertex's neighbours in the adjacent layer.
/// Vertices without neighbours keep their slot value.
fn reorder(layer: &mut [usize], neighbours: &[Vec<usize>], order: &mut [f32]) {
    let mut keyed: Vec<(f32, f32, usize)> = layer
        .iter()
        .map(|v| {
            let ns = &neighbours[*v];
            let bary = if ns.is_empty() {
                order[*v]
            } else {
                ns.iter().map(|w| order[*w]).sum::<f32>() / ns.len() as f32
            };
            (bary, order[*v], *v)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    for (i, (_, _, v)) in keyed.into_iter().enumerate() {
        layer[i] = v;
        order[v] = i as f32;
    }
}

fn count_crossings(layers: &[Vec<usize>], succs: &[Vec<usize>], order: &[f32]) -> usize {
    let mut total = 0;
    for layer in layers {
        let segs: Vec<(f32, f32)> = layer
            .iter()
            .flat_map(|v| succs[*v].iter().map(move |w| (order[*v], order[*w])))
            .collect();
        for (i, a) in segs.iter().enumerate() {
            for b in &segs[i + 1..] {
                if (a.0 - b.0) * (a.1 - b.1) < 0.0 {
                    total += 1;
                }
            }
        }
    }
    total
}
