use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use egui::{Pos2, Rect, Vec2};
use instant::Instant;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::quadtree::{jiggle, QuadNode};
use crate::{
    errors::LayoutError,
    layouts::{validate_viewport, LayoutSnapshot, NodePosition},
    NodeId, SettingsSimulation,
};

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f32,
    /// Share of the correction applied to the target, by relative degree.
    bias: f32,
}

/// Velocity Verlet force simulation with many-body charge, link springs and centering.
///
/// Alpha starts at 1 and decays geometrically toward 0; every force is scaled by it.
#[derive(Debug)]
pub struct ForceSimulation {
    ids: Vec<NodeId>,
    pos: Vec<Vec2>,
    vel: Vec<Vec2>,
    fixed: Vec<Option<Vec2>>,
    links: Vec<Link>,

    settings: SettingsSimulation,
    center: Vec2,

    alpha: f32,
    ticks: u32,
    started: Instant,
}

impl ForceSimulation {
    pub fn new(
        snapshot: &LayoutSnapshot,
        settings: &SettingsSimulation,
        viewport: Rect,
    ) -> Result<Self, LayoutError> {
        snapshot.validate()?;
        validate_viewport(viewport)?;

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let n = snapshot.nodes.len();
        let mut ids = Vec::with_capacity(n);
        let mut pos = Vec::with_capacity(n);
        let mut fixed = Vec::with_capacity(n);
        let mut index_of = HashMap::with_capacity(n);

        for (i, node) in snapshot.nodes.iter().enumerate() {
            let start = node.pinned.or(node.location).unwrap_or_else(|| {
                Pos2::new(
                    rng.random_range(viewport.min.x..=viewport.max.x),
                    rng.random_range(viewport.min.y..=viewport.max.y),
                )
            });
            index_of.insert(&node.id, i);
            ids.push(node.id.clone());
            pos.push(start.to_vec2());
            fixed.push(node.pinned.map(Pos2::to_vec2));
        }

        let mut degree = vec![0_usize; n];
        let mut pairs = Vec::with_capacity(snapshot.edges.len());
        for e in &snapshot.edges {
            // validate() guarantees both endpoints resolve.
            let (Some(&s), Some(&t)) = (index_of.get(&e.source), index_of.get(&e.target)) else {
                continue;
            };
            if s == t {
                continue;
            }
            degree[s] += 1;
            degree[t] += 1;
            pairs.push((s, t));
        }
        let links = pairs
            .into_iter()
            .map(|(s, t)| Link {
                source: s,
                target: t,
                strength: settings
                    .link_strength
                    .unwrap_or_else(|| 1.0 / degree[s].min(degree[t]) as f32),
                bias: degree[s] as f32 / (degree[s] + degree[t]) as f32,
            })
            .collect();

        Ok(Self {
            ids,
            vel: vec![Vec2::ZERO; n],
            pos,
            fixed,
            links,
            settings: settings.clone(),
            center: viewport.center().to_vec2(),
            alpha: 1.0,
            ticks: 0,
            started: Instant::now(),
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// True once alpha fell below `alpha_min` or a cooldown limit was hit.
    pub fn is_done(&self) -> bool {
        self.alpha < self.settings.alpha_min
            || self.ticks >= self.settings.cooldown_ticks
            || self.started.elapsed().as_millis() >= u128::from(self.settings.cooldown_time_ms)
    }

    /// Advances the simulation by one counted tick.
    pub fn tick(&mut self) {
        self.step();
        self.ticks += 1;
    }

    fn step(&mut self) {
        self.alpha += (0.0 - self.alpha) * self.settings.alpha_decay;

        self.apply_links();
        self.apply_charge();
        self.apply_center();

        let keep = 1.0 - self.settings.velocity_decay;
        for ((p, v), f) in self.pos.iter_mut().zip(&mut self.vel).zip(&self.fixed) {
            if let Some(f) = f {
                *p = *f;
                *v = Vec2::ZERO;
            } else {
                *v *= keep;
                *p += *v;
            }
        }
    }

    fn apply_links(&mut self) {
        let distance = self.settings.link_distance;
        for (i, link) in self.links.iter().enumerate() {
            let (s, t) = (link.source, link.target);
            let mut delta = self.pos[t] + self.vel[t] - self.pos[s] - self.vel[s];
            if delta.length_sq() == 0.0 {
                delta = jiggle(i, t);
            }
            let l = delta.length();
            let k = (l - distance) / l * self.alpha * link.strength;
            let delta = delta * k;
            self.vel[t] -= delta * link.bias;
            self.vel[s] += delta * (1.0 - link.bias);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.settings.charge_strength;
        if strength == 0.0 {
            return;
        }
        let Some(tree) = QuadNode::build(&self.pos) else {
            return;
        };
        let theta2 = self.settings.theta * self.settings.theta;
        for i in 0..self.pos.len() {
            if self.fixed[i].is_some() {
                continue;
            }
            self.vel[i] += tree.charge_on(i, &self.pos, strength, theta2, self.alpha);
        }
    }

    fn apply_center(&mut self) {
        if self.pos.is_empty() {
            return;
        }
        let mean = self.pos.iter().fold(Vec2::ZERO, |a, p| a + *p) / self.pos.len() as f32;
        let shift = (mean - self.center) * self.settings.center_strength;
        for p in &mut self.pos {
            *p -= shift;
        }
    }

    /// Current positions. Pins are reported unchanged.
    pub fn positions(&self) -> Vec<NodePosition> {
        self.ids
            .iter()
            .zip(&self.pos)
            .zip(&self.fixed)
            .map(|((id, p), f)| NodePosition {
                id: id.clone(),
                location: p.to_pos2(),
                pinned: f.map(Vec2::to_pos2),
            })
            .collect()
    }

    /// Converged positions with every node pinned where it came to rest.
    pub fn frozen_positions(&self) -> Vec<NodePosition> {
        self.ids
            .iter()
            .zip(&self.pos)
            .map(|(id, p)| NodePosition {
                id: id.clone(),
                location: p.to_pos2(),
                pinned: Some(p.to_pos2()),
            })
            .collect()
    }

    /// Runs warmup and counted ticks to completion.
    ///
    /// `progress` receives the completed fraction and current positions every
    /// `ceil(cooldown_ticks / 10)` ticks. Returns `None` as soon as `cancel` is set.
    pub fn run(
        &mut self,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(f32, Vec<NodePosition>),
    ) -> Option<Vec<NodePosition>> {
        for _ in 0..self.settings.warmup_ticks {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            self.step();
        }

        let iterations = self.settings.cooldown_ticks.max(1);
        let every = iterations.div_ceil(10);
        while !self.is_done() {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            self.tick();
            if self.ticks % every == 0 && !self.is_done() {
                progress(self.ticks as f32 / iterations as f32, self.positions());
            }
        }
        Some(self.frozen_positions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{layouts::LayoutNode, layouts::LayoutEdge, EdgeId};

    fn snapshot(n: usize, edges: &[(usize, usize)]) -> LayoutSnapshot {
        LayoutSnapshot {
            nodes: (0..n)
                .map(|i| LayoutNode {
                    id: NodeId::from(format!("n{i}")),
                    location: None,
                    pinned: None,
                    size: Vec2::splat(10.0),
                })
                .collect(),
            edges: edges
                .iter()
                .enumerate()
                .map(|(i, (s, t))| LayoutEdge {
                    id: EdgeId::from(format!("e{i}")),
                    source: NodeId::from(format!("n{s}")),
                    target: NodeId::from(format!("n{t}")),
                })
                .collect(),
        }
    }

    fn viewport() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::splat(500.0))
    }

    #[test]
    fn fifty_nodes_converge_to_finite_positions() {
        let edges: Vec<(usize, usize)> = (1..50).map(|i| (i / 2, i)).collect();
        let snap = snapshot(50, &edges);
        let mut sim = ForceSimulation::new(&snap, &SettingsSimulation::default(), viewport()).unwrap();
        let mut reports = 0;
        let res = sim
            .run(&AtomicBool::new(false), &mut |_, _| reports += 1)
            .unwrap();

        assert_eq!(res.len(), 50);
        assert!(sim.is_done());
        assert!(reports > 0);
        for p in &res {
            assert!(p.location.x.is_finite() && p.location.y.is_finite());
            assert_eq!(p.pinned, Some(p.location));
        }
    }

    #[test]
    fn alpha_decays_geometrically() {
        let mut sim =
            ForceSimulation::new(&snapshot(3, &[]), &SettingsSimulation::default(), viewport())
                .unwrap();
        sim.tick();
        assert!((sim.alpha() - 0.955).abs() < 1e-6);
        sim.tick();
        assert!((sim.alpha() - 0.955 * 0.955).abs() < 1e-6);
    }

    #[test]
    fn pinned_node_never_moves() {
        let mut snap = snapshot(10, &[(0, 1), (1, 2), (2, 3)]);
        snap.nodes[1].pinned = Some(Pos2::new(42.0, 7.0));
        let mut sim = ForceSimulation::new(&snap, &SettingsSimulation::default(), viewport()).unwrap();
        for _ in 0..50 {
            sim.tick();
            assert_eq!(sim.positions()[1].location, Pos2::new(42.0, 7.0));
        }
    }

    #[test]
    fn linked_pair_settles_near_link_distance() {
        let settings = SettingsSimulation {
            charge_strength: 0.0,
            ..Default::default()
        };
        let mut snap = snapshot(2, &[(0, 1)]);
        snap.nodes[0].location = Some(Pos2::new(0.0, 0.0));
        snap.nodes[1].location = Some(Pos2::new(200.0, 0.0));
        let mut sim = ForceSimulation::new(&snap, &settings, viewport()).unwrap();
        let res = sim.run(&AtomicBool::new(false), &mut |_, _| {}).unwrap();
        let d = res[0].location.distance(res[1].location);
        assert!((d - settings.link_distance).abs() < 10.0, "distance {d}");
    }

    #[test]
    fn same_seed_same_layout() {
        let snap = snapshot(20, &[(0, 1), (2, 3), (3, 4)]);
        let run = || {
            let mut sim =
                ForceSimulation::new(&snap, &SettingsSimulation::default(), viewport()).unwrap();
            for _ in 0..30 {
                sim.tick();
            }
            sim.positions()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn cancel_stops_run() {
        let mut sim =
            ForceSimulation::new(&snapshot(5, &[]), &SettingsSimulation::default(), viewport())
                .unwrap();
        assert!(sim.run(&AtomicBool::new(true), &mut |_, _| {}).is_none());
    }

    #[test]
    fn empty_snapshot_finishes_immediately() {
        let mut sim =
            ForceSimulation::new(&snapshot(0, &[]), &SettingsSimulation::default(), viewport())
                .unwrap();
        assert_eq!(sim.run(&AtomicBool::new(false), &mut |_, _| {}), Some(vec![]));
    }

    #[test]
    fn inverted_viewport_is_rejected() {
        let inverted = Rect::from_min_max(Pos2::new(10.0, 10.0), Pos2::ZERO);
        let res = ForceSimulation::new(&snapshot(3, &[]), &SettingsSimulation::default(), inverted);
        assert!(matches!(res, Err(LayoutError::InvalidViewport(_))));
    }
}
