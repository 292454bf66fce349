use egui::{vec2, Vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    center: Vec2,
    half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }

        let span = (max - min).max_elem().max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span * 0.5 + 1.0,
        })
    }

    fn contains(self, p: Vec2) -> bool {
        let d = (p - self.center).abs();
        d.x <= self.half_extent && d.y <= self.half_extent
    }

    fn child(self, quadrant: usize) -> Self {
        let q = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-q, -q),
            1 => vec2(q, -q),
            2 => vec2(-q, q),
            _ => vec2(q, q),
        };
        Self {
            center: self.center + offset,
            half_extent: q,
        }
    }

    fn quadrant_for(self, p: Vec2) -> usize {
        usize::from(p.x >= self.center.x) + 2 * usize::from(p.y >= self.center.y)
    }

    fn side(self) -> f32 {
        self.half_extent * 2.0
    }
}

/// Barnes-Hut cell. Leaves keep their point indices, inner cells only aggregates.
pub(super) struct QuadNode {
    bounds: QuadBounds,
    center_of_mass: Vec2,
    mass: f32,
    indices: Vec<usize>,
    children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions)?;
        Some(Self::build_node(
            bounds,
            (0..positions.len()).collect(),
            positions,
            0,
        ))
    }

    fn build_node(bounds: QuadBounds, indices: Vec<usize>, positions: &[Vec2], depth: usize) -> Self {
        let mass = indices.len() as f32;
        let mut center_of_mass = indices.iter().fold(Vec2::ZERO, |acc, i| acc + positions[*i]);
        if mass > 0.0 {
            center_of_mass /= mass;
        }

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };
        if depth >= MAX_DEPTH || node.indices.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &i in &node.indices {
            buckets[bounds.quadrant_for(positions[i])].push(i);
        }
        // All points in one quadrant means they coincide at this resolution.
        if buckets.iter().filter(|b| !b.is_empty()).count() <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                positions,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Velocity change on point `index` from a uniform many-body force.
    ///
    /// `strength` is the per-node charge (negative repels). Cells whose side `w` satisfies
    /// `w² / θ² < d²` are treated as a single mass.
    pub(super) fn charge_on(
        &self,
        index: usize,
        positions: &[Vec2],
        strength: f32,
        theta2: f32,
        alpha: f32,
    ) -> Vec2 {
        if self.mass <= 0.0 {
            return Vec2::ZERO;
        }
        let p = positions[index];

        if self.is_leaf() {
            let mut dv = Vec2::ZERO;
            for &other in &self.indices {
                if other == index {
                    continue;
                }
                dv += pair_charge(positions[other] - p, index, other, strength, alpha);
            }
            return dv;
        }

        let delta = self.center_of_mass - p;
        let w = self.bounds.side();
        if !self.bounds.contains(p) && w * w / theta2 < delta.length_sq() {
            return pair_charge(delta, index, usize::MAX, strength * self.mass, alpha);
        }

        self.children
            .iter()
            .flatten()
            .map(|c| c.charge_on(index, positions, strength, theta2, alpha))
            .fold(Vec2::ZERO, |acc, v| acc + v)
    }
}

fn pair_charge(mut delta: Vec2, a: usize, b: usize, strength: f32, alpha: f32) -> Vec2 {
    if delta.length_sq() == 0.0 {
        delta = jiggle(a, b);
    }
    let mut l2 = delta.length_sq();
    // Soften very close pairs.
    if l2 < 1.0 {
        l2 = l2.sqrt();
    }
    delta * (strength * alpha / l2)
}

/// Small deterministic offset for coincident points.
pub(super) fn jiggle(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin()) * 1e-3
}
