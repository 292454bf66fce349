use std::collections::BTreeMap;

use egui::{Color32, Theme};
use serde::{Deserialize, Serialize};

/// Valid range of a numeric setting. The host validates input, the core only exposes these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl SettingRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }

    pub fn clamp(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }

    pub fn contains(&self, v: f32) -> bool {
        (self.min..=self.max).contains(&v)
    }
}

/// Force and hierarchical layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSimulation {
    /// Alpha moves toward zero by this fraction each tick.
    pub alpha_decay: f32,

    /// Simulation stops once alpha falls below this.
    pub alpha_min: f32,

    /// Fraction of velocity lost each tick.
    pub velocity_decay: f32,

    /// Many-body strength, negative repels.
    pub charge_strength: f32,

    /// Barnes-Hut accuracy, lower is more exact.
    pub theta: f32,

    /// Link rest length.
    pub link_distance: f32,

    /// Link stiffness. `None` derives it from endpoint degrees.
    pub link_strength: Option<f32>,

    /// Pull toward the viewport centre.
    pub center_strength: f32,

    /// Maximum ticks before the simulation is stopped.
    pub cooldown_ticks: u32,

    /// Maximum wall time before the simulation is stopped.
    pub cooldown_time_ms: u64,

    /// Ticks run before the first progress report.
    pub warmup_ticks: u32,

    /// Distance between hierarchy ranks.
    pub dag_level_distance: f32,

    /// Minimum distance between nodes of the same rank.
    pub dag_node_separation: f32,

    /// Seed for initial placement of nodes without a location.
    pub seed: u64,
}

impl Default for SettingsSimulation {
    fn default() -> Self {
        Self {
            alpha_decay: 0.045,
            alpha_min: 0.001,
            velocity_decay: 0.41,
            charge_strength: -30.0,
            theta: 0.9,
            link_distance: 30.0,
            link_strength: None,
            center_strength: 1.0,
            cooldown_ticks: 300,
            cooldown_time_ms: 15_000,
            warmup_ticks: 0,
            dag_level_distance: 80.0,
            dag_node_separation: 40.0,
            seed: 42,
        }
    }
}

impl SettingsSimulation {
    pub const ALPHA_DECAY: SettingRange = SettingRange::new(0.0, 1.0, 0.005);
    pub const VELOCITY_DECAY: SettingRange = SettingRange::new(0.0, 1.0, 0.01);
    pub const CHARGE_STRENGTH: SettingRange = SettingRange::new(-1000.0, 0.0, 1.0);
    pub const THETA: SettingRange = SettingRange::new(0.1, 2.0, 0.05);
    pub const LINK_DISTANCE: SettingRange = SettingRange::new(1.0, 500.0, 1.0);
    pub const COOLDOWN_TICKS: SettingRange = SettingRange::new(1.0, 5000.0, 1.0);
    pub const DAG_LEVEL_DISTANCE: SettingRange = SettingRange::new(10.0, 500.0, 5.0);
    pub const DAG_NODE_SEPARATION: SettingRange = SettingRange::new(5.0, 300.0, 5.0);

    /// Copy with every ranged value clamped into its range.
    pub fn clamped(&self) -> Self {
        Self {
            alpha_decay: Self::ALPHA_DECAY.clamp(self.alpha_decay),
            velocity_decay: Self::VELOCITY_DECAY.clamp(self.velocity_decay),
            charge_strength: Self::CHARGE_STRENGTH.clamp(self.charge_strength),
            theta: Self::THETA.clamp(self.theta),
            link_distance: Self::LINK_DISTANCE.clamp(self.link_distance),
            cooldown_ticks: Self::COOLDOWN_TICKS.clamp(self.cooldown_ticks as f32) as u32,
            dag_level_distance: Self::DAG_LEVEL_DISTANCE.clamp(self.dag_level_distance),
            dag_node_separation: Self::DAG_NODE_SEPARATION.clamp(self.dag_node_separation),
            ..self.clone()
        }
    }
}

/// Renderer thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRender {
    /// Below this zoom nodes are drawn as plain circles.
    pub lod_zoom_threshold: f32,

    /// Radius factor applied in low detail mode.
    pub lod_radius_multiplier: f32,

    /// Extra screen-space margin around the canvas for culling, in points.
    pub cull_margin: f32,

    /// Graphs above this size should not be laid out hierarchically.
    pub hierarchical_node_limit: usize,

    /// Width of the ring around highlighted nodes.
    pub halo_width: f32,
}

impl Default for SettingsRender {
    fn default() -> Self {
        Self {
            lod_zoom_threshold: 0.5,
            lod_radius_multiplier: 0.6,
            cull_margin: 80.0,
            hierarchical_node_limit: crate::layouts::HIERARCHICAL_NODE_LIMIT,
            halo_width: 3.0,
        }
    }
}

impl SettingsRender {
    pub const LOD_ZOOM_THRESHOLD: SettingRange = SettingRange::new(0.05, 2.0, 0.05);
    pub const LOD_RADIUS_MULTIPLIER: SettingRange = SettingRange::new(0.1, 1.0, 0.05);
    pub const CULL_MARGIN: SettingRange = SettingRange::new(0.0, 400.0, 10.0);

    pub fn clamped(&self) -> Self {
        Self {
            lod_zoom_threshold: Self::LOD_ZOOM_THRESHOLD.clamp(self.lod_zoom_threshold),
            lod_radius_multiplier: Self::LOD_RADIUS_MULTIPLIER.clamp(self.lod_radius_multiplier),
            cull_margin: Self::CULL_MARGIN.clamp(self.cull_margin),
            ..self.clone()
        }
    }
}

/// Color and icon for one node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindStyle {
    pub color: Color32,

    /// Image cache key.
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsStyle {
    /// Base node radius in world units.
    pub node_size: f32,

    /// Global node size factor.
    pub size_multiplier: f32,

    /// Color for kinds without an entry in `kinds`.
    pub default_color: Color32,

    pub kinds: BTreeMap<String, KindStyle>,

    pub label_font_size: f32,

    /// Arrowhead length in world units.
    pub arrow_length: f32,

    /// Arrowhead position along the edge, 0 at source and 1 at target.
    pub arrow_rel_pos: f32,

    pub theme: Theme,
}

impl Default for SettingsStyle {
    fn default() -> Self {
        Self {
            node_size: 6.0,
            size_multiplier: 1.0,
            default_color: Color32::from_rgb(0x8a, 0x8f, 0x98),
            kinds: BTreeMap::new(),
            label_font_size: 11.0,
            arrow_length: 4.0,
            arrow_rel_pos: 1.0,
            theme: Theme::Dark,
        }
    }
}

impl SettingsStyle {
    pub const NODE_SIZE: SettingRange = SettingRange::new(1.0, 50.0, 0.5);
    pub const SIZE_MULTIPLIER: SettingRange = SettingRange::new(0.1, 5.0, 0.1);
    pub const ARROW_REL_POS: SettingRange = SettingRange::new(0.0, 1.0, 0.05);

    pub fn with_kind(mut self, kind: impl Into<String>, style: KindStyle) -> Self {
        self.kinds.insert(kind.into(), style);
        self
    }

    pub fn color_for(&self, kind: &str) -> Color32 {
        self.kinds
            .get(kind)
            .map_or(self.default_color, |k| k.color)
    }

    pub fn icon_for(&self, kind: &str) -> Option<&str> {
        self.kinds.get(kind).and_then(|k| k.icon.as_deref())
    }

    /// World-space radius of a node with the given neighbour count.
    pub fn node_radius(&self, neighbor_count: usize) -> f32 {
        (self.node_size + (neighbor_count as f32 / 5.0).min(5.0)) * self.size_multiplier
    }

    pub fn clamped(&self) -> Self {
        Self {
            node_size: Self::NODE_SIZE.clamp(self.node_size),
            size_multiplier: Self::SIZE_MULTIPLIER.clamp(self.size_multiplier),
            arrow_rel_pos: Self::ARROW_REL_POS.clamp(self.arrow_rel_pos),
            ..self.clone()
        }
    }
}
