//! Detector geometry: a stack of material slabs followed by the gas gap.
//!
//! Slabs are placed along +z in stack order. The offset starts at
//! `-0.15 * envelope depth`; a solid layer advances it by half its thickness,
//! is centred there, then advances it by the other half. Vacuum layers only
//! advance the offset. The drift gas gap sits directly behind the last slab.
//!
//! The stack stands inside a copper test chamber: five walls (the far `z`
//! face and the four sides) that are open towards the source. Walls are
//! stepped through by the transport but never recorded.

pub mod materials;
pub mod presets;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::particle::Vec3;

pub use materials::{KShell, MaterialRecord, MaterialRegistry};
pub use presets::{preset, DEFAULT_PRESET, PRESET_NAMES};

/// Material keyword marking an empty gap in the stack
pub const VACUUM: &str = "vacuum";

/// Transverse side of every slab and of the gas gap (mm)
pub const SLAB_SIZE_XY: f64 = 100.0;

/// Transverse side and base depth of the world envelope (mm)
pub const ENVELOPE_SIZE: f64 = 2500.0;

/// Depth of the drift gas gap behind the stack (mm)
pub const GAS_GAP_DEPTH: f64 = 3.0;

/// Inner size of the test chamber along x, y and z (mm)
pub const CHAMBER_SIZE: [f64; 3] = [940.0, 1440.0, 2000.0];

/// Thickness of the chamber walls (mm)
pub const CHAMBER_WALL_THICKNESS: f64 = 5.0;

/// Material of the chamber walls
pub const CHAMBER_MATERIAL: &str = "copper";

/// One entry of a layer stack; thickness in mm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLayer {
    pub material: String,
    pub thickness: f64,
}

impl MaterialLayer {
    pub fn new(material: &str, thickness: f64) -> Self {
        Self {
            material: material.to_string(),
            thickness,
        }
    }

    pub fn is_vacuum(&self) -> bool {
        self.material == VACUUM
    }
}

/// Errors raised while assembling the detector
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("No material record for '{material}' (known: {known})")]
    UnknownMaterial { material: String, known: String },

    #[error("Layer {index} ({material}) has invalid thickness {thickness} mm")]
    InvalidThickness {
        index: usize,
        material: String,
        thickness: f64,
    },

    #[error("Layer stack has no solid layers")]
    NoSolidLayers,

    #[error("Unknown geometry keyword '{0}'")]
    UnknownPreset(String),
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box around `center` with the given full side lengths
    pub fn with_size(center: Vec3, size: Vec3) -> Self {
        Self {
            min: [center[0] - 0.5 * size[0], center[1] - 0.5 * size[1], center[2] - 0.5 * size[2]],
            max: [center[0] + 0.5 * size[0], center[1] + 0.5 * size[1], center[2] + 0.5 * size[2]],
        }
    }

    pub fn centered(center_z: f64, half_xy: f64, half_z: f64) -> Self {
        Self {
            min: [-half_xy, -half_xy, center_z - half_z],
            max: [half_xy, half_xy, center_z + half_z],
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Parametric ray/box intersection: (t_enter, t_exit), if the ray line hits the box
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<(f64, f64)> {
        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for i in 0..3 {
            if direction[i] == 0.0 {
                if origin[i] < self.min[i] || origin[i] > self.max[i] {
                    return None;
                }
                continue;
            }
            let t1 = (self.min[i] - origin[i]) / direction[i];
            let t2 = (self.max[i] - origin[i]) / direction[i];
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        if t_max < t_min {
            return None;
        }
        Some((t_min, t_max))
    }

    /// Distance from an interior point to the box surface along `direction`
    pub fn exit_distance(&self, origin: Vec3, direction: Vec3) -> f64 {
        self.intersect(origin, direction)
            .map(|(_, t_exit)| t_exit.max(0.0))
            .unwrap_or(0.0)
    }

    /// Distance from an exterior point to the box, if the ray enters it ahead
    pub fn entry_distance(&self, origin: Vec3, direction: Vec3) -> Option<f64> {
        let (t_enter, t_exit) = self.intersect(origin, direction)?;
        // A point sitting on the far face must not re-enter the box it just left
        if t_exit <= 1e-9 {
            return None;
        }
        Some(t_enter.max(0.0))
    }
}

/// A placed solid layer
#[derive(Debug, Clone)]
pub struct Slab {
    /// Position among the solid layers (0-based)
    pub index: usize,
    pub branch: String,
    pub material: MaterialRecord,
    pub thickness: f64,
    pub center_z: f64,
    pub bounds: Aabb,
}

/// A chamber wall; absorbs and scatters but is never recorded
#[derive(Debug, Clone)]
pub struct Wall {
    pub name: &'static str,
    pub material: MaterialRecord,
    pub bounds: Aabb,
}

/// Wall boxes of the test chamber, centred on the origin
pub fn chamber_walls() -> Vec<(&'static str, Aabb)> {
    let [x, y, z] = CHAMBER_SIZE;
    let t = CHAMBER_WALL_THICKNESS;
    vec![
        ("wall_z", Aabb::with_size([0.0, 0.0, 0.5 * z], [x, y, t])),
        ("wall_y1", Aabb::with_size([0.0, 0.5 * y, 0.0], [x, t, z])),
        ("wall_y2", Aabb::with_size([0.0, -0.5 * y, 0.0], [x, t, z])),
        ("wall_x1", Aabb::with_size([0.5 * x, 0.0, 0.0], [t, y, z])),
        ("wall_x2", Aabb::with_size([-0.5 * x, 0.0, 0.0], [t, y, z])),
    ]
}

/// Volumes a particle can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Volume {
    /// Empty space inside the envelope
    Envelope,
    /// Solid layer by slab index
    Layer(usize),
    /// Drift gas gap behind the stack
    GasGap,
    /// Chamber wall by index
    Wall(usize),
    /// Outside the world
    OutOfWorld,
}

#[derive(Debug, Clone)]
pub struct Detector {
    layers: Vec<MaterialLayer>,
    slabs: Vec<Slab>,
    gas_gap: Aabb,
    walls: Vec<Wall>,
    envelope: Option<Aabb>,
    envelope_depth: f64,
}

impl Detector {
    /// Place every solid layer of the stack and the gas gap behind it
    pub fn build(layers: &[MaterialLayer], registry: &MaterialRegistry) -> Result<Self, GeometryError> {
        for (index, layer) in layers.iter().enumerate() {
            if !(layer.thickness.is_finite() && layer.thickness > 0.0) {
                return Err(GeometryError::InvalidThickness {
                    index,
                    material: layer.material.clone(),
                    thickness: layer.thickness,
                });
            }
        }
        let names = branch_names(layers);
        if names.is_empty() {
            return Err(GeometryError::NoSolidLayers);
        }

        let envelope_depth = ENVELOPE_SIZE + layers.iter().map(|l| 1.5 * l.thickness).sum::<f64>();
        let mut offset = -0.15 * envelope_depth;
        let mut slabs = Vec::with_capacity(names.len());

        for layer in layers {
            if layer.is_vacuum() {
                offset += layer.thickness;
                continue;
            }
            let material = registry
                .get(&layer.material)
                .ok_or_else(|| GeometryError::UnknownMaterial {
                    material: layer.material.clone(),
                    known: registry.names().join(", "),
                })?
                .clone();

            offset += 0.5 * layer.thickness;
            let index = slabs.len();
            log::debug!(
                "Placing {} ({} mm) at z = {:.4} mm",
                names[index],
                layer.thickness,
                offset
            );
            slabs.push(Slab {
                index,
                branch: names[index].clone(),
                material,
                thickness: layer.thickness,
                center_z: offset,
                bounds: Aabb::centered(offset, 0.5 * SLAB_SIZE_XY, 0.5 * layer.thickness),
            });
            offset += 0.5 * layer.thickness;
        }

        let gas_gap = Aabb::centered(offset + 0.5 * GAS_GAP_DEPTH, 0.5 * SLAB_SIZE_XY, 0.5 * GAS_GAP_DEPTH);
        let envelope = Some(Aabb::centered(0.0, 0.5 * ENVELOPE_SIZE, 0.5 * envelope_depth));

        let wall_material = registry
            .get(CHAMBER_MATERIAL)
            .ok_or_else(|| GeometryError::UnknownMaterial {
                material: CHAMBER_MATERIAL.to_string(),
                known: registry.names().join(", "),
            })?;
        let walls = chamber_walls()
            .into_iter()
            .map(|(name, bounds)| Wall {
                name,
                material: wall_material.clone(),
                bounds,
            })
            .collect();

        Ok(Self {
            layers: layers.to_vec(),
            slabs,
            gas_gap,
            walls,
            envelope,
            envelope_depth,
        })
    }

    /// Build from a preset keyword
    pub fn from_preset(name: &str, registry: &MaterialRegistry) -> Result<Self, GeometryError> {
        let layers = preset(name).ok_or_else(|| GeometryError::UnknownPreset(name.to_string()))?;
        Self::build(&layers, registry)
    }

    /// Drop the world envelope, leaving only the placed volumes
    pub fn without_envelope(mut self) -> Self {
        self.envelope = None;
        self
    }

    /// Drop the chamber walls
    pub fn without_chamber(mut self) -> Self {
        self.walls.clear();
        self
    }

    pub fn layers(&self) -> &[MaterialLayer] {
        &self.layers
    }

    pub fn slabs(&self) -> &[Slab] {
        &self.slabs
    }

    /// Branch names of the solid layers in stack order
    pub fn branch_names(&self) -> Vec<String> {
        self.slabs.iter().map(|s| s.branch.clone()).collect()
    }

    /// Index of the gas-facing layer (always the last solid)
    pub fn cathode(&self) -> usize {
        self.slabs.len() - 1
    }

    pub fn gas_gap(&self) -> &Aabb {
        &self.gas_gap
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Material filling `volume`, for slabs and walls
    pub fn material(&self, volume: Volume) -> Option<&MaterialRecord> {
        match volume {
            Volume::Layer(i) => self.slabs.get(i).map(|s| &s.material),
            Volume::Wall(i) => self.walls.get(i).map(|w| &w.material),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&Aabb> {
        self.envelope.as_ref()
    }

    pub fn envelope_depth(&self) -> f64 {
        self.envelope_depth
    }

    /// Volume containing `p`; slabs take precedence over the gap on shared faces
    pub fn locate(&self, p: Vec3) -> Volume {
        if let Some(slab) = self.slabs.iter().find(|s| s.bounds.contains(p)) {
            return Volume::Layer(slab.index);
        }
        if self.gas_gap.contains(p) {
            return Volume::GasGap;
        }
        if let Some(i) = self.walls.iter().position(|w| w.bounds.contains(p)) {
            return Volume::Wall(i);
        }
        // Without an envelope the world is the union of the placed volumes
        match &self.envelope {
            Some(env) if env.contains(p) => Volume::Envelope,
            _ => Volume::OutOfWorld,
        }
    }

    fn bounds_of(&self, volume: Volume) -> Option<&Aabb> {
        match volume {
            Volume::Layer(i) => self.slabs.get(i).map(|s| &s.bounds),
            Volume::GasGap => Some(&self.gas_gap),
            Volume::Wall(i) => self.walls.get(i).map(|w| &w.bounds),
            Volume::Envelope => self.envelope.as_ref(),
            Volume::OutOfWorld => None,
        }
    }

    /// Distance to the next boundary and the volume on its far side.
    ///
    /// Inside a solid, a wall or the gas gap the ray leaves through the volume's own
    /// surface. In open space it stops at the nearest volume ahead, or at the
    /// envelope wall.
    pub fn next_boundary(&self, position: Vec3, direction: Vec3, current: Volume) -> (f64, Volume) {
        const PUSH: f64 = 1e-9;
        match current {
            Volume::Layer(_) | Volume::Wall(_) | Volume::GasGap => {
                let bounds = match self.bounds_of(current) {
                    Some(b) => b,
                    None => return (0.0, Volume::OutOfWorld),
                };
                let distance = bounds.exit_distance(position, direction);
                let beyond = advance(position, direction, distance + PUSH);
                (distance, self.locate_excluding(beyond, current))
            }
            Volume::Envelope | Volume::OutOfWorld => {
                let mut nearest: Option<(f64, Volume)> = None;
                let candidates = self
                    .slabs
                    .iter()
                    .map(|s| (s.bounds, Volume::Layer(s.index)))
                    .chain(std::iter::once((self.gas_gap, Volume::GasGap)))
                    .chain(self.walls.iter().enumerate().map(|(i, w)| (w.bounds, Volume::Wall(i))));
                for (bounds, volume) in candidates {
                    if let Some(d) = bounds.entry_distance(position, direction) {
                        if nearest.map_or(true, |(best, _)| d < best) {
                            nearest = Some((d, volume));
                        }
                    }
                }
                if let Some(hit) = nearest {
                    return hit;
                }
                match (&self.envelope, current) {
                    (Some(env), Volume::Envelope) => (env.exit_distance(position, direction), Volume::OutOfWorld),
                    _ => (f64::INFINITY, Volume::OutOfWorld),
                }
            }
        }
    }

    fn locate_excluding(&self, p: Vec3, exclude: Volume) -> Volume {
        if let Some(slab) = self
            .slabs
            .iter()
            .find(|s| Volume::Layer(s.index) != exclude && s.bounds.contains(p))
        {
            return Volume::Layer(slab.index);
        }
        if exclude != Volume::GasGap && self.gas_gap.contains(p) {
            return Volume::GasGap;
        }
        if let Some(i) = self
            .walls
            .iter()
            .enumerate()
            .position(|(i, w)| Volume::Wall(i) != exclude && w.bounds.contains(p))
        {
            return Volume::Wall(i);
        }
        match &self.envelope {
            Some(env) if env.contains(p) => Volume::Envelope,
            _ => Volume::OutOfWorld,
        }
    }
}

fn advance(p: Vec3, d: Vec3, distance: f64) -> Vec3 {
    [p[0] + d[0] * distance, p[1] + d[1] * distance, p[2] + d[2] * distance]
}

/// Branch names for the solid layers of a stack, in stack order.
///
/// A material that occurs once keeps its bare name; a repeated material is
/// suffixed with its 1-based occurrence index among the solids.
pub fn branch_names(layers: &[MaterialLayer]) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for layer in layers.iter().filter(|l| !l.is_vacuum()) {
        *totals.entry(layer.material.as_str()).or_insert(0) += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    layers
        .iter()
        .filter(|l| !l.is_vacuum())
        .map(|layer| {
            let name = layer.material.as_str();
            let occurrence = seen.entry(name).or_insert(0);
            *occurrence += 1;
            if totals[name] > 1 {
                format!("{}{}", name, occurrence)
            } else {
                name.to_string()
            }
        })
        .collect()
}
