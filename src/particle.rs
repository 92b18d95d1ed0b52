//! Particle state shared by the source, the transport engine and the recorder.
//!
//! Units throughout the crate: lengths in mm, energies in keV, times in ns.

use serde::{Deserialize, Serialize};

use crate::physics::ELECTRON_MASS;

/// Speed of light in mm/ns
pub const SPEED_OF_LIGHT: f64 = 299.792_458;

/// Cartesian triple (position in mm or unit direction)
pub type Vec3 = [f64; 3];

/// Particle species tracked by the slab transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Photon,
    Electron,
}

impl std::fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticleKind::Photon => write!(f, "gamma"),
            ParticleKind::Electron => write!(f, "e-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub kind: ParticleKind,
    pub position: Vec3,
    pub direction: Vec3,
    /// Kinetic energy in keV (total energy for photons)
    pub energy: f64,
    pub time: f64,
    pub track_id: u32,
    pub parent_id: u32,
}

impl Particle {
    pub fn new(kind: ParticleKind, position: Vec3, direction: Vec3, energy: f64) -> Self {
        Self {
            kind,
            position,
            direction: normalize(direction),
            energy,
            time: 0.0,
            track_id: 1,
            parent_id: 0,
        }
    }

    pub fn photon(position: Vec3, direction: Vec3, energy: f64) -> Self {
        Self::new(ParticleKind::Photon, position, direction, energy)
    }

    pub fn electron(position: Vec3, direction: Vec3, energy: f64) -> Self {
        Self::new(ParticleKind::Electron, position, direction, energy)
    }

    pub fn is_photon(&self) -> bool {
        self.kind == ParticleKind::Photon
    }

    /// Speed in mm/ns at the current energy
    pub fn speed(&self) -> f64 {
        match self.kind {
            ParticleKind::Photon => SPEED_OF_LIGHT,
            ParticleKind::Electron => {
                let t = self.energy.max(0.0);
                SPEED_OF_LIGHT * (t * (t + 2.0 * ELECTRON_MASS)).sqrt() / (t + ELECTRON_MASS)
            }
        }
    }

    /// Advance the particle along its direction by `distance` mm at its current speed
    pub fn move_by(&mut self, distance: f64) {
        for (p, d) in self.position.iter_mut().zip(self.direction.iter()) {
            *p += distance * d;
        }
        let speed = self.speed();
        if speed > 0.0 {
            self.time += distance / speed;
        }
    }
}

/// Scale a vector to unit length; the zero vector maps to +z.
pub fn normalize(v: Vec3) -> Vec3 {
    let mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if mag == 0.0 || !mag.is_finite() {
        return [0.0, 0.0, 1.0];
    }
    [v[0] / mag, v[1] / mag, v[2] / mag]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_construction() {
        let p = Particle::photon([0.0, 1.0, 2.0], [0.0, 0.0, 2.0], 22.16);
        assert_eq!(p.position, [0.0, 1.0, 2.0]);
        assert_eq!(p.direction, [0.0, 0.0, 1.0]);
        assert_eq!(p.energy, 22.16);
        assert!(p.is_photon());
        assert_eq!(p.track_id, 1);
    }

    #[test]
    fn test_move_by() {
        let mut p = Particle::photon([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 5.0);
        p.move_by(2.5);
        assert_eq!(p.position, [2.5, 0.0, 0.0]);
        assert!((p.time - 2.5 / SPEED_OF_LIGHT).abs() < 1e-15);
    }

    #[test]
    fn test_electron_time_advances_with_speed() {
        let mut e = Particle::electron([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], 10.0);
        e.time = 1.0;
        // beta at 10 keV is about 0.195
        let speed = e.speed();
        assert!((speed / SPEED_OF_LIGHT - 0.195).abs() < 1e-3, "beta {}", speed / SPEED_OF_LIGHT);
        e.move_by(3.0);
        assert_eq!(e.position, [0.0, 0.0, 3.0]);
        assert!((e.time - (1.0 + 3.0 / speed)).abs() < 1e-12);
        assert!(e.time > 1.0 + 3.0 / SPEED_OF_LIGHT);
    }

    #[test]
    fn test_stopped_electron_keeps_time() {
        let mut e = Particle::electron([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], 0.0);
        e.move_by(1.0);
        assert_eq!(e.time, 0.0);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize([0.0, 0.0, 0.0]), [0.0, 0.0, 1.0]);
    }
}
