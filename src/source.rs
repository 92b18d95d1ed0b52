//! Primary photon generator.

use std::path::Path;

use rand::Rng;

use crate::geometry::Detector;
use crate::particle::{Particle, Vec3};
use crate::spectrum::{SpectrumError, SpectrumTable};

/// Beam direction of every primary
pub const BEAM_DIRECTION: Vec3 = [0.0, 0.0, 1.0];

/// Fires one photon per event from the upstream face of the envelope along +z,
/// with its energy drawn from the spectrum table.
#[derive(Debug, Clone)]
pub struct PrimaryGenerator {
    spectrum: SpectrumTable,
    position: Vec3,
}

impl PrimaryGenerator {
    /// Resolve the gun position against the detector once, at construction.
    pub fn new(spectrum: SpectrumTable, detector: &Detector) -> Self {
        let position = match detector.envelope() {
            Some(_) => [0.0, 0.0, -0.5 * detector.envelope_depth()],
            None => {
                log::warn!("World envelope not found; the primary gun is placed at the origin");
                [0.0, 0.0, 0.0]
            }
        };
        log::debug!("Primary gun at z = {:.3} mm", position[2]);
        Self { spectrum, position }
    }

    /// Load the spectrum from `path` and build the generator
    pub fn from_file(path: &Path, detector: &Detector) -> Result<Self, SpectrumError> {
        Ok(Self::new(SpectrumTable::load(path)?, detector))
    }

    pub fn spectrum(&self) -> &SpectrumTable {
        &self.spectrum
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Particle {
        Particle::photon(self.position, BEAM_DIRECTION, self.spectrum.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MaterialLayer, MaterialRegistry};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn detector() -> Detector {
        let layers = vec![MaterialLayer::new("vacuum", 1.5), MaterialLayer::new("copper", 0.035)];
        Detector::build(&layers, &MaterialRegistry::standard()).unwrap()
    }

    #[test]
    fn test_gun_at_upstream_face() {
        let detector = detector();
        let spectrum = SpectrumTable::new(vec![22.16], vec![1.0]).unwrap();
        let gun = PrimaryGenerator::new(spectrum, &detector);
        assert_eq!(gun.position()[2], -0.5 * detector.envelope_depth());

        let mut rng = StdRng::seed_from_u64(1);
        let photon = gun.generate(&mut rng);
        assert!(photon.is_photon());
        assert_eq!(photon.direction, BEAM_DIRECTION);
        assert_eq!(photon.energy, 22.16);
    }

    #[test]
    fn test_missing_envelope_falls_back_to_origin() {
        let detector = detector().without_envelope();
        let spectrum = SpectrumTable::new(vec![8.0], vec![1.0]).unwrap();
        let gun = PrimaryGenerator::new(spectrum, &detector);
        assert_eq!(gun.position(), [0.0, 0.0, 0.0]);
    }
}
