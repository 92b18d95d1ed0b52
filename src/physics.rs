//! Photon interaction sampling: photoabsorption with K-shell fluorescence and
//! Compton scattering. Coherent scattering is neglected.

use std::f64::consts::PI;

use rand::Rng;

use crate::geometry::MaterialRecord;
use crate::particle::{normalize, Particle, Vec3};

/// Electron rest energy in keV
pub const ELECTRON_MASS: f64 = 510.998_95;

/// Outcome of a single photon interaction
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    /// New particles to be tracked (photoelectrons, fluorescence, recoils)
    pub secondaries: Vec<Particle>,
    /// Energy absorbed on the spot (keV)
    pub local_deposit: f64,
    /// The incident photon survives with updated energy and direction
    pub survives: bool,
}

/// Isotropic unit vector
pub fn sample_isotropic<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let mu: f64 = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * PI * rng.gen::<f64>();
    let s = (1.0 - mu * mu).max(0.0).sqrt();
    [s * phi.cos(), s * phi.sin(), mu]
}

/// Rotate `u` to a new direction at cosine `mu` from it, azimuth `phi`
pub fn rotate_direction(u: Vec3, mu: f64, phi: f64) -> Vec3 {
    let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
    let helper = if u[0].abs() < 0.99 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
    let perp = normalize(cross(helper, u));
    let ortho = cross(u, perp);
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = mu * u[i] + sin_theta * (phi.cos() * perp[i] + phi.sin() * ortho[i]);
    }
    normalize(out)
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Sample a Compton scatter with Kahn's rejection method for the
/// Klein-Nishina cross section.
///
/// Returns the scattered photon energy ratio `E'/E` and the cosine of the
/// scattering angle.
pub fn sample_klein_nishina<R: Rng + ?Sized>(energy: f64, rng: &mut R) -> (f64, f64) {
    let alpha = energy / ELECTRON_MASS;
    let beta = 1.0 + 2.0 * alpha;
    let t = beta / (beta + 8.0);
    loop {
        let r1: f64 = rng.gen();
        let r2: f64 = rng.gen();
        let r3: f64 = rng.gen();
        if r1 < t {
            let x = 1.0 + 2.0 * alpha * r2;
            if r3 < 4.0 * (1.0 / x - 1.0 / (x * x)) {
                let mu = 1.0 - (x - 1.0) / alpha;
                return (1.0 / x, mu.clamp(-1.0, 1.0));
            }
        } else {
            let x = beta / (1.0 + 2.0 * alpha * r2);
            let mu = 1.0 + (1.0 - x) / alpha;
            if r3 < 0.5 * (mu * mu + 1.0 / x) {
                return (1.0 / x, mu.clamp(-1.0, 1.0));
            }
        }
    }
}

/// Compton-scatter `photon` in place and return the recoil electron
pub fn compton<R: Rng + ?Sized>(photon: &mut Particle, rng: &mut R) -> Interaction {
    let energy = photon.energy;
    let (ratio, mu) = sample_klein_nishina(energy, rng);
    let phi = 2.0 * PI * rng.gen::<f64>();
    let scattered_energy = energy * ratio;
    let new_direction = rotate_direction(photon.direction, mu, phi);

    // Recoil direction from momentum balance
    let mut recoil = [0.0; 3];
    for i in 0..3 {
        recoil[i] = energy * photon.direction[i] - scattered_energy * new_direction[i];
    }
    let mut electron = Particle::electron(photon.position, recoil, energy - scattered_energy);
    electron.time = photon.time;
    electron.parent_id = photon.track_id;

    photon.energy = scattered_energy;
    photon.direction = new_direction;

    Interaction {
        secondaries: vec![electron],
        local_deposit: 0.0,
        survives: true,
    }
}

/// Absorb `photon` in `material`.
///
/// Above the K edge a K-shell vacancy is created with the material's K
/// fraction; it relaxes by emitting an isotropic K-alpha photon with the
/// fluorescence yield, otherwise its binding energy is deposited locally.
/// The photoelectron leaves isotropically.
pub fn photoabsorb<R: Rng + ?Sized>(photon: &Particle, material: &MaterialRecord, rng: &mut R) -> Interaction {
    let mut interaction = Interaction::default();
    let mut binding = 0.0;

    if let Some(k) = material.k_shell.as_ref() {
        if photon.energy > k.edge && rng.gen::<f64>() < k.k_fraction {
            binding = k.edge;
            if rng.gen::<f64>() < k.fluorescence_yield {
                let mut fluorescence = Particle::photon(photon.position, sample_isotropic(rng), k.k_alpha);
                fluorescence.time = photon.time;
                fluorescence.parent_id = photon.track_id;
                interaction.secondaries.push(fluorescence);
                interaction.local_deposit = k.edge - k.k_alpha;
            } else {
                interaction.local_deposit = k.edge;
            }
        }
    }

    let mut electron = Particle::electron(photon.position, sample_isotropic(rng), photon.energy - binding);
    electron.time = photon.time;
    electron.parent_id = photon.track_id;
    interaction.secondaries.push(electron);
    interaction
}

/// Sample the interaction type at `energy` and apply it
pub fn interact<R: Rng + ?Sized>(photon: &mut Particle, material: &MaterialRecord, rng: &mut R) -> Interaction {
    if rng.gen::<f64>() < material.incoherent_fraction(photon.energy) {
        compton(photon, rng)
    } else {
        photoabsorb(photon, material, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MaterialRegistry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn norm(v: Vec3) -> f64 {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }

    #[test]
    fn test_isotropic_is_unit() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut mean_z = 0.0;
        for _ in 0..10000 {
            let d = sample_isotropic(&mut rng);
            assert!((norm(d) - 1.0).abs() < 1e-12);
            mean_z += d[2];
        }
        assert!((mean_z / 10000.0).abs() < 0.03);
    }

    #[test]
    fn test_rotate_direction_keeps_angle() {
        let u = normalize([0.3, -0.2, 0.9]);
        let v = rotate_direction(u, 0.5, 1.2);
        let dot = u[0] * v[0] + u[1] * v[1] + u[2] * v[2];
        assert!((dot - 0.5).abs() < 1e-9);
        assert!((norm(v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_klein_nishina_bounds() {
        let mut rng = StdRng::seed_from_u64(8);
        let energy = 60.0;
        let alpha = energy / ELECTRON_MASS;
        for _ in 0..5000 {
            let (ratio, mu) = sample_klein_nishina(energy, &mut rng);
            assert!(ratio <= 1.0 && ratio >= 1.0 / (1.0 + 2.0 * alpha) - 1e-12);
            assert!((-1.0..=1.0).contains(&mu));
            // Compton formula links the two
            let expected = 1.0 / (1.0 + alpha * (1.0 - mu));
            assert!((ratio - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_compton_conserves_energy() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut photon = Particle::photon([0.0; 3], [0.0, 0.0, 1.0], 40.0);
        let result = compton(&mut photon, &mut rng);
        assert!(result.survives);
        let electron = &result.secondaries[0];
        assert!((photon.energy + electron.energy - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_photoabsorption_in_copper_conserves_energy() {
        let registry = MaterialRegistry::standard();
        let cu = registry.get("copper").unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut fluorescence = 0;
        for _ in 0..2000 {
            let photon = Particle::photon([0.0; 3], [0.0, 0.0, 1.0], 22.16);
            let result = photoabsorb(&photon, cu, &mut rng);
            assert!(!result.survives);
            let carried: f64 = result.secondaries.iter().map(|p| p.energy).sum();
            assert!((carried + result.local_deposit - 22.16).abs() < 1e-9);
            if result.secondaries.iter().any(|p| p.is_photon()) {
                fluorescence += 1;
            }
        }
        // Expect about 0.87 * 0.44 of absorptions to fluoresce
        let fraction = fluorescence as f64 / 2000.0;
        assert!((fraction - 0.383).abs() < 0.05, "fraction {}", fraction);
    }

    #[test]
    fn test_no_fluorescence_below_edge() {
        let registry = MaterialRegistry::standard();
        let cu = registry.get("copper").unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..500 {
            let photon = Particle::photon([0.0; 3], [0.0, 0.0, 1.0], 8.0);
            let result = photoabsorb(&photon, cu, &mut rng);
            assert_eq!(result.secondaries.len(), 1);
            assert_eq!(result.secondaries[0].energy, 8.0);
        }
    }
}
