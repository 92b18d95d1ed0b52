//! Physical property records for the slab and gas materials.
//!
//! Mass attenuation coefficients are coarse samplings of the NIST XCOM
//! tables (cm²/g, photon energies in keV). Absorption edges appear as two
//! rows at the same energy, below-edge value first.

use std::collections::HashMap;

use rand::Rng;

use crate::utils::interpolation::interpolate_log_log;

/// Coarse energy grid for the incoherent (Compton) tables
const INCOHERENT_GRID: [f64; 5] = [1.0, 10.0, 20.0, 50.0, 100.0];

/// K-shell photoabsorption data used for fluorescence emission
#[derive(Debug, Clone, PartialEq)]
pub struct KShell {
    /// K absorption edge (keV)
    pub edge: f64,
    /// K-alpha emission line (keV)
    pub k_alpha: f64,
    /// Fluorescence yield
    pub fluorescence_yield: f64,
    /// Fraction of photoabsorptions above the edge that happen in the K shell
    pub k_fraction: f64,
}

#[derive(Debug, Clone)]
pub struct MaterialRecord {
    pub name: String,
    /// Density in g/cm³
    pub density: f64,
    /// Effective atomic number, for the electron range
    pub z: f64,
    /// Effective atomic mass (g/mol), for the electron range
    pub a: f64,
    energies: Vec<f64>,
    mass_attenuation: Vec<f64>,
    incoherent: Vec<f64>,
    pub k_shell: Option<KShell>,
}

impl MaterialRecord {
    #[allow(clippy::too_many_arguments)]
    fn new(
        name: &str,
        density: f64,
        z: f64,
        a: f64,
        energies: &[f64],
        mass_attenuation: &[f64],
        incoherent: [f64; 5],
        k_shell: Option<KShell>,
    ) -> Self {
        debug_assert_eq!(energies.len(), mass_attenuation.len());
        Self {
            name: name.to_string(),
            density,
            z,
            a,
            energies: energies.to_vec(),
            mass_attenuation: mass_attenuation.to_vec(),
            incoherent: incoherent.to_vec(),
            k_shell,
        }
    }

    /// Total mass attenuation coefficient (cm²/g)
    pub fn mass_attenuation(&self, energy: f64) -> f64 {
        interpolate_log_log(&self.energies, &self.mass_attenuation, energy)
    }

    /// Linear attenuation coefficient in 1/mm
    pub fn linear_attenuation(&self, energy: f64) -> f64 {
        self.mass_attenuation(energy) * self.density / 10.0
    }

    /// Probability that an interaction at `energy` is a Compton scatter
    pub fn incoherent_fraction(&self, energy: f64) -> f64 {
        let total = self.mass_attenuation(energy);
        if total <= 0.0 {
            return 0.0;
        }
        let incoherent = interpolate_log_log(&INCOHERENT_GRID, &self.incoherent, energy);
        (incoherent / total).clamp(0.0, 1.0)
    }

    /// Sample the distance (mm) to the next photon interaction
    pub fn sample_distance_to_interaction<R: Rng + ?Sized>(&self, energy: f64, rng: &mut R) -> f64 {
        let mu = self.linear_attenuation(energy);
        if mu <= 0.0 || !mu.is_finite() {
            return f64::INFINITY;
        }
        // 1 - xi lies in (0, 1], keeping the logarithm finite
        let xi: f64 = rng.gen_range(0.0..1.0);
        -(1.0 - xi).ln() / mu
    }

    /// Kanaya-Okayama electron range in mm
    pub fn electron_range(&self, energy: f64) -> f64 {
        if energy <= 0.0 {
            return 0.0;
        }
        let range_um = 0.0276 * self.a * energy.powf(1.67) / (self.z.powf(0.889) * self.density);
        range_um * 1e-3
    }

    /// Mass-weighted mixture of two or more materials at a given density
    pub fn mixture(name: &str, density: f64, parts: &[(&MaterialRecord, f64)]) -> Self {
        let mut energies: Vec<f64> = parts
            .iter()
            .flat_map(|(m, _)| m.energies.iter().copied())
            .collect();
        energies.sort_by(|a, b| a.total_cmp(b));
        energies.dedup();

        let total_weight: f64 = parts.iter().map(|(_, w)| w).sum();
        let weight = |w: f64| if total_weight > 0.0 { w / total_weight } else { 0.0 };

        let mixed = |e: f64| -> f64 {
            parts.iter().map(|(m, w)| weight(*w) * m.mass_attenuation(e)).sum()
        };
        // Re-split rows where a component has an absorption edge
        let mut grid = Vec::with_capacity(energies.len() + parts.len());
        let mut mass_attenuation = Vec::with_capacity(energies.len() + parts.len());
        for &e in &energies {
            let at = mixed(e);
            let below = mixed(e * (1.0 - 1e-9));
            if below > 0.0 && (at - below) / below > 0.5 {
                grid.push(e);
                mass_attenuation.push(below);
            }
            grid.push(e);
            mass_attenuation.push(at);
        }
        let incoherent = INCOHERENT_GRID.map(|e| {
            parts
                .iter()
                .map(|(m, w)| weight(*w) * interpolate_log_log(&INCOHERENT_GRID, &m.incoherent, e))
                .sum::<f64>()
        });
        let z: f64 = parts.iter().map(|(m, w)| weight(*w) * m.z).sum();
        let a: f64 = parts.iter().map(|(m, w)| weight(*w) * m.a).sum();
        let k_shell = parts
            .iter()
            .max_by(|x, y| x.1.total_cmp(&y.1))
            .and_then(|(m, _)| m.k_shell.clone());

        Self {
            name: name.to_string(),
            density,
            z,
            a,
            energies: grid,
            mass_attenuation,
            incoherent: incoherent.to_vec(),
            k_shell,
        }
    }
}

/// Lookup of material records by the names used in layer stacks
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    records: HashMap<String, MaterialRecord>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with copper, kapton, fr4, pvc, argon and co2
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.insert(copper());
        registry.insert(kapton());
        registry.insert(fr4());
        registry.insert(pvc());
        registry.insert(argon());
        registry.insert(co2());
        registry
    }

    pub fn insert(&mut self, record: MaterialRecord) {
        self.records.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&MaterialRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Sorted material names, for diagnostics
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }
}

fn copper() -> MaterialRecord {
    MaterialRecord::new(
        "copper",
        8.96,
        29.0,
        63.55,
        &[1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 8.979, 8.979, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[10570.0, 4418.0, 2154.0, 748.8, 347.3, 189.9, 115.6, 52.55, 38.29, 278.4, 215.9, 74.05, 33.79, 10.92, 4.862, 2.613, 1.593, 0.763, 0.4584],
        [0.02, 0.09, 0.12, 0.135, 0.135],
        Some(KShell {
            edge: 8.979,
            k_alpha: 8.048,
            fluorescence_yield: 0.44,
            k_fraction: 0.87,
        }),
    )
}

fn kapton() -> MaterialRecord {
    MaterialRecord::new(
        "kapton",
        1.42,
        6.5,
        12.9,
        &[1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[2911.0, 953.6, 420.6, 128.8, 54.66, 27.94, 16.13, 6.781, 3.506, 1.12, 0.5554, 0.2794, 0.2108, 0.184, 0.1702, 0.1557, 0.1463],
        [0.05, 0.16, 0.18, 0.17, 0.15],
        None,
    )
}

fn fr4() -> MaterialRecord {
    MaterialRecord::new(
        "fr4",
        1.86,
        10.0,
        20.0,
        &[1.0, 1.5, 1.839, 1.839, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[2600.0, 870.0, 500.0, 1500.0, 1200.0, 420.0, 190.0, 102.0, 61.0, 27.0, 14.5, 4.6, 2.1, 0.75, 0.42, 0.30, 0.245, 0.195, 0.172],
        [0.05, 0.14, 0.17, 0.17, 0.15],
        None,
    )
}

fn pvc() -> MaterialRecord {
    MaterialRecord::new(
        "pvc",
        1.68,
        10.4,
        20.8,
        &[1.0, 1.5, 2.0, 2.822, 2.822, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[1800.0, 620.0, 290.0, 115.0, 700.0, 600.0, 280.0, 150.0, 92.0, 41.0, 22.0, 7.1, 3.2, 1.1, 0.55, 0.36, 0.27, 0.2, 0.17],
        [0.04, 0.13, 0.16, 0.16, 0.14],
        None,
    )
}

fn argon() -> MaterialRecord {
    MaterialRecord::new(
        "argon",
        1.662e-3,
        18.0,
        39.95,
        &[1.0, 1.5, 2.0, 3.0, 3.206, 3.206, 4.0, 5.0, 6.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[1185.0, 396.2, 182.9, 60.89, 50.6, 497.0, 276.5, 155.1, 94.81, 43.27, 23.35, 7.374, 3.22, 1.03, 0.5159, 0.3245, 0.2377, 0.1619, 0.1357],
        [0.03, 0.12, 0.15, 0.16, 0.15],
        Some(KShell {
            edge: 3.206,
            k_alpha: 2.957,
            fluorescence_yield: 0.118,
            k_fraction: 0.9,
        }),
    )
}

fn co2() -> MaterialRecord {
    MaterialRecord::new(
        "co2",
        1.842e-3,
        7.33,
        14.67,
        &[1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0],
        &[3900.0, 473.0, 148.0, 33.5, 8.2, 4.3, 1.38, 0.69, 0.32, 0.23, 0.196, 0.18, 0.163, 0.154],
        [0.04, 0.14, 0.17, 0.17, 0.15],
        None,
    )
}
