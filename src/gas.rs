//! Ionization in the drift gas gap.
//!
//! The recorder hands every photon and electron that leaves the cathode
//! into the gap to an [`IonizationOracle`], which answers with the number of
//! ionization electrons the particle liberates. [`GasGap`] is the built-in
//! oracle for an Ar/CO2 70/30 filling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::geometry::{Aabb, GeometryError, MaterialRecord, MaterialRegistry};
use crate::particle::Vec3;

/// Mean energy per ion pair in Ar/CO2 (eV)
pub const W_VALUE: f64 = 26.0;

/// Fano factor of Ar/CO2
pub const FANO_FACTOR: f64 = 0.2;

/// Gas temperature (K)
pub const TEMPERATURE: f64 = 293.15;

/// Gas pressure (Torr)
pub const PRESSURE: f64 = 760.0;

/// Drift field along z (V/cm); the ionization count does not depend on it
pub const DRIFT_FIELD: f64 = -2.0e3;

const ARGON_FRACTION: f64 = 0.7;
const CO2_FRACTION: f64 = 0.3;
const ARGON_MOLAR_MASS: f64 = 39.948;
const CO2_MOLAR_MASS: f64 = 44.01;
const GAS_CONSTANT: f64 = 8.314_462;
const TORR_TO_PA: f64 = 133.322_368;

/// A particle crossing into the gas; position mm, time ns, energy keV
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasEntry {
    pub position: Vec3,
    pub time: f64,
    pub energy: f64,
    pub direction: Vec3,
}

/// Microscopic gas transport, reduced to an ionization count.
///
/// Non-positive return values mean "no ionization" and are ignored by the
/// caller.
pub trait IonizationOracle {
    fn transport_photon(&mut self, entry: &GasEntry) -> i64;
    fn transport_electron(&mut self, entry: &GasEntry) -> i64;
}

/// Gas density in g/cm³ from the ideal gas law
pub fn ideal_gas_density(molar_mass: f64, pressure_torr: f64, temperature: f64) -> f64 {
    // kg/m³ and g/cm³ differ by 1e3, as do g/mol and kg/mol
    pressure_torr * TORR_TO_PA * molar_mass / (GAS_CONSTANT * temperature) * 1e-6
}

/// Built-in Ar/CO2 70/30 drift gap
#[derive(Debug, Clone)]
pub struct GasGap {
    material: MaterialRecord,
    bounds: Aabb,
    w_value: f64,
    fano: f64,
    rng: StdRng,
}

impl GasGap {
    /// Mix the gas from the registry's argon and co2 records
    pub fn new(bounds: Aabb, registry: &MaterialRegistry, seed: u64) -> Result<Self, GeometryError> {
        let lookup = |name: &str| {
            registry.get(name).ok_or_else(|| GeometryError::UnknownMaterial {
                material: name.to_string(),
                known: registry.names().join(", "),
            })
        };
        let argon = lookup("argon")?;
        let co2 = lookup("co2")?;

        let molar_mass = ARGON_FRACTION * ARGON_MOLAR_MASS + CO2_FRACTION * CO2_MOLAR_MASS;
        let density = ideal_gas_density(molar_mass, PRESSURE, TEMPERATURE);
        let material = MaterialRecord::mixture(
            "arco2",
            density,
            &[
                (argon, ARGON_FRACTION * ARGON_MOLAR_MASS / molar_mass),
                (co2, CO2_FRACTION * CO2_MOLAR_MASS / molar_mass),
            ],
        );
        log::debug!(
            "Gas gap Ar/CO2 70/30: {:.4e} g/cm3 at {} K, {} Torr, field {} V/cm",
            density,
            TEMPERATURE,
            PRESSURE,
            DRIFT_FIELD
        );

        Ok(Self {
            material,
            bounds,
            w_value: W_VALUE,
            fano: FANO_FACTOR,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn material(&self) -> &MaterialRecord {
        &self.material
    }

    /// Path length from the entry point to the far side of the gap
    fn path_length(&self, entry: &GasEntry) -> f64 {
        self.bounds.exit_distance(entry.position, entry.direction)
    }

    /// Fluctuated ion-pair count for a deposit in keV
    pub fn ionization_count(&mut self, deposit: f64) -> i64 {
        if deposit <= 0.0 {
            return 0;
        }
        let mean = deposit * 1e3 / self.w_value;
        let sigma = (self.fano * mean).sqrt();
        let n = match Normal::new(mean, sigma) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        };
        n.round().max(0.0) as i64
    }

    fn photon_deposit(&mut self, entry: &GasEntry) -> f64 {
        let path = self.path_length(entry);
        let distance = self.material.sample_distance_to_interaction(entry.energy, &mut self.rng);
        if distance >= path {
            return 0.0;
        }
        let mut deposit = entry.energy;
        if let Some(k) = self.material.k_shell.as_ref() {
            let escape = k.k_fraction * k.fluorescence_yield;
            if entry.energy > k.edge && self.rng.gen::<f64>() < escape {
                deposit -= k.k_alpha;
            }
        }
        deposit
    }

    fn electron_deposit(&self, entry: &GasEntry) -> f64 {
        let path = self.path_length(entry);
        let range = self.material.electron_range(entry.energy);
        if range <= path {
            return entry.energy;
        }
        let remaining = entry.energy * ((range - path) / range).powf(1.0 / 1.67);
        entry.energy - remaining
    }
}

impl IonizationOracle for GasGap {
    fn transport_photon(&mut self, entry: &GasEntry) -> i64 {
        let deposit = self.photon_deposit(entry);
        self.ionization_count(deposit)
    }

    fn transport_electron(&mut self, entry: &GasEntry) -> i64 {
        let deposit = self.electron_deposit(entry);
        self.ionization_count(deposit)
    }
}
