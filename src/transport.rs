//! Condensed-history transport through the slab stack.
//!
//! Each event starts from one primary photon. Secondaries produced along the
//! way are queued in a [`ParticleBank`] and tracked after the current
//! particle. Every step is handed to a caller-supplied callback, which is
//! where the hit recorder sees the event.
//!
//! Transport stops at the gas gap: particles that reach it are left to the
//! ionization oracle. Chamber walls are tracked like slabs, but what they
//! absorb is not part of the window tally.

use std::collections::VecDeque;

use rand::Rng;

use crate::geometry::{Detector, Volume};
use crate::particle::{Particle, ParticleKind, Vec3};
use crate::physics;

/// Photons below this energy are absorbed on the spot (keV)
pub const PHOTON_CUT: f64 = 1.0;

/// Electrons below this energy are absorbed on the spot (keV)
pub const ELECTRON_CUT: f64 = 0.1;

/// Upper bound on steps per track
const MAX_STEPS: usize = 10_000;

/// Kanaya-Okayama range exponent; remaining energy scales as range^(1/1.67)
const RANGE_EXPONENT: f64 = 1.67;

/// Particle state at one end of a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPoint {
    pub volume: Volume,
    pub position: Vec3,
    pub direction: Vec3,
    /// Total energy for photons, kinetic for electrons (keV)
    pub energy: f64,
    /// ns
    pub time: f64,
}

impl StepPoint {
    fn of(particle: &Particle, volume: Volume) -> Self {
        Self {
            volume,
            position: particle.position,
            direction: particle.direction,
            energy: particle.energy,
            time: particle.time,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: ParticleKind,
    pub track_id: u32,
    pub parent_id: u32,
    pub pre: StepPoint,
    pub post: StepPoint,
    /// The step ended on the boundary of the pre-step volume
    pub last_in_volume: bool,
}

impl Step {
    pub fn is_photon(&self) -> bool {
        self.kind == ParticleKind::Photon
    }

    pub fn is_electron(&self) -> bool {
        self.kind == ParticleKind::Electron
    }
}

/// Queue of particles awaiting transport within one event
#[derive(Debug, Default)]
pub struct ParticleBank {
    queue: VecDeque<Particle>,
    next_track_id: u32,
}

impl ParticleBank {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            next_track_id: 1,
        }
    }

    /// Add the primary; it always gets track id 1
    pub fn add_source_particle(&mut self, mut particle: Particle) {
        particle.track_id = self.next_track_id;
        particle.parent_id = 0;
        self.next_track_id += 1;
        self.queue.push_back(particle);
    }

    pub fn bank_secondary(&mut self, mut particle: Particle) {
        particle.track_id = self.next_track_id;
        self.next_track_id += 1;
        self.queue.push_back(particle);
    }

    pub fn pop_particle(&mut self) -> Option<Particle> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Per-event totals returned by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventTally {
    pub tracks: u32,
    pub steps: u64,
    /// Energy absorbed in the window slabs (keV)
    pub deposited: f64,
}

/// Something that can carry a primary through the detector and report steps
pub trait TransportEngine {
    fn detector(&self) -> &Detector;

    /// Track `primary` and all its secondaries, calling `on_step` for every step.
    ///
    /// An error returned by `on_step` aborts the event.
    fn transport<R, F, E>(&self, primary: Particle, rng: &mut R, on_step: F) -> Result<EventTally, E>
    where
        R: Rng + ?Sized,
        F: FnMut(&Step) -> Result<(), E>;
}

/// Built-in engine for a stack of homogeneous slabs
#[derive(Debug, Clone)]
pub struct SlabTransport {
    detector: Detector,
}

impl SlabTransport {
    pub fn new(detector: Detector) -> Self {
        Self { detector }
    }

    fn is_void(&self, volume: Volume) -> bool {
        match volume {
            Volume::Envelope => true,
            // With no envelope, empty space between placed volumes is still traversed
            Volume::OutOfWorld => self.detector.envelope().is_none(),
            _ => false,
        }
    }

    fn track_photon<R, F, E>(
        &self,
        mut photon: Particle,
        bank: &mut ParticleBank,
        tally: &mut EventTally,
        rng: &mut R,
        on_step: &mut F,
    ) -> Result<(), E>
    where
        R: Rng + ?Sized,
        F: FnMut(&Step) -> Result<(), E>,
    {
        let mut volume = self.detector.locate(photon.position);
        for _ in 0..MAX_STEPS {
            if volume == Volume::GasGap || !(self.is_void(volume) || self.detector.material(volume).is_some()) {
                return Ok(());
            }
            let pre = StepPoint::of(&photon, volume);
            let (boundary, next) = self.detector.next_boundary(photon.position, photon.direction, volume);
            if !boundary.is_finite() {
                return Ok(());
            }

            let material = self.detector.material(volume);
            let in_window = matches!(volume, Volume::Layer(_));
            let interaction_distance = material
                .map(|m| m.sample_distance_to_interaction(photon.energy, rng))
                .unwrap_or(f64::INFINITY);

            tally.steps += 1;
            if interaction_distance < boundary {
                photon.move_by(interaction_distance);
                let Some(material) = material else { return Ok(()) };
                let result = physics::interact(&mut photon, material, rng);
                let post = StepPoint::of(&photon, volume);
                on_step(&self.step(&photon, pre, post, false))?;

                if in_window {
                    tally.deposited += result.local_deposit;
                }
                for secondary in result.secondaries {
                    bank.bank_secondary(secondary);
                }
                if !result.survives {
                    return Ok(());
                }
                if photon.energy < PHOTON_CUT {
                    if in_window {
                        tally.deposited += photon.energy;
                    }
                    return Ok(());
                }
            } else {
                photon.move_by(boundary);
                let post = StepPoint::of(&photon, next);
                on_step(&self.step(&photon, pre, post, true))?;
                volume = next;
            }
        }
        log::warn!("Photon track {} exceeded {} steps; dropped", photon.track_id, MAX_STEPS);
        Ok(())
    }

    /// Electrons run straight along their CSDA range, losing energy as the
    /// remaining range shrinks.
    fn track_electron<F, E>(&self, mut electron: Particle, tally: &mut EventTally, on_step: &mut F) -> Result<(), E>
    where
        F: FnMut(&Step) -> Result<(), E>,
    {
        let mut volume = self.detector.locate(electron.position);
        for _ in 0..MAX_STEPS {
            let in_window = matches!(volume, Volume::Layer(_));
            if electron.energy < ELECTRON_CUT {
                if in_window {
                    tally.deposited += electron.energy;
                }
                return Ok(());
            }
            if volume == Volume::GasGap || !(self.is_void(volume) || self.detector.material(volume).is_some()) {
                return Ok(());
            }
            let pre = StepPoint::of(&electron, volume);
            let (boundary, next) = self.detector.next_boundary(electron.position, electron.direction, volume);
            if !boundary.is_finite() {
                return Ok(());
            }
            tally.steps += 1;

            let mut energy_after = electron.energy;
            if let Some(material) = self.detector.material(volume) {
                let range = material.electron_range(electron.energy);
                if range <= boundary {
                    electron.move_by(range);
                    if in_window {
                        tally.deposited += electron.energy;
                    }
                    electron.energy = 0.0;
                    let post = StepPoint::of(&electron, volume);
                    on_step(&self.step(&electron, pre, post, false))?;
                    return Ok(());
                }
                let remaining = (range - boundary) / range;
                energy_after = electron.energy * remaining.powf(1.0 / RANGE_EXPONENT);
            }
            electron.move_by(boundary);
            if in_window {
                tally.deposited += electron.energy - energy_after;
            }
            electron.energy = energy_after;
            let post = StepPoint::of(&electron, next);
            on_step(&self.step(&electron, pre, post, true))?;
            volume = next;
        }
        log::warn!("Electron track {} exceeded {} steps; dropped", electron.track_id, MAX_STEPS);
        Ok(())
    }

    fn step(&self, particle: &Particle, pre: StepPoint, post: StepPoint, last_in_volume: bool) -> Step {
        Step {
            kind: particle.kind,
            track_id: particle.track_id,
            parent_id: particle.parent_id,
            pre,
            post,
            last_in_volume,
        }
    }
}

impl TransportEngine for SlabTransport {
    fn detector(&self) -> &Detector {
        &self.detector
    }

    fn transport<R, F, E>(&self, primary: Particle, rng: &mut R, mut on_step: F) -> Result<EventTally, E>
    where
        R: Rng + ?Sized,
        F: FnMut(&Step) -> Result<(), E>,
    {
        let mut bank = ParticleBank::new();
        let mut tally = EventTally::default();
        bank.add_source_particle(primary);

        while let Some(particle) = bank.pop_particle() {
            tally.tracks += 1;
            match particle.kind {
                ParticleKind::Photon => self.track_photon(particle, &mut bank, &mut tally, rng, &mut on_step)?,
                ParticleKind::Electron => self.track_electron(particle, &mut tally, &mut on_step)?,
            }
        }
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{MaterialLayer, MaterialRegistry};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::convert::Infallible;

    fn thin_window() -> Detector {
        let layers = vec![
            MaterialLayer::new("vacuum", 1.5),
            MaterialLayer::new("kapton", 5e-3),
            MaterialLayer::new("copper", 5e-3),
        ];
        Detector::build(&layers, &MaterialRegistry::standard()).unwrap()
    }

    fn collect(engine: &SlabTransport, primary: Particle, seed: u64) -> Vec<Step> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut steps = Vec::new();
        engine
            .transport(primary, &mut rng, |step| -> Result<(), Infallible> {
                steps.push(step.clone());
                Ok(())
            })
            .unwrap();
        steps
    }

    #[test]
    fn test_bank_assigns_track_ids() {
        let mut bank = ParticleBank::new();
        bank.add_source_particle(Particle::photon([0.0; 3], [0.0, 0.0, 1.0], 10.0));
        bank.bank_secondary(Particle::electron([0.0; 3], [0.0, 0.0, 1.0], 1.0));
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.pop_particle().unwrap().track_id, 1);
        assert_eq!(bank.pop_particle().unwrap().track_id, 2);
        assert!(bank.is_empty());
    }

    #[test]
    fn test_hard_photon_crosses_thin_window_into_gas() {
        let detector = thin_window();
        let start = [0.0, 0.0, detector.slabs()[0].bounds.min[2] - 1.0];
        let engine = SlabTransport::new(detector);

        // 60 keV through 10 um of foil almost never interacts
        let mut reached_gas = 0;
        for seed in 0..50 {
            let steps = collect(&engine, Particle::photon(start, [0.0, 0.0, 1.0], 60.0), seed);
            if steps
                .iter()
                .any(|s| s.track_id == 1 && s.pre.volume == Volume::Layer(1) && s.post.volume == Volume::GasGap)
            {
                reached_gas += 1;
            }
        }
        assert!(reached_gas >= 45, "only {} of 50 reached the gas", reached_gas);
    }

    #[test]
    fn test_boundary_steps_chain_volumes() {
        let detector = thin_window();
        let start = [0.0, 0.0, detector.slabs()[0].bounds.min[2] - 1.0];
        let engine = SlabTransport::new(detector);
        let steps = collect(&engine, Particle::photon(start, [0.0, 0.0, 1.0], 60.0), 1);
        let primary: Vec<&Step> = steps.iter().filter(|s| s.track_id == 1).collect();
        assert_eq!(primary[0].pre.volume, Volume::Envelope);
        for pair in primary.windows(2) {
            assert_eq!(pair[0].post.volume, pair[1].pre.volume);
        }
        for step in &primary {
            if step.last_in_volume {
                assert_ne!(step.pre.volume, step.post.volume);
            }
        }
    }

    #[test]
    fn test_electron_stops_inside_thick_copper() {
        let layers = vec![MaterialLayer::new("copper", 1.0)];
        let detector = Detector::build(&layers, &MaterialRegistry::standard()).unwrap();
        let center = [0.0, 0.0, detector.slabs()[0].center_z];
        let engine = SlabTransport::new(detector);
        let steps = collect(&engine, Particle::electron(center, [0.0, 0.0, 1.0], 20.0), 0);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].post.energy, 0.0);
        assert!(!steps[0].last_in_volume);
    }

    #[test]
    fn test_electron_loses_energy_crossing_foil() {
        let layers = vec![MaterialLayer::new("kapton", 1e-3)];
        let detector = Detector::build(&layers, &MaterialRegistry::standard()).unwrap();
        let entry = [0.0, 0.0, detector.slabs()[0].bounds.min[2]];
        let engine = SlabTransport::new(detector);
        let steps = collect(&engine, Particle::electron(entry, [0.0, 0.0, 1.0], 20.0), 0);
        let exit = steps
            .iter()
            .find(|s| s.post.volume == Volume::GasGap)
            .expect("electron should reach the gas");
        assert!(exit.post.energy < 20.0 && exit.post.energy > 0.0);
    }

    #[test]
    fn test_electron_gas_entry_time_follows_flight() {
        let layers = vec![MaterialLayer::new("kapton", 1e-3)];
        let detector = Detector::build(&layers, &MaterialRegistry::standard()).unwrap();
        let entry = [0.0, 0.0, detector.slabs()[0].bounds.min[2]];
        let engine = SlabTransport::new(detector);
        let mut electron = Particle::electron(entry, [0.0, 0.0, 1.0], 20.0);
        electron.time = 2.0;
        let flight = 1e-3 / electron.speed();
        let steps = collect(&engine, electron, 0);
        let exit = steps
            .iter()
            .find(|s| s.post.volume == Volume::GasGap)
            .expect("electron should reach the gas");
        assert!((exit.post.time - (2.0 + flight)).abs() < 1e-12, "time {}", exit.post.time);
    }

    #[test]
    fn test_sideways_photon_stops_in_chamber_wall() {
        let engine = SlabTransport::new(thin_window());
        let mut clean = 0;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut wall_steps = 0;
            let tally = engine
                .transport(
                    Particle::photon([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], 8.0),
                    &mut rng,
                    |step| -> Result<(), Infallible> {
                        if step.track_id == 1 && step.pre.volume == Volume::Wall(3) {
                            wall_steps += 1;
                        }
                        Ok(())
                    },
                )
                .unwrap();
            assert!(wall_steps > 0, "seed {} never reached the wall", seed);
            // Fluorescence from the wall rarely finds its way back to the window
            if tally.deposited == 0.0 {
                clean += 1;
            }
        }
        assert!(clean >= 45, "only {} of 50 events left the window untouched", clean);
    }

    #[test]
    fn test_callback_error_aborts() {
        let engine = SlabTransport::new(thin_window());
        let mut rng = StdRng::seed_from_u64(0);
        let start = [0.0, 0.0, -0.5 * engine.detector().envelope_depth()];
        let result = engine.transport(Particle::photon(start, [0.0, 0.0, 1.0], 20.0), &mut rng, |_| Err("stop"));
        assert_eq!(result.unwrap_err(), "stop");
    }
}
