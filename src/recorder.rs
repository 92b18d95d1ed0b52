//! Per-event hit bookkeeping.
//!
//! The recorder watches the step stream of each event and fills one bucket
//! per solid layer with the energies of photons leaving that layer. Photons
//! and electrons that cross from the cathode into the gas gap are kept as
//! candidates; at the end of the event they are handed to the ionization
//! oracle and the event is flagged as a conversion when the summed count
//! passes the threshold.

use crate::gas::{GasEntry, IonizationOracle};
use crate::geometry::{Detector, Volume};
use crate::output::{OutputError, Tree, TreeFile};
use crate::particle::{Particle, Vec3};
use crate::run::SimulationHooks;
use crate::transport::Step;

/// Tree holding the sampled primary energies
pub const PRIMARY_TREE: &str = "primary";

/// Tree holding conversion records
pub const CONVERSION_TREE: &str = "conversion";

/// Events between progress messages
pub const PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Step or end of event received outside an event")]
    NotInEvent,

    #[error("Event {requested} started while event {open} is still open")]
    AlreadyInEvent { requested: u64, open: u64 },

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Conversion bookkeeping parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionSettings {
    /// Summed ionization count an event must exceed to count as a conversion
    pub threshold: u64,
    /// Energy per ionization electron used to express counts as energy (eV)
    pub w_value: f64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            threshold: 20,
            w_value: 31.2,
        }
    }
}

/// One event's outcome in the gas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionRecord {
    pub energy_kev: f64,
    pub primaries: u64,
}

/// A photon leaving a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerHit {
    /// Total energy before the boundary (keV)
    pub energy: f64,
    pub position: Vec3,
    pub direction: Vec3,
}

/// Buckets filled during one event
#[derive(Debug, Clone, Default)]
pub struct EventSample {
    /// One bucket per solid layer, in stack order
    pub layers: Vec<Vec<LayerHit>>,
    /// Photons crossing from the cathode into the gas
    pub photons: Vec<GasEntry>,
    /// Electrons crossing from the cathode into the gas
    pub electrons: Vec<GasEntry>,
    pub conversion: Option<ConversionRecord>,
}

impl EventSample {
    fn with_layers(n: usize) -> Self {
        Self {
            layers: vec![Vec::new(); n],
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        for bucket in &mut self.layers {
            bucket.clear();
        }
        self.photons.clear();
        self.electrons.clear();
        self.conversion = None;
    }

    /// Layer buckets plus the conversion bucket
    pub fn bucket_count(&self) -> usize {
        self.layers.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
            && self.photons.is_empty()
            && self.electrons.is_empty()
            && self.conversion.is_none()
    }
}

/// All mutable state of a run, owned by the recorder
#[derive(Debug, Clone)]
pub struct RunContext {
    branches: Vec<String>,
    cathode: usize,
    output: TreeFile,
    sample: EventSample,
    current_event: Option<u64>,
    total_events: u64,
    events_recorded: u64,
    conversions: u64,
}

impl RunContext {
    /// Lay out the output trees for `detector`: primary, one per layer, conversion
    pub fn new(detector: &Detector) -> Result<Self, OutputError> {
        let branches = detector.branch_names();
        let cathode = detector.cathode();

        let mut output = TreeFile::new();
        output.add_tree(Tree::new(PRIMARY_TREE, &["energy"]))?;
        for (i, name) in branches.iter().enumerate() {
            let tree = if i == cathode {
                Tree::new(name, &["energy", "x", "y", "z", "dx", "dy", "dz"])
            } else {
                Tree::new(name, &["energy"])
            };
            output.add_tree(tree)?;
        }
        output.add_tree(Tree::new(CONVERSION_TREE, &["energy", "primaries"]))?;

        Ok(Self {
            sample: EventSample::with_layers(branches.len()),
            branches,
            cathode,
            output,
            current_event: None,
            total_events: 0,
            events_recorded: 0,
            conversions: 0,
        })
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn output(&self) -> &TreeFile {
        &self.output
    }

    pub fn sample(&self) -> &EventSample {
        &self.sample
    }

    pub fn events_recorded(&self) -> u64 {
        self.events_recorded
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn in_event(&self) -> bool {
        self.current_event.is_some()
    }
}

/// Records hits and resolves conversions through an [`IonizationOracle`]
pub struct HitRecorder<O: IonizationOracle> {
    context: RunContext,
    oracle: O,
    settings: ConversionSettings,
}

impl<O: IonizationOracle> HitRecorder<O> {
    pub fn new(detector: &Detector, oracle: O, settings: ConversionSettings) -> Result<Self, OutputError> {
        Ok(Self {
            context: RunContext::new(detector)?,
            oracle,
            settings,
        })
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// Hand over the filled trees at the end of the run
    pub fn into_output(self) -> TreeFile {
        self.context.output
    }

    fn record_step(&mut self, step: &Step) {
        let cathode = self.context.cathode;
        let sample = &mut self.context.sample;

        if step.is_photon() && step.last_in_volume {
            if let Volume::Layer(layer) = step.pre.volume {
                if let Some(bucket) = sample.layers.get_mut(layer) {
                    bucket.push(LayerHit {
                        energy: step.pre.energy,
                        position: step.post.position,
                        direction: step.post.direction,
                    });
                }
                if layer == cathode && step.post.volume == Volume::GasGap {
                    sample.photons.push(gas_entry(step));
                }
            }
        } else if step.is_electron()
            && step.pre.volume == Volume::Layer(cathode)
            && step.post.volume == Volume::GasGap
        {
            sample.electrons.push(gas_entry(step));
        }
    }

    /// Transport every candidate through the gas and sum the positive counts
    fn resolve_conversion(&mut self) -> Option<ConversionRecord> {
        let sample = &self.context.sample;
        let mut primaries: u64 = 0;
        for entry in &sample.photons {
            primaries += self.oracle.transport_photon(entry).max(0) as u64;
        }
        for entry in &sample.electrons {
            primaries += self.oracle.transport_electron(entry).max(0) as u64;
        }
        if primaries > self.settings.threshold {
            Some(ConversionRecord {
                energy_kev: primaries as f64 * self.settings.w_value / 1e3,
                primaries,
            })
        } else {
            None
        }
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        let context = &mut self.context;
        for (i, bucket) in context.sample.layers.iter().enumerate() {
            let tree = context.output.tree_mut(&context.branches[i])?;
            for hit in bucket {
                if i == context.cathode {
                    let [x, y, z] = hit.position;
                    let [dx, dy, dz] = hit.direction;
                    tree.fill(&[hit.energy, x, y, z, dx, dy, dz])?;
                } else {
                    tree.fill(&[hit.energy])?;
                }
            }
        }
        if let Some(record) = context.sample.conversion {
            context
                .output
                .tree_mut(CONVERSION_TREE)?
                .fill(&[record.energy_kev, record.primaries as f64])?;
        }
        Ok(())
    }
}

fn gas_entry(step: &Step) -> GasEntry {
    GasEntry {
        position: step.post.position,
        time: step.post.time,
        energy: step.post.energy,
        direction: step.post.direction,
    }
}

impl<O: IonizationOracle> SimulationHooks for HitRecorder<O> {
    type Error = RecorderError;

    fn begin_run(&mut self, _detector: &Detector, events: u64) -> Result<(), RecorderError> {
        self.context.total_events = events;
        log::info!(
            "Recording {} events over branches [{}]",
            events,
            self.context.branches.join(", ")
        );
        Ok(())
    }

    fn begin_event(&mut self, event_id: u64, primary: &Particle) -> Result<(), RecorderError> {
        if let Some(open) = self.context.current_event {
            return Err(RecorderError::AlreadyInEvent {
                requested: event_id,
                open,
            });
        }
        self.context.current_event = Some(event_id);
        self.context.sample.reset();
        self.context.output.tree_mut(PRIMARY_TREE)?.fill(&[primary.energy])?;

        if event_id % PROGRESS_INTERVAL == 0 {
            log::info!("{}/{}", event_id, self.context.total_events);
        }
        Ok(())
    }

    fn step(&mut self, step: &Step) -> Result<(), RecorderError> {
        if !self.context.in_event() {
            return Err(RecorderError::NotInEvent);
        }
        self.record_step(step);
        Ok(())
    }

    fn end_event(&mut self) -> Result<(), RecorderError> {
        if !self.context.in_event() {
            return Err(RecorderError::NotInEvent);
        }
        let conversion = self.resolve_conversion();
        self.context.sample.conversion = conversion;
        self.flush()?;

        if conversion.is_some() {
            self.context.conversions += 1;
        }
        self.context.events_recorded += 1;
        self.context.current_event = None;
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), RecorderError> {
        log::info!(
            "{} events recorded, {} conversions",
            self.context.events_recorded,
            self.context.conversions
        );
        Ok(())
    }
}
