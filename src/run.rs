//! Run lifecycle: begin-run, then per event begin, steps, end; then end-run.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::geometry::Detector;
use crate::particle::Particle;
use crate::source::PrimaryGenerator;
use crate::transport::{Step, TransportEngine};

/// Callbacks invoked by [`RunManager`] as a run progresses.
///
/// Any error returned by a hook aborts the run.
pub trait SimulationHooks {
    type Error;

    fn begin_run(&mut self, _detector: &Detector, _events: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    fn begin_event(&mut self, event_id: u64, primary: &Particle) -> Result<(), Self::Error>;

    fn step(&mut self, step: &Step) -> Result<(), Self::Error>;

    fn end_event(&mut self) -> Result<(), Self::Error>;

    fn end_run(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub events: u64,
    pub tracks: u64,
    pub steps: u64,
    /// Energy absorbed in the slabs (keV)
    pub deposited: f64,
    pub elapsed: Duration,
}

/// Drives events through a transport engine, strictly one after another
pub struct RunManager<E: TransportEngine> {
    engine: E,
    generator: PrimaryGenerator,
    rng: StdRng,
}

impl<E: TransportEngine> RunManager<E> {
    pub fn new(engine: E, generator: PrimaryGenerator, seed: u64) -> Self {
        Self {
            engine,
            generator,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn detector(&self) -> &Detector {
        self.engine.detector()
    }

    pub fn run<H: SimulationHooks>(&mut self, events: u64, hooks: &mut H) -> Result<RunSummary, H::Error> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        hooks.begin_run(self.engine.detector(), events)?;
        for event_id in 0..events {
            let primary = self.generator.generate(&mut self.rng);
            hooks.begin_event(event_id, &primary)?;
            let tally = self.engine.transport(primary, &mut self.rng, |step| hooks.step(step))?;
            hooks.end_event()?;

            summary.events += 1;
            summary.tracks += u64::from(tally.tracks);
            summary.steps += tally.steps;
            summary.deposited += tally.deposited;
        }
        hooks.end_run()?;

        summary.elapsed = started.elapsed();
        log::info!(
            "Run finished: {} events, {} tracks, {} steps in {:.2?}",
            summary.events,
            summary.tracks,
            summary.steps,
            summary.elapsed
        );
        Ok(summary)
    }
}
