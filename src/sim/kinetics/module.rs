use anyhow::Result;

use crate::sim::coupling::{
    ActiveLayers, BiofilmHeight, BulkConcentrations, KineticsReport, ParticleSnapshot,
};
use crate::sim::framework::{Bus, SimContext, SimModule};
use crate::sim::kinetics::comm::Communicator;
use crate::sim::kinetics::grid::GridPartition;
use crate::sim::kinetics::height::{active_layers_for_height, mean_biofilm_height};
use crate::sim::kinetics::orchestrator::KineticsOrchestrator;

/// Runs the kinetics orchestrator inside a [`crate::sim::framework::Pipeline`].
pub struct KineticsModule {
    orchestrator: KineticsOrchestrator,
}

impl KineticsModule {
    pub fn new(orchestrator: KineticsOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &KineticsOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut KineticsOrchestrator {
        &mut self.orchestrator
    }

    fn publish_bulk(&self, bus: &mut Bus) {
        let state = self.orchestrator.state();
        let by_species = state
            .species()
            .iter()
            .zip(&state.bulk_values()[1..])
            .map(|((_, s), &v)| (s.name.clone(), v))
            .collect();
        bus.put(BulkConcentrations { by_species });
    }
}

impl SimModule for KineticsModule {
    fn name(&self) -> &'static str {
        "kinetics"
    }

    fn init(&mut self, _ctx: &SimContext, bus: &mut Bus) -> Result<()> {
        self.publish_bulk(bus);
        Ok(())
    }

    fn step(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()> {
        if let Some(ActiveLayers(layers)) = bus.take::<ActiveLayers>() {
            self.orchestrator.set_active_layers(layers);
        }
        let Some(report) = self.orchestrator.step(ctx.step, ctx.dt)? else {
            return Ok(());
        };
        bus.put(KineticsReport {
            step: ctx.step,
            report,
        });
        self.publish_bulk(bus);
        Ok(())
    }
}

/// Estimates the biofilm height from the particle snapshot and converts it
/// into the number of active grid layers.
pub struct BiofilmHeightModule {
    comm: Box<dyn Communicator>,
    columns: [usize; 2],
    boundary_layer: f64,
    step: f64,
    layers: usize,
    nevery: u64,
}

impl BiofilmHeightModule {
    /// `boundary_layer` is the extra thickness kept active above the biofilm.
    pub fn new(grid: &GridPartition, boundary_layer: f64, comm: Box<dyn Communicator>) -> Self {
        let cells = grid.global_cells();
        Self {
            comm,
            columns: [cells[0], cells[1]],
            boundary_layer,
            step: grid.step(),
            layers: cells[2],
            nevery: 1,
        }
    }

    /// Runs only on steps that are multiples of `nevery` (0 disables).
    pub fn with_cadence(mut self, nevery: u64) -> Self {
        self.nevery = nevery;
        self
    }
}

impl SimModule for BiofilmHeightModule {
    fn name(&self) -> &'static str {
        "biofilm-height"
    }

    fn step(&mut self, ctx: &SimContext, bus: &mut Bus) -> Result<()> {
        if self.nevery == 0 || ctx.step % self.nevery != 0 {
            return Ok(());
        }
        let empty = ParticleSnapshot::default();
        let particles = bus.get::<ParticleSnapshot>().unwrap_or(&empty);
        let height = mean_biofilm_height(
            &particles.0,
            &ctx.domain.grid_bounds(),
            self.columns,
            self.comm.as_mut(),
        )?;
        let layers = active_layers_for_height(height, self.boundary_layer, self.step, self.layers);
        bus.put(BiofilmHeight(height));
        bus.put(ActiveLayers(layers));
        Ok(())
    }
}
