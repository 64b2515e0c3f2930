use anyhow::{Context, Result};
use ndarray as nd;

use crate::sim::kinetics::config::Unit;
use crate::sim::kinetics::grid::{Face, GridPartition};
use crate::sim::kinetics::species::{FaceValues, SpeciesTable};

/// Number of protonation forms tracked per species.
pub const FORMS: usize = 5;

/// Per-species and per-particle-type fields living on the padded grid.
///
/// Rows are indexed by 1-based species (or particle type) index; row 0 is
/// unused. Columns are flat grid cell indices. All concentrations are stored
/// in internal units (see [`Unit::factor`]).
#[derive(Debug, Clone)]
pub struct KineticsState {
    species: SpeciesTable,
    grid: GridPartition,
    unit: Unit,
    /// Face values per species, internal units.
    faces: Vec<FaceValues>,
    concentration: nd::Array2<f64>,
    reaction_rate: nd::Array2<f64>,
    gas_flux: nd::Array2<f64>,
    /// `[species, form, cell]`
    activity: nd::Array3<f64>,
    /// `[species, K0..K3]`
    keq: nd::Array2<f64>,
    /// Proton activity per cell.
    proton: Vec<f64>,
    /// Yield per particle type (index 0 unused).
    particle_yields: Vec<f64>,
    yields: nd::Array2<f64>,
    dg_catabolic: nd::Array2<f64>,
    dg_anabolic: nd::Array2<f64>,
    bulk: Vec<f64>,
}

impl KineticsState {
    /// Allocates every field for `grid` and seeds the concentrations.
    ///
    /// Interior cells take each species' initial value; ghost cells beyond a
    /// domain face take that face's value.
    pub fn new(
        species: SpeciesTable,
        grid: GridPartition,
        unit: Unit,
        particle_yields: Vec<f64>,
    ) -> Result<Self> {
        anyhow::ensure!(!species.is_empty(), "species table is empty");
        let rows = species.len() + 1;
        let cells = grid.cell_count();
        let types = particle_yields.len() + 1;
        let factor = unit.factor();

        let mut faces = vec![FaceValues::default(); rows];
        let mut bulk = vec![0.0; rows];
        let mut concentration = nd::Array2::zeros((rows, cells));
        for (i, s) in species.iter() {
            let f = s.faces.scale(factor);
            faces[i] = f;
            bulk[i] = f.zhi;
            for cell in 0..cells {
                let face = Face::PRIORITY.into_iter().find(|&face| grid.is_beyond(cell, face));
                concentration[[i, cell]] = match face {
                    Some(face) => f.get(face),
                    None => s.initial * factor,
                };
            }
        }

        let mut state = Self {
            species,
            grid,
            unit,
            faces,
            concentration,
            reaction_rate: nd::Array2::zeros((rows, cells)),
            gas_flux: nd::Array2::zeros((rows, cells)),
            activity: nd::Array3::zeros((rows, FORMS, cells)),
            keq: nd::Array2::zeros((rows, 4)),
            proton: vec![0.0; cells],
            particle_yields: std::iter::once(0.0).chain(particle_yields).collect(),
            yields: nd::Array2::zeros((types, cells)),
            dg_catabolic: nd::Array2::zeros((types, cells)),
            dg_anabolic: nd::Array2::zeros((types, cells)),
            bulk,
        };
        state.seed_yields();
        Ok(state)
    }

    pub fn species(&self) -> &SpeciesTable {
        &self.species
    }

    pub fn grid(&self) -> &GridPartition {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut GridPartition {
        &mut self.grid
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Face values of species `i` in internal units.
    pub fn faces(&self, i: usize) -> &FaceValues {
        &self.faces[i]
    }

    pub fn concentration(&self) -> &nd::Array2<f64> {
        &self.concentration
    }

    pub fn concentration_mut(&mut self) -> &mut nd::Array2<f64> {
        &mut self.concentration
    }

    /// Concentration of species `i` at every cell.
    pub fn concentration_row(&self, i: usize) -> Result<&[f64]> {
        self.concentration
            .row(i)
            .to_slice()
            .with_context(|| format!("concentration of species {i} is not contiguous"))
    }

    pub fn reaction_rate(&self) -> &nd::Array2<f64> {
        &self.reaction_rate
    }

    /// Adds a net production rate of species `i` in `cell`. Ghost cells ignore it.
    pub fn add_reaction_rate(&mut self, i: usize, cell: usize, rate: f64) {
        if !self.grid.is_ghost(cell) {
            self.reaction_rate[[i, cell]] += rate;
        }
    }

    pub fn clear_reaction_rates(&mut self) {
        self.reaction_rate.fill(0.0);
    }

    pub(crate) fn clear_reaction_rate(&mut self, i: usize) {
        self.reaction_rate.row_mut(i).fill(0.0);
    }

    /// Concentration row (mutable) and reaction rate row of species `i`.
    pub(crate) fn species_fields_mut(&mut self, i: usize) -> Result<(&mut [f64], &[f64])> {
        let conc = self
            .concentration
            .row_mut(i)
            .into_slice()
            .with_context(|| format!("concentration of species {i} is not contiguous"))?;
        let rate = self
            .reaction_rate
            .row(i)
            .to_slice()
            .with_context(|| format!("reaction rate of species {i} is not contiguous"))?;
        Ok((conc, rate))
    }

    pub fn gas_flux(&self) -> &nd::Array2<f64> {
        &self.gas_flux
    }

    pub fn gas_flux_mut(&mut self) -> &mut nd::Array2<f64> {
        &mut self.gas_flux
    }

    /// Activity of protonation `form` (0..5) of species `i` in `cell`.
    pub fn activity(&self, i: usize, form: usize, cell: usize) -> f64 {
        self.activity[[i, form, cell]]
    }

    pub fn activity_mut(&mut self) -> &mut nd::Array3<f64> {
        &mut self.activity
    }

    pub fn keq(&self, i: usize) -> [f64; 4] {
        let r = self.keq.row(i);
        [r[0], r[1], r[2], r[3]]
    }

    pub fn set_keq(&mut self, i: usize, k: [f64; 4]) {
        for (dst, v) in self.keq.row_mut(i).iter_mut().zip(k) {
            *dst = v;
        }
    }

    pub fn proton_activity(&self) -> &[f64] {
        &self.proton
    }

    pub fn proton_activity_mut(&mut self) -> &mut [f64] {
        &mut self.proton
    }

    /// Per-type yields with index 0 unused.
    pub fn particle_yields(&self) -> &[f64] {
        &self.particle_yields
    }

    pub fn yields(&self) -> &nd::Array2<f64> {
        &self.yields
    }

    pub fn dg_catabolic_mut(&mut self) -> &mut nd::Array2<f64> {
        &mut self.dg_catabolic
    }

    pub fn dg_catabolic(&self) -> &nd::Array2<f64> {
        &self.dg_catabolic
    }

    pub fn dg_anabolic_mut(&mut self) -> &mut nd::Array2<f64> {
        &mut self.dg_anabolic
    }

    pub fn dg_anabolic(&self) -> &nd::Array2<f64> {
        &self.dg_anabolic
    }

    /// Bulk reservoir concentration of species `i`, internal units.
    pub fn bulk(&self, i: usize) -> f64 {
        self.bulk[i]
    }

    pub fn bulk_values(&self) -> &[f64] {
        &self.bulk
    }

    pub fn set_bulk(&mut self, i: usize, value: f64) {
        self.bulk[i] = value;
    }

    /// Sum over interior cells of concentration times cell volume.
    pub fn local_mass(&self, i: usize) -> f64 {
        let vol = self.grid.cell_volume();
        self.grid
            .interior_cells()
            .map(|c| self.concentration[[i, c]] * vol)
            .sum()
    }

    /// Re-derives the per-cell yield field from the per-type yields.
    pub(crate) fn seed_yields(&mut self) {
        for (t, mut row) in self.yields.rows_mut().into_iter().enumerate().skip(1) {
            row.fill(self.particle_yields[t]);
        }
    }

    pub(crate) fn set_particle_yields(&mut self, particle_yields: &[f64]) -> Result<()> {
        anyhow::ensure!(
            particle_yields.len() + 1 == self.particle_yields.len(),
            "expected {} particle type yields, got {}",
            self.particle_yields.len() - 1,
            particle_yields.len()
        );
        self.particle_yields[1..].copy_from_slice(particle_yields);
        Ok(())
    }
}
