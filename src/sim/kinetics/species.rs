use serde::{Deserialize, Serialize};

use crate::sim::kinetics::grid::Face;

/// Reaction phase of a species. Gas-phase species are not diffused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Liquid,
    Gas,
}

/// Role of a species in the nonlinear iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesKind {
    Solute,
    /// Solvent; never iterated.
    Water,
    /// Hydrogen ion; never iterated, its activity is the proton activity itself.
    Proton,
}

/// One value per domain face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceValues {
    pub xlo: f64,
    pub xhi: f64,
    pub ylo: f64,
    pub yhi: f64,
    pub zlo: f64,
    pub zhi: f64,
}

impl FaceValues {
    pub fn uniform(value: f64) -> Self {
        Self {
            xlo: value,
            xhi: value,
            ylo: value,
            yhi: value,
            zlo: value,
            zhi: value,
        }
    }

    pub fn get(&self, face: Face) -> f64 {
        match face {
            Face::XLow => self.xlo,
            Face::XHigh => self.xhi,
            Face::YLow => self.ylo,
            Face::YHigh => self.yhi,
            Face::ZLow => self.zlo,
            Face::ZHigh => self.zhi,
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self {
            xlo: self.xlo * factor,
            xhi: self.xhi * factor,
            ylo: self.ylo * factor,
            yhi: self.yhi * factor,
            zlo: self.zlo * factor,
            zhi: self.zhi * factor,
        }
    }
}

/// A dissolved (or gaseous) chemical species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    /// Diffusion coefficient.
    pub diffusivity: f64,
    #[serde(default)]
    pub phase: Phase,
    /// Standard Gibbs free energies of formation [kJ/mol]: hydrated form,
    /// fully protonated form, then the three deprotonated forms.
    ///
    /// Values above [`crate::sim::kinetics::speciation::IRREVERSIBLE_THRESHOLD`]
    /// mark forms that do not exist.
    #[serde(default)]
    pub free_energy: [f64; 5],
    /// Initial interior (bulk) concentration.
    pub initial: f64,
    /// Face boundary values; `zhi` doubles as the initial reservoir value.
    pub faces: FaceValues,
}

impl Species {
    pub fn new(name: &str, diffusivity: f64) -> Self {
        Self {
            name: name.to_string(),
            diffusivity,
            phase: Phase::Liquid,
            free_energy: [0.0; 5],
            initial: 0.0,
            faces: FaceValues::default(),
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_free_energy(mut self, free_energy: [f64; 5]) -> Self {
        self.free_energy = free_energy;
        self
    }

    /// Sets the same value for the interior and all six faces.
    pub fn with_uniform(mut self, value: f64) -> Self {
        self.initial = value;
        self.faces = FaceValues::uniform(value);
        self
    }

    pub fn with_initial(mut self, initial: f64) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_faces(mut self, faces: FaceValues) -> Self {
        self.faces = faces;
        self
    }

    pub fn is_liquid(&self) -> bool {
        self.phase == Phase::Liquid
    }
}

/// Species indexed `1..=len()`; index 0 is reserved.
#[derive(Debug, Clone, Default)]
pub struct SpeciesTable {
    species: Vec<Species>,
    water_name: String,
    proton_name: String,
}

impl SpeciesTable {
    pub const WATER: &'static str = "h2o";
    pub const PROTON: &'static str = "h";

    pub fn new(species: Vec<Species>) -> Self {
        Self::with_names(species, Self::WATER, Self::PROTON)
    }

    /// Table whose water and hydrogen-ion species carry custom names.
    pub fn with_names(species: Vec<Species>, water_name: &str, proton_name: &str) -> Self {
        Self {
            species,
            water_name: water_name.to_string(),
            proton_name: proton_name.to_string(),
        }
    }

    /// Number of species (excluding the reserved index 0).
    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Species at 1-based `index`.
    ///
    /// Panics if `index` is 0 or out of range.
    pub fn get(&self, index: usize) -> &Species {
        assert!(
            index >= 1 && index <= self.species.len(),
            "species index {index} out of range 1..={}",
            self.species.len()
        );
        &self.species[index - 1]
    }

    /// Iterates `(index, species)` with 1-based indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Species)> {
        self.species.iter().enumerate().map(|(i, s)| (i + 1, s))
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.species.len()
    }

    /// 1-based index of the species called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name).map(|i| i + 1)
    }

    pub fn kind(&self, index: usize) -> SpeciesKind {
        let name = &self.get(index).name;
        if *name == self.water_name {
            SpeciesKind::Water
        } else if *name == self.proton_name {
            SpeciesKind::Proton
        } else {
            SpeciesKind::Solute
        }
    }

    pub fn name(&self, index: usize) -> &str {
        &self.get(index).name
    }
}
