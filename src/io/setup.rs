//! JSON setup files.
//!
//! A setup file describes the domain, the grid and its decomposition, the
//! species and, optionally, the kinetics and diffusion parameters. Boundary and
//! unit codes are kept as strings in the file and parsed when the file is
//! converted into runtime configuration, so unknown codes surface as
//! [`ConfigError`]s.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::geom::bounds::DomainGeometry;
use crate::sim::kinetics::boundary::BoundarySet;
use crate::sim::kinetics::comm::Communicator;
use crate::sim::kinetics::config::{BulkReactor, DiffusionConfig, KineticsConfig, Unit};
use crate::sim::kinetics::error::ConfigError;
use crate::sim::kinetics::grid::{Decomposition, GridPartition};
use crate::sim::kinetics::orchestrator::KineticsOrchestrator;
use crate::sim::kinetics::species::{Species, SpeciesTable};

/// Setup file as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupFile {
    pub domain: DomainGeometry,
    /// Global cell count per axis.
    pub cells: [usize; 3],
    /// Number of workers per axis.
    #[serde(default = "single_part")]
    pub parts: [usize; 3],
    pub species: Vec<Species>,
    #[serde(default)]
    pub water: Option<String>,
    #[serde(default)]
    pub proton: Option<String>,
    #[serde(default)]
    pub particle_yields: Vec<f64>,
    #[serde(default)]
    pub kinetics: Option<KineticsSection>,
    #[serde(default)]
    pub diffusion: Option<DiffusionSection>,
}

fn single_part() -> [usize; 3] {
    [1, 1, 1]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticsSection {
    pub nevery: u64,
    pub temperature: f64,
    pub gas_constant: f64,
    pub gas_volume: f64,
    pub gas_transfer: f64,
    pub initial_ph: f64,
    pub diffusion_dt: f64,
    pub max_iterations: usize,
    /// `kg` or `mol`.
    pub unit: String,
}

impl Default for KineticsSection {
    fn default() -> Self {
        let c = KineticsConfig::default();
        Self {
            nevery: c.nevery,
            temperature: c.temperature,
            gas_constant: c.gas_constant,
            gas_volume: c.gas_volume,
            gas_transfer: c.gas_transfer,
            initial_ph: c.initial_ph,
            diffusion_dt: c.diffusion_dt,
            max_iterations: c.max_iterations,
            unit: "mol".to_string(),
        }
    }
}

impl KineticsSection {
    pub fn to_config(&self) -> Result<KineticsConfig> {
        let config = KineticsConfig {
            nevery: self.nevery,
            temperature: self.temperature,
            gas_constant: self.gas_constant,
            gas_volume: self.gas_volume,
            gas_transfer: self.gas_transfer,
            initial_ph: self.initial_ph,
            diffusion_dt: self.diffusion_dt,
            max_iterations: self.max_iterations,
            unit: self.unit.parse::<Unit>()?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Boundary codes per axis, e.g. `"pp"`, `"nd"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCodes {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl Default for BoundaryCodes {
    fn default() -> Self {
        Self {
            x: "pp".to_string(),
            y: "pp".to_string(),
            z: "nd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactorSection {
    pub flow_rate: f64,
    pub reactor_volume: f64,
    pub exchange_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionSection {
    pub boundaries: BoundaryCodes,
    pub tolerance: f64,
    pub shear_rate: f64,
    pub reactor: Option<ReactorSection>,
    pub bulk_exempt: Vec<String>,
}

impl Default for DiffusionSection {
    fn default() -> Self {
        let c = DiffusionConfig::default();
        Self {
            boundaries: BoundaryCodes::default(),
            tolerance: c.tolerance,
            shear_rate: c.shear_rate,
            reactor: None,
            bulk_exempt: c.bulk_exempt,
        }
    }
}

impl DiffusionSection {
    pub fn to_config(&self) -> Result<DiffusionConfig> {
        let b = &self.boundaries;
        let config = DiffusionConfig {
            boundaries: BoundarySet::from_codes(&b.x, &b.y, &b.z)?,
            tolerance: self.tolerance,
            shear_rate: self.shear_rate,
            reactor: self.reactor.map(|r| BulkReactor {
                flow_rate: r.flow_rate,
                reactor_volume: r.reactor_volume,
                exchange_area: r.exchange_area,
            }),
            bulk_exempt: self.bulk_exempt.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Runtime configuration built from a [`SetupFile`].
#[derive(Debug, Clone)]
pub struct Setup {
    pub domain: DomainGeometry,
    pub decomposition: Decomposition,
    pub species: SpeciesTable,
    pub particle_yields: Vec<f64>,
    pub kinetics: Option<KineticsConfig>,
    pub diffusion: Option<DiffusionConfig>,
}

impl Setup {
    pub fn from_file(file: &SetupFile) -> Result<Self> {
        if file.diffusion.is_some() && file.kinetics.is_none() {
            return Err(ConfigError::MissingCollaborator {
                feature: "diffusion",
                required: "kinetics",
            }
            .into());
        }
        let bounds = file.domain.grid_bounds();
        let decomposition = if file.parts == [1, 1, 1] {
            Decomposition::single(bounds, file.cells)
        } else {
            Decomposition::split(bounds, file.cells, file.parts)?
        };
        let species = SpeciesTable::with_names(
            file.species.clone(),
            file.water.as_deref().unwrap_or(SpeciesTable::WATER),
            file.proton.as_deref().unwrap_or(SpeciesTable::PROTON),
        );
        Ok(Self {
            domain: file.domain,
            decomposition,
            species,
            particle_yields: file.particle_yields.clone(),
            kinetics: file.kinetics.as_ref().map(|k| k.to_config()).transpose()?,
            diffusion: file.diffusion.as_ref().map(|d| d.to_config()).transpose()?,
        })
    }

    /// Builds the orchestrator for worker `rank`, with diffusion attached when
    /// configured. Returns `None` when the setup has no kinetics section.
    pub fn orchestrator(
        &self,
        rank: usize,
        comm: Box<dyn Communicator>,
    ) -> Result<Option<KineticsOrchestrator>> {
        let Some(kinetics) = &self.kinetics else {
            return Ok(None);
        };
        let grid = GridPartition::new(&self.decomposition, rank)?;
        let mut orchestrator = KineticsOrchestrator::initialize(
            kinetics.clone(),
            self.species.clone(),
            grid,
            self.particle_yields.clone(),
        )?;
        if let Some(diffusion) = &self.diffusion {
            orchestrator = orchestrator.with_diffusion(diffusion.clone(), comm)?;
        }
        Ok(Some(orchestrator))
    }
}

/// Reads and converts a setup file.
///
/// # Arguments
/// * `path` - Path to the JSON setup file
///
/// # Example
/// ```no_run
/// use biokinetics::io::load_setup;
/// use std::path::Path;
///
/// let setup = load_setup(Path::new("biofilm.json")).unwrap();
/// println!("{} species", setup.species.len());
/// ```
pub fn load_setup(path: &Path) -> Result<Setup> {
    let file = read_setup_file(path)?;
    Setup::from_file(&file).with_context(|| format!("Invalid setup in: {}", path.display()))
}

/// Reads a setup file without converting it.
pub fn read_setup_file(path: &Path) -> Result<SetupFile> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let setup: SetupFile = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to deserialize setup from: {}", path.display()))?;

    Ok(setup)
}

/// Writes a setup file as pretty-printed JSON.
pub fn write_setup_file(path: &Path, setup: &SetupFile) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, setup)
        .with_context(|| format!("Failed to serialize setup to: {}", path.display()))?;

    Ok(())
}

/// Parses a setup from a JSON string.
pub fn setup_from_str(json: &str) -> Result<Setup> {
    let file: SetupFile =
        serde_json::from_str(json).context("Failed to deserialize setup from string")?;
    Setup::from_file(&file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::kinetics::boundary::AxisBoundary;
    use crate::sim::kinetics::comm::SingleWorker;

    const COLUMN: &str = r#"{
        "domain": {
            "bounds": {"lo": {"x": 0, "y": 0, "z": 0}, "hi": {"x": 1, "y": 1, "z": 3}},
            "sub_domain": {"lo": {"x": 0, "y": 0, "z": 0}, "hi": {"x": 1, "y": 1, "z": 3}}
        },
        "cells": [1, 1, 3],
        "species": [
            {"name": "o2", "diffusivity": 1.0, "initial": 0.2,
             "faces": {"xlo": 0, "xhi": 0, "ylo": 0, "yhi": 0, "zlo": 0, "zhi": 1}},
            {"name": "co2g", "diffusivity": 0.0, "phase": "gas", "initial": 0.0,
             "faces": {"xlo": 0, "xhi": 0, "ylo": 0, "yhi": 0, "zlo": 0, "zhi": 0}}
        ],
        "kinetics": {"diffusion_dt": 0.1, "unit": "kg"},
        "diffusion": {"boundaries": {"x": "nn", "y": "nn", "z": "dd"}}
    }"#;

    #[test]
    fn test_setup_from_str() -> Result<()> {
        let setup = setup_from_str(COLUMN)?;
        assert_eq!(setup.species.len(), 2);
        assert_eq!(setup.decomposition.workers(), 1);
        let k = setup.kinetics.as_ref().unwrap();
        assert_eq!(k.unit, Unit::Mass);
        assert_eq!(k.diffusion_dt, 0.1);
        assert_eq!(k.max_iterations, 10_000);
        let d = setup.diffusion.as_ref().unwrap();
        assert_eq!(d.boundaries.z, AxisBoundary::DirichletDirichlet);
        assert_eq!(d.bulk_exempt, vec!["o2".to_string()]);

        let o = setup.orchestrator(0, Box::new(SingleWorker))?.unwrap();
        assert!(o.diffusion().is_some());
        Ok(())
    }

    #[test]
    fn test_unknown_boundary_code() {
        let json = COLUMN.replace(r#""z": "dd""#, r#""z": "xx""#);
        let err = setup_from_str(&json).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownBoundaryCode { axis: 'z', .. })
        ));
    }

    #[test]
    fn test_unknown_unit_code() {
        let json = COLUMN.replace(r#""unit": "kg""#, r#""unit": "lb""#);
        let err = setup_from_str(&json).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnknownUnitCode("lb".to_string()))
        );
    }

    #[test]
    fn test_diffusion_requires_kinetics() {
        let json = COLUMN.replace(r#""kinetics": {"diffusion_dt": 0.1, "unit": "kg"},"#, "");
        let err = setup_from_str(&json).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingCollaborator {
                feature: "diffusion",
                required: "kinetics"
            })
        );
    }

    #[test]
    fn test_write_then_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("setup.json");
        let file: SetupFile = serde_json::from_str(COLUMN)?;
        write_setup_file(&path, &file)?;
        assert_eq!(read_setup_file(&path)?, file);
        let setup = load_setup(&path)?;
        assert_eq!(setup.particle_yields, Vec::<f64>::new());
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = load_setup(Path::new("/nonexistent/setup.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
