use anyhow::Result;

use crate::sim::kinetics::error::ConfigError;
use crate::sim::kinetics::orchestrator::Growth;
use crate::sim::kinetics::species::SpeciesTable;
use crate::sim::kinetics::state::KineticsState;

/// Gas/liquid mass transfer coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferParams {
    /// Volumetric mass transfer coefficient.
    pub kga: f64,
    /// Henry's law solubility constant.
    pub henry: f64,
    pub temperature: f64,
    pub gas_constant: f64,
    /// Molar mass of the transferred compound.
    pub molar_mass: f64,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            kga: 0.0,
            henry: 1.0,
            temperature: 1.0,
            gas_constant: 1.0,
            molar_mass: 1.0,
        }
    }
}

impl TransferParams {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("henry", self.henry),
            ("temperature", self.temperature),
            ("gas_constant", self.gas_constant),
            ("molar_mass", self.molar_mass),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(name, format!("must be positive, got {value}")).into());
            }
        }
        Ok(())
    }
}

/// Exchange between a dissolved species and its gas-phase counterpart.
///
/// In every interior cell the gas gains `p = kga * (C_liq / (H * Mw) - bulk_gas)`
/// and the liquid gains `-p / (R * T) * Mw`.
#[derive(Debug, Clone)]
pub struct GasLiquidTransfer {
    liquid: usize,
    gas: usize,
    params: TransferParams,
    enabled: bool,
}

impl GasLiquidTransfer {
    pub fn new(species: &SpeciesTable, liquid: &str, gas: &str, params: TransferParams) -> Result<Self> {
        params.validate()?;
        let find = |name: &str, what: &'static str| {
            species
                .find(name)
                .ok_or_else(|| ConfigError::invalid(what, format!("no species named '{name}'")))
        };
        Ok(Self {
            liquid: find(liquid, "liquid")?,
            gas: find(gas, "gas")?,
            params,
            enabled: true,
        })
    }

    /// Switches the transfer on or off without removing it.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Adds the transfer rates of every interior cell to the state.
    pub fn compute(&self, state: &mut KineticsState) {
        let p = &self.params;
        let bulk_gas = state.bulk(self.gas);
        let cells: Vec<usize> = state.grid().interior_cells().collect();
        for cell in cells {
            let c_liq = state.concentration()[[self.liquid, cell]];
            let to_gas = p.kga * (c_liq / (p.henry * p.molar_mass) - bulk_gas);
            let to_liquid = -to_gas / (p.gas_constant * p.temperature);
            state.add_reaction_rate(self.gas, cell, to_gas);
            state.add_reaction_rate(self.liquid, cell, to_liquid * p.molar_mass);
        }
    }
}

impl Growth for GasLiquidTransfer {
    fn grow(&mut self, state: &mut KineticsState, _dt: f64) -> Result<()> {
        if self.enabled {
            self.compute(state);
        }
        Ok(())
    }
}

/// Several growth-stage contributors run in insertion order.
#[derive(Default)]
pub struct GrowthChain {
    stages: Vec<Box<dyn Growth>>,
}

impl GrowthChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: Box<dyn Growth>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Growth for GrowthChain {
    fn grow(&mut self, state: &mut KineticsState, dt: f64) -> Result<()> {
        for stage in &mut self.stages {
            stage.grow(state, dt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::Bounds;
    use crate::sim::kinetics::config::Unit;
    use crate::sim::kinetics::grid::{Decomposition, GridPartition};
    use crate::sim::kinetics::species::{Phase, Species};

    fn state() -> Result<KineticsState> {
        let d = Decomposition::single(Bounds::from_extent(1., 1., 1.), [1, 1, 1]);
        let table = SpeciesTable::new(vec![
            Species::new("co2", 1.0).with_uniform(4.0),
            Species::new("co2g", 0.0).with_phase(Phase::Gas).with_uniform(1.0),
        ]);
        KineticsState::new(table, GridPartition::new(&d, 0)?, Unit::Molar, vec![])
    }

    fn params() -> TransferParams {
        TransferParams {
            kga: 0.5,
            henry: 2.0,
            temperature: 2.0,
            gas_constant: 0.5,
            molar_mass: 1.0,
        }
    }

    #[test]
    fn test_transfer_rates() -> Result<()> {
        let mut s = state()?;
        let mut t = GasLiquidTransfer::new(s.species(), "co2", "co2g", params())?;
        t.grow(&mut s, 1.0)?;
        let cell = s.grid().index(1, 1, 1);
        // p = 0.5 * (4 / 2 - 1) = 0.5
        assert!((s.reaction_rate()[[2, cell]] - 0.5).abs() < 1e-15);
        assert!((s.reaction_rate()[[1, cell]] + 0.5).abs() < 1e-15);
        // Ghost cells get nothing.
        assert_eq!(s.reaction_rate()[[2, 0]], 0.0);
        Ok(())
    }

    #[test]
    fn test_disabled_transfer_adds_nothing() -> Result<()> {
        let mut s = state()?;
        let mut t = GasLiquidTransfer::new(s.species(), "co2", "co2g", params())?;
        t.set_enabled(false);
        t.grow(&mut s, 1.0)?;
        assert!(s.reaction_rate().iter().all(|&r| r == 0.0));
        Ok(())
    }

    #[test]
    fn test_invalid_parameters() -> Result<()> {
        let s = state()?;
        let bad = TransferParams {
            henry: 0.0,
            ..params()
        };
        assert!(GasLiquidTransfer::new(s.species(), "co2", "co2g", bad).is_err());
        assert!(GasLiquidTransfer::new(s.species(), "co2", "ch4g", params()).is_err());
        Ok(())
    }

    #[test]
    fn test_chain_runs_every_stage() -> Result<()> {
        let mut s = state()?;
        let t = GasLiquidTransfer::new(s.species(), "co2", "co2g", params())?;
        let mut chain = GrowthChain::new().with(Box::new(t.clone())).with(Box::new(t));
        assert_eq!(chain.len(), 2);
        chain.grow(&mut s, 1.0)?;
        let cell = s.grid().index(1, 1, 1);
        assert!((s.reaction_rate()[[2, cell]] - 1.0).abs() < 1e-15);
        Ok(())
    }
}
