//! Acid/base equilibria at fixed pH.

use anyhow::Result;

use crate::sim::kinetics::error::ConfigError;
use crate::sim::kinetics::orchestrator::Speciation;
use crate::sim::kinetics::species::SpeciesKind;
use crate::sim::kinetics::state::{FORMS, KineticsState};

/// Standard Gibbs free energy of formation of water [kJ/mol].
pub const WATER_FORMATION_ENERGY: f64 = -237.18;

/// Free energies above this value mark protonation forms that do not exist.
pub const IRREVERSIBLE_THRESHOLD: f64 = 10000.0;

/// Hydration (`K0`) and three deprotonation constants (`K1..K3`) from the
/// free energies of the five forms.
///
/// A non-existent form `j` gets an extra `j * 10001` kJ/mol so its constant
/// underflows to zero instead of the exponent overflowing.
pub fn equilibrium_constants(free_energy: &[f64; FORMS], gas_constant: f64, temperature: f64) -> [f64; 4] {
    let rt = -gas_constant * temperature;
    let g = free_energy;
    let mut k = [0.0; 4];
    k[0] = ((WATER_FORMATION_ENERGY + g[0] - g[1]) / rt).exp();
    for j in 1..4 {
        let offset = if g[j + 1] > IRREVERSIBLE_THRESHOLD {
            j as f64 * 10001.0
        } else {
            0.0
        };
        k[j] = ((g[j + 1] + offset - g[j]) / rt).exp();
    }
    k
}

/// Denominator of the closed-form speciation at proton activity `h`.
pub fn speciation_denominator(k: &[f64; 4], h: f64) -> f64 {
    let h2 = h * h;
    let h3 = h2 * h;
    (1.0 + k[0]) * h3 + k[1] * h2 + k[1] * k[2] * k[3] * h + k[1] * k[2] * k[3]
}

/// Activities of the five forms of a species with total concentration `total`.
///
/// Fails with [`ConfigError::ZeroSpeciationDenominator`] for a zero denominator.
pub fn activities(name: &str, total: f64, h: f64, k: &[f64; 4]) -> Result<[f64; FORMS]> {
    let denom = speciation_denominator(k, h);
    if denom == 0.0 {
        return Err(ConfigError::ZeroSpeciationDenominator {
            species: name.to_string(),
        }
        .into());
    }
    let h2 = h * h;
    let h3 = h2 * h;
    Ok([
        k[0] * total * h3 / denom,
        total * h3 / denom,
        total * h2 * k[1] / denom,
        total * h * k[1] * k[2] / denom,
        total * k[1] * k[2] * k[3] / denom,
    ])
}

/// Built-in speciation used when no pH solver is configured: every cell sits
/// at the same fixed pH.
#[derive(Debug, Clone, Copy)]
pub struct FixedPhSpeciation {
    ph: f64,
}

impl FixedPhSpeciation {
    pub fn new(ph: f64) -> Self {
        Self { ph }
    }

    pub fn proton_activity(&self) -> f64 {
        10f64.powf(-self.ph)
    }
}

impl Speciation for FixedPhSpeciation {
    fn solve(&mut self, state: &mut KineticsState) -> Result<()> {
        let h = self.proton_activity();
        let cells = state.grid().cell_count();
        state.proton_activity_mut().fill(h);

        let indices: Vec<usize> = state.species().indices().collect();
        for i in indices {
            let k = state.keq(i);
            let name = state.species().name(i).to_string();
            let is_proton = state.species().kind(i) == SpeciesKind::Proton;
            for cell in 0..cells {
                let total = state.concentration()[[i, cell]];
                let mut a = activities(&name, total, h, &k)?;
                if is_proton {
                    a[1] = h;
                }
                let activity = state.activity_mut();
                for (form, v) in a.into_iter().enumerate() {
                    activity[[i, form, cell]] = v;
                }
            }
        }
        Ok(())
    }
}
