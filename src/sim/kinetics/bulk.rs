use anyhow::Result;

use crate::sim::kinetics::comm::Communicator;
use crate::sim::kinetics::config::BulkReactor;
use crate::sim::kinetics::error::ConfigError;
use crate::sim::kinetics::state::KineticsState;

/// One explicit Euler step of a well-mixed reservoir.
///
/// `inflow` is the concentration entering with the feed, `total_rate` the
/// summed net reaction rate over all interior cells of the domain.
pub fn reservoir_step(
    reactor: &BulkReactor,
    bulk: f64,
    inflow: f64,
    total_rate: f64,
    cell_volume: f64,
    cross_section: f64,
    interval: f64,
) -> Result<f64> {
    if reactor.reactor_volume <= 0.0 {
        return Err(ConfigError::NonPositiveReactorVolume(reactor.reactor_volume).into());
    }
    anyhow::ensure!(cross_section > 0.0, "cross-section area must be positive, got {cross_section}");
    let v = reactor.reactor_volume;
    let exchange = (reactor.flow_rate / v) * (inflow - bulk);
    let reaction = (reactor.exchange_area / (v * cross_section)) * total_rate * cell_volume;
    Ok(bulk + (exchange + reaction) * interval)
}

/// Updates the reservoir value of every species not listed in `exempt`.
///
/// Reaction rates are summed over the interior of all workers, so every
/// worker arrives at the same reservoir values.
pub fn update_reservoirs(
    reactor: &BulkReactor,
    exempt: &[String],
    state: &mut KineticsState,
    comm: &mut dyn Communicator,
    interval: f64,
) -> Result<()> {
    let species: Vec<usize> = state
        .species()
        .iter()
        .filter(|(_, s)| !exempt.iter().any(|e| *e == s.name))
        .map(|(i, _)| i)
        .collect();
    if species.is_empty() {
        return Ok(());
    }

    let rates = state.reaction_rate();
    let mut sums: Vec<f64> = species
        .iter()
        .map(|&i| state.grid().interior_cells().map(|c| rates[[i, c]]).sum())
        .collect();
    comm.all_sum(&mut sums)?;

    let cell_volume = state.grid().cell_volume();
    let cross_section = state.grid().domain().cross_section_area();
    for (&i, total_rate) in species.iter().zip(sums) {
        let inflow = state.faces(i).zhi;
        let bulk = reservoir_step(
            reactor,
            state.bulk(i),
            inflow,
            total_rate,
            cell_volume,
            cross_section,
            interval,
        )?;
        log::debug!("bulk {}: {} -> {}", state.species().name(i), state.bulk(i), bulk);
        state.set_bulk(i, bulk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::bounds::Bounds;
    use crate::sim::kinetics::comm::SingleWorker;
    use crate::sim::kinetics::config::Unit;
    use crate::sim::kinetics::grid::{Decomposition, GridPartition};
    use crate::sim::kinetics::species::{FaceValues, Species, SpeciesTable};

    fn reactor() -> BulkReactor {
        BulkReactor {
            flow_rate: 2.0,
            reactor_volume: 4.0,
            exchange_area: 1.0,
        }
    }

    #[test]
    fn test_reservoir_step() -> Result<()> {
        // (2/4)*(1 - 0.5) + (1/(4*2))*(-4)*0.5 = 0.25 - 0.25
        let b = reservoir_step(&reactor(), 0.5, 1.0, -4.0, 0.5, 2.0, 10.0)?;
        assert!((b - 0.5).abs() < 1e-15);
        let b = reservoir_step(&reactor(), 0.5, 1.0, 0.0, 0.5, 2.0, 2.0)?;
        assert!((b - 1.0).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_non_positive_volume_is_fatal() {
        let r = BulkReactor {
            reactor_volume: 0.0,
            ..reactor()
        };
        let err = reservoir_step(&r, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::NonPositiveReactorVolume(0.0))
        );
    }

    #[test]
    fn test_exempt_species_keep_their_reservoir() -> Result<()> {
        let d = Decomposition::single(Bounds::from_extent(1., 1., 2.), [1, 1, 2]);
        let grid = GridPartition::new(&d, 0)?;
        let table = SpeciesTable::new(vec![
            Species::new("o2", 1.0).with_uniform(1.0),
            Species::new("nh4", 1.0).with_faces(FaceValues::uniform(2.0)),
        ]);
        let mut state = KineticsState::new(table, grid, Unit::Molar, vec![])?;
        state.set_bulk(2, 1.0);
        let cell = state.grid().index(1, 1, 1);
        state.add_reaction_rate(2, cell, -1.0);
        state.add_reaction_rate(1, cell, -1.0);

        update_reservoirs(&reactor(), &["o2".to_string()], &mut state, &mut SingleWorker, 1.0)?;
        assert_eq!(state.bulk(1), 1.0);
        // (2/4)*(2 - 1) + (1/(4*1))*(-1)*1 = 0.25
        assert!((state.bulk(2) - 1.25).abs() < 1e-15);
        Ok(())
    }
}
