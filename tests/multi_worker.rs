use anyhow::{Result, anyhow};
use biokinetics::io::{Setup, setup_from_str};
use biokinetics::sim::kinetics::comm::{Communicator, LocalCluster, SingleWorker};
use biokinetics::{KineticsOrchestrator, SolveReport};
use std::collections::BTreeMap;
use std::thread;

type Field = BTreeMap<[isize; 3], (f64, f64)>;

fn setup(parts: [usize; 3]) -> Result<Setup> {
    let json = format!(
        r#"{{
            "domain": {{
                "bounds": {{"lo": {{"x": 0, "y": 0, "z": 0}}, "hi": {{"x": 4, "y": 2, "z": 2}}}},
                "sub_domain": {{"lo": {{"x": 0, "y": 0, "z": 0}}, "hi": {{"x": 4, "y": 2, "z": 2}}}}
            }},
            "cells": [4, 2, 2],
            "parts": [{}, {}, {}],
            "species": [
                {{"name": "nh4", "diffusivity": 1.0, "initial": 0.3,
                  "faces": {{"xlo": 0.3, "xhi": 0.3, "ylo": 0.3, "yhi": 0.3, "zlo": 0.1, "zhi": 0.9}}}},
                {{"name": "no3", "diffusivity": 0.5, "initial": 0.7,
                  "faces": {{"xlo": 0.7, "xhi": 0.7, "ylo": 0.7, "yhi": 0.7, "zlo": 0.0, "zhi": 0.2}}}}
            ],
            "kinetics": {{"diffusion_dt": 0.1}},
            "diffusion": {{"boundaries": {{"x": "pp", "y": "nn", "z": "dd"}}, "tolerance": 1e-8}}
        }}"#,
        parts[0], parts[1], parts[2]
    );
    setup_from_str(&json)
}

/// Runs one solve on worker `rank` from a position-dependent initial field.
fn run(setup: &Setup, rank: usize, comm: Box<dyn Communicator>) -> Result<(SolveReport, Field)> {
    let mut o: KineticsOrchestrator = setup
        .orchestrator(rank, comm)?
        .ok_or_else(|| anyhow!("setup has no kinetics section"))?;

    let cells: Vec<(usize, [isize; 3])> = o
        .state()
        .grid()
        .interior_cells()
        .map(|c| (c, o.state().grid().global_coords(c)))
        .collect();
    for &(cell, [x, y, z]) in &cells {
        let c = o.state_mut().concentration_mut();
        c[[1, cell]] = 0.2 + 0.1 * x as f64 + 0.05 * y as f64;
        c[[2, cell]] = 1.0 - 0.2 * x as f64 + 0.1 * z as f64;
    }

    let report = o.solve(1.0)?;
    let c = o.state().concentration();
    let field = cells
        .into_iter()
        .map(|(cell, g)| (g, (c[[1, cell]], c[[2, cell]])))
        .collect();
    Ok((report, field))
}

#[test]
fn split_domain_matches_single_worker() -> Result<()> {
    let (single_report, single) = run(&setup([1, 1, 1])?, 0, Box::new(SingleWorker))?;

    let split = setup([2, 1, 1])?;
    let handles: Vec<_> = LocalCluster::new(2)
        .into_iter()
        .enumerate()
        .map(|(rank, worker)| {
            let split = split.clone();
            thread::spawn(move || run(&split, rank, Box::new(worker)))
        })
        .collect();

    let mut merged = Field::new();
    for h in handles {
        let (report, field) = h.join().map_err(|_| anyhow!("worker panicked"))??;
        assert_eq!(report, single_report);
        merged.extend(field);
    }

    assert_eq!(merged.len(), single.len());
    for (g, (a, b)) in &single {
        let (ma, mb) = merged[g];
        assert!((a - ma).abs() < 1e-12, "nh4 at {g:?}: {a} vs {ma}");
        assert!((b - mb).abs() < 1e-12, "no3 at {g:?}: {b} vs {mb}");
    }
    Ok(())
}
