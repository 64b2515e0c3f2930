use anyhow::Result;
use biokinetics::io::{load_setup, setup_from_str};
use biokinetics::sim::kinetics::comm::SingleWorker;
use biokinetics::{Convergence, KineticsOrchestrator};
use std::io::Write;

fn column_json(initial: f64, zlo: f64, zhi: f64, z: &str) -> String {
    format!(
        r#"{{
            "domain": {{
                "bounds": {{"lo": {{"x": 0, "y": 0, "z": 0}}, "hi": {{"x": 1, "y": 1, "z": 3}}}},
                "sub_domain": {{"lo": {{"x": 0, "y": 0, "z": 0}}, "hi": {{"x": 1, "y": 1, "z": 3}}}}
            }},
            "cells": [1, 1, 3],
            "species": [
                {{"name": "o2", "diffusivity": 1.0, "initial": {initial},
                  "faces": {{"xlo": {initial}, "xhi": {initial}, "ylo": {initial}, "yhi": {initial},
                            "zlo": {zlo}, "zhi": {zhi}}}}}
            ],
            "kinetics": {{"diffusion_dt": 0.1, "unit": "mol"}},
            "diffusion": {{"boundaries": {{"x": "nn", "y": "nn", "z": "{z}"}}, "tolerance": 1e-6}}
        }}"#
    )
}

fn orchestrator(json: &str) -> Result<KineticsOrchestrator> {
    let setup = setup_from_str(json)?;
    let o = setup.orchestrator(0, Box::new(SingleWorker))?;
    o.ok_or_else(|| anyhow::anyhow!("setup has no kinetics section"))
}

#[test]
fn dirichlet_column_reaches_linear_profile() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("column.json");
    let mut f = std::fs::File::create(&path)?;
    f.write_all(column_json(0.2, 0.0, 1.0, "dd").as_bytes())?;
    drop(f);

    let setup = load_setup(&path)?;
    let mut o = setup
        .orchestrator(0, Box::new(SingleWorker))?
        .ok_or_else(|| anyhow::anyhow!("setup has no kinetics section"))?;
    let report = o.solve(1.0)?;
    assert_eq!(report.convergence, Convergence::Converged);

    let g = o.state().grid();
    let c = o.state().concentration();
    assert!((c[[1, g.index(1, 1, 2)]] - 0.5).abs() < 1e-4);
    // Cell centres at 1/6, 1/2, 5/6 of the height.
    assert!((c[[1, g.index(1, 1, 1)]] - 1.0 / 6.0).abs() < 1e-3);
    assert!((c[[1, g.index(1, 1, 3)]] - 5.0 / 6.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn uniform_field_converges_at_once() -> Result<()> {
    let mut o = orchestrator(&column_json(0.4, 0.4, 0.4, "dd"))?;
    let report = o.solve(1.0)?;
    assert_eq!(report.iterations, 1);
    assert_eq!(report.convergence, Convergence::Converged);
    let row = o.state().concentration_row(1)?;
    let g = o.state().grid();
    for cell in g.interior_cells() {
        assert_eq!(row[cell], 0.4);
    }
    Ok(())
}

#[test]
fn bulk_top_boundary_tracks_the_reservoir() -> Result<()> {
    let mut o = orchestrator(&column_json(0.2, 0.0, 1.0, "db"))?;
    o.state_mut().set_bulk(1, 0.5);
    o.solve(1.0)?;
    // Zero flux at the bottom: the whole column relaxes to the reservoir value.
    let row = o.state().concentration_row(1)?;
    for cell in o.state().grid().interior_cells() {
        assert!((row[cell] - 0.5).abs() < 1e-3, "{}", row[cell]);
    }
    Ok(())
}
