// SPDX-License-Identifier: AGPL-3.0-or-later
//! Self-check of the analysis invariants on synthetic data.
//!
//! # Sections
//!
//! 1. **Interaction additivity**: Φ summed over all pairs plus the
//!    expected value equals the prediction; row sums equal plain SHAP
//! 2. **Attribution tables**: importance covers every block pair, effect
//!    pairs never combine two columns of one exclusive block
//! 3. **Risk classes**: documented thresholds, monotone over a grid
//! 4. **Geodesic area**: 1° equatorial cell, shrinking toward the poles
//! 5. **Sampling**: split R̂ of independent chains, recovery of known
//!    port-visit parameters by HMC
//!
//! Exit code 0 when every check passes, 1 otherwise.

use anyhow::Context;
use portrisk::bayes::{self, diagnostics, PortVisitModel, SamplerConfig, Trace};
use portrisk::model::{BoostParams, GradientBooster};
use portrisk::shap::attribution::{feature_combinations, pairs_with_replacement};
use portrisk::shap::tree_shap::{tree_shap, Condition};
use portrisk::shap::{effect_table, importance_table, interaction_values};
use portrisk::spatial::area::bin_area_km2;
use portrisk::tolerances;
use portrisk::trips::fishing::PREDICTORS;
use portrisk::trips::{DesignMatrix, OneHotEncoder, RiskThresholds};
use portrisk::validation::Validator;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

const FLAGS: [&str; 4] = ["china", "group1", "group2", "other"];
const GEAR: [&str; 3] = ["trawlers", "squid_jigger", "drifting_longlines"];
const TAS: [&str; 2] = ["short", "long"];

/// Trips with a planted flag×gear interaction.
fn synthetic_trips(n: usize, seed: u64) -> anyhow::Result<(DesignMatrix, Vec<f64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.1)?;
    let mut rows = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let flag = FLAGS[rng.gen_range(0..FLAGS.len())];
        let gear = GEAR[rng.gen_range(0..GEAR.len())];
        let tas = TAS[rng.gen_range(0..TAS.len())];
        let mut score = -0.5;
        if flag == "china" && gear == "squid_jigger" {
            score += 2.5;
        }
        if tas == "long" {
            score += 0.8;
        }
        y.push(score + noise.sample(&mut rng));
        rows.push(vec![flag, gear, tas]);
    }
    let encoder = OneHotEncoder::fit(&PREDICTORS, &rows)?;
    Ok((encoder.transform(&rows)?, y))
}

/// Simulated port-visit data and its generating parameters.
struct SimulatedVisits {
    model: PortVisitModel,
    beta: [f64; 4],
    sigma: f64,
}

fn simulated_visits(n_ports: usize, seed: u64) -> anyhow::Result<SimulatedVisits> {
    let beta = [-1.0, 0.3, -0.2, 0.4];
    let (sigma_z, sigma) = (0.5, 0.3);
    let mut rng = StdRng::seed_from_u64(seed);
    let std = Normal::new(0.0, 1.0)?;
    let mut x = Vec::with_capacity(2 * n_ports);
    let mut port = Vec::with_capacity(2 * n_ports);
    let mut y = Vec::with_capacity(2 * n_ports);
    for p in 0..n_ports {
        let gamma = sigma_z * std.sample(&mut rng);
        let psma = if p % 2 == 0 { 1.0 } else { 0.0 };
        for after in [0.0, 1.0] {
            let row = [1.0, psma, after, psma * after];
            let mu: f64 = row.iter().zip(&beta).map(|(a, b)| a * b).sum::<f64>() + gamma;
            x.push(row);
            port.push(p);
            y.push((mu + sigma * std.sample(&mut rng)).exp());
        }
    }
    Ok(SimulatedVisits {
        model: PortVisitModel::new(x, port, n_ports, &y)?,
        beta,
        sigma,
    })
}

fn validate_additivity(v: &mut Validator, model: &GradientBooster, design: &DesignMatrix) -> anyhow::Result<()> {
    v.section("═══ Interaction additivity ═══");
    let phi = interaction_values(model, design.rows())?;
    let mut worst_total = 0.0_f64;
    let mut worst_rows = 0.0_f64;
    for (i, x) in design.rows().iter().enumerate() {
        worst_total = worst_total.max((phi.reconstructed_prediction(i) - model.predict(x)).abs());
        let mut plain = vec![0.0; design.n_cols()];
        for tree in model.trees() {
            tree_shap(tree, x, &mut plain, Condition::None);
        }
        for (a, b) in phi.shap_values(i).iter().zip(&plain) {
            worst_rows = worst_rows.max((a - b).abs());
        }
    }
    v.check_at_most("max |ΣΦ + E[f] − f(x)|", worst_total, tolerances::SHAP_ADDITIVITY);
    v.check_at_most("max |row sum − plain SHAP|", worst_rows, tolerances::SHAP_ADDITIVITY);
    Ok(())
}

fn validate_tables(v: &mut Validator, model: &GradientBooster, design: &DesignMatrix) -> anyhow::Result<()> {
    v.section("═══ Attribution tables ═══");
    let phi = interaction_values(model, design.rows())?;
    let importance = importance_table(&phi, design)?;
    v.check_count(
        "importance rows = block pairs",
        importance.len(),
        pairs_with_replacement(design.blocks().len()).len(),
    );
    let strongest_cross = importance
        .iter()
        .filter(|r| r.block_a != r.block_b)
        .filter_map(|r| r.summary.as_ref().map(|s| (r, s.mean)))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    v.check_bool(
        "planted flag×gear interaction is the strongest cross pair",
        strongest_cross.is_some_and(|(r, _)| r.block_a == "flag" && r.block_b == "gear"),
    );

    let exclusive_pair = feature_combinations(design).into_iter().any(|(a, b)| {
        a != b
            && design
                .blocks()
                .iter()
                .any(|blk| blk.exclusive && blk.contains(a) && blk.contains(b))
    });
    v.check_bool("no exclusive pair in effect combinations", !exclusive_pair);

    let base = portrisk::stats::mean(&model.predict_batch(design.rows()));
    let effect = effect_table(&phi, design, base)?;
    v.check_bool(
        "effect cells with n < 2 are missing",
        effect.iter().all(|r| r.n >= 2 || r.summary.is_none()),
    );
    Ok(())
}

fn validate_classes(v: &mut Validator) -> anyhow::Result<()> {
    v.section("═══ Risk classes ═══");
    let t = RiskThresholds::default();
    let got: Vec<u8> = [-1.0, 0.0, 1.9, 2.0, 5.0]
        .iter()
        .map(|&s| t.classify(s))
        .collect::<portrisk::Result<_>>()?;
    v.check_bool("{-1, 0, 1.9, 2, 5} → {0, 1, 1, 2, 2}", got == [0, 1, 1, 2, 2]);
    let grid: Vec<u8> = (-400..=400)
        .map(|k| t.classify(f64::from(k) / 100.0))
        .collect::<portrisk::Result<_>>()?;
    v.check_bool("monotone over [-4, 4]", grid.windows(2).all(|w| w[0] <= w[1]));
    Ok(())
}

fn validate_area(v: &mut Validator) {
    v.section("═══ Geodesic area ═══");
    v.check(
        "1° cell at the equator (km²)",
        bin_area_km2(0.0, 1.0),
        tolerances::EQUATORIAL_CELL_KM2,
        tolerances::AREA_KM2,
    );
    let shrinking = [0.0, 30.0, 60.0, 89.0]
        .windows(2)
        .all(|w| bin_area_km2(w[1], 1.0) < bin_area_km2(w[0], 1.0));
    v.check_bool("area shrinks toward the pole", shrinking);
    v.check(
        "hemispheres symmetric",
        bin_area_km2(-46.0, 1.0),
        bin_area_km2(45.0, 1.0),
        tolerances::AREA_KM2,
    );
}

fn validate_sampling(v: &mut Validator) -> anyhow::Result<()> {
    v.section("═══ Sampling ═══");
    let mut rng = StdRng::seed_from_u64(11);
    let std = Normal::new(0.0, 1.0)?;
    let chains: Vec<Vec<f64>> = (0..4)
        .map(|_| (0..1000).map(|_| std.sample(&mut rng)).collect())
        .collect();
    let r_hat = diagnostics::split_r_hat(&chains).context("split R̂ of independent chains")?;
    v.check_at_most("split R̂ of independent normal chains", r_hat, tolerances::R_HAT_MAX);

    let sim = simulated_visits(40, 5)?;
    let config = SamplerConfig {
        draws: 1000,
        tune: 1000,
        seed: 3,
        ..SamplerConfig::default()
    };
    let chains = bayes::sample(&sim.model, &sim.model.initial_point(), &config)?;
    let trace = Trace::from_chains(&sim.model, &chains)?;
    let summary = diagnostics::summarize(&trace);
    let max_r_hat = diagnostics::max_r_hat(&summary).context("posterior R̂")?;
    v.check_at_most("max split R̂ of the posterior", max_r_hat, tolerances::R_HAT_MAX);

    let truths = sim
        .beta
        .iter()
        .enumerate()
        .map(|(k, &b)| (format!("beta_X[{k}]"), b))
        .chain(std::iter::once(("sigma".to_string(), sim.sigma)));
    for (name, truth) in truths {
        let row = summary
            .iter()
            .find(|r| r.parameter == name)
            .with_context(|| format!("{name} missing from summary"))?;
        let (Some(mean), Some(sd)) = (row.mean, row.sd) else {
            anyhow::bail!("{name} has no posterior summary");
        };
        v.check_at_most(
            &format!("|{name} − {truth}| in posterior sds"),
            (mean - truth).abs() / sd,
            tolerances::POSTERIOR_MEAN_SDS,
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    portrisk::logging::init();
    let mut v = Validator::new("portrisk: attribution, classes, area and sampling");

    let (design, y) = synthetic_trips(400, 42)?;
    let params = BoostParams {
        n_trees: 60,
        ..BoostParams::fishing()
    };
    let model = GradientBooster::fit(design.rows(), &y, &params)?;

    validate_additivity(&mut v, &model, &design)?;
    validate_tables(&mut v, &model, &design)?;
    validate_classes(&mut v)?;
    validate_area(&mut v);
    validate_sampling(&mut v)?;
    v.finish()
}
