// SPDX-License-Identifier: AGPL-3.0-or-later
//! Property tests for risk classes, interaction additivity and effect
//! combinations.

#![allow(clippy::unwrap_used)]

use portrisk::model::{BoostParams, GradientBooster};
use portrisk::shap::attribution::{block_pair_contributions, feature_combinations};
use portrisk::shap::interaction_values;
use portrisk::spatial::bin_area_km2;
use portrisk::stats::{SdKind, Summary};
use portrisk::tolerances;
use portrisk::trips::fishing::PREDICTORS;
use portrisk::trips::{DesignMatrix, OneHotEncoder, RiskThresholds};
use proptest::prelude::*;

const FLAGS: [&str; 3] = ["china", "group1", "other"];
const GEAR: [&str; 3] = ["trawlers", "squid_jigger", "set_longlines"];
const TAS: [&str; 2] = ["short", "long"];

fn encode(picks: &[(usize, usize, usize)]) -> DesignMatrix {
    let rows: Vec<Vec<&str>> = picks.iter().map(|&(f, g, t)| vec![FLAGS[f], GEAR[g], TAS[t]]).collect();
    OneHotEncoder::fit(&PREDICTORS, &rows).unwrap().transform(&rows).unwrap()
}

fn trips() -> impl Strategy<Value = Vec<((usize, usize, usize), f64)>> {
    prop::collection::vec(((0..3usize, 0..3usize, 0..2usize), -3.0..3.0f64), 8..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn classes_are_monotone_and_total(a in -1e6..1e6f64, b in -1e6..1e6f64) {
        let t = RiskThresholds::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (ca, cb) = (t.classify(lo).unwrap(), t.classify(hi).unwrap());
        prop_assert!(ca <= cb);
        prop_assert!(cb <= 2);
    }

    #[test]
    fn interactions_sum_to_the_prediction(data in trips()) {
        let picks: Vec<_> = data.iter().map(|(p, _)| *p).collect();
        let y: Vec<f64> = data.iter().map(|(_, y)| *y).collect();
        let design = encode(&picks);
        let params = BoostParams { n_trees: 8, max_depth: 4, ..BoostParams::fishing() };
        let model = GradientBooster::fit(design.rows(), &y, &params).unwrap();
        let phi = interaction_values(&model, design.rows()).unwrap();
        let (_, contrib) = block_pair_contributions(&phi, &design);
        for (i, x) in design.rows().iter().enumerate() {
            let total: f64 = contrib.iter().map(|c| c[i]).sum::<f64>() + phi.expected_value();
            prop_assert!((total - model.predict(x)).abs() <= tolerances::SHAP_ADDITIVITY);
        }
    }

    #[test]
    fn exclusive_columns_never_pair(data in trips()) {
        let picks: Vec<_> = data.iter().map(|(p, _)| *p).collect();
        let design = encode(&picks);
        for (a, b) in feature_combinations(&design) {
            if a != b {
                prop_assert_ne!(design.block_of(a), design.block_of(b));
            }
        }
    }

    #[test]
    fn summary_needs_two_values(values in prop::collection::vec(-10.0..10.0f64, 0..6)) {
        let s = Summary::of(&values, SdKind::Sample, 0.0);
        prop_assert_eq!(s.is_some(), values.len() >= 2);
        if let Some(s) = s {
            prop_assert!(s.lower <= s.upper);
        }
    }

    #[test]
    fn bin_area_is_bounded_by_the_equator(lat in -90.0..89.0f64) {
        let area = bin_area_km2(lat.round(), 1.0);
        prop_assert!(area > 0.0);
        prop_assert!(area <= tolerances::EQUATORIAL_CELL_KM2 + tolerances::AREA_KM2);
    }
}
