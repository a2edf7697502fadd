//! Property-based tests for engine invariants using the `proptest` crate.

use proptest::prelude::*;

use signcalc_core::engine::{DesignEngine, DesignRequest, FoundationRequest, PoleInput, SiteInput};
use signcalc_core::envelope::ABSTAIN_CONFIDENCE;
use signcalc_core::foundation::{solve_depth, DepthInput, DepthOutcome, DepthSettings};
use signcalc_core::loads::wind::velocity_pressure_psf;
use signcalc_core::loads::{Cabinet, ExposureCategory};
use signcalc_core::optimize::pareto::dominates;
use signcalc_core::optimize::Objective;
use signcalc_core::section_filter::{filter_sections, SectionQuery, StrengthRequirement};
use signcalc_core::standards::constants::ConstantsTable;
use signcalc_core::standards::StandardsSnapshot;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_exposure() -> impl Strategy<Value = ExposureCategory> {
    prop_oneof![
        Just(ExposureCategory::B),
        Just(ExposureCategory::C),
        Just(ExposureCategory::D),
    ]
}

fn arb_depth_input() -> impl Strategy<Value = DepthInput> {
    (5.0f64..150.0, 6.0f64..30.0, 1.5f64..5.0, 1000.0f64..5000.0, 1.0f64..2.0).prop_map(
        |(moment_kipft, load_arm_ft, diameter_ft, soil_bearing_psf, safety_factor)| DepthInput {
            moment_kipft,
            load_arm_ft,
            diameter_ft,
            soil_bearing_psf,
            safety_factor,
        },
    )
}

fn depth(input: &DepthInput) -> Option<f64> {
    match solve_depth(input, &ConstantsTable::builtin(), &DepthSettings::default()).unwrap() {
        DepthOutcome::Solved(s) => Some(s.depth_ft),
        DepthOutcome::ExceedsMaximum { .. } => None,
        DepthOutcome::NonConverged { .. } => panic!("default settings should converge"),
    }
}

// ---------------------------------------------------------------------------
// 1. Velocity pressure grows with wind speed and height
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn velocity_pressure_monotone(
        exposure in arb_exposure(),
        v in 60.0f64..190.0,
        dv in 0.0f64..10.0,
        z in 1.0f64..90.0,
        dz in 0.0f64..10.0,
    ) {
        let c = ConstantsTable::builtin();
        let base = velocity_pressure_psf(v, exposure, z, &c).unwrap();
        prop_assert!(velocity_pressure_psf(v + dv, exposure, z, &c).unwrap() >= base);
        prop_assert!(velocity_pressure_psf(v, exposure, z + dz, &c).unwrap() >= base);
    }
}

// ---------------------------------------------------------------------------
// 2. Embedment depth: wider footing never needs more depth, more moment
//    never needs less
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn depth_monotone_in_diameter(input in arb_depth_input(), extra in 0.0f64..2.0) {
        let wider = DepthInput { diameter_ft: input.diameter_ft + extra, ..input.clone() };
        if let Some(d) = depth(&input) {
            let dw = depth(&wider).expect("wider footing cannot exceed the maximum");
            prop_assert!(dw <= d, "d({})={} < d({})={}", wider.diameter_ft, dw, input.diameter_ft, d);
        }
    }

    #[test]
    fn depth_monotone_in_moment(input in arb_depth_input(), extra in 0.0f64..50.0) {
        let heavier = DepthInput { moment_kipft: input.moment_kipft + extra, ..input.clone() };
        if let Some(dh) = depth(&heavier) {
            let d = depth(&input).expect("lighter moment cannot exceed the maximum");
            prop_assert!(d <= dh);
        }
    }

    #[test]
    fn depth_is_on_grid_and_within_bounds(input in arb_depth_input()) {
        if let Some(d) = depth(&input) {
            prop_assert!((2.0..=15.0).contains(&d));
            let steps = (d - 2.0) / 0.01;
            prop_assert!((steps - steps.round()).abs() < 1e-6 || d == 15.0);
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Section filter: every candidate passes, order is by weight, and a
//    larger demand never adds sections
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn filter_candidates_pass_and_shrink(sx in 1.0f64..80.0, extra in 0.0f64..20.0) {
        let snap = StandardsSnapshot::builtin().unwrap();
        let q = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: sx });
        let r = filter_sections(&q, &snap.catalog, &snap.constants).unwrap();
        prop_assert!(r.candidates.iter().all(|c| c.section.sx_in3 >= sx));
        prop_assert!(r.candidates.windows(2).all(|w| w[0].section.weight_plf <= w[1].section.weight_plf));

        let q2 = SectionQuery::new(StrengthRequirement::SectionModulus { sx_in3: sx + extra });
        let r2 = filter_sections(&q2, &snap.catalog, &snap.constants).unwrap();
        prop_assert!(r2.candidates.len() <= r.candidates.len());
        for c in &r2.candidates {
            prop_assert!(r.candidates.iter().any(|o| o.section.designation == c.section.designation));
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Dominance is irreflexive and asymmetric
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn dominance_asymmetric(
        a in prop::collection::vec(-100.0f64..100.0, 3),
        b in prop::collection::vec(-100.0f64..100.0, 3),
    ) {
        let objs = vec![
            Objective::minimize("cost"),
            Objective::minimize("weight"),
            Objective::maximize("margin"),
        ];
        prop_assert!(!dominates(&a, &a, &objs));
        prop_assert!(!(dominates(&a, &b, &objs) && dominates(&b, &a, &objs)));
    }
}

// ---------------------------------------------------------------------------
// 5. Envelope confidence stays in [0, 1] and is zero for any non-feasible
//    outcome; missing data is always explained; equal requests hash equal
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn envelope_confidence_policy(
        speed in 60.0f64..180.0,
        width in 2.0f64..30.0,
        height in 2.0f64..15.0,
        clearance in 0.0f64..25.0,
        risk in prop::option::of(Just("II".to_string())),
        soil in prop::option::of(1500.0f64..4000.0),
    ) {
        let engine = DesignEngine::builtin().unwrap();
        let request = DesignRequest {
            label: "prop".to_string(),
            site: SiteInput {
                wind_speed_mph: Some(speed),
                exposure: Some("C".to_string()),
                risk_category: risk,
                soil_bearing_psf: soil,
            },
            clearance_ft: Some(clearance),
            cabinets: vec![Cabinet { width_ft: width, height_ft: height, weight_psf: 8.0 }],
            pole: PoleInput::default(),
            foundation: FoundationRequest::default(),
        };
        let env = engine.solve(&request);
        prop_assert!((0.0..=1.0).contains(&env.confidence));
        if !env.is_feasible() {
            prop_assert_eq!(env.confidence, ABSTAIN_CONFIDENCE);
        }
        if soil.is_none() {
            prop_assert_eq!(env.outcome.status(), "abstain");
            prop_assert!(env.assumptions.iter().any(|a| a.contains("site.soil_bearing_psf")));
        }
        prop_assert_eq!(env.content_hash().unwrap(), engine.solve(&request).content_hash().unwrap());
    }
}
