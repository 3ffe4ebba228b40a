//! Displacement cycles on small networks.

use pn_capillary::{Ageing, WettabilityModel, apply_ageing, corner_area};
use pn_network::element::CIRCLE_SHAPE_FACTOR;
use pn_network::{Network, NetworkBuilder, NodeSpec, Phase, PoreSpec, RegularLattice};
use pn_sim::{
    ForcedWaterInjection, InterruptFlag, InvasionOptions, PrimaryDrainage, RelPermEvaluator, SecondaryDrainage,
    SimContext, SpontaneousImbibition, SpontaneousOilInvasion, StageEvent, Termination, run_displacement,
};
use proptest::prelude::*;

const TRIANGLE: f64 = 0.04;

/// Inlet node – pore – outlet node, all of the same radius.
fn two_node_network(shape_factor: f64) -> Network {
    let mut b = NetworkBuilder::new();
    let n1 = b.add_node(NodeSpec::new([5e-5, 5e-5, 5e-5], 1e-5, shape_factor));
    let n2 = b.add_node(NodeSpec::new([2e-4, 5e-5, 5e-5], 1e-5, shape_factor));
    b.add_pore(Some(n1), Some(n2), PoreSpec::new(1e-5, shape_factor));
    b.mark_node_inlet(n1);
    b.mark_node_outlet(n2);
    b.build().unwrap()
}

fn lattice(nx: usize, ny: usize, spread: f64) -> Network {
    RegularLattice::new([nx, ny, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
        .with_radius_spread(spread)
        .build()
        .unwrap()
}

fn drain(net: &mut Network, options: &InvasionOptions) -> pn_sim::StageOutcome {
    run_displacement(
        net,
        &PrimaryDrainage,
        &SimContext::default(),
        options,
        &InterruptFlag::new(),
        None,
    )
    .unwrap()
}

#[test]
fn two_node_drainage_takes_one_step_to_corner_water() {
    let mut net = two_node_network(TRIANGLE);
    let options = InvasionOptions {
        pressure_increment: 100.0,
        ..InvasionOptions::default()
    };
    let outcome = drain(&mut net, &options);

    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.invaded, 3);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert!(net.elements().iter().all(|e| e.state.phase == Phase::Oil));

    let geometry = net.pores()[0].geometry;
    let sigma = SimContext::default().fluids.interfacial_tension;
    let irreducible = corner_area(&geometry, 0.0, outcome.final_pc, sigma) / geometry.area();
    assert!(irreducible > 0.0);
    assert!((outcome.final_sw - irreducible).abs() < 1e-12);
    assert!((net.water_saturation() - irreducible).abs() < 1e-12);
}

#[test]
fn two_node_drainage_of_circles_leaves_no_water() {
    let mut net = two_node_network(CIRCLE_SHAPE_FACTOR);
    let outcome = drain(&mut net, &InvasionOptions::default());
    assert_eq!(outcome.steps, 1);
    assert_eq!(outcome.final_sw, 0.0);
}

#[test]
fn dead_end_water_is_trapped() {
    let mut b = NetworkBuilder::new();
    let n0 = b.add_node(NodeSpec::new([1e-4, 1e-4, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR));
    let n1 = b.add_node(NodeSpec::new([3e-4, 1e-4, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR));
    let n2 = b.add_node(NodeSpec::new([1e-4, 3e-4, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(None, Some(n0), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(Some(n0), Some(n1), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(Some(n1), None, PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    let side = b.add_pore(Some(n0), Some(n2), PoreSpec::new(4e-6, CIRCLE_SHAPE_FACTOR));
    b.set_extents([4e-4, 4e-4, 1e-4]);
    let mut net = b.build().unwrap();

    let outcome = drain(&mut net, &InvasionOptions::default());
    assert_eq!(outcome.termination, Termination::Exhausted);

    let side = net.pore_abs(side);
    for id in [side, n2] {
        let e = net.element(id).unwrap();
        assert_eq!(e.state.phase, Phase::Water);
        assert!(e.state.water_trapped);
    }
    let trapped = net.element(side).unwrap().geometry.volume + net.element(n2).unwrap().geometry.volume;
    assert!((outcome.final_sw - trapped / net.total_volume()).abs() < 1e-12);
}

#[test]
fn invasion_is_monotone_within_a_stage() {
    let mut net = lattice(5, 4, 0.4);
    let options = InvasionOptions {
        pressure_increment: 200.0,
        snapshot_sw_interval: 1e-12,
        ..InvasionOptions::default()
    };
    let mut snapshots = Vec::new();
    let mut sw = Vec::new();
    let mut sink = |event: StageEvent| match event {
        StageEvent::Snapshot(s) => snapshots.push(s),
        StageEvent::Curve(c) => sw.push(c.sw),
        _ => {}
    };
    run_displacement(
        &mut net,
        &PrimaryDrainage,
        &SimContext::default(),
        &options,
        &InterruptFlag::new(),
        Some(&mut sink),
    )
    .unwrap();

    assert!(snapshots.len() > 1);
    for pair in snapshots.windows(2) {
        for (before, after) in pair[0].elements.iter().zip(&pair[1].elements) {
            assert_eq!(before.id, after.id);
            if before.phase == "oil" {
                assert_eq!(after.phase, "oil", "element {} reverted", before.id);
            }
        }
    }
    assert!(sw.windows(2).all(|w| w[1] <= w[0] + 1e-15));
}

#[test]
fn imbibition_after_drainage_raises_saturation() {
    let mut net = lattice(4, 3, 0.3);
    let ctx = SimContext::default();
    let flag = InterruptFlag::new();
    let pd = drain(&mut net, &InvasionOptions::default());

    let si = run_displacement(
        &mut net,
        &SpontaneousImbibition,
        &ctx,
        &InvasionOptions::default(),
        &flag,
        None,
    )
    .unwrap();
    assert!(si.invaded > 0);
    assert!(si.final_sw > pd.final_sw);
    assert!(si.final_pc >= 0.0);
    assert!(net.check_closed_invariant().is_ok());
}

#[test]
fn oil_wet_elements_need_forced_injection() {
    let mut net = lattice(4, 3, 0.3);
    let ctx = SimContext::default();
    let flag = InterruptFlag::new();
    drain(&mut net, &InvasionOptions::default());
    apply_ageing(
        &mut net,
        &Ageing {
            model: WettabilityModel::OilWet,
            oil_wet_fraction: 1.0,
            oil_wet_contact_angle: 2.6,
        },
    );

    // Nothing is water-wet any more, so imbibition has nothing to do.
    let si = run_displacement(&mut net, &SpontaneousImbibition, &ctx, &InvasionOptions::default(), &flag, None)
        .unwrap();
    assert_eq!(si.invaded, 0);

    let fwi = run_displacement(&mut net, &ForcedWaterInjection, &ctx, &InvasionOptions::default(), &flag, None)
        .unwrap();
    assert!(fwi.invaded > 0);
    assert!(fwi.final_pc < 0.0);
    assert!(fwi.final_sw > si.final_sw);
}

#[test]
fn oil_reinvades_oil_wet_pores_below_zero_pc() {
    let mut net = lattice(4, 3, 0.3);
    let ctx = SimContext::default();
    let flag = InterruptFlag::new();
    drain(&mut net, &InvasionOptions::default());
    apply_ageing(
        &mut net,
        &Ageing {
            model: WettabilityModel::OilWet,
            oil_wet_fraction: 1.0,
            oil_wet_contact_angle: 2.6,
        },
    );
    let fwi = run_displacement(&mut net, &ForcedWaterInjection, &ctx, &InvasionOptions::default(), &flag, None)
        .unwrap();
    assert!(fwi.invaded > 0);

    let mut pcs = Vec::new();
    let mut sink = |event: StageEvent| {
        if let StageEvent::Curve(c) = event {
            pcs.push(c.pc);
        }
    };
    let soi = run_displacement(
        &mut net,
        &SpontaneousOilInvasion,
        &ctx,
        &InvasionOptions::default(),
        &flag,
        Some(&mut sink),
    )
    .unwrap();
    assert!(soi.invaded > 0);
    assert!(soi.final_sw < fwi.final_sw);
    assert!(soi.final_pc <= 0.0);
    assert!(!pcs.is_empty());
    assert!(pcs.iter().all(|pc| *pc <= 0.0));
    assert!(net.check_closed_invariant().is_ok());
}

#[test]
fn secondary_drainage_after_imbibition_lowers_saturation() {
    let mut net = lattice(4, 3, 0.3);
    let closed = net.pores()[3].abs_id;
    net.close_element(closed).unwrap();
    let ctx = SimContext::default();
    let flag = InterruptFlag::new();
    drain(&mut net, &InvasionOptions::default());
    let si = run_displacement(&mut net, &SpontaneousImbibition, &ctx, &InvasionOptions::default(), &flag, None)
        .unwrap();
    assert!(si.invaded > 0);

    let sd = run_displacement(&mut net, &SecondaryDrainage, &ctx, &InvasionOptions::default(), &flag, None)
        .unwrap();
    assert!(sd.invaded > 0);
    assert!(sd.final_sw < si.final_sw);
    assert!(sd.final_pc > 0.0);
    assert!(net.check_closed_invariant().is_ok());
}

#[test]
fn sweep_survives_an_increment_below_rounding() {
    // Two chains: one touches only the inlet, the other only the outlet,
    // so every remaining threshold sits behind the pressure.
    let mut b = NetworkBuilder::new();
    let nodes: Vec<_> = (0..4)
        .map(|i| b.add_node(NodeSpec::new([1e-4 + 2e-4 * i as f64, 1e-4, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR)))
        .collect();
    b.add_pore(None, Some(nodes[0]), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(Some(nodes[0]), Some(nodes[1]), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(Some(nodes[2]), Some(nodes[3]), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.add_pore(Some(nodes[3]), None, PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
    b.set_extents([8e-4, 2e-4, 1e-4]);
    let mut net = b.build().unwrap();

    let options = InvasionOptions {
        pressure_increment: 1e-13,
        ..InvasionOptions::default()
    };
    let outcome = drain(&mut net, &options);
    assert_eq!(outcome.termination, Termination::ExtremeReached);
    assert_eq!(outcome.final_pc, options.max_capillary_pressure);
    assert!(outcome.steps < 10);
    assert_eq!(outcome.invaded, 0);
    assert!(net.elements().iter().all(|e| e.state.phase == Phase::Water));
}

#[test]
fn long_front_fills_in_one_pass() {
    let mut net = lattice(30, 1, 0.0);
    let outcome = drain(&mut net, &InvasionOptions::default());
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.invaded, net.element_count());
    // One pass that fills the chain plus one that finds nothing.
    assert!(outcome.passes <= 2 * outcome.steps);
}

#[test]
fn target_saturation_stops_drainage() {
    let mut net = lattice(6, 4, 0.4);
    let options = InvasionOptions {
        pressure_increment: 100.0,
        target_saturation: Some(0.6),
        ..InvasionOptions::default()
    };
    let outcome = drain(&mut net, &options);
    assert_eq!(outcome.termination, Termination::TargetReached);
    assert!(outcome.final_sw <= 0.6);
    assert!(outcome.steps > 1);
}

#[test]
fn interrupted_stage_leaves_network_untouched() {
    let mut net = lattice(3, 3, 0.0);
    let flag = InterruptFlag::new();
    flag.request();
    let outcome = run_displacement(
        &mut net,
        &PrimaryDrainage,
        &SimContext::default(),
        &InvasionOptions::default(),
        &flag,
        None,
    )
    .unwrap();
    assert_eq!(outcome.termination, Termination::Interrupted);
    assert_eq!(outcome.steps, 0);
    assert!((net.water_saturation() - 1.0).abs() < 1e-12);
}

#[test]
fn relative_permeability_end_points() {
    let mut net = lattice(4, 3, 0.0);
    let ctx = SimContext::default();
    let eval = RelPermEvaluator::new(&mut net, &ctx).unwrap();
    let kr = eval.evaluate(&mut net, &ctx).unwrap();
    assert!((kr.krw - 1.0).abs() < 1e-9);
    assert_eq!(kr.kro, 0.0);

    let options = InvasionOptions {
        compute_relperm: true,
        ..InvasionOptions::default()
    };
    let mut samples = Vec::new();
    let mut sink = |event: StageEvent| {
        if let StageEvent::Curve(c) = event {
            samples.push(c);
        }
    };
    run_displacement(&mut net, &PrimaryDrainage, &ctx, &options, &InterruptFlag::new(), Some(&mut sink))
        .unwrap();
    let last = samples.last().unwrap();
    assert_eq!(last.krw, Some(0.0));
    assert!((last.kro.unwrap() - 1.0).abs() < 1e-9);
    assert!(samples.iter().all(|s| s.krw.is_some_and(|k| (0.0..=1.0 + 1e-9).contains(&k))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn closed_elements_stay_closed(mask in prop::collection::vec(prop::bool::weighted(0.15), 40)) {
        let mut net = lattice(4, 3, 0.2);
        let pores: Vec<_> = net.pores().iter().map(|p| p.abs_id).collect();
        let mut closed = Vec::new();
        for (id, close) in pores.into_iter().zip(mask) {
            if close {
                net.close_element(id).unwrap();
                closed.push(id);
            }
        }

        let ctx = SimContext::default();
        let flag = InterruptFlag::new();
        run_displacement(&mut net, &PrimaryDrainage, &ctx, &InvasionOptions::default(), &flag, None).unwrap();
        run_displacement(&mut net, &SpontaneousImbibition, &ctx, &InvasionOptions::default(), &flag, None).unwrap();

        prop_assert!(net.check_closed_invariant().is_ok());
        for id in closed {
            let e = net.element(id).unwrap();
            prop_assert_eq!(e.state.phase, Phase::Invalid);
            prop_assert!(!e.state.active);
        }
    }
}
