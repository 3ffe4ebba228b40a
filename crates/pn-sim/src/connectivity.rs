//! Phase continuity and trapping.

use pn_network::{ClusterSlot, Element, Network, Phase, cluster_elements};

/// Bulk phase with tracer-labelled water counted as water.
pub(crate) fn bulk_phase(element: &Element) -> Phase {
    match element.state.phase {
        Phase::Tracer => Phase::Water,
        p => p,
    }
}

/// Slot holding `phase` continuity through bulk and corner films.
pub(crate) fn continuity_slot(phase: Phase) -> ClusterSlot {
    match phase {
        Phase::Oil => ClusterSlot::OilFilm,
        _ => ClusterSlot::WaterFilm,
    }
}

/// Cluster elements that carry `phase` in the bulk or in their corners.
pub fn cluster_phase_continuity(network: &mut Network, phase: Phase) -> usize {
    cluster_elements(network, continuity_slot(phase), |e| {
        bulk_phase(e) == phase || e.state.film_volume(phase) > 0.0
    })
}

/// Whether `element` belongs to a `phase` continuity cluster touching the inlet.
pub(crate) fn reaches_inlet(network: &Network, element: &Element, phase: Phase) -> bool {
    network
        .cluster_of(element.abs_id, continuity_slot(phase))
        .is_some_and(|c| c.inlet)
}

/// Recluster `phase` and flag the bulk elements that cannot reach the outlet
/// as trapped. Returns the number of trapped elements.
pub fn update_trapping(network: &mut Network, phase: Phase) -> usize {
    cluster_phase_continuity(network, phase);
    let slot = continuity_slot(phase);
    let flags: Vec<bool> = network
        .elements()
        .iter()
        .map(|e| {
            e.is_open()
                && bulk_phase(e) == phase
                && !network.cluster_of(e.abs_id, slot).is_some_and(|c| c.outlet)
        })
        .collect();

    let mut trapped = 0;
    for (element, flag) in network.elements_mut().iter_mut().zip(flags) {
        if element.is_open() {
            element.state.set_trapped(phase, flag);
            trapped += usize::from(flag);
        }
    }
    trapped
}

/// Forget every trapped flag of `phase`.
pub(crate) fn release_trapped(network: &mut Network, phase: Phase) {
    for element in network.elements_mut().iter_mut().filter(|e| e.is_open()) {
        element.state.set_trapped(phase, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_network::RegularLattice;
    use pn_network::element::CIRCLE_SHAPE_FACTOR;

    #[test]
    fn isolated_water_is_trapped() {
        let mut net = RegularLattice::new([3, 1, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
            .build()
            .unwrap();
        // Oil everywhere except the middle node.
        for e in net.elements_mut() {
            e.fill(Phase::Oil);
        }
        net.elements_mut()[1].fill(Phase::Water);

        let trapped = update_trapping(&mut net, Phase::Water);
        assert_eq!(trapped, 1);
        assert!(net.elements()[1].state.water_trapped);

        net.elements_mut()[1].fill(Phase::Oil);
        assert_eq!(update_trapping(&mut net, Phase::Water), 0);
        assert!(!net.elements()[1].state.water_trapped);
    }

    #[test]
    fn films_keep_water_connected() {
        let mut net = RegularLattice::new([3, 1, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
            .build()
            .unwrap();
        for e in net.elements_mut() {
            e.fill(Phase::Oil);
            e.state.water_film_volume = 1e-18;
        }
        net.elements_mut()[1].fill(Phase::Water);
        assert_eq!(update_trapping(&mut net, Phase::Water), 0);
    }
}
