//! Integration tests for pn-network.

use std::collections::VecDeque;

use pn_network::element::CIRCLE_SHAPE_FACTOR;
use pn_network::{ClusterSlot, Network, Phase, RegularLattice, cluster_elements};
use proptest::prelude::*;

fn lattice(nx: usize, ny: usize) -> Network {
    RegularLattice::new([nx, ny, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
        .build()
        .unwrap()
}

/// Breadth-first reachability through oil elements, used as a reference.
fn oil_reachable(net: &Network, from: usize) -> Vec<bool> {
    let mut seen = vec![false; net.element_count()];
    let mut queue = VecDeque::from([from]);
    seen[from] = true;
    while let Some(i) = queue.pop_front() {
        for nb in net.elements()[i].neighbors() {
            let j = nb.idx();
            if !seen[j] && net.elements()[j].state.phase == Phase::Oil {
                seen[j] = true;
                queue.push_back(j);
            }
        }
    }
    seen
}

#[test]
fn single_phase_lattice_spans() {
    let mut net = lattice(4, 3);
    let count = cluster_elements(&mut net, ClusterSlot::Active, |e| e.is_open());
    assert_eq!(count, 1);
    let cluster = &net.registry(ClusterSlot::Active).clusters()[0];
    assert!(cluster.spanning());
    assert_eq!(cluster.size, net.element_count());
    assert!((cluster.volume - net.total_volume()).abs() < 1e-9 * net.total_volume());
}

#[test]
fn closing_a_layer_disconnects_outlet() {
    let mut net = lattice(3, 2);
    // Close the x-direction pores leaving the first layer of nodes.
    let cut: Vec<_> = net
        .pores()
        .iter()
        .filter(|p| {
            let (a, b) = net.pore_endpoints(p);
            match (a, b) {
                (Some(a), Some(b)) => {
                    let ia = net.element(a).unwrap().as_node().unwrap().lattice_index.unwrap();
                    let ib = net.element(b).unwrap().as_node().unwrap().lattice_index.unwrap();
                    ia[0] == 0 && ib[0] == 1
                }
                _ => false,
            }
        })
        .map(|p| p.abs_id)
        .collect();
    assert_eq!(cut.len(), 2);
    for id in cut {
        net.close_element(id).unwrap();
    }

    cluster_elements(&mut net, ClusterSlot::Active, |_| true);
    let registry = net.registry(ClusterSlot::Active);
    assert_eq!(registry.len(), 2);
    assert!(registry.clusters().iter().any(|c| c.inlet && !c.outlet));
    assert!(registry.clusters().iter().any(|c| !c.inlet && c.outlet));
    assert!(net.check_closed_invariant().is_ok());
}

proptest! {
    #[test]
    fn clusters_match_reachability(mask in prop::collection::vec(any::<bool>(), 5 * 4 + 40)) {
        let mut net = lattice(5, 4);
        for (element, oil) in net.elements_mut().iter_mut().zip(mask.iter().cycle()) {
            element.fill(if *oil { Phase::Oil } else { Phase::Water });
        }

        cluster_elements(&mut net, ClusterSlot::Oil, |e| e.state.phase == Phase::Oil);

        for start in 0..net.element_count() {
            let element = &net.elements()[start];
            if element.state.phase != Phase::Oil {
                prop_assert!(element.cluster(ClusterSlot::Oil).is_none());
                continue;
            }
            let reach = oil_reachable(&net, start);
            let cluster = element.cluster(ClusterSlot::Oil);
            for (j, other) in net.elements().iter().enumerate() {
                if other.state.phase == Phase::Oil {
                    prop_assert_eq!(reach[j], other.cluster(ClusterSlot::Oil) == cluster);
                }
            }
        }
    }

    #[test]
    fn reclustering_is_idempotent(mask in prop::collection::vec(any::<bool>(), 1..64)) {
        let mut net = lattice(4, 4);
        for (element, oil) in net.elements_mut().iter_mut().zip(mask.iter().cycle()) {
            element.fill(if *oil { Phase::Oil } else { Phase::Water });
        }

        cluster_elements(&mut net, ClusterSlot::Water, |e| e.state.phase == Phase::Water);
        let first = net.registry(ClusterSlot::Water).clone();
        let refs: Vec<_> = net.elements().iter().map(|e| e.cluster(ClusterSlot::Water)).collect();

        cluster_elements(&mut net, ClusterSlot::Water, |e| e.state.phase == Phase::Water);
        prop_assert_eq!(&first, net.registry(ClusterSlot::Water));
        let again: Vec<_> = net.elements().iter().map(|e| e.cluster(ClusterSlot::Water)).collect();
        prop_assert_eq!(refs, again);
    }
}
