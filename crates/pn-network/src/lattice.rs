//! Regular cubic lattice generator.

use crate::builder::{NetworkBuilder, NodeSpec, PoreSpec};
use crate::error::NetworkResult;
use crate::network::Network;

/// Golden-ratio increment for the low-discrepancy radius sequence.
const GOLDEN_FRACTION: f64 = 0.618_033_988_749_894_9;

/// A regular `nx × ny × nz` lattice with flow along x.
///
/// Nodes sit at `((i+1)·a, (j+½)·a, (k+½)·a)` for spacing `a`; internal pores
/// join nearest neighbours along every axis, inlet pores connect the `i = 0`
/// layer to the x-min face and outlet pores the `i = nx-1` layer to the
/// x-max face.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularLattice {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Centre-to-centre node spacing (m)
    pub spacing: f64,
    pub node_radius: f64,
    pub pore_radius: f64,
    pub shape_factor: f64,
    /// Relative radius spread in `[0, 1)`; zero gives uniform radii.
    pub radius_spread: f64,
}

impl RegularLattice {
    pub fn new(n: [usize; 3], spacing: f64, node_radius: f64, pore_radius: f64, shape_factor: f64) -> Self {
        Self {
            nx: n[0],
            ny: n[1],
            nz: n[2],
            spacing,
            node_radius,
            pore_radius,
            shape_factor,
            radius_spread: 0.0,
        }
    }

    pub fn with_radius_spread(mut self, spread: f64) -> Self {
        self.radius_spread = spread;
        self
    }

    pub fn extents(&self) -> [f64; 3] {
        [
            (self.nx + 1) as f64 * self.spacing,
            self.ny as f64 * self.spacing,
            self.nz as f64 * self.spacing,
        ]
    }

    /// Deterministic radius for the `k`-th generated element.
    fn radius(&self, base: f64, k: usize) -> f64 {
        if self.radius_spread <= 0.0 {
            return base;
        }
        let u = (0.5 + k as f64 * GOLDEN_FRACTION).fract();
        base * (1.0 + self.radius_spread * (2.0 * u - 1.0))
    }

    /// Generate the network.
    pub fn build(&self) -> NetworkResult<Network> {
        let mut builder = NetworkBuilder::new();
        let a = self.spacing;
        let index = |i: usize, j: usize, k: usize| (k * self.ny + j) * self.nx + i;

        let mut nodes = Vec::with_capacity(self.nx * self.ny * self.nz);
        for k in 0..self.nz {
            for j in 0..self.ny {
                for i in 0..self.nx {
                    let position = [
                        (i + 1) as f64 * a,
                        (j as f64 + 0.5) * a,
                        (k as f64 + 0.5) * a,
                    ];
                    let radius = self.radius(self.node_radius, nodes.len());
                    let spec = NodeSpec::new(position, radius, self.shape_factor)
                        .with_lattice_index([i as u32, j as u32, k as u32]);
                    nodes.push(builder.add_node(spec));
                }
            }
        }

        let mut pores = 0usize;
        let pore = |pores: &mut usize| {
            let spec = PoreSpec::new(self.radius(self.pore_radius, *pores + 7), self.shape_factor);
            *pores += 1;
            spec
        };

        for k in 0..self.nz {
            for j in 0..self.ny {
                for i in 0..self.nx {
                    let here = nodes[index(i, j, k)];
                    if i == 0 {
                        builder.add_pore(None, Some(here), pore(&mut pores));
                    }
                    if i + 1 < self.nx {
                        builder.add_pore(Some(here), Some(nodes[index(i + 1, j, k)]), pore(&mut pores));
                    } else {
                        builder.add_pore(Some(here), None, pore(&mut pores));
                    }
                    if j + 1 < self.ny {
                        builder.add_pore(Some(here), Some(nodes[index(i, j + 1, k)]), pore(&mut pores));
                    }
                    if k + 1 < self.nz {
                        builder.add_pore(Some(here), Some(nodes[index(i, j, k + 1)]), pore(&mut pores));
                    }
                }
            }
        }

        builder.set_extents(self.extents());
        builder.set_2d(self.nz == 1);
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::CIRCLE_SHAPE_FACTOR;

    #[test]
    fn lattice_counts() {
        let lattice = RegularLattice::new([3, 3, 3], 1e-4, 1e-5, 1e-5, CIRCLE_SHAPE_FACTOR);
        let net = lattice.build().unwrap();

        assert_eq!(net.node_count(), 27);
        // 3 axes × 18 internal pores + 9 inlet + 9 outlet
        assert_eq!(net.pore_count(), 54 + 18);
        assert_eq!(net.inlet_elements().len(), 9);
        assert_eq!(net.outlet_elements().len(), 9);
        assert_eq!(net.max_coordination(), 6);
        assert!(!net.is_2d());
    }

    #[test]
    fn flat_lattice_is_2d() {
        let lattice = RegularLattice::new([4, 3, 1], 1e-4, 1e-5, 5e-6, CIRCLE_SHAPE_FACTOR);
        let net = lattice.build().unwrap();
        assert!(net.is_2d());
        assert!((net.extents()[0] - 5e-4).abs() < 1e-15);
    }

    #[test]
    fn radius_spread_stays_in_band() {
        let lattice = RegularLattice::new([5, 5, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
            .with_radius_spread(0.5);
        let net = lattice.build().unwrap();
        for pore in net.pores() {
            assert!(pore.geometry.radius >= 0.5e-5 && pore.geometry.radius <= 1.5e-5);
        }
        let first = net.pores()[0].geometry.radius;
        assert!(net.pores().iter().any(|p| (p.geometry.radius - first).abs() > 1e-9));
    }
}
