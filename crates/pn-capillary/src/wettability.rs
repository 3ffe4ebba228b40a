//! Wettability alteration after primary drainage.

use pn_network::{Network, Phase, Wettability};
use tracing::debug;

/// How oil-contacted elements are turned oil-wet during ageing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WettabilityModel {
    /// No alteration
    WaterWet,
    /// The largest oil-filled elements become oil-wet
    MixedWetLarge,
    /// The smallest oil-filled elements become oil-wet
    MixedWetSmall,
    /// Every oil-filled element becomes oil-wet
    OilWet,
}

/// Ageing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ageing {
    pub model: WettabilityModel,
    /// Fraction of oil-filled elements altered by the mixed-wet models
    pub oil_wet_fraction: f64,
    /// Contact angle given to altered elements (rad)
    pub oil_wet_contact_angle: f64,
}

/// Alter wettability of oil-filled elements. Returns the number of altered elements.
///
/// Candidates are ordered by radius (ties by ascending id) so the choice is
/// deterministic.
pub fn apply_ageing(network: &mut Network, ageing: &Ageing) -> usize {
    let mut candidates: Vec<(f64, usize)> = network
        .elements()
        .iter()
        .filter(|e| e.is_open() && e.state.phase == Phase::Oil)
        .map(|e| (e.geometry.radius, e.abs_id.idx()))
        .collect();

    let count = match ageing.model {
        WettabilityModel::WaterWet => 0,
        WettabilityModel::OilWet => candidates.len(),
        WettabilityModel::MixedWetLarge => {
            candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
            fraction_count(candidates.len(), ageing.oil_wet_fraction)
        }
        WettabilityModel::MixedWetSmall => {
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            fraction_count(candidates.len(), ageing.oil_wet_fraction)
        }
    };

    let elements = network.elements_mut();
    for &(_, i) in candidates.iter().take(count) {
        let state = &mut elements[i].state;
        state.wettability = Wettability::OilWet;
        state.contact_angle = ageing.oil_wet_contact_angle;
    }
    debug!(model = ?ageing.model, altered = count, "wettability ageing applied");
    count
}

fn fraction_count(n: usize, fraction: f64) -> usize {
    ((n as f64) * fraction.clamp(0.0, 1.0)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_network::RegularLattice;
    use pn_network::element::CIRCLE_SHAPE_FACTOR;

    fn oil_filled() -> Network {
        let mut net = RegularLattice::new([4, 2, 1], 1e-4, 2e-5, 1e-5, CIRCLE_SHAPE_FACTOR)
            .with_radius_spread(0.4)
            .build()
            .unwrap();
        net.saturate(Phase::Oil, Wettability::WaterWet, 0.0);
        net
    }

    #[test]
    fn mixed_wet_large_picks_largest() {
        let mut net = oil_filled();
        let ageing = Ageing {
            model: WettabilityModel::MixedWetLarge,
            oil_wet_fraction: 0.5,
            oil_wet_contact_angle: 2.5,
        };
        let altered = apply_ageing(&mut net, &ageing);
        assert_eq!(altered, (net.element_count() as f64 * 0.5).round() as usize);

        let min_oil_wet = net
            .elements()
            .iter()
            .filter(|e| e.state.wettability == Wettability::OilWet)
            .map(|e| e.geometry.radius)
            .fold(f64::INFINITY, f64::min);
        let max_water_wet = net
            .elements()
            .iter()
            .filter(|e| e.state.wettability == Wettability::WaterWet)
            .map(|e| e.geometry.radius)
            .fold(0.0, f64::max);
        assert!(min_oil_wet >= max_water_wet);
    }

    #[test]
    fn water_filled_elements_keep_wettability() {
        let mut net = oil_filled();
        net.saturate(Phase::Water, Wettability::WaterWet, 0.0);
        let ageing = Ageing {
            model: WettabilityModel::OilWet,
            oil_wet_fraction: 1.0,
            oil_wet_contact_angle: 2.5,
        };
        assert_eq!(apply_ageing(&mut net, &ageing), 0);
    }
}
