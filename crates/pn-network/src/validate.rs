//! Network validation logic.

use pn_core::{Id, PoreId};

use crate::builder::{NodeSpec, PendingPore};
use crate::element::Element;
use crate::error::{NetworkError, NetworkResult};

/// Validate the builder topology: non-empty, endpoint references exist, no self loops.
pub(crate) fn validate_structure(
    nodes: &[NodeSpec],
    pores: &[PendingPore],
) -> NetworkResult<()> {
    if nodes.is_empty() && pores.is_empty() {
        return Err(NetworkError::Empty);
    }
    check_capacity(nodes.len() + pores.len())?;

    for (j, pore) in pores.iter().enumerate() {
        let pid = PoreId::from_usize(j);

        if pore.node_in.is_none() && pore.node_out.is_none() {
            return Err(NetworkError::DanglingPore { pore: pid });
        }

        for node in [pore.node_in, pore.node_out].into_iter().flatten() {
            if node.idx() >= nodes.len() {
                return Err(NetworkError::InvalidNodeRef { pore: pid, node });
            }
        }

        if pore.node_in.is_some() && pore.node_in == pore.node_out {
            return Err(NetworkError::SelfLoop { pore: pid });
        }
    }

    Ok(())
}

/// Element ids count nodes then pores, so the total must fit one `Id`.
pub(crate) fn check_capacity(count: usize) -> NetworkResult<()> {
    match count.checked_sub(1).map(Id::try_from_usize) {
        Some(None) => Err(NetworkError::TooManyElements { count }),
        _ => Ok(()),
    }
}

/// Validate element geometry: radius, length and shape factor must be positive
/// and finite on open elements.
pub(crate) fn validate_geometry(elements: &[Element]) -> NetworkResult<()> {
    for e in elements.iter().filter(|e| e.is_open()) {
        let g = &e.geometry;
        check_positive("radius", e.abs_id, g.radius)?;
        check_positive("length", e.abs_id, g.length)?;
        check_positive("shape factor", e.abs_id, g.shape_factor)?;
        check_positive("volume", e.abs_id, g.volume)?;
    }
    Ok(())
}

fn check_positive(what: &'static str, element: Id, value: f64) -> NetworkResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(NetworkError::InvalidGeometry {
            what,
            element,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PoreSpec;
    use crate::element::{CIRCLE_SHAPE_FACTOR, Geometry};
    use pn_core::NodeId;

    fn node() -> NodeSpec {
        NodeSpec::new([0.0; 3], 1e-5, CIRCLE_SHAPE_FACTOR)
    }

    fn pore(node_in: Option<NodeId>, node_out: Option<NodeId>) -> PendingPore {
        PendingPore {
            node_in,
            node_out,
            spec: PoreSpec::new(1e-6, CIRCLE_SHAPE_FACTOR),
        }
    }

    #[test]
    fn validate_empty_network() {
        assert_eq!(validate_structure(&[], &[]), Err(NetworkError::Empty));
    }

    #[test]
    fn validate_invalid_node_ref() {
        let nodes = vec![node()];
        let pores = vec![pore(Some(Id::from_index(0)), Some(Id::from_index(99)))];
        assert!(matches!(
            validate_structure(&nodes, &pores),
            Err(NetworkError::InvalidNodeRef { .. })
        ));
    }

    #[test]
    fn validate_dangling_and_self_loop() {
        let nodes = vec![node()];
        assert!(matches!(
            validate_structure(&nodes, &[pore(None, None)]),
            Err(NetworkError::DanglingPore { .. })
        ));
        let n = Some(Id::from_index(0));
        assert!(matches!(
            validate_structure(&nodes, &[pore(n, n)]),
            Err(NetworkError::SelfLoop { .. })
        ));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn capacity_stops_at_addressable_ids() {
        let limit = Id::MAX_INDEX as usize + 1;
        assert!(check_capacity(0).is_ok());
        assert!(check_capacity(limit).is_ok());
        assert_eq!(
            check_capacity(limit + 1),
            Err(NetworkError::TooManyElements { count: limit + 1 })
        );
    }

    #[test]
    fn validate_rejects_nonpositive_radius() {
        let mut builder = crate::NetworkBuilder::new();
        builder.add_node(NodeSpec::new([1e-4, 0.0, 0.0], 0.0, CIRCLE_SHAPE_FACTOR).with_length(1e-5));
        assert!(matches!(
            builder.build(),
            Err(NetworkError::InvalidGeometry { what: "radius", .. })
        ));

        let ok = Geometry::new(1e-5, 1e-5, CIRCLE_SHAPE_FACTOR);
        assert!(check_positive("volume", Id::from_index(0), ok.volume).is_ok());
    }
}
