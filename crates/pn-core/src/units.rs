//! SI quantities for the inputs that carry units at the API boundary.

use uom::si::f64::{DynamicViscosity, Length};

pub type DynVisc = DynamicViscosity;
pub type Len = Length;

#[inline]
pub fn pa_s(v: f64) -> DynVisc {
    use uom::si::dynamic_viscosity::pascal_second;
    DynVisc::new::<pascal_second>(v)
}

/// Length given in micrometres (network descriptions use µm).
#[inline]
pub fn um(v: f64) -> Len {
    use uom::si::length::micrometer;
    Len::new::<micrometer>(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centipoise_water() {
        assert!((pa_s(1e-3).value - 1e-3).abs() < 1e-18);
    }

    #[test]
    fn micrometers_are_si_scaled() {
        assert!((um(10.0).value - 1e-5).abs() < 1e-18);
    }
}
