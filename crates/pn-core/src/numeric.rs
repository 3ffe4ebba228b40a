/// Floating point type used throughout porenet
pub type Real = f64;

/// Conductivity of closed elements: vanishes against any open element but
/// keeps harmonic means finite.
pub const CLOSED_CONDUCTIVITY: Real = 1e-200;

/// Time step reported when no element carries any flux.
pub const TIME_STEP_SENTINEL: Real = 1e50;

/// Whether `v` is a fraction in `[0, 1]`, allowing `tol` of round-off.
pub fn is_unit_fraction(v: Real, tol: Real) -> bool {
    v.is_finite() && v >= -tol && v <= 1.0 + tol
}
