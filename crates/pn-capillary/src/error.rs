//! Error types for capillary physics.

use pn_core::error::PnError;
use thiserror::Error;

/// Errors raised by fluid property checks and threshold computations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CapillaryError {
    #[error("Non-physical value for {what}: {value}")]
    NonPhysical { what: &'static str, value: f64 },

    #[error("Contact angle {value} rad outside [0, π]")]
    ContactAngle { value: f64 },

    #[error("Fraction {what} = {value} outside [0, 1]")]
    Fraction { what: &'static str, value: f64 },
}

pub type CapillaryResult<T> = Result<T, CapillaryError>;

impl From<CapillaryError> for PnError {
    fn from(e: CapillaryError) -> Self {
        match e {
            CapillaryError::NonPhysical { what, .. } => PnError::InvalidArg { what },
            CapillaryError::ContactAngle { .. } => PnError::InvalidArg {
                what: "contact angle",
            },
            CapillaryError::Fraction { what, .. } => PnError::InvalidArg { what },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CapillaryError::NonPhysical {
            what: "oil viscosity",
            value: -1.0,
        };
        assert!(err.to_string().contains("oil viscosity"));
    }

    #[test]
    fn error_conversion() {
        let err: PnError = CapillaryError::ContactAngle { value: 4.0 }.into();
        assert!(matches!(err, PnError::InvalidArg { .. }));
    }
}
