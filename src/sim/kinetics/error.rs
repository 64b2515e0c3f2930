use thiserror::Error;

/// Fatal configuration errors.
///
/// These are returned wrapped in [`anyhow::Error`]; use
/// `err.downcast_ref::<ConfigError>()` to inspect the variant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid is not cubic: step sizes ({dx}, {dy}, {dz}) differ by more than {tolerance}")]
    NonCubicGrid {
        dx: f64,
        dy: f64,
        dz: f64,
        tolerance: f64,
    },
    #[error("speciation denominator is zero for species '{species}'")]
    ZeroSpeciationDenominator { species: String },
    #[error("unrecognized boundary condition code '{code}' on the {axis} axis")]
    UnknownBoundaryCode { axis: char, code: String },
    #[error("unrecognized unit code '{0}' (expected 'kg' or 'mol')")]
    UnknownUnitCode(String),
    #[error("{feature} requires {required}")]
    MissingCollaborator {
        feature: &'static str,
        required: &'static str,
    },
    #[error("reactor volume must be positive, got {0}")]
    NonPositiveReactorVolume(f64),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
