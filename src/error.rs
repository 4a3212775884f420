use thiserror::Error;

/// Fatal problems decoding two-line element text.
///
/// Checksum mismatches are not errors; see [`crate::read::ChecksumStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TleError {
    #[error("line {line} does not begin with its line number")]
    NotATleLine { line: u8 },
    #[error("line {line} is too short: {len} columns")]
    LineTooShort { line: u8, len: usize },
    #[error("line {line} has trailing text past column 69")]
    Unterminated { line: u8 },
    #[error("invalid character {ch:?} in column {column}")]
    InvalidCharacter { column: usize, ch: char },
    #[error("could not decode {field} from {text:?}")]
    Field { field: &'static str, text: String },
}

impl TleError {
    /// Negative status code used by callers that speak the integer protocol.
    pub fn code(&self) -> i32 {
        match self {
            TleError::NotATleLine { .. } => -1,
            TleError::InvalidCharacter { .. } => -2,
            TleError::Unterminated { .. } => -3,
            TleError::LineTooShort { .. } => -4,
            TleError::Field { .. } => -5,
        }
    }

    pub(crate) fn field(field: &'static str, text: &str) -> Self {
        TleError::Field {
            field,
            text: text.to_string(),
        }
    }
}

/// Propagation failures. No usable position exists when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SxpxError {
    #[error("eccentricity is at or above the near-parabolic limit")]
    NearlyParabolic,
    #[error("semi-major axis went negative")]
    NegativeMajorAxis,
    #[error("mean motion went negative")]
    NegativeXn,
    #[error("propagation failed to converge")]
    ConvergenceFail,
    #[error("element set holds a raw state vector, not mean elements")]
    StateVectorElements,
    #[error("element set is not valid for propagation")]
    InvalidElements,
}

impl SxpxError {
    pub fn code(&self) -> i32 {
        match self {
            SxpxError::NearlyParabolic => -1,
            SxpxError::NegativeMajorAxis => -2,
            SxpxError::NegativeXn => -5,
            SxpxError::ConvergenceFail => -6,
            SxpxError::StateVectorElements => -7,
            SxpxError::InvalidElements => -8,
        }
    }
}

/// The position was computed but is physically suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SxpxWarning {
    #[error("entire orbit lies within the earth")]
    OrbitWithinEarth,
    #[error("perigee lies within the earth")]
    PerigeeWithinEarth,
}

impl SxpxWarning {
    pub fn code(&self) -> i32 {
        match self {
            SxpxWarning::OrbitWithinEarth => -3,
            SxpxWarning::PerigeeWithinEarth => -4,
        }
    }
}
