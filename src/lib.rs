//! NORAD general-perturbation orbit propagators (SGP, SGP4, SGP8, SDP4, SDP8)
//! with two-line element parsing and writing, and observer look angles.

pub mod common;
pub mod constants;
pub mod datetime_util;
pub mod deep;
pub mod ephemeris;
pub mod error;
pub mod numerical_integration;
pub mod observe;
pub mod propagate;
pub mod read;
pub mod sdp4;
pub mod sdp8;
pub mod sgp;
pub mod sgp4;
pub mod sgp8;
pub mod tle;
pub mod write;

pub use deep::DeepConfig;
pub use ephemeris::{select_ephemeris, AnyPropagator, EphemerisClass, Model, Prediction, Propagator};
pub use error::{SxpxError, SxpxWarning, TleError};
pub use read::{parse_elements, read_tle_file, read_tle_str, tle_checksum};
pub use sdp4::Sdp4;
pub use sdp8::Sdp8;
pub use sgp::Sgp;
pub use sgp4::Sgp4;
pub use sgp8::Sgp8;
pub use tle::{Elements, MeanElements, StateVectorElements, Tle};
pub use write::write_elements_in_tle_format;
