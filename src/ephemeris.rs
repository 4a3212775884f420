//! Near-earth / deep-space selection, the propagator trait and model dispatch.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use log::debug;
use nalgebra::Vector3;

use crate::common::recover_mean_motion;
use crate::constants::{MINUTES_PER_DAY, TWO_PI};
use crate::deep::DeepConfig;
use crate::error::{SxpxError, SxpxWarning};
use crate::sdp4::Sdp4;
use crate::sdp8::Sdp8;
use crate::sgp::Sgp;
use crate::sgp4::Sgp4;
use crate::sgp8::Sgp8;
use crate::tle::Tle;

/// Orbits with a period of at least this many days need the deep-space models.
const DEEP_SPACE_PERIOD_DAYS: f64 = 1.0 / 6.4;

/// Position (km) and velocity (km/min) at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub warning: Option<SxpxWarning>,
}

impl Prediction {
    pub fn velocity_km_s(&self) -> Vector3<f64> {
        self.velocity / 60.0
    }

    /// 0 for a clean result, or the negative warning code.
    pub fn status(&self) -> i32 {
        self.warning.map_or(0, |w| w.code())
    }
}

/// One propagation session per satellite. Deep-space implementations keep
/// integrator state between calls, hence `&mut self`.
pub trait Propagator {
    /// `tsince` is minutes since the element epoch.
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EphemerisClass {
    NearEarth,
    DeepSpace,
}

impl EphemerisClass {
    pub fn code(self) -> i32 {
        match self {
            EphemerisClass::NearEarth => 0,
            EphemerisClass::DeepSpace => 1,
        }
    }
}

/// Classifies an element set by its un-Kozai'd period. Raw state-vector
/// records are always deep-space.
pub fn select_ephemeris(tle: &Tle) -> Result<EphemerisClass, SxpxError> {
    let mean = match tle.mean() {
        Some(mean) => mean,
        None => return Ok(EphemerisClass::DeepSpace),
    };
    if mean.xno <= 0.0 || mean.eo < 0.0 || mean.eo >= 1.0 {
        return Err(SxpxError::InvalidElements);
    }
    let rec = recover_mean_motion(mean);
    let period_days = TWO_PI / rec.xnodp / MINUTES_PER_DAY;
    if period_days >= DEEP_SPACE_PERIOD_DAYS {
        Ok(EphemerisClass::DeepSpace)
    } else {
        Ok(EphemerisClass::NearEarth)
    }
}

/// Integer form of [`select_ephemeris`]: 1 deep-space, 0 near-earth, -1 invalid.
pub fn select_ephemeris_code(tle: &Tle) -> i32 {
    match select_ephemeris(tle) {
        Ok(class) => class.code(),
        Err(_) => -1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Sgp,
    Sgp4,
    Sgp8,
    Sdp4,
    Sdp8,
}

impl Model {
    /// Swaps to the near-earth or deep-space member of the same family.
    /// SGP has no deep-space counterpart and is returned unchanged. Raw state
    /// vectors are only handled by SDP4.
    pub fn for_tle(self, tle: &Tle) -> Result<Model, SxpxError> {
        if tle.is_state_vector() {
            return Ok(Model::Sdp4);
        }
        let class = select_ephemeris(tle)?;
        let model = match (self, class) {
            (Model::Sgp, _) => Model::Sgp,
            (Model::Sgp4 | Model::Sdp4, EphemerisClass::NearEarth) => Model::Sgp4,
            (Model::Sgp4 | Model::Sdp4, EphemerisClass::DeepSpace) => Model::Sdp4,
            (Model::Sgp8 | Model::Sdp8, EphemerisClass::NearEarth) => Model::Sgp8,
            (Model::Sgp8 | Model::Sdp8, EphemerisClass::DeepSpace) => Model::Sdp8,
        };
        Ok(model)
    }

    pub fn is_deep_space(self) -> bool {
        matches!(self, Model::Sdp4 | Model::Sdp8)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::Sgp => "SGP",
            Model::Sgp4 => "SGP4",
            Model::Sgp8 => "SGP8",
            Model::Sdp4 => "SDP4",
            Model::Sdp8 => "SDP8",
        };
        f.write_str(name)
    }
}

impl FromStr for Model {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let model = match s.to_ascii_lowercase().as_str() {
            "sgp" => Model::Sgp,
            "sgp4" => Model::Sgp4,
            "sgp8" => Model::Sgp8,
            "sdp4" => Model::Sdp4,
            "sdp8" => Model::Sdp8,
            _ => bail!("unknown model {:?} (expected sgp, sgp4, sgp8, sdp4 or sdp8)", s),
        };
        Ok(model)
    }
}

/// Any of the five models behind one type, for callers that pick at run time.
#[derive(Debug, Clone)]
pub enum AnyPropagator {
    Sgp(Sgp),
    Sgp4(Sgp4),
    Sgp8(Sgp8),
    Sdp4(Box<Sdp4>),
    Sdp8(Box<Sdp8>),
}

impl AnyPropagator {
    /// Initializes exactly the requested model; see [`Model::for_tle`] for the
    /// automatic near-earth/deep-space pairing.
    pub fn new(model: Model, tle: &Tle, config: DeepConfig) -> Result<Self, SxpxError> {
        debug!("initializing {} for object {}", model, tle.norad_number);
        let propagator = match model {
            Model::Sgp => AnyPropagator::Sgp(Sgp::new(tle)?),
            Model::Sgp4 => AnyPropagator::Sgp4(Sgp4::new(tle)?),
            Model::Sgp8 => AnyPropagator::Sgp8(Sgp8::new(tle)?),
            Model::Sdp4 => AnyPropagator::Sdp4(Box::new(Sdp4::new(tle, config)?)),
            Model::Sdp8 => AnyPropagator::Sdp8(Box::new(Sdp8::new(tle, config)?)),
        };
        Ok(propagator)
    }

    pub fn model(&self) -> Model {
        match self {
            AnyPropagator::Sgp(_) => Model::Sgp,
            AnyPropagator::Sgp4(_) => Model::Sgp4,
            AnyPropagator::Sgp8(_) => Model::Sgp8,
            AnyPropagator::Sdp4(_) => Model::Sdp4,
            AnyPropagator::Sdp8(_) => Model::Sdp8,
        }
    }
}

impl Propagator for AnyPropagator {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        match self {
            AnyPropagator::Sgp(p) => p.propagate(tsince),
            AnyPropagator::Sgp4(p) => p.propagate(tsince),
            AnyPropagator::Sgp8(p) => p.propagate(tsince),
            AnyPropagator::Sdp4(p) => p.propagate(tsince),
            AnyPropagator::Sdp8(p) => p.propagate(tsince),
        }
    }
}
