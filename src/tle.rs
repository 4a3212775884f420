//! The orbital element record decoded from a two-line element set.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;

use crate::constants::{MINUTES_PER_DAY, TWO_PI};
use crate::datetime_util;

/// Mean orbital elements at epoch. Angles in radians, mean motion in radians/minute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanElements {
    pub xincl: f64,
    pub xnodeo: f64,
    pub eo: f64,
    pub omegao: f64,
    pub xmo: f64,
    pub xno: f64,
}

impl MeanElements {
    pub fn revs_per_day(&self) -> f64 {
        self.xno * MINUTES_PER_DAY / TWO_PI
    }

    /// Period from the un-recovered (Kozai) mean motion.
    pub fn period_minutes(&self) -> f64 {
        TWO_PI / self.xno
    }
}

/// Geocentric equatorial state at epoch, carried by ephemeris type 'H' records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVectorElements {
    pub position_km: Vector3<f64>,
    pub velocity_km_min: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elements {
    Mean(MeanElements),
    StateVector(StateVectorElements),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tle {
    /// Julian date of the element epoch.
    pub epoch: f64,
    /// Half the first time derivative of mean motion, radians/minute².
    pub xndt2o: f64,
    /// One sixth of the second time derivative of mean motion, radians/minute³.
    pub xndd6o: f64,
    pub bstar: f64,
    pub elements: Elements,
    pub norad_number: u32,
    pub bulletin_number: u32,
    pub revolution_number: u32,
    pub classification: char,
    pub ephemeris_type: char,
    pub intl_desig: String,
}

impl Tle {
    /// Mean elements, or `None` for a raw state-vector record.
    pub fn mean(&self) -> Option<&MeanElements> {
        match &self.elements {
            Elements::Mean(mean) => Some(mean),
            Elements::StateVector(_) => None,
        }
    }

    pub fn state_vector(&self) -> Option<&StateVectorElements> {
        match &self.elements {
            Elements::StateVector(sv) => Some(sv),
            Elements::Mean(_) => None,
        }
    }

    pub fn is_state_vector(&self) -> bool {
        matches!(self.elements, Elements::StateVector(_))
    }

    pub fn epoch_utc(&self) -> DateTime<Utc> {
        datetime_util::jd_to_utc(self.epoch)
    }

    /// Time offset in minutes from the element epoch to `when`.
    pub fn minutes_since_epoch(&self, when: DateTime<Utc>) -> f64 {
        (datetime_util::utc_to_jd(when) - self.epoch) * MINUTES_PER_DAY
    }
}
