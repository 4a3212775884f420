//! Direct integration of raw state-vector ('H') element sets: Earth point
//! mass plus low-precision Sun and Moon, in the ecliptic frame of J2000.

use log::trace;
use nalgebra::{Rotation3, Vector3};

use crate::constants::{GE, J2000, MINUTES_PER_DAY};
use crate::ephemeris::Prediction;
use crate::error::SxpxError;
use crate::tle::StateVectorElements;

/// Mean obliquity of the ecliptic at J2000, degrees.
const OBLIQUITY_J2000_DEG: f64 = 23.4392911;
/// Integration sub-steps never exceed one day.
const MAX_SUBSTEP_MINUTES: f64 = MINUTES_PER_DAY;
/// Longest span integrated in one call: a century of daily sub-steps.
const MAX_SUBSTEPS: f64 = 36_525.0;
const SECONDS_PER_MINUTE_SQ: f64 = 3600.0;
/// Gravitational parameters, km³/min².
const GM_EARTH: f64 = GE * SECONDS_PER_MINUTE_SQ;
const GM_SUN: f64 = 1.32712440018e11 * SECONDS_PER_MINUTE_SQ;
const GM_MOON: f64 = 4902.800066 * SECONDS_PER_MINUTE_SQ;
const AU_KM: f64 = 149597870.7;
/// Earth radius used with the lunar horizontal parallax.
const EARTH_RADIUS_KM: f64 = 6378.14;

fn equatorial_to_ecliptic() -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), -OBLIQUITY_J2000_DEG.to_radians())
}

/// Geocentric ecliptic position of the Sun in km (Astronomical Almanac low-precision formulae).
pub fn sun_position(jd: f64) -> Vector3<f64> {
    let n = jd - J2000;
    let l = 280.460 + 0.9856474 * n;
    let g = (357.528 + 0.9856003 * n).to_radians();
    let lambda = (l + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
    let r = (1.00014 - 0.01671 * g.cos() - 0.00014 * (2.0 * g).cos()) * AU_KM;
    Vector3::new(r * lambda.cos(), r * lambda.sin(), 0.0)
}

/// Geocentric ecliptic position of the Moon in km (Astronomical Almanac low-precision formulae).
pub fn moon_position(jd: f64) -> Vector3<f64> {
    let t = (jd - J2000) / 36525.0;
    let sin_deg = |deg: f64| deg.to_radians().sin();
    let cos_deg = |deg: f64| deg.to_radians().cos();

    let lambda = 218.32 + 481267.881 * t + 6.29 * sin_deg(135.0 + 477198.87 * t)
        - 1.27 * sin_deg(259.3 - 413335.36 * t)
        + 0.66 * sin_deg(235.7 + 890534.22 * t)
        + 0.21 * sin_deg(269.9 + 954397.74 * t)
        - 0.19 * sin_deg(357.5 + 35999.05 * t)
        - 0.11 * sin_deg(186.5 + 966404.03 * t);
    let beta = 5.13 * sin_deg(93.3 + 483202.02 * t) + 0.28 * sin_deg(228.2 + 960400.89 * t)
        - 0.28 * sin_deg(318.3 + 6003.15 * t)
        - 0.17 * sin_deg(217.6 - 407332.21 * t);
    let parallax = 0.9508
        + 0.0518 * cos_deg(135.0 + 477198.87 * t)
        + 0.0095 * cos_deg(259.3 - 413335.36 * t)
        + 0.0078 * cos_deg(235.7 + 890534.22 * t)
        + 0.0028 * cos_deg(269.9 + 954397.74 * t);

    let r = EARTH_RADIUS_KM / sin_deg(parallax);
    let (lambda, beta) = (lambda.to_radians(), beta.to_radians());
    Vector3::new(
        r * beta.cos() * lambda.cos(),
        r * beta.cos() * lambda.sin(),
        r * beta.sin(),
    )
}

/// Last Sun and Moon positions evaluated, keyed by Julian date.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyCache {
    jd: f64,
    sun: Vector3<f64>,
    moon: Vector3<f64>,
}

impl Default for BodyCache {
    fn default() -> Self {
        BodyCache {
            jd: f64::NAN,
            sun: Vector3::zeros(),
            moon: Vector3::zeros(),
        }
    }
}

impl BodyCache {
    pub fn positions(&mut self, jd: f64) -> (Vector3<f64>, Vector3<f64>) {
        if jd != self.jd {
            self.jd = jd;
            self.sun = sun_position(jd);
            self.moon = moon_position(jd);
        }
        (self.sun, self.moon)
    }
}

fn third_body_accel(sat: &Vector3<f64>, body: &Vector3<f64>, gm: f64) -> Vector3<f64> {
    let to_body = body - sat;
    gm * (to_body / to_body.norm().powi(3) - body / body.norm().powi(3))
}

/// Integrates a raw state vector from its epoch. Each call starts over
/// from epoch; only the Sun/Moon cache survives between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeBody {
    epoch: f64,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    cache: BodyCache,
}

impl ThreeBody {
    pub fn new(epoch: f64, sv: &StateVectorElements) -> Self {
        let rot = equatorial_to_ecliptic();
        ThreeBody {
            epoch,
            position: rot * sv.position_km,
            velocity: rot * sv.velocity_km_min,
            cache: BodyCache::default(),
        }
    }

    fn acceleration(&mut self, position: &Vector3<f64>, minutes: f64) -> Vector3<f64> {
        let (sun, moon) = self.cache.positions(self.epoch + minutes / MINUTES_PER_DAY);
        let r = position.norm();
        position * (-GM_EARTH / (r * r * r))
            + third_body_accel(position, &sun, GM_SUN)
            + third_body_accel(position, &moon, GM_MOON)
    }

    fn rk4_step(
        &mut self,
        pos: Vector3<f64>,
        vel: Vector3<f64>,
        t: f64,
        dt: f64,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let a1 = self.acceleration(&pos, t);
        let v1 = vel;

        let v2 = vel + a1 * (dt / 2.0);
        let a2 = self.acceleration(&(pos + v1 * (dt / 2.0)), t + dt / 2.0);

        let v3 = vel + a2 * (dt / 2.0);
        let a3 = self.acceleration(&(pos + v2 * (dt / 2.0)), t + dt / 2.0);

        let v4 = vel + a3 * dt;
        let a4 = self.acceleration(&(pos + v3 * dt), t + dt);

        (
            pos + (v1 + 2.0 * v2 + 2.0 * v3 + v4) * (dt / 6.0),
            vel + (a1 + 2.0 * a2 + 2.0 * a3 + a4) * (dt / 6.0),
        )
    }

    /// Equatorial position (km) and velocity (km/min) at `tsince` minutes from epoch.
    pub fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        let n_steps = (tsince.abs() / MAX_SUBSTEP_MINUTES).ceil().max(1.0);
        if !(n_steps <= MAX_SUBSTEPS) {
            return Err(SxpxError::ConvergenceFail);
        }
        let n_steps = n_steps as usize;
        let dt = tsince / n_steps as f64;
        let mut pos = self.position;
        let mut vel = self.velocity;
        if tsince != 0.0 {
            for i in 0..n_steps {
                (pos, vel) = self.rk4_step(pos, vel, i as f64 * dt, dt);
            }
            trace!("integrated {} steps of {:.1} min", n_steps, dt);
        }
        if !(pos.iter().chain(vel.iter()).all(|x| x.is_finite())) {
            return Err(SxpxError::ConvergenceFail);
        }

        let back = equatorial_to_ecliptic().inverse();
        Ok(Prediction {
            position: back * pos,
            velocity: back * vel,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geostationary() -> StateVectorElements {
        let r = 42164.17;
        let v = (GM_EARTH / r).sqrt();
        StateVectorElements {
            position_km: Vector3::new(r, 0.0, 0.0),
            velocity_km_min: Vector3::new(0.0, v, 0.0),
        }
    }

    #[test]
    fn epoch_returns_the_input_state() {
        let sv = geostationary();
        let mut body = ThreeBody::new(2451545.0, &sv);
        let pred = body.propagate(0.0).unwrap();
        assert!((pred.position - sv.position_km).norm() < 1e-8);
        assert!((pred.velocity - sv.velocity_km_min).norm() < 1e-10);
    }

    #[test]
    fn geostationary_orbit_closes_after_a_sidereal_period() {
        let sv = geostationary();
        let mut body = ThreeBody::new(2451545.0, &sv);
        let period = std::f64::consts::TAU * (42164.17f64.powi(3) / GM_EARTH).sqrt();
        let pred = body.propagate(period).unwrap();
        assert_relative_eq!(pred.position.norm(), 42164.17, max_relative = 5e-3);
        assert!((pred.position - sv.position_km).norm() < 500.0);

        let back = body.propagate(-period).unwrap();
        assert!((back.position - sv.position_km).norm() < 500.0);
    }

    #[test]
    fn spans_beyond_a_century_are_refused() {
        let mut body = ThreeBody::new(2451545.0, &geostationary());
        assert_eq!(body.propagate(1.0e12).unwrap_err(), SxpxError::ConvergenceFail);
        assert_eq!(body.propagate(-1.0e12).unwrap_err(), SxpxError::ConvergenceFail);
        assert_eq!(body.propagate(f64::NAN).unwrap_err(), SxpxError::ConvergenceFail);
        assert!(body.propagate(0.0).is_ok());
    }

    #[test]
    fn low_precision_bodies_are_at_sensible_distances() {
        let sun = sun_position(2460000.5);
        assert_relative_eq!(sun.norm() / AU_KM, 1.0, max_relative = 0.02);
        assert_eq!(sun.z, 0.0);
        let moon = moon_position(2460000.5);
        assert!(moon.norm() > 356_000.0 && moon.norm() < 407_000.0);
        assert!(moon.z.abs() / moon.norm() < 0.1);
    }

    #[test]
    fn cache_reuses_the_last_evaluation() {
        let mut cache = BodyCache::default();
        let (sun, moon) = cache.positions(2451545.0);
        assert_eq!(cache.positions(2451545.0), (sun, moon));
        let (later_sun, _) = cache.positions(2451546.0);
        assert!((later_sun - sun).norm() > 1.0e6);
    }
}
