//! Topocentric helpers: observer location in the inertial frame and the
//! apparent direction from observer to satellite.

use std::str::FromStr;

use anyhow::{bail, Context};
use nalgebra::Vector3;

use crate::constants::{J2000, TWO_PI};

/// Earth axes used for observer locations, metres.
const EARTH_MAJOR_AXIS: f64 = 6378140.0;
const EARTH_MINOR_AXIS: f64 = 6356755.0;

/// Parallax factors: observer position in units of the earth's equatorial radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parallax {
    pub rho_cos_phi: f64,
    pub rho_sin_phi: f64,
}

/// Direction and distance from observer to satellite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaDecDelta {
    /// Right ascension, radians in [0, 2π).
    pub ra: f64,
    /// Declination, radians.
    pub dec: f64,
    /// Range, km.
    pub delta: f64,
}

/// A ground station. Angles in radians, height in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
}

impl Site {
    pub fn parallax(&self) -> Parallax {
        lat_alt_to_parallax(self.lat, self.alt_m)
    }

    /// Site position in km at Julian date `jd`, inertial of date.
    pub fn position(&self, jd: f64) -> Vector3<f64> {
        observer_cartesian_coords(jd, self.lon, self.parallax())
    }

    /// Apparent J2000 RA/Dec and range of a satellite at `satellite` (km, of date).
    pub fn look(&self, jd: f64, satellite: &Vector3<f64>) -> RaDecDelta {
        let mut look = get_satellite_ra_dec_delta(&self.position(jd), satellite);
        let (ra, dec) = epoch_of_date_to_j2000(jd, look.ra, look.dec);
        look.ra = ra.rem_euclid(TWO_PI);
        look.dec = dec;
        look
    }
}

/// Parses `lat,lon,alt_m` with latitude and east longitude in degrees.
impl FromStr for Site {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            bail!("expected lat,lon,alt_m but got {:?}", s);
        }
        let lat: f64 = fields[0].parse().with_context(|| format!("bad latitude {:?}", fields[0]))?;
        let lon: f64 = fields[1].parse().with_context(|| format!("bad longitude {:?}", fields[1]))?;
        let alt_m: f64 = fields[2].parse().with_context(|| format!("bad altitude {:?}", fields[2]))?;
        if !(-90.0..=90.0).contains(&lat) {
            bail!("latitude {} out of range", lat);
        }
        Ok(Site {
            lat: lat.to_radians(),
            lon: lon.to_radians(),
            alt_m,
        })
    }
}

/// Geodetic latitude (radians) and height above the ellipsoid (metres) to parallax factors.
pub fn lat_alt_to_parallax(lat: f64, ht_in_meters: f64) -> Parallax {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let u = (sin_lat * EARTH_MINOR_AXIS).atan2(cos_lat * EARTH_MAJOR_AXIS);
    Parallax {
        rho_cos_phi: u.cos() + ht_in_meters * cos_lat / EARTH_MAJOR_AXIS,
        rho_sin_phi: EARTH_MINOR_AXIS * u.sin() / EARTH_MAJOR_AXIS + ht_in_meters * sin_lat / EARTH_MAJOR_AXIS,
    }
}

/// Greenwich mean sidereal time in radians, [0, 2π), for a UT Julian date (Meeus ch. 12).
pub fn green_sidereal_time(jd_ut: f64) -> f64 {
    let t = (jd_ut - J2000) / 36525.0;
    let degrees = 280.46061837 + 360.98564736629 * (jd_ut - J2000) + t * t * (0.000387933 - t / 38710000.0);
    degrees.to_radians().rem_euclid(TWO_PI)
}

/// Observer position in km, earth-centred inertial of date. `lon` is east longitude in radians.
pub fn observer_cartesian_coords(jd: f64, lon: f64, parallax: Parallax) -> Vector3<f64> {
    let angle = lon + green_sidereal_time(jd);
    let scale = EARTH_MAJOR_AXIS / 1000.0;
    Vector3::new(
        angle.cos() * parallax.rho_cos_phi * scale,
        angle.sin() * parallax.rho_cos_phi * scale,
        parallax.rho_sin_phi * scale,
    )
}

pub fn get_satellite_ra_dec_delta(observer: &Vector3<f64>, satellite: &Vector3<f64>) -> RaDecDelta {
    let v = satellite - observer;
    let delta = v.norm();
    let ra = v.y.atan2(v.x).rem_euclid(TWO_PI);
    let dec = if delta > 0.0 { (v.z / delta).clamp(-1.0, 1.0).asin() } else { 0.0 };
    RaDecDelta { ra, dec, delta }
}

/// First-order precession of RA/Dec from the equinox of date `jd` back to J2000.
pub fn epoch_of_date_to_j2000(jd: f64, ra: f64, dec: f64) -> (f64, f64) {
    let t_centuries = (jd - J2000) / 36525.0;
    // Annual rates in seconds of time, converted to radians
    let m = (3.07496 + 0.00186 * t_centuries / 2.0).to_radians() / 240.0;
    let n = (1.33621 - 0.00057 * t_centuries / 2.0).to_radians() / 240.0;
    let ra_rate = m + n * ra.sin() * dec.tan();
    let dec_rate = n * ra.cos();
    let years = t_centuries * 100.0;
    (ra - years * ra_rate, dec - years * dec_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn parallax_at_equator_and_pole() {
        let equator = lat_alt_to_parallax(0.0, 0.0);
        assert_abs_diff_eq!(equator.rho_cos_phi, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(equator.rho_sin_phi, 0.0, epsilon = 1e-12);

        let pole = lat_alt_to_parallax(FRAC_PI_2, 1000.0);
        assert_abs_diff_eq!(pole.rho_cos_phi, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pole.rho_sin_phi, (EARTH_MINOR_AXIS + 1000.0) / EARTH_MAJOR_AXIS, max_relative = 1e-12);
    }

    #[test]
    fn sidereal_time_at_j2000() {
        // 18h 41m 50.548s
        let expected = (18.0 + 41.0 / 60.0 + 50.548 / 3600.0) * 15.0;
        assert_abs_diff_eq!(green_sidereal_time(J2000).to_degrees(), expected, epsilon = 1e-4);
    }

    #[test]
    fn observer_sits_on_the_earth_surface() {
        let obs = observer_cartesian_coords(2460000.5, 0.3, lat_alt_to_parallax(0.0, 0.0));
        assert_relative_eq!(obs.norm(), EARTH_MAJOR_AXIS / 1000.0, max_relative = 1e-12);
        assert_eq!(obs.z, 0.0);
    }

    #[test]
    fn unit_offsets_along_axes() {
        let obs = Vector3::new(1234.5, -2345.6, 3456.7);
        let cases = [
            (Vector3::x(), 0.0, 0.0),
            (Vector3::y(), FRAC_PI_2, 0.0),
            (-Vector3::x(), PI, 0.0),
            (-Vector3::y(), 1.5 * PI, 0.0),
            (Vector3::z(), 0.0, FRAC_PI_2),
            (-Vector3::z(), 0.0, -FRAC_PI_2),
        ];
        for (axis, ra, dec) in cases {
            let got = get_satellite_ra_dec_delta(&obs, &(obs + axis));
            assert_abs_diff_eq!(got.delta, 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(got.ra, ra, epsilon = 1e-6);
            assert_abs_diff_eq!(got.dec, dec, epsilon = 1e-6);
            assert!(got.ra >= 0.0 && got.ra < TWO_PI);
        }
    }

    #[test]
    fn site_from_degrees() {
        let site: Site = "51.5, -0.1, 45".parse().unwrap();
        assert_relative_eq!(site.lat, 51.5f64.to_radians());
        assert_relative_eq!(site.lon, -0.1f64.to_radians());
        assert_eq!(site.alt_m, 45.0);
        assert!("91,0,0".parse::<Site>().is_err());
        assert!("10,20".parse::<Site>().is_err());
    }

    #[test]
    fn overhead_satellite_is_at_site_declination() {
        let site = Site {
            lat: 0.0,
            lon: 0.0,
            alt_m: 0.0,
        };
        let jd = J2000;
        let up = site.position(jd).normalize();
        let look = get_satellite_ra_dec_delta(&site.position(jd), &(site.position(jd) + up * 500.0));
        assert_abs_diff_eq!(look.delta, 500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(look.dec, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(look.ra, green_sidereal_time(jd), epsilon = 1e-9);
        assert_eq!(site.look(jd, &(site.position(jd) + up * 500.0)), look);
    }

    #[test]
    fn precession_vanishes_at_j2000_and_grows_linearly() {
        assert_eq!(epoch_of_date_to_j2000(J2000, 1.0, 0.5), (1.0, 0.5));
        let (ra, dec) = epoch_of_date_to_j2000(J2000 + 36525.0, 0.0, 0.0);
        // About 3.075 s of time per year in RA along the equinox
        assert_relative_eq!(-ra, 100.0 * (3.07496 + 0.00093f64).to_radians() / 240.0, max_relative = 1e-9);
        assert!(dec < 0.0);
    }
}
