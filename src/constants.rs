//! Physical and model constants shared by the SGP/SDP family.
//!
//! Distances are in earth radii and times in minutes unless the name says
//! otherwise. Values follow WGS-72, the datum the element sets are fitted in.

use std::f64::consts::PI;

pub const TWO_PI: f64 = 2.0 * PI;
pub const TWO_THIRDS: f64 = 2.0 / 3.0;
pub const DEG_TO_RAD: f64 = PI / 180.0;

/// Distance units per earth radius.
pub const AE: f64 = 1.0;
/// Earth equatorial radius, km.
pub const XKMPER: f64 = 6378.135;
/// Earth gravitational constant, km³/s².
pub const GE: f64 = 398600.8;

pub const XJ2: f64 = 1.082616e-3;
pub const XJ3: f64 = -2.53881e-6;
pub const XJ4: f64 = -1.65597e-6;

pub const CK2: f64 = 0.5 * XJ2 * AE * AE;
pub const CK4: f64 = -0.375 * XJ4 * AE * AE * AE * AE;
pub const A3OVK2: f64 = -XJ3 / CK2 * AE * AE * AE;

/// sqrt(GM) in earth radii^1.5 per minute.
pub const XKE: f64 = 0.0743669161331734132;

/// Atmospheric model parameter `s`, 78 km above the surface.
pub const S_CONST: f64 = AE * (1.0 + 78.0 / XKMPER);
/// `(q0 - s)^4` with q0 120 km above the surface.
pub const QOMS2T: f64 = 1.880279159015270643865e-9;

/// Reference density used by SGP8/SDP8 to turn B* into a ballistic coefficient.
pub const RHO: f64 = 0.15696615;

pub const MINUTES_PER_DAY: f64 = 1440.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Lower bound applied to propagated eccentricity.
pub const ECC_EPS: f64 = 1.0e-6;
pub const E6A: f64 = 1.0e-6;

/// Julian date of 1900 January 0.0.
pub const J1900: f64 = 2415019.5;
/// Julian date of 1950 January 0.0.
pub const J1950: f64 = 2433281.5;
pub const J2000: f64 = 2451545.0;

/// Reduce an angle to `[0, 2π)`.
pub fn fmod2p(x: f64) -> f64 {
    let rval = x % TWO_PI;
    if rval < 0.0 {
        rval + TWO_PI
    } else {
        rval
    }
}

/// Reduce an angle to `(-π, π]`.
pub fn centralize_angle(x: f64) -> f64 {
    let rval = fmod2p(x);
    if rval > PI {
        rval - TWO_PI
    } else {
        rval
    }
}

/// Greenwich sidereal angle at `jd`, as used by the deep-space resonance terms.
pub fn theta_g(jd: f64) -> f64 {
    let ds50 = jd - J1950;
    fmod2p(1.72944494 + 6.3003880987 * ds50)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn derived_constants_match_published_values() {
        assert_abs_diff_eq!(CK2, 5.41308e-4, epsilon = 1e-10);
        assert_abs_diff_eq!(CK4, 6.2098875e-7, epsilon = 1e-12);
        assert_abs_diff_eq!(S_CONST, 1.01222928, epsilon = 1e-8);
        let q0 = AE * (1.0 + 120.0 / XKMPER);
        assert_abs_diff_eq!(QOMS2T, (q0 - S_CONST).powi(4), epsilon = 1e-17);
        let xke = (3600.0 * GE / (XKMPER * XKMPER * XKMPER)).sqrt();
        assert_abs_diff_eq!(XKE, xke, epsilon = 1e-12);
    }

    #[test]
    fn angles_reduce_into_range() {
        assert_abs_diff_eq!(fmod2p(-0.5), TWO_PI - 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(fmod2p(7.0), 7.0 - TWO_PI, epsilon = 1e-15);
        assert_abs_diff_eq!(centralize_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-15);
    }
}
