//! Initialization shared by SGP4 and SDP4, and the kernel that turns secularly
//! updated elements into a position and velocity.

use nalgebra::Vector3;

use crate::constants::{
    centralize_angle, A3OVK2, AE, CK2, CK4, QOMS2T, S_CONST, TWO_THIRDS, XKE, XKMPER,
};
use crate::ephemeris::Prediction;
use crate::error::{SxpxError, SxpxWarning};
use crate::tle::{MeanElements, Tle};

const MAX_KEPLER_ITERATIONS: usize = 10;
const KEPLER_TOLERANCE: f64 = 1.0e-12;
/// Eccentricity margin below 1 at which the orbit counts as parabolic.
const PARABOLIC_MARGIN: f64 = 1.0e-6;

/// Mean motion and semi-major axis with the Kozai/Brouwer correction removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recovered {
    pub xnodp: f64,
    pub aodp: f64,
    pub cosio: f64,
    pub theta2: f64,
    pub x3thm1: f64,
    pub eosq: f64,
    pub betao2: f64,
    pub betao: f64,
}

/// Recovers original mean motion (`xnodp`) and semi-major axis (`aodp`) from
/// the input (Kozai) mean motion.
pub fn recover_mean_motion(mean: &MeanElements) -> Recovered {
    let a1 = (XKE / mean.xno).powf(TWO_THIRDS);
    let cosio = mean.xincl.cos();
    let theta2 = cosio * cosio;
    let x3thm1 = 3.0 * theta2 - 1.0;
    let eosq = mean.eo * mean.eo;
    let betao2 = 1.0 - eosq;
    let betao = betao2.sqrt();
    let del1 = 1.5 * CK2 * x3thm1 / (a1 * a1 * betao * betao2);
    let ao = a1 * (1.0 - del1 * (0.5 * TWO_THIRDS + del1 * (1.0 + 134.0 / 81.0 * del1)));
    let delo = 1.5 * CK2 * x3thm1 / (ao * ao * betao * betao2);
    Recovered {
        xnodp: mean.xno / (1.0 + delo),
        aodp: ao / (1.0 - delo),
        cosio,
        theta2,
        x3thm1,
        eosq,
        betao2,
        betao,
    }
}

/// Coefficients every SGP4/SDP4 propagation call reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonParams {
    pub aodp: f64,
    pub cosio: f64,
    pub sinio: f64,
    pub omgdot: f64,
    pub xmdot: f64,
    pub xnodot: f64,
    pub xnodp: f64,
    pub c1: f64,
    pub c4: f64,
    pub xnodcf: f64,
    pub t2cof: f64,
    pub xlcof: f64,
    pub aycof: f64,
    pub x3thm1: f64,
    pub x1mth2: f64,
    pub x7thm1: f64,
}

/// Intermediate values of [`init_common`] that only initialization needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitTerms {
    pub coef: f64,
    pub coef1: f64,
    pub tsi: f64,
    pub s4: f64,
    pub eta: f64,
    pub eosq: f64,
    pub betao: f64,
    pub betao2: f64,
    pub theta2: f64,
}

pub fn init_common(tle: &Tle, mean: &MeanElements) -> (CommonParams, InitTerms) {
    let rec = recover_mean_motion(mean);
    let Recovered {
        xnodp,
        aodp,
        cosio,
        theta2,
        x3thm1,
        eosq,
        betao2,
        betao,
    } = rec;

    // For perigee below 156 km, the values of s and qoms2t are altered
    let mut s4 = S_CONST;
    let mut qoms24 = QOMS2T;
    let perige = (aodp * (1.0 - mean.eo) - AE) * XKMPER;
    if perige < 156.0 {
        s4 = if perige <= 98.0 { 20.0 } else { perige - 78.0 };
        let temp_val = (120.0 - s4) * AE / XKMPER;
        let temp_val_squared = temp_val * temp_val;
        qoms24 = temp_val_squared * temp_val_squared;
        s4 = s4 / XKMPER + AE;
    }

    let pinv = 1.0 / (aodp * betao2);
    let pinvsq = pinv * pinv;
    let tsi = 1.0 / (aodp - s4);
    let eta = aodp * mean.eo * tsi;
    let etasq = eta * eta;
    let eeta = mean.eo * eta;
    let psisq = (1.0 - etasq).abs();
    let coef = qoms24 * tsi.powi(4);
    let coef1 = coef / psisq.powf(3.5);
    let c2 = coef1
        * xnodp
        * (aodp * (1.0 + 1.5 * etasq + eeta * (4.0 + etasq))
            + 0.75 * CK2 * tsi / psisq * x3thm1 * (8.0 + 3.0 * etasq * (8.0 + etasq)));
    let c1 = tle.bstar * c2;
    let sinio = mean.xincl.sin();
    let x1mth2 = 1.0 - theta2;
    let c4 = 2.0
        * xnodp
        * coef1
        * aodp
        * betao2
        * (eta * (2.0 + 0.5 * etasq) + mean.eo * (0.5 + 2.0 * etasq)
            - 2.0 * CK2 * tsi / (aodp * psisq)
                * (-3.0 * x3thm1 * (1.0 - 2.0 * eeta + etasq * (1.5 - 0.5 * eeta))
                    + 0.75 * x1mth2 * (2.0 * etasq - eeta * (1.0 + etasq))
                        * (2.0 * mean.omegao).cos()));
    let theta4 = theta2 * theta2;
    let temp1 = 3.0 * CK2 * pinvsq * xnodp;
    let temp2 = temp1 * CK2 * pinvsq;
    let temp3 = 1.25 * CK4 * pinvsq * pinvsq * xnodp;
    let xmdot = xnodp
        + 0.5 * temp1 * betao * x3thm1
        + 0.0625 * temp2 * betao * (13.0 - 78.0 * theta2 + 137.0 * theta4);
    let x1m5th = 1.0 - 5.0 * theta2;
    let omgdot = -0.5 * temp1 * x1m5th
        + 0.0625 * temp2 * (7.0 - 114.0 * theta2 + 395.0 * theta4)
        + temp3 * (3.0 - 36.0 * theta2 + 49.0 * theta4);
    let xhdot1 = -temp1 * cosio;
    let xnodot = xhdot1 + (0.5 * temp2 * (4.0 - 19.0 * theta2) + 2.0 * temp3 * (3.0 - 7.0 * theta2)) * cosio;

    // The (1 + cos i) divisor vanishes for retrograde equatorial orbits
    let one_plus_cosio = if (cosio + 1.0).abs() > 1.5e-12 {
        1.0 + cosio
    } else {
        1.5e-12
    };

    let params = CommonParams {
        aodp,
        cosio,
        sinio,
        omgdot,
        xmdot,
        xnodot,
        xnodp,
        c1,
        c4,
        xnodcf: 3.5 * betao2 * xhdot1 * c1,
        t2cof: 1.5 * c1,
        xlcof: 0.125 * A3OVK2 * sinio * (3.0 + 5.0 * cosio) / one_plus_cosio,
        aycof: 0.25 * A3OVK2 * sinio,
        x3thm1,
        x1mth2,
        x7thm1: 7.0 * theta2 - 1.0,
    };
    let terms = InitTerms {
        coef,
        coef1,
        tsi,
        s4,
        eta,
        eosq,
        betao,
        betao2,
        theta2,
    };
    (params, terms)
}

/// Orbit geometry warning for a semi-major axis and eccentricity, both in earth radii.
pub fn geometry_warning(a: f64, ecc: f64) -> Option<SxpxWarning> {
    if a * (1.0 + ecc) < 1.0 {
        Some(SxpxWarning::OrbitWithinEarth)
    } else if a * (1.0 - ecc) < 1.0 {
        Some(SxpxWarning::PerigeeWithinEarth)
    } else {
        None
    }
}

/// Elements after the secular (and, for deep space, periodic) updates.
#[derive(Debug, Clone, Copy)]
pub struct SecularState {
    pub xnode: f64,
    pub a: f64,
    pub ecc: f64,
    pub cosio: f64,
    pub sinio: f64,
    pub xincl: f64,
    pub omega: f64,
    pub xl: f64,
}

/// Long-period periodics, Kepler's equation, short-period periodics and the
/// orientation vectors. Position in km, velocity in km/min.
pub fn posn_vel(params: &CommonParams, state: &SecularState) -> Result<Prediction, SxpxError> {
    let SecularState {
        xnode,
        a,
        ecc,
        cosio,
        sinio,
        xincl,
        omega,
        xl,
    } = *state;

    if a < 0.0 {
        return Err(SxpxError::NegativeMajorAxis);
    }
    let xn = XKE / a.powf(1.5);

    // Long period periodics
    let axn = ecc * omega.cos();
    let temp = 1.0 / (a * (1.0 - ecc * ecc));
    let xll = temp * params.xlcof * axn;
    let aynl = temp * params.aycof;
    let xlt = xl + xll;
    let ayn = ecc * omega.sin() + aynl;
    let elsq = axn * axn + ayn * ayn;
    if elsq > 1.0 - PARABOLIC_MARGIN {
        return Err(SxpxError::NearlyParabolic);
    }
    let warning = geometry_warning(a, ecc);
    let capu = centralize_angle(xlt - xnode);

    // Solve Kepler's equation
    let mut epw = capu;
    let mut sin_epw = 0.0;
    let mut cos_epw = 1.0;
    let mut ecos_e = 0.0;
    let mut esin_e = 0.0;
    for i in 0..MAX_KEPLER_ITERATIONS {
        sin_epw = epw.sin();
        cos_epw = epw.cos();
        ecos_e = axn * cos_epw + ayn * sin_epw;
        esin_e = axn * sin_epw - ayn * cos_epw;
        let f = capu - epw + esin_e;
        if f.abs() < KEPLER_TOLERANCE {
            break;
        }
        let fdot = 1.0 - ecos_e;
        let mut delta_epw = f / fdot;
        if i == 0 {
            let max_newton_raphson = 1.25 * ecc.abs();
            delta_epw = delta_epw.clamp(-max_newton_raphson, max_newton_raphson);
        } else {
            delta_epw = f / (fdot + 0.5 * esin_e * delta_epw);
        }
        epw += delta_epw;
    }

    // Short period preliminary quantities
    let temp = 1.0 - elsq;
    let pl = a * temp;
    let r = a * (1.0 - ecos_e);
    let temp1 = 1.0 / r;
    let rdot = XKE * a.sqrt() * esin_e * temp1;
    let rfdot = XKE * pl.sqrt() * temp1;
    let temp2 = a * temp1;
    let betal = temp.sqrt();
    let temp3 = 1.0 / (1.0 + betal);
    let cosu = temp2 * (cos_epw - axn + ayn * esin_e * temp3);
    let sinu = temp2 * (sin_epw - ayn - axn * esin_e * temp3);
    let u = sinu.atan2(cosu);
    let sin2u = 2.0 * sinu * cosu;
    let cos2u = 2.0 * cosu * cosu - 1.0;
    let temp = 1.0 / pl;
    let temp1 = CK2 * temp;
    let temp2 = temp1 * temp;

    let x3thm1 = 3.0 * cosio * cosio - 1.0;
    let x1mth2 = 1.0 - cosio * cosio;
    let x7thm1 = 7.0 * cosio * cosio - 1.0;

    // Update for short periodics
    let rk = r * (1.0 - 1.5 * temp2 * betal * x3thm1) + 0.5 * temp1 * x1mth2 * cos2u;
    let uk = u - 0.25 * temp2 * x7thm1 * sin2u;
    let xnodek = xnode + 1.5 * temp2 * cosio * sin2u;
    let xinck = xincl + 1.5 * temp2 * cosio * sinio * cos2u;
    let rdotk = rdot - xn * temp1 * x1mth2 * sin2u;
    let rfdotk = rfdot + xn * temp1 * (x1mth2 * cos2u + 1.5 * x3thm1);

    Ok(orient(rk, uk, xnodek, xinck, rdotk, rfdotk, warning))
}

/// Builds position and velocity from radius, argument of latitude, node and
/// inclination, with radial and transverse rates in earth radii per minute.
pub(crate) fn orient(
    rk: f64,
    uk: f64,
    xnodek: f64,
    xinck: f64,
    rdotk: f64,
    rfdotk: f64,
    warning: Option<SxpxWarning>,
) -> Prediction {
    let (sinuk, cosuk) = uk.sin_cos();
    let (sinik, cosik) = xinck.sin_cos();
    let (sinnok, cosnok) = xnodek.sin_cos();
    let xmx = -sinnok * cosik;
    let xmy = cosnok * cosik;
    let u = Vector3::new(
        xmx * sinuk + cosnok * cosuk,
        xmy * sinuk + sinnok * cosuk,
        sinik * sinuk,
    );
    let v = Vector3::new(
        xmx * cosuk - cosnok * sinuk,
        xmy * cosuk - sinnok * sinuk,
        sinik * cosuk,
    );
    Prediction {
        position: u * (rk * XKMPER),
        velocity: (u * rdotk + v * rfdotk) * XKMPER,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::parse_elements;
    use approx::assert_relative_eq;

    fn reference_tle() -> Tle {
        parse_elements(
            "1 88888U          80275.98708465  .00073094  13844-3  66816-4 0    87",
            "2 88888  72.8435 115.9689 0086731  52.6988 110.5714 16.05824518  1058",
        )
        .unwrap()
        .tle
    }

    #[test]
    fn recovered_mean_motion_is_slightly_lower() {
        let tle = reference_tle();
        let mean = tle.mean().unwrap();
        let rec = recover_mean_motion(mean);
        assert!(rec.xnodp < mean.xno);
        assert_relative_eq!(rec.xnodp, mean.xno, max_relative = 1e-3);
        // Kepler's third law in earth radii and minutes
        assert_relative_eq!(rec.aodp, (XKE / rec.xnodp).powf(TWO_THIRDS), max_relative = 1e-3);
    }

    #[test]
    fn kernel_rejects_negative_axis_and_parabolic_orbits() {
        let tle = reference_tle();
        let (params, _) = init_common(&tle, tle.mean().unwrap());
        let mut state = SecularState {
            xnode: 1.0,
            a: -1.1,
            ecc: 0.01,
            cosio: params.cosio,
            sinio: params.sinio,
            xincl: 1.27,
            omega: 0.9,
            xl: 2.0,
        };
        assert_eq!(posn_vel(&params, &state).unwrap_err(), SxpxError::NegativeMajorAxis);
        state.a = 1.1;
        state.ecc = 0.9999999;
        assert_eq!(posn_vel(&params, &state).unwrap_err(), SxpxError::NearlyParabolic);
    }

    #[test]
    fn kernel_flags_orbits_inside_the_earth() {
        let tle = reference_tle();
        let (params, _) = init_common(&tle, tle.mean().unwrap());
        let mut state = SecularState {
            xnode: 1.0,
            a: 0.9,
            ecc: 0.01,
            cosio: params.cosio,
            sinio: params.sinio,
            xincl: 1.27,
            omega: 0.9,
            xl: 2.0,
        };
        let pred = posn_vel(&params, &state).unwrap();
        assert_eq!(pred.warning, Some(SxpxWarning::OrbitWithinEarth));
        state.a = 1.05;
        state.ecc = 0.1;
        let pred = posn_vel(&params, &state).unwrap();
        assert_eq!(pred.warning, Some(SxpxWarning::PerigeeWithinEarth));
        assert!(pred.position.norm() > 0.0);
    }

    #[test]
    fn circular_orbit_radius_and_speed() {
        let tle = reference_tle();
        let (params, _) = init_common(&tle, tle.mean().unwrap());
        let state = SecularState {
            xnode: 0.3,
            a: 1.2,
            ecc: 1e-6,
            cosio: params.cosio,
            sinio: params.sinio,
            xincl: 1.27,
            omega: 0.0,
            xl: 0.7,
        };
        let pred = posn_vel(&params, &state).unwrap();
        assert_eq!(pred.warning, None);
        assert_relative_eq!(pred.position.norm(), 1.2 * XKMPER, max_relative = 2e-3);
        let circular_speed = XKE / 1.2f64.sqrt() * XKMPER;
        assert_relative_eq!(pred.velocity.norm(), circular_speed, max_relative = 2e-3);
        assert!(pred.position.dot(&pred.velocity).abs() / (pred.position.norm() * pred.velocity.norm()) < 1e-2);
    }
}
