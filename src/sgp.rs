//! SGP, the original and least accurate of the near-earth models.

use crate::common::{geometry_warning, orient};
use crate::constants::{fmod2p, AE, CK2, E6A, TWO_THIRDS, XJ3, XKE};
use crate::ephemeris::{Prediction, Propagator};
use crate::error::SxpxError;
use crate::tle::{MeanElements, Tle};

const MAX_KEPLER_ITERATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Sgp {
    mean: MeanElements,
    xndt2o: f64,
    xndd6o: f64,
    ao: f64,
    qo: f64,
    xlo: f64,
    d1o: f64,
    d2o: f64,
    d3o: f64,
    d4o: f64,
    omgdt: f64,
    xnodot: f64,
    c5: f64,
    c6: f64,
}

impl Sgp {
    pub fn new(tle: &Tle) -> Result<Self, SxpxError> {
        let mean = *tle.mean().ok_or(SxpxError::StateVectorElements)?;
        let c1 = CK2 * 1.5;
        let c2 = CK2 / 4.0;
        let c3 = CK2 / 2.0;
        let c4 = XJ3 * AE * AE * AE / (CK2 * 4.0);
        let cosio = mean.xincl.cos();
        let sinio = mean.xincl.sin();
        let a1 = (XKE / mean.xno).powf(TWO_THIRDS);
        let d1 = c1 / a1 / a1 * (3.0 * cosio * cosio - 1.0) / (1.0 - mean.eo * mean.eo).powf(1.5);
        let ao = a1 * (1.0 - d1 / 3.0 - d1 * d1 - 134.0 / 81.0 * d1 * d1 * d1);
        let po = ao * (1.0 - mean.eo * mean.eo);
        let qo = ao * (1.0 - mean.eo);
        let d3o = c1 * cosio;
        let po2no = mean.xno / (po * po);
        let one_plus_cosio = (1.0 + cosio).max(1.5e-12);

        Ok(Sgp {
            mean,
            xndt2o: tle.xndt2o,
            xndd6o: tle.xndd6o,
            ao,
            qo,
            xlo: mean.xmo + mean.omegao + mean.xnodeo,
            d1o: c3 * sinio * sinio,
            d2o: c2 * (7.0 * cosio * cosio - 1.0),
            d3o,
            d4o: d3o * sinio,
            omgdt: c1 * po2no * (5.0 * cosio * cosio - 1.0),
            xnodot: -2.0 * d3o * po2no,
            c5: 0.5 * c4 * sinio * (3.0 + 5.0 * cosio) / one_plus_cosio,
            c6: c4 * sinio,
        })
    }
}

impl Propagator for Sgp {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        let mean = &self.mean;

        // Secular gravity and atmospheric drag
        let xn = mean.xno + (2.0 * self.xndt2o + 3.0 * self.xndd6o * tsince) * tsince;
        if xn <= 0.0 {
            return Err(SxpxError::NegativeXn);
        }
        let a = self.ao * (mean.xno / xn).powf(TWO_THIRDS);
        let e = if a > self.qo { 1.0 - self.qo / a } else { E6A };
        let p = a * (1.0 - e * e);
        if p <= 0.0 {
            return Err(SxpxError::NearlyParabolic);
        }
        let warning = geometry_warning(a, e);
        let xnodes = mean.xnodeo + self.xnodot * tsince;
        let omgas = mean.omegao + self.omgdt * tsince;
        let xls = fmod2p(
            self.xlo
                + (mean.xno + self.omgdt + self.xnodot + (self.xndt2o + self.xndd6o * tsince) * tsince)
                    * tsince,
        );

        // Long period periodics
        let axnsl = e * omgas.cos();
        let aynsl = e * omgas.sin() - self.c6 / p;
        let el2 = axnsl * axnsl + aynsl * aynsl;
        if el2 > 1.0 - E6A {
            return Err(SxpxError::NearlyParabolic);
        }
        let xl = fmod2p(xls - self.c5 / p * axnsl);

        // Kepler's equation, with each Newton step limited to one radian
        let u = fmod2p(xl - xnodes);
        let mut eo1 = u;
        let mut tem5: f64 = 1.0;
        let mut sineo1 = eo1.sin();
        let mut coseo1 = eo1.cos();
        for _ in 0..MAX_KEPLER_ITERATIONS {
            if tem5.abs() < E6A {
                break;
            }
            tem5 = 1.0 - coseo1 * axnsl - sineo1 * aynsl;
            tem5 = (u - aynsl * coseo1 + axnsl * sineo1 - eo1) / tem5;
            tem5 = tem5.clamp(-1.0, 1.0);
            eo1 += tem5;
            sineo1 = eo1.sin();
            coseo1 = eo1.cos();
        }

        // Short period preliminary quantities
        let ecose = axnsl * coseo1 + aynsl * sineo1;
        let esine = axnsl * sineo1 - aynsl * coseo1;
        let pl = a * (1.0 - el2);
        let pl2 = pl * pl;
        let r = a * (1.0 - ecose);
        let rdot = XKE * a.sqrt() / r * esine;
        let rvdot = XKE * pl.sqrt() / r;
        let temp = esine / (1.0 + (1.0 - el2).sqrt());
        let sinu = a / r * (sineo1 - aynsl - axnsl * temp);
        let cosu = a / r * (coseo1 - axnsl + aynsl * temp);
        let su = sinu.atan2(cosu);

        // Short periodics
        let sin2u = (cosu + cosu) * sinu;
        let cos2u = 1.0 - 2.0 * sinu * sinu;
        let rk = r + self.d1o / pl * cos2u;
        let uk = su - self.d2o / pl2 * sin2u;
        let xnodek = xnodes + self.d3o * sin2u / pl2;
        let xinck = mean.xincl + self.d4o / pl2 * cos2u;

        Ok(orient(rk, uk, xnodek, xinck, rdot, rvdot, warning))
    }
}
