//! SGP4, the standard near-earth model.

use crate::common::{init_common, posn_vel, CommonParams, SecularState};
use crate::constants::{A3OVK2, AE, ECC_EPS, TWO_THIRDS, XKMPER};
use crate::ephemeris::{Prediction, Propagator};
use crate::error::SxpxError;
use crate::tle::{MeanElements, Tle};

/// Perigee height (km) below which the truncated drag terms are used.
const SIMPLE_PERIGEE_KM: f64 = 220.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Sgp4 {
    mean: MeanElements,
    bstar: f64,
    common: CommonParams,
    eta: f64,
    c5: f64,
    omgcof: f64,
    xmcof: f64,
    delmo: f64,
    sinmo: f64,
    d2: f64,
    d3: f64,
    d4: f64,
    t3cof: f64,
    t4cof: f64,
    t5cof: f64,
    simple: bool,
}

impl Sgp4 {
    pub fn new(tle: &Tle) -> Result<Self, SxpxError> {
        let mean = *tle.mean().ok_or(SxpxError::StateVectorElements)?;
        let (common, init) = init_common(tle, &mean);
        let aodp = common.aodp;
        let c1 = common.c1;
        let eeta = mean.eo * init.eta;
        let etasq = init.eta * init.eta;

        let simple = aodp * (1.0 - mean.eo) / AE < SIMPLE_PERIGEE_KM / XKMPER + AE;

        let (omgcof, xmcof) = if mean.eo > 1.0e-4 {
            let c3 = init.coef * init.tsi * A3OVK2 * common.xnodp * AE * common.sinio / mean.eo;
            (
                tle.bstar * c3 * mean.omegao.cos(),
                -TWO_THIRDS * init.coef * tle.bstar * AE / eeta,
            )
        } else {
            (0.0, 0.0)
        };
        let c5 = 2.0 * init.coef1 * aodp * init.betao2 * (1.0 + 2.75 * (etasq + eeta) + eeta * etasq);
        let delmo = (1.0 + init.eta * mean.xmo.cos()).powi(3);

        let mut sgp4 = Sgp4 {
            mean,
            bstar: tle.bstar,
            common,
            eta: init.eta,
            c5,
            omgcof,
            xmcof,
            delmo,
            sinmo: mean.xmo.sin(),
            d2: 0.0,
            d3: 0.0,
            d4: 0.0,
            t3cof: 0.0,
            t4cof: 0.0,
            t5cof: 0.0,
            simple,
        };
        if !simple {
            let c1sq = c1 * c1;
            sgp4.d2 = 4.0 * aodp * init.tsi * c1sq;
            let temp = sgp4.d2 * init.tsi * c1 / 3.0;
            sgp4.d3 = (17.0 * aodp + init.s4) * temp;
            sgp4.d4 = 0.5 * temp * aodp * init.tsi * (221.0 * aodp + 31.0 * init.s4) * c1;
            sgp4.t3cof = sgp4.d2 + 2.0 * c1sq;
            sgp4.t4cof = 0.25 * (3.0 * sgp4.d3 + c1 * (12.0 * sgp4.d2 + 10.0 * c1sq));
            sgp4.t5cof = 0.2
                * (3.0 * sgp4.d4
                    + 12.0 * c1 * sgp4.d3
                    + 6.0 * sgp4.d2 * sgp4.d2
                    + 15.0 * c1sq * (2.0 * sgp4.d2 + c1sq));
        }
        Ok(sgp4)
    }

    /// True when perigee is low enough that the higher-order drag terms are skipped.
    pub fn is_simple(&self) -> bool {
        self.simple
    }
}

impl Propagator for Sgp4 {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        let mean = &self.mean;
        let p = &self.common;

        // Secular gravity and atmospheric drag
        let xmdf = mean.xmo + p.xmdot * tsince;
        let omgadf = mean.omegao + p.omgdot * tsince;
        let xnoddf = mean.xnodeo + p.xnodot * tsince;
        let tsq = tsince * tsince;
        let xnode = xnoddf + p.xnodcf * tsq;
        let mut omega = omgadf;
        let mut xmp = xmdf;
        let mut tempa = 1.0 - p.c1 * tsince;
        let mut tempe = self.bstar * p.c4 * tsince;
        let mut templ = p.t2cof * tsq;
        if !self.simple {
            let delomg = self.omgcof * tsince;
            let delm = self.xmcof * ((1.0 + self.eta * xmdf.cos()).powi(3) - self.delmo);
            let temp = delomg + delm;
            xmp = xmdf + temp;
            omega = omgadf - temp;
            let tcube = tsq * tsince;
            let tfour = tsince * tcube;
            tempa = tempa - self.d2 * tsq - self.d3 * tcube - self.d4 * tfour;
            tempe += self.bstar * self.c5 * (xmp.sin() - self.sinmo);
            templ += self.t3cof * tcube + tfour * (self.t4cof + tsince * self.t5cof);
        }

        let mut a = p.aodp * tempa * tempa;
        let e = (mean.eo - tempe).max(ECC_EPS);
        let xl = xmp + omega + xnode + p.xnodp * templ;
        // A negative tempa means drag has taken the orbit through zero size
        if tempa < 0.0 {
            a = -a;
        }

        posn_vel(
            p,
            &SecularState {
                xnode,
                a,
                ecc: e,
                cosio: p.cosio,
                sinio: p.sinio,
                xincl: mean.xincl,
                omega,
                xl,
            },
        )
    }
}
