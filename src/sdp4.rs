//! SDP4: SGP4 secular terms plus lunar-solar and resonance corrections for
//! orbits with periods of 225 minutes or more.

use crate::common::{init_common, posn_vel, CommonParams, SecularState};
use crate::constants::{ECC_EPS, TWO_THIRDS, XKE};
use crate::deep::{DeepArgs, DeepConfig, DeepSeed, DeepState};
use crate::ephemeris::{Prediction, Propagator};
use crate::error::SxpxError;
use crate::numerical_integration::ThreeBody;
use crate::tle::{MeanElements, Tle};

use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
struct Analytic {
    mean: MeanElements,
    bstar: f64,
    common: CommonParams,
    deep: DeepArgs,
}

#[derive(Debug, Clone, PartialEq)]
enum Method {
    Analytic(Analytic),
    /// 'H' element sets carry a state vector and are integrated directly.
    Integrated(ThreeBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sdp4 {
    method: Method,
}

impl Sdp4 {
    pub fn new(tle: &Tle, config: DeepConfig) -> Result<Self, SxpxError> {
        if let Some(sv) = tle.state_vector() {
            return Ok(Sdp4 {
                method: Method::Integrated(ThreeBody::new(tle.epoch, sv)),
            });
        }
        let mean = *tle.mean().ok_or(SxpxError::InvalidElements)?;
        let (common, init) = init_common(tle, &mean);
        let seed = DeepSeed {
            eosq: init.eosq,
            sinio: common.sinio,
            cosio: common.cosio,
            betao: init.betao,
            aodp: common.aodp,
            theta2: init.theta2,
            sing: mean.omegao.sin(),
            cosg: mean.omegao.cos(),
            betao2: init.betao2,
            xmdot: common.xmdot,
            omgdot: common.omgdot,
            xnodot: common.xnodot,
            xnodp: common.xnodp,
        };
        let deep = DeepArgs::init(tle.epoch, &mean, &seed, config);
        Ok(Sdp4 {
            method: Method::Analytic(Analytic {
                mean,
                bstar: tle.bstar,
                common,
                deep,
            }),
        })
    }

    /// Resonance and periodic state, absent for integrated state vectors.
    pub fn deep_args(&self) -> Option<&DeepArgs> {
        match &self.method {
            Method::Analytic(analytic) => Some(&analytic.deep),
            Method::Integrated(_) => None,
        }
    }
}

impl Analytic {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        let mean = &self.mean;
        let p = &self.common;

        // Secular gravity and atmospheric drag
        let xmdf = mean.xmo + p.xmdot * tsince;
        let omgadf = mean.omegao + p.omgdot * tsince;
        let xnoddf = mean.xnodeo + p.xnodot * tsince;
        let tsq = tsince * tsince;
        let tempa = 1.0 - p.c1 * tsince;
        let tempe = self.bstar * p.c4 * tsince;
        let templ = p.t2cof * tsq;

        let mut state = DeepState {
            xll: xmdf,
            omgadf,
            xnode: xnoddf + p.xnodcf * tsq,
            em: mean.eo,
            xinc: mean.xincl,
            xn: p.xnodp,
        };
        self.deep.dpsec(&mut state, tsince);
        if state.xn <= 0.0 {
            return Err(SxpxError::NegativeXn);
        }

        let mut a = (XKE / state.xn).powf(TWO_THIRDS) * tempa * tempa;
        state.em -= tempe;
        state.xll += p.xnodp * templ;

        self.deep.dpper(&mut state, tsince);
        if state.xinc < 0.0 {
            state.xinc = -state.xinc;
            state.xnode += PI;
            state.omgadf -= PI;
        }
        let e = state.em.max(ECC_EPS);
        let xl = state.xll + state.omgadf + state.xnode;
        if tempa < 0.0 {
            a = -a;
        }

        let (sinio, cosio) = state.xinc.sin_cos();
        posn_vel(
            p,
            &SecularState {
                xnode: state.xnode,
                a,
                ecc: e,
                cosio,
                sinio,
                xincl: state.xinc,
                omega: state.omgadf,
                xl,
            },
        )
    }
}

impl Propagator for Sdp4 {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        match &mut self.method {
            Method::Analytic(analytic) => analytic.propagate(tsince),
            Method::Integrated(body) => body.propagate(tsince),
        }
    }
}
