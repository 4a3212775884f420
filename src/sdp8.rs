//! SDP8: the SGP8 formulation with lunar-solar and resonance corrections.

use crate::constants::{fmod2p, TWO_THIRDS};
use crate::deep::{DeepArgs, DeepConfig, DeepSeed, DeepState};
use crate::ephemeris::{Prediction, Propagator};
use crate::error::SxpxError;
use crate::sgp8::{sgp8_posn_vel, Sgp8Base, Sgp8State};
use crate::tle::{MeanElements, Tle};

#[derive(Debug, Clone, PartialEq)]
pub struct Sdp8 {
    mean: MeanElements,
    base: Sgp8Base,
    edot: f64,
    deep: DeepArgs,
}

impl Sdp8 {
    pub fn new(tle: &Tle, config: DeepConfig) -> Result<Self, SxpxError> {
        let mean = *tle.mean().ok_or(SxpxError::StateVectorElements)?;
        let base = Sgp8Base::new(tle, &mean);
        let seed = DeepSeed {
            eosq: base.eosq,
            sinio: base.sini,
            cosio: base.cosi,
            betao: base.betao,
            aodp: base.aodp,
            theta2: base.theta2,
            sing: base.sing,
            cosg: base.cosg,
            betao2: base.betao2,
            xmdot: base.xlldot,
            omgdot: base.omgdt,
            xnodot: base.xnodot,
            xnodp: base.xnodp,
        };
        let deep = DeepArgs::init(tle.epoch, &mean, &seed, config);
        Ok(Sdp8 {
            mean,
            base,
            edot: -TWO_THIRDS * base.xndtn * (1.0 - mean.eo),
            deep,
        })
    }

    pub fn deep_args(&self) -> &DeepArgs {
        &self.deep
    }
}

impl Propagator for Sdp8 {
    fn propagate(&mut self, tsince: f64) -> Result<Prediction, SxpxError> {
        let mean = &self.mean;
        let base = &self.base;

        // Secular gravity and atmospheric drag
        let z1 = 0.5 * base.xndt * tsince * tsince;
        let z7 = 3.5 * TWO_THIRDS * z1 / base.xnodp;
        let mut state = DeepState {
            xll: mean.xmo + base.xlldot * tsince,
            omgadf: mean.omegao + base.omgdt * tsince + z7 * base.xgdt1,
            xnode: mean.xnodeo + base.xnodot * tsince + z7 * base.xhdt1,
            em: mean.eo,
            xinc: mean.xincl,
            xn: base.xnodp,
        };
        self.deep.dpsec(&mut state, tsince);
        state.xn += base.xndt * tsince;
        state.em += self.edot * tsince;
        state.xll += z1 + z7 * base.xmdt1;

        self.deep.dpper(&mut state, tsince);
        let base = base.with_inclination(state.xinc);
        sgp8_posn_vel(
            &base,
            &Sgp8State {
                xmam: fmod2p(state.xll),
                omgasm: state.omgadf,
                xnodes: state.xnode,
                xn: state.xn,
                em: state.em,
            },
        )
    }
}
