use approx::assert_relative_eq;
use nalgebra::Vector3;

use sxpx::constants::{TWO_PI, XKMPER};
use sxpx::observe::get_satellite_ra_dec_delta;
use sxpx::{
    parse_elements, read_tle_str, select_ephemeris, write_elements_in_tle_format, AnyPropagator, DeepConfig,
    Elements, EphemerisClass, Model, Propagator, Sdp4, Sgp4, SxpxError, Tle,
};

const ISS_NAME: &str = "ISS (ZARYA)";
const ISS_LINE1: &str = "1 25544U 98067A   20148.21301450  .00001715  00000-0  38778-4 0  9992";
const ISS_LINE2: &str = "2 25544  51.6435  92.2789 0002570 358.0648 144.9972 15.49396855228767";

fn iss() -> Tle {
    parse_elements(ISS_LINE1, ISS_LINE2).unwrap().tle
}

fn with_mean_motion(mut tle: Tle, revs_per_day: f64, eo: f64) -> Tle {
    if let Elements::Mean(mean) = &mut tle.elements {
        mean.xno = revs_per_day * TWO_PI / 1440.0;
        mean.eo = eo;
    }
    tle
}

#[test]
fn catalog_text_round_trips_through_the_writer() {
    let text = format!("{}\n{}\n{}\n", ISS_NAME, ISS_LINE1, ISS_LINE2);
    let read = read_tle_str(&text);
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].name.as_deref(), Some(ISS_NAME));
    assert_eq!(write_elements_in_tle_format(&read[0].tle), format!("{}\n{}", ISS_LINE1, ISS_LINE2));
}

#[test]
fn leo_radius_at_epoch_is_plausible() {
    for model in [Model::Sgp, Model::Sgp4, Model::Sgp8] {
        let mut prop = AnyPropagator::new(model, &iss(), DeepConfig::default()).unwrap();
        let r = prop.propagate(0.0).unwrap().position.norm();
        assert!(r > XKMPER + 150.0 && r < XKMPER + 3000.0, "{}: r = {}", model, r);
    }
}

#[test]
fn selector_classes() {
    assert_eq!(select_ephemeris(&iss()), Ok(EphemerisClass::NearEarth));
    assert_eq!(select_ephemeris(&with_mean_motion(iss(), 1.0027, 0.0002)), Ok(EphemerisClass::DeepSpace));
    assert_eq!(select_ephemeris(&with_mean_motion(iss(), 2.006, 0.72)), Ok(EphemerisClass::DeepSpace));
    assert_eq!(
        select_ephemeris(&with_mean_motion(iss(), 15.5, 1.0)),
        Err(SxpxError::InvalidElements)
    );
}

#[test]
fn runaway_drag_ends_in_an_error() {
    let mut tle = iss();
    tle.bstar = 0.9;
    let mut sgp4 = Sgp4::new(&tle).unwrap();
    let err = (1..=400)
        .map(|day| sgp4.propagate(day as f64 * 1440.0))
        .find_map(Result::err)
        .unwrap();
    assert!(matches!(err, SxpxError::NegativeMajorAxis | SxpxError::NearlyParabolic));
    assert!(err.code() < 0);
}

#[test]
fn resonant_forward_steps_match_a_direct_jump() {
    let mut tle = with_mean_motion(iss(), 1.0027, 0.0002);
    tle.bstar = 0.0;
    let config = DeepConfig::default();
    let mut stepped = Sdp4::new(&tle, config).unwrap();
    assert!(stepped.deep_args().unwrap().is_synchronous());
    for t in [1000.0, 2500.0, 4000.0] {
        stepped.propagate(t).unwrap();
    }
    let stepped = stepped.propagate(5000.0).unwrap();
    let direct = Sdp4::new(&tle, config).unwrap().propagate(5000.0).unwrap();
    assert!((stepped.position - direct.position).norm() < 1.0);
}

#[test]
fn observer_unit_axis_offsets() {
    let observer = Vector3::new(-3000.0, 4000.0, 2500.0);
    let look = get_satellite_ra_dec_delta(&observer, &(observer + Vector3::y()));
    assert_relative_eq!(look.delta, 1.0, epsilon = 1e-9);
    assert_relative_eq!(look.ra, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    assert_relative_eq!(look.dec, 0.0, epsilon = 1e-9);
}

#[test]
fn sgp4_agrees_with_the_sgp4_crate() {
    let elements = sgp4::Elements::from_tle(
        Some(ISS_NAME.to_string()),
        ISS_LINE1.as_bytes(),
        ISS_LINE2.as_bytes(),
    )
    .unwrap();
    let constants = sgp4::Constants::from_elements_afspc_compatibility_mode(&elements).unwrap();
    let mut ours = Sgp4::new(&iss()).unwrap();
    for hours in 0..24 {
        let t = hours as f64 * 60.0;
        let theirs = constants.propagate(sgp4::MinutesSinceEpoch(t)).unwrap();
        let mine = ours.propagate(t).unwrap();
        let theirs_pos = Vector3::from(theirs.position);
        assert!((mine.position - theirs_pos).norm() < 1.0, "t = {} min", t);
    }
}

#[test]
fn sdp4_reference_vector_at_epoch() {
    let tle = parse_elements(
        "1 11801U          80230.29629788  .01431103  00000-0  14311-1 0    13",
        "2 11801  46.7916 230.4354 7318036  47.4722  10.4117  2.28537848    13",
    )
    .unwrap()
    .tle;
    let mut prop = AnyPropagator::new(Model::Sgp4.for_tle(&tle).unwrap(), &tle, DeepConfig::default()).unwrap();
    assert_eq!(prop.model(), Model::Sdp4);
    let pred = prop.propagate(0.0).unwrap();
    let expected = Vector3::new(7473.37066650, 428.95261765, 5828.74786377);
    assert!((pred.position - expected).norm() < 0.1);
}
