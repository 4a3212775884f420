//! Writing element records back out as fixed-column two-line element text.

use std::fmt;
use std::fmt::Write;

use log::warn;

use crate::constants::{fmod2p, MINUTES_PER_DAY, TWO_PI};
use crate::datetime_util::jd_to_year_and_day;
use crate::read::{compute_checksum, HEX_POSITION_TO_KM, HEX_VELOCITY_TO_KM_MIN};
use crate::tle::{Elements, MeanElements, StateVectorElements, Tle};

/// Assumed-decimal-point notation, eight columns: `" 13844-3"` for `0.13844e-3`.
fn put_sci(value: f64) -> String {
    if value == 0.0 {
        return " 00000-0".to_string();
    }
    let sign = if value < 0.0 { '-' } else { ' ' };
    let magnitude = value.abs();

    let mut exp = magnitude.log10().floor() as i32 + 1;
    let mut mantissa = (magnitude / 10f64.powi(exp) * 1e5).round() as i64;
    if mantissa >= 100_000 {
        mantissa = (mantissa + 5) / 10;
        exp += 1;
    }
    if exp < -9 {
        return " 00000-0".to_string();
    }
    if exp > 9 {
        mantissa = 99_999;
        exp = 9;
    }
    let exp_sign = if exp < 0 { '-' } else { '+' };
    format!("{}{:05}{}{}", sign, mantissa, exp_sign, exp.abs())
}

/// Five-column catalog number, Alpha-5 above 99999. `None` past Z9999.
fn catalog_number(n: u32) -> Option<String> {
    const LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    if n < 100_000 {
        return Some(format!("{:05}", n));
    }
    let lead = (n / 10_000) as usize;
    LETTERS
        .get(lead - 10)
        .map(|&letter| format!("{}{:04}", letter as char, n % 10_000))
}

/// Unrepresentable numbers are written as asterisks so the line will not parse back.
fn catalog_field(n: u32) -> String {
    catalog_number(n).unwrap_or_else(|| {
        warn!("catalog number {} does not fit in five columns", n);
        "*****".to_string()
    })
}

/// Mean motion in revolutions/day, eleven columns, dropping decimals as the integer part grows.
fn mean_motion_field(revs_per_day: f64) -> String {
    for precision in (0..=8).rev() {
        let field = format!("{:11.*}", precision, revs_per_day);
        if field.len() == 11 {
            return field;
        }
    }
    warn!("mean motion {} rev/day does not fit in eleven columns", revs_per_day);
    "*".repeat(11)
}

fn with_checksum(mut line: String) -> String {
    let digit = compute_checksum(&line);
    line.push((b'0' + digit) as char);
    line
}

pub fn write_line1(tle: &Tle) -> String {
    let mut line1 = String::with_capacity(70);
    let (year, day) = jd_to_year_and_day(tle.epoch);

    let first_dt = tle.xndt2o * MINUTES_PER_DAY * MINUTES_PER_DAY / TWO_PI;
    let first_dt_sign = if first_dt < 0.0 { '-' } else { ' ' };
    let first_dt_digits = ((first_dt.abs() * 1e8 + 0.5) as u64).min(99_999_999);
    let second_dt = tle.xndd6o * MINUTES_PER_DAY * MINUTES_PER_DAY * MINUTES_PER_DAY / TWO_PI;

    let intl_desig: String = tle.intl_desig.chars().take(8).collect();

    // String formatting cannot fail
    let _ = write!(
        &mut line1,
        "1 {}{} {:<8} {:02}{:012.8} {}.{:08} {} {} {} {:>4}",
        catalog_field(tle.norad_number),
        tle.classification,
        intl_desig,
        year % 100,
        day,
        first_dt_sign,
        first_dt_digits,
        put_sci(second_dt),
        put_sci(tle.bstar),
        tle.ephemeris_type,
        tle.bulletin_number % 10_000
    );
    with_checksum(line1)
}

fn mean_element_columns(line2: &mut String, mean: &MeanElements) {
    let eccentricity = ((mean.eo * 1e7 + 0.5) as u64).min(9_999_999);
    let _ = write!(
        line2,
        "{:8.4} {:8.4} {:07} {:8.4} {:8.4} {}",
        mean.xincl.to_degrees(),
        fmod2p(mean.xnodeo).to_degrees(),
        eccentricity,
        fmod2p(mean.omegao).to_degrees(),
        fmod2p(mean.xmo).to_degrees(),
        mean_motion_field(mean.xno * MINUTES_PER_DAY / TWO_PI)
    );
}

fn hex_field(value: f64) -> String {
    let raw = value.round() as i64;
    let sign = if raw < 0 { '-' } else { '+' };
    format!("{}{:08X}", sign, raw.unsigned_abs().min(0xFFFF_FFFF))
}

fn state_vector_columns(line2: &mut String, sv: &StateVectorElements) {
    let position = sv.position_km / HEX_POSITION_TO_KM;
    let velocity = sv.velocity_km_min / HEX_VELOCITY_TO_KM_MIN;
    for value in position.iter().chain(velocity.iter()) {
        line2.push_str(&hex_field(*value));
    }
    line2.push(' ');
}

pub fn write_line2(tle: &Tle) -> String {
    let mut line2 = String::with_capacity(70);
    let _ = write!(&mut line2, "2 {} ", catalog_field(tle.norad_number));
    match &tle.elements {
        Elements::Mean(mean) => mean_element_columns(&mut line2, mean),
        Elements::StateVector(sv) => state_vector_columns(&mut line2, sv),
    }
    let _ = write!(&mut line2, "{:>5}", tle.revolution_number % 100_000);
    with_checksum(line2)
}

/// Both lines, separated by a newline, each 69 columns including the checksum.
pub fn write_elements_in_tle_format(tle: &Tle) -> String {
    format!("{}\n{}", write_line1(tle), write_line2(tle))
}

impl fmt::Display for Tle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write_elements_in_tle_format(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::{parse_elements, tle_checksum};
    use nalgebra::Vector3;

    const SETS: [(&str, &str); 3] = [
        (
            "1 88888U          80275.98708465  .00073094  13844-3  66816-4 0    87",
            "2 88888  72.8435 115.9689 0086731  52.6988 110.5714 16.05824518  1058",
        ),
        (
            "1 25544U 98067A   20148.21301450  .00001715  00000-0  38778-4 0  9992",
            "2 25544  51.6435  92.2789 0002570 358.0648 144.9972 15.49396855228767",
        ),
        (
            "1 11801U          80230.29629788  .01431103  00000-0  14311-1 0    13",
            "2 11801  46.7916 230.4354 7318036  47.4722  10.4117  2.28537848    13",
        ),
    ];

    #[test]
    fn reproduces_reference_text() {
        for (line1, line2) in SETS {
            let tle = parse_elements(line1, line2).unwrap().tle;
            assert_eq!(write_line1(&tle), line1);
            assert_eq!(write_line2(&tle), line2);
        }
    }

    #[test]
    fn reparse_is_bit_identical() {
        for (line1, line2) in SETS {
            let tle = parse_elements(line1, line2).unwrap().tle;
            let text = write_elements_in_tle_format(&tle);
            let (out1, out2) = text.split_once('\n').unwrap();
            assert_eq!(tle_checksum(out1), Ok(0));
            assert_eq!(tle_checksum(out2), Ok(0));
            let again = parse_elements(out1, out2).unwrap();
            assert!(again.status.is_valid());
            assert_eq!(again.tle, tle);
        }
    }

    #[test]
    fn sci_notation_edges() {
        assert_eq!(put_sci(0.0), " 00000-0");
        assert_eq!(put_sci(0.13844e-3), " 13844-3");
        assert_eq!(put_sci(-0.11606e-4), "-11606-4");
        assert_eq!(put_sci(0.999999e-2), " 10000-1");
        assert_eq!(put_sci(0.5), " 50000+0");
    }

    #[test]
    fn negative_derivative_and_alpha5() {
        let mut tle = parse_elements(SETS[1].0, SETS[1].1).unwrap().tle;
        tle.xndt2o = -0.00002182 * TWO_PI / (MINUTES_PER_DAY * MINUTES_PER_DAY);
        tle.norad_number = 182931;
        let line1 = write_line1(&tle);
        assert_eq!(&line1[2..7], "J2931");
        assert_eq!(&line1[33..43], "-.00002182");
        let again = parse_elements(&line1, SETS[1].1).unwrap();
        assert_eq!(again.tle.norad_number, 182931);
        assert!(again.status.is_valid());
    }

    #[test]
    fn catalog_numbers_past_alpha5_are_not_wrapped() {
        assert_eq!(catalog_number(99_999).as_deref(), Some("99999"));
        assert_eq!(catalog_number(339_999).as_deref(), Some("Z9999"));
        assert_eq!(catalog_number(340_000), None);

        let mut tle = parse_elements(SETS[1].0, SETS[1].1).unwrap().tle;
        tle.norad_number = 340_000;
        let line1 = write_line1(&tle);
        let line2 = write_line2(&tle);
        assert_eq!(line1.len(), 69);
        assert_eq!(&line1[2..7], "*****");
        assert_eq!(&line2[2..7], "*****");
        assert!(parse_elements(&line1, &line2).is_err());
    }

    #[test]
    fn fast_mean_motion_keeps_its_columns() {
        assert_eq!(mean_motion_field(15.49396855), "15.49396855");
        assert_eq!(mean_motion_field(2.28537848), " 2.28537848");
        assert_eq!(mean_motion_field(123.456789012), "123.4567890");
        assert_eq!(mean_motion_field(1.0e12), "***********");

        let mut tle = parse_elements(SETS[1].0, SETS[1].1).unwrap().tle;
        if let Elements::Mean(mean) = &mut tle.elements {
            mean.xno = 123.4567890 * TWO_PI / MINUTES_PER_DAY;
        }
        let line2 = write_line2(&tle);
        assert_eq!(line2.len(), 69);
        assert_eq!(&line2[52..63], "123.4567890");
        let again = parse_elements(SETS[1].0, &line2).unwrap().tle;
        let revs = again.mean().unwrap().xno * MINUTES_PER_DAY / TWO_PI;
        assert!((revs - 123.456789).abs() < 1e-6);
    }

    #[test]
    fn state_vector_records_round_trip() {
        let mut tle = parse_elements(SETS[0].0, SETS[0].1).unwrap().tle;
        tle.ephemeris_type = 'H';
        tle.elements = Elements::StateVector(StateVectorElements {
            position_km: Vector3::new(-42164.137, 1234.5, -0.001),
            velocity_km_min: Vector3::new(0.0123 * 60.0, -3.0746 * 60.0, 0.0),
        });
        let line1 = write_line1(&tle);
        let line2 = write_line2(&tle);
        assert_eq!(line1.len(), 69);
        assert_eq!(line2.len(), 69);
        assert_eq!(&line2[8..17], "-02835FA9");

        let again = parse_elements(&line1, &line2).unwrap();
        assert!(again.status.is_valid());
        let sv = again.tle.state_vector().unwrap();
        assert!((sv.position_km - Vector3::new(-42164.137, 1234.5, -0.001)).norm() < 1e-9);
        assert!((sv.velocity_km_min.y / 60.0 + 3.0746).abs() < 1e-9);
        assert_eq!(write_line2(&again.tle), line2);
    }
}
