//! Decoding of two-line element text into [`Tle`] records.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use anyhow::Result;
use log::{debug, warn};
use nalgebra::Vector3;

use crate::constants::{DEG_TO_RAD, MINUTES_PER_DAY, TWO_PI};
use crate::datetime_util::epoch_to_jd;
use crate::error::TleError;
use crate::tle::{Elements, MeanElements, StateVectorElements, Tle};

/// Columns holding data; column 69 carries the checksum digit.
const DATA_COLUMNS: usize = 68;
const LINE_LENGTH: usize = 69;

/// Scale of the raw state-vector velocity fields (1e-4 m/s) to km/min.
pub(crate) const HEX_VELOCITY_TO_KM_MIN: f64 = 1e-4 * 1e-3 * 60.0;
pub(crate) const HEX_POSITION_TO_KM: f64 = 1e-3;

/// Which lines of a pair carried a correct checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumStatus {
    pub line1_ok: bool,
    pub line2_ok: bool,
}

impl ChecksumStatus {
    /// 0 when both lines check, 1 or 2 for a bad line 1 or line 2, 3 for both.
    pub fn code(&self) -> i32 {
        (!self.line1_ok as i32) | ((!self.line2_ok as i32) << 1)
    }

    pub fn is_valid(&self) -> bool {
        self.line1_ok && self.line2_ok
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElements {
    pub tle: Tle,
    pub status: ChecksumStatus,
}

/// A record read from a catalog file, with its name line when one preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTle {
    pub name: Option<String>,
    pub tle: Tle,
}

/// Sum of digit values plus one per '-' over columns 1-68, mod 10.
pub fn compute_checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .take(DATA_COLUMNS)
        .map(|b| match b {
            b'0'..=b'9' => (b - b'0') as u32,
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

/// Checks a line's trailing checksum digit.
///
/// `Ok(0)` means the checksum matches; any other `Ok` value is the mod-10
/// difference between the computed and the stated digit.
pub fn tle_checksum(line: &str) -> Result<u8, TleError> {
    let bytes = line.as_bytes();
    let line_no = match bytes.first() {
        Some(b'1') => 1,
        Some(b'2') => 2,
        _ => return Err(TleError::NotATleLine { line: 0 }),
    };
    if bytes.get(1) != Some(&b' ') {
        return Err(TleError::NotATleLine { line: line_no });
    }
    if bytes.len() < LINE_LENGTH {
        return Err(TleError::LineTooShort {
            line: line_no,
            len: bytes.len(),
        });
    }
    check_characters(line)?;
    if bytes[LINE_LENGTH..].iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(TleError::Unterminated { line: line_no });
    }
    let stated = bytes[DATA_COLUMNS];
    if !stated.is_ascii_digit() {
        return Err(TleError::InvalidCharacter {
            column: LINE_LENGTH,
            ch: stated as char,
        });
    }
    let computed = compute_checksum(line);
    Ok((computed + 10 - (stated - b'0')) % 10)
}

fn check_characters(line: &str) -> Result<(), TleError> {
    for (i, ch) in line.chars().take(DATA_COLUMNS).enumerate() {
        if !(' '..='z').contains(&ch) {
            return Err(TleError::InvalidCharacter { column: i + 1, ch });
        }
    }
    Ok(())
}

/// Text between 1-based columns `from` and `to`, inclusive. Columns past the end read as empty.
fn columns(line: &str, from: usize, to: usize) -> &str {
    let end = to.min(line.len());
    if from > end {
        ""
    } else {
        &line[from - 1..end]
    }
}

fn parse_int(field: &'static str, text: &str) -> Result<u32, TleError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| TleError::field(field, text))
}

/// Reads a fixed-point decimal such as `"115.9689"` or `"-.00002182"` by
/// accumulating its digits as an integer and dividing once.
fn parse_fixed(field: &'static str, text: &str) -> Result<f64, TleError> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(TleError::field(field, text));
    }
    let mut n: u64 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        if !b.is_ascii_digit() {
            return Err(TleError::field(field, text));
        }
        n = n * 10 + (b - b'0') as u64;
    }
    let value = n as f64 / 10f64.powi(frac_part.len() as i32);
    Ok(if negative { -value } else { value })
}

/// Decodes the assumed-decimal-point notation: `" 13844-3"` is `0.13844e-3`.
fn convert_scientific(field: &'static str, text: &str) -> Result<f64, TleError> {
    let value = text.trim();
    if value.len() < 2 {
        return Err(TleError::field(field, text));
    }
    let (sign, body) = match value.as_bytes()[0] {
        b'-' => ("-", &value[1..]),
        b'+' => ("", &value[1..]),
        _ => ("", value),
    };
    if body.len() < 2 {
        return Err(TleError::field(field, text));
    }
    let (mantissa, exponent) = body.split_at(body.len() - 2);
    let exponent = exponent.trim();
    let mantissa = mantissa.trim();
    if !mantissa.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TleError::field(field, text));
    }
    let mantissa = if mantissa.is_empty() { "0" } else { mantissa };
    format!("{}0.{}e{}", sign, mantissa, exponent)
        .parse::<f64>()
        .map_err(|_| TleError::field(field, text))
}

/// Decodes angle fields (degrees with four decimals) into radians.
fn get_angle(field: &'static str, text: &str) -> Result<f64, TleError> {
    Ok(parse_fixed(field, text)? * DEG_TO_RAD)
}

/// Letter value in Alpha-5 catalog numbers: A=10 ... Z=33, skipping I and O.
fn alpha5_digit(ch: u8) -> Option<u32> {
    match ch {
        b'A'..=b'H' => Some((ch - b'A') as u32 + 10),
        b'J'..=b'N' => Some((ch - b'J') as u32 + 18),
        b'P'..=b'Z' => Some((ch - b'P') as u32 + 23),
        _ => None,
    }
}

fn parse_norad_number(text: &str) -> Result<u32, TleError> {
    let trimmed = text.trim();
    match trimmed.as_bytes().first() {
        Some(&c) if c.is_ascii_alphabetic() => {
            let lead = alpha5_digit(c).ok_or_else(|| TleError::field("catalog number", text))?;
            Ok(lead * 10000 + parse_int("catalog number", &trimmed[1..])?)
        }
        _ => parse_int("catalog number", text),
    }
}

/// Signed eight-digit hexadecimal field: sign character followed by eight hex digits.
fn parse_hex_field(field: &'static str, text: &str) -> Result<f64, TleError> {
    if text.len() != 9 {
        return Err(TleError::field(field, text));
    }
    let negative = match text.as_bytes()[0] {
        b'-' => true,
        b'+' | b' ' => false,
        _ => return Err(TleError::field(field, text)),
    };
    let magnitude =
        i64::from_str_radix(&text[1..], 16).map_err(|_| TleError::field(field, text))?;
    Ok(if negative { -magnitude } else { magnitude } as f64)
}

fn parse_state_vector(line2: &str) -> Result<StateVectorElements, TleError> {
    const NAMES: [&str; 6] = ["x", "y", "z", "vx", "vy", "vz"];
    let mut raw = [0.0; 6];
    for (i, value) in raw.iter_mut().enumerate() {
        let from = 9 + i * 9;
        *value = parse_hex_field(NAMES[i], columns(line2, from, from + 8))?;
    }
    Ok(StateVectorElements {
        position_km: Vector3::new(raw[0], raw[1], raw[2]) * HEX_POSITION_TO_KM,
        velocity_km_min: Vector3::new(raw[3], raw[4], raw[5]) * HEX_VELOCITY_TO_KM_MIN,
    })
}

fn parse_mean_elements(line2: &str) -> Result<MeanElements, TleError> {
    let ecc_text = columns(line2, 27, 33);
    let eo = if ecc_text.contains('.') {
        parse_fixed("eccentricity", ecc_text)?
    } else {
        parse_fixed("eccentricity", &format!(".{}", ecc_text.trim()))?
    };
    let revs_per_day = parse_fixed("mean motion", columns(line2, 53, 63))?;
    Ok(MeanElements {
        xincl: get_angle("inclination", columns(line2, 9, 16))?,
        xnodeo: get_angle("ascending node", columns(line2, 18, 25))?,
        eo,
        omegao: get_angle("argument of perigee", columns(line2, 35, 42))?,
        xmo: get_angle("mean anomaly", columns(line2, 44, 51))?,
        xno: revs_per_day * TWO_PI / MINUTES_PER_DAY,
    })
}

fn check_line(line: &str, line_no: u8) -> Result<(), TleError> {
    let bytes = line.as_bytes();
    if bytes.first() != Some(&(b'0' + line_no)) || bytes.get(1) != Some(&b' ') {
        return Err(TleError::NotATleLine { line: line_no });
    }
    if line.len() < DATA_COLUMNS {
        return Err(TleError::LineTooShort {
            line: line_no,
            len: line.len(),
        });
    }
    check_characters(line)
}

/// Parses a line pair into an element record.
///
/// Checksum mismatches do not fail the parse; they are reported in
/// [`ParsedElements::status`].
pub fn parse_elements(line1: &str, line2: &str) -> Result<ParsedElements, TleError> {
    let line1 = line1.trim_end();
    let line2 = line2.trim_end();
    check_line(line1, 1)?;
    check_line(line2, 2)?;

    let status = ChecksumStatus {
        line1_ok: matches!(tle_checksum(line1), Ok(0)),
        line2_ok: matches!(tle_checksum(line2), Ok(0)),
    };

    let year = parse_int("epoch year", columns(line1, 19, 20))? as i32;
    let day = parse_fixed("epoch day", columns(line1, 21, 32))?;
    let ephemeris_type = match columns(line1, 63, 63).chars().next() {
        Some(' ') | None => '0',
        Some(c) => c,
    };
    let elements = if ephemeris_type == 'H' {
        Elements::StateVector(parse_state_vector(line2)?)
    } else {
        Elements::Mean(parse_mean_elements(line2)?)
    };

    let tle = Tle {
        epoch: epoch_to_jd(year, day),
        xndt2o: parse_fixed("mean motion derivative", columns(line1, 34, 43))? * TWO_PI
            / (MINUTES_PER_DAY * MINUTES_PER_DAY),
        xndd6o: convert_scientific("mean motion second derivative", columns(line1, 45, 52))?
            * TWO_PI
            / (MINUTES_PER_DAY * MINUTES_PER_DAY * MINUTES_PER_DAY),
        bstar: convert_scientific("bstar", columns(line1, 54, 61))?,
        elements,
        norad_number: parse_norad_number(columns(line1, 3, 7))?,
        bulletin_number: parse_int("element set number", columns(line1, 65, 68))?,
        revolution_number: parse_int("revolution number", columns(line2, 64, 68))?,
        classification: columns(line1, 8, 8).chars().next().unwrap_or('U'),
        ephemeris_type,
        intl_desig: columns(line1, 10, 17).trim_end().to_string(),
    };
    Ok(ParsedElements { tle, status })
}

impl std::str::FromStr for Tle {
    type Err = TleError;

    /// Reads the first line-1/line-2 pair in `text`, ignoring checksum status.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut line1 = lines.next().ok_or(TleError::NotATleLine { line: 1 })?;
        if !line1.starts_with("1 ") {
            line1 = lines.next().ok_or(TleError::NotATleLine { line: 1 })?;
        }
        let line2 = lines.next().ok_or(TleError::NotATleLine { line: 2 })?;
        Ok(parse_elements(line1, line2)?.tle)
    }
}

/// Scans text for element sets. A non-TLE line directly above line 1 is taken as its name.
pub fn read_tle_str(text: &str) -> Vec<NamedTle> {
    let mut satellites = Vec::new();
    let mut name: Option<String> = None;
    let mut pending_line1: Option<&str> = None;

    for line in text.lines() {
        let line = line.trim_end();
        if line.starts_with("1 ") {
            pending_line1 = Some(line);
            continue;
        }
        if let (true, Some(line1)) = (line.starts_with("2 "), pending_line1.take()) {
            match parse_elements(line1, line) {
                Ok(parsed) => {
                    if !parsed.status.is_valid() {
                        warn!(
                            "checksum mismatch (status {}) for object {}",
                            parsed.status.code(),
                            parsed.tle.norad_number
                        );
                    }
                    satellites.push(NamedTle {
                        name: name.take(),
                        tle: parsed.tle,
                    });
                }
                Err(e) => warn!("skipping unreadable element set: {}", e),
            }
            continue;
        }
        pending_line1 = None;
        let trimmed = line.trim();
        name = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.trim_start_matches("0 ").to_string())
        };
    }
    satellites
}

pub fn read_tle_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<NamedTle>> {
    let file: File = File::open(file_path.as_ref())?;
    let reader: BufReader<File> = BufReader::new(file);
    let lines: Lines<BufReader<File>> = reader.lines();

    let mut text = String::new();
    for line in lines {
        text.push_str(&line?);
        text.push('\n');
    }
    let satellites = read_tle_str(&text);
    debug!(
        "read {} element sets from {}",
        satellites.len(),
        file_path.as_ref().display()
    );
    Ok(satellites)
}
