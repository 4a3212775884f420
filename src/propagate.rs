use std::{fs::File, io::{BufWriter, Write}, path::Path};

use anyhow::{bail, Result};
use log::{debug, warn};
use rayon::prelude::*;
use serde_json::{json, Value};
use zstd::Encoder;

use crate::constants::MINUTES_PER_DAY;
use crate::datetime_util::jd_to_utc;
use crate::deep::DeepConfig;
use crate::ephemeris::{AnyPropagator, Model, Prediction, Propagator};
use crate::error::SxpxError;
use crate::observe::{RaDecDelta, Site};
use crate::tle::Tle;

/// Settings for a batch run. Times are minutes from each element set's epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropSettings {
    /// Model family; deep-space orbits get the matching deep model.
    pub model: Model,
    pub config: DeepConfig,
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub site: Option<Site>,
}

impl Default for PropSettings {
    fn default() -> Self {
        PropSettings {
            model: Model::Sgp4,
            config: DeepConfig::default(),
            start: 0.0,
            stop: MINUTES_PER_DAY,
            step: 60.0,
            site: None,
        }
    }
}

impl PropSettings {
    fn times(&self) -> Result<Vec<f64>> {
        if !(self.step > 0.0) {
            bail!("step must be positive, got {}", self.step);
        }
        if self.stop < self.start {
            bail!("stop {} is before start {}", self.stop, self.start);
        }
        let n = ((self.stop - self.start) / self.step + 1e-9).floor() as usize;
        Ok((0..=n).map(|i| self.start + i as f64 * self.step).collect())
    }
}

/// One sample of one satellite's ephemeris.
#[derive(Debug, Clone, PartialEq)]
pub struct EphemerisRow {
    pub norad_number: u32,
    pub model: Model,
    pub tsince: f64,
    pub jd: f64,
    pub result: Result<Prediction, SxpxError>,
    pub look: Option<RaDecDelta>,
}

impl EphemerisRow {
    pub fn to_json(&self) -> Value {
        let mut row = json!({
            "norad": self.norad_number,
            "model": self.model.to_string(),
            "tsince": self.tsince,
            "utc": jd_to_utc(self.jd).to_rfc3339(),
        });
        match &self.result {
            Ok(pred) => {
                row["status"] = json!(pred.status());
                row["position_km"] = json!([pred.position.x, pred.position.y, pred.position.z]);
                let vel = pred.velocity_km_s();
                row["velocity_km_s"] = json!([vel.x, vel.y, vel.z]);
            }
            Err(err) => {
                row["status"] = json!(err.code());
                row["error"] = json!(err.to_string());
            }
        }
        if let Some(look) = &self.look {
            row["ra_deg"] = json!(look.ra.to_degrees());
            row["dec_deg"] = json!(look.dec.to_degrees());
            row["range_km"] = json!(look.delta);
        }
        row
    }
}

/// Propagates one element set over the settings' time grid. A failed sample
/// becomes an error row; only initialization failures abort.
pub fn ephemeris(tle: &Tle, settings: &PropSettings) -> Result<Vec<EphemerisRow>> {
    let times = settings.times()?;
    let model = settings.model.for_tle(tle)?;
    let mut propagator = AnyPropagator::new(model, tle, settings.config)?;

    let rows = times
        .into_iter()
        .map(|tsince| {
            let jd = tle.epoch + tsince / MINUTES_PER_DAY;
            let result = propagator.propagate(tsince);
            let look = match (&result, &settings.site) {
                (Ok(pred), Some(site)) => Some(site.look(jd, &pred.position)),
                _ => None,
            };
            EphemerisRow {
                norad_number: tle.norad_number,
                model,
                tsince,
                jd,
                result,
                look,
            }
        })
        .collect();
    Ok(rows)
}

/// Each satellite gets its own propagator, so the catalog runs in parallel.
/// Satellites that cannot be initialized are logged and skipped.
pub fn propagate_catalog(tles: &[Tle], settings: &PropSettings) -> Vec<Vec<EphemerisRow>> {
    tles.par_iter()
        .filter_map(|tle| match ephemeris(tle, settings) {
            Ok(rows) => Some(rows),
            Err(err) => {
                warn!("skipping object {}: {}", tle.norad_number, err);
                None
            }
        })
        .collect()
}

pub fn write_rows<W: Write>(writer: &mut W, rows: &[EphemerisRow]) -> Result<()> {
    for row in rows {
        writeln!(writer, "{}", row.to_json())?;
    }
    Ok(())
}

/// Writes JSON lines to `path`, zstd-compressed when it ends in `.zst`.
pub fn write_ephemeris_file<P: AsRef<Path>>(
    path: P,
    catalog: &[Vec<EphemerisRow>],
    compression_level: i32,
) -> Result<()> {
    let path = path.as_ref();
    let file: File = File::create(path)?;
    let writer: BufWriter<File> = BufWriter::new(file);

    if path.extension().is_some_and(|ext| ext == "zst") {
        let mut encoder: Encoder<'static, BufWriter<File>> = Encoder::new(writer, compression_level)?;
        for rows in catalog {
            write_rows(&mut encoder, rows)?;
        }
        let mut inner_writer = encoder.finish()?;
        inner_writer.flush()?;
    } else {
        let mut writer = writer;
        for rows in catalog {
            write_rows(&mut writer, rows)?;
        }
        writer.flush()?;
    }
    debug!("wrote {} satellites to {}", catalog.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::parse_elements;

    fn tle(line1: &str, line2: &str) -> Tle {
        parse_elements(line1, line2).unwrap().tle
    }

    fn catalog() -> Vec<Tle> {
        vec![
            tle(
                "1 88888U          80275.98708465  .00073094  13844-3  66816-4 0    87",
                "2 88888  72.8435 115.9689 0086731  52.6988 110.5714 16.05824518  1058",
            ),
            tle(
                "1 11801U          80230.29629788  .01431103  00000-0  14311-1 0    13",
                "2 11801  46.7916 230.4354 7318036  47.4722  10.4117  2.28537848    13",
            ),
            tle(
                "1 25544U 98067A   20148.21301450  .00001715  00000-0  38778-4 0  9992",
                "2 25544  51.6435  92.2789 0002570 358.0648 144.9972 15.49396855228767",
            ),
        ]
    }

    #[test]
    fn time_grid_includes_both_ends() {
        let settings = PropSettings {
            start: -60.0,
            stop: 60.0,
            step: 30.0,
            ..PropSettings::default()
        };
        assert_eq!(settings.times().unwrap(), vec![-60.0, -30.0, 0.0, 30.0, 60.0]);
        let bad = PropSettings {
            step: 0.0,
            ..PropSettings::default()
        };
        assert!(bad.times().is_err());
    }

    #[test]
    fn deep_space_objects_switch_model() {
        let tles = catalog();
        let settings = PropSettings {
            stop: 120.0,
            ..PropSettings::default()
        };
        let rows = ephemeris(&tles[1], &settings).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.model == Model::Sdp4));
        let rows = ephemeris(&tles[0], &settings).unwrap();
        assert!(rows.iter().all(|r| r.model == Model::Sgp4));
    }

    #[test]
    fn catalog_matches_one_at_a_time() {
        let tles = catalog();
        let settings = PropSettings {
            model: Model::Sgp8,
            stop: 360.0,
            step: 90.0,
            ..PropSettings::default()
        };
        let all = propagate_catalog(&tles, &settings);
        assert_eq!(all.len(), tles.len());
        for (tle, rows) in tles.iter().zip(&all) {
            assert_eq!(rows, &ephemeris(tle, &settings).unwrap());
        }
    }

    #[test]
    fn failed_samples_become_error_rows() {
        let mut tles = catalog();
        tles[0].bstar = 0.5;
        let settings = PropSettings {
            stop: 60.0 * MINUTES_PER_DAY,
            step: 10.0 * MINUTES_PER_DAY,
            ..PropSettings::default()
        };
        let rows = ephemeris(&tles[0], &settings).unwrap();
        let last = rows.last().unwrap();
        assert!(last.result.is_err());
        let json = last.to_json();
        assert!(json["status"].as_i64().unwrap() < 0);
        assert!(json.get("position_km").is_none());
    }

    #[test]
    fn site_adds_look_angles() {
        let tles = catalog();
        let settings = PropSettings {
            stop: 0.0,
            site: Some("40.0,-75.0,100".parse().unwrap()),
            ..PropSettings::default()
        };
        let rows = ephemeris(&tles[2], &settings).unwrap();
        let json = rows[0].to_json();
        let ra = json["ra_deg"].as_f64().unwrap();
        assert!((0.0..360.0).contains(&ra));
        assert!(json["range_km"].as_f64().unwrap() > 400.0);
    }

    #[test]
    fn compressed_output_decodes_to_json_lines() {
        let tles = catalog();
        let settings = PropSettings {
            stop: 120.0,
            ..PropSettings::default()
        };
        let all = propagate_catalog(&tles, &settings);
        let path = std::env::temp_dir().join(format!("sxpx_test_{}.jsonl.zst", std::process::id()));
        write_ephemeris_file(&path, &all, 3).unwrap();

        let bytes = zstd::decode_all(File::open(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["norad"], 88888);
        assert_eq!(first["model"], "SGP4");
    }
}
