use std::env;
use std::io::{self, BufWriter, Write};

use anyhow::{bail, Context, Result};
use env_logger::Env;
use log::info;

use sxpx::datetime_util::parse_utc;
use sxpx::observe::Site;
use sxpx::propagate::{propagate_catalog, write_ephemeris_file, write_rows, EphemerisRow, PropSettings};
use sxpx::read::read_tle_file;
use sxpx::tle::Tle;

const USAGE: &str = "usage: sxpx <tle-file> [model] [start] [stop] [step-min] [out-file]\n\
    start/stop are minutes from each epoch or UTC instants (YYYY-MM-DDTHH:MM:SS)";
const COMPRESSION_LEVEL: i32 = 3;

/// A time argument: minutes since epoch, or an absolute UTC instant.
enum TimeArg {
    Minutes(f64),
    Utc(chrono::DateTime<chrono::Utc>),
}

impl TimeArg {
    fn parse(text: &str) -> Result<Self> {
        if let Ok(minutes) = text.parse::<f64>() {
            return Ok(TimeArg::Minutes(minutes));
        }
        let when = parse_utc(text).with_context(|| format!("bad time {:?}", text))?;
        Ok(TimeArg::Utc(when))
    }

    fn minutes_for(&self, tle: &Tle) -> f64 {
        match self {
            TimeArg::Minutes(m) => *m,
            TimeArg::Utc(when) => tle.minutes_since_epoch(*when),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 7 {
        bail!(USAGE);
    }
    let mut settings = PropSettings::default();
    if let Some(model) = args.get(2) {
        settings.model = model.parse()?;
    }
    let start = args.get(3).map(|s| TimeArg::parse(s)).transpose()?;
    let stop = args.get(4).map(|s| TimeArg::parse(s)).transpose()?;
    if let Some(step) = args.get(5) {
        settings.step = step.parse().with_context(|| format!("bad step {:?}", step))?;
    }
    if let Ok(site) = env::var("SXPX_OBSERVER") {
        settings.site = Some(site.parse::<Site>().context("SXPX_OBSERVER")?);
    }

    let time = std::time::Instant::now();
    let named = read_tle_file(&args[1])?;
    info!("read {} element sets from {} in {:.3}s", named.len(), args[1], time.elapsed().as_secs_f64());

    // Absolute times map to different offsets for each epoch, so those runs go one satellite at a time
    let time = std::time::Instant::now();
    let tles: Vec<Tle> = named.into_iter().map(|n| n.tle).collect();
    let catalog: Vec<Vec<EphemerisRow>> = match (&start, &stop) {
        (Some(TimeArg::Utc(_)), _) | (_, Some(TimeArg::Utc(_))) => tles
            .iter()
            .flat_map(|tle| {
                let mut per_sat = settings;
                if let Some(start) = &start {
                    per_sat.start = start.minutes_for(tle);
                }
                if let Some(stop) = &stop {
                    per_sat.stop = stop.minutes_for(tle);
                }
                propagate_catalog(std::slice::from_ref(tle), &per_sat)
            })
            .collect(),
        _ => {
            if let Some(TimeArg::Minutes(m)) = start {
                settings.start = m;
            }
            if let Some(TimeArg::Minutes(m)) = stop {
                settings.stop = m;
            }
            propagate_catalog(&tles, &settings)
        }
    };
    let samples: usize = catalog.iter().map(Vec::len).sum();
    info!("propagated {} satellites ({} samples) in {:.3}s", catalog.len(), samples, time.elapsed().as_secs_f64());

    match args.get(6) {
        Some(out) => {
            write_ephemeris_file(out, &catalog, COMPRESSION_LEVEL)?;
            info!("wrote {}", out);
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            for rows in &catalog {
                write_rows(&mut writer, rows)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
