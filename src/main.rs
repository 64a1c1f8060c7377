extern crate thermal_map;

use anyhow::{anyhow, bail};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use thermal_map::analysis_period::AnalysisPeriod;
use thermal_map::core::evaluation::PersonalParameter;
use thermal_map::core::models::adaptive::AdaptiveParameter;
use thermal_map::core::models::pmv::{PmvModel, PmvParameter, TemperatureMetric};
use thermal_map::core::models::solarcal::SolarCalParameter;
use thermal_map::core::models::utci::UtciParameter;
use thermal_map::core::solar_adjustment::{load_ill_matrix, load_sun_up_hours, SensorIrradiance};
use thermal_map::enclosure::EnclosureMap;
use thermal_map::logging;
use thermal_map::output::FileOutput;
use thermal_map::read_weather_file::weather_data_to_climate;
use thermal_map::result_store::{EnergyPlusCsvStore, ZoneResultStore};
use thermal_map::{run_thermal_map, ComfortModelChoice, ThermalMapInputs};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ThermalMapArgs {
    #[command(subcommand)]
    model: ModelCommand,
    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Map Predicted Mean Vote comfort
    Pmv {
        #[command(flatten)]
        sources: MapSources,
        /// Air speed in m/s: one number or a JSON array aligned with the results [default: 0.1]
        #[arg(long)]
        air_speed: Option<PersonalParameter>,
        /// Metabolic rate in met: one number or a JSON array [default: 1.1]
        #[arg(long)]
        met_rate: Option<PersonalParameter>,
        /// Clothing insulation in clo: one number or a JSON array [default: 0.7]
        #[arg(long)]
        clo_value: Option<PersonalParameter>,
        /// Record operative temperature instead of the slower standard effective temperature
        #[arg(long, conflicts_with = "write_set_map")]
        write_op_map: bool,
        /// Record standard effective temperature (the default)
        #[arg(long)]
        write_set_map: bool,
        /// PMV parameters, e.g. "--ppd-threshold 10 --hr-upper 0.03"
        #[arg(long, allow_hyphen_values = true)]
        comfort_par: Option<PmvParameter>,
    },
    /// Map adaptive comfort
    Adaptive {
        #[command(flatten)]
        sources: MapSources,
        /// Air speed in m/s: one number or a JSON array aligned with the results [default: 0.1]
        #[arg(long)]
        air_speed: Option<PersonalParameter>,
        /// Adaptive parameters, e.g. "--standard EN-16798 --neutral-offset 3"
        #[arg(long, allow_hyphen_values = true)]
        comfort_par: Option<AdaptiveParameter>,
    },
    /// Map Universal Thermal Climate Index stress
    Utci {
        #[command(flatten)]
        sources: MapSources,
        /// Indoor wind speed in m/s: one number or a JSON array aligned with the results [default: 0.5]
        #[arg(long)]
        wind_speed: Option<PersonalParameter>,
        /// UTCI parameters, e.g. "--cold 9 --heat 26"
        #[arg(long, allow_hyphen_values = true)]
        comfort_par: Option<UtciParameter>,
    },
}

#[derive(Args, Debug)]
struct MapSources {
    /// CSV report of an EnergyPlus run with hourly or sub-hourly zone results
    result_csv: PathBuf,
    /// JSON describing which zone, or the outdoors, each sensor belongs to
    enclosure_info: PathBuf,
    /// Weather file for outdoor sensors and sun positions
    epw_file: PathBuf,
    /// Radiance .ill file of total irradiance on every sensor
    #[arg(long)]
    total_irradiance: Option<PathBuf>,
    /// Radiance .ill file of direct irradiance on every sensor
    #[arg(long)]
    direct_irradiance: Option<PathBuf>,
    /// Radiance .ill file of ground-reflected irradiance; a ground reflectance of 0.25 is assumed without it
    #[arg(long)]
    ref_irradiance: Option<PathBuf>,
    /// Sun-up hours file, required with any irradiance
    #[arg(long)]
    sun_up_hours: Option<PathBuf>,
    /// Analysis period, e.g. "6/21 to 9/21 between 8 and 16 @1"
    #[arg(long)]
    run_period: Option<AnalysisPeriod>,
    /// SolarCal parameters, e.g. "--posture standing --absorptivity 0.7"
    #[arg(long, allow_hyphen_values = true)]
    solarcal_par: Option<SolarCalParameter>,
    /// Folder for the result CSVs [default: a thermal_map folder next to the result CSV]
    #[arg(long)]
    folder: Option<PathBuf>,
    /// File to write the JSON map of result paths to [default: stdout]
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = ThermalMapArgs::parse();
    logging::init(args.verbose)?;

    run(args.model)
}

fn run(command: ModelCommand) -> anyhow::Result<()> {
    let (sources, model, air_speed, met_rate, clo_value) = match command {
        ModelCommand::Pmv {
            sources,
            air_speed,
            met_rate,
            clo_value,
            write_op_map,
            write_set_map: _,
            comfort_par,
        } => {
            let temperature_metric = if write_op_map {
                TemperatureMetric::Operative
            } else {
                TemperatureMetric::StandardEffective
            };
            let model = PmvModel::new(comfort_par.unwrap_or_default(), temperature_metric);
            (sources, ComfortModelChoice::Pmv(model), air_speed, met_rate, clo_value)
        }
        ModelCommand::Adaptive {
            sources,
            air_speed,
            comfort_par,
        } => (
            sources,
            ComfortModelChoice::Adaptive(comfort_par.unwrap_or_default()),
            air_speed,
            None,
            None,
        ),
        ModelCommand::Utci {
            sources,
            wind_speed,
            comfort_par,
        } => (
            sources,
            ComfortModelChoice::utci(comfort_par.unwrap_or_default()),
            wind_speed,
            None,
            None,
        ),
    };

    let enclosure = EnclosureMap::from_reader(open(&sources.enclosure_info)?)?;
    let store = if enclosure.has_indoor() {
        Some(EnergyPlusCsvStore::from_reader(open(&sources.result_csv)?)?)
    } else {
        debug!("No indoor sensors; skipping '{}'", sources.result_csv.display());
        None
    };
    let climate = weather_data_to_climate(open(&sources.epw_file)?)?;
    let irradiance = load_irradiance(&sources)?;

    let inputs = ThermalMapInputs {
        enclosure: &enclosure,
        store: store.as_ref().map(|store| store as &dyn ZoneResultStore),
        climate: &climate,
        run_period: sources.run_period,
        irradiance: irradiance.as_ref(),
        solarcal: sources.solarcal_par.unwrap_or_default(),
        air_speed,
        met_rate,
        clo_value,
    };

    let folder = match &sources.folder {
        Some(folder) => folder.clone(),
        None => sources
            .result_csv
            .parent()
            .unwrap_or(Path::new("."))
            .join("thermal_map"),
    };
    let output = FileOutput::new(folder, "{}.csv".to_string());
    let paths = run_thermal_map(&inputs, model, &output)?;
    info!("Wrote {} result files", paths.len());

    let report = serde_json::to_string(&paths)?;
    match &sources.log_file {
        Some(log_file) => std::fs::write(log_file, report)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{report}")?;
        }
    }

    Ok(())
}

fn load_irradiance(sources: &MapSources) -> anyhow::Result<Option<SensorIrradiance>> {
    let (total, direct) = match (&sources.total_irradiance, &sources.direct_irradiance) {
        (None, None) => return Ok(None),
        (Some(total), Some(direct)) => (total, direct),
        _ => bail!("--total-irradiance and --direct-irradiance must be given together"),
    };

    Ok(Some(SensorIrradiance {
        total: load_ill_matrix(open(total)?)?,
        direct: load_ill_matrix(open(direct)?)?,
        reflected: match &sources.ref_irradiance {
            Some(path) => Some(load_ill_matrix(open(path)?)?),
            None => None,
        },
        sun_up_hours: match &sources.sun_up_hours {
            Some(path) => Some(load_sun_up_hours(open(path)?)?),
            None => None,
        },
    }))
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path).map_err(|e| {
        anyhow!("could not open '{}': {e}", path.display())
    })?))
}
