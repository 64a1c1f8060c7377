#![allow(clippy::too_many_arguments)]

pub mod analysis_period;
pub mod core;
pub mod enclosure;
pub mod errors;
pub mod input;
pub mod logging;
pub mod output;
pub mod read_weather_file;
pub mod result_store;
pub mod series;
pub mod solar_position;

#[macro_use]
extern crate is_close;

use crate::analysis_period::AnalysisPeriod;
use crate::core::evaluation::{evaluate_comfort_map, ComfortInputs, PersonalParameter, ThermalMap};
use crate::core::models::adaptive::{AdaptiveModel, AdaptiveParameter};
use crate::core::models::pmv::PmvModel;
use crate::core::models::solarcal::SolarCalParameter;
use crate::core::models::utci::{Utci2012, UtciModel, UtciParameter, UtciRegression};
use crate::core::models::{ComfortModel, ModelKind};
use crate::core::resolver::{common_analysis_period, OutdoorWind, Quantity, SensorResolver};
use crate::core::solar_adjustment::{shortwave_mrt_map, SensorIrradiance};
use crate::enclosure::EnclosureMap;
use crate::errors::ThermalMapError;
use crate::output::Output;
use crate::read_weather_file::ClimateData;
use crate::result_store::ZoneResultStore;
use crate::solar_position::SunPath;
use csv::WriterBuilder;
use indexmap::IndexMap;
use std::fmt::Display;
use std::io::Write;
use tracing::{debug, info};

/// The comfort model to map, with its parameters.
pub enum ComfortModelChoice {
    Pmv(PmvModel),
    Adaptive(AdaptiveParameter),
    Utci(UtciParameter, Box<dyn UtciRegression>),
}

impl ComfortModelChoice {
    /// UTCI from the 2012 polynomial regression.
    pub fn utci(parameter: UtciParameter) -> Self {
        ComfortModelChoice::Utci(parameter, Box::new(Utci2012))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ComfortModelChoice::Pmv(_) => ModelKind::Pmv,
            ComfortModelChoice::Adaptive(_) => ModelKind::Adaptive,
            ComfortModelChoice::Utci(..) => ModelKind::Utci,
        }
    }

    fn outdoor_wind(&self) -> OutdoorWind {
        match self {
            ComfortModelChoice::Utci(..) => OutdoorWind::Meteorological,
            _ => OutdoorWind::Pedestrian,
        }
    }

    fn into_model(
        self,
        climate: &ClimateData,
        period: &AnalysisPeriod,
    ) -> Result<Box<dyn ComfortModel>, ThermalMapError> {
        Ok(match self {
            ComfortModelChoice::Pmv(model) => Box::new(model),
            ComfortModelChoice::Adaptive(parameter) => Box::new(AdaptiveModel::from_climate(
                parameter,
                &climate.dry_bulb_temperature,
                period,
            )?),
            ComfortModelChoice::Utci(parameter, regression) => {
                Box::new(UtciModel::new(parameter, regression))
            }
        })
    }
}

/// Sources and settings for one thermal map.
#[derive(Clone, Debug)]
pub struct ThermalMapInputs<'a> {
    pub enclosure: &'a EnclosureMap,
    /// Zone results, needed whenever the enclosure has indoor sensors.
    pub store: Option<&'a dyn ZoneResultStore>,
    pub climate: &'a ClimateData,
    pub run_period: Option<AnalysisPeriod>,
    pub irradiance: Option<&'a SensorIrradiance>,
    pub solarcal: SolarCalParameter,
    pub air_speed: Option<PersonalParameter>,
    pub met_rate: Option<PersonalParameter>,
    pub clo_value: Option<PersonalParameter>,
}

const DEFAULT_MET_RATE: f64 = 1.1;
const DEFAULT_CLO_VALUE: f64 = 0.7;

/// Resolves every sensor's conditions, adds solar gain to the radiant temperature and evaluates
/// the comfort model over the whole grid.
pub fn compute_thermal_map(
    inputs: &ThermalMapInputs,
    model: ComfortModelChoice,
) -> Result<ThermalMap, ThermalMapError> {
    let kind = model.kind();
    let period = common_analysis_period(inputs.enclosure, inputs.store, inputs.run_period)?;
    let reporting_period = match inputs.store {
        Some(store) => store.reporting_period(),
        None => AnalysisPeriod::annual(1)?,
    };
    info!(
        "Mapping {kind} comfort for {} sensors over '{period}'",
        inputs.enclosure.sensor_count()
    );

    let personal = |name: &str, parameter: &Option<PersonalParameter>, default: f64| {
        parameter
            .clone()
            .unwrap_or(PersonalParameter::Constant(default))
            .aligned(name, &period, &reporting_period)
    };
    let air_speed = personal("air speed", &inputs.air_speed, kind.default_air_speed())?;
    let met_rate = personal("met rate", &inputs.met_rate, DEFAULT_MET_RATE)?;
    let clo_value = personal("clo value", &inputs.clo_value, DEFAULT_CLO_VALUE)?;

    let resolver = SensorResolver::new(
        inputs.enclosure,
        inputs.store,
        Some(inputs.climate),
        period,
        air_speed,
        model.outdoor_wind(),
    )?;
    let air_temperature = resolver.resolve(Quantity::AirTemperature)?;
    let relative_humidity = resolver.resolve(Quantity::RelativeHumidity)?;
    let radiant_temperature = shortwave_mrt_map(
        resolver.resolve(Quantity::RadiantTemperature)?,
        inputs.irradiance,
        &SunPath::new(&inputs.climate.location),
        &inputs.solarcal,
    )?;
    let air_speed = resolver.resolve(Quantity::AirSpeed)?;
    debug!("Resolved all quantities for {} sensors", air_temperature.sensor_count());

    let model = model.into_model(inputs.climate, &period)?;
    evaluate_comfort_map(
        model.as_ref(),
        &ComfortInputs {
            air_temperature: &air_temperature,
            relative_humidity: &relative_humidity,
            radiant_temperature: &radiant_temperature,
            air_speed: &air_speed,
            met_rate: &met_rate,
            clo_value: &clo_value,
        },
    )
}

/// Keys of the written matrices, in the order they are written.
pub const TEMPERATURE_KEY: &str = "temperature";
pub const CONDITION_KEY: &str = "condition";
pub const CONDITION_INTENSITY_KEY: &str = "condition_intensity";

/// Writes the temperature, condition and condition intensity matrices, one row per sensor, and
/// returns where each was written. Either all three are written or none are.
pub fn write_thermal_map(
    output: impl Output,
    thermal_map: &ThermalMap,
) -> anyhow::Result<IndexMap<String, String>> {
    let rendered = [
        (TEMPERATURE_KEY, render_matrix(thermal_map.temperature())?),
        (CONDITION_KEY, render_matrix(thermal_map.condition())?),
        (
            CONDITION_INTENSITY_KEY,
            render_matrix(thermal_map.condition_intensity())?,
        ),
    ];

    let mut written: Vec<&str> = vec![];
    for (key, contents) in &rendered {
        if let Err(e) = write_to_output(&output, key, contents) {
            for written_key in written {
                output.discard(written_key)?;
            }
            output.discard(key)?;
            return Err(e.context(format!("could not write the {key} matrix")));
        }
        written.push(*key);
    }

    rendered
        .iter()
        .map(|(key, _)| -> anyhow::Result<(String, String)> {
            Ok((key.to_string(), output.location_for_key(key)?))
        })
        .collect()
}

fn write_to_output(output: &impl Output, key: &str, contents: &[u8]) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    debug!("writing out to {key}");
    let mut writer = output.writer_for_location_key(key)?;
    writer.write_all(contents)?;
    writer.flush()?;
    Ok(())
}

fn render_matrix<'a, T: Display + 'a>(
    rows: impl Iterator<Item = &'a [T]>,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(vec![]);
    for row in rows {
        writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    Ok(writer.into_inner()?)
}

/// Computes the thermal map and writes it to the output.
pub fn run_thermal_map(
    inputs: &ThermalMapInputs,
    model: ComfortModelChoice,
    output: impl Output,
) -> anyhow::Result<IndexMap<String, String>> {
    let thermal_map = compute_thermal_map(inputs, model)?;
    write_thermal_map(output, &thermal_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::pmv::{PmvParameter, TemperatureMetric};
    use crate::core::models::ComfortSeries;
    use crate::read_weather_file::tests::synthetic_epw;
    use crate::read_weather_file::weather_data_to_climate;
    use crate::result_store::{
        InMemoryResultStore, ZONE_AIR_TEMPERATURE, ZONE_RADIANT_TEMPERATURE, ZONE_RELATIVE_HUMIDITY,
    };
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Collects everything written, keyed by location.
    #[derive(Debug, Default)]
    struct MemoryOutput {
        files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
        fail_on: Option<&'static str>,
    }

    struct MemoryWriter {
        files: Rc<RefCell<IndexMap<String, Vec<u8>>>>,
        key: String,
    }

    impl Write for MemoryWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.files
                .borrow_mut()
                .entry(self.key.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Output for &MemoryOutput {
        fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
            if self.fail_on == Some(location_key) {
                anyhow::bail!("disk full");
            }
            Ok(MemoryWriter {
                files: self.files.clone(),
                key: location_key.to_string(),
            })
        }

        fn location_for_key(&self, location_key: &str) -> anyhow::Result<String> {
            Ok(format!("memory://{location_key}.csv"))
        }

        fn discard(&self, location_key: &str) -> anyhow::Result<()> {
            self.files.borrow_mut().shift_remove(location_key);
            Ok(())
        }
    }

    #[fixture]
    fn climate() -> ClimateData {
        weather_data_to_climate(synthetic_epw(8760).as_bytes()).unwrap()
    }

    #[fixture]
    fn period() -> AnalysisPeriod {
        AnalysisPeriod::new(1, 1, 0, 1, 1, 1, 1).unwrap()
    }

    /// Two zones with an air boundary sensor between them and one outdoor sensor.
    #[fixture]
    fn enclosure() -> EnclosureMap {
        EnclosureMap::from_reader(
            json!({
                "mapper": ["Zone1", "Zone2"],
                "has_indoor": true,
                "has_outdoor": true,
                "sensor_indices": [0, 1, 0, 2],
                "air_bound_proximity": {"2": [{"0": 0.5, "1": 0.5}]}
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    #[fixture]
    fn store(period: AnalysisPeriod) -> InMemoryResultStore {
        let mut store = InMemoryResultStore::new(period);
        for (zone, air, rh) in [("ZONE1", [20., 21.], 45.), ("ZONE2", [24., 23.], 55.)] {
            store.insert(ZONE_AIR_TEMPERATURE, zone, air.to_vec()).unwrap();
            store.insert(ZONE_RADIANT_TEMPERATURE, zone, air.to_vec()).unwrap();
            store.insert(ZONE_RELATIVE_HUMIDITY, zone, vec![rh; 2]).unwrap();
        }
        store
    }

    fn inputs<'a>(
        enclosure: &'a EnclosureMap,
        store: &'a InMemoryResultStore,
        climate: &'a ClimateData,
    ) -> ThermalMapInputs<'a> {
        ThermalMapInputs {
            enclosure,
            store: Some(store),
            climate,
            run_period: None,
            irradiance: None,
            solarcal: SolarCalParameter::default(),
            air_speed: None,
            met_rate: None,
            clo_value: None,
        }
    }

    #[rstest]
    fn should_map_pmv_over_every_sensor(
        enclosure: EnclosureMap,
        store: InMemoryResultStore,
        climate: ClimateData,
    ) {
        let model = ComfortModelChoice::Pmv(PmvModel::new(
            PmvParameter::default(),
            TemperatureMetric::Operative,
        ));
        let map = compute_thermal_map(&inputs(&enclosure, &store, &climate), model).unwrap();

        assert_eq!(map.sensors.len(), 4);
        for series in &map.sensors {
            assert_eq!(series.temperature.len(), 2);
            assert!(series.condition.iter().all(|c| [-1, 0, 1].contains(c)));
        }
        // operative temperature of the blended sensor is the mean of both zones
        assert_eq!(map.sensors[2].temperature, vec![22., 22.]);
        // outdoors at 5 and 6 C is cold
        assert_eq!(map.sensors[3].temperature, vec![5., 6.]);
        assert_eq!(map.sensors[3].condition, vec![-1, -1]);
    }

    #[rstest]
    fn should_map_adaptive_comfort(
        enclosure: EnclosureMap,
        store: InMemoryResultStore,
        climate: ClimateData,
    ) {
        let map = compute_thermal_map(
            &inputs(&enclosure, &store, &climate),
            ComfortModelChoice::Adaptive(AdaptiveParameter::default()),
        )
        .unwrap();
        assert_eq!(map.sensors[0].temperature, vec![20., 21.]);
        assert!(map
            .condition()
            .flatten()
            .all(|c| ModelKind::Adaptive.conditions().contains(c)));
    }

    /// Reports the wind speed so that the resolved air speed is visible in the output.
    struct WindEcho;

    impl UtciRegression for WindEcho {
        fn utci(&self, _ta: f64, _tr: f64, vel: f64, _rh: f64) -> f64 {
            vel
        }
    }

    #[rstest]
    fn should_use_meteorological_wind_for_utci(
        enclosure: EnclosureMap,
        store: InMemoryResultStore,
        climate: ClimateData,
    ) {
        let map = compute_thermal_map(
            &inputs(&enclosure, &store, &climate),
            ComfortModelChoice::Utci(UtciParameter::default(), Box::new(WindEcho)),
        )
        .unwrap();
        assert_eq!(map.sensors[0].temperature, vec![0.5, 0.5]);
        assert_eq!(map.sensors[3].temperature, vec![3.5, 3.5]);
    }

    #[rstest]
    fn should_map_utci_stress(
        enclosure: EnclosureMap,
        store: InMemoryResultStore,
        climate: ClimateData,
    ) {
        let map = compute_thermal_map(
            &inputs(&enclosure, &store, &climate),
            ComfortModelChoice::utci(UtciParameter::default()),
        )
        .unwrap();

        // outdoors the radiant temperature is the air temperature and the wind is 3.5 m/s
        assert_eq!(
            map.sensors[3].temperature,
            vec![Utci2012.utci(5., 5., 3.5, 70.), Utci2012.utci(6., 6., 3.5, 70.)]
        );
        assert_eq!(map.sensors[3].condition, vec![-1, -1]);
        assert_eq!(map.sensors[3].condition_intensity, vec![-2., -2.]);
        assert_eq!(map.sensors[0].condition, vec![0, 0]);
        assert_eq!(map.sensors[0].condition_intensity, vec![0., 0.]);
    }

    #[rstest]
    fn should_map_outdoor_sensors_without_zone_results(
        climate: ClimateData,
        period: AnalysisPeriod,
    ) {
        let enclosure = EnclosureMap::from_reader(
            json!({
                "mapper": ["Zone1"],
                "has_indoor": false,
                "has_outdoor": true,
                "sensor_indices": [1, 1]
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap();
        let inputs = ThermalMapInputs {
            enclosure: &enclosure,
            store: None,
            climate: &climate,
            run_period: Some(period),
            irradiance: None,
            solarcal: SolarCalParameter::default(),
            air_speed: None,
            met_rate: None,
            clo_value: None,
        };
        let map =
            compute_thermal_map(&inputs, ComfortModelChoice::utci(UtciParameter::default())).unwrap();

        let expected = vec![Utci2012.utci(5., 5., 3.5, 70.), Utci2012.utci(6., 6., 3.5, 70.)];
        assert_eq!(map.sensors[0].temperature, expected);
        assert_eq!(map.sensors[1].temperature, expected);
    }

    #[rstest]
    fn should_reject_misaligned_met_rate(
        enclosure: EnclosureMap,
        store: InMemoryResultStore,
        climate: ClimateData,
    ) {
        let inputs = ThermalMapInputs {
            met_rate: Some(PersonalParameter::Series(vec![1.1, 1.2, 1.3])),
            ..inputs(&enclosure, &store, &climate)
        };
        let result = compute_thermal_map(
            &inputs,
            ComfortModelChoice::Adaptive(AdaptiveParameter::default()),
        );
        assert!(matches!(
            result,
            Err(ThermalMapError::ParameterAlignment { expected: 2, found: 3, .. })
        ));
    }

    #[rstest]
    fn should_write_all_three_matrices(period: AnalysisPeriod) {
        let map = ThermalMap {
            period,
            sensors: vec![
                ComfortSeries {
                    temperature: vec![21.5, 22.],
                    condition: vec![0, 1],
                    condition_intensity: vec![0.25, 1.],
                },
                ComfortSeries {
                    temperature: vec![18., 17.5],
                    condition: vec![-1, -1],
                    condition_intensity: vec![-1.5, -2.],
                },
            ],
        };
        let output = MemoryOutput::default();
        let paths = write_thermal_map(&output, &map).unwrap();

        assert_eq!(
            paths.keys().collect::<Vec<_>>(),
            vec!["temperature", "condition", "condition_intensity"]
        );
        assert_eq!(paths["condition"], "memory://condition.csv");
        let files = output.files.borrow();
        assert_eq!(
            String::from_utf8(files["temperature"].clone()).unwrap(),
            "21.5,22\n18,17.5\n"
        );
        assert_eq!(
            String::from_utf8(files["condition"].clone()).unwrap(),
            "0,1\n-1,-1\n"
        );
    }

    #[rstest]
    fn should_not_leave_partial_results(period: AnalysisPeriod) {
        let map = ThermalMap {
            period,
            sensors: vec![ComfortSeries {
                temperature: vec![21.5, 22.],
                condition: vec![0, 1],
                condition_intensity: vec![0.25, 1.],
            }],
        };
        let output = MemoryOutput {
            fail_on: Some(CONDITION_INTENSITY_KEY),
            ..Default::default()
        };
        assert!(write_thermal_map(&output, &map).is_err());
        assert!(output.files.borrow().is_empty());
    }
}
