//! Runs a comfort model over every sensor of the resolved matrices.

use crate::analysis_period::AnalysisPeriod;
use crate::core::models::{ComfortModel, ComfortSeries, SensorConditions};
use crate::core::resolver::ResolvedMatrix;
use crate::errors::ThermalMapError;
use crate::series::TimeSeries;
use anyhow::anyhow;
use rayon::prelude::*;
use std::str::FromStr;
use tracing::info;

/// A personal or air speed input: one value for every timestep, or one value per timestep.
#[derive(Clone, Debug, PartialEq)]
pub enum PersonalParameter {
    Constant(f64),
    Series(Vec<f64>),
}

/// Parses either a single number or a JSON array of numbers.
impl FromStr for PersonalParameter {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('[') {
            serde_json::from_str::<Vec<f64>>(s)
                .map(PersonalParameter::Series)
                .map_err(|e| {
                    ThermalMapError::InvalidParameter(format!("'{s}' is not a list of numbers: {e}"))
                })
        } else {
            s.parse::<f64>().map(PersonalParameter::Constant).map_err(|_| {
                ThermalMapError::InvalidParameter(format!(
                    "'{s}' is neither a number nor a list of numbers"
                ))
            })
        }
    }
}

impl PersonalParameter {
    /// The parameter over the analysis period. A series may cover either the analysis period
    /// itself or the full reporting period of the results, in which case it is filtered down.
    pub fn aligned(
        &self,
        name: &str,
        period: &AnalysisPeriod,
        reporting_period: &AnalysisPeriod,
    ) -> Result<TimeSeries, ThermalMapError> {
        match self {
            PersonalParameter::Constant(value) => Ok(TimeSeries::constant(*period, *value)),
            PersonalParameter::Series(values) if values.len() == period.len() => {
                TimeSeries::new(*period, values.as_slice())
            }
            PersonalParameter::Series(values) if values.len() == reporting_period.len() => {
                TimeSeries::new(*reporting_period, values.as_slice())?
                    .filter_by_analysis_period(period)
            }
            PersonalParameter::Series(values) => Err(ThermalMapError::ParameterAlignment {
                parameter: name.to_string(),
                expected: period.len(),
                found: values.len(),
            }),
        }
    }
}

/// Everything the comfort models need, resolved per sensor over a single analysis period.
#[derive(Clone, Copy, Debug)]
pub struct ComfortInputs<'a> {
    pub air_temperature: &'a ResolvedMatrix,
    pub relative_humidity: &'a ResolvedMatrix,
    pub radiant_temperature: &'a ResolvedMatrix,
    pub air_speed: &'a ResolvedMatrix,
    pub met_rate: &'a TimeSeries,
    pub clo_value: &'a TimeSeries,
}

impl ComfortInputs<'_> {
    fn check_alignment(&self) -> Result<(), ThermalMapError> {
        let period = self.air_temperature.period();
        let sensor_count = self.air_temperature.sensor_count();
        for (name, matrix) in [
            ("relative humidity", self.relative_humidity),
            ("radiant temperature", self.radiant_temperature),
            ("air speed", self.air_speed),
        ] {
            if matrix.period() != period || matrix.sensor_count() != sensor_count {
                return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
                    "{name} covers {} sensors over '{}' but air temperature covers {sensor_count} over '{period}'",
                    matrix.sensor_count(),
                    matrix.period()
                )));
            }
        }
        for (name, series) in [("met rate", self.met_rate), ("clo value", self.clo_value)] {
            if series.len() != period.len() {
                return Err(ThermalMapError::ParameterAlignment {
                    parameter: name.to_string(),
                    expected: period.len(),
                    found: series.len(),
                });
            }
        }
        Ok(())
    }

    fn for_sensor(&self, sensor: usize) -> SensorConditions<'_> {
        SensorConditions {
            air_temperature: &self.air_temperature.rows()[sensor],
            radiant_temperature: &self.radiant_temperature.rows()[sensor],
            relative_humidity: &self.relative_humidity.rows()[sensor],
            air_speed: &self.air_speed.rows()[sensor],
            met_rate: self.met_rate.values(),
            clo_value: self.clo_value.values(),
        }
    }
}

/// Comfort results of every sensor, in sensor order.
#[derive(Clone, Debug, PartialEq)]
pub struct ThermalMap {
    pub period: AnalysisPeriod,
    pub sensors: Vec<ComfortSeries>,
}

impl ThermalMap {
    pub fn temperature(&self) -> impl Iterator<Item = &[f64]> {
        self.sensors.iter().map(|s| s.temperature.as_slice())
    }

    pub fn condition(&self) -> impl Iterator<Item = &[i32]> {
        self.sensors.iter().map(|s| s.condition.as_slice())
    }

    pub fn condition_intensity(&self) -> impl Iterator<Item = &[f64]> {
        self.sensors.iter().map(|s| s.condition_intensity.as_slice())
    }
}

/// Evaluates the model once per sensor. Any failing sensor fails the whole map, reported against
/// the lowest failing sensor index.
pub fn evaluate_comfort_map(
    model: &dyn ComfortModel,
    inputs: &ComfortInputs,
) -> Result<ThermalMap, ThermalMapError> {
    inputs.check_alignment()?;
    let period = *inputs.air_temperature.period();
    info!(
        "Evaluating {} comfort for {} sensors over {} timesteps",
        model.kind(),
        inputs.air_temperature.sensor_count(),
        period.len()
    );

    let results: Vec<Result<ComfortSeries, ThermalMapError>> = (0..inputs.air_temperature.sensor_count())
        .into_par_iter()
        .map(|sensor| {
            model
                .evaluate(&inputs.for_sensor(sensor))
                .and_then(|series| {
                    if series.temperature.len() != period.len()
                        || series.condition.len() != period.len()
                        || series.condition_intensity.len() != period.len()
                    {
                        return Err(anyhow!(
                            "{} model returned results of the wrong length",
                            model.kind()
                        ));
                    }
                    Ok(series)
                })
                .map_err(|source| ThermalMapError::SensorEvaluation {
                    sensor_index: sensor,
                    source,
                })
        })
        .collect();

    let sensors = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    Ok(ThermalMap { period, sensors })
}
