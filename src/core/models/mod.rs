pub mod adaptive;
pub mod pmv;
pub mod solarcal;
pub mod utci;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Resolved inputs for one sensor, index-aligned over the analysis period.
#[derive(Clone, Copy, Debug)]
pub struct SensorConditions<'a> {
    pub air_temperature: &'a [f64],
    pub radiant_temperature: &'a [f64],
    pub relative_humidity: &'a [f64],
    pub air_speed: &'a [f64],
    pub met_rate: &'a [f64],
    pub clo_value: &'a [f64],
}

impl SensorConditions<'_> {
    pub fn len(&self) -> usize {
        self.air_temperature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.air_temperature.is_empty()
    }

    /// The inputs at one timestep.
    pub fn at(&self, step: usize) -> Conditions {
        Conditions {
            ta: self.air_temperature[step],
            tr: self.radiant_temperature[step],
            rh: self.relative_humidity[step],
            vel: self.air_speed[step],
            met: self.met_rate[step],
            clo: self.clo_value[step],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Conditions {
    pub ta: f64,
    pub tr: f64,
    pub rh: f64,
    pub vel: f64,
    pub met: f64,
    pub clo: f64,
}

/// Per-timestep results of a comfort model for one sensor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComfortSeries {
    pub temperature: Vec<f64>,
    pub condition: Vec<i32>,
    pub condition_intensity: Vec<f64>,
}

impl ComfortSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            temperature: Vec::with_capacity(capacity),
            condition: Vec::with_capacity(capacity),
            condition_intensity: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, temperature: f64, condition: i32, condition_intensity: f64) {
        self.temperature.push(temperature);
        self.condition.push(condition);
        self.condition_intensity.push(condition_intensity);
    }
}

/// A thermal comfort model evaluated over the full series of one sensor at a time.
pub trait ComfortModel: Sync {
    fn kind(&self) -> ModelKind;

    fn evaluate(&self, conditions: &SensorConditions) -> anyhow::Result<ComfortSeries>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Deserialize, Serialize)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    Pmv,
    Adaptive,
    Utci,
}

impl ModelKind {
    /// Values the thermal condition output may take.
    pub fn conditions(&self) -> &'static [i32] {
        &[-1, 0, 1]
    }

    /// Default air speed, in m/s, for sensors without a supplied value.
    pub fn default_air_speed(&self) -> f64 {
        match self {
            ModelKind::Pmv | ModelKind::Adaptive => 0.1,
            ModelKind::Utci => 0.5,
        }
    }
}

/// Saturation vapour pressure over water in Pa.
pub(crate) fn saturated_vapor_pressure(ta: f64) -> f64 {
    (16.6536 - 4030.183 / (ta + 235.)).exp() * 1000.
}

/// Saturation vapour pressure over water in torr.
pub(crate) fn saturated_vapor_pressure_torr(ta: f64) -> f64 {
    (18.6686 - 4030.183 / (ta + 235.)).exp()
}
