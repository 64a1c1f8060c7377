//! Adaptive thermal comfort after ASHRAE-55 and EN-16798, for occupants who can adapt to the
//! outdoor climate through clothing and window operation.

use super::{ComfortModel, ComfortSeries, ModelKind, SensorConditions};
use crate::analysis_period::{
    month_of_hour, month_start_end_hours, AnalysisPeriod, HOURS_IN_DAY, HOURS_IN_YEAR,
};
use crate::errors::ThermalMapError;
use crate::input::{parse_parameter_number, parse_parameter_string, unknown_parameter};
use crate::series::TimeSeries;
use anyhow::bail;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};

// weights of the previous seven days in the running mean outdoor temperature
const RUNNING_MEAN_WEIGHTS: [f64; 7] = [1.0, 0.8, 0.6, 0.5, 0.4, 0.3, 0.2];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Deserialize, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum AdaptiveStandard {
    #[strum(to_string = "ASHRAE-55")]
    #[serde(rename = "ASHRAE-55")]
    Ashrae55,
    #[strum(to_string = "EN-16798", serialize = "EN-15251")]
    #[serde(rename = "EN-16798")]
    En16798,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Deserialize, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum PrevailingMethod {
    AveragedMonthly,
    RunningMean,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, Deserialize, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum AirSpeedMethod {
    Discrete,
    Continuous,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct AdaptiveParameter {
    pub standard: AdaptiveStandard,
    /// Degrees C either side of the neutral temperature that remain comfortable.
    pub neutral_offset: f64,
    pub prevailing_method: PrevailingMethod,
    pub air_speed_method: AirSpeedMethod,
    /// Prevailing outdoor temperature below which occupants no longer adapt.
    pub cold_prevail_temp_limit: f64,
    /// 0 for a free-running building up to 1 for a fully conditioned one.
    pub conditioning: f64,
}

impl Default for AdaptiveParameter {
    fn default() -> Self {
        Self::for_standard(AdaptiveStandard::Ashrae55)
    }
}

impl AdaptiveParameter {
    pub fn for_standard(standard: AdaptiveStandard) -> Self {
        let (neutral_offset, prevailing_method) = match standard {
            AdaptiveStandard::Ashrae55 => (2.5, PrevailingMethod::AveragedMonthly),
            AdaptiveStandard::En16798 => (3., PrevailingMethod::RunningMean),
        };
        Self {
            standard,
            neutral_offset,
            prevailing_method,
            air_speed_method: AirSpeedMethod::Discrete,
            cold_prevail_temp_limit: 10.,
            conditioning: 0.,
        }
    }

    fn validate(self) -> Result<Self, ThermalMapError> {
        let invalid = |message: String| Err(ThermalMapError::InvalidParameter(message));
        if !(10.0..=22.).contains(&self.cold_prevail_temp_limit) {
            return invalid(format!(
                "--cold-limit must be between 10 and 22, got {}",
                self.cold_prevail_temp_limit
            ));
        }
        if !(0.0..=1.).contains(&self.conditioning) {
            return invalid(format!(
                "--conditioning must be between 0 and 1, got {}",
                self.conditioning
            ));
        }
        if !(self.neutral_offset > 0. && self.neutral_offset <= 10.) {
            return invalid(format!(
                "--neutral-offset must be above 0 and at most 10, got {}",
                self.neutral_offset
            ));
        }
        Ok(self)
    }

    /// Neutral operative temperature for a prevailing outdoor temperature.
    pub fn neutral_temperature(&self, t_prevail: f64) -> f64 {
        let (slope, intercept, upper_limit) = match self.standard {
            AdaptiveStandard::Ashrae55 => (0.31, 17.8, 33.5),
            AdaptiveStandard::En16798 => (0.33, 18.8, 30.),
        };
        let t_prevail = t_prevail.clamp(self.cold_prevail_temp_limit, upper_limit);
        let conditioning = self.conditioning;

        (0.09 * conditioning + slope * (1. - conditioning)) * t_prevail
            + (22.6 * conditioning + intercept * (1. - conditioning))
    }

    /// Operative temperature below which conditions cannot be comfortable.
    pub fn minimum_operative(&self) -> f64 {
        self.neutral_temperature(self.cold_prevail_temp_limit) - self.neutral_offset
    }

    /// Extra degrees of tolerated warmth from elevated air speed.
    pub fn cooling_effect(&self, air_speed: f64, operative: f64) -> f64 {
        match self.air_speed_method {
            AirSpeedMethod::Discrete if air_speed >= 0.6 && operative >= 25. => {
                if air_speed < 0.9 {
                    1.2
                } else if air_speed < 1.2 {
                    1.8
                } else {
                    2.2
                }
            }
            AirSpeedMethod::Continuous if air_speed >= 0.2 && operative >= 25. => {
                1.7856 * air_speed.ln() + 2.9835
            }
            _ => 0.,
        }
    }

    pub fn is_comfortable(&self, operative: f64, degrees_from_neutral: f64, cooling_effect: f64) -> bool {
        let lower = match self.standard {
            AdaptiveStandard::Ashrae55 => -self.neutral_offset,
            AdaptiveStandard::En16798 => -self.neutral_offset - 1.,
        };
        operative >= self.minimum_operative()
            && degrees_from_neutral >= lower
            && degrees_from_neutral <= self.neutral_offset + cooling_effect
    }

    pub fn thermal_condition(&self, operative: f64, degrees_from_neutral: f64, cooling_effect: f64) -> i32 {
        if self.is_comfortable(operative, degrees_from_neutral, cooling_effect) {
            0
        } else if degrees_from_neutral > 0. {
            1
        } else {
            -1
        }
    }
}

/// Parses strings such as `--standard EN-16798 --neutral-offset 3 --prevail-method RunningMean
/// --air-speed-method Continuous --cold-limit 12 --conditioning 0.5`. Unset values take the
/// defaults of the chosen standard.
impl FromStr for AdaptiveParameter {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = parse_parameter_string(s)?;
        let standard = match values.shift_remove("standard") {
            Some(standard) => standard.parse::<AdaptiveStandard>().map_err(|_| {
                ThermalMapError::InvalidParameter(format!(
                    "--standard must be ASHRAE-55 or EN-16798, got '{standard}'"
                ))
            })?,
            None => AdaptiveStandard::Ashrae55,
        };

        let mut parameter = Self::for_standard(standard);
        for (key, value) in values {
            let invalid_choice = |choices: &str| {
                ThermalMapError::InvalidParameter(format!("--{key} must be one of {choices}, got '{value}'"))
            };
            match key.as_str() {
                "neutral-offset" => parameter.neutral_offset = parse_parameter_number(&key, &value)?,
                "prevail-method" => {
                    parameter.prevailing_method = value
                        .parse()
                        .map_err(|_| invalid_choice("AveragedMonthly, RunningMean"))?
                }
                "air-speed-method" => {
                    parameter.air_speed_method = value
                        .parse()
                        .map_err(|_| invalid_choice("Discrete, Continuous"))?
                }
                "cold-limit" => {
                    parameter.cold_prevail_temp_limit = parse_parameter_number(&key, &value)?
                }
                "conditioning" => parameter.conditioning = parse_parameter_number(&key, &value)?,
                _ => return Err(unknown_parameter("Adaptive", &key)),
            }
        }
        parameter.validate()
    }
}

/// Prevailing outdoor temperature for every hour of the year from an annual hourly outdoor
/// air temperature series.
pub fn prevailing_temperature(
    outdoor_temperature: &TimeSeries,
    method: PrevailingMethod,
) -> Result<Vec<f64>, ThermalMapError> {
    let temperatures = outdoor_temperature.values();
    if !outdoor_temperature.period().is_annual()
        || outdoor_temperature.period().timestep() != 1
        || temperatures.len() != HOURS_IN_YEAR as usize
    {
        return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
            "prevailing temperature needs an annual hourly series, got '{}'",
            outdoor_temperature.period()
        )));
    }

    let hourly = match method {
        PrevailingMethod::AveragedMonthly => {
            let monthly_means = (0..12)
                .map(|month| {
                    let (start, end) = month_start_end_hours(month);
                    let hours = &temperatures[start as usize..end as usize];
                    hours.iter().sum::<f64>() / hours.len() as f64
                })
                .collect::<Vec<_>>();
            (0..HOURS_IN_YEAR)
                .map(|hour| month_of_hour(hour).map_or(f64::NAN, |month| monthly_means[month]))
                .collect()
        }
        PrevailingMethod::RunningMean => {
            let daily_means = temperatures
                .iter()
                .chunks(HOURS_IN_DAY as usize)
                .into_iter()
                .map(|day| {
                    let (sum, count) = day.fold((0., 0), |(sum, count), t| (sum + t, count + 1));
                    sum / count as f64
                })
                .collect::<Vec<f64>>();
            let day_count = daily_means.len() as isize;
            let total_weight: f64 = RUNNING_MEAN_WEIGHTS.iter().sum();
            let running_means = (0..day_count)
                .map(|day| {
                    RUNNING_MEAN_WEIGHTS
                        .iter()
                        .enumerate()
                        .map(|(i, weight)| {
                            // days before 1 January wrap round to the end of the year
                            let previous = (day - 1 - i as isize).rem_euclid(day_count);
                            weight * daily_means[previous as usize]
                        })
                        .sum::<f64>()
                        / total_weight
                })
                .collect::<Vec<_>>();
            running_means
                .iter()
                .flat_map(|mean| std::iter::repeat(*mean).take(HOURS_IN_DAY as usize))
                .collect()
        }
    };

    Ok(hourly)
}

#[derive(Clone, Debug)]
pub struct AdaptiveModel {
    pub parameter: AdaptiveParameter,
    /// Prevailing outdoor temperature at every timestep of the analysis period, shared by all
    /// sensors.
    prevailing: Arc<[f64]>,
}

impl AdaptiveModel {
    pub fn new(parameter: AdaptiveParameter, prevailing: Arc<[f64]>) -> Self {
        Self {
            parameter,
            prevailing,
        }
    }

    /// Derives the prevailing temperature from a full year of outdoor temperatures and aligns
    /// it to the analysis period.
    pub fn from_climate(
        parameter: AdaptiveParameter,
        outdoor_temperature: &TimeSeries,
        period: &AnalysisPeriod,
    ) -> Result<Self, ThermalMapError> {
        let hourly = TimeSeries::new(
            AnalysisPeriod::default(),
            prevailing_temperature(outdoor_temperature, parameter.prevailing_method)?,
        )?;
        let prevailing = hourly.align_annual_hourly(period)?;
        Ok(Self::new(parameter, prevailing.values().clone()))
    }

    pub fn prevailing(&self) -> &Arc<[f64]> {
        &self.prevailing
    }
}

impl ComfortModel for AdaptiveModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Adaptive
    }

    fn evaluate(&self, conditions: &SensorConditions) -> anyhow::Result<ComfortSeries> {
        if self.prevailing.len() != conditions.len() {
            bail!(
                "prevailing outdoor temperature has {} values for {} timesteps",
                self.prevailing.len(),
                conditions.len()
            );
        }

        let mut series = ComfortSeries::with_capacity(conditions.len());
        for (step, t_prevail) in self.prevailing.iter().enumerate() {
            let c = conditions.at(step);
            let operative = (c.ta + c.tr) / 2.;
            let degrees_from_neutral = operative - self.parameter.neutral_temperature(*t_prevail);
            let cooling_effect = self.parameter.cooling_effect(c.vel, operative);
            series.push(
                operative,
                self.parameter
                    .thermal_condition(operative, degrees_from_neutral, cooling_effect),
                degrees_from_neutral,
            );
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn ashrae() -> AdaptiveParameter {
        AdaptiveParameter::default()
    }

    #[fixture]
    fn en() -> AdaptiveParameter {
        AdaptiveParameter::for_standard(AdaptiveStandard::En16798)
    }

    /// Each month's hours sit at the month's number in degrees.
    #[fixture]
    fn stepped_year() -> TimeSeries {
        let values = (0..HOURS_IN_YEAR)
            .map(|hour| month_of_hour(hour).unwrap() as f64 + 1.)
            .collect::<Vec<_>>();
        TimeSeries::new(AnalysisPeriod::default(), values).unwrap()
    }

    #[rstest]
    fn should_compute_neutral_temperature(ashrae: AdaptiveParameter, en: AdaptiveParameter) {
        assert_relative_eq!(ashrae.neutral_temperature(20.), 0.31 * 20. + 17.8, epsilon = 1e-9);
        assert_relative_eq!(en.neutral_temperature(20.), 0.33 * 20. + 18.8, epsilon = 1e-9);
        // prevailing temperatures are limited to the range of the standard
        assert_relative_eq!(ashrae.neutral_temperature(40.), 0.31 * 33.5 + 17.8, epsilon = 1e-9);
        assert_relative_eq!(en.neutral_temperature(40.), 0.33 * 30. + 18.8, epsilon = 1e-9);
        assert_relative_eq!(ashrae.neutral_temperature(-5.), 0.31 * 10. + 17.8, epsilon = 1e-9);
    }

    #[rstest]
    fn should_blend_towards_conditioned_neutral_temperature(ashrae: AdaptiveParameter) {
        let conditioned = AdaptiveParameter {
            conditioning: 1.,
            ..ashrae
        };
        assert_relative_eq!(conditioned.neutral_temperature(20.), 0.09 * 20. + 22.6, epsilon = 1e-9);
        let half = AdaptiveParameter {
            conditioning: 0.5,
            ..ashrae
        };
        assert_relative_eq!(half.neutral_temperature(20.), 0.2 * 20. + 20.2, epsilon = 1e-9);
    }

    #[rstest]
    #[case(0.3, 28., 0.)]
    #[case(0.7, 28., 1.2)]
    #[case(1.0, 28., 1.8)]
    #[case(1.5, 28., 2.2)]
    #[case(1.5, 24., 0.)]
    fn should_apply_discrete_cooling_effect(
        #[case] air_speed: f64,
        #[case] operative: f64,
        #[case] expected: f64,
        ashrae: AdaptiveParameter,
    ) {
        assert_eq!(ashrae.cooling_effect(air_speed, operative), expected);
    }

    #[rstest]
    fn should_apply_continuous_cooling_effect(ashrae: AdaptiveParameter) {
        let continuous = AdaptiveParameter {
            air_speed_method: AirSpeedMethod::Continuous,
            ..ashrae
        };
        assert_relative_eq!(continuous.cooling_effect(1.0, 26.), 2.9835, epsilon = 1e-9);
        assert_eq!(continuous.cooling_effect(0.1, 26.), 0.);
    }

    #[rstest]
    fn should_classify_thermal_condition(ashrae: AdaptiveParameter, en: AdaptiveParameter) {
        // neutral at 24 C for a prevailing 20 C under ASHRAE-55
        assert_eq!(ashrae.thermal_condition(24., 0.2, 0.), 0);
        assert_eq!(ashrae.thermal_condition(27., 3., 0.), 1);
        assert_eq!(ashrae.thermal_condition(27., 3., 1.2), 0);
        assert_eq!(ashrae.thermal_condition(21., -3., 0.), -1);
        // EN-16798 tolerates an extra degree on the cool side
        assert_eq!(en.thermal_condition(22., -3.5, 0.), 0);
        // nothing is comfortable below the minimum operative temperature
        assert_eq!(ashrae.thermal_condition(ashrae.minimum_operative() - 0.1, 0., 0.), -1);
    }

    #[rstest]
    fn should_parse_parameter_string() {
        let parameter: AdaptiveParameter =
            "--standard EN-16798 --air-speed-method continuous --cold-limit 12"
                .parse()
                .unwrap();
        assert_eq!(
            parameter,
            AdaptiveParameter {
                standard: AdaptiveStandard::En16798,
                neutral_offset: 3.,
                prevailing_method: PrevailingMethod::RunningMean,
                air_speed_method: AirSpeedMethod::Continuous,
                cold_prevail_temp_limit: 12.,
                conditioning: 0.,
            }
        );
    }

    #[rstest]
    #[case("--cold-limit 25")]
    #[case("--conditioning 1.5")]
    #[case("--neutral-offset 0")]
    #[case("--standard CIBSE")]
    #[case("--prevail-method Weekly")]
    #[case("--ppd-threshold 10")]
    fn should_reject_invalid_parameter_strings(#[case] parameter: &str) {
        assert!(matches!(
            parameter.parse::<AdaptiveParameter>(),
            Err(ThermalMapError::InvalidParameter(_))
        ));
    }

    #[rstest]
    fn should_average_prevailing_temperature_by_month(stepped_year: TimeSeries) {
        let prevailing =
            prevailing_temperature(&stepped_year, PrevailingMethod::AveragedMonthly).unwrap();
        assert_eq!(prevailing.len(), 8760);
        assert_eq!(prevailing[0], 1.);
        assert_eq!(prevailing[744], 2.);
        assert_eq!(prevailing[8759], 12.);
    }

    #[rstest]
    fn should_compute_running_mean_prevailing_temperature(stepped_year: TimeSeries) {
        let prevailing =
            prevailing_temperature(&stepped_year, PrevailingMethod::RunningMean).unwrap();
        // the first week of January looks back into December
        assert_relative_eq!(prevailing[0], 12., epsilon = 1e-9);
        // by 8 January every previous day is in January
        assert_relative_eq!(prevailing[7 * 24], 1., epsilon = 1e-9);
        // 2 January: one January day then six December days
        assert_relative_eq!(prevailing[24], (1. + 12. * 2.8) / 3.8, epsilon = 1e-9);
    }

    #[rstest]
    fn should_align_prevailing_temperature_to_period(stepped_year: TimeSeries) {
        let period = AnalysisPeriod::new(2, 1, 0, 2, 1, 0, 2).unwrap();
        let model = AdaptiveModel::from_climate(
            AdaptiveParameter::default(),
            &stepped_year,
            &period,
        )
        .unwrap();
        assert_eq!(model.prevailing().to_vec(), vec![2., 2.]);
    }

    #[rstest]
    fn should_reject_partial_year_for_prevailing_temperature() {
        let period = AnalysisPeriod::new(1, 1, 0, 1, 1, 23, 1).unwrap();
        let day = TimeSeries::constant(period, 20.);
        assert!(prevailing_temperature(&day, PrevailingMethod::RunningMean).is_err());
    }

    #[rstest]
    fn should_evaluate_sensor(ashrae: AdaptiveParameter) {
        let model = AdaptiveModel::new(ashrae, vec![20., 20.].into());
        let (ta, tr, rh) = ([24., 30.], [24., 30.], [50., 50.]);
        let (vel, met, clo) = ([0.1, 0.1], [1.1, 1.1], [0.7, 0.7]);
        let conditions = SensorConditions {
            air_temperature: &ta,
            radiant_temperature: &tr,
            relative_humidity: &rh,
            air_speed: &vel,
            met_rate: &met,
            clo_value: &clo,
        };
        let series = model.evaluate(&conditions).unwrap();
        assert_eq!(series.temperature, vec![24., 30.]);
        assert_eq!(series.condition, vec![0, 1]);
        assert_relative_eq!(series.condition_intensity[1], 30. - 24., epsilon = 1e-9);
    }
}
