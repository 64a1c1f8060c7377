//! Adds the shortwave solar gain on an exposed body to the baseline mean radiant temperature
//! of every sensor.

use crate::core::models::solarcal::SolarCalParameter;
use crate::core::resolver::ResolvedMatrix;
use crate::errors::ThermalMapError;
use crate::solar_position::SunPath;
use anyhow::{anyhow, bail};
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_GROUND_REFLECTANCE: f64 = 0.25;

/// Irradiance (W/m2) on every sensor at every sun-up hour, one row per sensor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorIrradiance {
    pub total: Vec<Vec<f64>>,
    pub direct: Vec<Vec<f64>>,
    /// Ground-reflected irradiance. Derived from the ground reflectance when absent.
    pub reflected: Option<Vec<Vec<f64>>>,
    /// Hour of the year of every column of the irradiance matrices.
    pub sun_up_hours: Option<Vec<f64>>,
}

/// Reads a Radiance `.ill` matrix: one whitespace separated row per sensor.
pub fn load_ill_matrix(file: impl Read) -> anyhow::Result<Vec<Vec<f64>>> {
    let mut rows = vec![];
    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|value| {
                value.parse::<f64>().map_err(|_| {
                    anyhow!("Irradiance value '{value}' on line {} is not a number", line_number + 1)
                })
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;
        rows.push(row);
    }

    Ok(rows)
}

/// Reads the hours of the year at which the sun is up, one per line.
pub fn load_sun_up_hours(file: impl Read) -> anyhow::Result<Vec<f64>> {
    let mut hours = vec![];
    for line in BufReader::new(file).lines() {
        let line = line?;
        let value = line.trim();
        if value.is_empty() {
            continue;
        }
        let hour: f64 = value
            .parse()
            .map_err(|_| anyhow!("Sun-up hour '{value}' is not a number"))?;
        if !(0.0..8760.).contains(&hour) {
            bail!("Sun-up hour {hour} lies outside the year");
        }
        hours.push(hour);
    }

    Ok(hours)
}

/// Mean radiant temperature of every sensor including shortwave solar gain. Without irradiance
/// the baseline is returned untouched.
pub fn shortwave_mrt_map(
    baseline: ResolvedMatrix,
    irradiance: Option<&SensorIrradiance>,
    sun_path: &SunPath,
    parameter: &SolarCalParameter,
) -> Result<ResolvedMatrix, ThermalMapError> {
    let Some(irradiance) = irradiance else {
        return Ok(baseline);
    };
    let sun_up_hours = irradiance
        .sun_up_hours
        .as_deref()
        .ok_or(ThermalMapError::MissingSunUpHours)?;

    check_matrix_shape("total irradiance", &irradiance.total, baseline.sensor_count(), sun_up_hours.len())?;
    check_matrix_shape("direct irradiance", &irradiance.direct, baseline.sensor_count(), sun_up_hours.len())?;
    if let Some(reflected) = &irradiance.reflected {
        check_matrix_shape("reflected irradiance", reflected, baseline.sensor_count(), sun_up_hours.len())?;
    } else {
        warn!(
            "No reflected irradiance was supplied; assuming a ground reflectance of {DEFAULT_GROUND_REFLECTANCE}"
        );
    }

    let period = *baseline.period();
    let index_by_step: HashMap<u32, usize> = period
        .step_indices()
        .into_iter()
        .enumerate()
        .map(|(idx, step)| (step, idx))
        .collect();

    // an hourly result stands for every timestep of its hour
    let hourly = sun_up_hours.iter().map(|hoy| hoy.floor() as u32).all_unique();
    let steps_per_hour = period.timestep();

    // (column in the irradiance matrices, timestep in the period, sun altitude)
    let sun_up_steps: Vec<(usize, usize, f64)> = sun_up_hours
        .iter()
        .enumerate()
        .flat_map(|(column, hoy)| {
            let steps = if hourly {
                let first = hoy.floor() as u32 * steps_per_hour;
                first..first + steps_per_hour
            } else {
                let step = period.step_of_hoy(*hoy);
                step..step + 1
            };
            let altitude = sun_path.altitude(*hoy);
            steps
                .filter_map(|step| index_by_step.get(&step).map(|idx| (column, *idx, altitude)))
                .collect::<Vec<_>>()
        })
        .collect();
    debug!(
        hourly,
        "{} timesteps of '{period}' are lit by {} sun-up hours",
        sun_up_steps.len(),
        sun_up_hours.len()
    );

    let rows: Vec<Arc<[f64]>> = baseline
        .rows()
        .par_iter()
        .enumerate()
        .map(|(sensor, base)| {
            let mut adjusted = base.to_vec();
            for &(column, step, altitude) in &sun_up_steps {
                let total = irradiance.total[sensor][column];
                let direct = irradiance.direct[sensor][column];
                let diffuse = (total - direct).max(0.);
                let reflected = match &irradiance.reflected {
                    Some(reflected) => reflected[sensor][column],
                    None => {
                        (diffuse + direct * altitude.to_radians().sin())
                            * DEFAULT_GROUND_REFLECTANCE
                    }
                };
                adjusted[step] = base[step] + parameter.mrt_delta(diffuse, direct, reflected, altitude);
            }
            adjusted.into()
        })
        .collect();

    ResolvedMatrix::new(period, rows)
}

fn check_matrix_shape(
    name: &str,
    matrix: &[Vec<f64>],
    sensor_count: usize,
    sun_up_count: usize,
) -> Result<(), ThermalMapError> {
    if matrix.len() != sensor_count {
        return Err(ThermalMapError::ParameterAlignment {
            parameter: format!("{name} (sensor rows)"),
            expected: sensor_count,
            found: matrix.len(),
        });
    }
    if let Some(row) = matrix.iter().find(|row| row.len() != sun_up_count) {
        return Err(ThermalMapError::ParameterAlignment {
            parameter: format!("{name} (sun-up hours)"),
            expected: sun_up_count,
            found: row.len(),
        });
    }
    Ok(())
}
