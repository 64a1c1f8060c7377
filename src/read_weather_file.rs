use crate::analysis_period::{AnalysisPeriod, HOURS_IN_YEAR};
use crate::errors::ThermalMapError;
use crate::series::TimeSeries;
use csv::ReaderBuilder as CsvReaderBuilder;
use std::io::Read;

const COLUMN_LATITUDE: usize = 6;
const COLUMN_LONGITUDE: usize = 7;
const COLUMN_TIME_ZONE: usize = 8; // hours from UTC
const COLUMN_AIR_TEMP: usize = 6; // dry bulb temp in degrees
const COLUMN_RELATIVE_HUMIDITY: usize = 8; // in %
const COLUMN_WIND_SPEED: usize = 21; // wind speed in m/sec at 10m
const FIRST_DATA_ROW: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: f64,
}

/// Annual hourly outdoor conditions read from an EPW file.
#[derive(Clone, Debug)]
pub struct ClimateData {
    pub location: Location,
    pub dry_bulb_temperature: TimeSeries,
    pub relative_humidity: TimeSeries,
    pub wind_speed: TimeSeries,
}

pub fn weather_data_to_climate(file: impl Read) -> Result<ClimateData, ThermalMapError> {
    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut air_temperatures = vec![];
    let mut relative_humidities = vec![];
    let mut wind_speeds = vec![];
    let mut location: Option<Location> = None;

    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| ThermalMapError::ClimateData(e.to_string()))?;
        let field = |column: usize| -> Result<f64, ThermalMapError> {
            record
                .get(column)
                .and_then(|value| value.trim().parse().ok())
                .ok_or_else(|| {
                    ThermalMapError::ClimateData(format!(
                        "row {} has no numeric value in column {column}",
                        i + 1
                    ))
                })
        };
        if i == 0 {
            location = Some(Location {
                latitude: field(COLUMN_LATITUDE)?,
                longitude: field(COLUMN_LONGITUDE)?,
                time_zone: field(COLUMN_TIME_ZONE)?,
            });
        } else if i >= FIRST_DATA_ROW {
            air_temperatures.push(field(COLUMN_AIR_TEMP)?);
            relative_humidities.push(field(COLUMN_RELATIVE_HUMIDITY)?);
            wind_speeds.push(field(COLUMN_WIND_SPEED)?);
        }
    }

    let location = location
        .ok_or_else(|| ThermalMapError::ClimateData("file has no LOCATION header".into()))?;
    if air_temperatures.len() != HOURS_IN_YEAR as usize {
        return Err(ThermalMapError::ClimateData(format!(
            "expected {HOURS_IN_YEAR} hourly records but found {}",
            air_temperatures.len()
        )));
    }

    let annual = AnalysisPeriod::default();
    Ok(ClimateData {
        location,
        dry_bulb_temperature: TimeSeries::new(annual, air_temperatures)?,
        relative_humidity: TimeSeries::new(annual, relative_humidities)?,
        wind_speed: TimeSeries::new(annual, wind_speeds)?,
    })
}
