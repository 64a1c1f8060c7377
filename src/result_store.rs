use crate::analysis_period::{AnalysisPeriod, HOURS_IN_DAY};
use crate::errors::ThermalMapError;
use crate::series::TimeSeries;
use anyhow::{anyhow, bail};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use std::fmt::Debug;
use std::io::Read;
use tracing::debug;

pub const ZONE_AIR_TEMPERATURE: &str = "Zone Mean Air Temperature";
pub const ZONE_RELATIVE_HUMIDITY: &str = "Zone Air Relative Humidity";
pub const ZONE_RADIANT_TEMPERATURE: &str = "Zone Mean Radiant Temperature";

/// Source of zone-level simulation results.
pub trait ZoneResultStore: Debug + Sync {
    /// Every series recorded for the named output, keyed by zone or system identifier.
    fn series_for(
        &self,
        output_name: &str,
    ) -> Result<IndexMap<String, TimeSeries>, ThermalMapError>;

    /// The period covered by this store's results.
    fn reporting_period(&self) -> AnalysisPeriod;
}

/// Results read from the CSV report of an EnergyPlus run, where the header names each column
/// as `KEY:Output Name [unit](Frequency)` and each row starts with an `MM/DD  HH:MM:SS` stamp
/// marking the end of its timestep.
#[derive(Debug)]
pub struct EnergyPlusCsvStore {
    period: AnalysisPeriod,
    // output name (lowercase) -> key -> values
    columns: IndexMap<String, IndexMap<String, Vec<f64>>>,
}

impl EnergyPlusCsvStore {
    pub fn from_reader(csv: impl Read) -> anyhow::Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(csv);

        let headers = reader
            .headers()?
            .iter()
            .skip(1)
            .map(parse_column_header)
            .collect::<Vec<_>>();

        let mut raw_columns: Vec<Vec<Option<f64>>> = vec![vec![]; headers.len()];
        let mut first_stamp = None;
        let mut last_stamp = None;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let stamp = record
                .get(0)
                .ok_or_else(|| anyhow!("row {row} of the EnergyPlus results has no timestamp"))
                .and_then(parse_timestamp)?;
            first_stamp.get_or_insert(stamp);
            last_stamp = Some(stamp);

            for (column, values) in raw_columns.iter_mut().enumerate() {
                values.push(record.get(column + 1).and_then(|v| v.parse::<f64>().ok()));
            }
        }

        let (Some(first), Some(last)) = (first_stamp, last_stamp) else {
            bail!("EnergyPlus results contain no rows");
        };
        let row_count = raw_columns.first().map_or(0, Vec::len);
        let period = infer_reporting_period(first, last, row_count)?;

        let mut columns: IndexMap<String, IndexMap<String, Vec<f64>>> = IndexMap::new();
        for (header, values) in headers.into_iter().zip(raw_columns) {
            let Some((key, output_name)) = header else {
                continue;
            };
            // columns reported at another frequency are blank on most rows
            let Some(values) = values.into_iter().collect::<Option<Vec<f64>>>() else {
                debug!(%key, %output_name, "skipping incomplete EnergyPlus column");
                continue;
            };
            columns
                .entry(output_name.to_lowercase())
                .or_default()
                .insert(key, values);
        }

        debug!(period = %period, outputs = columns.len(), "read EnergyPlus results");

        Ok(Self { period, columns })
    }
}

impl ZoneResultStore for EnergyPlusCsvStore {
    fn series_for(
        &self,
        output_name: &str,
    ) -> Result<IndexMap<String, TimeSeries>, ThermalMapError> {
        self.columns
            .get(&output_name.to_lowercase())
            .into_iter()
            .flatten()
            .map(|(key, values)| {
                Ok((
                    key.clone(),
                    TimeSeries::new(self.period, values.as_slice())?,
                ))
            })
            .collect()
    }

    fn reporting_period(&self) -> AnalysisPeriod {
        self.period
    }
}

/// Splits `ZONE1:Zone Mean Air Temperature [C](Hourly)` into its upper-cased key and output name.
fn parse_column_header(header: &str) -> Option<(String, String)> {
    let (key, rest) = header.rsplit_once(':')?;
    let output_name = rest
        .split(['[', '('])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    Some((key.trim().to_uppercase(), output_name.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Timestamp {
    month: u32,
    day: u32,
    /// Hours since the start of the day at the end of the timestep.
    hour_ending: f64,
}

fn parse_timestamp(stamp: &str) -> anyhow::Result<Timestamp> {
    let invalid = || anyhow!("'{stamp}' is not an EnergyPlus timestamp");
    let mut parts = stamp.split_whitespace();
    let (month, day) = parts.next().and_then(|date| date.split_once('/')).ok_or_else(invalid)?;
    let time = parts
        .next()
        .ok_or_else(invalid)?
        .split(':')
        .map(|part| part.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    let hour_ending = match time.as_slice() {
        [hours, minutes, seconds] => hours + minutes / 60. + seconds / 3600.,
        [hours, minutes] => hours + minutes / 60.,
        _ => return Err(invalid()),
    };

    Ok(Timestamp {
        month: month.parse().map_err(|_| invalid())?,
        day: day.parse().map_err(|_| invalid())?,
        hour_ending,
    })
}

fn infer_reporting_period(
    first: Timestamp,
    last: Timestamp,
    row_count: usize,
) -> anyhow::Result<AnalysisPeriod> {
    // hour-ending stamps run from just after 00:00 up to 24:00
    let hour_of = |stamp: Timestamp| {
        ((stamp.hour_ending - 1e-9).ceil() as u32)
            .saturating_sub(1)
            .min(HOURS_IN_DAY - 1)
    };
    let st_hour = hour_of(first);
    let end_hour = hour_of(last);

    let hourly = AnalysisPeriod::new(
        first.month,
        first.day,
        st_hour,
        last.month,
        last.day,
        end_hour,
        1,
    )?;
    if row_count == 0 || row_count % hourly.len() != 0 {
        bail!(
            "{row_count} EnergyPlus result rows do not divide evenly into the hours of '{hourly}'"
        );
    }
    let timestep = (row_count / hourly.len()) as u32;

    Ok(AnalysisPeriod::new(
        first.month,
        first.day,
        st_hour,
        last.month,
        last.day,
        end_hour,
        timestep,
    )?)
}

/// A store holding series supplied directly, for callers that already have zone results in
/// memory.
#[derive(Debug)]
pub struct InMemoryResultStore {
    period: AnalysisPeriod,
    series: IndexMap<String, IndexMap<String, TimeSeries>>,
}

impl InMemoryResultStore {
    pub fn new(period: AnalysisPeriod) -> Self {
        Self {
            period,
            series: Default::default(),
        }
    }

    pub fn insert(
        &mut self,
        output_name: &str,
        key: &str,
        values: Vec<f64>,
    ) -> Result<(), ThermalMapError> {
        let series = TimeSeries::new(self.period, values)?;
        self.series
            .entry(output_name.to_lowercase())
            .or_default()
            .insert(key.to_string(), series);
        Ok(())
    }
}

impl ZoneResultStore for InMemoryResultStore {
    fn series_for(
        &self,
        output_name: &str,
    ) -> Result<IndexMap<String, TimeSeries>, ThermalMapError> {
        Ok(self
            .series
            .get(&output_name.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn reporting_period(&self) -> AnalysisPeriod {
        self.period
    }
}
