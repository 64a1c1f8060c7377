use crate::errors::ThermalMapError;
use crate::input::{ingest_enclosure_info, EnclosureInfo};
use crate::result_store::ZoneResultStore;
use crate::series::TimeSeries;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::Read;
use tracing::debug;

/// One weighted blend of two source series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendPair {
    pub first: (usize, f64),
    pub second: (usize, f64),
}

/// How a sensor's series is derived from the source series (zones in order, then outdoors).
#[derive(Clone, Debug, PartialEq)]
pub enum SensorStrategy {
    DirectIndex(usize),
    /// Average of the weighted sums of each pair. Sensors near an air boundary get this in
    /// place of their home zone index, which is never consulted again.
    BlendedIndices(Vec<BlendPair>),
}

/// Validated, immutable description of which zone (or zones, or the outdoors) each sensor
/// takes its conditions from.
#[derive(Clone, Debug)]
pub struct EnclosureMap {
    zone_order: Vec<String>,
    has_indoor: bool,
    has_outdoor: bool,
    strategies: Vec<SensorStrategy>,
}

impl EnclosureMap {
    pub fn from_reader(json: impl Read) -> Result<Self, ThermalMapError> {
        Self::from_info(ingest_enclosure_info(json)?)
    }

    pub fn from_info(info: EnclosureInfo) -> Result<Self, ThermalMapError> {
        let EnclosureInfo {
            mapper,
            has_indoor,
            has_outdoor,
            sensor_indices,
            air_bound_proximity,
        } = info;

        // result stores do not share our case convention, so compare upper-cased
        let zone_order = mapper
            .iter()
            .map(|zone| zone.to_uppercase())
            .collect::<Vec<_>>();
        let mut seen = HashSet::new();
        if let Some(duplicate) = zone_order.iter().find(|zone| !seen.insert(*zone)) {
            return Err(malformed(format!("zone '{duplicate}' appears more than once")));
        }

        let source_count = zone_order.len() + usize::from(has_outdoor);
        let check_index = |idx: usize, context: &str| -> Result<usize, ThermalMapError> {
            if idx >= source_count {
                return Err(malformed(format!(
                    "{context} refers to index {idx} but only {source_count} zone and outdoor slots exist"
                )));
            }
            if !has_indoor && idx < zone_order.len() {
                return Err(malformed(format!(
                    "{context} refers to indoor zone {idx} but has_indoor is false"
                )));
            }
            Ok(idx)
        };

        let mut strategies = sensor_indices
            .iter()
            .enumerate()
            .map(|(sensor, idx)| {
                check_index(*idx, &format!("sensor {sensor}")).map(SensorStrategy::DirectIndex)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (sensor_key, blends) in &air_bound_proximity {
            let sensor = sensor_key
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|sensor| *sensor < strategies.len())
                .ok_or_else(|| {
                    malformed(format!(
                        "air boundary entry '{sensor_key}' is not one of the {} sensor indices",
                        strategies.len()
                    ))
                })?;
            if blends.is_empty() {
                return Err(malformed(format!(
                    "sensor {sensor} has an air boundary entry with no blends"
                )));
            }
            let pairs = blends
                .iter()
                .map(|blend| blend_pair(sensor, blend, &check_index))
                .collect::<Result<Vec<_>, _>>()?;
            strategies[sensor] = SensorStrategy::BlendedIndices(pairs);
        }

        debug!(
            zones = zone_order.len(),
            sensors = strategies.len(),
            blended = air_bound_proximity.len(),
            "loaded enclosure information"
        );

        Ok(Self {
            zone_order,
            has_indoor,
            has_outdoor,
            strategies,
        })
    }

    pub fn zone_order(&self) -> &[String] {
        &self.zone_order
    }

    pub fn has_indoor(&self) -> bool {
        self.has_indoor
    }

    pub fn has_outdoor(&self) -> bool {
        self.has_outdoor
    }

    pub fn sensor_count(&self) -> usize {
        self.strategies.len()
    }

    /// Number of source series sensors can index into: every zone, plus the outdoors when present.
    pub fn source_count(&self) -> usize {
        self.zone_order.len() + usize::from(self.has_outdoor)
    }

    pub fn strategies(&self) -> &[SensorStrategy] {
        &self.strategies
    }

    /// Series of the given indoor output for every zone, in zone order.
    pub fn zone_series_for(
        &self,
        store: &dyn ZoneResultStore,
        output_name: &str,
    ) -> Result<Vec<TimeSeries>, ThermalMapError> {
        let by_zone: IndexMap<String, TimeSeries> = store
            .series_for(output_name)?
            .into_iter()
            .map(|(zone, series)| (zone.to_uppercase(), series))
            .collect();

        self.zone_order
            .iter()
            .map(|zone| {
                by_zone
                    .get(zone)
                    .cloned()
                    .ok_or_else(|| ThermalMapError::MissingZoneData {
                        zone: zone.clone(),
                        output: output_name.to_string(),
                    })
            })
            .collect()
    }
}

fn blend_pair(
    sensor: usize,
    blend: &IndexMap<String, f64>,
    check_index: &impl Fn(usize, &str) -> Result<usize, ThermalMapError>,
) -> Result<BlendPair, ThermalMapError> {
    let context = format!("air boundary blend for sensor {sensor}");
    let weighted = blend
        .iter()
        .map(|(zone_key, weight)| {
            let idx = zone_key
                .trim()
                .parse::<usize>()
                .map_err(|_| malformed(format!("{context} has non-numeric zone '{zone_key}'")))?;
            if !weight.is_finite() {
                return Err(malformed(format!("{context} has a non-finite weight")));
            }
            Ok((check_index(idx, &context)?, *weight))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match weighted.as_slice() {
        [first, second] => {
            if !is_close!(first.1 + second.1, 1.0, rel_tol = 1e-6, abs_tol = 1e-6) {
                return Err(malformed(format!(
                    "{context} has weights summing to {} rather than 1",
                    first.1 + second.1
                )));
            }
            Ok(BlendPair {
                first: *first,
                second: *second,
            })
        }
        _ => Err(malformed(format!(
            "{context} must blend exactly two zones, found {}",
            weighted.len()
        ))),
    }
}

fn malformed(message: String) -> ThermalMapError {
    ThermalMapError::MalformedEnclosure(message)
}
