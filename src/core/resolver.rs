use crate::analysis_period::AnalysisPeriod;
use crate::enclosure::{BlendPair, EnclosureMap, SensorStrategy};
use crate::errors::ThermalMapError;
use crate::read_weather_file::ClimateData;
use crate::result_store::{
    ZoneResultStore, ZONE_AIR_TEMPERATURE, ZONE_RADIANT_TEMPERATURE, ZONE_RELATIVE_HUMIDITY,
};
use crate::series::TimeSeries;
use std::sync::Arc;
use strum::{Display, EnumIter};
use tracing::debug;

// heights (m) of the meteorological wind measurement, a standing person's torso and the
// terrain roughness length used to move between them
const METEOROLOGICAL_HEIGHT: f64 = 10.;
const PEDESTRIAN_HEIGHT: f64 = 1.1;
const ROUGHNESS_LENGTH: f64 = 0.03;

/// A physical quantity that can be resolved for every sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum Quantity {
    AirTemperature,
    RelativeHumidity,
    /// Mean radiant temperature before any solar adjustment.
    RadiantTemperature,
    AirSpeed,
}

impl Quantity {
    /// Zone output recording this quantity, if the zone results have one.
    fn zone_output(&self) -> Option<&'static str> {
        match self {
            Quantity::AirTemperature => Some(ZONE_AIR_TEMPERATURE),
            Quantity::RelativeHumidity => Some(ZONE_RELATIVE_HUMIDITY),
            Quantity::RadiantTemperature => Some(ZONE_RADIANT_TEMPERATURE),
            Quantity::AirSpeed => None,
        }
    }
}

/// How the 10m wind speed of the weather file is used for outdoor sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutdoorWind {
    /// As measured, for models regressed against meteorological wind speed.
    Meteorological,
    /// Reduced to the speed at a standing person's torso with the log wind profile.
    Pedestrian,
}

impl OutdoorWind {
    fn apply(&self, wind_speed: &TimeSeries) -> TimeSeries {
        match self {
            OutdoorWind::Meteorological => wind_speed.clone(),
            OutdoorWind::Pedestrian => wind_speed.map(|speed| {
                speed * (PEDESTRIAN_HEIGHT / ROUGHNESS_LENGTH).ln()
                    / (METEOROLOGICAL_HEIGHT / ROUGHNESS_LENGTH).ln()
            }),
        }
    }
}

/// One series per sensor in sensor order, all over the same analysis period. Rows taken
/// straight from a zone or the outdoors share that source's values.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedMatrix {
    period: AnalysisPeriod,
    rows: Vec<Arc<[f64]>>,
}

impl ResolvedMatrix {
    pub(crate) fn new(
        period: AnalysisPeriod,
        rows: Vec<Arc<[f64]>>,
    ) -> Result<Self, ThermalMapError> {
        if let Some((sensor, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != period.len())
        {
            return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
                "sensor {sensor} has {} values for the {} timesteps of '{period}'",
                row.len(),
                period.len()
            )));
        }
        Ok(Self { period, rows })
    }

    pub fn period(&self) -> &AnalysisPeriod {
        &self.period
    }

    pub fn rows(&self) -> &[Arc<[f64]>] {
        &self.rows
    }

    pub fn sensor_count(&self) -> usize {
        self.rows.len()
    }

    pub fn timestep_count(&self) -> usize {
        self.period.len()
    }
}

/// The period every series is aligned to: the requested one if any, else the reporting period
/// of the zone results, else the whole year at an hourly timestep.
pub fn common_analysis_period(
    enclosure: &EnclosureMap,
    store: Option<&dyn ZoneResultStore>,
    requested: Option<AnalysisPeriod>,
) -> Result<AnalysisPeriod, ThermalMapError> {
    if let Some(period) = requested {
        return Ok(period);
    }
    if enclosure.has_indoor() {
        return store
            .map(|store| store.reporting_period())
            .ok_or_else(|| missing_store(enclosure, ZONE_AIR_TEMPERATURE));
    }
    AnalysisPeriod::annual(1)
}

fn missing_store(enclosure: &EnclosureMap, output: &str) -> ThermalMapError {
    ThermalMapError::MissingZoneData {
        zone: enclosure.zone_order().first().cloned().unwrap_or_default(),
        output: output.to_string(),
    }
}

/// Produces the per-sensor series of each quantity from zone results and climate data.
#[derive(Debug)]
pub struct SensorResolver<'a> {
    enclosure: &'a EnclosureMap,
    store: Option<&'a dyn ZoneResultStore>,
    climate: Option<&'a ClimateData>,
    period: AnalysisPeriod,
    indoor_air_speed: TimeSeries,
    outdoor_wind: OutdoorWind,
}

impl<'a> SensorResolver<'a> {
    /// `indoor_air_speed` is used for every zone and must already cover the common analysis
    /// period.
    pub fn new(
        enclosure: &'a EnclosureMap,
        store: Option<&'a dyn ZoneResultStore>,
        climate: Option<&'a ClimateData>,
        period: AnalysisPeriod,
        indoor_air_speed: TimeSeries,
        outdoor_wind: OutdoorWind,
    ) -> Result<Self, ThermalMapError> {
        if enclosure.has_indoor() && store.is_none() {
            return Err(missing_store(enclosure, ZONE_AIR_TEMPERATURE));
        }
        if enclosure.has_outdoor() && climate.is_none() {
            return Err(ThermalMapError::ClimateData(
                "a weather file is needed for outdoor sensors".to_string(),
            ));
        }

        Ok(Self {
            enclosure,
            store,
            climate,
            period,
            indoor_air_speed: indoor_air_speed.filter_by_analysis_period(&period)?,
            outdoor_wind,
        })
    }

    pub fn period(&self) -> &AnalysisPeriod {
        &self.period
    }

    pub fn resolve(&self, quantity: Quantity) -> Result<ResolvedMatrix, ThermalMapError> {
        let mut sources = Vec::with_capacity(self.enclosure.source_count());

        if self.enclosure.has_indoor() {
            match quantity.zone_output() {
                Some(output_name) => {
                    let store = self
                        .store
                        .ok_or_else(|| missing_store(self.enclosure, output_name))?;
                    sources.extend(self.enclosure.zone_series_for(store, output_name)?);
                }
                None => sources.extend(
                    std::iter::repeat(self.indoor_air_speed.clone())
                        .take(self.enclosure.zone_order().len()),
                ),
            }
        } else {
            // no sensor may reference a zone slot, but the outdoor slot still follows them
            sources.extend(
                std::iter::repeat(self.indoor_air_speed.clone())
                    .take(self.enclosure.zone_order().len()),
            );
        }

        if self.enclosure.has_outdoor() {
            let climate = self.climate.ok_or_else(|| {
                ThermalMapError::ClimateData("a weather file is needed for outdoor sensors".into())
            })?;
            let outdoor = match quantity {
                Quantity::AirTemperature | Quantity::RadiantTemperature => {
                    climate.dry_bulb_temperature.clone()
                }
                Quantity::RelativeHumidity => climate.relative_humidity.clone(),
                Quantity::AirSpeed => self.outdoor_wind.apply(&climate.wind_speed),
            };
            sources.push(outdoor.align_annual_hourly(&self.period)?);
        }

        debug!(%quantity, sources = sources.len(), period = %self.period, "resolving sensors");

        resolve_sensors(self.enclosure, &sources, &self.period)
    }
}

/// Builds one row per sensor from the source series (zones in zone order, then the outdoors),
/// after aligning every source to the period.
pub fn resolve_sensors(
    enclosure: &EnclosureMap,
    sources: &[TimeSeries],
    period: &AnalysisPeriod,
) -> Result<ResolvedMatrix, ThermalMapError> {
    if sources.len() != enclosure.source_count() {
        return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
            "{} source series were given for {} zone and outdoor slots",
            sources.len(),
            enclosure.source_count()
        )));
    }

    let aligned = sources
        .iter()
        .map(|source| {
            source
                .filter_by_analysis_period(period)
                .map(|series| series.values().clone())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rows = enclosure
        .strategies()
        .iter()
        .map(|strategy| match strategy {
            SensorStrategy::DirectIndex(idx) => Arc::clone(&aligned[*idx]),
            SensorStrategy::BlendedIndices(pairs) => blend(pairs, &aligned, period.len()),
        })
        .collect();

    ResolvedMatrix::new(*period, rows)
}

/// Mean over the pairs of each pair's weighted sum.
fn blend(pairs: &[BlendPair], sources: &[Arc<[f64]>], len: usize) -> Arc<[f64]> {
    let mut blended = vec![0.; len];
    for BlendPair {
        first: (first_idx, first_weight),
        second: (second_idx, second_weight),
    } in pairs
    {
        let (first, second) = (&sources[*first_idx], &sources[*second_idx]);
        for (t, value) in blended.iter_mut().enumerate() {
            *value += first_weight * first[t] + second_weight * second[t];
        }
    }
    if pairs.len() > 1 {
        let pair_count = pairs.len() as f64;
        blended.iter_mut().for_each(|value| *value /= pair_count);
    }
    blended.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_weather_file::Location;
    use crate::result_store::InMemoryResultStore;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn two_steps() -> AnalysisPeriod {
        AnalysisPeriod::new(1, 1, 0, 1, 1, 1, 1).unwrap()
    }

    fn enclosure(json: serde_json::Value) -> EnclosureMap {
        EnclosureMap::from_reader(json.to_string().as_bytes()).unwrap()
    }

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(two_steps(), values).unwrap()
    }

    #[fixture]
    fn two_zone_store() -> InMemoryResultStore {
        let mut store = InMemoryResultStore::new(two_steps());
        for (output, zone1, zone2) in [
            (ZONE_AIR_TEMPERATURE, [20., 21.], [24., 23.]),
            (ZONE_RELATIVE_HUMIDITY, [40., 45.], [60., 55.]),
            (ZONE_RADIANT_TEMPERATURE, [19., 20.], [25., 26.]),
        ] {
            store.insert(output, "Zone1", zone1.to_vec()).unwrap();
            store.insert(output, "Zone2", zone2.to_vec()).unwrap();
        }
        store
    }

    #[fixture]
    fn annual_climate() -> ClimateData {
        let annual = AnalysisPeriod::default();
        let hours = (0..8760).map(|h| h as f64).collect::<Vec<_>>();
        ClimateData {
            location: Location {
                latitude: 51.5,
                longitude: 0.,
                time_zone: 0.,
            },
            dry_bulb_temperature: TimeSeries::new(annual, hours.clone()).unwrap(),
            relative_humidity: TimeSeries::constant(annual, 80.),
            wind_speed: TimeSeries::constant(annual, 4.),
        }
    }

    #[rstest]
    fn should_return_source_rows_for_direct_sensors() {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1", "Zone2"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [1, 0, 1]
        }));
        let sources = [series(vec![20., 21.]), series(vec![24., 23.])];
        let matrix = resolve_sensors(&enclosure, &sources, &two_steps()).unwrap();

        assert_eq!(matrix.rows()[0].to_vec(), vec![24., 23.]);
        assert_eq!(matrix.rows()[1].to_vec(), vec![20., 21.]);
        // no copies are made for sensors taken straight from a zone
        assert!(Arc::ptr_eq(&matrix.rows()[0], sources[1].values()));
        assert!(Arc::ptr_eq(&matrix.rows()[0], &matrix.rows()[2]));
    }

    #[rstest]
    fn should_blend_one_pair_exactly() {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1", "Zone2"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0],
            "air_bound_proximity": {"0": [{"0": 0.3, "1": 0.7}]}
        }));
        let (zone0, zone1) = (vec![20., 21.], vec![24., 23.]);
        let sources = [series(zone0.clone()), series(zone1.clone())];
        let matrix = resolve_sensors(&enclosure, &sources, &two_steps()).unwrap();

        let expected = (0..2)
            .map(|t| 0.3 * zone0[t] + 0.7 * zone1[t])
            .collect::<Vec<_>>();
        assert_eq!(matrix.rows()[0].to_vec(), expected);
    }

    #[rstest]
    fn should_average_multiple_pairs() {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1", "Zone2", "Zone3"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [2],
            "air_bound_proximity": {"0": [{"0": 0.5, "1": 0.5}, {"1": 0.25, "2": 0.75}]}
        }));
        let sources = [
            series(vec![20., 20.]),
            series(vec![24., 22.]),
            series(vec![28., 30.]),
        ];
        let matrix = resolve_sensors(&enclosure, &sources, &two_steps()).unwrap();

        // (22 + 27) / 2 and (21 + 28) / 2
        assert_eq!(matrix.rows()[0].to_vec(), vec![24.5, 24.5]);
    }

    #[rstest]
    fn should_blend_boundary_sensor_between_two_zones(two_zone_store: InMemoryResultStore) {
        let enclosure = enclosure(json!({
            "mapper": ["ZONE1", "ZONE2"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0],
            "air_bound_proximity": {"0": [{"0": 0.5, "1": 0.5}]}
        }));
        let resolver = SensorResolver::new(
            &enclosure,
            Some(&two_zone_store),
            None,
            two_steps(),
            TimeSeries::constant(two_steps(), 0.1),
            OutdoorWind::Pedestrian,
        )
        .unwrap();

        let matrix = resolver.resolve(Quantity::AirTemperature).unwrap();
        assert_eq!(matrix.rows()[0].to_vec(), vec![22.0, 22.0]);
    }

    #[rstest]
    fn should_resolve_every_quantity_to_the_same_shape(
        two_zone_store: InMemoryResultStore,
        annual_climate: ClimateData,
    ) {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1", "Zone2"],
            "has_indoor": true,
            "has_outdoor": true,
            "sensor_indices": [0, 1, 2, 2],
            "air_bound_proximity": {"3": [{"1": 0.5, "2": 0.5}]}
        }));
        let resolver = SensorResolver::new(
            &enclosure,
            Some(&two_zone_store),
            Some(&annual_climate),
            two_steps(),
            TimeSeries::constant(two_steps(), 0.1),
            OutdoorWind::Meteorological,
        )
        .unwrap();

        for quantity in Quantity::iter() {
            let matrix = resolver.resolve(quantity).unwrap();
            assert_eq!(matrix.sensor_count(), 4, "{quantity}");
            assert!(matrix.rows().iter().all(|row| row.len() == 2), "{quantity}");
        }

        let radiant = resolver.resolve(Quantity::RadiantTemperature).unwrap();
        assert_eq!(radiant.rows()[1].to_vec(), vec![25., 26.]);
        // outdoor radiant temperature starts from the air temperature
        assert_eq!(radiant.rows()[2].to_vec(), vec![0., 1.]);

        let speed = resolver.resolve(Quantity::AirSpeed).unwrap();
        assert_eq!(speed.rows()[0].to_vec(), vec![0.1, 0.1]);
        assert_eq!(speed.rows()[2].to_vec(), vec![4., 4.]);
        approx::assert_relative_eq!(speed.rows()[3][1], 0.5 * 0.1 + 0.5 * 4., epsilon = 1e-12);
    }

    #[rstest]
    fn should_round_trip_single_zone(two_zone_store: InMemoryResultStore) {
        let enclosure = enclosure(json!({
            "mapper": ["zone1"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0]
        }));
        let resolver = SensorResolver::new(
            &enclosure,
            Some(&two_zone_store),
            None,
            two_steps(),
            TimeSeries::constant(two_steps(), 0.3),
            OutdoorWind::Pedestrian,
        )
        .unwrap();

        for (quantity, expected) in [
            (Quantity::AirTemperature, vec![20., 21.]),
            (Quantity::RelativeHumidity, vec![40., 45.]),
            (Quantity::RadiantTemperature, vec![19., 20.]),
            (Quantity::AirSpeed, vec![0.3, 0.3]),
        ] {
            let matrix = resolver.resolve(quantity).unwrap();
            assert_eq!(matrix.rows().to_vec(), vec![Arc::from(expected)]);
        }
    }

    #[rstest]
    fn should_reduce_outdoor_wind_to_pedestrian_height(annual_climate: ClimateData) {
        let enclosure = enclosure(json!({
            "mapper": [],
            "has_indoor": false,
            "has_outdoor": true,
            "sensor_indices": [0]
        }));
        let period = common_analysis_period(&enclosure, None, None).unwrap();
        assert!(period.is_annual());

        let resolver = SensorResolver::new(
            &enclosure,
            None,
            Some(&annual_climate),
            period,
            TimeSeries::constant(period, 0.1),
            OutdoorWind::Pedestrian,
        )
        .unwrap();
        let speed = resolver.resolve(Quantity::AirSpeed).unwrap();
        let expected = 4. * (1.1f64 / 0.03).ln() / (10f64 / 0.03).ln();
        approx::assert_relative_eq!(speed.rows()[0][0], expected, epsilon = 1e-12);
        assert!(speed.rows()[0][0] < 4.);
    }

    #[rstest]
    fn should_fail_when_zone_results_are_missing(two_zone_store: InMemoryResultStore) {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1", "Attic"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0, 1]
        }));
        let resolver = SensorResolver::new(
            &enclosure,
            Some(&two_zone_store),
            None,
            two_steps(),
            TimeSeries::constant(two_steps(), 0.1),
            OutdoorWind::Pedestrian,
        )
        .unwrap();

        assert!(matches!(
            resolver.resolve(Quantity::RelativeHumidity),
            Err(ThermalMapError::MissingZoneData { zone, .. }) if zone == "ATTIC"
        ));
    }

    #[rstest]
    fn should_fail_when_period_is_not_covered(two_zone_store: InMemoryResultStore) {
        let enclosure = enclosure(json!({
            "mapper": ["Zone1"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0]
        }));
        let later = AnalysisPeriod::new(1, 1, 0, 1, 1, 5, 1).unwrap();
        assert!(matches!(
            SensorResolver::new(
                &enclosure,
                Some(&two_zone_store),
                None,
                later,
                TimeSeries::constant(later, 0.1),
                OutdoorWind::Pedestrian,
            )
            .and_then(|resolver| resolver.resolve(Quantity::AirTemperature)),
            Err(ThermalMapError::AnalysisPeriodMismatch(_))
        ));
    }

    #[rstest]
    fn should_pick_common_analysis_period(two_zone_store: InMemoryResultStore) {
        let indoor = enclosure(json!({
            "mapper": ["Zone1"],
            "has_indoor": true,
            "has_outdoor": false,
            "sensor_indices": [0]
        }));
        assert_eq!(
            common_analysis_period(&indoor, Some(&two_zone_store), None).unwrap(),
            two_steps()
        );
        let requested = AnalysisPeriod::new(1, 1, 1, 1, 1, 1, 1).unwrap();
        assert_eq!(
            common_analysis_period(&indoor, Some(&two_zone_store), Some(requested)).unwrap(),
            requested
        );
        assert!(matches!(
            common_analysis_period(&indoor, None, None),
            Err(ThermalMapError::MissingZoneData { .. })
        ));
    }
}
