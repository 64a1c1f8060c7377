use crate::errors::ThermalMapError;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Serialized form of the enclosure information written alongside a sensor grid.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct EnclosureInfo {
    /// Identifiers of the zones that sensors may belong to, in the order used by `sensor_indices`.
    pub mapper: Vec<String>,
    pub has_indoor: bool,
    pub has_outdoor: bool,
    /// For each sensor, an index into `mapper` or, for outdoor sensors, `mapper.len()`.
    pub sensor_indices: Vec<usize>,
    /// Sensor index (as a string) to the zone blends of the air boundaries it sits near. Each
    /// blend maps exactly two zone indices (as strings) to weights that sum to one.
    #[serde(default)]
    pub air_bound_proximity: IndexMap<String, Vec<IndexMap<String, f64>>>,
}

pub fn ingest_enclosure_info(json: impl Read) -> Result<EnclosureInfo, ThermalMapError> {
    serde_json::from_reader(json).map_err(|e| ThermalMapError::MalformedEnclosure(e.to_string()))
}

/// Split a parameter string such as `--standard EN-16798 --neutral-offset 3` into its
/// key/value pairs, in the order given.
pub(crate) fn parse_parameter_string(
    parameter_string: &str,
) -> Result<IndexMap<String, String>, ThermalMapError> {
    let tokens = parameter_string.split_whitespace().collect::<Vec<_>>();
    if tokens.len() % 2 != 0 {
        return Err(ThermalMapError::InvalidParameter(format!(
            "'{parameter_string}' is not a sequence of '--key value' pairs"
        )));
    }

    tokens
        .into_iter()
        .tuples()
        .map(|(key, value)| match key.strip_prefix("--") {
            Some(key) if !key.is_empty() => Ok((key.to_lowercase(), value.to_string())),
            _ => Err(ThermalMapError::InvalidParameter(format!(
                "expected a '--key' in '{parameter_string}' but found '{key}'"
            ))),
        })
        .collect()
}

pub(crate) fn parse_parameter_number(key: &str, value: &str) -> Result<f64, ThermalMapError> {
    value
        .parse::<f64>()
        .map_err(|_| ThermalMapError::InvalidParameter(format!("--{key} must be a number, got '{value}'")))
}

pub(crate) fn unknown_parameter(model: &str, key: &str) -> ThermalMapError {
    ThermalMapError::InvalidParameter(format!("'--{key}' is not a {model} parameter"))
}
