use thiserror::Error;

/// Failures that abort a thermal map run. None of these are retried; the caller is expected to
/// report them and exit without emitting partial results.
#[derive(Debug, Error)]
pub enum ThermalMapError {
    #[error("Enclosure information is malformed: {0}")]
    MalformedEnclosure(String),
    #[error("No '{output}' results were found for zone '{zone}'")]
    MissingZoneData { zone: String, output: String },
    #[error("Analysis periods do not line up: {0}")]
    AnalysisPeriodMismatch(String),
    #[error("Sun-up hours are required when irradiance results are supplied")]
    MissingSunUpHours,
    #[error("{parameter} has {found} values but {expected} were expected")]
    ParameterAlignment {
        parameter: String,
        expected: usize,
        found: usize,
    },
    #[error("Invalid analysis period '{0}'")]
    InvalidAnalysisPeriod(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Climate data could not be used: {0}")]
    ClimateData(String),
    #[error("Comfort evaluation failed for sensor {sensor_index}: {source}")]
    SensorEvaluation {
        sensor_index: usize,
        #[source]
        source: anyhow::Error,
    },
}
