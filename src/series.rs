use crate::analysis_period::AnalysisPeriod;
use crate::errors::ThermalMapError;
use std::collections::HashMap;
use std::sync::Arc;

/// A series of values, one per timestep of its analysis period. Values are shared rather than
/// copied so that many sensors can point at the same zone series.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    period: AnalysisPeriod,
    values: Arc<[f64]>,
}

impl TimeSeries {
    pub fn new(
        period: AnalysisPeriod,
        values: impl Into<Arc<[f64]>>,
    ) -> Result<Self, ThermalMapError> {
        let values = values.into();
        if values.len() != period.len() {
            return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
                "{} values were given for the {} timesteps of '{period}'",
                values.len(),
                period.len()
            )));
        }
        Ok(Self { period, values })
    }

    pub fn constant(period: AnalysisPeriod, value: f64) -> Self {
        Self {
            period,
            values: vec![value; period.len()].into(),
        }
    }

    pub fn period(&self) -> &AnalysisPeriod {
        &self.period
    }

    pub fn values(&self) -> &Arc<[f64]> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn map(&self, func: impl Fn(f64) -> f64) -> Self {
        Self {
            period: self.period,
            values: self.values.iter().map(|value| func(*value)).collect(),
        }
    }

    /// Restrict this series to the timesteps of another period. Every timestep of the target
    /// period must be present in this series, at the same timestep size.
    pub fn filter_by_analysis_period(
        &self,
        period: &AnalysisPeriod,
    ) -> Result<Self, ThermalMapError> {
        if *period == self.period {
            return Ok(self.clone());
        }
        if period.timestep() != self.period.timestep() {
            return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
                "cannot align a series at {} steps per hour to '{period}'",
                self.period.timestep()
            )));
        }

        let index_by_step: HashMap<u32, usize> = self
            .period
            .step_indices()
            .into_iter()
            .enumerate()
            .map(|(idx, step)| (step, idx))
            .collect();

        let values = period
            .step_indices()
            .into_iter()
            .map(|step| {
                index_by_step
                    .get(&step)
                    .map(|idx| self.values[*idx])
                    .ok_or_else(|| {
                        ThermalMapError::AnalysisPeriodMismatch(format!(
                            "'{period}' is not covered by series over '{}'",
                            self.period
                        ))
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        Self::new(*period, values)
    }

    /// Spread an annual hourly series over the timesteps of a period, holding each hour's
    /// value for every timestep within it.
    pub fn align_annual_hourly(&self, period: &AnalysisPeriod) -> Result<Self, ThermalMapError> {
        if !self.period.is_annual() || self.period.timestep() != 1 {
            return Err(ThermalMapError::AnalysisPeriodMismatch(format!(
                "expected an annual hourly series but got one over '{}'",
                self.period
            )));
        }
        if period.timestep() == 1 {
            return self.filter_by_analysis_period(period);
        }

        let values = period
            .step_indices()
            .into_iter()
            .map(|step| self.values[(step / period.timestep()) as usize])
            .collect::<Vec<f64>>();
        Self::new(*period, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn first_two_days() -> TimeSeries {
        let period = AnalysisPeriod::new(1, 1, 0, 1, 2, 23, 1).unwrap();
        TimeSeries::new(period, (0..48).map(|v| v as f64).collect::<Vec<_>>()).unwrap()
    }

    #[rstest]
    fn should_reject_values_not_matching_period() {
        let period = AnalysisPeriod::new(1, 1, 0, 1, 1, 23, 1).unwrap();
        assert!(matches!(
            TimeSeries::new(period, vec![0.; 23]),
            Err(ThermalMapError::AnalysisPeriodMismatch(_))
        ));
    }

    #[rstest]
    fn should_share_values_when_period_is_unchanged(first_two_days: TimeSeries) {
        let filtered = first_two_days
            .filter_by_analysis_period(first_two_days.period())
            .unwrap();
        assert!(Arc::ptr_eq(filtered.values(), first_two_days.values()));
    }

    #[rstest]
    fn should_filter_to_sub_period(first_two_days: TimeSeries) {
        let afternoon = AnalysisPeriod::new(1, 2, 12, 1, 2, 14, 1).unwrap();
        let filtered = first_two_days.filter_by_analysis_period(&afternoon).unwrap();
        assert_eq!(filtered.values().to_vec(), vec![36., 37., 38.]);
    }

    #[rstest]
    fn should_fail_to_filter_to_uncovered_period(first_two_days: TimeSeries) {
        let later = AnalysisPeriod::new(1, 2, 0, 1, 3, 23, 1).unwrap();
        assert!(matches!(
            first_two_days.filter_by_analysis_period(&later),
            Err(ThermalMapError::AnalysisPeriodMismatch(_))
        ));
    }

    #[rstest]
    fn should_fail_to_filter_across_timesteps(first_two_days: TimeSeries) {
        let half_hourly = AnalysisPeriod::new(1, 1, 0, 1, 1, 23, 2).unwrap();
        assert!(first_two_days.filter_by_analysis_period(&half_hourly).is_err());
    }

    #[rstest]
    fn should_spread_hourly_values_over_sub_hourly_steps() {
        let annual = TimeSeries::new(
            AnalysisPeriod::default(),
            (0..8760).map(|v| v as f64).collect::<Vec<_>>(),
        )
        .unwrap();
        let quarter_hourly = AnalysisPeriod::new(1, 2, 0, 1, 2, 1, 4).unwrap();
        let aligned = annual.align_annual_hourly(&quarter_hourly).unwrap();
        assert_eq!(
            aligned.values().to_vec(),
            vec![24., 24., 24., 24., 25., 25., 25., 25.]
        );
        assert!(first_two_days().align_annual_hourly(&quarter_hourly).is_err());
    }
}
