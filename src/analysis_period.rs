use crate::errors::ThermalMapError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const HOURS_IN_DAY: u32 = 24;
pub const HOURS_IN_YEAR: u32 = 8760;

// # Define hours that start each month (and end next month). Note there are 13
// # values so that end of final month is handled correctly.
// # E.g. Jan is hours 0-743
const MONTH_START_END_HOURS: [u32; 13] = [
    0, 744, 1416, 2160, 2880, 3624, 4344, 5088, 5832, 6552, 7296, 8016, 8760,
];

/// Timesteps per hour that divide an hour into whole minutes.
const VALID_TIMESTEPS: [u32; 12] = [1, 2, 3, 4, 5, 6, 10, 12, 15, 20, 30, 60];

/// A window of the (non-leap) year over which all series are compared, with a fixed number
/// of timesteps per hour. A period whose end date falls before its start date wraps over
/// the end of the year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnalysisPeriod {
    st_month: u32,
    st_day: u32,
    st_hour: u32,
    end_month: u32,
    end_day: u32,
    end_hour: u32,
    timestep: u32,
}

impl Default for AnalysisPeriod {
    fn default() -> Self {
        Self {
            st_month: 1,
            st_day: 1,
            st_hour: 0,
            end_month: 12,
            end_day: 31,
            end_hour: 23,
            timestep: 1,
        }
    }
}

impl AnalysisPeriod {
    pub fn new(
        st_month: u32,
        st_day: u32,
        st_hour: u32,
        end_month: u32,
        end_day: u32,
        end_hour: u32,
        timestep: u32,
    ) -> Result<Self, ThermalMapError> {
        let period = Self {
            st_month,
            st_day,
            st_hour,
            end_month,
            end_day,
            end_hour,
            timestep,
        };
        let invalid = |reason: &str| {
            ThermalMapError::InvalidAnalysisPeriod(format!("{period} ({reason})"))
        };

        for (month, day) in [(st_month, st_day), (end_month, end_day)] {
            if !(1..=12).contains(&month) {
                return Err(invalid("month must be between 1 and 12"));
            }
            if day == 0 || day > days_in_month(month) {
                return Err(invalid("day is outside of the month"));
            }
        }
        if st_hour > end_hour || end_hour >= HOURS_IN_DAY {
            return Err(invalid("hours must satisfy 0 <= start <= end <= 23"));
        }
        if !VALID_TIMESTEPS.contains(&timestep) {
            return Err(invalid("timestep must divide an hour into whole minutes"));
        }

        Ok(period)
    }

    /// The full year at the given number of timesteps per hour.
    pub fn annual(timestep: u32) -> Result<Self, ThermalMapError> {
        Self::new(1, 1, 0, 12, 31, 23, timestep)
    }

    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    pub fn is_annual(&self) -> bool {
        (self.st_month, self.st_day, self.st_hour) == (1, 1, 0)
            && (self.end_month, self.end_day, self.end_hour) == (12, 31, 23)
    }

    pub fn is_reversed(&self) -> bool {
        day_of_year(self.end_month, self.end_day) < day_of_year(self.st_month, self.st_day)
    }

    fn days_of_year(&self) -> Vec<u32> {
        let start = day_of_year(self.st_month, self.st_day);
        let end = day_of_year(self.end_month, self.end_day);
        if self.is_reversed() {
            (start..HOURS_IN_YEAR / HOURS_IN_DAY).chain(0..=end).collect()
        } else {
            (start..=end).collect()
        }
    }

    /// Index of every timestep in the period counted from the start of the year, in period order.
    pub fn step_indices(&self) -> Vec<u32> {
        let mut steps = Vec::with_capacity(self.len());
        for day in self.days_of_year() {
            for hour in self.st_hour..=self.end_hour {
                let first_step = (day * HOURS_IN_DAY + hour) * self.timestep;
                steps.extend(first_step..first_step + self.timestep);
            }
        }
        steps
    }

    /// Step of the year (at this period's timestep) containing the given hour of the year.
    pub fn step_of_hoy(&self, hoy: f64) -> u32 {
        (hoy * self.timestep as f64 + 1e-9).floor() as u32
    }

    pub fn len(&self) -> usize {
        self.days_of_year().len()
            * (self.end_hour - self.st_hour + 1) as usize
            * self.timestep as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for AnalysisPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} to {}/{} between {} and {} @{}",
            self.st_month,
            self.st_day,
            self.end_month,
            self.end_day,
            self.st_hour,
            self.end_hour,
            self.timestep
        )
    }
}

/// Parses strings of the form `6/21 to 9/21 between 8 and 16 @1`. The hour range and the
/// timestep may be left off, in which case whole days at an hourly timestep are assumed.
impl FromStr for AnalysisPeriod {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ThermalMapError::InvalidAnalysisPeriod(s.to_string());
        let parse_number = |value: &str| value.trim().parse::<u32>().map_err(|_| invalid());
        let parse_date = |value: &str| -> Result<(u32, u32), ThermalMapError> {
            let (month, day) = value.trim().split_once('/').ok_or_else(invalid)?;
            Ok((parse_number(month)?, parse_number(day)?))
        };

        let (rest, timestep) = match s.split_once('@') {
            Some((rest, timestep)) => (rest, parse_number(timestep)?),
            None => (s, 1),
        };
        let (dates, hours) = match rest.split_once("between") {
            Some((dates, hours)) => {
                let (st_hour, end_hour) = hours.split_once("and").ok_or_else(invalid)?;
                (dates, (parse_number(st_hour)?, parse_number(end_hour)?))
            }
            None => (rest, (0, HOURS_IN_DAY - 1)),
        };
        let (st_date, end_date) = dates.split_once("to").ok_or_else(invalid)?;
        let (st_month, st_day) = parse_date(st_date)?;
        let (end_month, end_day) = parse_date(end_date)?;

        Self::new(
            st_month, st_day, hours.0, end_month, end_day, hours.1, timestep,
        )
    }
}

impl TryFrom<String> for AnalysisPeriod {
    type Error = ThermalMapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnalysisPeriod> for String {
    fn from(period: AnalysisPeriod) -> Self {
        period.to_string()
    }
}

pub fn days_in_month(month: u32) -> u32 {
    let idx = (month - 1) as usize;
    (MONTH_START_END_HOURS[idx + 1] - MONTH_START_END_HOURS[idx]) / HOURS_IN_DAY
}

/// Zero-based day of the (non-leap) year.
pub fn day_of_year(month: u32, day: u32) -> u32 {
    MONTH_START_END_HOURS[(month - 1) as usize] / HOURS_IN_DAY + day - 1
}

/// Zero-based month containing the given hour of the year.
pub fn month_of_hour(hour_of_year: u32) -> Option<usize> {
    MONTH_START_END_HOURS
        .iter()
        .position(|end_hour| hour_of_year < *end_hour)
        .map(|i| i - 1)
}

/// Start and end hours of the given zero-based month.
pub fn month_start_end_hours(month_idx: usize) -> (u32, u32) {
    (
        MONTH_START_END_HOURS[month_idx],
        MONTH_START_END_HOURS[month_idx + 1],
    )
}
