use crate::analysis_period::{HOURS_IN_DAY, HOURS_IN_YEAR};
use crate::read_weather_file::Location;

/// Solar geometry for one site, after ISO 52010-1:2017 section 6.4.1.
#[derive(Clone, Copy, Debug)]
pub struct SunPath {
    latitude: f64,
    time_shift: f64,
}

impl SunPath {
    pub fn new(location: &Location) -> Self {
        Self {
            latitude: location.latitude,
            time_shift: time_shift(location.time_zone, location.longitude),
        }
    }

    /// Solar altitude in degrees at the given (possibly fractional) hour of the year, in local
    /// standard time. Zero whenever the sun is below the horizon.
    pub fn altitude(&self, hoy: f64) -> f64 {
        let hoy = hoy.rem_euclid(HOURS_IN_YEAR as f64);
        let day = (hoy / HOURS_IN_DAY as f64).floor() as u32;
        let hour_of_day = hoy - (day * HOURS_IN_DAY) as f64;

        let declination = solar_declination(earth_orbit_deviation(day));
        let solar_time = hour_of_day - equation_of_time(day) / 60.0 - self.time_shift;

        solar_altitude(self.latitude, declination, solar_hour_angle(solar_time))
    }
}

fn earth_orbit_deviation(day: u32) -> f64 {
    // 1-indexed day of the year
    (360.0 / 365.0) * (day + 1) as f64
}

fn solar_declination(earth_orbit_deviation: f64) -> f64 {
    let earth_orbit_deviation = earth_orbit_deviation.to_radians();

    0.33281 - 22.984 * earth_orbit_deviation.cos() - 0.3499 * (2.0 * earth_orbit_deviation).cos()
        - 0.1398 * (3.0 * earth_orbit_deviation).cos()
        + 3.7872 * earth_orbit_deviation.sin()
        + 0.03205 * (2.0 * earth_orbit_deviation).sin()
        + 0.07187 * (3.0 * earth_orbit_deviation).sin()
}

/// Equation of time in minutes.
fn equation_of_time(day: u32) -> f64 {
    let nday = (day + 1) as i32;

    match nday {
        nday if nday < 21 => 2.6 + 0.44 * nday as f64,
        nday if nday < 136 => 5.2 + 9.0 * ((nday - 43) as f64 * 0.0357).cos(),
        nday if nday < 241 => 1.4 - 5.0 * ((nday - 135) as f64 * 0.0449).cos(),
        nday if nday < 336 => -6.3 - 10.0 * ((nday - 306) as f64 * 0.036).cos(),
        nday => 0.45 * (nday - 359) as f64,
    }
}

/// Hours between local standard time and the sun's path over this longitude. Daylight saving
/// is disregarded.
fn time_shift(time_zone: f64, longitude: f64) -> f64 {
    time_zone - longitude / 15.0
}

/// Solar hour angle in degrees, limited to [-180, 180].
fn solar_hour_angle(solar_time: f64) -> f64 {
    let mut solar_angle = 15.0 * (12.0 - solar_time);

    if solar_angle > 180.0 {
        solar_angle -= 360.0;
    } else if solar_angle < -180.0 {
        solar_angle += 360.0;
    }

    solar_angle
}

fn solar_altitude(latitude: f64, solar_declination: f64, solar_hour_angle: f64) -> f64 {
    let latitude = latitude.to_radians();
    let solar_declination = solar_declination.to_radians();
    let solar_hour_angle = solar_hour_angle.to_radians();

    let asol = (solar_declination.sin() * latitude.sin()
        + solar_declination.cos() * latitude.cos() * solar_hour_angle.cos())
    .asin()
    .to_degrees();

    if asol < 0.0001 {
        0.0
    } else {
        asol
    }
}
