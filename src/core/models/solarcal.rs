//! SolarCal shortwave solar gain on the human body, after ASHRAE-55 Appendix C.

use crate::errors::ThermalMapError;
use crate::input::{parse_parameter_number, parse_parameter_string, unknown_parameter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

/// Radiant heat transfer coefficient in W/m2K.
const RADIANT_HEAT_TRANSFER_COEFFICIENT: f64 = 6.012;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    #[default]
    Seated,
    Standing,
}

impl Posture {
    /// Fraction of the body surface exposed to radiation from the environment.
    pub fn fraction_body_exposed(&self) -> f64 {
        match self {
            Posture::Seated => 0.696,
            Posture::Standing => 0.725,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct SolarCalParameter {
    pub posture: Posture,
    /// Shortwave absorptivity of skin and clothing.
    pub body_absorptivity: f64,
    /// Longwave emissivity of skin and clothing.
    pub body_emissivity: f64,
}

impl Default for SolarCalParameter {
    fn default() -> Self {
        Self {
            posture: Posture::Seated,
            body_absorptivity: 0.7,
            body_emissivity: 0.95,
        }
    }
}

impl SolarCalParameter {
    fn validate(self) -> Result<Self, ThermalMapError> {
        for (name, value) in [
            ("absorptivity", self.body_absorptivity),
            ("emissivity", self.body_emissivity),
        ] {
            if !(0.0..=1.).contains(&value) {
                return Err(ThermalMapError::InvalidParameter(format!(
                    "--{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        if self.body_emissivity == 0. {
            return Err(ThermalMapError::InvalidParameter(
                "--emissivity must be above 0".to_string(),
            ));
        }
        Ok(self)
    }

    /// Change in mean radiant temperature, in C, from the shortwave irradiance falling on a
    /// person. Irradiance is in W/m2: direct normal to the sun, diffuse from the sky and
    /// reflected from the ground. Sun altitude is in degrees.
    pub fn mrt_delta(&self, diffuse: f64, direct: f64, reflected: f64, sun_altitude: f64) -> f64 {
        let f_eff = self.posture.fraction_body_exposed();
        let erf = (0.5 * f_eff * (diffuse + reflected)
            + projected_area_factor(sun_altitude) * direct)
            * (self.body_absorptivity / self.body_emissivity);

        erf / (f_eff * RADIANT_HEAT_TRANSFER_COEFFICIENT)
    }
}

/// Parses `--posture standing --absorptivity 0.7 --emissivity 0.95`, any of which may be left out.
impl FromStr for SolarCalParameter {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parameter = Self::default();
        for (key, value) in parse_parameter_string(s)? {
            match key.as_str() {
                "posture" => {
                    parameter.posture = value.parse().map_err(|_| {
                        ThermalMapError::InvalidParameter(format!(
                            "--posture must be seated or standing, got '{value}'"
                        ))
                    })?
                }
                "absorptivity" => parameter.body_absorptivity = parse_parameter_number(&key, &value)?,
                "emissivity" => parameter.body_emissivity = parse_parameter_number(&key, &value)?,
                _ => return Err(unknown_parameter("SolarCal", &key)),
            }
        }
        parameter.validate()
    }
}

/// Fraction of the body's effective radiating area projected towards the sun.
fn projected_area_factor(sun_altitude: f64) -> f64 {
    let beta = sun_altitude.clamp(0., 90.);
    0.308 * (beta * (0.998 - beta * beta / 50000.)).to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_not_warm_without_sun() {
        assert_eq!(SolarCalParameter::default().mrt_delta(0., 0., 0., 0.), 0.);
    }

    #[rstest]
    fn should_warm_from_diffuse_sky() {
        // diffuse only: ERF = 0.5 * feff * I * a/e, so the delta is independent of posture
        let expected = 0.5 * 100. * (0.7 / 0.95) / 6.012;
        let seated = SolarCalParameter::default();
        let standing = SolarCalParameter {
            posture: Posture::Standing,
            ..seated
        };
        assert_relative_eq!(seated.mrt_delta(100., 0., 0., 30.), expected, epsilon = 1e-9);
        assert_relative_eq!(standing.mrt_delta(100., 0., 0., 30.), expected, epsilon = 1e-9);
    }

    #[rstest]
    fn should_warm_more_from_low_sun() {
        let parameter = SolarCalParameter::default();
        let low = parameter.mrt_delta(0., 500., 0., 10.);
        let high = parameter.mrt_delta(0., 500., 0., 80.);
        assert!(low > high);
        assert!(high > 0.);
        // typical summer afternoon gain lies in the tens of degrees
        let afternoon = parameter.mrt_delta(100., 700., 50., 45.);
        assert!((10.0..40.).contains(&afternoon));
    }

    #[rstest]
    fn should_parse_parameter_string() {
        let parameter: SolarCalParameter = "--posture Standing --absorptivity 0.6".parse().unwrap();
        assert_eq!(parameter.posture, Posture::Standing);
        assert_eq!(parameter.body_absorptivity, 0.6);
        assert_eq!(parameter.body_emissivity, 0.95);
        assert!("--posture lying".parse::<SolarCalParameter>().is_err());
        assert!("--absorptivity 1.5".parse::<SolarCalParameter>().is_err());
    }
}
