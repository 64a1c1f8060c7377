//! Universal Thermal Climate Index and its stress categories. The UTCI comes from a
//! polynomial regression of the Fiala multi-node model, [Utci2012] unless another
//! [UtciRegression] is supplied.

use super::{ComfortModel, ComfortSeries, ModelKind, SensorConditions};
use crate::errors::ThermalMapError;
use crate::input::{parse_parameter_number, parse_parameter_string, unknown_parameter};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

/// Upper bounds, in C, of the ten UTCI stress bands from extreme cold stress up to very strong
/// heat stress. Anything above the last bound is extreme heat stress.
const STRESS_BAND_UPPER_BOUNDS: [f64; 10] = [-40., -27., -13., 0., 9., 26., 28., 32., 38., 46.];

/// Universal Thermal Climate Index from air temperature (C), mean radiant temperature (C),
/// wind speed at 10m (m/s) and relative humidity (%).
pub trait UtciRegression: Sync {
    fn utci(&self, ta: f64, tr: f64, vel: f64, rh: f64) -> f64;
}

impl<R: UtciRegression + ?Sized> UtciRegression for Box<R> {
    fn utci(&self, ta: f64, tr: f64, vel: f64, rh: f64) -> f64 {
        (**self).utci(ta, tr, vel, rh)
    }
}

const MIN_WIND_SPEED: f64 = 0.5; // m/s
const MAX_WIND_SPEED: f64 = 17.; // m/s

/// Coefficients of the terms `ta^a * va^b * dtr^c * pa^d` with `a + b + c + d <= 6`, ordered by
/// `d`, then `c`, then `b`, then `a`, each counting up from zero.
#[rustfmt::skip]
const UTCI_COEFFICIENTS: [f64; 210] = [
    // ta and va only
    6.07562052e-1, -2.27712343e-2, 8.06470249e-4, -1.54271372e-4, -3.24651735e-6, 7.32602852e-8, 1.35959073e-9,
    -2.25836520e0, 8.80326035e-2, 2.16844454e-3, -1.53347087e-5, -5.72983704e-7, -2.55090145e-9,
    -7.51269505e-1, -4.08350271e-3, -5.21670675e-5, 1.94544667e-6, 1.14099531e-8,
    1.58137256e-1, -6.57263143e-5, 2.22697524e-7, -4.16117031e-8,
    -1.27762753e-2, 9.66891875e-6, 2.52785852e-9,
    4.56306672e-4, -1.74202546e-7,
    -5.91491269e-6,
    // dtr
    3.98374029e-1, 1.83945314e-4, -1.73754510e-4, -7.60781159e-7, 3.77830287e-8, 5.43079673e-10,
    -2.00518269e-2, 8.92859837e-4, 3.45433048e-6, -3.77925774e-7, -1.69699377e-9,
    1.69992415e-4, -4.99204314e-5, 2.47417178e-7, 1.07596466e-8,
    8.49242932e-5, 1.35191328e-6, -6.21531254e-9,
    -4.99410301e-6, -1.89489258e-8,
    8.15300114e-8,
    // dtr^2
    7.55043090e-4, -5.65095215e-5, -4.52166564e-7, 2.46688878e-8, 2.42674348e-10,
    1.54547250e-4, 5.24110970e-6, -8.75874982e-8, -1.50743064e-9,
    -1.56236307e-5, -1.33895614e-7, 2.49709824e-9,
    6.51711721e-7, 1.94960053e-9,
    -1.00361113e-8,
    // dtr^3
    -1.21206673e-5, -2.18203660e-7, 7.51269482e-9, 9.79063848e-11,
    1.25006734e-6, -1.81584736e-9, -3.52197671e-10,
    -3.36514630e-8, 1.35908359e-10,
    4.17032620e-10,
    // dtr^4
    -1.30369025e-9, 4.13908461e-10, 9.22652254e-12,
    -5.08220384e-9, -2.24730961e-11,
    1.17139133e-10,
    // dtr^5
    6.62154879e-10, 4.03863260e-13,
    1.95087203e-12,
    // dtr^6
    -4.73602469e-12,
    // pa
    5.12733497e0, -3.12788561e-1, -1.96701861e-2, 9.99690870e-4, 9.51738512e-6, -4.66426341e-7,
    5.48050612e-1, -3.30552823e-3, -1.64119440e-3, -5.16670694e-6, 9.52692432e-7,
    -4.29223622e-2, 5.00845667e-3, 1.00601257e-6, -1.81748644e-6,
    -1.25813502e-3, -1.79330391e-4, 2.34994441e-6,
    1.29735808e-4, 1.29064870e-6,
    -2.28558686e-6,
    // pa dtr
    -3.69476348e-2, 1.62325322e-3, -3.14279680e-5, 2.59835559e-6, -4.77136523e-8,
    8.64203390e-3, -6.87405181e-4, -9.13863872e-6, 5.15916806e-7,
    -3.59217476e-5, 3.28696511e-5, -7.10542454e-7,
    -1.24382300e-5, -7.38584400e-9,
    2.20609296e-7,
    // pa dtr^2
    -7.32469180e-4, -1.87381964e-5, 4.80925239e-6, -8.75492040e-8,
    2.77862930e-5, -5.06004592e-6, 1.14325367e-7,
    2.53016723e-6, -1.72857035e-8,
    -3.95079398e-8,
    // pa dtr^3
    -3.59413173e-7, 7.04388046e-7, -1.89309167e-8,
    -4.79768731e-7, 7.96079978e-9,
    1.62897058e-9,
    // pa dtr^4
    3.94367674e-8, -1.18566247e-9,
    3.34678041e-10,
    // pa dtr^5
    -1.15606447e-10,
    // pa^2
    -2.80626406e0, 5.48712484e-1, -3.99428410e-3, -9.54009191e-4, 1.93090978e-5,
    -3.08806365e-1, 1.16952364e-2, 4.95271903e-4, -1.90710882e-5,
    2.10787756e-3, -6.98445738e-4, 2.30109073e-5,
    4.17856590e-4, -1.27043871e-5,
    -3.04620472e-6,
    // pa^2 dtr
    5.14507424e-2, -4.32510997e-3, 8.99281156e-5, -7.14663943e-7,
    -2.66016305e-4, 2.63789586e-4, -7.01199003e-6,
    -1.06823306e-4, 3.61341136e-6,
    2.29748967e-7,
    // pa^2 dtr^2
    3.04788893e-4, -6.42070836e-5, 1.16257971e-6,
    7.68023384e-6, -5.47446896e-7,
    -3.59937910e-8,
    // pa^2 dtr^3
    -4.36497725e-6, 1.68737969e-7,
    2.67489271e-8,
    // pa^2 dtr^4
    3.23926897e-9,
    // pa^3
    -3.53874123e-2, -2.21201190e-1, 1.55126038e-2, -2.63917279e-4,
    4.53433455e-2, -4.32943862e-3, 1.45389826e-4,
    2.17508610e-4, -6.66724702e-5,
    3.33217140e-5,
    // pa^3 dtr
    -2.26921615e-3, 3.80261982e-4, -5.45314314e-9,
    -7.96355448e-4, 2.53458034e-5,
    -6.31223658e-6,
    // pa^3 dtr^2
    3.02122035e-4, -4.77403547e-6,
    1.73825715e-6,
    // pa^3 dtr^3
    -4.09087898e-7,
    // pa^4
    6.14155345e-1, -6.16755931e-2, 1.33374846e-3,
    3.55375387e-3, -5.13027851e-4,
    1.02449757e-4,
    // pa^4 dtr
    -1.48526421e-3, -4.11469183e-5,
    -6.80434415e-6,
    // pa^4 dtr^2
    -9.77675906e-6,
    // pa^5
    8.82773108e-2, -3.01859306e-3,
    1.04452989e-3,
    // pa^5 dtr
    2.47090539e-4,
    // pa^6
    1.48348065e-3,
];

/// The sixth order polynomial approximation of the UTCI by Bröde et al. (2012).
///
/// Wind speed is held within 0.5 and 17 m/s, the range of the underlying model runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Utci2012;

impl UtciRegression for Utci2012 {
    fn utci(&self, ta: f64, tr: f64, vel: f64, rh: f64) -> f64 {
        let va = vel.clamp(MIN_WIND_SPEED, MAX_WIND_SPEED);
        let d_tr = tr - ta;
        let pa = saturated_vapor_pressure_hpa(ta) * rh / 100. / 10.; // kPa

        ta + UTCI_COEFFICIENTS
            .iter()
            .zip(polynomial_powers())
            .map(|(coefficient, (a, b, c, d))| {
                coefficient * ta.powi(a) * va.powi(b) * d_tr.powi(c) * pa.powi(d)
            })
            .sum::<f64>()
    }
}

/// Powers `(a, b, c, d)` of every term of [UTCI_COEFFICIENTS], in order.
fn polynomial_powers() -> impl Iterator<Item = (i32, i32, i32, i32)> {
    (0..=6).flat_map(|d| {
        (0..=6 - d).flat_map(move |c| {
            (0..=6 - d - c).flat_map(move |b| (0..=6 - d - c - b).map(move |a| (a, b, c, d)))
        })
    })
}

/// Saturation vapour pressure over water in hPa (Hardy, ITS-90).
fn saturated_vapor_pressure_hpa(ta: f64) -> f64 {
    const G: [f64; 7] = [
        -2.8365744e3,
        -6.028076559e3,
        1.954263612e1,
        -2.737830188e-2,
        1.6261698e-5,
        7.0229056e-10,
        -1.8680009e-13,
    ];
    let tk = ta + 273.15;
    let ln_es = G
        .iter()
        .enumerate()
        .fold(2.7150305 * tk.ln(), |ln_es, (i, g)| ln_es + g * tk.powi(i as i32 - 2));
    ln_es.exp() * 0.01
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct UtciParameter {
    /// UTCI below which there is cold stress.
    pub cold_thresh: f64,
    /// UTCI above which there is heat stress.
    pub heat_thresh: f64,
    pub extreme_cold_thresh: f64,
    pub extreme_heat_thresh: f64,
}

impl Default for UtciParameter {
    fn default() -> Self {
        Self {
            cold_thresh: 9.,
            heat_thresh: 26.,
            extreme_cold_thresh: -13.,
            extreme_heat_thresh: 28.,
        }
    }
}

impl UtciParameter {
    fn validate(self) -> Result<Self, ThermalMapError> {
        if !(self.extreme_cold_thresh <= self.cold_thresh
            && self.cold_thresh <= self.heat_thresh
            && self.heat_thresh <= self.extreme_heat_thresh)
        {
            return Err(ThermalMapError::InvalidParameter(
                "UTCI thresholds must rise from --extreme-cold through --cold and --heat to --extreme-heat"
                    .to_string(),
            ));
        }
        Ok(self)
    }

    /// -1 for cold stress, 1 for heat stress, else 0.
    pub fn thermal_condition(&self, utci: f64) -> i32 {
        if utci < self.cold_thresh {
            -1
        } else if utci > self.heat_thresh {
            1
        } else {
            0
        }
    }
}

/// Parses `--cold 9 --heat 26 --extreme-cold -13 --extreme-heat 28`, any of which may be left out.
impl FromStr for UtciParameter {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parameter = Self::default();
        for (key, value) in parse_parameter_string(s)? {
            let number = parse_parameter_number(&key, &value)?;
            match key.as_str() {
                "cold" => parameter.cold_thresh = number,
                "heat" => parameter.heat_thresh = number,
                "extreme-cold" => parameter.extreme_cold_thresh = number,
                "extreme-heat" => parameter.extreme_heat_thresh = number,
                _ => return Err(unknown_parameter("UTCI", &key)),
            }
        }
        parameter.validate()
    }
}

/// Stress category on the eleven point scale, from -5 (extreme cold stress) to 5 (extreme heat
/// stress), with 0 for no thermal stress.
pub fn thermal_condition_eleven_point(utci: f64) -> i32 {
    let band = STRESS_BAND_UPPER_BOUNDS
        .iter()
        .position(|upper| utci < *upper)
        .unwrap_or(STRESS_BAND_UPPER_BOUNDS.len());
    band as i32 - 5
}

pub struct UtciModel<R: UtciRegression> {
    pub parameter: UtciParameter,
    regression: R,
}

impl<R: UtciRegression> UtciModel<R> {
    pub fn new(parameter: UtciParameter, regression: R) -> Self {
        Self {
            parameter,
            regression,
        }
    }
}

impl<R: UtciRegression> Debug for UtciModel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtciModel")
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

impl<R: UtciRegression> ComfortModel for UtciModel<R> {
    fn kind(&self) -> ModelKind {
        ModelKind::Utci
    }

    fn evaluate(&self, conditions: &SensorConditions) -> anyhow::Result<ComfortSeries> {
        let mut series = ComfortSeries::with_capacity(conditions.len());
        for step in 0..conditions.len() {
            let c = conditions.at(step);
            let utci = self.regression.utci(c.ta, c.tr, c.vel, c.rh);
            if !utci.is_finite() {
                anyhow::bail!("UTCI is not finite for ta={}, tr={}, vel={}, rh={}", c.ta, c.tr, c.vel, c.rh);
            }
            series.push(
                utci,
                self.parameter.thermal_condition(utci),
                thermal_condition_eleven_point(utci) as f64,
            );
        }
        Ok(series)
    }
}
