//! Predicted Mean Vote after ISO 7730 and Standard Effective Temperature after the Gagge
//! two-node model of ASHRAE-55, with the elevated air speed cooling effect of ASHRAE-55
//! Appendix D.

use super::{
    saturated_vapor_pressure, saturated_vapor_pressure_torr, ComfortModel, ComfortSeries,
    Conditions, ModelKind, SensorConditions,
};
use crate::core::solvers::brent_in_bracket;
use crate::errors::ThermalMapError;
use crate::input::{parse_parameter_number, parse_parameter_string, unknown_parameter};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const PATM: f64 = 101325.; // Pa
const MAX_CLOTHING_ITERATIONS: u32 = 150;

/// Thresholds that decide whether a PMV result counts as comfortable.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PmvParameter {
    /// Percentage of people dissatisfied above which conditions are uncomfortable.
    pub ppd_threshold: f64,
    /// Humidity ratio limits in kg water / kg air.
    pub humid_ratio_upper: f64,
    pub humid_ratio_lower: f64,
    /// Air speed in m/s at and below which no cooling effect applies.
    pub still_air_threshold: f64,
}

impl Default for PmvParameter {
    fn default() -> Self {
        Self {
            ppd_threshold: 10.,
            humid_ratio_upper: 0.03,
            humid_ratio_lower: 0.,
            still_air_threshold: 0.1,
        }
    }
}

impl PmvParameter {
    fn validate(self) -> Result<Self, ThermalMapError> {
        let invalid = |message: &str| Err(ThermalMapError::InvalidParameter(message.to_string()));
        if !(5.0..=100.).contains(&self.ppd_threshold) {
            return invalid("--ppd-threshold must be between 5 and 100");
        }
        if !(0.0..=1.).contains(&self.humid_ratio_lower)
            || !(0.0..=1.).contains(&self.humid_ratio_upper)
            || self.humid_ratio_lower > self.humid_ratio_upper
        {
            return invalid("humidity ratio limits must satisfy 0 <= --hr-lower <= --hr-upper <= 1");
        }
        if self.still_air_threshold < 0. {
            return invalid("--still-air-threshold must not be negative");
        }
        Ok(self)
    }

    /// -1 when too cool, 1 when too warm or humid, else 0.
    pub fn thermal_condition(&self, pmv: f64, ppd: f64, humidity_ratio: f64) -> i32 {
        if ppd >= self.ppd_threshold {
            if pmv < 0. {
                -1
            } else {
                1
            }
        } else if humidity_ratio > self.humid_ratio_upper {
            1
        } else if humidity_ratio < self.humid_ratio_lower {
            -1
        } else {
            0
        }
    }
}

/// Parses `--ppd-threshold 10 --hr-upper 0.03 --hr-lower 0 --still-air-threshold 0.1`, any of
/// which may be left out.
impl FromStr for PmvParameter {
    type Err = ThermalMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parameter = Self::default();
        for (key, value) in parse_parameter_string(s)? {
            let number = parse_parameter_number(&key, &value)?;
            match key.as_str() {
                "ppd-threshold" => parameter.ppd_threshold = number,
                "hr-upper" => parameter.humid_ratio_upper = number,
                "hr-lower" => parameter.humid_ratio_lower = number,
                "still-air-threshold" => parameter.still_air_threshold = number,
                _ => return Err(unknown_parameter("PMV", &key)),
            }
        }
        parameter.validate()
    }
}

/// Which temperature is reported alongside the PMV condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemperatureMetric {
    Operative,
    #[default]
    StandardEffective,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PmvModel {
    pub parameter: PmvParameter,
    pub temperature_metric: TemperatureMetric,
}

impl PmvModel {
    pub fn new(parameter: PmvParameter, temperature_metric: TemperatureMetric) -> Self {
        Self {
            parameter,
            temperature_metric,
        }
    }

    fn evaluate_step(&self, c: Conditions) -> anyhow::Result<(f64, i32, f64)> {
        let humidity_ratio = humidity_ratio(c.ta, c.rh);
        let (pmv, ppd, temperature) = match self.temperature_metric {
            TemperatureMetric::Operative => {
                let (pmv, ppd) = fanger_pmv(c.ta, c.tr, c.vel, c.rh, c.met, c.clo)?;
                (pmv, ppd, (c.ta + c.tr) / 2.)
            }
            TemperatureMetric::StandardEffective => {
                let set = pierce_set(c.ta, c.tr, c.vel, c.rh, c.met, c.clo);
                let still_air = self.parameter.still_air_threshold;
                let (pmv, ppd) = if c.vel > still_air {
                    let ce = cooling_effect(set, c, still_air)?;
                    fanger_pmv(c.ta - ce, c.tr - ce, still_air, c.rh, c.met, c.clo)?
                } else {
                    fanger_pmv(c.ta, c.tr, c.vel, c.rh, c.met, c.clo)?
                };
                (pmv, ppd, set)
            }
        };

        Ok((
            temperature,
            self.parameter.thermal_condition(pmv, ppd, humidity_ratio),
            pmv,
        ))
    }
}

impl ComfortModel for PmvModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Pmv
    }

    fn evaluate(&self, conditions: &SensorConditions) -> anyhow::Result<ComfortSeries> {
        let mut series = ComfortSeries::with_capacity(conditions.len());
        for step in 0..conditions.len() {
            let (temperature, condition, pmv) = self.evaluate_step(conditions.at(step))?;
            series.push(temperature, condition, pmv);
        }
        Ok(series)
    }
}

/// Humidity ratio in kg water / kg dry air.
pub fn humidity_ratio(ta: f64, rh: f64) -> f64 {
    let pw = rh / 100. * saturated_vapor_pressure(ta);
    0.62198 * pw / (PATM - pw)
}

/// Fanger's PMV and PPD from air temperature, radiant temperature (both in C), air speed (m/s),
/// relative humidity (%), metabolic rate (met) and clothing (clo).
pub fn fanger_pmv(
    ta: f64,
    tr: f64,
    vel: f64,
    rh: f64,
    met: f64,
    clo: f64,
) -> anyhow::Result<(f64, f64)> {
    let pa = rh * 10. * (16.6536 - 4030.183 / (ta + 235.)).exp();

    let icl = 0.155 * clo;
    let m = met * 58.15;
    let mw = m;
    let fcl = if icl <= 0.078 {
        1. + 1.29 * icl
    } else {
        1.05 + 0.645 * icl
    };

    let hcf = 12.1 * vel.sqrt();
    let taa = ta + 273.;
    let tra = tr + 273.;
    let tcla = taa + (35.5 - ta) / (3.5 * icl + 0.1);

    let p1 = icl * fcl;
    let p2 = p1 * 3.96;
    let p3 = p1 * 100.;
    let p4 = p1 * taa;
    let p5 = 308.7 - 0.028 * mw + p2 * (tra / 100.).powi(4);
    let mut xn = tcla / 100.;
    let mut xf = tcla / 50.;
    let eps = 0.00015;

    let mut hc = hcf;
    let mut n = 0;
    while (xn - xf).abs() > eps {
        xf = (xf + xn) / 2.;
        let hcn = 2.38 * (100. * xf - taa).abs().powf(0.25);
        hc = hcf.max(hcn);
        xn = (p5 + p4 * hc - p2 * xf.powi(4)) / (100. + p3 * hc);
        n += 1;
        if n > MAX_CLOTHING_ITERATIONS {
            bail!("clothing surface temperature did not converge for ta={ta}, tr={tr}, vel={vel}");
        }
    }
    let tcl = 100. * xn - 273.;

    // heat loss through skin, sweating, respiration, radiation and convection
    let hl1 = 3.05 * 0.001 * (5733. - 6.99 * mw - pa);
    let hl2 = if mw > 58.15 { 0.42 * (mw - 58.15) } else { 0. };
    let hl3 = 1.7 * 0.00001 * m * (5867. - pa);
    let hl4 = 0.0014 * m * (34. - ta);
    let hl5 = 3.96 * fcl * (xn.powi(4) - (tra / 100.).powi(4));
    let hl6 = fcl * hc * (tcl - ta);

    let ts = 0.303 * (-0.036 * m).exp() + 0.028;
    let pmv = ts * (mw - hl1 - hl2 - hl3 - hl4 - hl5 - hl6);

    Ok((pmv, ppd_from_pmv(pmv)))
}

pub fn ppd_from_pmv(pmv: f64) -> f64 {
    100. - 95. * (-0.03353 * pmv.powi(4) - 0.2179 * pmv.powi(2)).exp()
}

/// Standard Effective Temperature in C. Inputs as for [fanger_pmv].
pub fn pierce_set(ta: f64, tr: f64, vel: f64, rh: f64, met: f64, clo: f64) -> f64 {
    let vapor_pressure = rh * saturated_vapor_pressure_torr(ta) / 100.;
    let air_speed = vel.max(0.1);
    let k_clo = 0.25;
    let body_weight = 69.9; // kg
    let body_surface_area = 1.8258; // m2
    let met_factor = 58.2; // W/m2
    let sbc = 0.000000056697; // Stefan-Boltzmann constant
    let c_sw = 170.; // driving coefficient for regulatory sweating
    let c_dil = 120.; // driving coefficient for vasodilation
    let c_str = 0.5; // driving coefficient for vasoconstriction

    let temp_skin_neutral = 33.7;
    let temp_core_neutral = 36.8;
    let temp_body_neutral = 36.49;
    let skin_blood_flow_neutral = 6.3;

    let mut temp_skin = temp_skin_neutral;
    let mut temp_core = temp_core_neutral;
    let mut skin_blood_flow = skin_blood_flow_neutral;
    let mut alfa = 0.1; // fractional skin mass
    let mut e_sk = 0.1 * met; // total evaporative heat loss, W

    let pressure_in_atmospheres = PATM / 101325.;
    let r_clo = 0.155 * clo;
    let f_a_cl = 1.0 + 0.15 * clo;
    let lr = 2.2 / pressure_in_atmospheres; // Lewis ratio
    let rm = met * met_factor;
    let mut m = rm;

    let i_cl = if clo > 0. { 0.45 } else { 1.0 };
    let w_max = if clo > 0. {
        0.59 * air_speed.powf(-0.08)
    } else {
        0.38 * air_speed.powf(-0.29)
    };

    let h_cc = (3.0 * pressure_in_atmospheres.powf(0.53))
        .max(8.600001 * (air_speed * pressure_in_atmospheres).powf(0.53));

    let mut c_hr = 4.7;
    let mut ctc = c_hr + h_cc;
    let mut r_a = 1.0 / (f_a_cl * ctc);
    let mut t_op = (c_hr * tr + h_cc * ta) / ctc;

    let mut dry = 0.;
    let mut p_wet = 0.;

    // one simulated hour at one-minute steps
    for _ in 0..60 {
        let mut t_cl = (r_a * temp_skin + r_clo * t_op) / (r_a + r_clo);
        for _ in 0..MAX_CLOTHING_ITERATIONS {
            c_hr = 4.0 * sbc * ((t_cl + tr) / 2.0 + 273.15).powi(3) * 0.72;
            ctc = c_hr + h_cc;
            r_a = 1.0 / (f_a_cl * ctc);
            t_op = (c_hr * tr + h_cc * ta) / ctc;
            let t_cl_new = (r_a * temp_skin + r_clo * t_op) / (r_a + r_clo);
            let converged = (t_cl_new - t_cl).abs() <= 0.01;
            t_cl = t_cl_new;
            if converged {
                break;
            }
        }

        dry = (temp_skin - t_op) / (r_a + r_clo);
        let h_fcs = (temp_core - temp_skin) * (5.28 + 1.163 * skin_blood_flow);
        let q_res = 0.0023 * m * (44.0 - vapor_pressure);
        let c_res = 0.0014 * m * (34.0 - ta);
        let s_core = m - h_fcs - q_res - c_res;
        let s_skin = h_fcs - dry - e_sk;
        let tc_sk = 0.97 * alfa * body_weight;
        let tc_cr = 0.97 * (1. - alfa) * body_weight;
        temp_skin += (s_skin * body_surface_area) / (tc_sk * 60.0);
        temp_core += (s_core * body_surface_area) / (tc_cr * 60.0);
        let t_body = alfa * temp_skin + (1. - alfa) * temp_core;

        let sk_sig = temp_skin - temp_skin_neutral;
        let warm_sk = sk_sig.max(0.);
        let cold_sk = (-sk_sig).max(0.);
        let c_reg_sig = temp_core - temp_core_neutral;
        let c_warm = c_reg_sig.max(0.);
        let c_cold = (-c_reg_sig).max(0.);
        let warm_body = (t_body - temp_body_neutral).max(0.);

        skin_blood_flow =
            ((skin_blood_flow_neutral + c_dil * c_warm) / (1. + c_str * cold_sk)).clamp(0.5, 90.);
        let reg_sw = (c_sw * warm_body * (warm_sk / 10.7).exp()).min(500.);
        let mut e_rsw = 0.68 * reg_sw;
        let r_ea = 1.0 / (lr * f_a_cl * h_cc);
        let r_ecl = r_clo / (lr * i_cl);
        let e_max = (saturated_vapor_pressure_torr(temp_skin) - vapor_pressure) / (r_ea + r_ecl);
        let mut p_rsw = e_rsw / e_max;
        p_wet = 0.06 + 0.94 * p_rsw;
        let mut e_diff = p_wet * e_max - e_rsw;
        if p_wet > w_max {
            p_wet = w_max;
            p_rsw = w_max / 0.94;
            e_rsw = p_rsw * e_max;
            e_diff = 0.06 * (1.0 - p_rsw) * e_max;
        }
        if e_max < 0. {
            e_diff = 0.;
            e_rsw = 0.;
            p_wet = w_max;
        }
        e_sk = e_rsw + e_diff;
        m = rm + 19.4 * cold_sk * c_cold; // shivering
        alfa = 0.0417737 + 0.7451833 / (skin_blood_flow + 0.585417);
    }

    let hsk = dry + e_sk;
    let ps_sk = saturated_vapor_pressure_torr(temp_skin);

    // standard environment: still air, 50 % relative humidity, activity-dependent clothing
    let c_hr_s = c_hr;
    let c_hc_s = if met < 0.85 {
        3.0
    } else {
        (5.66 * (met - 0.85).powf(0.39)).max(3.0)
    };
    let ctc_s = c_hc_s + c_hr_s;
    let r_clo_s = 1.52 / (met + 0.6944) - 0.1835;
    let r_cl_s = 0.155 * r_clo_s;
    let f_a_cl_s = 1.0 + k_clo * r_clo_s;
    let f_cl_s = 1.0 / (1.0 + 0.155 * f_a_cl_s * ctc_s * r_clo_s);
    let i_m_s = 0.45;
    let i_cl_s = i_m_s * c_hc_s / ctc_s * (1. - f_cl_s) / (c_hc_s / ctc_s - f_cl_s * i_m_s);
    let r_a_s = 1.0 / (f_a_cl_s * ctc_s);
    let r_ea_s = 1.0 / (lr * f_a_cl_s * c_hc_s);
    let r_ecl_s = r_cl_s / (lr * i_cl_s);
    let h_d_s = 1.0 / (r_a_s + r_cl_s);
    let h_e_s = 1.0 / (r_ea_s + r_ecl_s);

    // secant search for the temperature giving the same skin heat loss
    let delta = 0.0001;
    let error = |x: f64| {
        hsk - h_d_s * (temp_skin - x) - p_wet * h_e_s * (ps_sk - 0.5 * saturated_vapor_pressure_torr(x))
    };
    let mut x_old = temp_skin - hsk / h_d_s;
    for _ in 0..100 {
        let err1 = error(x_old);
        let err2 = error(x_old + delta);
        let x = x_old - delta * err1 / (err2 - err1);
        let dx = x - x_old;
        x_old = x;
        if dx.abs() <= 0.01 {
            break;
        }
    }

    x_old
}

/// Reduction in air and radiant temperature, in C, that gives the same SET in still air as the
/// given conditions do at their elevated air speed.
fn cooling_effect(set_elevated: f64, c: Conditions, still_air: f64) -> anyhow::Result<f64> {
    let difference = |ce: f64| {
        set_elevated - pierce_set(c.ta - ce, c.tr - ce, still_air, c.rh, c.met, c.clo)
    };

    Ok(brent_in_bracket(difference, 0., 40., 0.001)?.unwrap_or(0.))
}
