use serde::{Deserialize, Serialize};

/// Calibration coefficients of the fire transition rule.
///
/// Loaded from the `[rule]` table of the simulation config. Every field has
/// a default, so an absent table yields the calibrated baseline below.
/// Rates are per unit of simulation time (the unit of `dt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Fuel consumed per unit time by a burning cell in calm, dry air.
    #[serde(default = "default_base_burn_rate")]
    pub base_burn_rate: f32,
    /// Relative burn-rate increase per m/s of wind.
    #[serde(default = "default_wind_burn_factor")]
    pub wind_burn_factor: f32,
    /// Fraction of the burn rate removed at humidity 1.0.
    #[serde(default = "default_humidity_burn_damping")]
    pub humidity_burn_damping: f32,

    /// Ignition hazard from one fully fuelled orthogonal neighbour in calm, dry air.
    #[serde(default = "default_base_ignition")]
    pub base_ignition: f32,
    /// Sharpness of the downwind spread cone per m/s of wind.
    #[serde(default = "default_wind_alignment_strength")]
    pub wind_alignment_strength: f32,
    /// Fraction of the ignition hazard removed at humidity 1.0.
    #[serde(default = "default_humidity_suppression")]
    pub humidity_suppression: f32,
    /// Relative ignition change per degree above `reference_temperature`.
    #[serde(default = "default_temperature_sensitivity")]
    pub temperature_sensitivity: f32,
    #[serde(default = "default_reference_temperature")]
    pub reference_temperature: f32,

    /// Extinguish hazard of a burning cell regardless of fuel or rain.
    #[serde(default = "default_extinguish_base")]
    pub extinguish_base: f32,
    /// Extra extinguish hazard as the remaining fuel approaches zero.
    #[serde(default = "default_extinguish_depletion")]
    pub extinguish_depletion: f32,
    /// Extra extinguish hazard under saturating rain.
    #[serde(default = "default_extinguish_rain")]
    pub extinguish_rain: f32,
    /// Rain volume (mm) at which rain effects reach ~63% of their maximum.
    #[serde(default = "default_rain_scale")]
    pub rain_scale: f32,

    /// Fuel treated as full intensity for spread and depletion.
    #[serde(default = "default_reference_fuel")]
    pub reference_fuel: f32,
}

fn default_base_burn_rate() -> f32 {
    0.1
}
fn default_wind_burn_factor() -> f32 {
    0.05
}
fn default_humidity_burn_damping() -> f32 {
    0.6
}
fn default_base_ignition() -> f32 {
    0.6
}
fn default_wind_alignment_strength() -> f32 {
    0.15
}
fn default_humidity_suppression() -> f32 {
    1.0
}
fn default_temperature_sensitivity() -> f32 {
    0.02
}
fn default_reference_temperature() -> f32 {
    20.0
}
fn default_extinguish_base() -> f32 {
    0.02
}
fn default_extinguish_depletion() -> f32 {
    0.3
}
fn default_extinguish_rain() -> f32 {
    0.6
}
fn default_rain_scale() -> f32 {
    5.0
}
fn default_reference_fuel() -> f32 {
    1.0
}

impl Default for RuleParams {
    fn default() -> Self {
        RuleParams {
            base_burn_rate: default_base_burn_rate(),
            wind_burn_factor: default_wind_burn_factor(),
            humidity_burn_damping: default_humidity_burn_damping(),
            base_ignition: default_base_ignition(),
            wind_alignment_strength: default_wind_alignment_strength(),
            humidity_suppression: default_humidity_suppression(),
            temperature_sensitivity: default_temperature_sensitivity(),
            reference_temperature: default_reference_temperature(),
            extinguish_base: default_extinguish_base(),
            extinguish_depletion: default_extinguish_depletion(),
            extinguish_rain: default_extinguish_rain(),
            rain_scale: default_rain_scale(),
            reference_fuel: default_reference_fuel(),
        }
    }
}

impl RuleParams {
    /// Collect every out-of-range coefficient. Messages are prefixed with `rule.`.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let non_negative = [
            ("base_burn_rate", self.base_burn_rate, 0.1),
            ("wind_burn_factor", self.wind_burn_factor, 0.05),
            ("wind_alignment_strength", self.wind_alignment_strength, 0.15),
            ("temperature_sensitivity", self.temperature_sensitivity, 0.02),
            ("extinguish_depletion", self.extinguish_depletion, 0.3),
            ("extinguish_rain", self.extinguish_rain, 0.6),
        ];
        for (name, value, example) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(format!(
                    "rule.{} must be >= 0.0, got {}. Example: {} = {}",
                    name, value, name, example
                ));
            }
        }

        let unit_interval = [
            ("humidity_burn_damping", self.humidity_burn_damping, 0.6),
            ("base_ignition", self.base_ignition, 0.6),
            ("humidity_suppression", self.humidity_suppression, 1.0),
            ("extinguish_base", self.extinguish_base, 0.02),
        ];
        for (name, value, example) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!(
                    "rule.{} must be 0.0-1.0, got {}. Example: {} = {}",
                    name, value, name, example
                ));
            }
        }

        let positive = [
            ("rain_scale", self.rain_scale, 5.0),
            ("reference_fuel", self.reference_fuel, 1.0),
        ];
        for (name, value, example) in positive {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!(
                    "rule.{} must be > 0.0, got {}. Example: {} = {}",
                    name, value, name, example
                ));
            }
        }

        if !self.reference_temperature.is_finite() {
            errors.push(format!(
                "rule.reference_temperature must be finite, got {}. Example: reference_temperature = 20.0",
                self.reference_temperature
            ));
        }

        errors
    }

    pub fn validate(&self) -> Result<(), String> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
