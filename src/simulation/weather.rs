use std::f64::consts::TAU;

use crate::grid::cell::Weather;

/// Optional per-cell weather evolution run inside the compute phase.
///
/// Implementations see only the cell's pre-step weather, so they are
/// evaluated in parallel without coordination. The returned weather becomes
/// the staged weather of the cell; non-finite output aborts the step.
pub trait WeatherModel: Send + Sync {
    fn advance(&self, x: u32, y: u32, weather: &Weather, time: f64, dt: f32) -> Weather;
}

/// Sinusoidal day/night temperature swing with relative humidity moving
/// opposite to it.
///
/// Stateless: each call applies the change of the cycle between `time` and
/// `time + dt`, so the temperature oscillates around whatever baseline the
/// builder installed.
#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalCycle {
    /// Peak temperature deviation in degrees.
    pub amplitude: f32,
    /// Length of one cycle in simulation time units.
    pub period: f32,
    /// Humidity change per degree of temperature change (applied with opposite sign).
    pub humidity_coupling: f32,
}

impl DiurnalCycle {
    pub fn new(amplitude: f32, period: f32) -> Self {
        Self {
            amplitude,
            period,
            humidity_coupling: 0.01,
        }
    }

    fn phase(&self, time: f64) -> f64 {
        (TAU * time / self.period as f64).sin()
    }
}

impl WeatherModel for DiurnalCycle {
    fn advance(&self, _x: u32, _y: u32, weather: &Weather, time: f64, dt: f32) -> Weather {
        let delta = self.amplitude as f64 * (self.phase(time + dt as f64) - self.phase(time));
        let delta = delta as f32;
        Weather {
            temperature: weather.temperature + delta,
            humidity: (weather.humidity - self.humidity_coupling * delta).clamp(0.0, 1.0),
            ..*weather
        }
    }
}
