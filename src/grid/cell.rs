use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

// === Enums ===

/// Fire state of a single cell. Transitions only run Unburnt -> Burning -> Burnt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FireState {
    Unburnt,
    Burning,
    Burnt,
}

impl FireState {
    pub fn is_burning(self) -> bool {
        self == FireState::Burning
    }

    /// Whether `next` is a legal successor of this state (including staying put).
    pub fn can_become(self, next: FireState) -> bool {
        matches!(
            (self, next),
            (FireState::Unburnt, FireState::Unburnt)
                | (FireState::Unburnt, FireState::Burning)
                | (FireState::Burning, FireState::Burning)
                | (FireState::Burning, FireState::Burnt)
                | (FireState::Burnt, FireState::Burnt)
        )
    }
}

// === Layer Structs ===

/// Local weather of a cell.
///
/// `wind_direction` is the heading the wind blows toward, in radians,
/// counter-clockwise from +x (east). +y points north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature: f32,
    pub humidity: f32,
    pub rain_volume: f32,
    pub wind_speed: f32,
    pub wind_direction: f32,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            humidity: 0.0,
            rain_volume: 0.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
        }
    }
}

impl Weather {
    /// Unit vector of the wind heading in grid coordinates.
    pub fn wind_heading(&self) -> (f32, f32) {
        (self.wind_direction.cos(), self.wind_direction.sin())
    }

    /// Name of the first field holding NaN or infinity, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("rain_volume", self.rain_volume),
            ("wind_speed", self.wind_speed),
            ("wind_direction", self.wind_direction),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// Convert a meteorological wind direction (degrees clockwise from north,
/// the direction the wind comes FROM) into a grid heading in radians.
pub fn heading_from_meteorological(degrees: f32) -> f32 {
    let bearing_toward = degrees + 180.0;
    let heading = (90.0 - bearing_toward).to_radians();
    heading.rem_euclid(2.0 * PI)
}

/// Immutable terrain of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub is_water: bool,
    pub tree_coverage: f32,
}

/// Mutable part of a cell: weather plus fire fields.
///
/// The grid keeps two buffers of these, the live one and the staged one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub weather: Weather,
    pub fire: FireState,
    pub fuel: f32,
    pub p_ignite: f32,
    pub p_extinguish: f32,
}

impl CellState {
    pub fn unburnt(weather: Weather, fuel: f32) -> Self {
        Self {
            weather,
            fire: FireState::Unburnt,
            fuel,
            p_ignite: 0.0,
            p_extinguish: 0.0,
        }
    }

    /// Copy of this state with the transient probabilities cleared.
    pub fn at_rest(&self) -> Self {
        Self {
            p_ignite: 0.0,
            p_extinguish: 0.0,
            ..*self
        }
    }
}

// === Cell ===

/// Read-only view of one grid site.
#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    pub x: u32,
    pub y: u32,
    pub terrain: &'a Terrain,
    pub state: &'a CellState,
}

impl Cell<'_> {
    pub fn fire(&self) -> FireState {
        self.state.fire
    }

    pub fn fuel(&self) -> f32 {
        self.state.fuel
    }

    pub fn weather(&self) -> &Weather {
        &self.state.weather
    }

    pub fn is_water(&self) -> bool {
        self.terrain.is_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_state_transitions_are_forward_only() {
        assert!(FireState::Unburnt.can_become(FireState::Burning));
        assert!(FireState::Burning.can_become(FireState::Burnt));
        assert!(!FireState::Unburnt.can_become(FireState::Burnt));
        assert!(!FireState::Burnt.can_become(FireState::Burning));
        assert!(!FireState::Burnt.can_become(FireState::Unburnt));
        assert!(!FireState::Burning.can_become(FireState::Unburnt));
    }

    #[test]
    fn meteorological_west_wind_blows_east() {
        let heading = heading_from_meteorological(270.0);
        let (hx, hy) = Weather {
            wind_direction: heading,
            ..Weather::default()
        }
        .wind_heading();
        assert!((hx - 1.0).abs() < 1e-5, "hx = {}", hx);
        assert!(hy.abs() < 1e-5, "hy = {}", hy);
    }

    #[test]
    fn meteorological_south_wind_blows_north() {
        let heading = heading_from_meteorological(180.0);
        assert!((heading - PI / 2.0).abs() < 1e-5, "heading = {}", heading);
    }

    #[test]
    fn non_finite_field_is_named() {
        let mut weather = Weather::default();
        assert_eq!(weather.first_non_finite(), None);
        weather.rain_volume = f32::NAN;
        assert_eq!(weather.first_non_finite(), Some("rain_volume"));
    }

    #[test]
    fn at_rest_clears_probabilities_only() {
        let state = CellState {
            weather: Weather::default(),
            fire: FireState::Burning,
            fuel: 0.4,
            p_ignite: 0.3,
            p_extinguish: 0.2,
        };
        let rest = state.at_rest();
        assert_eq!(rest.fire, FireState::Burning);
        assert_eq!(rest.fuel, 0.4);
        assert_eq!(rest.p_ignite, 0.0);
        assert_eq!(rest.p_extinguish, 0.0);
    }

    #[test]
    fn cell_state_serde_round_trip() {
        let state = CellState::unburnt(
            Weather {
                temperature: 31.5,
                humidity: 0.2,
                rain_volume: 1.5,
                wind_speed: 7.0,
                wind_direction: 1.2,
            },
            0.8,
        );
        let encoded = bincode::serialize(&state).expect("serialize");
        let decoded: CellState = bincode::deserialize(&encoded).expect("deserialize");
        assert_eq!(state, decoded);
    }
}
