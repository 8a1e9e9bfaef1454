use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters used to procedurally generate a landscape and its weather.
/// The resolved copy (with the seed actually used) is written next to the
/// generated grid for reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Noise and ignition seed. 0 picks a random seed.
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_cell_resolution_km")]
    pub cell_resolution_km: f32,
    /// Fraction of cells that are water, taken from the lowest elevations.
    pub water_ratio: f32,
    /// Mean canopy density of land cells.
    pub tree_density: f32,
    /// Amplitude of the noise applied to elevation and canopy.
    pub roughness: f32,
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f32,
    #[serde(default = "default_base_humidity")]
    pub base_humidity: f32,
    /// Mean precipitation in mm.
    #[serde(default)]
    pub rain_volume: f32,
    /// Mean wind speed in m/s.
    #[serde(default = "default_wind_speed")]
    pub wind_speed: f32,
    /// Meteorological wind direction: degrees clockwise from north the wind comes from.
    #[serde(default = "default_wind_direction_deg")]
    pub wind_direction_deg: f32,
    /// Relative spatial variation of the weather fields around their means.
    #[serde(default = "default_weather_variability")]
    pub weather_variability: f32,
    #[serde(default = "default_fuel_load")]
    pub fuel_load: f32,
    /// Explicit ignition points as `[x, y]`.
    #[serde(default)]
    pub ignitions: Vec<[u32; 2]>,
    /// Extra ignition points drawn at random from land cells with fuel.
    #[serde(default)]
    pub random_ignitions: u32,
}

fn default_cell_resolution_km() -> f32 {
    1.0
}
fn default_base_temperature() -> f32 {
    25.0
}
fn default_base_humidity() -> f32 {
    0.3
}
fn default_wind_speed() -> f32 {
    4.0
}
fn default_wind_direction_deg() -> f32 {
    270.0
}
fn default_weather_variability() -> f32 {
    0.2
}
fn default_fuel_load() -> f32 {
    1.0
}

impl GenerationParams {
    /// Load generation parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let params: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        params.validate()?;
        Ok(params)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "width and height must be >= 1, got {}x{}",
                self.width, self.height
            ));
        }
        if !(self.cell_resolution_km.is_finite() && self.cell_resolution_km > 0.0) {
            return Err(format!(
                "cell_resolution_km must be > 0.0, got {}",
                self.cell_resolution_km
            ));
        }
        if !(0.0..=1.0).contains(&self.water_ratio) {
            return Err(format!("water_ratio must be 0.0-1.0, got {}", self.water_ratio));
        }
        if !(0.0..=1.0).contains(&self.tree_density) {
            return Err(format!("tree_density must be 0.0-1.0, got {}", self.tree_density));
        }
        if !(0.0..=1.0).contains(&self.roughness) {
            return Err(format!("roughness must be 0.0-1.0, got {}", self.roughness));
        }
        if !self.base_temperature.is_finite() {
            return Err(format!(
                "base_temperature must be finite, got {}",
                self.base_temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.base_humidity) {
            return Err(format!("base_humidity must be 0.0-1.0, got {}", self.base_humidity));
        }
        if !(self.rain_volume.is_finite() && self.rain_volume >= 0.0) {
            return Err(format!("rain_volume must be >= 0.0, got {}", self.rain_volume));
        }
        if !(self.wind_speed.is_finite() && self.wind_speed >= 0.0) {
            return Err(format!("wind_speed must be >= 0.0, got {}", self.wind_speed));
        }
        if !(0.0..=360.0).contains(&self.wind_direction_deg) {
            return Err(format!(
                "wind_direction_deg must be 0.0-360.0, got {}",
                self.wind_direction_deg
            ));
        }
        if !(0.0..=1.0).contains(&self.weather_variability) {
            return Err(format!(
                "weather_variability must be 0.0-1.0, got {}",
                self.weather_variability
            ));
        }
        if !(self.fuel_load.is_finite() && self.fuel_load >= 0.0) {
            return Err(format!("fuel_load must be >= 0.0, got {}", self.fuel_load));
        }
        if let Some([x, y]) = self
            .ignitions
            .iter()
            .find(|[x, y]| *x >= self.width || *y >= self.height)
        {
            return Err(format!(
                "ignition [{}, {}] lies outside the {}x{} grid",
                x, y, self.width, self.height
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base() -> GenerationParams {
        GenerationParams {
            seed: 42,
            width: 64,
            height: 48,
            cell_resolution_km: 0.5,
            water_ratio: 0.2,
            tree_density: 0.7,
            roughness: 0.5,
            base_temperature: 28.0,
            base_humidity: 0.25,
            rain_volume: 0.0,
            wind_speed: 5.0,
            wind_direction_deg: 270.0,
            weather_variability: 0.2,
            fuel_load: 1.0,
            ignitions: vec![[10, 10]],
            random_ignitions: 2,
        }
    }

    #[test]
    fn valid_params() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn empty_dimensions_rejected() {
        let params = GenerationParams {
            width: 0,
            ..base()
        };
        assert!(params.validate().unwrap_err().contains("width"));
    }

    #[test]
    fn invalid_water_ratio() {
        let params = GenerationParams {
            water_ratio: 1.5,
            ..base()
        };
        assert!(params.validate().unwrap_err().contains("water_ratio"));
    }

    #[test]
    fn invalid_wind_direction() {
        let params = GenerationParams {
            wind_direction_deg: -10.0,
            ..base()
        };
        assert!(params.validate().unwrap_err().contains("wind_direction_deg"));
    }

    #[test]
    fn ignition_outside_grid_rejected() {
        let params = GenerationParams {
            ignitions: vec![[64, 0]],
            ..base()
        };
        assert!(params.validate().unwrap_err().contains("outside"));
    }

    #[test]
    fn from_file_applies_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            "seed = 7\nwidth = 32\nheight = 16\nwater_ratio = 0.1\ntree_density = 0.8\nroughness = 0.4\nignitions = [[3, 4]]"
        )
        .unwrap();
        let params = GenerationParams::from_file(tmp.path()).unwrap();
        assert_eq!(params.width, 32);
        assert_eq!(params.ignitions, vec![[3, 4]]);
        assert_eq!(params.cell_resolution_km, 1.0);
        assert_eq!(params.wind_direction_deg, 270.0);
        assert_eq!(params.random_ignitions, 0);
    }

    #[test]
    fn from_file_reports_bad_toml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "width = ").unwrap();
        let err = GenerationParams::from_file(tmp.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"));
    }
}
