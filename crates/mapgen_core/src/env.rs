//! The generation environment handed to the compiler.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Map size in tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Tiles per row
    pub width: u32,
    /// Number of rows
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Tile count (`width * height`)
    #[must_use]
    pub const fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of a tile
    #[must_use]
    pub const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Latitude span covered by the map, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatitudeBounds {
    /// Latitude of the top row
    pub top: f64,
    /// Latitude of the bottom row
    pub bottom: f64,
}

impl Default for LatitudeBounds {
    fn default() -> Self {
        Self {
            top: 90.0,
            bottom: -90.0,
        }
    }
}

/// Wrapping behavior at the map edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wrap {
    /// East-west wrap
    pub wrap_x: bool,
    /// North-south wrap
    pub wrap_y: bool,
}

impl Default for Wrap {
    fn default() -> Self {
        Self {
            wrap_x: true,
            wrap_y: false,
        }
    }
}

/// Generation environment
///
/// The compiled plan is a pure function of the recipe, this value and the
/// overrides; nothing else may influence compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    /// World seed
    pub seed: u64,
    /// Map dimensions
    pub dimensions: Dimensions,
    /// Latitude span
    #[serde(default)]
    pub latitude_bounds: LatitudeBounds,
    /// Edge wrapping
    #[serde(default)]
    pub wrap: Wrap,
}

impl Env {
    /// Create an environment with default latitude bounds and wrapping
    #[must_use]
    pub fn new(seed: u64, dimensions: Dimensions) -> Self {
        Self {
            seed,
            dimensions,
            latitude_bounds: LatitudeBounds::default(),
            wrap: Wrap::default(),
        }
    }

    /// Set latitude bounds
    #[must_use]
    pub fn with_latitude_bounds(mut self, top: f64, bottom: f64) -> Self {
        self.latitude_bounds = LatitudeBounds { top, bottom };
        self
    }

    /// Set edge wrapping
    #[must_use]
    pub fn with_wrap(mut self, wrap_x: bool, wrap_y: bool) -> Self {
        self.wrap = Wrap { wrap_x, wrap_y };
        self
    }

    /// Check the environment is usable
    ///
    /// # Errors
    ///
    /// Returns error for empty dimensions or out-of-range latitudes
    pub fn validate(&self) -> CoreResult<()> {
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(CoreError::InvalidEnv {
                field: "dimensions".to_string(),
                reason: format!(
                    "{}x{} has no tiles",
                    self.dimensions.width, self.dimensions.height
                ),
            });
        }
        let LatitudeBounds { top, bottom } = self.latitude_bounds;
        for (field, value) in [("latitudeBounds.top", top), ("latitudeBounds.bottom", bottom)] {
            if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
                return Err(CoreError::InvalidEnv {
                    field: field.to_string(),
                    reason: format!("{} is outside [-90, 90]", value),
                });
            }
        }
        if top < bottom {
            return Err(CoreError::InvalidEnv {
                field: "latitudeBounds".to_string(),
                reason: format!("top {} is below bottom {}", top, bottom),
            });
        }
        Ok(())
    }
}
