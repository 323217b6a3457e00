//! The host engine boundary.
//!
//! Step bodies reach the host only through [`MapAdapter`]. The core never
//! depends on a concrete host; [`MockAdapter`] is the in-memory substitute
//! used by tests and the CLI.

use mapgen_core::{Dimensions, Env, LatitudeBounds};
use mapgen_rng::LabelRng;

/// Read/write capabilities a host engine exposes to step bodies
///
/// Coordinates outside the map are ignored by setters and read as the
/// host's neutral value by getters.
pub trait MapAdapter: Send {
    /// Map size
    fn dimensions(&self) -> Dimensions;

    /// Elevation at a tile
    fn elevation(&self, x: u32, y: u32) -> i32;

    /// Set elevation at a tile
    fn set_elevation(&mut self, x: u32, y: u32, value: i32);

    /// Terrain type index at a tile
    fn terrain(&self, x: u32, y: u32) -> u16;

    /// Set terrain type index at a tile
    fn set_terrain(&mut self, x: u32, y: u32, terrain: u16);

    /// Whether a tile is water
    fn is_water(&self, x: u32, y: u32) -> bool;

    /// Latitude of a tile, in degrees
    fn latitude(&self, x: u32, y: u32) -> f64;

    /// Bounded random draw through the host
    fn random(&mut self, max_exclusive: u32, label: &str) -> u32;

    /// Feature at a tile, if any
    fn feature(&self, x: u32, y: u32) -> Option<u16>;

    /// Set or clear the feature at a tile
    fn set_feature(&mut self, x: u32, y: u32, feature: Option<u16>);

    /// Biome index at a tile
    fn biome(&self, x: u32, y: u32) -> u16;

    /// Set biome index at a tile
    fn set_biome(&mut self, x: u32, y: u32, biome: u16);

    /// Look up a terrain index by name
    fn terrain_index(&self, name: &str) -> Option<u16>;

    /// Look up a feature index by name
    fn feature_index(&self, name: &str) -> Option<u16>;

    /// Look up a biome index by name
    fn biome_index(&self, name: &str) -> Option<u16>;
}

/// Terrain names known to [`MockAdapter`], by index
pub const MOCK_TERRAINS: &[&str] = &["ocean", "coast", "flat", "hill", "mountain"];

/// Feature names known to [`MockAdapter`], by index
pub const MOCK_FEATURES: &[&str] = &["forest", "jungle", "marsh", "reef"];

/// Biome names known to [`MockAdapter`], by index
pub const MOCK_BIOMES: &[&str] = &["marine", "tundra", "grassland", "plains", "desert", "tropical"];

/// In-memory adapter
#[derive(Debug, Clone)]
pub struct MockAdapter {
    dimensions: Dimensions,
    latitude_bounds: LatitudeBounds,
    elevation: Vec<i32>,
    terrain: Vec<u16>,
    features: Vec<Option<u16>>,
    biomes: Vec<u16>,
    sea_level: i32,
    rng: LabelRng,
}

impl MockAdapter {
    /// Create a flat, all-water map for `env`
    #[must_use]
    pub fn new(env: &Env) -> Self {
        let area = env.dimensions.area();
        Self {
            dimensions: env.dimensions,
            latitude_bounds: env.latitude_bounds,
            elevation: vec![0; area],
            terrain: vec![0; area],
            features: vec![None; area],
            biomes: vec![0; area],
            sea_level: 0,
            rng: LabelRng::new(env.seed ^ 0x00ad_a9e7),
        }
    }

    /// Set the elevation at or below which a tile counts as water
    #[must_use]
    pub fn with_sea_level(mut self, sea_level: i32) -> Self {
        self.sea_level = sea_level;
        self
    }

    /// All biome indices, row-major
    #[must_use]
    pub fn biomes(&self) -> &[u16] {
        &self.biomes
    }

    /// All elevations, row-major
    #[must_use]
    pub fn elevations(&self) -> &[i32] {
        &self.elevation
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.dimensions.width && y < self.dimensions.height)
            .then(|| self.dimensions.index(x, y))
    }
}

fn lookup(names: &[&str], name: &str) -> Option<u16> {
    names
        .iter()
        .position(|n| *n == name)
        .and_then(|i| u16::try_from(i).ok())
}

impl MapAdapter for MockAdapter {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn elevation(&self, x: u32, y: u32) -> i32 {
        self.index(x, y).map_or(0, |i| self.elevation[i])
    }

    fn set_elevation(&mut self, x: u32, y: u32, value: i32) {
        if let Some(i) = self.index(x, y) {
            self.elevation[i] = value;
        }
    }

    fn terrain(&self, x: u32, y: u32) -> u16 {
        self.index(x, y).map_or(0, |i| self.terrain[i])
    }

    fn set_terrain(&mut self, x: u32, y: u32, terrain: u16) {
        if let Some(i) = self.index(x, y) {
            self.terrain[i] = terrain;
        }
    }

    fn is_water(&self, x: u32, y: u32) -> bool {
        self.elevation(x, y) <= self.sea_level
    }

    fn latitude(&self, _x: u32, y: u32) -> f64 {
        let LatitudeBounds { top, bottom } = self.latitude_bounds;
        if self.dimensions.height <= 1 {
            return (top + bottom) / 2.0;
        }
        let t = f64::from(y.min(self.dimensions.height - 1)) / f64::from(self.dimensions.height - 1);
        top + (bottom - top) * t
    }

    fn random(&mut self, max_exclusive: u32, label: &str) -> u32 {
        self.rng.draw(max_exclusive, label)
    }

    fn feature(&self, x: u32, y: u32) -> Option<u16> {
        self.index(x, y).and_then(|i| self.features[i])
    }

    fn set_feature(&mut self, x: u32, y: u32, feature: Option<u16>) {
        if let Some(i) = self.index(x, y) {
            self.features[i] = feature;
        }
    }

    fn biome(&self, x: u32, y: u32) -> u16 {
        self.index(x, y).map_or(0, |i| self.biomes[i])
    }

    fn set_biome(&mut self, x: u32, y: u32, biome: u16) {
        if let Some(i) = self.index(x, y) {
            self.biomes[i] = biome;
        }
    }

    fn terrain_index(&self, name: &str) -> Option<u16> {
        lookup(MOCK_TERRAINS, name)
    }

    fn feature_index(&self, name: &str) -> Option<u16> {
        lookup(MOCK_FEATURES, name)
    }

    fn biome_index(&self, name: &str) -> Option<u16> {
        lookup(MOCK_BIOMES, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> MockAdapter {
        MockAdapter::new(&Env::new(3, Dimensions::new(4, 5)))
    }

    #[test]
    fn test_set_and_get() {
        let mut a = adapter();
        a.set_elevation(1, 2, 40);
        a.set_biome(3, 4, 2);
        a.set_feature(0, 0, Some(1));
        assert_eq!(a.elevation(1, 2), 40);
        assert_eq!(a.biome(3, 4), 2);
        assert_eq!(a.feature(0, 0), Some(1));
        assert!(!a.is_water(1, 2));
        assert!(a.is_water(0, 0));
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut a = adapter();
        a.set_elevation(10, 10, 5);
        assert_eq!(a.elevation(10, 10), 0);
        assert_eq!(a.feature(99, 0), None);
    }

    #[test]
    fn test_latitude_spans_bounds() {
        let a = adapter();
        assert_eq!(a.latitude(0, 0), 90.0);
        assert_eq!(a.latitude(0, 4), -90.0);
        assert_eq!(a.latitude(0, 2), 0.0);
    }

    #[test]
    fn test_name_lookup() {
        let a = adapter();
        assert_eq!(a.terrain_index("mountain"), Some(4));
        assert_eq!(a.biome_index("desert"), Some(4));
        assert_eq!(a.feature_index("volcano"), None);
    }

    #[test]
    fn test_random_is_seeded() {
        let mut a = adapter();
        let mut b = adapter();
        assert_eq!(a.random(100, "x"), b.random(100, "x"));
    }
}
