//! Dependency tags and field names used by the standard recipe.

use mapgen_context::TagRegistry;
use mapgen_core::CoreResult;
use mapgen_schema::BufferKind;

/// Elevation field buffer
pub const FIELD_ELEVATION: &str = "elevation";
/// Rainfall field buffer
pub const FIELD_RAINFALL: &str = "rainfall";
/// Biome classification field buffer
pub const FIELD_BIOME_ID: &str = "biomeId";

/// Elevation buffer is present
pub const ELEVATION: &str = "field:elevation";
/// Biome id buffer is present
pub const BIOME_ID: &str = "field:biomeId";
/// Crust artifact
pub const CRUST: &str = "artifact:crust";
/// Climate artifact (rainfall, humidity)
pub const CLIMATE_FIELD: &str = "artifact:climateField";
/// Biome classification artifact
pub const BIOME_CLASSIFICATION: &str = "artifact:biomeClassification";
/// Climate was refined
pub const CLIMATE_REFINED: &str = "effect:climateRefined";
/// Biomes were written to the host
pub const BIOMES_APPLIED: &str = "effect:biomesApplied";

/// Tag namespaces
pub const NAMESPACES: [&str; 3] = ["field", "artifact", "effect"];

/// Tag definitions for the standard recipe
///
/// Artifact tags share their artifact's id.
///
/// # Errors
///
/// Returns error if a definition is rejected
pub fn registry() -> CoreResult<TagRegistry> {
    let mut tags = TagRegistry::new(NAMESPACES);
    tags.define_buffer(ELEVATION, FIELD_ELEVATION, Some(BufferKind::I16))?;
    tags.define_buffer(BIOME_ID, FIELD_BIOME_ID, Some(BufferKind::U8))?;
    for artifact in [CRUST, CLIMATE_FIELD, BIOME_CLASSIFICATION] {
        tags.define_artifact(artifact, artifact)?;
    }
    tags.define_flag(CLIMATE_REFINED)?;
    tags.define_flag(BIOMES_APPLIED)?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_core::DependencyTag;

    #[test]
    fn test_registry_defines_everything() {
        let tags = registry().unwrap();
        assert_eq!(tags.definitions().count(), 7);
        let climate = DependencyTag::parse(CLIMATE_FIELD).unwrap();
        assert_eq!(tags.predicate(&climate).kind_name(), "artifact");
        let refined = DependencyTag::parse(CLIMATE_REFINED).unwrap();
        assert_eq!(tags.predicate(&refined).kind_name(), "flag");
    }
}
