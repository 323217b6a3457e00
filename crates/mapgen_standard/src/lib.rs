//! MAPGEN Standard Recipe
//!
//! A complete recipe built only from the public authoring API:
//!
//! - `foundation`: plate seeding and base elevation
//! - `hydrology`: latitude-banded climate, then a refinement pass
//! - `ecology`: biome classification and write-back to the host

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecology;
pub mod foundation;
pub mod hydrology;
mod support;
pub mod tags;

use mapgen_authoring::{AuthoringError, Recipe};

/// Recipe id
pub const RECIPE_ID: &str = "standard";

/// Build the standard recipe
///
/// # Errors
///
/// Returns error if any stage, step, op or tag definition is rejected
pub fn standard_recipe() -> Result<Recipe, AuthoringError> {
    let tags = tags::registry().map_err(|source| AuthoringError::InvalidTag {
        step: RECIPE_ID.to_string(),
        source,
    })?;
    Recipe::builder(RECIPE_ID)
        .tags(tags)
        .stage(foundation::stage()?)
        .stage(hydrology::stage()?)
        .stage(ecology::stage()?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_context::MapContext;
    use mapgen_core::{Dimensions, Env, StepId};
    use mapgen_plan::compile;
    use mapgen_runtime::{Engine, EngineConfig, StepStatus};
    use mapgen_schema::{BufferKind, Value};
    use proptest::prelude::*;
    use serde_json::json;

    fn env(seed: u64) -> Env {
        Env::new(seed, Dimensions::new(24, 16))
    }

    fn step(stage: &str, step: &str) -> StepId {
        StepId::derive(RECIPE_ID, stage, step)
    }

    fn engine() -> Engine {
        Engine::new(standard_recipe().unwrap())
    }

    fn elevation(ctx: &MapContext) -> Vec<i16> {
        ctx.fields().get(tags::FIELD_ELEVATION).unwrap().as_i16().unwrap().to_vec()
    }

    #[test]
    fn test_recipe_shape() {
        let recipe = standard_recipe().unwrap();
        let ids: Vec<&str> = recipe.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "standard.foundation.crust",
                "standard.hydrology.climateBaseline",
                "standard.hydrology.climateRefine",
                "standard.ecology.biomes",
                "standard.ecology.applyBiomes",
            ]
        );
        assert_eq!(recipe.ops().len(), 3);
        assert_eq!(recipe.artifacts().count(), 3);
    }

    #[test]
    fn test_full_run_succeeds() {
        let generation = engine().generate_mock(&env(42), &Value::Null).unwrap();
        let report = &generation.report;
        assert!(report.success, "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.metrics.steps_succeeded, 5);

        let ctx = &generation.context;
        let dims = ctx.dimensions();
        assert!(ctx.fields().is_present(tags::FIELD_BIOME_ID, Some(BufferKind::U8), dims.area()));
        assert_eq!(ctx.artifacts().publish_count(tags::CLIMATE_FIELD), 2);
        assert_eq!(ctx.artifacts().publish_count(tags::CRUST), 1);

        let biome_ids = ctx.fields().get(tags::FIELD_BIOME_ID).unwrap().as_u8().unwrap();
        for y in 0..dims.height {
            for x in 0..dims.width {
                let expected = u16::from(biome_ids[dims.index(x, y)]);
                assert_eq!(ctx.adapter().biome(x, y), expected);
            }
        }
    }

    #[test]
    fn test_plan_scales_climate_bands() {
        let recipe = standard_recipe().unwrap();
        let plan = compile(&recipe, &Env::new(1, Dimensions::new(8, 128)), &Value::Null).unwrap();
        let node = plan.node(&step(hydrology::STAGE, "climateBaseline")).unwrap();
        assert_eq!(node.config.get_path(&["climate", "config", "bands"]), Some(&Value::from(8.0)));
    }

    #[test]
    fn test_knobs_reach_op_configs() {
        let recipe = standard_recipe().unwrap();
        let overrides = Value::from(json!({
            "foundation": {"knobs": {"continentBias": 0.5}},
            "hydrology": {"knobs": {"wetnessShift": 0.25}},
            "ecology": {"knobs": {"arid": true}},
        }));
        let plan = compile(&recipe, &env(1), &overrides).unwrap();
        let config = |stage: &str, name: &str| plan.node(&step(stage, name)).unwrap().config.clone();

        assert_eq!(config("foundation", "crust").get_path(&["crust", "config", "bias"]), Some(&Value::from(250.0)));
        assert_eq!(
            config("hydrology", "climateBaseline").get_path(&["climate", "config", "wetness"]),
            Some(&Value::from(0.75))
        );
        assert_eq!(
            config("ecology", "biomes").get("classify"),
            Some(&Value::from(json!({"strategy": "arid", "config": {"aridity": 0.6}})))
        );
    }

    #[test]
    fn test_uniform_land_has_no_marine_tiles() {
        let overrides = Value::from(json!({
            "foundation": {"crust": {"crust": {"strategy": "uniform", "config": {"level": 50}}}}
        }));
        let generation = engine().generate_mock(&env(7), &overrides).unwrap();
        assert!(generation.report.success);
        assert!(elevation(&generation.context).iter().all(|v| *v == 50));
        let biome_ids = generation.context.fields().get(tags::FIELD_BIOME_ID).unwrap().as_u8().unwrap();
        assert!(biome_ids.iter().all(|id| *id != 0));
    }

    #[test]
    fn test_disabled_apply_is_skipped() {
        let overrides = Value::from(json!({"ecology": {"applyBiomes": {"enabled": false}}}));
        let generation = engine().generate_mock(&env(3), &overrides).unwrap();
        let outcome = generation.report.outcome(&step("ecology", "applyBiomes")).unwrap();
        assert_eq!(outcome.status, StepStatus::Skipped);
        assert!(generation.report.success);
        let dims = generation.context.dimensions();
        assert!((0..dims.width).all(|x| generation.context.adapter().biome(x, 0) == 0));
    }

    #[test]
    fn test_bad_override_reports_path() {
        let overrides = Value::from(json!({"hydrology": {"climateRefine": {"passes": 2, "speed": 1}}}));
        let failure = compile(&standard_recipe().unwrap(), &env(1), &overrides).unwrap_err();
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].path.as_str(), "/config/hydrology/climateRefine/speed");
        assert_eq!(failure.errors[0].step_id, Some(step("hydrology", "climateRefine")));
    }

    #[test]
    fn test_out_of_range_knob() {
        let overrides = Value::from(json!({"foundation": {"knobs": {"continentBias": 3}}}));
        let failure = compile(&standard_recipe().unwrap(), &env(1), &overrides).unwrap_err();
        assert_eq!(failure.errors[0].code, "schema.out-of-range");
        assert_eq!(failure.errors[0].path.as_str(), "/config/foundation/knobs/continentBias");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_same_seed_same_world(seed in any::<u64>()) {
            let engine = engine().with_config(EngineConfig::default().with_verify_determinism(true));
            let first = engine.generate_mock(&env(seed), &Value::Null).unwrap();
            let second = engine.generate_mock(&env(seed), &Value::Null).unwrap();
            prop_assert_eq!(first.report.trace_digest, second.report.trace_digest);
            prop_assert_eq!(elevation(&first.context), elevation(&second.context));
            prop_assert_eq!(
                first.context.fields().get(tags::FIELD_BIOME_ID),
                second.context.fields().get(tags::FIELD_BIOME_ID)
            );
        }
    }
}
