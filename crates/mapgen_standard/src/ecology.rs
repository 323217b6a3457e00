//! Ecology stage: biome classification and write-back.

use crate::support::{buffer, latitudes, number, water_mask};
use crate::tags::{
    BIOME_CLASSIFICATION, BIOME_ID, BIOMES_APPLIED, CLIMATE_FIELD, ELEVATION, FIELD_BIOME_ID,
};
use mapgen_authoring::{
    AuthoringError, NormalizeContext, Op, OpContract, OpKind, Stage, Step, StepContract, StepError,
    Strategy, StrategySelection, DEFAULT_STRATEGY,
};
use mapgen_context::{ArtifactSpec, MapContext};
use mapgen_schema::{
    BooleanShape, Buffer, BufferKind, BufferShape, NumberShape, ObjectShape, Value,
};
use std::sync::Arc;

/// Stage id
pub const STAGE: &str = "ecology";

/// Op id
pub const CLASSIFY_BIOMES: &str = "ecology/classify-biomes";

/// Biome names, indexed by the ids the classifier emits
pub const BIOMES: [&str; 6] = ["marine", "tundra", "grassland", "plains", "desert", "tropical"];

const MARINE: u8 = 0;
const TUNDRA: u8 = 1;
const GRASSLAND: u8 = 2;
const PLAINS: u8 = 3;
const DESERT: u8 = 4;
const TROPICAL: u8 = 5;

/// Rainfall scaled by `factor`, then thresholded by latitude
fn classify(input: &Value, factor: f64) -> Result<Value, String> {
    let rainfall = buffer(input, "rainfall")?;
    let latitude = buffer(input, "latitude")?;
    let water = buffer(input, "water")?;
    let biomes = (0..rainfall.len())
        .map(|i| {
            let lat = latitude.get_f64(i).unwrap_or(0.0).abs();
            let rain = rainfall.get_f64(i).unwrap_or(0.0) * factor;
            if water.get_f64(i).unwrap_or(0.0) > 0.0 {
                MARINE
            } else if lat >= 60.0 {
                TUNDRA
            } else if rain >= 170.0 && lat < 25.0 {
                TROPICAL
            } else if rain >= 110.0 {
                GRASSLAND
            } else if rain >= 60.0 {
                PLAINS
            } else {
                DESERT
            }
        })
        .collect();
    Ok(Value::object().with("biomeId", Buffer::U8(biomes)))
}

/// The `ecology/classify-biomes` op
///
/// # Errors
///
/// Returns error if the op definition is malformed
pub fn classify_biomes_op() -> Result<Op, AuthoringError> {
    let tile = BufferShape::per_tile;
    let contract = OpContract::new(
        OpKind::Select,
        CLASSIFY_BIOMES,
        ObjectShape::new()
            .field("rainfall", tile(BufferKind::U8))
            .field("latitude", tile(BufferKind::F32))
            .field("water", tile(BufferKind::U8)),
        ObjectShape::new().field("biomeId", tile(BufferKind::U8)),
    );
    let default = Strategy::new(
        ObjectShape::new().field(
            "moistureScale",
            NumberShape::new().with_range(0.1, 4.0).with_default(1.0),
        ),
        |input: &Value, config: &Value| classify(input, number(config, "moistureScale")?),
    );
    let arid = Strategy::new(
        ObjectShape::new().field(
            "aridity",
            NumberShape::new().with_range(0.0, 1.0).with_default(0.6),
        ),
        |input: &Value, config: &Value| classify(input, 1.0 - number(config, "aridity")?),
    );
    Op::new(contract, [(DEFAULT_STRATEGY, default), ("arid", arid)])
}

/// Payload shape of `artifact:biomeClassification`
#[must_use]
pub fn biome_classification_spec() -> ArtifactSpec {
    ArtifactSpec::new(
        BIOME_CLASSIFICATION,
        ObjectShape::new().field("biomeId", BufferShape::per_tile(BufferKind::U8)),
    )
}

/// Swap the default strategy for `arid` when the stage asks for it
fn apply_arid_knob(mut config: Value, ctx: &NormalizeContext<'_>) -> Result<Value, String> {
    let arid = ctx.knobs.get("arid").and_then(Value::as_bool).unwrap_or(false);
    let uses_default = config
        .get_path(&["classify", "strategy"])
        .and_then(Value::as_str)
        == Some(DEFAULT_STRATEGY);
    if arid && uses_default {
        config.insert("classify", Value::object().with("strategy", "arid"));
    }
    Ok(config)
}

fn run_biomes(op: &Op, ctx: &mut MapContext, config: &Value) -> Result<(), StepError> {
    let selection = StrategySelection::from_config(config, "classify")?;
    let climate = ctx.read_artifact(CLIMATE_FIELD)?;
    let input = Value::object()
        .with("rainfall", buffer(climate, "rainfall")?.clone())
        .with("latitude", latitudes(ctx))
        .with("water", water_mask(ctx));
    let output = op.run(&input, &selection, ctx.dimensions())?;
    let biome_id = buffer(&output, "biomeId")?.clone();
    ctx.fields_mut().insert(FIELD_BIOME_ID, biome_id.clone());
    ctx.publish_artifact(BIOME_CLASSIFICATION, Value::object().with("biomeId", biome_id))?;
    Ok(())
}

/// The `biomes` step
///
/// # Errors
///
/// Returns error if the contract is malformed
pub fn biomes_step(op: Arc<Op>) -> Result<Step, AuthoringError> {
    let contract = StepContract::builder("biomes")
        .describe("Classify each tile into a biome")
        .config(ObjectShape::new())
        .op("classify", op.clone())
        .requires(ELEVATION)
        .requires(CLIMATE_FIELD)
        .provides(BIOME_ID)
        .provides(BIOME_CLASSIFICATION)
        .artifact(biome_classification_spec())
        .build()?;
    Ok(Step::new(contract, move |ctx: &mut MapContext, config: &Value| run_biomes(&op, ctx, config))
        .with_normalize(apply_arid_knob))
}

fn run_apply(ctx: &mut MapContext, _config: &Value) -> Result<(), StepError> {
    let ids = buffer(ctx.read_artifact(BIOME_CLASSIFICATION)?, "biomeId")?
        .as_u8()
        .ok_or("biomeId is not a u8 buffer")?
        .to_vec();
    let mut host_ids = Vec::with_capacity(BIOMES.len());
    for name in BIOMES {
        let index = ctx
            .adapter()
            .biome_index(name)
            .ok_or_else(|| format!("host has no biome named '{}'", name))?;
        host_ids.push(index);
    }

    let dims = ctx.dimensions();
    let adapter = ctx.adapter_mut();
    for y in 0..dims.height {
        for x in 0..dims.width {
            let id = ids.get(dims.index(x, y)).copied().unwrap_or(MARINE);
            let host = host_ids
                .get(usize::from(id))
                .copied()
                .ok_or_else(|| format!("biome id {} is out of range", id))?;
            adapter.set_biome(x, y, host);
        }
    }
    Ok(())
}

/// The `applyBiomes` step
///
/// Skipped when `enabled` is false.
///
/// # Errors
///
/// Returns error if the contract is malformed
pub fn apply_biomes_step() -> Result<Step, AuthoringError> {
    let contract = StepContract::builder("applyBiomes")
        .describe("Write classified biomes to the host")
        .config(ObjectShape::new().field("enabled", BooleanShape::new().with_default(true)))
        .requires(BIOME_CLASSIFICATION)
        .provides(BIOMES_APPLIED)
        .build()?;
    Ok(Step::new(contract, run_apply).with_should_run(|_: &MapContext, config: &Value| {
        config.get("enabled").and_then(Value::as_bool).unwrap_or(true)
    }))
}

/// The ecology stage
///
/// Knob `arid` switches default classification to the `arid` strategy.
///
/// # Errors
///
/// Returns error if an op or step is malformed
pub fn stage() -> Result<Stage, AuthoringError> {
    let op = Arc::new(classify_biomes_op()?);
    Ok(Stage::new(STAGE)
        .knobs(ObjectShape::new().field("arid", BooleanShape::new().with_default(false)))
        .step(biomes_step(op)?)
        .step(apply_biomes_step()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_authoring::OpError;
    use mapgen_context::MOCK_BIOMES;
    use mapgen_core::Dimensions;
    use mapgen_schema::IssueCode;

    fn input(rain: Vec<u8>, lat: Vec<f32>, water: Vec<u8>) -> Value {
        Value::object()
            .with("rainfall", Buffer::U8(rain))
            .with("latitude", Buffer::F32(lat))
            .with("water", Buffer::U8(water))
    }

    fn ids(output: &Value) -> Vec<u8> {
        output.get("biomeId").and_then(Value::as_buffer).unwrap().as_u8().unwrap().to_vec()
    }

    #[test]
    fn test_classify_thresholds() {
        let input = input(
            vec![200, 200, 200, 120, 80, 10],
            vec![0.0, 70.0, 10.0, 40.0, 40.0, 40.0],
            vec![1, 0, 0, 0, 0, 0],
        );
        let output = classify(&input, 1.0).unwrap();
        assert_eq!(ids(&output), vec![MARINE, TUNDRA, TROPICAL, GRASSLAND, PLAINS, DESERT]);
    }

    #[test]
    fn test_arid_strategy_dries_tiles() {
        let op = classify_biomes_op().unwrap();
        let tile = input(vec![120], vec![40.0], vec![0]);
        let one = Dimensions::new(1, 1);
        let wet = op.run(&tile, &op.default_selection(), one).unwrap();
        let dry = op
            .run(&tile, &StrategySelection::new("arid", Value::object().with("aridity", 0.6)), one)
            .unwrap();
        assert_eq!(ids(&wet), vec![GRASSLAND]);
        assert_eq!(ids(&dry), vec![DESERT]);
    }

    #[test]
    fn test_mismatched_lengths() {
        let op = classify_biomes_op().unwrap();
        let short = input(vec![1, 2], vec![0.0], vec![0, 0]);
        let err = op.run(&short, &op.default_selection(), Dimensions::new(2, 1)).unwrap_err();
        match err {
            OpError::InvalidInput { issues, .. } => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].code, IssueCode::BufferLength);
                assert_eq!(issues[0].path.to_string(), "/latitude");
            }
            other => panic!("expected invalid input, got {other}"),
        }
    }

    #[test]
    fn test_biome_names_match_mock_host() {
        assert_eq!(&BIOMES[..], MOCK_BIOMES);
    }
}
