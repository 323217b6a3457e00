//! Hydrology stage: latitude-banded climate and its refinement.

use crate::support::{buffer, knob, latitudes, number, strategy_config_mut};
use crate::tags::{CLIMATE_FIELD, CLIMATE_REFINED, ELEVATION, FIELD_ELEVATION, FIELD_RAINFALL};
use mapgen_authoring::{
    AuthoringError, NormalizeContext, Op, OpContract, OpKind, Stage, Step, StepContract, StepError,
    Strategy, StrategySelection, DEFAULT_STRATEGY,
};
use mapgen_context::{ArtifactSpec, MapContext};
use mapgen_core::Env;
use mapgen_schema::{Buffer, BufferKind, BufferShape, NumberShape, ObjectShape, Value};
use std::sync::Arc;
use tracing::debug;

/// Stage id
pub const STAGE: &str = "hydrology";

/// Op id
pub const COMPUTE_CLIMATE_BASELINE: &str = "hydrology/compute-climate-baseline";

/// Map height at which the configured band count is used as-is
const REFERENCE_HEIGHT: f64 = 64.0;

/// Payload shape of `artifact:climateField`
///
/// Overwritable: the refine step republishes it.
#[must_use]
pub fn climate_field_spec() -> ArtifactSpec {
    ArtifactSpec::new(
        CLIMATE_FIELD,
        ObjectShape::new()
            .field("rainfall", BufferShape::per_tile(BufferKind::U8))
            .field("humidity", BufferShape::per_tile(BufferKind::U8)),
    )
}

/// Scale the band count with map height
fn scale_bands(config: Value, env: &Env) -> Result<Value, String> {
    let bands = number(&config, "bands")?;
    let scaled = (bands * f64::from(env.dimensions.height) / REFERENCE_HEIGHT)
        .round()
        .clamp(1.0, 32.0);
    Ok(config.with("bands", scaled))
}

fn banded_climate(input: &Value, config: &Value) -> Result<Value, String> {
    let latitude = buffer(input, "latitude")?;
    let elevation = buffer(input, "elevation")?;
    let bands = number(config, "bands")?;
    let wetness = number(config, "wetness")?;

    let mut rainfall = Vec::with_capacity(latitude.len());
    let mut humidity = Vec::with_capacity(latitude.len());
    for i in 0..latitude.len() {
        let lat = latitude.get_f64(i).unwrap_or(0.0).abs().min(90.0);
        let band = (lat / 90.0 * bands).floor().min(bands - 1.0);
        let moisture = wetness * (1.0 - band / bands);
        let height = elevation.get_f64(i).unwrap_or(0.0).max(0.0);
        let rain = (255.0 * moisture - height / 8.0).clamp(0.0, 255.0);
        rainfall.push(rain.round() as u8);
        humidity.push(((rain + 255.0 * wetness) / 2.0).round().clamp(0.0, 255.0) as u8);
    }
    Ok(Value::object()
        .with("rainfall", Buffer::U8(rainfall))
        .with("humidity", Buffer::U8(humidity)))
}

/// The `hydrology/compute-climate-baseline` op
///
/// # Errors
///
/// Returns error if the op definition is malformed
pub fn compute_climate_baseline_op() -> Result<Op, AuthoringError> {
    let tile = BufferShape::per_tile;
    let contract = OpContract::new(
        OpKind::Compute,
        COMPUTE_CLIMATE_BASELINE,
        ObjectShape::new()
            .field("latitude", tile(BufferKind::F32))
            .field("elevation", tile(BufferKind::I16)),
        ObjectShape::new()
            .field("rainfall", tile(BufferKind::U8))
            .field("humidity", tile(BufferKind::U8)),
    );
    let default = Strategy::new(
        ObjectShape::new()
            .field("bands", NumberShape::integer().with_range(1.0, 32.0).with_default(4.0))
            .field("wetness", NumberShape::new().with_range(0.0, 1.0).with_default(0.5)),
        banded_climate,
    )
    .with_resolve_config(scale_bands);
    Op::new(contract, [(DEFAULT_STRATEGY, default)])
}

fn shift_wetness(mut config: Value, ctx: &NormalizeContext<'_>) -> Result<Value, String> {
    let shift = knob(ctx, "wetnessShift");
    if let Some(op_config) = strategy_config_mut(&mut config, "climate", DEFAULT_STRATEGY) {
        let wetness = op_config.get("wetness").and_then(Value::as_f64).unwrap_or(0.5);
        op_config.insert("wetness", (wetness + shift).clamp(0.0, 1.0));
    }
    Ok(config)
}

fn run_baseline(op: &Op, ctx: &mut MapContext, config: &Value) -> Result<(), StepError> {
    let selection = StrategySelection::from_config(config, "climate")?;
    let elevation = ctx
        .fields()
        .get(FIELD_ELEVATION)
        .cloned()
        .ok_or("elevation field is missing")?;
    let input = Value::object()
        .with("latitude", latitudes(ctx))
        .with("elevation", elevation);
    let climate = op.run(&input, &selection, ctx.dimensions())?;
    ctx.fields_mut()
        .insert(FIELD_RAINFALL, buffer(&climate, "rainfall")?.clone());
    ctx.publish_artifact(CLIMATE_FIELD, climate)?;
    Ok(())
}

/// The `climateBaseline` step
///
/// # Errors
///
/// Returns error if the contract is malformed
pub fn climate_baseline_step(op: Arc<Op>) -> Result<Step, AuthoringError> {
    let contract = StepContract::builder("climateBaseline")
        .describe("Latitude-banded rainfall and humidity")
        .config(ObjectShape::new())
        .op("climate", op.clone())
        .requires(ELEVATION)
        .provides(CLIMATE_FIELD)
        .artifact(climate_field_spec())
        .build()?;
    Ok(Step::new(contract, move |ctx: &mut MapContext, config: &Value| run_baseline(&op, ctx, config))
        .with_normalize(shift_wetness))
}

/// Three-tap row smoothing, repeated `passes` times
fn smooth_rows(values: &[u8], width: usize, wrap: bool, passes: usize) -> Vec<u8> {
    let mut current = values.to_vec();
    if width == 0 {
        return current;
    }
    for _ in 0..passes {
        let previous = current.clone();
        for (row_index, row) in current.chunks_mut(width).enumerate() {
            let source = &previous[row_index * width..row_index * width + row.len()];
            let last = row.len() - 1;
            for (x, cell) in row.iter_mut().enumerate() {
                let left = match (x, wrap) {
                    (0, true) => source[last],
                    (0, false) => source[0],
                    _ => source[x - 1],
                };
                let right = match (x == last, wrap) {
                    (true, true) => source[0],
                    (true, false) => source[last],
                    _ => source[x + 1],
                };
                let sum = u32::from(left) + 2 * u32::from(source[x]) + u32::from(right);
                *cell = ((sum + 2) / 4) as u8;
            }
        }
    }
    current
}

fn run_refine(ctx: &mut MapContext, config: &Value) -> Result<(), StepError> {
    let passes = number(config, "passes")? as usize;
    let climate = ctx.read_artifact(CLIMATE_FIELD)?.clone();
    let rainfall = buffer(&climate, "rainfall")?
        .as_u8()
        .ok_or("rainfall is not a u8 buffer")?
        .to_vec();
    let width = ctx.dimensions().width as usize;
    let smoothed = smooth_rows(&rainfall, width, ctx.env().wrap.wrap_x, passes);

    ctx.fields_mut()
        .insert(FIELD_RAINFALL, Buffer::U8(smoothed.clone()));
    ctx.publish_artifact(CLIMATE_FIELD, climate.with("rainfall", Buffer::U8(smoothed)))?;
    debug!(passes, "Climate refined");
    Ok(())
}

/// The `climateRefine` step
///
/// # Errors
///
/// Returns error if the contract is malformed
pub fn climate_refine_step() -> Result<Step, AuthoringError> {
    let contract = StepContract::builder("climateRefine")
        .describe("Smooth rainfall and republish the climate field")
        .config(ObjectShape::new().field(
            "passes",
            NumberShape::integer().with_range(0.0, 8.0).with_default(1.0),
        ))
        .requires(CLIMATE_FIELD)
        .provides(CLIMATE_REFINED)
        .artifact(climate_field_spec())
        .build()?;
    Ok(Step::new(contract, run_refine))
}

/// The hydrology stage
///
/// Knob `wetnessShift` in `[-0.5, 0.5]` nudges baseline wetness.
///
/// # Errors
///
/// Returns error if an op or step is malformed
pub fn stage() -> Result<Stage, AuthoringError> {
    let op = Arc::new(compute_climate_baseline_op()?);
    Ok(Stage::new(STAGE)
        .knobs(ObjectShape::new().field(
            "wetnessShift",
            NumberShape::new().with_range(-0.5, 0.5).with_default(0.0),
        ))
        .step(climate_baseline_step(op)?)
        .step(climate_refine_step()?))
}
