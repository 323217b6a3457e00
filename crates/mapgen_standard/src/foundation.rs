//! Foundation stage: plate seeding and base elevation.

use crate::support::{buffer, knob, number, strategy_config_mut};
use crate::tags::{CRUST, ELEVATION, FIELD_ELEVATION};
use mapgen_authoring::{
    AuthoringError, NormalizeContext, Op, OpContract, OpKind, Stage, Step, StepContract, StepError,
    Strategy, StrategySelection, DEFAULT_STRATEGY,
};
use mapgen_context::{ArtifactSpec, MapContext};
use mapgen_schema::{
    BooleanShape, Buffer, BufferKind, BufferLength, BufferShape, NumberShape, ObjectShape, Value,
};
use std::sync::Arc;
use tracing::debug;

/// Stage id
pub const STAGE: &str = "foundation";

/// Op id
pub const COMPUTE_CRUST: &str = "foundation/compute-crust";

/// Plate lift is drawn from `[0, PLATE_LIFT)` and centered on zero
const PLATE_LIFT: u32 = 2000;

/// Elevation lost per tile of distance from a plate center
const FALLOFF: f64 = 8.0;

/// Elevation added per unit of `continentBias`
const BIAS_SCALE: f64 = 500.0;

fn to_i16(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Nearest-plate elevation with distance falloff
fn seed_plates(input: &Value, config: &Value) -> Result<Value, String> {
    let width = number(input, "width")? as usize;
    let height = number(input, "height")? as usize;
    let wrap = input.get("wrapX").and_then(Value::as_bool).unwrap_or(false);
    let (xs, ys, lifts) = (buffer(input, "plateX")?, buffer(input, "plateY")?, buffer(input, "plateLift")?);
    if xs.is_empty() || xs.len() != ys.len() || xs.len() != lifts.len() {
        return Err(format!(
            "plate buffers disagree: {} x, {} y, {} lift",
            xs.len(),
            ys.len(),
            lifts.len()
        ));
    }
    let plates: Vec<(f64, f64, f64)> = (0..xs.len())
        .filter_map(|i| Some((xs.get_f64(i)?, ys.get_f64(i)?, lifts.get_f64(i)?)))
        .collect();
    let bias = number(config, "bias")?;

    let mut elevation = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (distance, lift) = plates
                .iter()
                .map(|&(px, py, lift)| {
                    let mut dx = (x as f64 - px).abs();
                    if wrap {
                        dx = dx.min(width as f64 - dx);
                    }
                    (dx.hypot(y as f64 - py), lift)
                })
                .fold((f64::INFINITY, 0.0), |best, candidate| {
                    if candidate.0 < best.0 { candidate } else { best }
                });
            elevation.push(to_i16(lift + bias - distance * FALLOFF));
        }
    }
    Ok(Value::object().with("elevation", Buffer::I16(elevation)))
}

fn uniform_crust(input: &Value, config: &Value) -> Result<Value, String> {
    let area = number(input, "width")? as usize * number(input, "height")? as usize;
    let level = to_i16(number(config, "level")?);
    Ok(Value::object().with("elevation", Buffer::I16(vec![level; area])))
}

/// The `foundation/compute-crust` op
///
/// # Errors
///
/// Returns error if the op definition is malformed
pub fn compute_crust_op() -> Result<Op, AuthoringError> {
    let any = |kind| BufferShape::new(kind, BufferLength::Any);
    let contract = OpContract::new(
        OpKind::Compute,
        COMPUTE_CRUST,
        ObjectShape::new()
            .field("width", NumberShape::integer().with_min(1.0))
            .field("height", NumberShape::integer().with_min(1.0))
            .field("wrapX", BooleanShape::new())
            .field("plateX", any(BufferKind::U32))
            .field("plateY", any(BufferKind::U32))
            .field("plateLift", any(BufferKind::I16)),
        ObjectShape::new().field("elevation", BufferShape::per_tile(BufferKind::I16)),
    );
    let default = Strategy::new(
        ObjectShape::new()
            .field("plateCount", NumberShape::integer().with_range(1.0, 64.0).with_default(8.0))
            .field("bias", NumberShape::new().with_range(-1000.0, 1000.0).with_default(0.0)),
        seed_plates,
    );
    let uniform = Strategy::new(
        ObjectShape::new().field(
            "level",
            NumberShape::integer().with_range(-1000.0, 1000.0).with_default(0.0),
        ),
        uniform_crust,
    );
    Op::new(contract, [(DEFAULT_STRATEGY, default), ("uniform", uniform)])
}

/// Payload shape of `artifact:crust`
#[must_use]
pub fn crust_spec() -> ArtifactSpec {
    ArtifactSpec::new(
        CRUST,
        ObjectShape::new()
            .field("elevation", BufferShape::per_tile(BufferKind::I16))
            .field("plateCount", NumberShape::integer().with_min(0.0)),
    )
    .once_only()
}

fn blend_continent_bias(mut config: Value, ctx: &NormalizeContext<'_>) -> Result<Value, String> {
    let shift = knob(ctx, "continentBias") * BIAS_SCALE;
    if let Some(op_config) = strategy_config_mut(&mut config, "crust", DEFAULT_STRATEGY) {
        let bias = op_config.get("bias").and_then(Value::as_f64).unwrap_or(0.0);
        op_config.insert("bias", (bias + shift).clamp(-1000.0, 1000.0));
    }
    Ok(config)
}

fn run_crust(op: &Op, ctx: &mut MapContext, config: &Value) -> Result<(), StepError> {
    let selection = StrategySelection::from_config(config, "crust")?;
    let dims = ctx.dimensions();
    let plate_count = selection
        .config
        .get("plateCount")
        .and_then(Value::as_f64)
        .unwrap_or(0.0) as usize;

    let mut xs = Vec::with_capacity(plate_count);
    let mut ys = Vec::with_capacity(plate_count);
    let mut lifts = Vec::with_capacity(plate_count);
    for _ in 0..plate_count {
        xs.push(ctx.draw(dims.width, "foundation.plate.x"));
        ys.push(ctx.draw(dims.height, "foundation.plate.y"));
        lifts.push(to_i16(f64::from(ctx.draw(PLATE_LIFT, "foundation.plate.lift")) - f64::from(PLATE_LIFT / 2)));
    }

    let input = Value::object()
        .with("width", dims.width)
        .with("height", dims.height)
        .with("wrapX", ctx.env().wrap.wrap_x)
        .with("plateX", Buffer::U32(xs))
        .with("plateY", Buffer::U32(ys))
        .with("plateLift", Buffer::I16(lifts));
    let output = op.run(&input, &selection, dims)?;
    let elevation = buffer(&output, "elevation")?.clone();

    let adapter = ctx.adapter_mut();
    for y in 0..dims.height {
        for x in 0..dims.width {
            let value = elevation.get_f64(dims.index(x, y)).unwrap_or(0.0);
            adapter.set_elevation(x, y, value as i32);
        }
    }
    ctx.fields_mut().insert(FIELD_ELEVATION, elevation.clone());
    ctx.publish_artifact(
        CRUST,
        Value::object()
            .with("elevation", elevation)
            .with("plateCount", plate_count as u32),
    )?;
    debug!(strategy = %selection.strategy, plates = plate_count, "Crust seeded");
    Ok(())
}

/// The `crust` step
///
/// # Errors
///
/// Returns error if the contract is malformed
pub fn crust_step(op: Arc<Op>) -> Result<Step, AuthoringError> {
    let contract = StepContract::builder("crust")
        .describe("Seed tectonic plates and derive base elevation")
        .config(ObjectShape::new())
        .op("crust", op.clone())
        .provides(ELEVATION)
        .provides(CRUST)
        .artifact(crust_spec())
        .build()?;
    Ok(Step::new(contract, move |ctx: &mut MapContext, config: &Value| run_crust(&op, ctx, config))
        .with_normalize(blend_continent_bias))
}

/// The foundation stage
///
/// Knob `continentBias` in `[-1, 1]` raises or sinks the default crust.
///
/// # Errors
///
/// Returns error if an op or step is malformed
pub fn stage() -> Result<Stage, AuthoringError> {
    let op = Arc::new(compute_crust_op()?);
    Ok(Stage::new(STAGE)
        .knobs(ObjectShape::new().field(
            "continentBias",
            NumberShape::new().with_range(-1.0, 1.0).with_default(0.0),
        ))
        .step(crust_step(op)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgen_authoring::OpError;
    use mapgen_core::Dimensions;
    use mapgen_schema::IssueCode;

    const DIMS: Dimensions = Dimensions::new(4, 2);

    fn input(plates: &[(u32, u32, i16)]) -> Value {
        Value::object()
            .with("width", 4u32)
            .with("height", 2u32)
            .with("wrapX", false)
            .with("plateX", Buffer::U32(plates.iter().map(|p| p.0).collect()))
            .with("plateY", Buffer::U32(plates.iter().map(|p| p.1).collect()))
            .with("plateLift", Buffer::I16(plates.iter().map(|p| p.2).collect()))
    }

    #[test]
    fn test_default_strategy_nearest_plate() {
        let op = compute_crust_op().unwrap();
        let selection = StrategySelection::new(
            DEFAULT_STRATEGY,
            Value::object().with("plateCount", 2.0).with("bias", 10.0),
        );
        let output = op.run(&input(&[(0, 0, 100), (3, 1, -100)]), &selection, DIMS).unwrap();
        let elevation = output.get("elevation").and_then(Value::as_buffer).unwrap();
        assert_eq!(elevation.as_i16().unwrap()[0], 110);
        assert_eq!(elevation.as_i16().unwrap()[7], -90);
        assert_eq!(elevation.len(), 8);
    }

    #[test]
    fn test_wrap_shortens_distance() {
        let with_wrap = input(&[(0, 0, 100)]).with("wrapX", true);
        let selection = StrategySelection::new(DEFAULT_STRATEGY, Value::object().with("plateCount", 1.0).with("bias", 0.0));
        let output = seed_plates(&with_wrap, &selection.config).unwrap();
        let row = output.get("elevation").and_then(Value::as_buffer).unwrap().as_i16().unwrap().to_vec();
        assert_eq!(row[1], row[3]);
    }

    #[test]
    fn test_uniform_strategy() {
        let op = compute_crust_op().unwrap();
        let selection = StrategySelection::new("uniform", Value::object().with("level", 40.0));
        let output = op.run(&input(&[]), &selection, DIMS).unwrap();
        let elevation = output.get("elevation").and_then(Value::as_buffer).unwrap();
        assert!(elevation.as_i16().unwrap().iter().all(|v| *v == 40));
    }

    #[test]
    fn test_default_strategy_needs_plates() {
        let op = compute_crust_op().unwrap();
        let err = op.run(&input(&[]), &op.default_selection(), DIMS).unwrap_err();
        assert!(err.to_string().contains("plate buffers disagree"));
    }

    #[test]
    fn test_crust_must_cover_the_map() {
        let op = compute_crust_op().unwrap();
        let selection = StrategySelection::new("uniform", Value::object().with("level", 0.0));
        let err = op.run(&input(&[]), &selection, Dimensions::new(4, 3)).unwrap_err();
        assert!(matches!(
            err,
            OpError::InvalidOutput { ref issues, .. } if issues[0].code == IssueCode::BufferLength
        ));
    }
}
