//! Small helpers shared by the standard stages.

use mapgen_authoring::NormalizeContext;
use mapgen_context::MapContext;
use mapgen_schema::{Buffer, Value};

/// Read a number field
pub(crate) fn number(value: &Value, key: &str) -> Result<f64, String> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("'{}' is not a number", key))
}

/// Read a buffer field
pub(crate) fn buffer<'a>(value: &'a Value, key: &str) -> Result<&'a Buffer, String> {
    value
        .get(key)
        .and_then(Value::as_buffer)
        .ok_or_else(|| format!("'{}' is not a buffer", key))
}

/// Read a knob, treating absence as zero
pub(crate) fn knob(ctx: &NormalizeContext<'_>, key: &str) -> f64 {
    ctx.knobs.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// The `config` of an op selection, if the selection uses `strategy`
pub(crate) fn strategy_config_mut<'a>(
    config: &'a mut Value,
    op: &str,
    strategy: &str,
) -> Option<&'a mut Value> {
    let selection = config.as_object_mut()?.get_mut(op)?;
    if selection.get("strategy").and_then(Value::as_str) != Some(strategy) {
        return None;
    }
    selection.as_object_mut()?.get_mut("config")
}

/// Per-tile latitude from the adapter, row-major
pub(crate) fn latitudes(ctx: &MapContext) -> Buffer {
    let dims = ctx.dimensions();
    let adapter = ctx.adapter();
    let mut out = Vec::with_capacity(dims.area());
    for y in 0..dims.height {
        for x in 0..dims.width {
            out.push(adapter.latitude(x, y) as f32);
        }
    }
    Buffer::F32(out)
}

/// Per-tile water mask from the adapter, row-major
pub(crate) fn water_mask(ctx: &MapContext) -> Buffer {
    let dims = ctx.dimensions();
    let adapter = ctx.adapter();
    let mut out = Vec::with_capacity(dims.area());
    for y in 0..dims.height {
        for x in 0..dims.width {
            out.push(u8::from(adapter.is_water(x, y)));
        }
    }
    Buffer::U8(out)
}
