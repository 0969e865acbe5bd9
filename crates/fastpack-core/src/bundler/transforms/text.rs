//! Transforms that wrap non-script files as CommonJS modules.

use crate::bundler::transform::{Transform, TransformContext, TransformFailure};

/// Exposes the file contents as a string: `module.exports = "...";`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTransform;

impl Transform for RawTransform {
    fn transform(&self, source: &str, ctx: &TransformContext<'_>) -> Result<String, TransformFailure> {
        ctx.expect_only(&[])?;
        let literal = serde_json::to_string(source)
            .map_err(|e| TransformFailure::new(format!("cannot encode source: {e}")))?;
        Ok(format!("module.exports = {literal};\n"))
    }
}

/// Validates JSON and exposes it as a value: `module.exports = {...};`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn transform(&self, source: &str, ctx: &TransformContext<'_>) -> Result<String, TransformFailure> {
        ctx.expect_only(&[])?;
        let value: serde_json::Value = serde_json::from_str(source)
            .map_err(|e| TransformFailure::new(format!("invalid JSON: {e}")))?;
        Ok(format!("module.exports = {value};\n"))
    }
}
