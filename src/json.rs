//! JSON dump of a compiled plan, for inspection and debugging.

use crate::assemble::Conversion;
use crate::error::Result;

/// Pretty-printed blocks, asset metadata (no image bytes) and diagnostics.
pub fn plan_to_json(conversion: &Conversion) -> Result<String> {
    Ok(serde_json::to_string_pretty(conversion)?)
}
