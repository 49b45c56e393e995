//! Stored-document loaders.
//!
//! The file-format serializer itself lives outside this crate; it consumes
//! and produces fully-populated object graphs through the serde derives on
//! the data model. These helpers cover the load direction: parse JSON,
//! check basic invariants, and run the post-load reference resolution so
//! transition targets and clip names become live handles.

use crate::data::{Clip, ClipLib, Controller};

/// Parse one clip document. Basic invariants (usable frame count, in-range
/// event frames) are enforced at this boundary.
pub fn parse_clip_json(s: &str) -> Result<Clip, String> {
    let clip: Clip = serde_json::from_str(s).map_err(|e| format!("clip parse error: {e}"))?;
    clip.validate_basic()?;
    Ok(clip)
}

/// Parse a controller document and resolve its stable references against
/// `clips`. Unresolved transitions are purged with a diagnostic, leaving a
/// reduced but consistent graph.
pub fn parse_controller_json(s: &str, clips: &ClipLib) -> Result<Controller, String> {
    let mut controller: Controller =
        serde_json::from_str(s).map_err(|e| format!("controller parse error: {e}"))?;
    controller.resolve_references(clips);
    Ok(controller)
}

/// Serialize a clip back out (round-trip hook for the external serializer).
pub fn clip_to_json(clip: &Clip) -> Result<String, String> {
    serde_json::to_string(clip).map_err(|e| format!("clip serialize error: {e}"))
}

/// Serialize a controller back out.
pub fn controller_to_json(controller: &Controller) -> Result<String, String> {
    serde_json::to_string(controller).map_err(|e| format!("controller serialize error: {e}"))
}
