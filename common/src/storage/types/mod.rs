pub mod text_chunk;

use std::collections::BTreeMap;

/// Opaque caller-supplied metadata (title, course id, uploader, ...). Stored for
/// citation display and never interpreted by the engine.
pub type MaterialMetadata = BTreeMap<String, String>;
