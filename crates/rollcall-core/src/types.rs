/// A newly submitted photo to be identified, together with the object key it
/// travels under for the duration of one request.
///
/// The key is a request-scoped token derived from the staging filename
/// (e.g. `"d0a5….png"`), unique enough never to collide with an enrolled
/// reference key or with another in-flight request.
#[derive(Debug, Clone)]
pub struct ProbeImage {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// One candidate reported by a single face comparison, carrying its
/// similarity score in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    pub similarity: f32,
}

/// Structured record attached to an identifier. Owned by the record store;
/// the workflow only reads it and echoes it to the view.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A positive workflow outcome: the identifier derived from the matched
/// reference key, and the record found under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub identifier: String,
    pub record: Record,
}

/// Derive the record identifier for a stored object key by stripping the
/// file extension: `"12345.jpg"` → `"12345"`.
///
/// Enrollment invariant: a reference image's key minus its extension equals
/// the identifier its record is stored under. Only a dot inside the final
/// path segment starts an extension, and that segment's leading dots never
/// do, so `".profile"`, `".."`, and `"my.dir/photo"` pass through unchanged.
pub fn identifier_for_key(key: &str) -> &str {
    let basename_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[basename_start..].rsplit_once('.') {
        Some((stem, _ext)) if stem.chars().any(|c| c != '.') => {
            &key[..basename_start + stem.len()]
        }
        _ => key,
    }
}
