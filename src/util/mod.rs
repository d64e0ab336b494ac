//! Helper utilities shared across the exporter.

/// Extracts the resource-group name from a hierarchical Azure resource ID.
///
/// Scans for the first `resourceGroups/` path segment and returns the
/// following segment, e.g.
/// `/subscriptions/x/resourceGroups/myRG/providers/...` yields `myRG`.
/// Returns an empty string when the pattern is absent; extraction never
/// fails.
pub fn extract_resource_group(resource_id: &str) -> String {
    const MARKER: &str = "resourceGroups/";

    match resource_id.find(MARKER) {
        Some(pos) => {
            let rest = &resource_id[pos + MARKER.len()..];
            let end = rest.find('/').unwrap_or(rest.len());
            rest[..end].to_string()
        }
        None => String::new(),
    }
}
