//! Locating the embedded player response in a watch page

use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;

/// Assignment anchors for the embedded player response, tried in order
const PLAYER_RESPONSE_ANCHORS: &[&str] = &[
    "ytInitialPlayerResponse = {",
    "var ytInitialPlayerResponse = {",
    "ytInitialPlayerResponse={",
    "window[\"ytInitialPlayerResponse\"] = {",
];

/// Cut the player response JSON object out of raw page HTML.
///
/// Scans from the first `{` after a known anchor, counting braces until the
/// depth returns to zero. String contents are not interpreted, which holds
/// for machine-generated JSON.
pub fn locate_player_response(html: &str) -> Result<&str, ResolveError> {
    let anchor_pos = PLAYER_RESPONSE_ANCHORS
        .iter()
        .find_map(|anchor| html.find(anchor))
        .ok_or_else(|| ResolveError::Extraction("Player response anchor not found".to_string()))?;

    let start = html[anchor_pos..]
        .find('{')
        .map(|offset| anchor_pos + offset)
        .ok_or_else(|| ResolveError::Extraction("Player response object start not found".to_string()))?;

    let end = matching_brace(html.as_bytes(), start).ok_or_else(|| {
        ResolveError::Extraction("Player response object is not balanced".to_string())
    })?;

    debug!("Located player response at {}..={} ({} bytes)", start, end, end - start + 1);
    Ok(&html[start..=end])
}

/// Index of the brace closing the one at `start`, if any
fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth: usize = 0;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate and parse the player response from page HTML
pub fn parse_player_response(html: &str) -> Result<Value, ResolveError> {
    let json = locate_player_response(html)?;
    serde_json::from_str(json)
        .map_err(|e| ResolveError::Extraction(format!("Player response is not valid JSON: {}", e)))
}

/// Find the player response in a `pbj=1` JSON reply.
///
/// The reply is either an array of parts or a single object; the player
/// response is a `playerResponse` member or an object holding both
/// `videoDetails` and `streamingData`.
pub fn player_response_from_pbj(body: &str) -> Result<Value, ResolveError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| ResolveError::Extraction(format!("pbj reply is not valid JSON: {}", e)))?;

    let found = match data {
        Value::Array(parts) => parts.into_iter().find_map(pick_player_response),
        other => pick_player_response(other),
    };

    found.ok_or_else(|| ResolveError::Extraction("No player response in pbj reply".to_string()))
}

fn pick_player_response(value: Value) -> Option<Value> {
    let Value::Object(mut map) = value else {
        return None;
    };
    if let Some(response) = map.remove("playerResponse") {
        return response.is_object().then_some(response);
    }
    if map.contains_key("videoDetails") && map.contains_key("streamingData") {
        return Some(Value::Object(map));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"abc","title":"T"},"streamingData":{"formats":[{"itag":18}]}};var meta = {"x":1};</script></html>"#;

    #[test]
    fn test_locate_player_response() {
        let json = locate_player_response(PAGE).unwrap();
        assert!(json.starts_with("{\"videoDetails\""));
        assert!(json.ends_with("]}}"));

        let value: Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["videoDetails"]["videoId"], "abc");
    }

    #[test]
    fn test_locate_compact_anchor() {
        let html = r#"ytInitialPlayerResponse={"a":{"b":{}}};"#;
        assert_eq!(locate_player_response(html).unwrap(), r#"{"a":{"b":{}}}"#);
    }

    #[test]
    fn test_missing_anchor() {
        assert!(matches!(
            locate_player_response("<html>nothing here</html>"),
            Err(ResolveError::Extraction(_))
        ));
        assert!(matches!(
            locate_player_response(""),
            Err(ResolveError::Extraction(_))
        ));
    }

    #[test]
    fn test_truncated_input() {
        let truncated = &PAGE[..PAGE.find("\"streamingData\"").unwrap()];
        assert!(matches!(
            locate_player_response(truncated),
            Err(ResolveError::Extraction(_))
        ));
        assert!(locate_player_response("ytInitialPlayerResponse = {").is_err());
        assert!(locate_player_response("ytInitialPlayerResponse = {{{}").is_err());
    }

    #[test]
    fn test_garbage_input() {
        let garbage = "}}}{{ytInitialPlayerResponse = {\u{0}\u{ff}}}}} trailing";
        // Balanced after the anchor, but not JSON
        assert!(locate_player_response(garbage).is_ok());
        assert!(matches!(
            parse_player_response(garbage),
            Err(ResolveError::Extraction(_))
        ));
    }

    #[test]
    fn test_multibyte_content() {
        let html = "ytInitialPlayerResponse = {\"title\":\"Привет 🎵\"};";
        let value = parse_player_response(html).unwrap();
        assert_eq!(value["title"], "Привет 🎵");
    }

    #[test]
    fn test_pbj_array_with_player_response() {
        let body = r#"[{"page":"watch"},{"playerResponse":{"videoDetails":{"videoId":"abc"}}}]"#;
        let value = player_response_from_pbj(body).unwrap();
        assert_eq!(value["videoDetails"]["videoId"], "abc");
    }

    #[test]
    fn test_pbj_object_forms() {
        let wrapped = r#"{"playerResponse":{"streamingData":{}}}"#;
        assert!(player_response_from_pbj(wrapped).unwrap()["streamingData"].is_object());

        let direct = r#"{"videoDetails":{"title":"x"},"streamingData":{"formats":[]}}"#;
        assert_eq!(
            player_response_from_pbj(direct).unwrap()["videoDetails"]["title"],
            "x"
        );
    }

    #[test]
    fn test_pbj_without_player_response() {
        assert!(player_response_from_pbj(r#"[{"page":"watch"}]"#).is_err());
        assert!(player_response_from_pbj(r#"{"videoDetails":{}}"#).is_err());
        assert!(player_response_from_pbj("<html>").is_err());
    }
}
