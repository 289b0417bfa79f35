//! JSON messages exchanged with the inference socket.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::PayloadError,
    types::{Keypoint, KeypointSet, ScoreUpdate},
};

/// Outbound frame: `{"image": "<base64 jpeg>"}`.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub image: &'a str,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(default)]
    keypoints: Option<Value>,
    #[serde(default)]
    posture_score: Option<Value>,
    #[serde(default)]
    raw_scores_percent: Option<Value>,
    #[serde(default)]
    measurements: Option<Value>,
}

/// Everything one server message carries. Absent fields stay `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerUpdate {
    pub keypoints: Option<KeypointSet>,
    pub scores: ScoreUpdate,
}

pub fn parse_server_message(text: &str) -> Result<ServerUpdate, PayloadError> {
    let message: InboundMessage = serde_json::from_str(text)?;

    let keypoints = match message.keypoints {
        None | Some(Value::Null) => None,
        Some(Value::Array(entries)) => Some(parse_keypoints(entries)),
        Some(_) => return Err(PayloadError::Shape("keypoints")),
    };

    let scores = ScoreUpdate {
        posture_score: message.posture_score.filter(|v| !v.is_null()),
        raw_scores_percent: numeric_map(message.raw_scores_percent, "raw_scores_percent")?,
        measurements: numeric_map(message.measurements, "measurements")?,
    };

    Ok(ServerUpdate { keypoints, scores })
}

/// Entries are positional: slot `i` is keypoint `i`, `null` marks an undetected point.
fn parse_keypoints(entries: Vec<Value>) -> KeypointSet {
    let points = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let coords = entry.as_array()?;
            let coord = |i: usize| coords.get(i).and_then(Value::as_f64);
            Some(Keypoint {
                index,
                x: coord(0)? as f32,
                y: coord(1)? as f32,
                confidence: coord(2).unwrap_or(0.0) as f32,
            })
        })
        .collect();
    KeypointSet::new(points)
}

/// Keeps the numeric entries; numeric strings are accepted as well.
fn numeric_map(
    value: Option<Value>,
    field: &'static str,
) -> Result<Option<BTreeMap<String, f64>>, PayloadError> {
    let map: Map<String, Value> = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(PayloadError::Shape(field)),
    };

    let numbers = map
        .into_iter()
        .filter_map(|(key, value)| {
            let number = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            number.is_finite().then_some((key, number))
        })
        .collect();
    Ok(Some(numbers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_frame_has_single_image_field() {
        let json = serde_json::to_string(&OutboundFrame { image: "abc=" }).unwrap();
        assert_eq!(json, r#"{"image":"abc="}"#);
    }

    #[test]
    fn keypoints_are_positional_with_gaps() {
        let update =
            parse_server_message(r#"{"keypoints": [[1.5, 2.0, 0.9], null, [3, 4], [5], "x"]}"#)
                .unwrap();
        let keypoints = update.keypoints.unwrap();

        assert_eq!(keypoints.len(), 5);
        let first = keypoints.get(0).unwrap();
        assert_eq!((first.x, first.y), (1.5, 2.0));
        assert!((first.confidence - 0.9).abs() < 1e-6);
        assert!(keypoints.get(1).is_none());
        assert_eq!(keypoints.get(2).unwrap().confidence, 0.0);
        assert!(keypoints.get(3).is_none());
        assert!(keypoints.get(4).is_none());
        assert!(update.scores.is_empty());
    }

    #[test]
    fn scores_keep_numeric_entries_only() {
        let update = parse_server_message(
            r#"{
                "posture_score": 87.5,
                "raw_scores_percent": {"head_tilt": 91, "arm_angle": "72.5", "bad": "n/a"},
                "measurements": {"knee_bent_angle": 12.0, "skip": null}
            }"#,
        )
        .unwrap();

        assert!(update.keypoints.is_none());
        assert_eq!(update.scores.posture_score, Some(serde_json::json!(87.5)));
        let raw = update.scores.raw_scores_percent.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw["arm_angle"], 72.5);
        assert_eq!(update.scores.measurements.unwrap().len(), 1);
    }

    #[test]
    fn shape_and_syntax_errors_are_rejected() {
        assert!(matches!(
            parse_server_message("not json"),
            Err(PayloadError::Json(_))
        ));
        assert!(matches!(
            parse_server_message(r#"{"keypoints": 3}"#),
            Err(PayloadError::Shape("keypoints"))
        ));
        assert!(matches!(
            parse_server_message(r#"{"measurements": [1, 2]}"#),
            Err(PayloadError::Shape("measurements"))
        ));
    }

    #[test]
    fn empty_object_changes_nothing() {
        let update = parse_server_message("{}").unwrap();
        assert_eq!(update, ServerUpdate::default());
    }
}
