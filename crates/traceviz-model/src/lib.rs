//! Records exchanged with the trace backend.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which visualization(s) the user wants once a trace finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizationPreference {
    /// Nothing chosen; treated like `Both` when deriving targets.
    #[default]
    None,
    Map,
    Graph,
    Both,
}

impl VisualizationPreference {
    pub const ALL: [VisualizationPreference; 4] = [
        VisualizationPreference::None,
        VisualizationPreference::Map,
        VisualizationPreference::Graph,
        VisualizationPreference::Both,
    ];

    /// Value the backend expects in the `selected` field.
    pub fn as_wire(&self) -> &'static str {
        match self {
            VisualizationPreference::None => "",
            VisualizationPreference::Map => "googleMaps",
            VisualizationPreference::Graph => "graph",
            VisualizationPreference::Both => "both",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "none" => Some(VisualizationPreference::None),
            "map" | "googleMaps" => Some(VisualizationPreference::Map),
            "graph" => Some(VisualizationPreference::Graph),
            "both" => Some(VisualizationPreference::Both),
            _ => None,
        }
    }
}

impl fmt::Display for VisualizationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisualizationPreference::None => "none",
            VisualizationPreference::Map => "map",
            VisualizationPreference::Graph => "graph",
            VisualizationPreference::Both => "both",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown visualization preference: {0:?} (expected map, graph or both)")]
pub struct UnknownPreference(pub String);

impl FromStr for VisualizationPreference {
    type Err = UnknownPreference;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_wire(value).ok_or_else(|| UnknownPreference(value.to_string()))
    }
}

impl Serialize for VisualizationPreference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for VisualizationPreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw).ok_or_else(|| de::Error::custom(UnknownPreference(raw)))
    }
}

/// The single outbound message of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRequest {
    #[serde(rename = "hostname")]
    pub target: String,
    #[serde(rename = "selected")]
    pub preference: VisualizationPreference,
}

impl TraceRequest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One hop pushed by the backend. A missing `ip` marks a private address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Hop {
    pub ip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "country_flag", alias = "countryFlagUrl")]
    pub country_flag_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Hop {
    /// Location of the hop, if the backend resolved one. `(0, 0)` is what the
    /// geolocation lookup reports on failure, so it counts as unavailable.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) if latitude != 0.0 || longitude != 0.0 => {
                Some(Coordinates {
                    latitude,
                    longitude,
                })
            }
            _ => None,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        non_empty(&self.ip)
    }

    pub fn city(&self) -> Option<&str> {
        non_empty(&self.city)
    }

    pub fn state(&self) -> Option<&str> {
        non_empty(&self.state)
    }

    pub fn country(&self) -> Option<&str> {
        non_empty(&self.country)
    }

    pub fn is_private(&self) -> bool {
        self.ip().is_none()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

/// Failure reported in place of further hops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TerminalError {
    pub message: String,
}

impl TerminalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Endpoints to embed after a successful trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VisualizationTargets {
    pub map: Option<String>,
    pub graph: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Hop(Hop),
    Error(TerminalError),
    /// `{"status": "finished"}`, sent by some backends right before closing.
    Finished,
}

#[derive(Debug, Error)]
pub enum InboundParseError {
    #[error("inbound message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("inbound message is not a JSON object")]
    NotAnObject,
}

const STATUS_ERROR: &str = "error";
const STATUS_FINISHED: &str = "finished";
const GENERIC_BACKEND_ERROR: &str = "trace backend reported an error";

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, InboundParseError> {
        let value: Value = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(InboundParseError::NotAnObject)?;

        match object.get("status").and_then(Value::as_str) {
            Some(STATUS_ERROR) => {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or(GENERIC_BACKEND_ERROR);
                Ok(InboundMessage::Error(TerminalError::new(message.trim_end())))
            }
            Some(STATUS_FINISHED) => Ok(InboundMessage::Finished),
            _ => Ok(InboundMessage::Hop(Hop::deserialize(&value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_backend_field_names() {
        let request = TraceRequest {
            target: "example.com".to_string(),
            preference: VisualizationPreference::Map,
        };
        let value: Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(value["hostname"], "example.com");
        assert_eq!(value["selected"], "googleMaps");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn preference_accepts_cli_and_wire_spellings() {
        let parse = |value: &str| value.parse::<VisualizationPreference>();
        assert_eq!(parse("map"), Ok(VisualizationPreference::Map));
        assert_eq!(parse("googleMaps"), Ok(VisualizationPreference::Map));
        assert_eq!(parse("graph"), Ok(VisualizationPreference::Graph));
        assert_eq!(parse("both"), Ok(VisualizationPreference::Both));
        assert_eq!(parse(""), Ok(VisualizationPreference::None));
        assert_eq!(
            parse("globe"),
            Err(UnknownPreference("globe".to_string()))
        );
    }

    #[test]
    fn hop_with_nulls_parses_as_private() {
        let text = r#"{"ip": null, "latitude": null, "longitude": null,
            "city": null, "state": null, "country": null, "country_flag": null}"#;
        let InboundMessage::Hop(hop) = InboundMessage::parse(text).unwrap() else {
            panic!("expected hop");
        };
        assert!(hop.is_private());
        assert_eq!(hop.coordinates(), None);
        assert_eq!(hop.country(), None);
    }

    #[test]
    fn hop_reads_flag_under_either_name() {
        let snake = r#"{"ip": "8.8.8.8", "country_flag": "https://flags/us.svg"}"#;
        let camel = r#"{"ip": "8.8.8.8", "countryFlagUrl": "https://flags/us.svg"}"#;
        for text in [snake, camel] {
            let InboundMessage::Hop(hop) = InboundMessage::parse(text).unwrap() else {
                panic!("expected hop");
            };
            assert_eq!(hop.country_flag_url.as_deref(), Some("https://flags/us.svg"));
        }
    }

    #[test]
    fn zero_coordinates_are_unavailable() {
        let hop = Hop {
            ip: Some("10.0.0.1".to_string()),
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..Hop::default()
        };
        assert_eq!(hop.coordinates(), None);

        let located = Hop {
            latitude: Some(37.751),
            longitude: Some(0.0),
            ..Hop::default()
        };
        assert_eq!(
            located.coordinates(),
            Some(Coordinates {
                latitude: 37.751,
                longitude: 0.0
            })
        );
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let hop = Hop {
            ip: Some(String::new()),
            city: Some(String::new()),
            ..Hop::default()
        };
        assert!(hop.is_private());
        assert_eq!(hop.city(), None);
    }

    #[test]
    fn error_status_is_terminal() {
        let text = r#"{"status": "error", "message": "Unable to resolve target system name nope.\n"}"#;
        assert_eq!(
            InboundMessage::parse(text).unwrap(),
            InboundMessage::Error(TerminalError::new(
                "Unable to resolve target system name nope."
            ))
        );
    }

    #[test]
    fn error_status_without_message_gets_generic_text() {
        let parsed = InboundMessage::parse(r#"{"status": "error"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundMessage::Error(TerminalError::new(GENERIC_BACKEND_ERROR))
        );
    }

    #[test]
    fn finished_marker_is_recognized() {
        let parsed = InboundMessage::parse(r#"{"status": "finished"}"#).unwrap();
        assert_eq!(parsed, InboundMessage::Finished);
    }

    #[test]
    fn only_error_status_is_terminal() {
        let parsed = InboundMessage::parse(r#"{"status": "failed", "message": "boom"}"#).unwrap();
        let InboundMessage::Hop(hop) = &parsed else {
            panic!("expected hop, got {parsed:?}");
        };
        assert_eq!(hop, &Hop::default());
        assert!(hop.is_private());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(InboundParseError::Json(_))
        ));
        assert!(matches!(
            InboundMessage::parse("[1, 2]"),
            Err(InboundParseError::NotAnObject)
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"ip": "1.1.1.1", "latitude": "north"}"#),
            Err(InboundParseError::Json(_))
        ));
    }
}
