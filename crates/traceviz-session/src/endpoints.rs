use thiserror::Error;
use traceviz_model::{VisualizationPreference, VisualizationTargets};
use url::Url;

const SESSION_PATH: &str = "ws/traceroute/";
const MAP_PATH: &str = "getmap/";
const GRAPH_PATH: &str = "getgraph/";

/// Fixed backend resource locations for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub session_url: String,
    pub map_url: String,
    pub graph_url: String,
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid backend url {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported backend url scheme {0:?} (use http, https, ws or wss)")]
    UnsupportedScheme(String),
}

impl Endpoints {
    pub const DEFAULT_BASE: &'static str = "http://127.0.0.1:8000";

    /// Derive all three endpoints from the backend's base url. `ws`/`wss`
    /// bases are accepted and mapped back to `http`/`https` for the
    /// visualization pages.
    pub fn from_base(base: &str) -> Result<Self, EndpointError> {
        let mut url = Url::parse(base).map_err(|source| EndpointError::Parse {
            url: base.to_string(),
            source,
        })?;

        let (http_scheme, ws_scheme) = match url.scheme() {
            "http" | "ws" => ("http", "ws"),
            "https" | "wss" => ("https", "wss"),
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        let mut http_base = url.clone();
        // Switching between special schemes is always permitted.
        let _ = http_base.set_scheme(http_scheme);
        let mut ws_base = url;
        let _ = ws_base.set_scheme(ws_scheme);

        Ok(Self {
            session_url: join(&ws_base, SESSION_PATH)?,
            map_url: join(&http_base, MAP_PATH)?,
            graph_url: join(&http_base, GRAPH_PATH)?,
        })
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            session_url: "ws://127.0.0.1:8000/ws/traceroute/".to_string(),
            map_url: "http://127.0.0.1:8000/getmap/".to_string(),
            graph_url: "http://127.0.0.1:8000/getgraph/".to_string(),
        }
    }
}

fn join(base: &Url, path: &str) -> Result<String, EndpointError> {
    base.join(path)
        .map(String::from)
        .map_err(|source| EndpointError::Parse {
            url: format!("{base}{path}"),
            source,
        })
}

/// Which visualization endpoints to reveal after a successful trace.
/// An unset preference shows both.
pub fn derive_targets(
    preference: VisualizationPreference,
    endpoints: &Endpoints,
) -> VisualizationTargets {
    let (map, graph) = match preference {
        VisualizationPreference::Map => (true, false),
        VisualizationPreference::Graph => (false, true),
        VisualizationPreference::Both | VisualizationPreference::None => (true, true),
    };

    VisualizationTargets {
        map: map.then(|| endpoints.map_url.clone()),
        graph: graph.then(|| endpoints.graph_url.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_default_base() {
        assert_eq!(
            Endpoints::from_base(Endpoints::DEFAULT_BASE).unwrap(),
            Endpoints::default()
        );
    }

    #[test]
    fn secure_and_prefixed_bases() {
        let endpoints = Endpoints::from_base("wss://trace.example.net/api?x=1").unwrap();
        assert_eq!(endpoints.session_url, "wss://trace.example.net/api/ws/traceroute/");
        assert_eq!(endpoints.map_url, "https://trace.example.net/api/getmap/");
        assert_eq!(endpoints.graph_url, "https://trace.example.net/api/getgraph/");
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(matches!(
            Endpoints::from_base("ftp://127.0.0.1"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Endpoints::from_base("not a url"),
            Err(EndpointError::Parse { .. })
        ));
    }

    #[test]
    fn derivation_table() {
        let endpoints = Endpoints::default();
        let map = Some(endpoints.map_url.clone());
        let graph = Some(endpoints.graph_url.clone());

        for preference in VisualizationPreference::ALL {
            let targets = derive_targets(preference, &endpoints);
            let expected = match preference {
                VisualizationPreference::Map => (map.clone(), None),
                VisualizationPreference::Graph => (None, graph.clone()),
                VisualizationPreference::Both | VisualizationPreference::None => {
                    (map.clone(), graph.clone())
                }
            };
            assert_eq!((targets.map, targets.graph), expected, "{preference}");
        }
    }
}
