use rama::http::StatusCode;
use serde::Deserialize;

/// Per request overrides, taken from the query string.
///
/// Malformed values are ignored, which makes the request
/// fall back to the startup defaults for that property.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestOverride {
    pub status: Option<StatusCode>,
    pub response_delay_ms: Option<f64>,
}

// repeated keys are collected so that the first one can win
#[derive(Debug, Default, Deserialize)]
struct EchoQuery {
    #[serde(default)]
    status: Vec<String>,
    #[serde(default, rename = "response-delay")]
    response_delay: Vec<String>,
}

impl RequestOverride {
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Self::default();
        };

        let Ok(parsed) = serde_html_form::from_str::<EchoQuery>(query) else {
            return Self::default();
        };

        Self {
            status: parsed.status.first().and_then(|s| parse_status(s)),
            response_delay_ms: parsed.response_delay.first().and_then(|s| parse_delay_ms(s)),
        }
    }
}

fn parse_status(s: &str) -> Option<StatusCode> {
    let code: u16 = s.trim().parse().ok()?;
    StatusCode::from_u16(code).ok()
}

fn parse_delay_ms(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|ms| ms.is_finite())
}
