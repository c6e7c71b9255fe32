use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheme a check is probed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(()),
        }
    }
}

/// Request method a check is probed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_upper(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(()),
        }
    }
}

/// Persisted state of a check. A check that was never probed has no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

impl FromStr for CheckState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(CheckState::Up),
            "down" => Ok(CheckState::Down),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeErrorKind {
    NetworkError,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub detail: String,
}

/// Result of a single probe: a response code, or an error, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub response_code: Option<u16>,
    pub error: Option<ProbeError>,
}

impl Outcome {
    pub fn response(code: u16) -> Self {
        Self { response_code: Some(code), error: None }
    }

    pub fn network_error(detail: impl Into<String>) -> Self {
        Self {
            response_code: None,
            error: Some(ProbeError { kind: ProbeErrorKind::NetworkError, detail: detail.into() }),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            response_code: None,
            error: Some(ProbeError { kind: ProbeErrorKind::Timeout, detail: detail.into() }),
        }
    }

    /// `up` iff there was no error and the code is one of `success_codes`.
    pub fn state_for(&self, success_codes: &[u16]) -> CheckState {
        match (self.error.as_ref(), self.response_code) {
            (None, Some(code)) if success_codes.contains(&code) => CheckState::Up,
            _ => CheckState::Down,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.response_code) {
            (Some(error), _) => write!(f, "{:?}: {}", error.kind, error.detail),
            (None, Some(code)) => write!(f, "HTTP {code}"),
            (None, None) => write!(f, "no response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_for() {
        assert_eq!(Outcome::response(200).state_for(&[200, 201]), CheckState::Up);
        assert_eq!(Outcome::response(201).state_for(&[200, 201]), CheckState::Up);
        assert_eq!(Outcome::response(500).state_for(&[200]), CheckState::Down);
        assert_eq!(Outcome::timeout("3s").state_for(&[200]), CheckState::Down);
        assert_eq!(Outcome::network_error("refused").state_for(&[200]), CheckState::Down);

        let both = Outcome { response_code: Some(200), error: Outcome::timeout("late").error };
        assert_eq!(both.state_for(&[200]), CheckState::Down);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&CheckState::Down).unwrap(), "\"down\"");
        assert_eq!(serde_json::to_string(&HttpMethod::Delete).unwrap(), "\"delete\"");
        assert_eq!(serde_json::to_string(&Protocol::Https).unwrap(), "\"https\"");
        assert_eq!("put".parse::<HttpMethod>(), Ok(HttpMethod::Put));
        assert!("PATCH".parse::<HttpMethod>().is_err());
        assert!("ftp".parse::<Protocol>().is_err());
    }
}
