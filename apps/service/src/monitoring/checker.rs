use std::time::{Duration, Instant};

use tokio::time::timeout;
use url::Url;

use super::types::Outcome;
use crate::store::models::Check;

/// Issues exactly one probe for a check and reports exactly one outcome.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn probe(&self, check: &Check) -> Outcome;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> reqwest::Result<Self> {
        // Redirects are reported as-is so a 301 can be listed in successCodes.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("uppe-checks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, check: &Check) -> Outcome {
        let target = match Url::parse(&check.target()) {
            Ok(url) => url,
            Err(e) => return Outcome::network_error(format!("Invalid target {}: {}", check.target(), e)),
        };

        let limit = Duration::from_secs(check.timeout_seconds);
        let start = Instant::now();
        let request = self.client.request(check.method.into(), target).send();

        // Whichever of response, transport error or deadline resolves first
        // is the outcome; the request future is dropped with the timeout.
        let outcome = match timeout(limit, request).await {
            Ok(Ok(response)) => Outcome::response(response.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => Outcome::timeout(e.to_string()),
            Ok(Err(e)) => Outcome::network_error(e.to_string()),
            Err(_) => Outcome::timeout(format!("No response within {}s", check.timeout_seconds)),
        };

        tracing::debug!(
            check_id = %check.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Probed {} {}: {}",
            check.method.as_upper(),
            check.target(),
            outcome
        );
        outcome
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{HttpMethod, ProbeErrorKind, Protocol};

    fn check(url: String, timeout_seconds: u64) -> Check {
        Check {
            id: "abcdefghij0123456789".into(),
            phone_number: "5551234567".into(),
            protocol: Protocol::Http,
            url,
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds,
            state: None,
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn test_reports_response_code() {
        let addr = test_server::spawn(204, Duration::ZERO).await;
        let checker = HttpChecker::new().unwrap();

        let outcome = checker.probe(&check(addr, 2)).await;

        assert_eq!(outcome, Outcome::response(204));
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let addr = test_server::spawn(301, Duration::ZERO).await;
        let checker = HttpChecker::new().unwrap();

        let outcome = checker.probe(&check(format!("{addr}/old"), 2)).await;

        assert_eq!(outcome.response_code, Some(301));
    }

    #[tokio::test]
    async fn test_slow_target_times_out() {
        let addr = test_server::spawn(200, Duration::from_secs(3)).await;
        let checker = HttpChecker::new().unwrap();

        let start = Instant::now();
        let outcome = checker.probe(&check(addr, 1)).await;

        assert_eq!(outcome.response_code, None);
        assert_eq!(outcome.error.unwrap().kind, ProbeErrorKind::Timeout);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let checker = HttpChecker::new().unwrap();

        let outcome = checker.probe(&check(format!("127.0.0.1:{port}"), 2)).await;

        assert_eq!(outcome.error.unwrap().kind, ProbeErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn test_unparseable_target_is_network_error() {
        let checker = HttpChecker::new().unwrap();

        let outcome = checker.probe(&check("exa mple.com:notaport".into(), 2)).await;

        assert_eq!(outcome.error.unwrap().kind, ProbeErrorKind::NetworkError);
    }
}
