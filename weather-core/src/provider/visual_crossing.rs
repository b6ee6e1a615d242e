use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::{error::ClientError, model::LocationInput};

use super::WeatherSource;

/// Client for the Visual Crossing timeline API.
///
/// Cloning is cheap and shares the connection pool, so one instance serves
/// every concurrent refresh.
#[derive(Debug, Clone)]
pub struct VisualCrossingClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    http: Client,
}

impl VisualCrossingClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(concat!("locweather/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            http,
        })
    }
}

/// `<base>/<location>/<begin>/<end>`, with `?key=` appended when a key is given.
pub fn timeline_uri(
    base_url: &str,
    location: &LocationInput,
    begin: NaiveDate,
    end: NaiveDate,
    api_key: Option<&str>,
) -> String {
    let base = base_url.trim_end_matches('/');
    let path = format!(
        "{base}/{}/{}/{}",
        location.encoded(),
        begin.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );
    match api_key {
        Some(key) => format!("{path}?key={key}"),
        None => path,
    }
}

#[async_trait]
impl WeatherSource for VisualCrossingClient {
    fn uri(&self, location: &LocationInput, begin: NaiveDate, end: NaiveDate) -> String {
        timeline_uri(&self.base_url, location, begin, end, Some(&self.api_key))
    }

    async fn fetch(
        &self,
        location: &LocationInput,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<u8>, ClientError> {
        let uri = self.uri(location, begin, end);
        let started = Instant::now();

        let res = self
            .http
            .get(&uri)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_success() {
            tracing::info!(%location, %status, elapsed_ms, "called Visual Crossing");
        } else {
            tracing::warn!(
                %location,
                %status,
                elapsed_ms,
                body = %truncate_body(&String::from_utf8_lossy(&body)),
                "Visual Crossing answered with an error status"
            );
        }

        Ok(body.to_vec())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 29).unwrap()
    }

    fn plentywood() -> LocationInput {
        LocationInput::parse("Plentywood, MT").unwrap()
    }

    fn client(base: &str, timeout: Duration) -> VisualCrossingClient {
        VisualCrossingClient::new(base.to_string(), "KEY".to_string(), timeout).unwrap()
    }

    #[test]
    fn uri_uses_single_day_window_and_key() {
        let c = client("https://example.test/timeline/", Duration::from_secs(1));
        assert_eq!(
            c.uri(&plentywood(), day(), day()),
            "https://example.test/timeline/Plentywood%2C+MT/2024-09-29/2024-09-29?key=KEY"
        );
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn fetch_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/Plentywood.+MT/2024-09-29/2024-09-29$"))
            .and(query_param("key", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"resolvedAddress":"Plentywood, MT, USA"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server.uri(), Duration::from_secs(5))
            .fetch(&plentywood(), day(), day())
            .await
            .unwrap();

        assert_eq!(body, br#"{"resolvedAddress":"Plentywood, MT, USA"}"#.to_vec());
    }

    #[tokio::test]
    async fn fetch_passes_error_bodies_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Bad API Request:Invalid location parameter value."),
            )
            .mount(&server)
            .await;

        let body = client(&server.uri(), Duration::from_secs(5))
            .fetch(&plentywood(), day(), day())
            .await
            .unwrap();

        assert_eq!(String::from_utf8(body).unwrap(), "Bad API Request:Invalid location parameter value.");
    }

    #[tokio::test]
    async fn fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Duration::from_millis(200))
            .fetch(&plentywood(), day(), day())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let err = client("http://127.0.0.1:1", Duration::from_secs(2))
            .fetch(&plentywood(), day(), day())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn clones_share_one_client_for_concurrent_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(8)
            .mount(&server)
            .await;

        let c = client(&server.uri(), Duration::from_secs(5));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = c.clone();
            handles.push(tokio::spawn(async move { c.fetch(&plentywood(), day(), day()).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"{}".to_vec());
        }
    }
}
