//! HTTP transport to the MarkLogic REST APIs

use crate::config::HttpConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use declarative::{Api, Body, Error, Response, RestartSignal, Result, Transport, Verb};
use environ::Environment;
use serde_json::Value;
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

/// Blocking HTTP transport built from an environment's connection settings
pub struct HttpTransport {
    /// HTTP agent for requests; non-2xx statuses are not errors.
    agent: ureq::Agent,
    /// Base URL of each API surface, without trailing slash
    bases: HashMap<Api, String>,
    authorization: Option<String>,
    restart_timeout: Duration,
    restart_poll: Duration,
}

impl HttpTransport {
    /// Create a transport for an environment
    ///
    /// `password` overrides the environment's, typically after prompting.
    pub fn new(env: &Environment, password: Option<&str>, http: &HttpConfig) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(http.timeout()))
            .build();
        let connection = env.connection();
        let bases = Api::ALL
            .into_iter()
            .map(|api| {
                let settings = env.api(api);
                let scheme = if settings.ssl { "https" } else { "http" };
                (api, base_url(scheme, &connection.host, settings.port, &settings.root))
            })
            .collect();
        let password = password.or(connection.password.as_deref()).unwrap_or_default();
        Self {
            agent: ureq::Agent::new_with_config(config),
            bases,
            authorization: connection.user.as_deref().map(|user| basic_auth(user, password)),
            restart_timeout: http.restart_timeout(),
            restart_poll: http.restart_poll(),
        }
    }

    fn url(&self, api: Api, url: &str) -> String {
        let base = self.bases.get(&api).map_or("", String::as_str);
        format!("{base}{url}")
    }

    fn send(&self, verb: Verb, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        let full = self.url(api, url);
        log::debug!("{verb} {full}");
        let transport_error = |e: ureq::Error| Error::transport(&full, e.to_string());

        let response = match verb {
            Verb::Get => self.with_headers(self.agent.get(&full)).call(),
            Verb::Post => self.send_body(self.with_headers(self.agent.post(&full)), body),
            Verb::Put => self.send_body(self.with_headers(self.agent.put(&full)), body),
        };
        let mut response = response.map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string().map_err(transport_error)?;
        log::trace!("{status} {text}");
        Ok(Response::new(status, parse_body(&text)))
    }

    fn with_headers<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match &self.authorization {
            Some(auth) => request.header("Authorization", auth),
            None => request,
        }
    }

    fn send_body(
        &self,
        request: ureq::RequestBuilder<ureq::typestate::WithBody>,
        body: Option<&Body>,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        match body {
            Some(body) => request
                .header("Content-Type", body.content_type())
                .send(&body.to_bytes()[..]),
            None => request.send_empty(),
        }
    }

    /// Current startup timestamp, if the admin API answers
    fn timestamp(&self) -> Option<String> {
        match self.send(Verb::Get, Api::Admin, "/timestamp", None) {
            Ok(response) if response.is_success() => match response.body {
                Some(Value::String(stamp)) => Some(stamp.trim().to_string()),
                Some(other) => Some(other.to_string()),
                None => None,
            },
            Ok(response) => {
                log::debug!("timestamp returned HTTP {}", response.status);
                None
            }
            Err(e) => {
                log::debug!("waiting for restart: {e}");
                None
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, api: Api, url: &str) -> Result<Response> {
        self.send(Verb::Get, api, url, None)
    }

    fn post(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        self.send(Verb::Post, api, url, body)
    }

    fn put(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        self.send(Verb::Put, api, url, body)
    }

    fn restart(&self, signal: &RestartSignal) -> Result<()> {
        let started = Instant::now();
        loop {
            thread::sleep(self.restart_poll);
            if let Some(stamp) = self.timestamp()
                && stamp != signal.last_startup
            {
                log::info!("restarted at {stamp}");
                return Ok(());
            }
            if started.elapsed() > self.restart_timeout {
                return Err(Error::Restart(format!(
                    "no new startup after {}s (last startup {})",
                    self.restart_timeout.as_secs(),
                    signal.last_startup
                )));
            }
        }
    }
}

fn base_url(scheme: &str, host: &str, port: u16, root: &str) -> String {
    if root.is_empty() {
        format!("{scheme}://{host}:{port}")
    } else {
        format!("{scheme}://{host}:{port}/{root}")
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

/// JSON when the body parses as JSON, text otherwise
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use environ::{MemoryLoader, Overrides};
    use serde_json::json;

    fn transport(content: Value) -> HttpTransport {
        let mut content = content;
        content["format"] = json!("0.1");
        let loader = MemoryLoader::new().with("dev.json", json!({ "mlproj": content }));
        let env = Environment::compile(&loader, "dev.json", &Overrides::default()).unwrap();
        HttpTransport::new(&env, None, &HttpConfig::default())
    }

    #[test]
    fn test_urls_follow_api_settings() {
        let transport = transport(json!({
            "connect": {"host": "ml1"},
            "apis": {"manage": {"port": 9002, "ssl": true}, "client": {"root": "/"}},
        }));
        assert_eq!(
            transport.url(Api::Manage, "/databases"),
            "https://ml1:9002/manage/v2/databases"
        );
        assert_eq!(transport.url(Api::Admin, "/timestamp"), "http://ml1:8001/admin/v1/timestamp");
        assert_eq!(transport.url(Api::Client, "/documents"), "http://ml1:8000/documents");
        assert!(transport.authorization.is_none());
    }

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth("admin", "admin"), "Basic YWRtaW46YWRtaW4=");
        let transport = transport(json!({"connect": {"user": "admin", "password": "admin"}}));
        assert_eq!(transport.authorization.as_deref(), Some("Basic YWRtaW46YWRtaW4="));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), None);
        assert_eq!(parse_body("{\"a\": 1}"), Some(json!({"a": 1})));
        assert_eq!(
            parse_body("2026-10-19T10:00:00Z\n"),
            Some(Value::String("2026-10-19T10:00:00Z\n".to_string()))
        );
    }
}
