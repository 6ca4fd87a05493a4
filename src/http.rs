//! HTTP access behind a small trait so the pipeline can be driven without a network

use std::io::Read;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub user_agent: String,
    pub referer: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl RequestOptions {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            referer: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string()).filter(|r| !r.is_empty());
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }
}

/// A response whose body has not been read yet
pub struct HttpResponse {
    pub status: u16,
    /// Declared `Content-Length`
    pub content_length: Option<u64>,
    /// `charset` parameter of `Content-Type`
    pub charset: Option<String>,
    pub body: Box<dyn Read>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait HttpClient: Send + Sync {
    /// Streamed GET. Non-2xx statuses are returned, not turned into errors.
    fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse>;
}

/// Blocking client built on ureq
#[derive(Debug, Default, Clone)]
pub struct UreqClient;

impl UreqClient {
    pub fn new() -> Self {
        Self
    }

    fn create_agent(options: &RequestOptions) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_connect(Some(options.connect_timeout))
            .timeout_recv_response(Some(options.read_timeout))
            .timeout_recv_body(Some(options.read_timeout))
            .http_status_as_error(false)
            .max_idle_connections(4)
            .max_idle_connections_per_host(2)
            .build()
            .new_agent()
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
        let agent = Self::create_agent(options);

        let mut request = agent.get(url).header("User-Agent", &options.user_agent);
        if let Some(referer) = options.referer.as_deref() {
            request = request.header("Referer", referer);
        }
        let response = request.call()?;

        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        let charset = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type);

        Ok(HttpResponse {
            status,
            content_length,
            charset,
            body: Box::new(response.into_body().into_reader()),
        })
    }
}

/// `text/plain; charset=ISO-8859-1` -> `iso-8859-1`
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key.trim().eq_ignore_ascii_case("charset"))
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Clone)]
    pub struct CannedResponse {
        pub status: u16,
        pub content_length: Option<u64>,
        pub charset: Option<String>,
        pub body: Vec<u8>,
    }

    impl CannedResponse {
        pub fn ok(body: impl Into<Vec<u8>>) -> Self {
            let body = body.into();
            Self {
                status: 200,
                content_length: Some(body.len() as u64),
                charset: None,
                body,
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                content_length: None,
                charset: None,
                body: Vec::new(),
            }
        }

        pub fn with_content_length(mut self, len: Option<u64>) -> Self {
            self.content_length = len;
            self
        }

        pub fn with_charset(mut self, charset: &str) -> Self {
            self.charset = Some(charset.to_string());
            self
        }
    }

    /// Serves canned responses by exact URL and records every request.
    /// Unknown URLs fail like a refused connection.
    #[derive(Default)]
    pub struct FakeHttp {
        responses: Mutex<HashMap<String, CannedResponse>>,
        requests: Mutex<Vec<(String, RequestOptions)>>,
    }

    impl FakeHttp {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, url: &str, response: CannedResponse) -> Self {
            self.responses.lock().unwrap().insert(url.to_string(), response);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }

        pub fn last_options(&self) -> Option<RequestOptions> {
            self.requests.lock().unwrap().last().map(|(_, o)| o.clone())
        }
    }

    impl HttpClient for FakeHttp {
        fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push((url.to_string(), options.clone()));
            let canned = self
                .responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Transport(format!("connection refused: {}", url)))?;
            Ok(HttpResponse {
                status: canned.status,
                content_length: canned.content_length,
                charset: canned.charset,
                body: Box::new(Cursor::new(canned.body)),
            })
        }
    }
}
