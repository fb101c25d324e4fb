//! Blocking HTTP transport for the Hub API.
//!
//! # Design
//! A call goes through three steps, each usable on its own:
//! `build_request` resolves the URL, attaches the Hub headers and encodes
//! the body; `execute` performs the round-trip with ureq and buffers the
//! response; `parse_response` decodes a success body or turns the failure
//! into a classified `HubError`. `Transport` holds only the configuration,
//! the stateless `Codec` and the ureq agent, so one instance serves any
//! number of calls and threads. There is no retry at any step.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::Codec;
use crate::config::{HubConfig, HubSettings};
use crate::error::{classify, ErrorDetails, ErrorKind, HubError, Result, TransportError};
use crate::http::{with_query, HttpMethod, HttpRequest, HttpResponse};
use crate::model::ListResponse;

pub const USER_AGENT: &str = concat!("hub-client/", env!("CARGO_PKG_VERSION"));

/// Executes Hub calls against the configured base URL.
#[derive(Clone)]
pub struct Transport<C = HubSettings> {
    config: C,
    codec: Codec,
    agent: ureq::Agent,
}

impl<C: HubConfig> Transport<C> {
    pub fn new(config: C) -> Self {
        // Non-2xx responses come back as data so their bodies can be read.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            config,
            codec: Codec::new(),
            agent,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Whether calls can reach a Hub at all. Checked without any I/O.
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send::<(), T>(HttpMethod::Get, path, query, None)
    }

    /// GET a collection endpoint.
    pub fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ListResponse<T>> {
        self.get(path, query)
    }

    pub fn post<B, T>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        self.send(HttpMethod::Post, path, &[], body)
    }

    pub fn put<B, T>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        self.send(HttpMethod::Put, path, &[], body)
    }

    pub fn delete<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.send::<(), T>(HttpMethod::Delete, path, query, None)
    }

    /// Perform one call: build, execute, parse.
    pub fn send<B, T>(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let request = self.build_request(method, path, query, body)?;
        let response = self.execute(&request)?;
        self.parse_response(&request, response)
    }

    /// Resolve the URL, set the Hub headers and encode `body`.
    ///
    /// The base URL and API key are used as configured. When either is
    /// missing the request is still built and the failure is left to the
    /// connection or the server.
    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<HttpRequest>
    where
        B: ?Sized + Serialize,
    {
        let base_url = self.config.base_url().unwrap_or_default();
        let url = format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            with_query(path, query)
        );
        let api_key = self.config.api_key().unwrap_or_default();
        let headers = vec![
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            ("Authorization".to_string(), format!("Bearer {api_key}")),
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        let body = match body {
            Some(object) => Some(self.codec.encode(Some(object))?),
            None => None,
        };
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Send `request` and buffer the response.
    ///
    /// Only a failure to exchange the request at all is an error here; any
    /// status code is returned as data. A body that cannot be read is
    /// logged and reported as `None`.
    pub fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.as_str();
        debug!(%method, url, has_body = request.body.is_some(), "sending hub request");

        let mut response = self.dispatch(request).map_err(|err| {
            debug!(%method, url, error = %err, "hub request failed");
            HubError::generic(err)
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    value.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect();
        let body = match response.body_mut().read_to_string() {
            Ok(body) => Some(body),
            Err(err) => {
                info!(%method, url, status, error = %err, "cannot read hub response body");
                None
            }
        };
        debug!(%method, url, status, "received hub response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn dispatch(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let url = request.url.as_str();
        let headers = &request.headers;
        match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, None) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Get, Some(body)) => with_headers(self.agent.get(url), headers)
                .force_send_body()
                .send(body),
            (HttpMethod::Delete, None) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => with_headers(self.agent.delete(url), headers)
                .force_send_body()
                .send(body),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), headers).send(body),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), headers).send(body),
        }
    }

    /// Decode a success body into `T`, or classify the failure.
    pub fn parse_response<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<T> {
        if response.is_success() {
            if let Some(body) = &response.body {
                return Ok(self.codec.decode(body.as_bytes())?);
            }
        }
        Err(self.classify_failure(request, response))
    }

    fn classify_failure(&self, request: &HttpRequest, response: HttpResponse) -> HubError {
        let HttpResponse { status, body, .. } = response;
        let failure = if (200..300).contains(&status) {
            TransportError::UnreadableBody {
                status,
                method: request.method,
                url: request.url.clone(),
            }
        } else {
            TransportError::Status {
                status,
                method: request.method,
                url: request.url.clone(),
            }
        };

        // An authentication failure is reported without looking at the body.
        let details = if status == 401 {
            None
        } else {
            self.extract_details(request, status, body.as_deref())
        };

        match (classify(status, details.as_ref()), details) {
            (ErrorKind::AuthenticationFailure, _) => HubError::authentication(format!(
                "Authentication failure for {} {}",
                request.method, request.url
            )),
            (kind, Some(details)) => HubError::with_details(kind, details, failure),
            (_, None) => HubError::generic(failure),
        }
    }

    /// Best-effort detail extraction from an error body.
    ///
    /// An absent, blank or undecodable body is logged and yields `None`;
    /// the caller then falls back to a detail-less `Generic` error.
    fn extract_details(
        &self,
        request: &HttpRequest,
        status: u16,
        body: Option<&str>,
    ) -> Option<ErrorDetails> {
        let method = request.method;
        let url = request.url.as_str();
        let Some(body) = body.filter(|body| !body.trim().is_empty()) else {
            info!(%method, url, status, "hub error response has no body");
            return None;
        };
        match self.codec.decode_map(body.as_bytes()) {
            Ok(map) => Some(ErrorDetails::from_map(&map)),
            Err(err) => {
                info!(%method, url, status, error = %err, "cannot read hub error body");
                None
            }
        }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::model::Project;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    fn transport() -> Transport {
        Transport::new(HubSettings::new("http://localhost:8888/", "key-123"))
    }

    fn get_request() -> HttpRequest {
        transport()
            .build_request::<()>(HttpMethod::Get, "/api/v1/items", &[], None)
            .unwrap()
    }

    fn response(status: u16, body: Option<&str>) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.map(str::to_owned),
        }
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn build_request_resolves_url_and_headers() {
        let request = transport()
            .build_request::<()>(
                HttpMethod::Get,
                "/widgets",
                &[("a", "1"), ("b", "x y")],
                None,
            )
            .unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://localhost:8888/widgets?a=1&b=x%20y");
        assert_eq!(header(&request, "Authorization"), Some("Bearer key-123"));
        assert_eq!(header(&request, "Accept"), Some("application/json"));
        assert_eq!(header(&request, "Content-Type"), Some("application/json"));
        assert!(header(&request, "User-Agent").unwrap().starts_with("hub-client/"));
        assert!(request.body.is_none());
    }

    #[test]
    fn build_request_encodes_body() {
        let project = Project {
            name: Some("Payroll".to_string()),
            ..Project::default()
        };
        let request = transport()
            .build_request(HttpMethod::Post, "/api/v1/projects", &[], Some(&project))
            .unwrap();
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"Payroll"}"#.as_slice()));
    }

    #[test]
    fn build_request_without_settings_passes_them_through() {
        let transport = Transport::new(HubSettings::default());
        let request = transport
            .build_request::<()>(HttpMethod::Delete, "/api/v1/x", &[], None)
            .unwrap();
        assert_eq!(request.url, "/api/v1/x");
        assert_eq!(header(&request, "Authorization"), Some("Bearer "));
    }

    #[test]
    fn success_body_decodes_into_list() {
        let list: ListResponse<Item> = transport()
            .parse_response(
                &get_request(),
                response(200, Some(r#"{"content":[{"id":"1"},{"id":"2"}],"totalElements":2}"#)),
            )
            .unwrap();
        let ids: Vec<_> = list.content.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(list.metadata["totalElements"], 2);
    }

    #[test]
    fn no_content_decodes_into_unit() {
        let request = transport()
            .build_request::<()>(HttpMethod::Delete, "/api/v1/items/1", &[], None)
            .unwrap();
        transport()
            .parse_response::<()>(&request, response(204, Some("")))
            .unwrap();
    }

    #[test]
    fn unauthorized_ignores_the_body() {
        let err = transport()
            .parse_response::<Item>(
                &get_request(),
                response(401, Some(r#"{"message":"bad key","details":"D"}"#)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
        assert_eq!(
            err.message(),
            Some("Authentication failure for GET http://localhost:8888/api/v1/items")
        );
        assert!(err.details().is_none());
    }

    #[test]
    fn not_found_carries_server_details() {
        let err = transport()
            .parse_response::<Item>(
                &get_request(),
                response(
                    404,
                    Some(r#"{"message":"not found","timestamp":"T","details":"D"}"#),
                ),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), Some("not found"));
        assert_eq!(err.timestamp(), Some("T"));
        assert_eq!(err.details(), Some("D"));
        assert!(matches!(
            err.cause(),
            Some(TransportError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn not_found_without_body_is_generic() {
        let err = transport()
            .parse_response::<Item>(&get_request(), response(404, Some("")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
    }

    #[test]
    fn server_error_without_body_has_no_details() {
        let err = transport()
            .parse_response::<Item>(&get_request(), response(500, None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.message().is_none());
        assert!(err.timestamp().is_none());
        assert!(err.details().is_none());
        assert!(matches!(
            err.cause(),
            Some(TransportError::Status { status: 500, .. })
        ));
        assert!(err.source().is_some());
    }

    #[test]
    fn server_error_with_payload_keeps_message() {
        let err = transport()
            .parse_response::<Item>(
                &get_request(),
                response(500, Some(r#"{"message":"boom","timestamp":"T"}"#)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.message(), Some("boom"));
        assert_eq!(err.timestamp(), Some("T"));
        assert!(err.details().is_none());
    }

    #[test]
    fn unparseable_error_body_is_treated_as_absent() {
        let err = transport()
            .parse_response::<Item>(&get_request(), response(404, Some("<html>gone</html>")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.message().is_none());
    }

    #[test]
    fn unreadable_success_body_is_generic() {
        let err = transport()
            .parse_response::<Item>(&get_request(), response(200, None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(matches!(
            err.cause(),
            Some(TransportError::UnreadableBody { status: 200, .. })
        ));
    }

    #[test]
    fn mismatched_success_body_is_generic_decode_error() {
        let err = transport()
            .parse_response::<Item>(&get_request(), response(200, Some(r#"{"id":7}"#)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(matches!(err.cause(), Some(TransportError::Codec(_))));
    }

    #[test]
    fn malformed_url_fails_before_reaching_a_server() {
        let transport = Transport::new(HubSettings::new("http://bad host", "key"));
        let err = transport
            .get::<Item>("/api/v1/items", &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(matches!(err.cause(), Some(TransportError::Http(_))));
    }
}
