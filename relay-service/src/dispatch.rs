//! HTTP dispatcher.
//!
//! Maps a validated request description onto one of the fixed set of HTTP
//! methods, executes it against the account's base endpoint, and exposes the
//! response body as a live byte stream. Bodies may be large files, so the
//! dispatcher never reads them into memory.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use relay_types::{RelayFault, RequestDescription};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::io;
use tokio_util::io::StreamReader;

use crate::accounts::AccountContext;

/// Fixed protocol marker required by the upstream server. Asserts the
/// request originates from the recognized API surface.
pub const PROTOCOL_HEADER: &str = "OCS-APIREQUEST";

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// The upstream response body as an async byte stream.
pub type ResponseBody = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

fn parse_method(method: &str) -> Result<Method, RelayFault> {
    match method {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(RelayFault::UnsupportedMethod),
    }
}

/// Execute one request against its resolved account.
///
/// Rewrites `request.url` from the relative path to the absolute form bound
/// to the account's base endpoint. Validation (leading `/`, supported
/// method) happens before any network I/O. Only a 200 response yields a
/// body; every other status becomes [`RelayFault::UpstreamError`].
pub async fn dispatch(
    request: &mut RequestDescription,
    account: &AccountContext,
) -> Result<ResponseBody, RelayFault> {
    if !request.url.starts_with('/') {
        return Err(RelayFault::InvalidUrl);
    }
    let method = parse_method(&request.method)?;

    request.url = format!("{}{}", account.base_url, request.url);

    let mut builder = account
        .client
        .request(method.clone(), &request.url)
        .query(&request.parameters)
        .header(PROTOCOL_HEADER, "true");

    if method == Method::POST || method == Method::PUT {
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(body.clone());
        }
    }

    if let Some((user, pass)) = &account.credentials {
        builder = builder.basic_auth(user, Some(pass));
    }

    let response = builder
        .send()
        .await
        .map_err(|e| RelayFault::TransportFailure {
            reason: e.to_string(),
        })?;

    let status = response.status().as_u16();
    if status != 200 {
        tracing::debug!(status, url = %request.url, "upstream rejected request");
        return Err(RelayFault::UpstreamError { status });
    }

    tracing::debug!(url = %request.url, "streaming upstream response body");
    Ok(StreamReader::new(
        response.bytes_stream().map_err(io::Error::other).boxed(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct Upstream {
        hits: AtomicUsize,
    }

    async fn notifications(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            headers.get(PROTOCOL_HEADER).map(|v| v.to_str().unwrap()),
            Some("true")
        );
        let format = params.get("format").cloned().unwrap_or_default();
        (StatusCode::OK, format!("notifications:{format}"))
    }

    async fn echo(
        State(upstream): State<Arc<Upstream>>,
        headers: HeaderMap,
        body: String,
    ) -> String {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        let content_type = headers
            .get(CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let auth = headers.contains_key("authorization");
        format!("{content_type}|auth={auth}|{body}")
    }

    async fn forbidden(State(upstream): State<Arc<Upstream>>) -> StatusCode {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::FORBIDDEN
    }

    async fn spawn_upstream() -> (String, Arc<Upstream>) {
        let upstream = Arc::new(Upstream::default());
        let app = Router::new()
            .route(
                "/ocs/v2.php/apps/notifications/api/v2/notifications",
                get(notifications),
            )
            .route("/echo", post(echo).put(echo))
            .route("/forbidden", get(forbidden))
            .with_state(upstream.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base_url, upstream)
    }

    fn account(base_url: &str) -> AccountContext {
        AccountContext {
            name: "test@upstream".to_string(),
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
            credentials: None,
        }
    }

    async fn read_all(mut body: ResponseBody) -> String {
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn get_with_parameters_streams_body() {
        let (base_url, upstream) = spawn_upstream().await;
        let mut request = RequestDescription::new(
            "test@upstream",
            "GET",
            "/ocs/v2.php/apps/notifications/api/v2/notifications",
            "T1",
        )
        .with_parameter("format", "json");

        let body = dispatch(&mut request, &account(&base_url)).await.unwrap();
        assert_eq!(read_all(body).await, "notifications:json");
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);

        // URL rewritten in place to the absolute form.
        assert_eq!(
            request.url,
            format!("{base_url}/ocs/v2.php/apps/notifications/api/v2/notifications")
        );
    }

    #[tokio::test]
    async fn post_body_is_json_typed() {
        let (base_url, _upstream) = spawn_upstream().await;
        let mut request = RequestDescription::new("test@upstream", "POST", "/echo", "T1")
            .with_body("{\"read\":true}");

        let body = dispatch(&mut request, &account(&base_url)).await.unwrap();
        assert_eq!(
            read_all(body).await,
            "application/json; charset=utf-8|auth=false|{\"read\":true}"
        );
    }

    #[tokio::test]
    async fn put_without_body_sends_no_entity() {
        let (base_url, _upstream) = spawn_upstream().await;
        let mut request = RequestDescription::new("test@upstream", "PUT", "/echo", "T1");

        let body = dispatch(&mut request, &account(&base_url)).await.unwrap();
        assert_eq!(read_all(body).await, "|auth=false|");
    }

    #[tokio::test]
    async fn credentials_become_basic_auth() {
        let (base_url, _upstream) = spawn_upstream().await;
        let mut ctx = account(&base_url);
        ctx.credentials = Some(("alice".to_string(), "s3cret".to_string()));
        let mut request =
            RequestDescription::new("test@upstream", "POST", "/echo", "T1").with_body("x");

        let body = dispatch(&mut request, &ctx).await.unwrap();
        assert!(read_all(body).await.contains("auth=true"));
    }

    #[tokio::test]
    async fn non_200_status_is_upstream_error() {
        let (base_url, upstream) = spawn_upstream().await;
        let mut request = RequestDescription::new("test@upstream", "GET", "/forbidden", "T1");

        let err = dispatch(&mut request, &account(&base_url)).await.err().unwrap();
        assert_eq!(err, RelayFault::UpstreamError { status: 403 });
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn relative_url_without_slash_fails_before_any_call() {
        let (base_url, upstream) = spawn_upstream().await;
        let mut request =
            RequestDescription::new("test@upstream", "GET", "relative/no/slash", "T1");

        let err = dispatch(&mut request, &account(&base_url)).await.err().unwrap();
        assert_eq!(err, RelayFault::InvalidUrl);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
        // And the URL stays untouched.
        assert_eq!(request.url, "relative/no/slash");
    }

    #[tokio::test]
    async fn patch_is_unsupported_before_any_call() {
        let (base_url, upstream) = spawn_upstream().await;
        let mut request = RequestDescription::new("test@upstream", "PATCH", "/echo", "T1");

        let err = dispatch(&mut request, &account(&base_url)).await.err().unwrap();
        assert_eq!(err, RelayFault::UnsupportedMethod);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_failure() {
        // Port 1 is never listening.
        let mut request = RequestDescription::new("test@upstream", "GET", "/x", "T1");
        let err = dispatch(&mut request, &account("http://127.0.0.1:1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayFault::TransportFailure { .. }));
    }

    #[test]
    fn only_the_four_methods_parse() {
        assert_eq!(parse_method("GET").unwrap(), Method::GET);
        assert_eq!(parse_method("POST").unwrap(), Method::POST);
        assert_eq!(parse_method("PUT").unwrap(), Method::PUT);
        assert_eq!(parse_method("DELETE").unwrap(), Method::DELETE);
        assert_eq!(parse_method("PATCH"), Err(RelayFault::UnsupportedMethod));
        assert_eq!(parse_method("HEAD"), Err(RelayFault::UnsupportedMethod));
        // Method matching is exact; no case folding.
        assert_eq!(parse_method("get"), Err(RelayFault::UnsupportedMethod));
    }
}
