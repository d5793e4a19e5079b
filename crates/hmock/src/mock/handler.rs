//! hyper entry point for the engine.

use super::core::MockEngine;
use super::types::{MockRequest, MockResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, warn};

/// Read the whole request, dispatch it and convert the outcome into a hyper response.
///
/// A failing response builder is answered with a 500 carrying the error text.
/// A body that cannot be read is logged as unexpected and gets the default status.
pub async fn handle_request<B>(
    req: Request<B>,
    engine: Arc<MockEngine>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    let (parts, body) = req.into_parts();
    let collected = body.collect().await;

    let mut request = MockRequest {
        method: parts.method,
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body: Bytes::new(),
    };
    match collected {
        Ok(collected) => request.body = collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, uri = %request.uri, "Failed to read request body");
            return Ok(into_hyper_response(engine.reject_unreadable(&request)));
        }
    }

    match engine.dispatch(request).await {
        Ok(response) => Ok(into_hyper_response(response)),
        Err(e) => {
            error!(error = %e, "Response builder failed");
            Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}

/// Merge message and content headers; the body length is set by hyper.
pub fn into_hyper_response(response: MockResponse) -> Response<Full<Bytes>> {
    let MockResponse {
        status,
        headers,
        content,
    } = response;

    let mut out = Response::new(Full::new(content.body));
    *out.status_mut() = status;
    let out_headers = out.headers_mut();
    out_headers.extend(headers);
    for (name, value) in &content.headers {
        if *name != CONTENT_LENGTH {
            out_headers.insert(name.clone(), value.clone());
        }
    }
    out
}

fn error_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
