use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};

use crate::api::{health, models, openai_chat};
use crate::error::{into_axum_response, BridgeError};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMatch {
    Liveness,
    Health,
    Models,
    ChatCompletions,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(
        &parts.method,
        parts.uri.path(),
        state.config.server.enable_legacy_chat_route,
    );

    let response = match route {
        RouteMatch::Liveness => health::liveness_handler().into_response(),
        RouteMatch::Health => health::health_handler(State(state)).into_response(),
        RouteMatch::Models => models::handler(State(state)),
        RouteMatch::ChatCompletions => {
            let limit = state.config.server.max_body_bytes;
            let body_bytes = match read_request_body(body, limit).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            openai_chat::handler(State(state), body_bytes).await
        }
        RouteMatch::MethodNotAllowed => into_axum_response(&BridgeError::MethodNotAllowed(
            format!("{} {}", parts.method, parts.uri.path()),
        )),
        RouteMatch::NotFound => {
            into_axum_response(&BridgeError::NotFound(parts.uri.path().to_string()))
        }
    };

    Ok(response)
}

async fn read_request_body(body: Body, limit: usize) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, limit).await.map_err(|_| {
        into_axum_response(&BridgeError::PayloadTooLarge(format!(
            "request body exceeds {limit} bytes"
        )))
    })
}

fn match_route(method: &Method, path: &str, legacy_chat_route: bool) -> RouteMatch {
    let expect = |allowed: Method, route: RouteMatch| {
        if *method == allowed {
            route
        } else {
            RouteMatch::MethodNotAllowed
        }
    };

    match path {
        "/" => expect(Method::GET, RouteMatch::Liveness),
        "/health" => expect(Method::GET, RouteMatch::Health),
        "/v1/models" => expect(Method::GET, RouteMatch::Models),
        "/v1/chat/completions" => expect(Method::POST, RouteMatch::ChatCompletions),
        "/chat/completions" if legacy_chat_route => {
            expect(Method::POST, RouteMatch::ChatCompletions)
        }
        _ => RouteMatch::NotFound,
    }
}
