use axum::{
    body::Body as AxumBody,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::monitor::collector::Collector;
use crate::monitor::models::AuthenticatedUser;

/// Shared flag that inner layers flip once they know who is calling. Placed
/// into the request extensions by [`monitor_requests`].
#[derive(Debug, Clone, Default)]
pub struct AuthenticationSlot(Arc<AtomicBool>);

impl AuthenticationSlot {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Records `user` on the request. Host auth layers mounted inside
/// [`monitor_requests`] call this so the sample sees the user.
pub fn mark_authenticated<B>(req: &mut Request<B>, user: AuthenticatedUser) {
    if let Some(slot) = req.extensions().get::<AuthenticationSlot>() {
        slot.mark();
    }
    req.extensions_mut().insert(user);
}

/// Times a request and hands the elapsed time to the collector once the
/// request is over, including when the handler future is dropped early.
struct RequestTimer {
    collector: Arc<Collector>,
    started: Instant,
    authenticated: AuthenticationSlot,
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.collector
            .record(self.started.elapsed(), self.authenticated.is_marked());
    }
}

/// Axum middleware that samples requests for the monitoring service.
///
/// Mount with `axum::middleware::from_fn_with_state(collector, monitor_requests)`.
/// The request counts as authenticated if an [`AuthenticatedUser`] is on it
/// before the handler runs, is recorded through [`mark_authenticated`] by an
/// inner layer, or is found in the response extensions. The response is never
/// delayed or altered.
pub async fn monitor_requests(
    State(collector): State<Arc<Collector>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Response {
    let slot = AuthenticationSlot::default();
    if req.extensions().get::<AuthenticatedUser>().is_some() {
        slot.mark();
    }
    req.extensions_mut().insert(slot.clone());

    let timer = RequestTimer {
        collector,
        started: Instant::now(),
        authenticated: slot,
    };
    let response = next.run(req).await;
    if response.extensions().get::<AuthenticatedUser>().is_some() {
        timer.authenticated.mark();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::client::MonitoringClient;
    use crate::monitor::collector::Sampler;
    use crate::monitor::config::MonitorConfig;
    use crate::monitor::test_support::CaptureServer;
    use axum::{
        Router,
        http::StatusCode,
        middleware,
        response::IntoResponse,
        routing::get,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn collector(base_url: &str, rate: f64) -> Arc<Collector> {
        let client = Arc::new(
            MonitoringClient::new(base_url, "pm_mw_key", Duration::from_secs(2), 1).unwrap(),
        );
        Arc::new(Collector::new(&MonitorConfig::default(), client).with_sampler(Sampler::new(rate)))
    }

    fn app(base_url: &str, rate: f64) -> Router {
        Router::new()
            .route("/hello", get(|| async { "hello" }))
            .layer(middleware::from_fn_with_state(collector(base_url, rate), monitor_requests))
    }

    async fn host_auth(mut req: Request<AxumBody>, next: Next) -> Response {
        mark_authenticated(&mut req, AuthenticatedUser { id: "7".to_string() });
        next.run(req).await
    }

    async fn wait_for_requests(server: &CaptureServer, count: usize) -> bool {
        for _ in 0..50 {
            if server.requests().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_sampled_request_is_sent_to_monitoring() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let response = app(&server.base_url, 1.0)
            .oneshot(Request::builder().uri("/hello").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(wait_for_requests(&server, 1).await, "no metrics sample arrived");
        let captured = &server.requests()[0];
        assert_eq!(captured.path, "/metrics");
        assert_eq!(captured.body["active_users"], 0);
        assert!(captured.body["response_time"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_unsampled_request_sends_nothing() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let response = app(&server.base_url, 0.0)
            .oneshot(Request::builder().uri("/hello").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_monitoring_does_not_affect_response() {
        let response = app("http://127.0.0.1:1", 1.0)
            .oneshot(Request::builder().uri("/hello").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_inner_auth_layer_counts_as_active_user() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let app = Router::new()
            .route("/hello", get(|| async { "hello" }))
            .layer(middleware::from_fn(host_auth))
            .layer(middleware::from_fn_with_state(
                collector(&server.base_url, 1.0),
                monitor_requests,
            ));

        let response = app
            .oneshot(Request::builder().uri("/hello").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(wait_for_requests(&server, 1).await, "no metrics sample arrived");
        assert_eq!(server.requests()[0].body["active_users"], 1);
    }

    #[tokio::test]
    async fn test_user_in_response_extensions_counts_as_active_user() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let app = Router::new()
            .route(
                "/hello",
                get(|| async {
                    let mut response = "hello".into_response();
                    response
                        .extensions_mut()
                        .insert(AuthenticatedUser { id: "9".to_string() });
                    response
                }),
            )
            .layer(middleware::from_fn_with_state(
                collector(&server.base_url, 1.0),
                monitor_requests,
            ));

        app.oneshot(Request::builder().uri("/hello").body(AxumBody::empty()).unwrap())
            .await
            .unwrap();

        assert!(wait_for_requests(&server, 1).await, "no metrics sample arrived");
        assert_eq!(server.requests()[0].body["active_users"], 1);
    }
}
