use api::AppState;
use axum::{routing::get, Router};

pub fn build_app(state: AppState) -> Router {
    api::app(state).route("/health", get(healthcheck))
}

async fn healthcheck() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use api::{AppState, EventHub};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use runtime::{ManualScheduler, SimulationController};
    use tower::ServiceExt;
    use traffic_core::{ModeParsePolicy, SeededRandom};

    use crate::client::HttpStoreClient;

    fn state() -> AppState {
        let events = Arc::new(EventHub::new());
        let store = HttpStoreClient::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
        let controller = SimulationController::new(
            Arc::new(store),
            Arc::new(ManualScheduler::new()),
            Box::new(SeededRandom::new(1)),
            events.clone(),
        );
        AppState::new(controller, events, ModeParsePolicy::Strict)
    }

    #[tokio::test]
    async fn server_healthcheck_responds_ok() {
        let app = super::build_app(state());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn simulation_routes_are_mounted() {
        let app = super::build_app(state());

        let response = app
            .oneshot(Request::get("/simulation/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
