//! Inbound throttling through the full actix application

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::http::header::RETRY_AFTER;
    use actix_web::{test, web};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use venom_traffic::config::models::{BucketPolicy, RouteGroup};
    use venom_traffic::server::{AppState, HttpServer};
    use venom_traffic::utils::error::ErrorResponse;
    use venom_traffic::{Config, TrafficController};

    fn chat_config(capacity: u32, refill_per_sec: f64) -> Config {
        let mut config = Config::default();
        config.traffic_control.inbound.routes.push(RouteGroup {
            prefix: "/api/v1/governance".to_string(),
            group: "chat".to_string(),
        });
        config
            .traffic_control
            .inbound
            .groups
            .insert("chat".to_string(), BucketPolicy::new(capacity, refill_per_sec));
        config
    }

    fn peer(ip: &str) -> SocketAddr {
        format!("{}:40000", ip).parse().unwrap()
    }

    #[actix_web::test]
    async fn test_retry_after_matches_refill_rate() {
        let state = web::Data::new(AppState::new(chat_config(2, 0.25)).unwrap());
        let app = test::init_service(HttpServer::create_app(state)).await;

        for _ in 0..2 {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri("/api/v1/governance/limits")
                    .peer_addr(peer("10.1.0.1"))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/governance/limits")
                .peer_addr(peer("10.1.0.1"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        // One token every four seconds.
        let retry_after: u64 = resp
            .headers()
            .get(RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(retry_after, 4);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error.code, "RATE_LIMITED");
        assert_eq!(body.error.retry_after, Some(4));
        assert!(body.error.message.contains("inbound:chat"));
    }

    #[actix_web::test]
    async fn test_ip_keyed_callers_are_isolated() {
        let state = web::Data::new(AppState::new(chat_config(1, 0.01)).unwrap());
        let app = test::init_service(HttpServer::create_app(state)).await;

        let from = |ip: &str| {
            test::TestRequest::get()
                .uri("/api/v1/governance/limits")
                .peer_addr(peer(ip))
                .to_request()
        };

        assert_eq!(test::call_service(&app, from("10.1.0.1")).await.status(), StatusCode::OK);
        assert_eq!(
            test::call_service(&app, from("10.1.0.1")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(test::call_service(&app, from("10.1.0.2")).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_actor_wins_over_session_and_ip() {
        let state = web::Data::new(AppState::new(chat_config(2, 0.01)).unwrap());
        let app = test::init_service(HttpServer::create_app(state)).await;

        let req = |session: &str, ip: &str| {
            test::TestRequest::get()
                .uri("/api/v1/governance/limits")
                .insert_header(("X-Actor-Id", "u1"))
                .insert_header(("X-Session-Id", session))
                .peer_addr(peer(ip))
                .to_request()
        };

        assert_eq!(test::call_service(&app, req("s1", "10.0.0.1")).await.status(), StatusCode::OK);
        assert_eq!(test::call_service(&app, req("s2", "10.0.0.2")).await.status(), StatusCode::OK);
        assert_eq!(
            test::call_service(&app, req("s3", "10.0.0.3")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn test_status_endpoints_are_exempt() {
        let mut config = Config::default();
        config.traffic_control.inbound.default = BucketPolicy::new(1, 0.01);
        let state = web::Data::new(AppState::new(config).unwrap());
        let app = test::init_service(HttpServer::create_app(state)).await;

        for _ in 0..5 {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri("/api/v1/traffic-control/status")
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn test_shared_controller_reflects_outbound_activity() {
        let config = Config::default();
        let controller = Arc::new(TrafficController::new(config.traffic_control.clone()).unwrap());
        let state = web::Data::new(AppState::with_controller(config, controller.clone()));
        let app = test::init_service(HttpServer::create_app(state)).await;

        controller.check_outbound_request("jira:post");
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/traffic-control/metrics/jira:post")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["decisions"]["allowed"], 1);
    }
}
