use axum::{
    Router,
    http::{HeaderValue, header},
    middleware,
    routing::{get, post},
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::handlers::{self, admin};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let admin_path = state.admin_path().to_string();

    let protected = Router::new()
        .route("/dashboard", get(admin::get_dashboard))
        .route("/users/{id}/mark-paid", post(admin::mark_paid))
        .route("/users/{id}/delete", post(admin::delete_user))
        .route("/users/{id}/bind", post(admin::bind_user))
        .route("/logout", post(admin::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::require_admin));

    let admin_routes = Router::new()
        .route("/login", get(admin::get_login).post(admin::login))
        .merge(protected);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/webhook", post(handlers::webhook::stripe_webhook))
        .route("/webhook/stripe", post(handlers::webhook::stripe_webhook))
        .route("/thanks", get(handlers::thanks::thanks))
        .route("/success/{session_id}", get(handlers::thanks::success))
        .nest(&admin_path, admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tollgate_db::repositories::payment_repo::PaymentRepository;
    use tollgate_db::repositories::user_repo::UserRepository;
    use tollgate_db::services::admin_service::AdminService;
    use tower::ServiceExt;

    use super::*;
    use crate::config::PanelConfig;
    use crate::services::session_service::SessionService;
    use crate::services::stripe::{StripeVerifier, sign};
    use crate::services::webhook_service::WebhookService;

    const SECRET: &str = "whsec_router";
    const PASSWORD: &str = "correct horse";

    struct Harness {
        app: Router,
        pool: tollgate_db::sqlx::SqlitePool,
    }

    async fn harness() -> Harness {
        let pool = tollgate_db::connect_memory().await.unwrap();
        let config = PanelConfig {
            database_url: "sqlite::memory:".into(),
            listen_port: 0,
            bot_username: "guide_bot".into(),
            stripe_webhook_secret: SECRET.into(),
            admin_password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
            admin_path: "/admin".into(),
            webhook_tolerance_secs: 300,
            session_ttl_hours: 1,
        };
        let state = AppState {
            admin: AdminService::new(pool.clone()),
            webhook: Arc::new(WebhookService::new(
                PaymentRepository::new(pool.clone()),
                StripeVerifier::new(SECRET, 300),
            )),
            sessions: SessionService::new(1),
            config: Arc::new(config),
        };
        Harness {
            app: build_router(state),
            pool,
        }
    }

    fn completed(session_id: &str) -> String {
        serde_json::json!({
            "id": "evt_router",
            "type": "checkout.session.completed",
            "data": { "object": { "id": session_id, "payment_status": "paid" } }
        })
        .to_string()
    }

    fn webhook_request(payload: &str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("stripe-signature", sig);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    async fn count_payments(pool: &tollgate_db::sqlx::SqlitePool) -> i64 {
        tollgate_db::sqlx::query_scalar("SELECT COUNT(*) FROM payments")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn login_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("password=correct+horse"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()["set-cookie"].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = harness().await;
        let response = h
            .app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let h = harness().await;
        let payload = completed("cs_bad");

        let response = h
            .app
            .clone()
            .oneshot(webhook_request(&payload, Some("t=1,v1=deadbeef".into())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h.app.oneshot(webhook_request(&payload, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(count_payments(&h.pool).await, 0);
    }

    #[tokio::test]
    async fn webhook_records_once_per_session() {
        let h = harness().await;
        let payload = completed("cs_router");

        for _ in 0..2 {
            let signature = sign(SECRET, &payload, chrono::Utc::now().timestamp());
            let response = h
                .app
                .clone()
                .oneshot(webhook_request(&payload, Some(signature)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(count_payments(&h.pool).await, 1);

        let stripe_path = Request::builder()
            .method("POST")
            .uri("/webhook/stripe")
            .header("stripe-signature", sign(SECRET, &payload, chrono::Utc::now().timestamp()))
            .body(Body::from(payload.clone()))
            .unwrap();
        let response = h.app.oneshot(stripe_path).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(count_payments(&h.pool).await, 1);
    }

    #[tokio::test]
    async fn thanks_requires_session_id() {
        let h = harness().await;
        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/thanks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .uri("/thanks?session_id=cs_abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_requires_session() {
        let h = harness().await;
        let response = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/admin/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/admin/login");

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/users/1/delete")
                    .header("cookie", "admin_session=forged")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn wrong_password_sets_no_cookie() {
        let h = harness().await;
        let response = h
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/login")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("password=nope"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn admin_override_flow() {
        let h = harness().await;
        let cookie = login_cookie(&h.app).await;

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/dashboard")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/users/777/mark-paid")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let users = UserRepository::new(h.pool.clone());
        users.upsert_on_contact(777, Some("Ann"), None, None).await.unwrap();

        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/users/777/mark-paid")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(users.get(777).await.unwrap().unwrap().fulfilled);

        let response = h
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/users/777/delete")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(users.get(777).await.unwrap().is_none());
    }
}
