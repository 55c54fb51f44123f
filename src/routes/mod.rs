pub mod health;
pub mod metrics;
pub mod tweets;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{config::ObjectStoreKind, middleware::auth::require_auth, AppState};

fn cors_layer(allowed: Option<String>) -> CorsLayer {
    // Configured origins are matched exactly; without any, only local
    // development origins are allowed.
    let origins: Vec<String> = allowed
        .map(|list| {
            list.split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if origins.is_empty() {
            return o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1");
        }
        origins.iter().any(|allowed| allowed == o)
    });

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh-access-token", post(users::refresh_access_token));

    let protected = Router::new()
        .route("/logout", post(users::logout))
        .route("/current-user", get(users::current_user))
        .route("/change-password", post(users::change_password))
        .route("/update-account-details", put(users::update_account_details))
        .route("/update-avatar", patch(users::update_avatar))
        .route("/update-cover-image", patch(users::update_cover_image))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected)
}

fn tweet_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/create-tweet", post(tweets::create_tweet))
        .route("/get-user-tweets/{username}", get(tweets::get_user_tweets))
        .route("/update-tweet/{tweet_id}", patch(tweets::update_tweet))
        .route("/delete-tweet/{tweet_id}", delete(tweets::delete_tweet))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

pub fn create_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/api/v1/healthcheck", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1/users", user_routes(&state))
        .nest("/api/v1/tweets", tweet_routes(&state));

    // Disk-backed media is served by the API itself.
    if state.config.object_store == ObjectStoreKind::Disk {
        app = app.nest_service("/media", ServeDir::new(&state.config.media_dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.cors_origin.clone()))
        // Avatars and cover images; JSON bodies stay far below this.
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
