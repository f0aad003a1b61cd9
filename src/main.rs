use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use cms_backend::{
    AppState,
    assist::OpenAiGenerator,
    config::Config,
    middleware::{auth_optional, auth_required, log_errors},
    routes,
    settings::{SettingsCache, SystemClock},
    storage::FsObjectStore,
    webhook::WebhookNotifier,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置应用状态
    let defaults = SettingsCache::defaults_from_config(&config);
    let generator = OpenAiGenerator::from_config(&config)
        .map(|g| Arc::new(g) as Arc<dyn cms_backend::assist::TextGenerator>);
    if generator.is_none() {
        tracing::info!("AI_API_URL not set, slug/excerpt use deterministic fallback");
    }
    let state = AppState {
        pool,
        settings: Arc::new(SettingsCache::new(defaults, Arc::new(SystemClock))),
        notifier: WebhookNotifier::new(),
        store: Arc::new(FsObjectStore::new(
            config.upload_dir.clone(),
            &config.site_url,
        )),
        generator,
        config,
    };

    // 完全公开的路由
    let public_routes = Router::new()
        .route("/users/register", post(routes::users::register))
        .route("/users/login", post(routes::users::login));

    // 可选认证：匿名可访问，带token时按角色放宽可见性
    let optional_routes = Router::new()
        .route("/posts", get(routes::posts::list_posts))
        .route("/posts/{id}", get(routes::posts::get_post))
        .route("/pages", get(routes::posts::list_pages))
        .route("/pages/{id}", get(routes::posts::get_page))
        .route("/categories", get(routes::categories::list_categories))
        .route("/categories/{id}", get(routes::categories::get_category))
        .route("/tags", get(routes::tags::list_tags))
        .route("/tags/{id}", get(routes::tags::get_tag))
        .route("/comments", get(routes::comments::list_comments))
        .route("/comments", post(routes::comments::create_comment))
        .route("/comments/{id}", get(routes::comments::get_comment))
        .route("/media", get(routes::media::list_media))
        .route("/media/{id}", get(routes::media::get_media))
        .route("/links", get(routes::links::list_links))
        .route("/links/{id}", get(routes::links::get_link))
        .route("/link-categories", get(routes::links::list_link_categories))
        .route("/link-categories/{id}", get(routes::links::get_link_category))
        .route("/moments", get(routes::moments::list_moments))
        .route("/moments/{id}", get(routes::moments::get_moment))
        .route("/moments/{id}/like", post(routes::moments::like_moment))
        .route("/users/{id}", get(routes::users::get_user))
        .route("/settings", get(routes::settings::get_settings))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_optional,
        ));

    // 需要认证的路由
    let protected_routes = Router::new()
        .route("/users/me", get(routes::users::me))
        .route("/users", get(routes::users::list_users))
        .route("/users", post(routes::users::create_user))
        .route("/users/{id}", put(routes::users::update_user))
        .route("/users/{id}", delete(routes::users::delete_user))
        .route("/posts", post(routes::posts::create_post))
        .route("/posts/{id}", put(routes::posts::update_post))
        .route("/posts/{id}", delete(routes::posts::delete_post))
        .route("/pages", post(routes::posts::create_page))
        .route("/pages/{id}", put(routes::posts::update_page))
        .route("/pages/{id}", delete(routes::posts::delete_page))
        .route("/categories", post(routes::categories::create_category))
        .route("/categories/{id}", put(routes::categories::update_category))
        .route("/categories/{id}", delete(routes::categories::delete_category))
        .route("/tags", post(routes::tags::create_tag))
        .route("/tags/{id}", put(routes::tags::update_tag))
        .route("/tags/{id}", delete(routes::tags::delete_tag))
        .route("/comments/{id}", put(routes::comments::update_comment))
        .route("/comments/{id}", delete(routes::comments::delete_comment))
        .route("/media", post(routes::media::upload_media))
        .route("/media/{id}", put(routes::media::update_media))
        .route("/media/{id}", delete(routes::media::delete_media))
        .route("/links", post(routes::links::create_link))
        .route("/links/{id}", put(routes::links::update_link))
        .route("/links/{id}", delete(routes::links::delete_link))
        .route("/link-categories", post(routes::links::create_link_category))
        .route("/link-categories/{id}", put(routes::links::update_link_category))
        .route("/link-categories/{id}", delete(routes::links::delete_link_category))
        .route("/moments", post(routes::moments::create_moment))
        .route("/moments/{id}", put(routes::moments::update_moment))
        .route("/moments/{id}", delete(routes::moments::delete_moment))
        .route("/settings/admin", get(routes::settings::get_admin_settings))
        .route("/settings", put(routes::settings::update_settings))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_required,
        ));

    let router = Router::new().nest(
        "/wp-json/wp/v2",
        Router::new()
            .merge(public_routes)
            .merge(optional_routes)
            .merge(protected_routes),
    );

    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 开发模式放开CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
