use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    error_handling::HandleErrorLayer,
    extract::{Path, Request, State},
    http::{header::CACHE_CONTROL, HeaderValue, Method, StatusCode},
    routing::get,
    BoxError, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower::ServiceBuilder;
use tower_conditional_etag::{
    config::EtagGuardConfig, etag_fn, registry::EtagRegistry, sync_etag_fn, ConditionalEtag,
    EtagGuardLayer,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// JSON [`EtagGuardConfig`] for the `/hello` route, e.g. `{"weak": false}`
pub const CONFIG_ENV: &str = "ETAG_DEMO_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    pub version: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ArticleUpdate {
    pub title: String,
}

pub type Articles = Arc<RwLock<HashMap<u64, Article>>>;

pub async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let conditional = load_conditional(std::env::var(CONFIG_ENV).ok().as_deref())?;
    let app = app(Articles::default(), conditional).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

pub fn load_conditional(json_config: Option<&str>) -> Result<ConditionalEtag, BoxError> {
    let config = match json_config {
        Some(s) => serde_json::from_str::<EtagGuardConfig>(s)?,
        None => EtagGuardConfig::default(),
    };
    Ok(ConditionalEtag::try_from(config)?)
}

/// - `/hello/:name`: guarded by its own [`EtagGuardLayer`]
/// - `/articles/:id`: guarded through an [`EtagRegistry`] wrapping the whole router
pub fn app(articles: Articles, hello_conditional: ConditionalEtag) -> Router {
    let hello_router = Router::new().route("/hello/:name", get(hello)).route_layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_etag_layer_err))
            .layer(EtagGuardLayer::with_conditional(
                sync_etag_fn(hello_etag),
                hello_conditional,
            )),
    );

    let store = articles.clone();
    let article_etag = etag_fn(move |req: &Request| {
        let id = article_id(req.uri().path());
        let store = store.clone();
        async move {
            let Some(id) = id else {
                return Ok(None);
            };
            let etag = store
                .read()
                .await
                .get(&id)
                .map(|a| format!("article{id}v{}", a.version));
            Ok::<_, Infallible>(etag)
        }
    });
    let mut registry = EtagRegistry::new();
    registry
        .add_with(
            Method::GET,
            "/articles/:id",
            article_etag.clone(),
            ConditionalEtag::new()
                .extra_header(CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        )
        // clients send back the etag they got from GET in If-Match
        .add(Method::PUT, "/articles/:id", article_etag, true);

    let articles_router = Router::new()
        .route("/articles/:id", get(get_article).put(put_article))
        .with_state(articles)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_etag_layer_err))
                .layer(registry.into_layer()),
        );

    hello_router.merge(articles_router)
}

pub async fn handle_etag_layer_err<T: Into<BoxError>>(err: T) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.into().to_string())
}

fn hello_etag(req: &Request) -> Option<String> {
    let name = req.uri().path().strip_prefix("/hello/")?;
    Some(format!("etagfor{name}"))
}

fn article_id(path: &str) -> Option<u64> {
    path.strip_prefix("/articles/")?.parse().ok()
}

pub async fn hello(Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "hello": name }))
}

pub async fn get_article(
    State(articles): State<Articles>,
    Path(id): Path<u64>,
) -> Result<Json<Article>, StatusCode> {
    articles
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Creates or updates the article.
///
/// The response's etag is the one the request was checked against,
/// clients have to GET the article again for the new one.
pub async fn put_article(
    State(articles): State<Articles>,
    Path(id): Path<u64>,
    Json(update): Json<ArticleUpdate>,
) -> Json<Article> {
    let mut articles = articles.write().await;
    let article = articles
        .entry(id)
        .and_modify(|a| {
            a.title = update.title.clone();
            a.version += 1;
        })
        .or_insert_with(|| Article {
            title: update.title,
            version: 1,
        });
    Json(article.clone())
}
