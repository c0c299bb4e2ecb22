#![cfg(all(feature = "registry", feature = "http-body-impl"))]

use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use http::{
    header::{CACHE_CONTROL, ETAG, IF_MATCH, IF_NONE_MATCH},
    HeaderValue, Method, Request, Response, StatusCode,
};
use http_body_util::{BodyExt, Full};
use tower::{service_fn, Layer, Service, ServiceExt};
use tower_conditional_etag::{
    etag_fn, registry::EtagRegistry, sync_etag_fn, ConditionalEtag, CurrentEtag,
    EtagGuardServiceError,
};

type ReqBody = Full<Bytes>;

fn echo_path(
    calls: Arc<AtomicUsize>,
) -> impl Service<Request<ReqBody>, Response = Response<Full<Bytes>>, Error = Infallible> + Clone {
    service_fn(move |req: Request<ReqBody>| {
        calls.fetch_add(1, Ordering::SeqCst);
        let path = req.uri().path().to_owned();
        async move { Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(path)))) }
    })
}

fn last_segment_etag(req: &Request<ReqBody>) -> Option<String> {
    let name = req.uri().path().rsplit('/').next().unwrap_or_default();
    Some(format!("etagfor{name}"))
}

fn request(
    method: Method,
    uri: &str,
    headers: &[(http::HeaderName, &'static str)],
) -> Request<ReqBody> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, *value);
    }
    builder.body(Full::default()).unwrap()
}

fn hello_registry() -> EtagRegistry<ReqBody> {
    let mut registry = EtagRegistry::new();
    registry.add(Method::GET, "/hello/{name}", sync_etag_fn(last_segment_etag), true);
    registry
}

#[tokio::test]
async fn registered_route_is_guarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = hello_registry().into_layer().layer(echo_path(calls.clone()));

    let resp = svc
        .clone()
        .oneshot(request(Method::GET, "/hello/foo", &[]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(ETAG).unwrap(), "W/\"etagforfoo\"");
    assert_eq!(resp.into_body().collect().await.unwrap().to_bytes(), "/hello/foo");

    let resp = svc
        .oneshot(request(
            Method::GET,
            "/hello/foo",
            &[(IF_NONE_MATCH, "W/\"etagforfoo\"")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(resp.headers().get(ETAG).unwrap(), "W/\"etagforfoo\"");
    assert!(resp.into_body().collect().await.unwrap().to_bytes().is_empty());

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unregistered_route_passes_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = hello_registry().into_layer().layer(echo_path(calls.clone()));

    for req in [
        request(Method::GET, "/bye/foo", &[(IF_MATCH, "W/\"etagforfoo\"")]),
        request(Method::POST, "/hello/foo", &[(IF_MATCH, "W/\"nope\"")]),
        request(Method::GET, "/hello/foo/bar", &[]),
    ] {
        let resp = svc.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!resp.headers().contains_key(ETAG));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn weak_flag_is_per_route() {
    let mut registry = hello_registry();
    registry.add(Method::GET, "/strong/{name}", sync_etag_fn(last_segment_etag), false);
    let svc = registry.into_layer().layer(echo_path(Arc::default()));

    let resp = svc
        .clone()
        .oneshot(request(Method::GET, "/strong/foo", &[]))
        .await
        .unwrap();
    assert_eq!(resp.headers().get(ETAG).unwrap(), "\"etagforfoo\"");

    let resp = svc
        .oneshot(request(Method::GET, "/hello/foo", &[]))
        .await
        .unwrap();
    assert_eq!(resp.headers().get(ETAG).unwrap(), "W/\"etagforfoo\"");
}

#[tokio::test]
async fn literal_route_preferred_over_template() {
    let mut registry = hello_registry();
    registry.add(
        Method::GET,
        "/hello/world",
        sync_etag_fn(|_: &Request<ReqBody>| Some("static".to_owned())),
        true,
    );
    let svc = registry.into_layer().layer(echo_path(Arc::default()));

    let resp = svc
        .clone()
        .oneshot(request(Method::GET, "/hello/world", &[]))
        .await
        .unwrap();
    assert_eq!(resp.headers().get(ETAG).unwrap(), "W/\"static\"");

    let resp = svc
        .oneshot(request(Method::GET, "/hello/there", &[]))
        .await
        .unwrap();
    assert_eq!(resp.headers().get(ETAG).unwrap(), "W/\"etagforthere\"");
}

#[tokio::test]
async fn head_falls_back_to_get_route() {
    let svc = hello_registry().into_layer().layer(echo_path(Arc::default()));

    let resp = svc
        .oneshot(request(
            Method::HEAD,
            "/hello/foo",
            &[(IF_NONE_MATCH, "W/\"etagforfoo\"")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn adding_route_again_replaces_entry() {
    let mut registry = hello_registry();
    registry.add(
        Method::GET,
        "/hello/:other",
        sync_etag_fn(|_: &Request<ReqBody>| Some("v2".to_owned())),
        false,
    );
    assert_eq!(registry.len(), 1);
    let svc = registry.into_layer().layer(echo_path(Arc::default()));

    let resp = svc
        .oneshot(request(Method::GET, "/hello/foo", &[]))
        .await
        .unwrap();
    assert_eq!(resp.headers().get(ETAG).unwrap(), "\"v2\"");
}

#[tokio::test]
async fn route_extra_headers_and_if_match() {
    let mut registry = EtagRegistry::new();
    registry.add_with(
        Method::PUT,
        "/items/{id}",
        sync_etag_fn(last_segment_etag),
        ConditionalEtag::new()
            .weak(false)
            .extra_header(CACHE_CONTROL, HeaderValue::from_static("no-cache")),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = registry.into_layer().layer(echo_path(calls.clone()));

    let resp = svc
        .clone()
        .oneshot(request(Method::PUT, "/items/7", &[(IF_MATCH, "\"etagfor6\"")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(resp.headers().get(ETAG).unwrap(), "\"etagfor7\"");
    assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let resp = svc
        .oneshot(request(Method::PUT, "/items/7", &[(IF_MATCH, "\"etagfor7\"")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[derive(Debug)]
struct Gone;

impl std::fmt::Display for Gone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resource gone")
    }
}

impl std::error::Error for Gone {}

#[tokio::test]
async fn generator_error_is_boxed() {
    let mut registry = EtagRegistry::new();
    registry.add(
        Method::GET,
        "/gone",
        etag_fn(|_: &Request<ReqBody>| async { Err::<Option<String>, _>(Gone) }),
        true,
    );
    let svc = registry.into_layer().layer(echo_path(Arc::default()));

    let err = svc
        .oneshot(request(Method::GET, "/gone", &[]))
        .await
        .unwrap_err();

    match err {
        EtagGuardServiceError::GenerateError(e) => {
            assert!(e.is::<Gone>());
            assert_eq!(e.to_string(), "resource gone");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn registered_handler_sees_current_etag() {
    let inner = service_fn(|req: Request<ReqBody>| async move {
        let etag = req.extensions().get::<CurrentEtag>().cloned();
        let body = etag.map_or_else(Bytes::new, |CurrentEtag(e)| {
            Bytes::copy_from_slice(e.as_bytes())
        });
        Ok::<_, Infallible>(Response::new(Full::new(body)))
    });
    let svc = hello_registry().into_layer().layer(inner);

    let resp = svc
        .clone()
        .oneshot(request(Method::GET, "/hello/foo", &[]))
        .await
        .unwrap();
    assert_eq!(
        resp.into_body().collect().await.unwrap().to_bytes(),
        "W/\"etagforfoo\""
    );

    let resp = svc
        .oneshot(request(Method::GET, "/bye/foo", &[]))
        .await
        .unwrap();
    assert!(resp.into_body().collect().await.unwrap().to_bytes().is_empty());
}
