//! End-to-end transaction scenarios through the HTTP layer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use scoped_response::config::{AppConfig, ScopeKind};
use scoped_response::{
    HeaderMerge, HttpServer, ResponseError, TransactionErrorResult, TransactionScope,
};

mod common;

#[tokio::test]
async fn test_normal_flow_defaults_to_ok() {
    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().write(b"hello");
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "hello");
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_transient_failure_is_invisible() {
    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().write_header(StatusCode::ACCEPTED);
            ctx.begin_transaction(|t| {
                t.response_mut().write(b"partial");
                t.response_mut()
                    .headers_mut()
                    .insert("x-partial", HeaderValue::from_static("1"));
                t.complete(Err("some error"));
            });
            ctx.begin_transaction(|t| {
                t.response_mut().write(b"after");
                t.succeed();
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body, "after");
    assert!(!response.headers.contains_key("x-partial"));
}

#[tokio::test]
async fn test_request_scope_replaces_response() {
    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().set_content_type("text/html");
            ctx.response_mut().write(b"<p>normal flow</p>");
            ctx.begin_transaction(|t| {
                t.response_mut().write(b"ok part");
                t.succeed();
            });
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::Request);
                t.complete(Err(TransactionErrorResult::new(503, "db down", "text/plain")));
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, "db down");
    assert_eq!(response.headers.get(header::CONTENT_TYPE).unwrap(), "text/plain");
}

#[tokio::test]
async fn test_request_scope_generic_error_uses_charset() {
    let mut config = AppConfig::default();
    config.response.charset = "ISO-8859-1".to_string();

    let router = HttpServer::new(config)
        .handle("/", |ctx| {
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::Request);
                t.complete(Err("validation failed"));
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, "validation failed");
    assert_eq!(
        response.headers.get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=ISO-8859-1"
    );
}

#[tokio::test]
async fn test_request_scope_empty_reason_emits_error_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().write(b"normal flow");
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::Request);
                t.complete(Err(TransactionErrorResult::new(404, "", "")));
            });
        })
        .on_error(StatusCode::NOT_FOUND, move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.response_mut().write(b"custom 404");
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, "custom 404");
}

#[tokio::test]
async fn test_linked_chain_keeps_earlier_output() {
    let ran_c = Arc::new(AtomicBool::new(false));
    let flag = ran_c.clone();

    let router = common::server()
        .handle("/", move |ctx| {
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::Linked);
                t.response_mut().write(b"A-ok");
                t.succeed();
            });
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::Linked);
                t.response_mut().write(b"B-partial");
                t.response_mut().write_header(StatusCode::INTERNAL_SERVER_ERROR);
                t.complete(Err("B failed"));
            });
            ctx.begin_transaction(|t| {
                flag.store(true, Ordering::SeqCst);
                t.response_mut().write(b"C");
                t.succeed();
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert!(!ran_c.load(Ordering::SeqCst));
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "A-ok");
}

#[tokio::test]
async fn test_custom_scope_fallback_is_sent() {
    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().write(b"price: ");
            ctx.begin_transaction(|t| {
                t.set_scope(TransactionScope::custom(|result, writer, _ctx| {
                    if result.is_failure() {
                        writer.reset();
                        writer.set_body_string("unavailable");
                    }
                    true
                }));
                t.response_mut().write(b"42.0");
                t.response_mut().write_header(StatusCode::BAD_GATEWAY);
                t.complete(Err("quote service timed out"));
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "price: unavailable");
}

#[tokio::test]
async fn test_default_scope_from_config() {
    let mut config = AppConfig::default();
    config.response.default_scope = ScopeKind::Linked;

    let router = HttpServer::new(config)
        .handle("/", |ctx| {
            ctx.begin_transaction(|t| {
                t.complete(Err("first fails"));
            });
            ctx.begin_transaction(|t| {
                t.response_mut().write(b"never runs");
                t.succeed();
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.body, "");
}

#[tokio::test]
async fn test_sub_scope_error_status_not_downgraded() {
    let router = common::server()
        .handle("/", |ctx| {
            ctx.response_mut().write_header(StatusCode::OK);
            ctx.begin_transaction(|t| {
                t.response_mut().write_header(StatusCode::MULTI_STATUS);
                t.response_mut().write(b"partial content");
                t.succeed();
            });
        })
        .router();

    let response = common::get(router, "/").await;
    assert_eq!(response.status, StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn test_header_merge_modes() {
    async fn run(mode: HeaderMerge) -> Vec<String> {
        let mut config = AppConfig::default();
        config.response.header_merge = mode;

        let router = HttpServer::new(config)
            .handle("/", |ctx| {
                ctx.response_mut()
                    .headers_mut()
                    .insert("x-tag", HeaderValue::from_static("base"));
                ctx.begin_transaction(|t| {
                    t.response_mut()
                        .headers_mut()
                        .append("x-tag", HeaderValue::from_static("tx"));
                    t.succeed();
                });
            })
            .router();

        let response = common::get(router, "/").await;
        response
            .headers
            .get_all("x-tag")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    assert_eq!(run(HeaderMerge::Name).await, vec!["base"]);
    assert_eq!(run(HeaderMerge::Value).await, vec!["base", "tx"]);
}

#[tokio::test]
async fn test_request_body_is_available() {
    let router = common::server()
        .handle("/echo", |ctx| {
            let body = ctx.body().clone();
            ctx.begin_transaction(|t| {
                t.response_mut().write(&body);
                t.succeed();
            });
        })
        .router();

    let response = common::send(router, Method::POST, "/echo", "ping").await;
    assert_eq!(response.body, "ping");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = AppConfig::default();
    config.response.max_body_bytes = 4;

    let router = HttpServer::new(config)
        .handle("/", |ctx| {
            ctx.response_mut().write(b"unreachable");
        })
        .router();

    let response = common::send(router, Method::POST, "/", "too large").await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_hijack_without_upgrade_is_reported() {
    let unsupported = Arc::new(AtomicBool::new(false));
    let flag = unsupported.clone();

    let router = common::server()
        .handle("/", move |ctx| {
            let result = ctx.response_mut().hijack();
            flag.store(
                matches!(result, Err(ResponseError::HijackUnsupported)),
                Ordering::SeqCst,
            );
            ctx.response_mut().write(b"still buffered");
        })
        .router();

    let response = common::get(router, "/").await;
    assert!(unsupported.load(Ordering::SeqCst));
    assert_eq!(response.body, "still buffered");
}

#[tokio::test]
async fn test_writers_do_not_leak_between_requests() {
    let router = common::server()
        .handle("/first", |ctx| {
            ctx.response_mut().write_header(StatusCode::CREATED);
            ctx.response_mut()
                .headers_mut()
                .insert("x-first", HeaderValue::from_static("1"));
            ctx.response_mut().write(b"first");
        })
        .handle("/second", |ctx| {
            ctx.response_mut().write(b"second");
        })
        .router();

    let first = common::get(router.clone(), "/first").await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = common::get(router, "/second").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body, "second");
    assert!(!second.headers.contains_key("x-first"));
    assert_ne!(
        first.headers.get("x-request-id"),
        second.headers.get("x-request-id")
    );
}
