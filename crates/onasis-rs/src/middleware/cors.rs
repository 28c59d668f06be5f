//! Origin-policy CORS middleware.
//!
//! An origin is allowed iff it matches the exact allowlist, an allowed
//! suffix (e.g. `lanonasis.com` covers every subdomain), or localhost
//! when permitted. Disallowed origins receive no CORS headers; their
//! preflights are refused outright.

use crate::models::settings::OriginPolicy;

use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    http::Method,
    Error, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str =
    "Authorization, Content-Type, X-API-Key, apikey, client-id, X-Project-Scope, X-Session-ID, X-Request-ID";
const EXPOSE_HEADERS: &str = "X-Request-ID, X-Gateway-Route, X-AI-Route";

#[derive(Clone)]
pub struct Cors {
    policy: Arc<OriginPolicy>,
}

impl Cors {
    pub fn new(policy: OriginPolicy) -> Self {
        Cors { policy: Arc::new(policy) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Cors
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = CorsMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorsMiddleware { service: Rc::new(service), policy: self.policy.clone() })
    }
}

pub struct CorsMiddleware<S> {
    service: Rc<S>,
    policy: Arc<OriginPolicy>,
}

impl<S, B> Service<ServiceRequest> for CorsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let origin = req
                .headers()
                .get("origin")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let allowed = origin.as_deref().map(|o| policy.allows(o)).unwrap_or(false);

            if req.method() == Method::OPTIONS && origin.is_some() {
                let response = if allowed {
                    HttpResponse::NoContent()
                        .insert_header(("Access-Control-Allow-Origin", origin.clone().unwrap()))
                        .insert_header(("Access-Control-Allow-Methods", ALLOW_METHODS))
                        .insert_header(("Access-Control-Allow-Headers", ALLOW_HEADERS))
                        .insert_header(("Access-Control-Max-Age", "3600"))
                        .insert_header(("Vary", "Origin"))
                        .finish()
                } else {
                    HttpResponse::Forbidden()
                        .json(serde_json::json!({ "error": { "code": "ORIGIN_NOT_ALLOWED" } }))
                };
                return Ok(req.into_response(response).map_into_boxed_body());
            }

            let mut res = service.call(req).await?.map_into_boxed_body();

            if allowed {
                let headers = res.headers_mut();
                if let Some(origin) = origin {
                    if let Ok(value) = HeaderValue::from_str(&origin) {
                        headers.insert(
                            HeaderName::from_static("access-control-allow-origin"),
                            value,
                        );
                    }
                }
                headers.insert(
                    HeaderName::from_static("access-control-expose-headers"),
                    HeaderValue::from_static(EXPOSE_HEADERS),
                );
                headers.insert(
                    HeaderName::from_static("vary"),
                    HeaderValue::from_static("Origin"),
                );
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    fn policy() -> OriginPolicy {
        OriginPolicy {
            exact: vec![],
            suffixes: vec!["lanonasis.com".into()],
            allow_localhost: true,
        }
    }

    async fn handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn allowed_origin_gets_cors_headers() {
        let app = test::init_service(
            App::new().wrap(Cors::new(policy())).route("/x", web::get().to(handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/x")
            .insert_header(("Origin", "https://dashboard.lanonasis.com"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get("access-control-allow-origin").unwrap(),
            "https://dashboard.lanonasis.com"
        );
    }

    #[actix_web::test]
    async fn disallowed_origin_gets_no_cors_headers() {
        let app = test::init_service(
            App::new().wrap(Cors::new(policy())).route("/x", web::get().to(handler)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/x")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        assert!(res.headers().get("access-control-allow-origin").is_none());
    }

    #[actix_web::test]
    async fn preflight_short_circuits() {
        let app = test::init_service(
            App::new().wrap(Cors::new(policy())).route("/x", web::get().to(handler)),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/x")
            .insert_header(("Origin", "http://localhost:3000"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 204);
        assert!(res.headers().get("access-control-allow-methods").is_some());

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/x")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 403);
    }
}
