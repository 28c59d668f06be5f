//! Request identity middleware: dotfile probe defense, request id
//! assignment, and the structured completion log.
//!
//! This is the outermost layer of the chain, so every response — success,
//! error, or rate-limited — carries `X-Request-ID` and produces exactly
//! one completion log line.

use crate::models::context::RequestId;
use crate::routes::metrics::MetricsCollector;

use actix_web::{
    body::BoxBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    web, Error, HttpMessage, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::info;
use serde_json::json;
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

pub struct RequestIdentity;

impl<S, B> Transform<S, ServiceRequest> for RequestIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RequestIdentityMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestIdentityMiddleware { service: Rc::new(service) })
    }
}

pub struct RequestIdentityMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestIdentityMiddleware<S>
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

        Box::pin(async move {
            // Dotfile probes (/.env, /.git/config, ...) are dropped before
            // any handler can see them.
            if req.path().split('/').any(|segment| segment.starts_with('.')) {
                let response = HttpResponse::NotFound()
                    .json(json!({ "error": { "code": "NOT_FOUND" } }));
                return Ok(req.into_response(response).map_into_boxed_body());
            }

            let request_id = Uuid::new_v4().to_string();
            req.extensions_mut().insert(RequestId(request_id.clone()));

            let method = req.method().to_string();
            let path = req.path().to_string();
            let metrics = req.app_data::<web::Data<MetricsCollector>>().cloned();
            let started = Instant::now();

            if let Some(metrics) = &metrics {
                metrics.increment_connections();
            }
            let result = service.call(req).await;
            if let Some(metrics) = &metrics {
                metrics.decrement_connections();
            }
            let mut res = result?.map_into_boxed_body();

            if let Some(metrics) = &metrics {
                metrics.record_request(&path, res.status().is_success(), started.elapsed());
            }

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                res.headers_mut().insert(HeaderName::from_static("x-request-id"), value);
            }

            info!(
                target: "onasis::request",
                "{}",
                json!({
                    "method": method,
                    "path": path,
                    "status": res.status().as_u16(),
                    "durationMs": started.elapsed().as_millis() as u64,
                    "requestId": request_id,
                })
            );

            Ok(res)
        })
    }
}
