use crate::config::AppConfig;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::{header, Method},
    web, Error,
};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};
use tracing::warn;

/// Requires `Authorization: Bearer <key>` with one of `auth.api_keys` on every route except `/health`.
pub struct ApiKeyAuth;

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<Self::Response>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.method() == Method::OPTIONS || req.path() == "/health" {
            return Box::pin(self.service.call(req));
        }

        let Some(config) = req.app_data::<web::Data<AppConfig>>() else {
            warn!("AppConfig missing in app_data");
            return reject(ErrorInternalServerError("Configuration error"));
        };

        if !has_valid_key(&req, &config.auth.api_keys) {
            warn!(path = req.path(), "Rejected request without a valid API key");
            return reject(ErrorUnauthorized("Invalid or missing API key"));
        }

        Box::pin(self.service.call(req))
    }
}

type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>>>>;

fn reject<T: 'static>(err: Error) -> LocalBoxFuture<T> {
    Box::pin(ready(Err(err)))
}

fn has_valid_key(req: &ServiceRequest, api_keys: &[String]) -> bool {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| api_keys.iter().any(|key| key == token))
}
