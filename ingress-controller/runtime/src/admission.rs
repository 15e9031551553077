use crate::{
    annotations::Extractor,
    core,
    k8s::{Ingress, Resource, ResourceExt},
    metrics::AdmissionMetrics,
    resolver::ClusterResolver,
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::DynamicObject;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Rejects Ingresses whose annotations exceed the configured risk level or
/// carry invalid values.
#[derive(Clone)]
pub struct Admission {
    extractor: Arc<Extractor>,
    resolver: ClusterResolver,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Every annotation violation found in a single Ingress.
#[derive(Debug, Error)]
#[error("{}", display_violations(.0))]
pub struct Violations(Vec<core::Error>);

type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: AdmissionReview = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    admission.metrics.invalid();
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req)
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    admission.metrics.invalid();
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(?rsp);
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(
        extractor: Arc<Extractor>,
        resolver: ClusterResolver,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            extractor,
            resolver,
            metrics,
        }
    }

    fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        if !is_kind::<Ingress>(&req) {
            self.metrics.invalid();
            return AdmissionResponse::invalid(format_args!(
                "unsupported resource type: {}.{}.{}",
                req.kind.group, req.kind.version, req.kind.kind
            ));
        }

        let rsp = AdmissionResponse::from(&req);

        // Deletions carry no object.
        let Some(obj) = req.object else {
            self.metrics.allowed();
            return rsp;
        };

        let ns = obj.namespace().unwrap_or_default();
        let name = obj.name_any();
        if let Err(error) = self.validate(obj.annotations()) {
            info!(%error, %ns, %name, "Denied");
            self.metrics.denied();
            return rsp.deny(error);
        }

        self.metrics.allowed();
        rsp
    }

    /// Runs the risk gate and, when annotation validation is enabled, the
    /// strict value check over every annotation module.
    fn validate(&self, annotations: &BTreeMap<String, String>) -> Result<(), Violations> {
        let mut errors = self.extractor.validate(annotations, &self.resolver);
        if self.extractor.settings().validates() {
            errors.extend(self.extractor.check_values(annotations));
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(Violations(errors))
    }
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn display_violations(errors: &[core::Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
