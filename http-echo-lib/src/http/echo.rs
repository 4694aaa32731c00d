use std::{convert::Infallible, sync::Arc};

use rama::{
    Service,
    http::{
        Body, Request, Response,
        body::util::BodyExt as _,
        headers::ContentType,
        service::web::response::{Headers, IntoResponse},
    },
    telemetry::tracing,
};

use crate::{
    config::StartupConfig,
    policy::{RandomSource, ResponsePolicy},
    trace::{TraceGuard, TraceSink},
    utils::env::SERVICE_NAME,
};

use super::RequestOverride;

/// Echoes the configured text, followed by the request body if any.
#[derive(Clone)]
pub struct EchoService {
    config: Arc<StartupConfig>,
    policy: ResponsePolicy,
    trace_sink: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for EchoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoService")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish()
    }
}

impl EchoService {
    pub fn new(
        config: Arc<StartupConfig>,
        random: Arc<dyn RandomSource>,
        trace_sink: Arc<dyn TraceSink>,
    ) -> Self {
        let policy = ResponsePolicy::from_config(&config, random);
        Self {
            config,
            policy,
            trace_sink,
        }
    }
}

impl Service<Request> for EchoService {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        let _trace_guard = (!self.config.trace_disabled())
            .then(|| TraceGuard::start(self.trace_sink.clone(), SERVICE_NAME, &req));

        let overrides = RequestOverride::from_query(req.uri().query());

        let status = self.policy.decide_status(overrides.status);
        self.policy.apply_delay(overrides.response_delay_ms).await;

        let body = read_request_body(req).await;
        let payload = echo_payload(self.config.echo_text(), &body);

        Ok((
            status,
            Headers::single(ContentType::text_utf8()),
            Body::from(payload),
        )
            .into_response())
    }
}

async fn read_request_body(req: Request) -> Vec<u8> {
    match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(err) => {
            tracing::debug!("failed to read request body, echo without it: {err}");
            Vec::new()
        }
    }
}

fn echo_payload(text: &str, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(text.len() + body.len() + 16);
    payload.extend_from_slice(text.as_bytes());
    payload.push(b'\n');
    if !body.is_empty() {
        payload.extend_from_slice(b"\nBody\n----\n");
        payload.extend_from_slice(body);
        payload.push(b'\n');
    }
    payload
}
