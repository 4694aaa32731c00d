use std::{convert::Infallible, sync::Arc};

use rama::{
    Service,
    http::{Request, Response},
};

use crate::{config::StartupConfig, policy::RandomSource, trace::TraceSink};

use super::{EchoService, health_response};

pub const HEALTH_PATH: &str = "/health";

/// Routes `/health` to the liveness payload,
/// any other path and method to the echo service.
#[derive(Debug, Clone)]
pub struct EchoHttpServer {
    echo: EchoService,
}

impl EchoHttpServer {
    pub fn new(
        config: Arc<StartupConfig>,
        random: Arc<dyn RandomSource>,
        trace_sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            echo: EchoService::new(config, random, trace_sink),
        }
    }
}

impl Service<Request> for EchoHttpServer {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        if req.uri().path() == HEALTH_PATH {
            return Ok(health_response());
        }
        self.echo.serve(req).await
    }
}
