mod echo;
pub use echo::EchoService;

mod health;
pub use health::health_response;

mod query;
pub use query::RequestOverride;

mod server;
pub use server::{EchoHttpServer, HEALTH_PATH};
