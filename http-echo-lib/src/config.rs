use std::fmt;

use rama::{http::StatusCode, net::socket::Interface};

/// Status code used when no (gated) override applies.
pub const IMPLICIT_STATUS_CODE: StatusCode = StatusCode::OK;

/// Validated startup parameters of the echo server.
///
/// Constructed once when the process starts and shared
/// (read-only) with every request handler afterwards.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    listen_address: Interface,
    echo_text: String,
    default_status_code: StatusCode,
    status_rate: f64,
    delay_ms: f64,
    trace_disabled: bool,
}

impl StartupConfig {
    /// Validate the raw startup parameters.
    ///
    /// `status_rate` and `delay_ms` are taken as-is: a rate above 100
    /// always applies and a rate below 0 never does.
    pub fn try_new(
        listen_address: Interface,
        echo_text: impl Into<String>,
        default_status_code: u16,
        status_rate: f64,
        delay_ms: f64,
    ) -> Result<Self, StartupConfigError> {
        let echo_text = echo_text.into();
        if echo_text.is_empty() {
            return Err(StartupConfigError::MissingText);
        }

        let default_status_code = StatusCode::from_u16(default_status_code)
            .map_err(|_| StartupConfigError::InvalidStatusCode(default_status_code))?;

        Ok(Self {
            listen_address,
            echo_text,
            default_status_code,
            status_rate,
            delay_ms,
            trace_disabled: false,
        })
    }

    pub fn with_trace_disabled(mut self, disabled: bool) -> Self {
        self.trace_disabled = disabled;
        self
    }

    pub fn listen_address(&self) -> &Interface {
        &self.listen_address
    }

    pub fn echo_text(&self) -> &str {
        &self.echo_text
    }

    pub fn default_status_code(&self) -> StatusCode {
        self.default_status_code
    }

    /// Percentage of requests to which the default status code and delay apply.
    pub fn status_rate(&self) -> f64 {
        self.status_rate
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn trace_disabled(&self) -> bool {
        self.trace_disabled
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StartupConfigError {
    MissingText,
    InvalidStatusCode(u16),
    UnexpectedArguments(Vec<String>),
}

impl fmt::Display for StartupConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupConfigError::MissingText => write!(f, "missing --text option"),
            StartupConfigError::InvalidStatusCode(code) => {
                write!(f, "invalid --response-code: {code} is not a valid HTTP status code")
            }
            StartupConfigError::UnexpectedArguments(args) => {
                write!(f, "too many arguments: {}", args.join(" "))
            }
        }
    }
}

impl std::error::Error for StartupConfigError {}
