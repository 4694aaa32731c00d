use std::{env::VarError, fmt};

/// Name under which this service logs and traces.
pub const SERVICE_NAME: &str = "http-echo";

/// Environment variable which, when true, disables trace emission.
pub const DISABLE_TRACE_ENV_VAR: &str = "DISABLE_ZIPKIN";

pub const fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub const fn server_identifier() -> &'static str {
    concat!("http-echo/", env!("CARGO_PKG_VERSION"))
}

pub fn trace_disabled_from_env() -> Result<bool, EnvConfigError> {
    parse_env_bool(DISABLE_TRACE_ENV_VAR, std::env::var(DISABLE_TRACE_ENV_VAR))
}

fn parse_env_bool(
    name: &'static str,
    value: Result<String, VarError>,
) -> Result<bool, EnvConfigError> {
    let value = match value {
        Ok(value) => value,
        Err(VarError::NotPresent) => return Ok(false),
        Err(VarError::NotUnicode(_)) => {
            return Err(EnvConfigError {
                name,
                value: None,
            });
        }
    };

    match value.as_str() {
        "" => Ok(false),
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(EnvConfigError {
            name,
            value: Some(value),
        }),
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct EnvConfigError {
    name: &'static str,
    value: Option<String>,
}

impl fmt::Display for EnvConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "could not parse environment configuration: {}={value:?} is not a boolean",
                self.name
            ),
            None => write!(
                f,
                "could not parse environment configuration: {} is not valid unicode",
                self.name
            ),
        }
    }
}

impl std::error::Error for EnvConfigError {}
