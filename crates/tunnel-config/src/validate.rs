//! Configuration validation logic.

use crate::Config;
use crate::defaults::min_header_bytes;
use crate::loader::{ConfigError, normalize_listen};

const LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];
const LOG_OUTPUTS: [&str; 2] = ["stdout", "stderr"];

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let listen = normalize_listen(config.server.listen.trim());
    if listen.is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    match listen.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => {}
        _ => {
            return Err(ConfigError::Validation(format!(
                "server.listen must be host:port, got {:?}",
                config.server.listen
            )));
        }
    }
    if config.server.max_header_bytes < min_header_bytes() {
        return Err(ConfigError::Validation(format!(
            "server.max_header_bytes too small (min {})",
            min_header_bytes()
        )));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if config.server.max_connections == Some(0) {
        return Err(ConfigError::Validation(
            "server.max_connections must be > 0 when set".into(),
        ));
    }
    if config.relay.channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "relay.channel_capacity must be >= 1".into(),
        ));
    }
    if config.websocket.max_frame_bytes == 0 {
        return Err(ConfigError::Validation(
            "websocket.max_frame_bytes must be > 0".into(),
        ));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !LOG_FORMATS.contains(&format)
    {
        return Err(ConfigError::Validation(format!(
            "logging.format must be one of: {:?}",
            LOG_FORMATS
        )));
    }
    if let Some(output) = config.logging.output.as_deref()
        && !LOG_OUTPUTS.contains(&output)
    {
        return Err(ConfigError::Validation(format!(
            "logging.output must be one of: {:?}",
            LOG_OUTPUTS
        )));
    }
    Ok(())
}
