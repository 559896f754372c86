use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct Config {
    /// Default bind address when the CLI does not override it.
    pub bind_addr: String,
    /// Default bind port when the CLI does not override it.
    pub bind_port: u16,
    /// Adapter connect timeout used when a device's connectionParams carry no timeoutMs.
    pub connect_timeout_ms: u64,
    /// Maximum accepted length of one inbound request line, in bytes.
    pub max_line_bytes: usize,
}

impl Config {
    fn from_env() -> Self {
        let bind_addr =
            std::env::var("FIELDGW_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = std::env::var("FIELDGW_BIND_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8888u16);
        let connect_timeout_ms = std::env::var("FIELDGW_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000u64);
        let max_line_bytes = std::env::var("FIELDGW_MAX_LINE_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256 * 1024usize);
        Self {
            bind_addr,
            bind_port,
            connect_timeout_ms,
            max_line_bytes,
        }
    }
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}
