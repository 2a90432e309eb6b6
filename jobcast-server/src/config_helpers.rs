use std::net::{IpAddr, SocketAddr};

use jobcast_db_connection::DbConnectionConfig;

/// Build database connection config from application config.
pub fn database_config_from_config(cfg: &jobcast_config::Config) -> DbConnectionConfig {
    DbConnectionConfig::new(cfg.database.url.clone())
        .with_max_connections(cfg.database.max_connections)
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| format!("{host}:{port}").parse::<SocketAddr>())
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}
