use clap::Parser;

/// Background job tracking service with real-time job updates.
#[derive(Debug, Parser)]
#[command(name = "jobcast-server", version)]
pub struct CliArgs {
    /// Path to the configuration file (TOML, YAML or JSON).
    #[arg(short = 'c', long = "config-path", env = "JOBCAST_CONFIG_PATH")]
    pub config_path: Option<String>,
}
