use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Vitrine binary.
#[derive(Debug, Parser)]
#[command(
    name = "vitrine",
    version,
    about = "Static asset server with pre-compressed variants"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "VITRINE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build the asset cache and serve it over HTTP.
    Serve(Box<ServeArgs>),
    /// Build the asset cache once and print its entries.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct AssetOverrides {
    /// Override the directory scanned for assets.
    #[arg(long = "assets-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub assets_root: Option<PathBuf>,

    /// Override the cached file extensions (comma separated).
    #[arg(long = "assets-extensions", value_name = "LIST", value_delimiter = ',')]
    pub assets_extensions: Option<Vec<String>>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub assets: AssetOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the asset listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Enable the plain HTTP redirect listener on this port.
    #[arg(long = "server-redirect-port", value_name = "PORT")]
    pub redirect_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the URL prefix assets are served under.
    #[arg(long = "assets-route-prefix", value_name = "PREFIX")]
    pub assets_route_prefix: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub assets: AssetOverrides,
}
