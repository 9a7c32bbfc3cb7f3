//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::HashSet, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{AssetOverrides, CliArgs, Command, InspectArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const ENV_PREFIX: &str = "VITRINE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 5;
const DEFAULT_ASSET_ROOT: &str = "static";
const DEFAULT_EXTENSIONS: [&str; 3] = [".html", ".css", ".js"];
const DEFAULT_ROUTE_PREFIX: &str = "/static";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub assets: AssetSettings,
    pub pages: Vec<PageRoute>,
    pub tls: TlsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    /// Plain HTTP listener that redirects everything to HTTPS.
    pub redirect_addr: Option<SocketAddr>,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    /// Normalized: empty, or a leading `/` with no trailing `/`.
    pub route_prefix: String,
}

/// A fixed route answered with one cached asset and a no-store policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub route: String,
    pub asset: String,
}

#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    pub domains: Vec<String>,
    pub certificate_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("assets.extensions")
            .with_list_parse_key("tls.domains"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Inspect(args)) => raw.apply_asset_overrides(&args.assets),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    assets: RawAssetSettings,
    pages: Vec<RawPageRoute>,
    tls: RawTlsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.redirect_port {
            self.server.redirect_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(prefix) = overrides.assets_route_prefix.as_ref() {
            self.assets.route_prefix = Some(prefix.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_asset_overrides(&overrides.assets);
    }

    fn apply_asset_overrides(&mut self, overrides: &AssetOverrides) {
        if let Some(root) = overrides.assets_root.as_ref() {
            self.assets.root = Some(root.clone());
        }
        if let Some(extensions) = overrides.assets_extensions.as_ref() {
            self.assets.extensions = Some(extensions.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            assets,
            pages,
            tls,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let assets = build_asset_settings(assets)?;
        let pages = build_page_routes(pages)?;
        let tls = build_tls_settings(tls)?;

        Ok(Self {
            server,
            logging,
            assets,
            pages,
            tls,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;

    let redirect_addr = match server.redirect_port {
        None => None,
        Some(0) => {
            return Err(LoadError::invalid(
                "server.redirect_port",
                "port must be greater than zero",
            ));
        }
        Some(port) if port == public_port => {
            return Err(LoadError::invalid(
                "server.redirect_port",
                "must differ from server.public_port",
            ));
        }
        Some(port) => Some(
            parse_socket_addr(&host, port)
                .map_err(|reason| LoadError::invalid("server.redirect_addr", reason))?,
        ),
    };

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        redirect_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let root = assets
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid("assets.root", "path must not be empty"));
    }

    let extensions = match assets.extensions {
        Some(values) => {
            let trimmed: Vec<String> = values.iter().map(|ext| ext.trim().to_string()).collect();
            if trimmed.is_empty() {
                return Err(LoadError::invalid(
                    "assets.extensions",
                    "at least one extension is required",
                ));
            }
            if trimmed.iter().any(String::is_empty) {
                return Err(LoadError::invalid(
                    "assets.extensions",
                    "extensions must not be empty",
                ));
            }
            trimmed
        }
        None => DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
    };

    let route_prefix = normalize_route_prefix(
        assets
            .route_prefix
            .as_deref()
            .unwrap_or(DEFAULT_ROUTE_PREFIX),
    );
    if route_prefix.contains(['{', '}', '*']) {
        return Err(LoadError::invalid(
            "assets.route_prefix",
            "must not contain route parameters",
        ));
    }

    Ok(AssetSettings {
        root,
        extensions,
        route_prefix,
    })
}

fn build_page_routes(pages: Vec<RawPageRoute>) -> Result<Vec<PageRoute>, LoadError> {
    let mut seen = HashSet::new();
    let mut routes = Vec::with_capacity(pages.len());

    for page in pages {
        let route = page.route.unwrap_or_default().trim().to_string();
        if !route.starts_with('/') {
            return Err(LoadError::invalid(
                "pages.route",
                format!("route `{route}` must start with `/`"),
            ));
        }
        if route.contains(['{', '}', '*']) {
            return Err(LoadError::invalid(
                "pages.route",
                format!("route `{route}` must not contain route parameters"),
            ));
        }

        let asset = page
            .asset
            .unwrap_or_default()
            .trim()
            .trim_start_matches('/')
            .to_string();
        if asset.is_empty() {
            return Err(LoadError::invalid(
                "pages.asset",
                format!("route `{route}` has no asset"),
            ));
        }

        if !seen.insert(route.clone()) {
            return Err(LoadError::invalid(
                "pages.route",
                format!("route `{route}` is declared more than once"),
            ));
        }

        routes.push(PageRoute { route, asset });
    }

    Ok(routes)
}

fn build_tls_settings(tls: RawTlsSettings) -> Result<TlsSettings, LoadError> {
    let domains: Vec<String> = tls
        .domains
        .unwrap_or_default()
        .into_iter()
        .map(|domain| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
        .collect();

    let certificate_dir = tls.certificate_dir.filter(|dir| !dir.as_os_str().is_empty());
    if !domains.is_empty() && certificate_dir.is_none() {
        return Err(LoadError::invalid(
            "tls.certificate_dir",
            "required when tls.domains is set",
        ));
    }

    Ok(TlsSettings {
        domains,
        certificate_dir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    public_port: Option<u16>,
    redirect_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    root: Option<PathBuf>,
    extensions: Option<Vec<String>>,
    route_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPageRoute {
    route: Option<String>,
    asset: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTlsSettings {
    domains: Option<Vec<String>>,
    certificate_dir: Option<PathBuf>,
}

fn normalize_route_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
