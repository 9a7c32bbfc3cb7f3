use clap::Parser;

use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert!(settings.server.redirect_addr.is_none());
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(5));
    assert_eq!(settings.assets.root, PathBuf::from("static"));
    assert_eq!(settings.assets.extensions, vec![".html", ".css", ".js"]);
    assert_eq!(settings.assets.route_prefix, "/static");
    assert!(settings.pages.is_empty());
    assert!(settings.tls.domains.is_empty());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.assets.extensions = Some(vec![".html".to_string()]);

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        assets: AssetOverrides {
            assets_extensions: Some(vec![".css".to_string(), ".svg".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.assets.extensions, vec![".css", ".svg"]);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn redirect_port_must_differ_from_public_port() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(8443);
    raw.server.redirect_port = Some(8443);

    let err = Settings::from_raw(raw).expect_err("conflicting ports");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "server.redirect_port",
            ..
        }
    ));
}

#[test]
fn redirect_port_builds_address_on_same_host() {
    let mut raw = RawSettings::default();
    raw.server.host = Some("0.0.0.0".to_string());
    raw.server.redirect_port = Some(8081);

    let settings = Settings::from_raw(raw).expect("valid settings");
    let redirect = settings.server.redirect_addr.expect("redirect address");
    assert_eq!(redirect.to_string(), "0.0.0.0:8081");
}

#[test]
fn zero_graceful_shutdown_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.graceful_shutdown_seconds = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn route_prefix_is_normalized() {
    assert_eq!(normalize_route_prefix("assets/"), "/assets");
    assert_eq!(normalize_route_prefix("/assets"), "/assets");
    assert_eq!(normalize_route_prefix("//a/b//"), "/a/b");
    assert_eq!(normalize_route_prefix("/"), "");
    assert_eq!(normalize_route_prefix(""), "");
}

#[test]
fn empty_extension_entry_is_rejected() {
    let mut raw = RawSettings::default();
    raw.assets.extensions = Some(vec![".html".to_string(), " ".to_string()]);

    let err = Settings::from_raw(raw).expect_err("blank extension");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "assets.extensions",
            ..
        }
    ));
}

#[test]
fn empty_extension_list_is_rejected() {
    let mut raw = RawSettings::default();
    raw.assets.extensions = Some(Vec::new());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn pages_require_leading_slash() {
    let mut raw = RawSettings::default();
    raw.pages = vec![RawPageRoute {
        route: Some("about".to_string()),
        asset: Some("about.html".to_string()),
    }];

    let err = Settings::from_raw(raw).expect_err("relative route");
    assert!(matches!(err, LoadError::Invalid { key: "pages.route", .. }));
}

#[test]
fn duplicate_page_routes_are_rejected() {
    let page = RawPageRoute {
        route: Some("/".to_string()),
        asset: Some("index.html".to_string()),
    };
    let mut raw = RawSettings::default();
    raw.pages = vec![page.clone(), page];

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn page_asset_is_stored_as_canonical_path() {
    let mut raw = RawSettings::default();
    raw.pages = vec![RawPageRoute {
        route: Some("/".to_string()),
        asset: Some("/index.html".to_string()),
    }];

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.pages,
        vec![PageRoute {
            route: "/".to_string(),
            asset: "index.html".to_string(),
        }]
    );
}

#[test]
fn tls_domains_need_certificate_dir() {
    let mut raw = RawSettings::default();
    raw.tls.domains = Some(vec!["Example.org".to_string()]);

    assert!(Settings::from_raw(raw.clone()).is_err());

    raw.tls.certificate_dir = Some(PathBuf::from("/etc/vitrine/certs"));
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.tls.domains, vec!["example.org"]);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["vitrine"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "vitrine",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--server-redirect-port",
        "80",
        "--assets-extensions",
        ".html,.svg",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.redirect_port, Some(80));
            assert_eq!(
                serve.overrides.assets.assets_extensions,
                Some(vec![".html".to_string(), ".svg".to_string()])
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_inspect_arguments() {
    let args = CliArgs::parse_from(["vitrine", "inspect", "--assets-root", "/srv/www"]);

    match args.command.expect("inspect command") {
        Command::Inspect(inspect) => {
            assert_eq!(
                inspect.assets.assets_root,
                Some(PathBuf::from("/srv/www"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
