use std::io::Write;

use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert!(settings.transport.endpoint.is_none());
    assert_eq!(settings.transport.timeout, Duration::from_millis(10_000));
    assert_eq!(settings.cache.max_entries.get(), 1000);
    assert_eq!(settings.cache.sweep_interval.get(), 100);
    assert_eq!(settings.cache.coalesce_window, Duration::from_millis(5));
    assert_eq!(settings.pages.structure_ttl, Duration::from_secs(1800));
    assert_eq!(settings.pages.section_ttl, Duration::from_secs(120));
    assert_eq!(settings.pages.menu_ttl, Duration::from_secs(3600));
    assert!(settings.pages.heavy_media_kinds.contains("VIDEO"));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.transport.timeout_ms = Some(2_000);
    raw.transport.tenant = Some("acme".to_string());
    raw.logging.level = Some("info".to_string());

    let overrides = Overrides {
        timeout_ms: Some(750),
        tenant: Some("globex".to_string()),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.transport.timeout, Duration::from_millis(750));
    assert_eq!(settings.transport.tenant.as_deref(), Some("globex"));
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = Overrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.max_entries = Some(0);

    let error = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        error,
        LoadError::Invalid {
            key: "cache.max_entries",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.cache.coalesce_window_ms = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn endpoint_must_be_http() {
    let mut raw = RawSettings::default();
    raw.transport.endpoint = Some("ftp://cms.example/graphql".to_string());

    let error = Settings::from_raw(raw).expect_err("bad scheme");
    assert!(error.to_string().contains("transport.endpoint"));
}

#[test]
fn blank_tenant_and_lists_are_normalised() {
    let mut raw = RawSettings::default();
    raw.transport.tenant = Some("   ".to_string());
    raw.transport.lenient_operations = Some(vec![
        " PageStructure ".to_string(),
        String::new(),
        "PageStructure".to_string(),
    ]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.transport.tenant.is_none());
    assert_eq!(
        settings.transport.lenient_operations,
        BTreeSet::from(["PageStructure".to_string()])
    );
}

#[test]
fn empty_heavy_media_kinds_are_rejected() {
    let mut raw = RawSettings::default();
    raw.pages.heavy_media_kinds = Some(vec![" ".to_string()]);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn config_file_layer_is_read() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        r#"
[transport]
endpoint = "https://cms.example/graphql"

[cache]
max_entries = 42

[pages]
heavy_media_kinds = ["VIDEO", "AUDIO"]
"#
    )
    .expect("write config");

    let raw = load_raw(Some(file.path())).expect("raw settings");
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(
        settings.transport.endpoint.as_ref().map(Url::as_str),
        Some("https://cms.example/graphql")
    );
    assert_eq!(settings.cache.max_entries.get(), 42);
    assert_eq!(settings.pages.heavy_media_kinds.len(), 2);
}

#[test]
fn parse_page_arguments() {
    let args = CliArgs::parse_from([
        "vitrine",
        "page",
        "home",
        "--repeat",
        "3",
        "--preload",
        "--endpoint",
        "http://localhost:4000/graphql",
    ]);

    match args.command {
        Command::Page(page) => {
            assert_eq!(page.page_id, "home");
            assert_eq!(page.repeat, 3);
            assert!(page.preload);
            assert_eq!(
                page.overrides.endpoint.as_deref(),
                Some("http://localhost:4000/graphql")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_menu_arguments() {
    let args = CliArgs::parse_from(["vitrine", "menu", "header", "footer", "--log-json", "yes"]);

    match args.command {
        Command::Menu(menu) => {
            assert_eq!(menu.locations, vec!["header", "footer"]);
            assert_eq!(menu.overrides.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn repeat_must_be_positive() {
    let result = CliArgs::try_parse_from(["vitrine", "page", "home", "--repeat", "0"]);
    assert!(result.is_err());
}
