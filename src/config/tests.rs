use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(20));
    assert_eq!(settings.cache.capacity.get(), 256);
    assert_eq!(settings.pagination.page_size.get(), 10);
    assert_eq!(settings.auth.user_header.as_str(), "x-remote-user");
    assert_eq!(settings.auth.login_url, "/auth/login/");
    assert!(settings.database.url.is_none());
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
fn cache_can_be_disabled_from_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_index_ttl_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(5));
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.pagination.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero page size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "pagination.page_size",
            ..
        }
    ));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.index_ttl_seconds = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_user_header_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.user_header = Some("bad header".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid header");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.user_header",
            ..
        }
    ));
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn database_override_applies_to_migrate() {
    let mut raw = RawSettings::default();
    raw.apply_database_override(&DatabaseOverride {
        database_url: Some("postgres://localhost/yatube".to_string()),
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://localhost/yatube")
    );
}

#[test]
fn cli_parses_group_creation() {
    let args = CliArgs::try_parse_from([
        "yatube",
        "groups",
        "create",
        "--title",
        "Лев Толстой",
        "--description",
        "Classics",
    ])
    .expect("valid cli");

    match args.command {
        Some(Command::Groups(GroupsArgs {
            command: GroupsCommand::Create(create),
        })) => {
            assert_eq!(create.title, "Лев Толстой");
            assert_eq!(create.description, "Classics");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
