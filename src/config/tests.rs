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
fn defaults_match_the_published_contract() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 5000);
    assert_eq!(settings.values.ceiling, 40);
    assert_eq!(settings.values.placeholder, "Nothing yet!");
    assert_eq!(settings.redis.hash_key, "values");
    assert_eq!(settings.redis.channel, "insert");
    assert_eq!(settings.redis.reconnect_interval, Duration::from_millis(1000));
    assert!(matches!(settings.database.ssl_mode, PgSslMode::Prefer));
    assert!(settings.database.url.is_none());
}

#[test]
fn blank_database_url_is_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
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
fn zero_reconnect_interval_is_rejected() {
    let mut raw = RawSettings::default();
    raw.redis.reconnect_interval_ms = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero interval rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "redis.reconnect_interval_ms",
            ..
        }
    ));
}

#[test]
fn unknown_ssl_mode_is_rejected() {
    let mut raw = RawSettings::default();
    raw.database.ssl_mode = Some("sometimes".to_string());

    let err = Settings::from_raw(raw).expect_err("bad ssl mode rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "database.ssl_mode",
            ..
        }
    ));
}

#[test]
fn negative_ceiling_is_rejected() {
    let mut raw = RawSettings::default();
    raw.values.ceiling = Some(-1);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn values_policy_combines_sections() {
    let mut raw = RawSettings::default();
    raw.redis.channel = Some("jobs".to_string());
    raw.values.ceiling = Some(12);

    let policy = Settings::from_raw(raw)
        .expect("valid settings")
        .values_policy();

    assert_eq!(policy.channel, "jobs");
    assert_eq!(policy.ceiling, 12);
    assert_eq!(policy.placeholder, "Nothing yet!");
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["values-api"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "values-api",
        "serve",
        "--server-host",
        "127.0.0.1",
        "--database-url",
        "postgres://override",
        "--redis-url",
        "redis://cache:6379/",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("127.0.0.1"));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(
                serve.overrides.redis_url.as_deref(),
                Some("redis://cache:6379/")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_init_db_arguments() {
    let args = CliArgs::parse_from([
        "values-api",
        "init-db",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("init-db command") {
        Command::InitDb(init) => {
            assert_eq!(
                init.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
