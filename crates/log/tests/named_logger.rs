//! Named logger integration tests.
//!
//! Each test builds its own logger into a temp directory, emits through
//! `in_scope`, drops the logger to flush, then inspects the file.

use pretty_assertions::assert_eq;
use rstest::rstest;
use strata_log::{Config, Format, LoggerBuilder};

fn read_after_drop(logger: strata_log::NamedLogger) -> String {
    let path = logger.file().to_path_buf();
    drop(logger);
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn json_logger_writes_one_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::from_config(Config::production())
        .build_named(dir.path(), "orders")
        .unwrap();

    logger.in_scope(|| strata_log::info!(order_id = 7, "order placed"));

    let contents = read_after_drop(logger);
    let line = contents.lines().next().expect("one line written");
    assert!(line.starts_with('{'), "expected JSON, got {line}");
    assert!(line.contains("\"order placed\""));
    assert!(line.contains("\"order_id\":7"));
}

#[test]
fn level_filter_applies_per_logger() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::from_config(Config::production())
        .build_named(dir.path(), "quiet")
        .unwrap();

    logger.in_scope(|| {
        strata_log::debug!("hidden at info level");
        strata_log::warn!("visible");
    });

    let contents = read_after_drop(logger);
    assert!(!contents.contains("hidden at info level"));
    assert!(contents.contains("visible"));
}

#[test]
fn events_outside_scope_do_not_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let logger = LoggerBuilder::from_config(Config::test())
        .build_named(dir.path(), "scoped")
        .unwrap();

    strata_log::info!("goes to the global default, not the file");
    logger.in_scope(|| strata_log::info!("inside"));

    let contents = read_after_drop(logger);
    assert!(contents.contains("inside"));
    assert!(!contents.contains("global default"));
}

#[rstest]
#[case(Format::Pretty)]
#[case(Format::Compact)]
#[case(Format::Json)]
fn every_format_writes_to_name_dot_log(#[case] format: Format) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        format,
        ..Config::test()
    };
    let logger = LoggerBuilder::from_config(config)
        .build_named(dir.path(), "fmt")
        .unwrap();

    assert_eq!(logger.name(), "fmt");
    assert_eq!(logger.file(), dir.path().join("fmt.log"));

    logger.in_scope(|| strata_log::info!("hello"));
    assert!(read_after_drop(logger).contains("hello"));
}
