//! End-to-end monitor scenarios through the library API: registry on disk,
//! real files, and a running monitor thread.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use serde_json::Value;

use dircap::core::config::Config;
use dircap::daemon::{Monitor, SignalHandler};
use dircap::logger::{JsonlConfig, LogSink, spawn_logger};
use dircap::registry::{EvictionOrder, EvictionPolicy, Registry};

fn test_config(dir: &Path, interval_secs: u64) -> Config {
    let mut config = Config::default();
    config.daemon.interval_secs = interval_secs;
    config.paths.registry_file = dir.join("registry.json");
    config.paths.jsonl_log = dir.join("activity.jsonl");
    config
}

fn write_aged_file(dir: &Path, name: &str, size: usize, age_secs: i64) {
    let path = dir.join(name);
    fs::write(&path, vec![0u8; size]).unwrap();
    let mtime = filetime::FileTime::from_unix_time(1_700_000_000 - age_secs, 0);
    filetime::set_file_mtime(&path, mtime).unwrap();
}

fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    check()
}

#[test]
fn monitor_evicts_oldest_files_until_under_budget() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("cache");
    fs::create_dir(&watched).unwrap();
    write_aged_file(&watched, "oldest", 100, 3_000);
    write_aged_file(&watched, "middle", 200, 2_000);
    write_aged_file(&watched, "newest", 50, 100);

    let config = test_config(dir.path(), 3_600);
    let registry = Registry::open(config.paths.registry_file.clone());
    registry
        .add(&watched, 200, EvictionPolicy::default())
        .unwrap();

    let log_path = config.paths.jsonl_log.clone();
    let (logger, logger_join) = spawn_logger(
        LogSink::Jsonl(JsonlConfig {
            path: log_path.clone(),
            ..JsonlConfig::default()
        }),
        128,
    )
    .unwrap();
    let monitor = Monitor::new(
        config,
        registry.clone(),
        SignalHandler::unregistered(),
        logger.clone(),
    );
    let handle = monitor.start().unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || !watched.join("middle").exists()),
        "eviction did not happen within timeout"
    );
    handle.request_stop();
    handle.join().unwrap();
    logger.shutdown();
    logger_join.join().unwrap();

    // 350 bytes against a 200 budget: the two oldest go, the newest stays.
    assert!(!watched.join("oldest").exists());
    assert!(!watched.join("middle").exists());
    assert!(watched.join("newest").exists());

    let entry = &registry.list().unwrap()[0];
    assert_eq!(entry.last_freed_bytes, 300);
    assert!(entry.last_evicted_at.is_some());

    // The activity log tells the same story.
    let raw = fs::read_to_string(&log_path).unwrap();
    let events: Vec<Value> = raw
        .lines()
        .map(|line| serde_json::from_str(line).expect("every log line is valid JSON"))
        .collect();
    let names: Vec<&str> = events
        .iter()
        .filter_map(|e| e["event"].as_str())
        .collect();
    assert!(names.contains(&"daemon_start"), "events: {names:?}");
    assert!(names.contains(&"entry_scanned"), "events: {names:?}");
    assert!(names.contains(&"eviction_planned"), "events: {names:?}");
    assert!(names.contains(&"file_deleted"), "events: {names:?}");
    assert!(names.contains(&"eviction_end"), "events: {names:?}");
    assert!(names.contains(&"daemon_stop"), "events: {names:?}");
}

#[test]
fn largest_first_policy_prefers_big_files() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("cache");
    fs::create_dir(&watched).unwrap();
    write_aged_file(&watched, "huge", 500, 10);
    write_aged_file(&watched, "old_small", 50, 5_000);
    write_aged_file(&watched, "old_medium", 100, 4_000);

    let config = test_config(dir.path(), 3_600);
    let registry = Registry::open(config.paths.registry_file.clone());
    registry
        .add(
            &watched,
            300,
            EvictionPolicy {
                order: EvictionOrder::LargestFirst,
                margin_bytes: 0,
            },
        )
        .unwrap();

    let (logger, _join) = spawn_logger(LogSink::Stdout, 128).unwrap();
    let monitor = Monitor::new(
        config,
        registry,
        SignalHandler::unregistered(),
        logger,
    );
    let handle = monitor.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || !watched
        .join("huge")
        .exists()));
    handle.request_stop();
    handle.join().unwrap();

    // 650 over 300: deleting the 500-byte file alone suffices, age ignored.
    assert!(watched.join("old_small").exists());
    assert!(watched.join("old_medium").exists());
}

#[test]
fn default_margin_from_config_frees_extra_headroom() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("cache");
    fs::create_dir(&watched).unwrap();
    write_aged_file(&watched, "a", 100, 3_000);
    write_aged_file(&watched, "b", 100, 2_000);
    write_aged_file(&watched, "c", 100, 1_000);

    let mut config = test_config(dir.path(), 3_600);
    config.daemon.default_margin_bytes = 150;
    let registry = Registry::open(config.paths.registry_file.clone());
    // 300 total, budget 250: bare over_by is 50 (one file), but the margin
    // asks for 200 in total, which takes two files.
    registry
        .add(&watched, 250, EvictionPolicy::default())
        .unwrap();

    let (logger, _join) = spawn_logger(LogSink::Stdout, 128).unwrap();
    let monitor = Monitor::new(
        config,
        registry.clone(),
        SignalHandler::unregistered(),
        logger,
    );
    let handle = monitor.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || !watched
        .join("b")
        .exists()));
    handle.request_stop();
    handle.join().unwrap();

    assert!(!watched.join("a").exists());
    assert!(!watched.join("b").exists());
    assert!(watched.join("c").exists());
    assert_eq!(registry.list().unwrap()[0].last_freed_bytes, 200);
}

#[test]
fn stop_between_cycles_is_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 3_600);
    let registry = Registry::open(config.paths.registry_file.clone());

    let (logger, _join) = spawn_logger(LogSink::Stdout, 128).unwrap();
    let monitor = Monitor::new(config, registry, SignalHandler::unregistered(), logger);
    let handle = monitor.start().unwrap();

    // The first cycle over an empty registry finishes immediately; the loop
    // then sits in its interval sleep, which must notice the stop quickly.
    std::thread::sleep(Duration::from_millis(200));
    let stop_requested = Instant::now();
    handle.request_stop();
    handle.join().unwrap();
    assert!(
        stop_requested.elapsed() < Duration::from_secs(2),
        "stop took {:?}",
        stop_requested.elapsed()
    );
}

#[test]
fn registry_changes_are_picked_up_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let watched = dir.path().join("cache");
    fs::create_dir(&watched).unwrap();
    write_aged_file(&watched, "junk", 400, 1_000);

    // Short interval so the follow-up cycle happens within the test timeout.
    let config = test_config(dir.path(), 1);
    let registry = Registry::open(config.paths.registry_file.clone());

    let (logger, _join) = spawn_logger(LogSink::Stdout, 128).unwrap();
    let monitor = Monitor::new(
        config,
        registry.clone(),
        SignalHandler::unregistered(),
        logger,
    );
    let handle = monitor.start().unwrap();

    // First cycles see an empty registry. Register the directory while the
    // daemon is already running, as the CLI would.
    std::thread::sleep(Duration::from_millis(100));
    registry
        .add(&watched, 100, EvictionPolicy::default())
        .unwrap();

    assert!(
        wait_until(Duration::from_secs(10), || !watched.join("junk").exists()),
        "entry added at runtime was never evicted"
    );
    handle.request_stop();
    handle.join().unwrap();
}
