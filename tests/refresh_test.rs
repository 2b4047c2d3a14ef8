mod common;

use common::{engine, source};
use quarry::engine::{CreateIndexRequest, Engine, EngineConfig, SearchTarget};
use quarry::error::Result;
use quarry::query::QueryNode;
use quarry::schema::{IndexSettings, RefreshInterval};
use serde_json::json;
use std::thread;
use std::time::{Duration, Instant};

fn count(engine: &Engine, index: &str) -> usize {
    engine.count(&SearchTarget::index(index), &QueryNode::MatchAll).unwrap()
}

#[test]
fn test_writes_become_searchable_after_the_interval() -> Result<()> {
    let (engine, clock) = engine();
    engine.create_index("library", CreateIndexRequest::new())?;
    engine.index("library", Some("1"), source(json!({"title": "Think Big"})))?;

    assert_eq!(count(&engine, "library"), 0);
    clock.advance(Duration::from_millis(500));
    assert_eq!(count(&engine, "library"), 0);
    clock.advance(Duration::from_millis(500));
    assert_eq!(count(&engine, "library"), 1);
    assert_eq!(engine.stats("library")?.pending_refreshes, 0);

    Ok(())
}

#[test]
fn test_writes_become_due_in_order() -> Result<()> {
    let (engine, clock) = engine();
    engine.create_index("library", CreateIndexRequest::new())?;
    engine.index("library", Some("1"), source(json!({"title": "first"})))?;
    clock.advance(Duration::from_millis(600));
    engine.index("library", Some("2"), source(json!({"title": "second"})))?;
    clock.advance(Duration::from_millis(400));

    let response = engine
        .search(&SearchTarget::index("library"), &quarry::search::SearchRequest::new())?;
    assert_eq!(response.ids(), vec!["1"]);
    assert_eq!(engine.stats("library")?.pending_refreshes, 1);

    Ok(())
}

#[test]
fn test_get_is_realtime() -> Result<()> {
    let (engine, _) = engine();
    engine.create_index("library", CreateIndexRequest::new())?;
    engine.index("library", Some("1"), source(json!({"title": "Think Big"})))?;

    let get = engine.get("library", "1")?;
    assert!(get.found);
    assert_eq!(get.version, Some(1));
    assert_eq!(count(&engine, "library"), 0);

    Ok(())
}

#[test]
fn test_disabled_interval_waits_for_explicit_refresh() -> Result<()> {
    let (engine, clock) = engine();
    engine
        .create_index_from_json("manual", &json!({"settings": {"refresh_interval": "-1"}}))?;
    engine.index("manual", Some("1"), source(json!({"n": 1})))?;

    clock.advance(Duration::from_secs(3600));
    assert_eq!(count(&engine, "manual"), 0);
    assert_eq!(engine.refresh(&SearchTarget::index("manual"))?, 1);
    assert_eq!(count(&engine, "manual"), 1);

    Ok(())
}

#[test]
fn test_index_interval_overrides_engine_default() -> Result<()> {
    let (engine, clock) = engine();
    engine
        .create_index(
            "slow",
            CreateIndexRequest::new().with_settings(
                IndexSettings::new().with_refresh_interval(RefreshInterval::Every(Duration::from_secs(5))),
            ),
        )?;
    engine.index("slow", Some("1"), source(json!({"n": 1})))?;

    clock.advance(Duration::from_secs(4));
    assert_eq!(count(&engine, "slow"), 0);
    clock.advance(Duration::from_secs(1));
    assert_eq!(count(&engine, "slow"), 1);

    Ok(())
}

#[test]
fn test_background_scheduler_applies_due_writes() -> Result<()> {
    let config = EngineConfig::builder()
        .default_refresh_interval(RefreshInterval::Every(Duration::from_millis(20)))
        .scheduler_tick(Duration::from_millis(5))
        .build();
    let engine = Engine::with_config(config)?;
    engine.create_index("library", CreateIndexRequest::new())?;
    for id in 0..10 {
        engine
            .index("library", Some(&id.to_string()), source(json!({"n": id})))?;
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.stats("library")?.pending_refreshes > 0 {
        assert!(Instant::now() < deadline, "scheduler never applied the writes");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(engine.stats("library")?.searchable_docs, 10);

    Ok(())
}
