mod common;

use common::{engine, load_library, source};
use quarry::engine::SearchTarget;
use quarry::error::QuarryError;
use quarry::search::SearchRequest;
use serde_json::{Value, json};
use std::time::Duration;

fn percolate(engine: &quarry::engine::Engine, body: Value) -> quarry::search::SearchResponse {
    let request = SearchRequest::from_json(&json!({ "query": { "percolate": body } })).unwrap();
    engine.search(&SearchTarget::index("library"), &request).unwrap()
}

#[test]
fn test_percolate_existing_document() {
    let (engine, clock) = engine();
    load_library(&engine);
    clock.advance(Duration::from_secs(2));

    let response = percolate(
        &engine,
        json!({"field": "query", "index": "library", "type": "book", "id": 1}),
    );
    assert_eq!(response.total, 1);
    assert_eq!(response.hits[0].id, "thinking-books");
    assert_eq!(response.hits[0].percolator_slots, Some(vec![1]));

    let json = response.to_json();
    assert_eq!(
        json["hits"]["hits"][0]["fields"]["_percolator_document_slot"],
        json!([1])
    );
}

#[test]
fn test_percolate_inline_documents() {
    let (engine, clock) = engine();
    load_library(&engine);
    clock.advance(Duration::from_secs(2));

    let single = percolate(
        &engine,
        json!({"field": "query", "documents": [
            {"title": "Magic Of Thinking Big", "description": "Millions of people"}
        ]}),
    );
    assert_eq!(single.ids(), vec!["thinking-books"]);
    assert_eq!(single.hits[0].percolator_slots, Some(vec![1]));

    let several = percolate(
        &engine,
        json!({"field": "query", "documents": [
            {"title": "How to Stop Worrying"},
            {"title": "Positive Thinking"},
            {"title": "Thinking, Fast and Slow"}
        ]}),
    );
    assert_eq!(several.ids(), vec!["thinking-books"]);
    assert_eq!(several.hits[0].percolator_slots, Some(vec![2, 3]));

    let none = percolate(&engine, json!({"field": "query", "document": {"title": "Cooking"}}));
    assert_eq!(none.total, 0);
}

#[test]
fn test_stored_query_needs_a_refresh() {
    let (engine, clock) = engine();
    load_library(&engine);

    let document = json!({"field": "query", "document": {"title": "Thinking"}});
    assert_eq!(percolate(&engine, document.clone()).total, 0);
    clock.advance(Duration::from_millis(999));
    assert_eq!(percolate(&engine, document.clone()).total, 0);
    clock.advance(Duration::from_millis(1));
    assert_eq!(percolate(&engine, document).total, 1);
}

#[test]
fn test_replaced_and_deleted_queries() {
    let (engine, clock) = engine();
    load_library(&engine);
    engine
        .index(
            "library",
            Some("price-watch"),
            source(json!({"query": {"range": {"price": {"gte": 25}}}})),
        )
        .unwrap();
    clock.advance(Duration::from_secs(1));

    let doc = json!({"field": "query", "document": {"title": "Thinking Big", "price": 30}});
    assert_eq!(percolate(&engine, doc.clone()).ids(), vec!["price-watch", "thinking-books"]);

    engine
        .index(
            "library",
            Some("price-watch"),
            source(json!({"query": {"range": {"price": {"gte": 50}}}})),
        )
        .unwrap();
    engine.delete("library", "thinking-books").unwrap();
    clock.advance(Duration::from_secs(1));
    assert_eq!(percolate(&engine, doc).total, 0);
}

#[test]
fn test_invalid_percolator_queries() {
    let (engine, _) = engine();
    load_library(&engine);

    let err = engine
        .index("library", Some("broken"), source(json!({"query": {"no_such_query": {}}})))
        .unwrap_err();
    assert!(matches!(err, QuarryError::InvalidQuery(_)));

    let request = SearchRequest::from_json(&json!({"query": {"percolate": {
        "field": "query", "index": "library", "id": "missing"
    }}}))
    .unwrap();
    assert!(engine.search(&SearchTarget::index("library"), &request).unwrap_err().is_not_found());
}
