//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use quarry::document::Source;
use quarry::engine::{BulkRequest, Engine, EngineConfig, ManualClock, SearchTarget};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

pub const BANK_SIZE: usize = 1000;

/// States with a skewed distribution: the first entries are far more common.
const STATES: &[(&str, u32)] = &[
    ("TX", 60),
    ("MD", 45),
    ("ID", 40),
    ("AL", 35),
    ("ME", 30),
    ("TN", 28),
    ("WY", 26),
    ("IL", 24),
    ("PA", 22),
    ("MO", 20),
    ("OK", 18),
    ("VA", 16),
    ("WA", 14),
    ("ND", 12),
    ("NV", 10),
    ("OR", 9),
    ("AR", 8),
    ("UT", 7),
    ("VT", 6),
    ("NH", 5),
    ("MN", 4),
    ("RI", 3),
    ("KY", 2),
    ("DE", 1),
];

const FIRST_NAMES: &[&str] = &[
    "Amber", "Hattie", "Nanette", "Dale", "Elinor", "Virginia", "Dillard", "Mcgee", "Aurelia",
    "Fulton", "Burton", "Josie", "Hughes", "Hall", "Garrett", "Effie",
];

const EMPLOYERS: &[&str] = &["Pyrami", "Netagy", "Quility", "Boink", "Scentric", "Filodyne", "Quailcom"];

fn pick_state(rng: &mut StdRng) -> &'static str {
    let total: u32 = STATES.iter().map(|(_, weight)| weight).sum();
    let mut roll = rng.random_range(0..total);
    for (state, weight) in STATES {
        if roll < *weight {
            return state;
        }
        roll -= weight;
    }
    STATES[0].0
}

/// The bank accounts, `account_number` 0 to 999, always in the same order
/// with the same values.
pub fn bank_accounts() -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..BANK_SIZE)
        .map(|account_number| {
            let firstname = FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())];
            json!({
                "account_number": account_number,
                "balance": rng.random_range(1000..50_000),
                "firstname": firstname,
                "age": rng.random_range(20..=40),
                "gender": if rng.random_bool(0.5) { "M" } else { "F" },
                "employer": EMPLOYERS[rng.random_range(0..EMPLOYERS.len())],
                "email": format!("{}{account_number}@example.com", firstname.to_lowercase()),
                "state": pick_state(&mut rng),
            })
        })
        .collect()
}

/// The bank accounts in the bulk format, with numeric `_id`s and the legacy
/// `_type` key.
pub fn bank_ndjson() -> String {
    let mut body = String::new();
    for account in bank_accounts() {
        let action = json!({"index": {"_type": "_doc", "_id": account["account_number"]}});
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&account.to_string());
        body.push('\n');
    }
    body
}

pub fn source(value: Value) -> Source {
    value.as_object().cloned().expect("source must be an object")
}

/// An engine without a background scheduler, driven by a manual clock.
pub fn engine() -> (Engine, ManualClock) {
    let clock = ManualClock::new();
    let config = EngineConfig::builder().background_refresh(false).build();
    let engine = Engine::with_clock(config, Arc::new(clock.clone())).expect("engine starts");
    (engine, clock)
}

/// Create `bank` with five shards, load every account and refresh.
pub fn load_bank(engine: &Engine) {
    engine
        .create_index_from_json(
            "bank",
            &json!({"settings": {"number_of_shards": 5, "number_of_replicas": 0}}),
        )
        .unwrap();
    let request = BulkRequest::from_ndjson(&bank_ndjson()).unwrap();
    let response = engine.bulk(Some("bank"), request);
    assert!(!response.errors);
    engine.refresh(&SearchTarget::index("bank")).unwrap();
}

pub const LIBRARY_BOOKS: &[(&str, &str, &str, u32)] = &[
    (
        "1",
        "Magic Of Thinking Big",
        "Millions of people throughout the world have improved their lives using The Magic of Thinking Big. \
         Dr. David J. Schwartz, long regarded as one of the foremost experts on motivation, will help you \
         sell better, manage better, earn more money, and find greater happiness and peace of mind.",
        20,
    ),
    (
        "2",
        "The Power of Positive Thinking",
        "The book describes the power positive thinking has and how a firm belief in something, does \
         actually help in achieving it",
        30,
    ),
    (
        "3",
        "Think and Grow Rich",
        "Think And Grow Rich has earned itself the reputation of being considered a textbook for actionable \
         techniques that can help one get better at doing anything, not just by rich and wealthy, but also \
         by people doing wonderful work in their respective fields.",
        10,
    ),
    (
        "4",
        "The Magic of thinking Big",
        "First published in 1959, David J Schwartz's classic teachings are as powerful today as they were \
         then. Practical, empowering and hugely engaging, this book will not only inspire you, it will give \
         you the tools to change your life for the better - starting from now.",
        12,
    ),
    (
        "5",
        "How to Stop Worrying and Start Living",
        "The book is written to help readers by changing their habit of worrying. The author Dale Carnegie \
         has shared his personal experiences, wherein he was mostly unsatisfied and worried about lot of \
         life situations.",
        14,
    ),
    (
        "6",
        "Practicing The Power Of Now",
        "To make the journey into The Power of Now we will need to leave our analytical mind and its false \
         created self, the ego, behind.",
        15,
    ),
];

/// Create `library` with a percolator field, store the `thinking-books`
/// query and bulk-load the books. Nothing is refreshed.
pub fn load_library(engine: &Engine) {
    engine
        .create_index_from_json(
            "library",
            &json!({
                "settings": {"number_of_shards": 1, "number_of_replicas": 0},
                "mappings": {
                    "book": {
                        "properties": {
                            "title": {"type": "text"},
                            "description": {"type": "text"},
                            "price": {"type": "integer"},
                            "query": {"type": "percolator"}
                        }
                    }
                }
            }),
        )
        .unwrap();
    engine
        .create(
            "library",
            Some("thinking-books"),
            source(json!({"query": {"match": {"title": "Thinking"}}})),
        )
        .unwrap();

    let mut request = BulkRequest::new();
    for (id, title, description, price) in LIBRARY_BOOKS {
        request = request.index(
            "library",
            *id,
            source(json!({"title": title, "description": description, "price": price})),
        );
    }
    let response = engine.bulk(None, request);
    assert!(!response.errors);
}
