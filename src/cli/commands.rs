//! Command implementations for the Quarry CLI.
//!
//! Every command runs against a fresh in-memory engine: the index is created,
//! bulk files are loaded and refreshed, then the command reads from it.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::analysis::{Analyzer, KeywordAnalyzer, StandardAnalyzer};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::engine::{BulkRequest, Engine, EngineConfig, SearchTarget};
use crate::error::{QuarryError, Result};
use crate::search::SearchRequest;

/// Execute a CLI command, writing its output to stdout.
pub fn execute_command(args: QuarryArgs) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_command(&args, &mut out)
}

/// Execute a CLI command, writing its output to `out`.
pub fn run_command<W: Write>(args: &QuarryArgs, out: &mut W) -> Result<()> {
    match &args.command {
        Command::Search(search_args) => {
            let (engine, target) = load(args, &search_args.load)?;
            let request = build_request(search_args, engine.config())?;
            let response = engine.search(&target, &request)?;
            output_search(out, &response, args)
        }
        Command::Count(search_args) => {
            let (engine, target) = load(args, &search_args.load)?;
            let request = build_request(search_args, engine.config())?;
            let count = engine.count(&target, &request.query)?;
            output_count(out, count, args)
        }
        Command::Stats(load_args) => {
            let (engine, _) = load(args, load_args)?;
            output_stats(out, &engine.stats(&load_args.index)?, args)
        }
        Command::Analyze(analyze_args) => analyze(analyze_args, args, out),
    }
}

fn engine_config(args: &QuarryArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    // Loading ends with an explicit refresh, a scheduler thread is not needed.
    config.background_refresh = false;
    Ok(config)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Create the index, load the bulk files into it and refresh.
fn load(args: &QuarryArgs, load_args: &LoadArgs) -> Result<(Engine, SearchTarget)> {
    let engine = Engine::with_config(engine_config(args)?)?;
    let index = load_args.index.as_str();
    let body = match &load_args.create_file {
        Some(path) => read_json(path)?,
        None => Value::Null,
    };
    engine.create_index_from_json(index, &body)?;

    for path in &load_args.bulk_files {
        let request = BulkRequest::from_ndjson(&fs::read_to_string(path)?)?;
        let response = engine.bulk(Some(index), request);
        let failed = response.items.iter().filter(|item| item.is_failure()).count();
        if failed > 0 {
            tracing::warn!("{failed} of {} bulk item(s) in {} failed", response.items.len(), path.display());
        }
        tracing::info!("loaded {} bulk item(s) from {}", response.items.len(), path.display());
    }

    let target = SearchTarget::index(index);
    let applied = engine.refresh(&target)?;
    tracing::debug!("refreshed {applied} write(s) into [{index}]");
    Ok((engine, target))
}

fn build_request(args: &SearchArgs, config: &EngineConfig) -> Result<SearchRequest> {
    let mut request = match &args.body_file {
        Some(path) => SearchRequest::from_json_with_defaults(
            &read_json(path)?,
            config.default_search_size,
            config.default_terms_size,
        )?,
        None => SearchRequest::new().with_size(config.default_search_size),
    };
    if let Some(q) = &args.q {
        request = request.with_q(q)?;
    }
    if let Some(sort) = &args.sort {
        request = request.with_sort_param(sort)?;
    }
    if let Some(size) = args.size {
        request = request.with_size(size);
    }
    if let Some(from) = args.from {
        request = request.with_from(from);
    }
    Ok(request)
}

fn analyze<W: Write>(analyze_args: &AnalyzeArgs, args: &QuarryArgs, out: &mut W) -> Result<()> {
    let analyzer: Box<dyn Analyzer> = match analyze_args.analyzer {
        AnalyzerKind::Standard => Box::new(StandardAnalyzer::new()?),
        AnalyzerKind::Keyword => Box::new(KeywordAnalyzer::new()),
    };
    let tokens = analyzer.tokens(&analyze_args.text)?;
    if tokens.is_empty() && analyze_args.text.trim().is_empty() {
        return Err(QuarryError::invalid_request("nothing to analyze"));
    }
    output_tokens(out, &tokens, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const ACCOUNTS: &str = r#"{"index":{"_id":"1"}}
{"account_number":1,"firstname":"Amber","balance":39225,"state":"IL"}
{"index":{"_id":"6"}}
{"account_number":6,"firstname":"Hattie","balance":5686,"state":"TN"}
{"index":{"_id":"13"}}
{"account_number":13,"firstname":"Nanette","balance":32838,"state":"VA"}
"#;

    fn bulk_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("accounts.json");
        fs::write(&path, ACCOUNTS).unwrap();
        path
    }

    fn run(argv: &[&str]) -> Value {
        let args = QuarryArgs::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        run_command(&args, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_search_sorted() {
        let dir = TempDir::new().unwrap();
        let bulk = bulk_file(&dir);
        let bulk = bulk.to_str().unwrap();
        let response = run(&[
            "quarry", "search", "bank", "--bulk", bulk, "-Q", "*", "--sort", "account_number:desc",
        ]);
        assert_eq!(response["hits"]["total"]["value"], json!(3));
        let ids: Vec<&str> = response["hits"]["hits"]
            .as_array()
            .unwrap()
            .iter()
            .map(|hit| hit["_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["13", "6", "1"]);
    }

    #[test]
    fn test_search_with_body() {
        let dir = TempDir::new().unwrap();
        let bulk = bulk_file(&dir);
        let body = dir.path().join("query.json");
        fs::write(
            &body,
            r#"{"query":{"range":{"balance":{"gte":10000}}},"size":0,"aggs":{"states":{"terms":{"field":"state.keyword"}}}}"#,
        )
        .unwrap();
        let response = run(&[
            "quarry",
            "search",
            "bank",
            "--bulk",
            bulk.to_str().unwrap(),
            "--body",
            body.to_str().unwrap(),
        ]);
        assert_eq!(response["hits"]["total"]["value"], json!(2));
        assert_eq!(response["hits"]["hits"], json!([]));
        assert_eq!(
            response["aggregations"]["states"]["buckets"].as_array().unwrap().len(),
            2
        );
    }

    #[test]
    fn test_count_and_stats() {
        let dir = TempDir::new().unwrap();
        let bulk = bulk_file(&dir);
        let bulk = bulk.to_str().unwrap();
        let count = run(&["quarry", "count", "bank", "--bulk", bulk, "-Q", "state:TN"]);
        assert_eq!(count["count"], json!(1));

        let stats = run(&["quarry", "stats", "bank", "--bulk", bulk]);
        assert_eq!(stats["docs"]["count"], json!(3));
        assert_eq!(stats["refresh"]["pending"], json!(0));
    }

    #[test]
    fn test_analyze() {
        let tokens = run(&["quarry", "analyze", "The Quick fox"]);
        let terms: Vec<&str> = tokens["tokens"]
            .as_array()
            .unwrap()
            .iter()
            .map(|token| token["token"].as_str().unwrap())
            .collect();
        assert_eq!(terms, vec!["the", "quick", "fox"]);
    }

    #[test]
    fn test_missing_bulk_file() {
        let args = QuarryArgs::try_parse_from(["quarry", "stats", "bank", "--bulk", "/nonexistent/bulk.json"])
            .unwrap();
        let mut out = Vec::new();
        assert!(matches!(run_command(&args, &mut out), Err(QuarryError::Io(_))));
    }
}
