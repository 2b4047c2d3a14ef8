//! Output formatting for CLI commands.

use std::io::Write;

use serde_json::{Value, json};

use crate::aggregation::AggregationResult;
use crate::analysis::Token;
use crate::cli::args::{OutputFormat, QuarryArgs};
use crate::engine::IndexStats;
use crate::error::Result;
use crate::search::SearchResponse;

/// Write a JSON value, pretty-printed when requested.
pub fn write_json<W: Write>(out: &mut W, value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn output_search<W: Write>(out: &mut W, response: &SearchResponse, args: &QuarryArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => write_json(out, &response.to_json(), args.pretty),
        OutputFormat::Human => output_search_human(out, response),
    }
}

fn output_search_human<W: Write>(out: &mut W, response: &SearchResponse) -> Result<()> {
    writeln!(out, "{} hit(s) in {:?}", response.total, response.took)?;
    for hit in &response.hits {
        let source = hit
            .source
            .as_ref()
            .map(|source| Value::Object(source.as_ref().clone()).to_string())
            .unwrap_or_default();
        writeln!(out, "{}/{} v{} {}", hit.index, hit.id, hit.version, source)?;
        if !hit.sort.is_empty() {
            writeln!(out, "  sort: {}", Value::Array(hit.sort.clone()))?;
        }
    }
    for (name, result) in &response.aggregations {
        writeln!(out)?;
        writeln!(out, "{name}:")?;
        match result {
            AggregationResult::Terms {
                doc_count_error_upper_bound,
                sum_other_doc_count,
                buckets,
            } => {
                for bucket in buckets {
                    writeln!(out, "  {} ({})", bucket.key, bucket.doc_count)?;
                }
                writeln!(
                    out,
                    "  other: {sum_other_doc_count}, error bound: {doc_count_error_upper_bound}"
                )?;
            }
            AggregationResult::Metric(value) => match value {
                Some(value) => writeln!(out, "  {value}")?,
                None => writeln!(out, "  -")?,
            },
        }
    }
    Ok(())
}

pub fn output_count<W: Write>(out: &mut W, count: usize, args: &QuarryArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => write_json(out, &json!({ "count": count }), args.pretty),
        OutputFormat::Human => {
            writeln!(out, "{count}")?;
            Ok(())
        }
    }
}

pub fn output_stats<W: Write>(out: &mut W, stats: &IndexStats, args: &QuarryArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => write_json(out, &stats.to_json(), args.pretty),
        OutputFormat::Human => {
            writeln!(out, "Index: {}", stats.index)?;
            writeln!(out, "Documents: {} ({} deleted)", stats.docs_count, stats.docs_deleted)?;
            writeln!(out, "Searchable: {}", stats.searchable_docs)?;
            writeln!(out, "Pending refreshes: {}", stats.pending_refreshes)?;
            writeln!(out, "Terms: {}", stats.term_count)?;
            writeln!(out, "Percolator queries: {}", stats.percolator_queries)?;
            Ok(())
        }
    }
}

pub fn output_tokens<W: Write>(out: &mut W, tokens: &[Token], args: &QuarryArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => {
            let tokens: Vec<Value> = tokens
                .iter()
                .map(|token| {
                    json!({
                        "token": token.text,
                        "start_offset": token.start_offset,
                        "end_offset": token.end_offset,
                        "position": token.position,
                    })
                })
                .collect();
            write_json(out, &json!({ "tokens": tokens }), args.pretty)
        }
        OutputFormat::Human => {
            for token in tokens {
                writeln!(
                    out,
                    "{}\t{}\t[{}..{}]",
                    token.position, token.text, token.start_offset, token.end_offset
                )?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(format: &str) -> QuarryArgs {
        QuarryArgs::try_parse_from(["quarry", "--format", format, "analyze", "x"]).unwrap()
    }

    #[test]
    fn test_tokens_json() {
        let tokens = vec![Token::with_offsets("hello", 0, 0, 5)];
        let mut out = Vec::new();
        output_tokens(&mut out, &tokens, &args("json")).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["tokens"][0]["token"], json!("hello"));
        assert_eq!(value["tokens"][0]["end_offset"], json!(5));
    }

    #[test]
    fn test_count_human() {
        let mut out = Vec::new();
        output_count(&mut out, 42, &args("human")).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "42\n");
    }
}
