//! Max token length filter implementation.

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Splits tokens longer than `max_length` characters into consecutive
/// pieces. Each piece takes its own position, and the tokens after it are
/// shifted accordingly.
#[derive(Clone, Debug)]
pub struct MaxTokenLengthFilter {
    max_length: usize,
}

impl Default for MaxTokenLengthFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LENGTH)
    }
}

impl MaxTokenLengthFilter {
    pub const DEFAULT_MAX_LENGTH: usize = 255;

    /// Create a filter splitting at `max_length` characters (at least 1).
    pub fn new(max_length: usize) -> Self {
        MaxTokenLengthFilter {
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

/// Byte ranges of the `max`-character pieces of `text`.
fn piece_ranges(text: &str, max: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (count, (byte, _)) in text.char_indices().enumerate() {
        if count > 0 && count % max == 0 {
            ranges.push((start, byte));
            start = byte;
        }
    }
    ranges.push((start, text.len()));
    ranges
}

impl Filter for MaxTokenLengthFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let max = self.max_length;
        let mut shift = 0;
        Ok(Box::new(tokens.flat_map(move |token| {
            let position = token.position + shift;
            if token.char_len() <= max {
                return vec![Token { position, ..token }];
            }
            let ranges = piece_ranges(&token.text, max);
            shift += ranges.len() - 1;
            ranges
                .into_iter()
                .enumerate()
                .map(|(i, (start, end))| {
                    Token::with_offsets(
                        &token.text[start..end],
                        position + i,
                        token.start_offset + start,
                        token.start_offset + end,
                    )
                })
                .collect()
        })))
    }

    fn name(&self) -> &'static str {
        "max_token_length"
    }
}
