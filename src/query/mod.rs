//! Query trees: parsing, reference resolution and evaluation.

pub mod dsl;
pub mod evaluator;
pub mod query_string;
pub mod rewrite;
pub mod script;

pub use self::dsl::{
    BoolQuery, Bound, LikeItem, MinimumShouldMatch, MoreLikeThisQuery, Operator, PercolateSource,
    QueryNode, RangeQuery, ShapeSource,
};
pub use self::evaluator::Evaluator;
pub use self::rewrite::{DocumentLookup, needs_rewrite, rewrite};
pub use self::script::{Script, ScriptContext};
