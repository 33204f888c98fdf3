// cvcheck-core/src/domain/tokens/mod.rs

pub mod resolver;

pub use resolver::{
    CompiledRule, Expectation, ParsedTokens, Segment, TokenParseError, TokenResolver, split_terms,
};
