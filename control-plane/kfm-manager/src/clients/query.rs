use kfm_cp_storage::{SearchParseError, SearchQuery};

/// Turns a free-text search expression into a typed predicate that the
/// store can render to parameterized SQL or evaluate directly.
pub trait QueryParser: Send + Sync {
    fn parse(&self, search: &str) -> Result<SearchQuery, SearchParseError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryParser;

impl QueryParser for DefaultQueryParser {
    fn parse(&self, search: &str) -> Result<SearchQuery, SearchParseError> {
        SearchQuery::parse(search)
    }
}
