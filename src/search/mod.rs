mod query;
mod search_index;

pub use query::{QueryTerm, SearchQuery};
pub use search_index::{SearchIndex, SearchIndexStats, TermSearchIndex};
