//! Fixture catalog shared by the end-to-end tests
//!
//! The fixture is written through the analyzer runner so the documents have the
//! same shapes analyzers produce.

use super::constants::*;
use metadata_catalog_server::analyzer::{run_feeds, AnalyzerFeed, TypedDocument};
use metadata_catalog_server::catalog::{ColumnProfile, IndexInfo};
use metadata_catalog_server::{CatalogPath, LocalCatalog};
use serde_json::json;

struct FixtureFeed;

impl AnalyzerFeed for FixtureFeed {
    fn name(&self) -> &str {
        "fixture"
    }

    fn analyze(&self, path: &CatalogPath) -> Option<TypedDocument> {
        match path.as_str() {
            ORDERS_PATH => TypedDocument::comment(Some(ORDERS_COMMENT)),
            CUSTOMERS_PATH => TypedDocument::from_grants([
                (ANALYST_GRANTEE, "SELECT"),
                ("loader", "INSERT"),
                ("loader", "UPDATE"),
            ]),
            ORDER_TOTAL_PATH => Some(TypedDocument::Profile(
                [(
                    "total".to_string(),
                    ColumnProfile {
                        count: 120,
                        nulls: Some(0),
                        min: Some(json!(1.5)),
                        max: Some(json!(980.0)),
                        ..Default::default()
                    },
                )]
                .into(),
            )),
            _ => None,
        }
    }
}

struct IndexFixtureFeed;

impl AnalyzerFeed for IndexFixtureFeed {
    fn name(&self) -> &str {
        "fixture-indexes"
    }

    fn analyze(&self, path: &CatalogPath) -> Option<TypedDocument> {
        if path.as_str() != ORDERS_PATH {
            return None;
        }
        TypedDocument::from_indexes([(
            "orders_pk".to_string(),
            IndexInfo {
                columns: vec!["id".to_string()],
                unique: true,
            },
        )])
    }
}

/// Writes the fixture documents into `catalog`.
pub fn populate_test_catalog(catalog: &LocalCatalog) {
    let paths: Vec<CatalogPath> = [ORDERS_PATH, CUSTOMERS_PATH, ORDER_TOTAL_PATH]
        .iter()
        .map(|p| CatalogPath::normalize(p).expect("Invalid fixture path"))
        .collect();
    run_feeds(catalog, &[&FixtureFeed, &IndexFixtureFeed], &paths)
        .expect("Failed to populate test catalog");
}
