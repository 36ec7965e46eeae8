//! Shared constants for end-to-end tests
//!
//! When the fixture catalog changes, update only this file and `fixtures.rs`.

// ============================================================================
// Fixture Catalog Paths
// ============================================================================

/// Schema holding the fixture tables
pub const SALES_SCHEMA_PATH: &str = "/warehouse/sales";

/// Table with a comment and an index document
pub const ORDERS_PATH: &str = "/warehouse/sales/orders";

/// Table with an access document
pub const CUSTOMERS_PATH: &str = "/warehouse/sales/customers";

/// Column with a profile document
pub const ORDER_TOTAL_PATH: &str = "/warehouse/sales/orders/total";

/// Comment attached to the orders table
pub const ORDERS_COMMENT: &str = "Orders placed by customers";

/// Grantee with read access to the customers table
pub const ANALYST_GRANTEE: &str = "analyst";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
