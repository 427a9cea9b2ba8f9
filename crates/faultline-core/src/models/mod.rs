mod api_key;
mod audit;
mod report;
mod stats;
mod stored;

pub use api_key::{ApiKeyPrincipal, IssuedApiKey};
pub use audit::{AuditRecord, CriticalAlert};
pub use report::{BrowserInfo, Category, Environment, ErrorReport, RawErrorReport, Severity};
pub use stats::{AggregationUpdate, ErrorAggregation, ErrorStats, StatsDimension};
pub use stored::{DEFAULT_STORED_ENVIRONMENT, StoredError};
