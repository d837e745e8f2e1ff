//! Convenient imports for common functionality.

pub use crate::autoinc::{AutoincrementEmulator, CatalogQuery, KeySource};
pub use crate::bulk_insert::{BulkInsertPlanner, InsertPlan};
pub use crate::config::{ConnectionOptions, ConnectionOptionsBuilder, ConnectionType};
pub use crate::connection::{ConnectionContext, Cursor, TransactionPhase};
pub use crate::ddl::DdlRewriter;
pub use crate::driver::{
    DriverRow, DriverValue, NativeConnection, NativeCursor, NativeDriver, NativeError,
};
pub use crate::encoding::Codepage;
pub use crate::error::OpenEdgeDbError;
pub use crate::extents::ExtentValue;
pub use crate::identifiers::IdentifierPolicy;
pub use crate::operators::Lookup;
pub use crate::pagination::Pagination;
pub use crate::render::{DialectRenderer, RenderedStatement};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::statement::{
    CompiledDelete, CompiledInsert, CompiledSelect, CompiledStatement, CompiledUpdate, Fragment,
    InsertField, SelectColumn,
};
pub use crate::translation::translate_placeholders;
pub use crate::types::{DatabaseFeatures, LockMode, RowValues, StatementKind};
