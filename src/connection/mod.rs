//! Connection lifecycle, managed transaction blocks and session setup.

use tracing::{debug, error, info, warn};

use crate::autoinc::AutoincrementEmulator;
use crate::bulk_insert::BulkInsertPlanner;
use crate::config::ConnectionOptions;
use crate::driver::{NativeConnection, NativeDriver, NativeError};
use crate::error::OpenEdgeDbError;
use crate::render::DialectRenderer;
use crate::types::RowValues;

mod cursor;
mod tx;

pub use cursor::Cursor;
pub use tx::{LeaveOutcome, MAX_MANAGED_DEPTH, TransactionPhase, TransactionState};

/// Catalog lookup for the dual table; binds `(owner, table)`.
pub const DUAL_TABLE_QUERY: &str =
    "SELECT TBL FROM SYSPROGRESS.SYSTABLES WHERE OWNER = %s AND TBL = %s";

/// Scratch table used by [`ConnectionContext::check_transaction_support`].
pub const ROLLBACK_TEST_TABLE: &str = "ROLLBACK_TEST";

/// One open connection plus everything the dialect layer tracks for it.
///
/// Not shared between callers: every operation takes `&mut self` and blocks until the
/// driver returns.
pub struct ConnectionContext<C: NativeConnection> {
    conn: C,
    options: ConnectionOptions,
    tx: TransactionState,
    renderer: DialectRenderer,
    planner: BulkInsertPlanner,
    autoinc: AutoincrementEmulator,
    closed: bool,
}

impl<C: NativeConnection> ConnectionContext<C> {
    /// Connect and prepare the session: switch to the default schema and make sure the
    /// dual table exists.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::ConfigError` for invalid options,
    /// `OpenEdgeDbError::ConnectionError` if the driver cannot connect, and
    /// `OpenEdgeDbError::DatabaseError` if a setup statement fails.
    pub fn open<D>(driver: &D, options: ConnectionOptions) -> Result<Self, OpenEdgeDbError>
    where
        D: NativeDriver<Connection = C>,
    {
        options.validate()?;
        let conn = driver.connect(&options.connection_string()).map_err(|e| {
            error!(host = %options.host, db = %options.name, error = %e, "connection failed");
            OpenEdgeDbError::ConnectionError(e)
        })?;
        info!(
            host = %options.host,
            db = %options.name,
            schema = %options.default_schema,
            "connected to OpenEdge"
        );

        let policy = options.identifier_policy();
        let mut ctx = Self {
            conn,
            renderer: DialectRenderer::new(policy, options.features())
                .with_dual_table(&options.default_schema, &options.dual_table),
            planner: BulkInsertPlanner::new(policy, options.bulk_insert),
            autoinc: AutoincrementEmulator::new(
                options.default_schema.clone(),
                options.dual_table.clone(),
                policy,
            ),
            tx: TransactionState::default(),
            options,
            closed: false,
        };
        ctx.prepare_session()?;
        Ok(ctx)
    }

    fn prepare_session(&mut self) -> Result<(), OpenEdgeDbError> {
        let schema = self.options.default_schema.clone();
        let dual = self.options.dual_table.clone();
        let qualified = self.renderer.policy().quote_qualified(&schema, &dual);

        let mut cursor = self.cursor()?;
        cursor.execute(&format!("SET SCHEMA '{}'", schema.replace('\'', "''")), &[])?;
        let existing = cursor.query_row(
            DUAL_TABLE_QUERY,
            &[RowValues::from(schema.as_str()), RowValues::from(dual.as_str())],
        )?;
        if existing.is_none() {
            cursor.execute(&format!("CREATE TABLE {qualified} (SEQACCESS integer)"), &[])?;
            cursor.execute(&format!("INSERT INTO {qualified} (SEQACCESS) VALUES (1)"), &[])?;
            info!(table = %qualified, "created dual table");
        }
        cursor.close()
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    #[must_use]
    pub fn renderer(&self) -> &DialectRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn transaction_state(&self) -> &TransactionState {
        &self.tx
    }

    #[must_use]
    pub fn phase(&self) -> TransactionPhase {
        self.tx.phase()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open a cursor. Statements run through it commit (or mark the managed block dirty)
    /// on this connection.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ConnectionError` if the connection is closed or the driver
    /// cannot allocate a cursor.
    pub fn cursor(&mut self) -> Result<Cursor<'_, C>, OpenEdgeDbError> {
        if self.closed {
            return Err(OpenEdgeDbError::ConnectionError(NativeError::new(
                "connection is closed",
            )));
        }
        let native = self
            .conn
            .cursor()
            .map_err(OpenEdgeDbError::ConnectionError)?;
        Ok(Cursor::new(self, native))
    }

    /// Start a managed block: statements stop committing until [`commit`](Self::commit).
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` when nested too deeply.
    pub fn enter_managed(&mut self) -> Result<(), OpenEdgeDbError> {
        self.tx.enter()?;
        debug!(depth = self.tx.depth(), "entered managed block");
        Ok(())
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block.
    pub fn mark_dirty(&mut self) -> Result<(), OpenEdgeDbError> {
        self.tx.mark_dirty()
    }

    /// End the innermost managed block. Work left uncommitted is rolled back.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block and
    /// `OpenEdgeDbError::PendingTransactionError` if the block was left dirty.
    pub fn leave_managed(&mut self) -> Result<(), OpenEdgeDbError> {
        match self.tx.leave()? {
            LeaveOutcome::Clean => {
                debug!(depth = self.tx.depth(), "left managed block");
                Ok(())
            }
            LeaveOutcome::Pending => {
                warn!("managed block ended with pending work; rolling back");
                self.conn
                    .rollback()
                    .map_err(|e| OpenEdgeDbError::database(e, "ROLLBACK", &[]))?;
                Err(OpenEdgeDbError::PendingTransactionError)
            }
        }
    }

    /// Switch the innermost block between deferred and immediate commits. Pending work is
    /// committed when switching to immediate.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::TransactionStateError` outside a managed block, or the
    /// commit's error.
    pub fn set_managed(&mut self, flag: bool) -> Result<(), OpenEdgeDbError> {
        self.tx.set_managed(flag)?;
        if !flag && self.tx.is_dirty() {
            self.commit()?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::DatabaseError` if the driver rejects the commit.
    pub fn commit(&mut self) -> Result<(), OpenEdgeDbError> {
        self.conn.commit().map_err(|e| {
            error!(error = %e, "commit failed");
            OpenEdgeDbError::database(e, "COMMIT", &[])
        })?;
        self.tx.clear_dirty();
        Ok(())
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::DatabaseError` if the driver rejects the rollback.
    pub fn rollback(&mut self) -> Result<(), OpenEdgeDbError> {
        self.conn.rollback().map_err(|e| {
            error!(error = %e, "rollback failed");
            OpenEdgeDbError::database(e, "ROLLBACK", &[])
        })?;
        self.tx.clear_dirty();
        Ok(())
    }

    /// Check that a rolled-back insert really disappears.
    ///
    /// Creates a scratch table, inserts into it inside a managed block, rolls back, counts
    /// the rows and drops the table again.
    ///
    /// # Errors
    /// Returns the first error raised by the check statements.
    pub fn check_transaction_support(&mut self) -> Result<bool, OpenEdgeDbError> {
        let table = self.renderer.policy().quote(ROLLBACK_TEST_TABLE);
        let mut cursor = self.cursor()?;
        cursor.execute(&format!("CREATE TABLE {table} (X INT)"), &[])?;

        let outcome = rollback_check(&mut cursor, &table);
        let dropped = cursor.execute(&format!("DROP TABLE {table}"), &[]);
        let supported = outcome?;
        dropped?;
        cursor.close()?;
        info!(supported, "checked transaction support");
        Ok(supported)
    }

    /// Close the connection, rolling back uncommitted work first.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ConnectionError` if the driver fails to close.
    pub fn close(&mut self) -> Result<(), OpenEdgeDbError> {
        if self.closed {
            return Ok(());
        }
        if self.tx.is_dirty() {
            warn!("closing connection with pending work; rolling back");
            self.rollback()?;
        }
        self.conn.close().map_err(OpenEdgeDbError::ConnectionError)?;
        self.closed = true;
        info!(db = %self.options.name, "connection closed");
        Ok(())
    }
}

fn rollback_check<C: NativeConnection>(
    cursor: &mut Cursor<'_, C>,
    table: &str,
) -> Result<bool, OpenEdgeDbError> {
    cursor.connection().enter_managed()?;
    let inserted = cursor.execute(&format!("INSERT INTO {table} (X) VALUES (8)"), &[]);
    cursor.connection().rollback()?;
    cursor.connection().leave_managed()?;
    inserted?;
    let count = cursor.query_row(&format!("SELECT COUNT(X) FROM {table}"), &[])?;
    Ok(matches!(count.as_deref(), Some([RowValues::Int(0)])))
}
