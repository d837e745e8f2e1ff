//! In-memory stand-in for the native driver.
//!
//! Statements are answered by rules matched on a substring of the SQL text; everything the
//! layer sends is recorded so tests can assert on it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{
    DriverRow, DriverValue, NativeConnection, NativeCursor, NativeDriver, NativeError,
};

/// What a matched statement does.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Succeeds, reporting this many affected rows.
    Affected(i64),
    /// Succeeds with a result.
    Rows {
        columns: Vec<String>,
        rows: Vec<DriverRow>,
    },
    /// Succeeds with one single-column row holding `next`, then counts up.
    Sequence { next: i64 },
    /// Fails with this error.
    Fail(NativeError),
}

impl Outcome {
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<DriverRow>) -> Self {
        Outcome::Rows {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    #[must_use]
    pub fn fail(message: &str) -> Self {
        Outcome::Fail(NativeError::new(message))
    }
}

/// Everything the layer asked of the driver, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(String),
    Execute { sql: String, params: Vec<DriverValue> },
    ExecuteMany { sql: String, rows: Vec<DriverRow> },
    Commit,
    Rollback,
    CloseCursor,
    Close,
}

#[derive(Debug)]
struct Rule {
    fragment: String,
    outcome: Outcome,
    once: bool,
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<Rule>,
    events: Vec<Event>,
    connect_error: Option<NativeError>,
}

impl Script {
    fn answer(&mut self, sql: &str) -> Outcome {
        let Some(pos) = self.rules.iter().position(|r| sql.contains(&r.fragment)) else {
            return Outcome::Affected(0);
        };
        if self.rules[pos].once {
            return self.rules.remove(pos).outcome;
        }
        let rule = &mut self.rules[pos];
        if let Outcome::Sequence { next } = &mut rule.outcome {
            let current = *next;
            *next += 1;
            return Outcome::Sequence { next: current };
        }
        rule.outcome.clone()
    }
}

/// Scripted driver. Clones share one script, so a test keeps a handle after the
/// connection has been opened.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every statement containing `fragment` with `outcome`. Earlier rules win.
    pub fn on(&self, fragment: &str, outcome: Outcome) -> &Self {
        self.lock().rules.push(Rule {
            fragment: fragment.to_string(),
            outcome,
            once: false,
        });
        self
    }

    /// Answer the next statement containing `fragment` with `outcome`, then forget the rule.
    pub fn once(&self, fragment: &str, outcome: Outcome) -> &Self {
        self.lock().rules.push(Rule {
            fragment: fragment.to_string(),
            outcome,
            once: true,
        });
        self
    }

    pub fn fail_connect(&self, error: NativeError) {
        self.lock().connect_error = Some(error);
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// SQL text of every executed statement, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Execute { sql, .. } | Event::ExecuteMany { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.count(|e| matches!(e, Event::Commit))
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.count(|e| matches!(e, Event::Rollback))
    }

    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    /// Forget recorded events, keeping the rules.
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    fn record(&self, event: Event) {
        self.lock().events.push(event);
    }
}

impl NativeDriver for ScriptedDriver {
    type Connection = ScriptedConnection;

    fn connect(&self, connection_string: &str) -> Result<Self::Connection, NativeError> {
        let mut script = self.lock();
        script
            .events
            .push(Event::Connect(connection_string.to_string()));
        if let Some(err) = script.connect_error.clone() {
            return Err(err);
        }
        Ok(ScriptedConnection {
            driver: self.clone(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    driver: ScriptedDriver,
}

impl NativeConnection for ScriptedConnection {
    type Cursor = ScriptedCursor;

    fn cursor(&mut self) -> Result<Self::Cursor, NativeError> {
        Ok(ScriptedCursor {
            driver: self.driver.clone(),
            columns: None,
            pending: VecDeque::new(),
        })
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.driver.record(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.driver.record(Event::Rollback);
        Ok(())
    }

    fn close(&mut self) -> Result<(), NativeError> {
        self.driver.record(Event::Close);
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScriptedCursor {
    driver: ScriptedDriver,
    columns: Option<Vec<String>>,
    pending: VecDeque<DriverRow>,
}

impl ScriptedCursor {
    fn apply(&mut self, outcome: Outcome) -> Result<i64, NativeError> {
        self.columns = None;
        self.pending.clear();
        match outcome {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows { columns, rows } => {
                self.columns = Some(columns);
                self.pending = rows.into();
                Ok(-1)
            }
            Outcome::Sequence { next } => {
                self.columns = Some(vec!["NEXTVAL".to_string()]);
                self.pending.push_back(vec![DriverValue::Int(next)]);
                Ok(-1)
            }
            Outcome::Fail(err) => Err(err),
        }
    }
}

impl NativeCursor for ScriptedCursor {
    fn execute(&mut self, sql: &str, params: &[DriverValue]) -> Result<i64, NativeError> {
        let outcome = {
            let mut script = self.driver.lock();
            script.events.push(Event::Execute {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            script.answer(sql)
        };
        self.apply(outcome)
    }

    fn executemany(&mut self, sql: &str, param_rows: &[DriverRow]) -> Result<i64, NativeError> {
        let outcome = {
            let mut script = self.driver.lock();
            script.events.push(Event::ExecuteMany {
                sql: sql.to_string(),
                rows: param_rows.to_vec(),
            });
            script.answer(sql)
        };
        match outcome {
            Outcome::Fail(err) => Err(err),
            _ => i64::try_from(param_rows.len()).map_err(|e| NativeError::new(e.to_string())),
        }
    }

    fn fetchone(&mut self) -> Result<Option<DriverRow>, NativeError> {
        Ok(self.pending.pop_front())
    }

    fn fetchmany(&mut self, size: usize) -> Result<Vec<DriverRow>, NativeError> {
        let take = size.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    fn fetchall(&mut self) -> Result<Vec<DriverRow>, NativeError> {
        Ok(self.pending.drain(..).collect())
    }

    fn columns(&self) -> Option<Vec<String>> {
        self.columns.clone()
    }

    fn close(&mut self) -> Result<(), NativeError> {
        self.driver.record(Event::CloseCursor);
        Ok(())
    }
}
