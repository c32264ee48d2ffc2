//! Module: session
//! Responsibility: run compiled queries against a store and shape results.
//! Does not own: relation composition (assemble) or storage (Store).
//! Boundary: one store round trip per query, plus one per preloaded hop.

use crate::{
    COUNT_COLUMN,
    config::EngineConfig,
    db::{
        assemble::{CompiledQuery, assemble},
        definition::QueryDefinition,
        params::ParameterSet,
        predicate::ColumnRef,
        relation::Relation,
        response::{DecoratedResult, PreloadSet},
        sql::{SqlDialect, SqlStatement},
        store::{Store, StoreError},
    },
    error::Error,
    obs::{QueryTraceEvent, QueryTraceSink},
    value::{Record, Value},
};
use std::collections::BTreeSet;

///
/// QuerySession
///
/// Session-scoped handle with policy (debug, tracing, SQL dialect) and
/// execution routing. Holds no per-query state; one session may serve any
/// number of invocations.
///

pub struct QuerySession<'a, S: Store + ?Sized> {
    store: &'a S,
    debug: bool,
    trace: Option<&'a dyn QueryTraceSink>,
    dialect: SqlDialect,
}

impl<'a, S: Store + ?Sized> QuerySession<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            debug: false,
            trace: None,
            dialect: SqlDialect::Postgres,
        }
    }

    /// Session with debug mode and dialect taken from `config`.
    #[must_use]
    pub const fn from_config(store: &'a S, config: &EngineConfig) -> Self {
        Self {
            store,
            debug: config.debug,
            trace: None,
            dialect: config.sql.dialect,
        }
    }

    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub const fn trace_sink(mut self, sink: &'a dyn QueryTraceSink) -> Self {
        self.trace = Some(sink);
        self
    }

    #[must_use]
    pub const fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub const fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    fn emit(&self, event: QueryTraceEvent) {
        if let Some(sink) = self.trace {
            sink.on_event(event);
        }
    }

    // ------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------

    /// Assemble without touching the store.
    pub fn compile(
        &self,
        definition: &QueryDefinition,
        base: Relation,
        params: &ParameterSet,
    ) -> Result<CompiledQuery, Error> {
        match assemble(definition, base, params) {
            Ok(compiled) => {
                let relation = compiled.relation();
                if self.debug {
                    tracing::debug!(
                        entity = definition.entity(),
                        fingerprint = %compiled.fingerprint(),
                        ctes = relation.ctes().len(),
                        joins = relation.joins().len(),
                        "query assembled"
                    );
                }
                self.emit(QueryTraceEvent::Assembled {
                    fingerprint: compiled.fingerprint(),
                    entity: definition.entity().to_string(),
                    ctes: count_u32(relation.ctes().len()),
                    joins: count_u32(relation.joins().len()),
                    aggregates: count_u32(definition.aggregates().len()),
                });

                Ok(compiled)
            }
            Err(err) => {
                if self.debug {
                    tracing::debug!(entity = definition.entity(), error = %err, "query rejected");
                }
                self.emit(QueryTraceEvent::Rejected {
                    entity: definition.entity().to_string(),
                    class: err.class(),
                    key: err.as_validation().map(|v| v.key.clone()),
                });

                Err(err)
            }
        }
    }

    /// Assemble and render one statement in the session's dialect.
    pub fn to_sql(
        &self,
        definition: &QueryDefinition,
        base: Relation,
        params: &ParameterSet,
    ) -> Result<SqlStatement, Error> {
        Ok(self.compile(definition, base, params)?.to_sql(self.dialect))
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Assemble, execute, fetch preloads and attach decorations.
    pub fn execute(
        &self,
        definition: &QueryDefinition,
        base: Relation,
        params: &ParameterSet,
    ) -> Result<DecoratedResult, Error> {
        let compiled = self.compile(definition, base, params)?;

        self.execute_compiled(&compiled)
    }

    /// Execute with the definition's own base relation.
    pub fn execute_default(
        &self,
        definition: &QueryDefinition,
        params: &ParameterSet,
    ) -> Result<DecoratedResult, Error> {
        self.execute(definition, definition.base_relation(), params)
    }

    pub fn execute_compiled(&self, compiled: &CompiledQuery) -> Result<DecoratedResult, Error> {
        let fingerprint = compiled.fingerprint();
        let outcome = self.run(compiled);

        match &outcome {
            Ok((result, fetches)) => {
                if self.debug {
                    tracing::debug!(
                        entity = compiled.entity(),
                        fingerprint = %fingerprint,
                        rows = result.len(),
                        preload_fetches = fetches,
                        "query executed"
                    );
                }
                self.emit(QueryTraceEvent::Executed {
                    fingerprint,
                    rows: result.len() as u64,
                    preload_fetches: *fetches,
                });
            }
            Err(err) => {
                if self.debug {
                    tracing::debug!(
                        entity = compiled.entity(),
                        fingerprint = %fingerprint,
                        error = %err,
                        "store failed"
                    );
                }
                self.emit(QueryTraceEvent::StoreFailed { fingerprint });
            }
        }

        let (result, _) = outcome?;

        Ok(result)
    }

    /// Number of rows the query matches, ignoring ordering and pagination.
    pub fn count(
        &self,
        definition: &QueryDefinition,
        base: Relation,
        params: &ParameterSet,
    ) -> Result<u64, Error> {
        let compiled = self.compile(definition, base, params)?;
        let rows = self.store.execute(&compiled.count_relation()).inspect_err(|_| {
            self.emit(QueryTraceEvent::StoreFailed {
                fingerprint: compiled.fingerprint(),
            });
        })?;

        rows.first()
            .and_then(|row| row.value(COUNT_COLUMN).as_int())
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| StoreError::backend("count relation returned no count").into())
    }

    // Main query plus preload hops; returns the number of preload fetches.
    fn run(&self, compiled: &CompiledQuery) -> Result<(DecoratedResult, u32), StoreError> {
        let rows = self.store.execute(compiled.relation())?;

        let mut preloads = PreloadSet::new(compiled.preloads().to_vec());
        let mut fetches = 0;
        for path in compiled.preloads() {
            for (i, step) in path.steps.iter().enumerate() {
                if preloads.contains(&step.path) {
                    continue;
                }
                let owners: &[Record] = match i {
                    0 => &rows,
                    _ => preloads
                        .hop(&path.steps[i - 1].path)
                        .map_or(&[], |hop| hop.rows.as_slice()),
                };
                let keys: BTreeSet<Value> = owners
                    .iter()
                    .map(|row| row.value(&step.source_column).clone())
                    .filter(|key| !key.is_null())
                    .collect();

                let fetched = if keys.is_empty() {
                    Vec::new()
                } else {
                    fetches += 1;
                    let relation = Relation::table(&step.target_entity)
                        .filter(ColumnRef::base(&step.target_column).in_list(keys));
                    self.store.execute(&relation)?
                };
                preloads.insert(step.clone(), fetched);
            }
        }

        let result = DecoratedResult::new(
            compiled.entity(),
            rows,
            preloads,
            compiled.decorations().clone(),
        );

        Ok((result, fetches))
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
