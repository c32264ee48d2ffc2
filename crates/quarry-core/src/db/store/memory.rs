use crate::{
    db::{
        predicate::{ColumnRef, FieldPresence, Row, Scope, eval},
        relation::{
            AggregateFunction, Join, JoinKind, OrderDirection, OrderKey, OrderTerm, Projection,
            Relation, Source,
        },
        store::{Store, StoreError},
    },
    value::{Record, Value},
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};

// Materialized named relations visible at one nesting level.
type Named = BTreeMap<String, Rc<Vec<Record>>>;

// Per-window-projection results keyed by partition values.
type WindowResults = BTreeMap<usize, BTreeMap<Vec<Value>, Value>>;

///
/// MemoryStore
///
/// In-process table store that evaluates relations directly: CTEs, joins,
/// predicates, window aggregates, distinctness, ordering and pages. Counts
/// executions so callers can assert round trips.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<Record>>,
    executions: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, record: Record) {
        self.tables.entry(table.into()).or_default().push(record);
    }

    pub fn insert_all(&mut self, table: impl Into<String>, records: impl IntoIterator<Item = Record>) {
        self.tables.entry(table.into()).or_default().extend(records);
    }

    /// Rows of a table in insertion order.
    #[must_use]
    pub fn table(&self, name: &str) -> &[Record] {
        self.tables.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of `execute` calls served so far.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions.load(AtomicOrdering::Relaxed)
    }

    fn source_rows(&self, source: &Source, named: &Named) -> Result<Rc<Vec<Record>>, StoreError> {
        match source {
            Source::Table(table) => self
                .tables
                .get(table)
                .map(|rows| Rc::new(rows.clone()))
                .ok_or_else(|| StoreError::UnknownTable {
                    table: table.clone(),
                }),
            Source::Named(name) => {
                named
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StoreError::UnknownRelation { name: name.clone() })
            }
        }
    }

    fn evaluate(&self, relation: &Relation, outer: &Named) -> Result<Vec<Record>, StoreError> {
        let mut named = outer.clone();
        for cte in relation.ctes() {
            let rows = self.evaluate(&cte.relation, &named)?;
            named.insert(cte.name.clone(), Rc::new(rows));
        }

        let base = self.source_rows(relation.source(), &named)?;
        let mut bindings: Vec<Binding> = base.iter().cloned().map(Binding::new).collect();

        for join in relation.joins() {
            let rows = self.source_rows(&join.source, &named)?;
            bindings = apply_join(bindings, join, &rows);
        }

        if let Some(predicate) = relation.predicate() {
            bindings.retain(|binding| {
                eval(
                    &BindingRow {
                        binding,
                        named: &named,
                    },
                    predicate,
                )
            });
        }

        if let Some(alias) = count_alias(relation.projection())? {
            let count = if relation.is_distinct() {
                bindings
                    .iter()
                    .map(|binding| binding.base().clone())
                    .collect::<BTreeSet<_>>()
                    .len()
            } else {
                bindings.len()
            };
            let count = i64::try_from(count).unwrap_or(i64::MAX);

            return Ok(vec![Record::new().with(alias, count)]);
        }

        let windows = compute_windows(relation.projection(), &bindings);
        let mut rows: Vec<(Binding, Record)> = bindings
            .into_iter()
            .map(|binding| {
                let record = project(relation.projection(), &binding, &windows);
                (binding, record)
            })
            .collect();

        if relation.is_distinct() {
            let mut seen = BTreeSet::new();
            rows.retain(|(_, record)| seen.insert(record.clone()));
        }

        if !relation.order().is_empty() {
            rows.sort_by(|a, b| compare_rows(relation.order(), a, b));
        }

        let rows = rows.into_iter().map(|(_, record)| record);
        let out = match relation.page_spec() {
            Some(page) => {
                let skipped = rows.skip(page.offset as usize);
                match page.limit {
                    Some(limit) => skipped.take(limit as usize).collect(),
                    None => skipped.collect(),
                }
            }
            None => rows.collect(),
        };

        Ok(out)
    }
}

impl Store for MemoryStore {
    fn execute(&self, relation: &Relation) -> Result<Vec<Record>, StoreError> {
        self.executions.fetch_add(1, AtomicOrdering::Relaxed);

        self.evaluate(relation, &Named::new())
    }
}

///
/// Binding
///
/// One candidate row: the record bound under each scope joined so far.
///

#[derive(Clone, Debug)]
struct Binding {
    scopes: BTreeMap<Scope, Record>,
}

impl Binding {
    fn new(base: Record) -> Self {
        Self {
            scopes: BTreeMap::from([(Scope::Base, base)]),
        }
    }

    fn base(&self) -> &Record {
        const EMPTY: &Record = &Record::new();

        self.scopes.get(&Scope::Base).unwrap_or(EMPTY)
    }

    // Unjoined scopes read as null, like an outer join miss.
    fn value(&self, column: &ColumnRef) -> Value {
        self.scopes
            .get(&column.scope)
            .map_or(Value::Null, |record| record.value(&column.field).clone())
    }
}

struct BindingRow<'a> {
    binding: &'a Binding,
    named: &'a Named,
}

impl Row for BindingRow<'_> {
    fn column(&self, column: &ColumnRef) -> FieldPresence {
        match self.binding.scopes.get(&column.scope) {
            Some(record) => match record.get(&column.field) {
                Some(value) => FieldPresence::Present(value.clone()),
                None => FieldPresence::Missing,
            },
            None => FieldPresence::Present(Value::Null),
        }
    }

    fn relation_contains(&self, relation: &str, column: &str, value: &Value) -> bool {
        self.named
            .get(relation)
            .is_some_and(|rows| rows.iter().any(|row| row.value(column) == value))
    }
}

// Equi-join every binding against `rows`; left joins keep unmatched bindings.
fn apply_join(bindings: Vec<Binding>, join: &Join, rows: &[Record]) -> Vec<Binding> {
    let mut out = Vec::with_capacity(bindings.len());

    for binding in bindings {
        let key = binding.value(&join.left);
        let mut matched = false;

        if !key.is_null() {
            for row in rows.iter().filter(|row| row.value(&join.right.field) == &key) {
                let mut next = binding.clone();
                next.scopes.insert(join.scope.clone(), row.clone());
                out.push(next);
                matched = true;
            }
        }

        if !matched && join.kind == JoinKind::Left {
            out.push(binding);
        }
    }

    out
}

// The alias of a count projection, which must stand alone.
fn count_alias(projection: &[Projection]) -> Result<Option<&str>, StoreError> {
    let Some(alias) = projection.iter().find_map(|item| match item {
        Projection::CountAll { alias } => Some(alias.as_str()),
        _ => None,
    }) else {
        return Ok(None);
    };

    if projection.len() > 1 {
        return Err(StoreError::Unsupported {
            message: "count projections cannot be combined with other columns".to_string(),
        });
    }

    Ok(Some(alias))
}

// Evaluate every window projection over the filtered bindings.
fn compute_windows(projection: &[Projection], bindings: &[Binding]) -> WindowResults {
    let mut results = WindowResults::new();

    for (i, item) in projection.iter().enumerate() {
        let Projection::Window {
            function,
            column,
            partition_by,
            ..
        } = item
        else {
            continue;
        };

        let mut partitions: BTreeMap<Vec<Value>, Accumulator> = BTreeMap::new();
        for binding in bindings {
            let key = partition_key(binding, partition_by);
            partitions
                .entry(key)
                .or_insert_with(|| Accumulator::new(*function))
                .push(binding.value(column));
        }

        results.insert(
            i,
            partitions
                .into_iter()
                .map(|(key, acc)| (key, acc.finish()))
                .collect(),
        );
    }

    results
}

fn partition_key(binding: &Binding, partition_by: &[ColumnRef]) -> Vec<Value> {
    partition_by
        .iter()
        .map(|column| binding.value(column))
        .collect()
}

fn project(projection: &[Projection], binding: &Binding, windows: &WindowResults) -> Record {
    if projection.is_empty() {
        return binding.base().clone();
    }

    let mut record = Record::new();
    for (i, item) in projection.iter().enumerate() {
        match item {
            Projection::All { scope } => {
                if let Some(source) = binding.scopes.get(scope) {
                    for (field, value) in source.iter() {
                        record.insert(field.clone(), value.clone());
                    }
                }
            }
            Projection::Column { column, alias } => {
                record.insert(alias.clone(), binding.value(column));
            }
            Projection::Coalesce {
                column,
                fallback,
                alias,
            } => {
                let value = binding.value(column);
                let value = if value.is_null() {
                    fallback.clone()
                } else {
                    value
                };
                record.insert(alias.clone(), value);
            }
            Projection::Window {
                partition_by,
                alias,
                ..
            } => {
                let value = windows
                    .get(&i)
                    .and_then(|partitions| partitions.get(&partition_key(binding, partition_by)))
                    .cloned()
                    .unwrap_or(Value::Null);
                record.insert(alias.clone(), value);
            }
            Projection::CountAll { .. } => {}
        }
    }

    record
}

// Nulls sort first ascending and last descending.
fn compare_rows(order: &[OrderTerm], a: &(Binding, Record), b: &(Binding, Record)) -> Ordering {
    for term in order {
        let (left, right) = match &term.key {
            OrderKey::Column(column) => (a.0.value(column), b.0.value(column)),
            OrderKey::Output(alias) => (a.1.value(alias).clone(), b.1.value(alias).clone()),
        };
        let ordering = match term.direction {
            OrderDirection::Asc => left.cmp(&right),
            OrderDirection::Desc => right.cmp(&left),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

///
/// Accumulator
///
/// Running state for one window partition. Nulls are skipped, as in SQL.
///

struct Accumulator {
    function: AggregateFunction,
    value: Option<Value>,
    count: i64,
}

impl Accumulator {
    const fn new(function: AggregateFunction) -> Self {
        Self {
            function,
            value: None,
            count: 0,
        }
    }

    fn push(&mut self, value: Value) {
        if value.is_null() {
            return;
        }
        self.count += 1;

        self.value = Some(match (self.function, self.value.take()) {
            (_, None) => value,
            (AggregateFunction::Sum, Some(acc)) => acc.checked_add(&value).unwrap_or(acc),
            (AggregateFunction::Count, Some(acc)) => acc,
            (AggregateFunction::Min, Some(acc)) => acc.min(value),
            (AggregateFunction::Max, Some(acc)) => acc.max(value),
        });
    }

    fn finish(self) -> Value {
        match self.function {
            AggregateFunction::Count => Value::Int(self.count),
            _ => self.value.unwrap_or(Value::Null),
        }
    }
}
