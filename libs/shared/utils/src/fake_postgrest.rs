//! In-memory PostgREST stand-in for cell integration tests.
//!
//! Understands the subset of the PostgREST dialect the cells speak: `eq.` and
//! `in.(…)` filters, `order`, `limit`, `select` (ignored, rows come back whole)
//! and JSON bodies on POST/PATCH. Writes are serialized behind one lock and the
//! same unique indexes as `supabase/migrations` are enforced, so concurrent
//! callers race exactly the way they would against Postgres.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const REST_PREFIX: &str = "/rest/v1/";

struct UniqueIndex {
    name: &'static str,
    table: &'static str,
    columns: &'static [&'static str],
    /// Partial index predicate: `(column, allowed values)`.
    predicate: Option<(&'static str, &'static [&'static str])>,
}

static UNIQUE_INDEXES: &[UniqueIndex] = &[
    UniqueIndex {
        name: "appointments_active_slot_key",
        table: "appointments",
        columns: &["doctor_id", "appointment_date", "time_slot"],
        predicate: Some(("status", &["pending", "confirmed"])),
    },
    UniqueIndex {
        name: "reviews_appointment_id_key",
        table: "reviews",
        columns: &["appointment_id"],
        predicate: None,
    },
];

#[derive(Clone, Default)]
pub struct FakePostgrest {
    tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl FakePostgrest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every `/rest/v1/*` request on `server` from this store.
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(r"^/rest/v1/.+"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn seed(&self, table: &str, row: Value) {
        self.lock().entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().get(table).cloned().unwrap_or_default()
    }

    /// Out-of-band edit, standing in for workflows outside the cells under test.
    pub fn patch_row(&self, table: &str, id: &str, patch: Value) {
        let mut tables = self.lock();
        if let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row["id"] == id))
        {
            merge(row, &patch);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Value>>> {
        self.tables.lock().expect("fake postgrest state poisoned")
    }

    fn select(&self, table: &str, query: &Query) -> Vec<Value> {
        let tables = self.lock();
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();
        query.sort(&mut rows);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn insert(&self, table: &str, body: Value) -> ResponseTemplate {
        let mut tables = self.lock();
        let rows = tables.entry(table.to_string()).or_default();

        let incoming = match body {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut inserted = Vec::with_capacity(incoming.len());
        for mut row in incoming {
            if let Value::Object(map) = &mut row {
                map.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
                map.entry("created_at").or_insert_with(|| json!(Utc::now().to_rfc3339()));
            }
            if let Some(index) = violated_index(table, rows, &row, None) {
                return unique_violation(index);
            }
            rows.push(row.clone());
            inserted.push(row);
        }

        ResponseTemplate::new(201).set_body_json(Value::Array(inserted))
    }

    fn update(&self, table: &str, query: &Query, patch: Value) -> ResponseTemplate {
        let mut tables = self.lock();
        let rows = tables.entry(table.to_string()).or_default();

        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| query.matches(row))
            .map(|(idx, _)| idx)
            .collect();

        for &idx in &targets {
            let mut candidate = rows[idx].clone();
            merge(&mut candidate, &patch);
            if let Some(index) = violated_index(table, rows, &candidate, Some(idx)) {
                return unique_violation(index);
            }
        }

        let mut updated = Vec::with_capacity(targets.len());
        for idx in targets {
            merge(&mut rows[idx], &patch);
            updated.push(rows[idx].clone());
        }

        ResponseTemplate::new(200).set_body_json(Value::Array(updated))
    }
}

impl Respond for FakePostgrest {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(table) = request.url.path().strip_prefix(REST_PREFIX) else {
            return ResponseTemplate::new(404);
        };
        let query = Query::parse(request);
        let body = || serde_json::from_slice::<Value>(&request.body).unwrap_or(Value::Null);

        match request.method.as_str() {
            "GET" => ResponseTemplate::new(200).set_body_json(Value::Array(self.select(table, &query))),
            "POST" => self.insert(table, body()),
            "PATCH" => self.update(table, &query, body()),
            _ => ResponseTemplate::new(405),
        }
    }
}

enum Filter {
    Eq(String),
    In(Vec<String>),
}

struct Query {
    filters: Vec<(String, Filter)>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    fn parse(request: &Request) -> Self {
        let mut query = Query { filters: Vec::new(), order: Vec::new(), limit: None };

        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "select" | "offset" => {}
                "limit" => query.limit = value.parse().ok(),
                "order" => {
                    for part in value.split(',') {
                        let mut pieces = part.split('.');
                        let column = pieces.next().unwrap_or_default().to_string();
                        let descending = pieces.any(|p| p == "desc");
                        query.order.push((column, descending));
                    }
                }
                column => {
                    let filter = if let Some(v) = value.strip_prefix("eq.") {
                        Filter::Eq(v.to_string())
                    } else if let Some(list) = value.strip_prefix("in.(").and_then(|v| v.strip_suffix(')')) {
                        Filter::In(list.split(',').map(str::to_string).collect())
                    } else {
                        continue;
                    };
                    query.filters.push((column.to_string(), filter));
                }
            }
        }

        query
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(column, filter)| {
            let actual = scalar(&row[column.as_str()]);
            match filter {
                Filter::Eq(expected) => actual.as_deref() == Some(expected.as_str()),
                Filter::In(options) => actual.is_some_and(|a| options.iter().any(|o| *o == a)),
            }
        })
    }

    fn sort(&self, rows: &mut [Value]) {
        for (column, descending) in self.order.iter().rev() {
            rows.sort_by(|a, b| {
                let ordering = scalar(&a[column.as_str()]).cmp(&scalar(&b[column.as_str()]));
                if *descending { ordering.reverse() } else { ordering }
            });
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn merge(row: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(changes)) = (row, patch) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn violated_index(
    table: &str,
    rows: &[Value],
    candidate: &Value,
    skip: Option<usize>,
) -> Option<&'static UniqueIndex> {
    UNIQUE_INDEXES
        .iter()
        .filter(|index| index.table == table && in_index(index, candidate))
        .find(|index| {
            rows.iter().enumerate().any(|(idx, existing)| {
                Some(idx) != skip
                    && in_index(index, existing)
                    && index.columns.iter().all(|c| scalar(&existing[*c]) == scalar(&candidate[*c]))
            })
        })
}

fn in_index(index: &UniqueIndex, row: &Value) -> bool {
    match index.predicate {
        Some((column, allowed)) => scalar(&row[column]).is_some_and(|v| allowed.contains(&v.as_str())),
        None => true,
    }
}

fn unique_violation(index: &UniqueIndex) -> ResponseTemplate {
    let mut body = Map::new();
    body.insert("code".into(), json!("23505"));
    body.insert("details".into(), json!(format!("Key ({}) already exists.", index.columns.join(", "))));
    body.insert("hint".into(), Value::Null);
    body.insert(
        "message".into(),
        json!(format!("duplicate key value violates unique constraint \"{}\"", index.name)),
    );
    ResponseTemplate::new(409).set_body_json(Value::Object(body))
}
