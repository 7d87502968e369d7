use models::Table;
use std::cmp::Ordering;

/// Select is a read of rows from a Table, restricted by equality-style filters.
/// It's a backend-neutral description which is rendered into a PostgREST
/// request by `Client`, and evaluated directly by `MemoryService`.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value.
    Eq(&'static str, String),
    /// Column equals any of the values.
    In(&'static str, Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn eq(mut self, column: &'static str, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq(column, value.to_string()));
        self
    }

    pub fn in_<I, V>(mut self, column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters.push(Filter::In(
            column,
            values.into_iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            ascending: true,
        });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order.push(Order {
            column,
            ascending: false,
        });
        self
    }

    /// Render PostgREST `order` parameter, such as "date.desc,total_picks.desc".
    pub fn order_param(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        Some(
            self.order
                .iter()
                .map(|Order { column, ascending }| {
                    format!("{column}.{}", if *ascending { "asc" } else { "desc" })
                })
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Returns true if `row` passes all filters of this Select.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
    }

    /// Sort `rows` in place according to the order of this Select.
    pub fn sort(&self, rows: &mut [serde_json::Value]) {
        rows.sort_by(|lhs, rhs| {
            for Order { column, ascending } in &self.order {
                let ord = compare_json(lhs.get(*column), rhs.get(*column));
                let ord = if *ascending { ord } else { ord.reverse() };

                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        })
    }
}

impl Filter {
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match self {
            Filter::Eq(column, value) => json_text(row.get(*column)).as_deref() == Some(value),
            Filter::In(column, values) => match json_text(row.get(*column)) {
                Some(text) => values.iter().any(|v| v == &text),
                None => false,
            },
        }
    }
}

// Render a JSON scalar in the textual form PostgREST compares filters against.
fn json_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// Order JSON values as Postgres would: NULLs sort last in ascending order.
fn compare_json(lhs: Option<&serde_json::Value>, rhs: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;

    let lhs = lhs.filter(|v| !v.is_null());
    let rhs = rhs.filter(|v| !v.is_null());

    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(l)), Some(Value::Number(r))) => l
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&r.as_f64().unwrap_or_default()),
        (Some(Value::String(l)), Some(Value::String(r))) => l.cmp(r),
        (Some(Value::Bool(l)), Some(Value::Bool(r))) => l.cmp(r),
        (Some(l), Some(r)) => l.to_string().cmp(&r.to_string()),
    }
}

/// Kind of a row change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// Events of a change channel: one kind, or any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    Only(EventKind),
}

impl EventFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventFilter::All => "*",
            EventFilter::Only(EventKind::Insert) => "INSERT",
            EventFilter::Only(EventKind::Update) => "UPDATE",
            EventFilter::Only(EventKind::Delete) => "DELETE",
        }
    }

    pub fn admits(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(only) => *only == kind,
        }
    }
}

/// ChannelFilter identifies a stream of change notifications:
/// changes of `event` kind to rows of `table` having `column` equal to `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelFilter {
    pub table: Table,
    pub event: EventFilter,
    pub column: &'static str,
    pub value: String,
}

impl ChannelFilter {
    /// Changes of any kind to `table` rows within the warehouse.
    pub fn warehouse(table: Table, warehouse_id: uuid::Uuid) -> Self {
        Self {
            table,
            event: EventFilter::All,
            column: "warehouse_id",
            value: warehouse_id.to_string(),
        }
    }

    pub fn only(self, kind: EventKind) -> Self {
        Self {
            event: EventFilter::Only(kind),
            ..self
        }
    }

    /// Render the Realtime filter expression, such as "warehouse_id=eq.1234".
    pub fn filter_expr(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }

    /// Returns true if `event` is a change selected by this filter.
    pub fn admits(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table || !self.event.admits(event.kind) {
            return false;
        }
        let row = match event.kind {
            EventKind::Delete => &event.old_record,
            _ => &event.record,
        };
        Filter::Eq(self.column, self.value.clone()).matches(row)
    }
}

impl std::fmt::Display for ChannelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.table,
            self.event.as_str(),
            self.filter_expr()
        )
    }
}

/// ChangeEvent is a notification of a change to a table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: EventKind,
    pub record: serde_json::Value,
    pub old_record: serde_json::Value,
}
