//! `RemoteStore` implementation over SQLite.

use super::Database;
use super::rows::{
    filter_columns, parse_activity, parse_link, parse_member, parse_priority,
    parse_project, parse_section, parse_status, parse_task, parse_type, parse_wiki,
    tracks_updates, updatable_columns,
};
use crate::store::{Collection, FieldValue, Filter, OrderBy, RemoteStore, Row, StoreError, StoreResult};
use crate::types::{Activity, DATE_FORMAT, Id, now_ms};
use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{Connection, params};
use std::collections::HashMap;

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            FieldValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(s.as_str().into()),
        })
    }
}

/// Run a prepared statement and wrap every parsed row.
fn query_rows<T>(
    conn: &Connection,
    sql: &str,
    parse: fn(&rusqlite::Row) -> rusqlite::Result<T>,
    wrap: fn(T) -> Row,
) -> StoreResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], parse)?
        .map(|r| r.map(wrap))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Load every activity grouped by task id, oldest first.
fn activities_by_task(conn: &Connection) -> StoreResult<HashMap<Id, Vec<Activity>>> {
    let mut stmt = conn.prepare("SELECT * FROM activities ORDER BY created_at ASC, id ASC")?;
    let mut grouped: HashMap<Id, Vec<Activity>> = HashMap::new();
    for activity in stmt.query_map([], parse_activity)? {
        let activity = activity?;
        grouped.entry(activity.task_id).or_default().push(activity);
    }
    Ok(grouped)
}

fn select_internal(conn: &Connection, collection: Collection, order: OrderBy) -> StoreResult<Vec<Row>> {
    let direction = if order.ascending { "ASC" } else { "DESC" };
    let sql = format!(
        "SELECT * FROM {} ORDER BY {} {}, id {}",
        collection.table_name(),
        order.column,
        direction,
        direction
    );

    match collection {
        Collection::Projects => query_rows(conn, &sql, parse_project, Row::Project),
        Collection::Sections => query_rows(conn, &sql, parse_section, Row::Section),
        Collection::TaskStatuses => query_rows(conn, &sql, parse_status, Row::Status),
        Collection::TaskPriorities => query_rows(conn, &sql, parse_priority, Row::Priority),
        Collection::TaskTypes => query_rows(conn, &sql, parse_type, Row::Type),
        Collection::ProjectMembers => query_rows(conn, &sql, parse_member, Row::Member),
        Collection::TaskProjects => query_rows(conn, &sql, parse_link, Row::Link),
        Collection::Wikis => query_rows(conn, &sql, parse_wiki, Row::Wiki),
        Collection::Tasks => {
            let mut activities = activities_by_task(conn)?;
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks
                .into_iter()
                .map(|mut task| {
                    task.activities = activities.remove(&task.id).unwrap_or_default();
                    Row::Task(task)
                })
                .collect())
        }
    }
}

/// Re-read a single row by id, with the same shape `select` returns.
fn fetch_one(conn: &Connection, collection: Collection, id: Id) -> StoreResult<Row> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1", collection.table_name());
    let mut stmt = conn.prepare(&sql)?;
    let result = match collection {
        Collection::Projects => stmt.query_row(params![id.0], parse_project).map(Row::Project),
        Collection::Sections => stmt.query_row(params![id.0], parse_section).map(Row::Section),
        Collection::TaskStatuses => stmt.query_row(params![id.0], parse_status).map(Row::Status),
        Collection::TaskPriorities => {
            stmt.query_row(params![id.0], parse_priority).map(Row::Priority)
        }
        Collection::TaskTypes => stmt.query_row(params![id.0], parse_type).map(Row::Type),
        Collection::ProjectMembers => stmt.query_row(params![id.0], parse_member).map(Row::Member),
        Collection::TaskProjects => stmt.query_row(params![id.0], parse_link).map(Row::Link),
        Collection::Wikis => stmt.query_row(params![id.0], parse_wiki).map(Row::Wiki),
        Collection::Tasks => stmt.query_row(params![id.0], parse_task).map(Row::Task),
    };

    match result {
        Ok(row) => Ok(row),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound { collection, id }),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    fn insert_row(&self, row: Row) -> StoreResult<Row> {
        let now = now_ms();
        let collection = row.collection();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            match row {
                Row::Project(p) => {
                    tx.execute(
                        "INSERT INTO projects (
                            name, key, description, color, icon, current_task_number, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                        params![p.name, p.key, p.description, p.color, p.icon, now],
                    )?;
                }
                Row::Task(t) => {
                    // Key generation belongs to the store: bump the project's counter in the
                    // same transaction as the insert.
                    let bumped = tx.execute(
                        "UPDATE projects SET current_task_number = current_task_number + 1,
                                updated_at = ?2
                         WHERE id = ?1",
                        params![t.project_id.0, now],
                    )?;
                    if bumped == 0 {
                        return Err(StoreError::NotFound {
                            collection: Collection::Projects,
                            id: t.project_id,
                        });
                    }
                    let (prefix, number): (String, i64) = tx.query_row(
                        "SELECT key, current_task_number FROM projects WHERE id = ?1",
                        params![t.project_id.0],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )?;
                    tx.execute(
                        "INSERT INTO tasks (
                            project_id, parent_id, section_id, assignee_id, key, title, description,
                            status_id, priority_id, type_id, due_date, completed, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                        params![
                            t.project_id.0,
                            t.parent_id.map(Id::get),
                            t.section_id.map(Id::get),
                            t.assignee_id.map(Id::get),
                            format!("{}-{}", prefix, number),
                            t.title,
                            t.description,
                            t.status_id.0,
                            t.priority_id.map(Id::get),
                            t.type_id.map(Id::get),
                            t.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
                            t.completed,
                            now,
                        ],
                    )?;
                }
                Row::Section(s) => {
                    tx.execute(
                        "INSERT INTO sections (project_id, title, order_index, color, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![s.project_id.0, s.title, s.order_index, s.color, now],
                    )?;
                }
                Row::Status(s) => {
                    tx.execute(
                        "INSERT INTO task_statuses (project_id, name, position, color, icon)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![s.project_id.0, s.name, s.position, s.color, s.icon],
                    )?;
                }
                Row::Priority(p) => {
                    tx.execute(
                        "INSERT INTO task_priorities (project_id, name, position, color, icon)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![p.project_id.0, p.name, p.position, p.color, p.icon],
                    )?;
                }
                Row::Type(t) => {
                    tx.execute(
                        "INSERT INTO task_types (project_id, name, position, color, icon)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![t.project_id.0, t.name, t.position, t.color, t.icon],
                    )?;
                }
                Row::Member(m) => {
                    tx.execute(
                        "INSERT INTO project_members (project_id, name, email, color, position)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![m.project_id.0, m.name, m.email, m.color, m.position],
                    )?;
                }
                Row::Link(l) => {
                    tx.execute(
                        "INSERT INTO task_projects (task_id, project_id, position)
                         VALUES (?1, ?2, ?3)",
                        params![l.task_id.0, l.project_id.0, l.position],
                    )?;
                }
                Row::Wiki(w) => {
                    tx.execute(
                        "INSERT INTO wikis (project_id, title, content, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)",
                        params![w.project_id.0, w.title, w.content, now],
                    )?;
                }
            }

            let id = Id(tx.last_insert_rowid());
            let inserted = fetch_one(&tx, collection, id)?;
            tx.commit()?;
            Ok(inserted)
        })
    }

    fn update_column(
        &self,
        collection: Collection,
        id: Id,
        column: &str,
        value: FieldValue,
    ) -> StoreResult<()> {
        if !updatable_columns(collection).contains(&column) {
            return Err(StoreError::UnknownColumn {
                collection,
                column: column.to_string(),
            });
        }

        self.with_conn(|conn| {
            let changed = if tracks_updates(collection) {
                let sql = format!(
                    "UPDATE {} SET {} = ?1, updated_at = ?3 WHERE id = ?2",
                    collection.table_name(),
                    column
                );
                conn.execute(&sql, params![value, id.0, now_ms()])?
            } else {
                let sql = format!(
                    "UPDATE {} SET {} = ?1 WHERE id = ?2",
                    collection.table_name(),
                    column
                );
                conn.execute(&sql, params![value, id.0])?
            };

            if changed == 0 {
                return Err(StoreError::NotFound { collection, id });
            }
            Ok(())
        })
    }

    fn delete_rows(&self, collection: Collection, filter: Filter) -> StoreResult<usize> {
        let (column, id) = match filter {
            Filter::Id(id) => ("id", id),
            Filter::Column(column, id) => {
                if !filter_columns(collection).contains(&column) {
                    return Err(StoreError::UnknownColumn {
                        collection,
                        column: column.to_string(),
                    });
                }
                (column, id)
            }
        };

        self.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE {} = ?1", collection.table_name(), column);
            Ok(conn.execute(&sql, params![id.0])?)
        })
    }
}

#[async_trait]
impl RemoteStore for Database {
    async fn select(&self, collection: Collection, order: OrderBy) -> StoreResult<Vec<Row>> {
        self.with_conn(|conn| select_internal(conn, collection, order))
    }

    async fn insert(&self, row: Row) -> StoreResult<Row> {
        self.insert_row(row)
    }

    async fn update(
        &self,
        collection: Collection,
        id: Id,
        column: &str,
        value: FieldValue,
    ) -> StoreResult<()> {
        self.update_column(collection, id, column, value)
    }

    async fn delete(&self, collection: Collection, filter: Filter) -> StoreResult<usize> {
        self.delete_rows(collection, filter)
    }
}
