mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Value, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::*;

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

/// Ticket document store backed by SQLite.
///
/// Each ticket lives as one JSON document in `tickets`. Every write also
/// refreshes the ticket's row in `ticket_reads`, the projection that list
/// and dashboard queries run against. A single connection sits behind a
/// mutex, so holding the lock for a load/modify/save sequence makes that
/// sequence atomic per ticket.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "ticketdesk")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("tickets.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        let applied = schema::run_migrations(&conn)?;
        drop(conn);

        if applied.contains(&schema::READ_PROJECTION_VERSION) {
            let rebuilt = self.rebuild_projection()?;
            tracing::info!("Built read projection for {} tickets", rebuilt);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    // ============================================================
    // Write side
    // ============================================================

    pub fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO tickets (id, document, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                ticket.id.to_string(),
                to_document(ticket)?,
                ticket.status.as_str(),
                format_datetime(ticket.created_at),
                format_datetime(ticket.updated_at),
            ),
        )?;
        project(&tx, ticket)?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>> {
        let conn = self.lock()?;
        load(&conn, id)
    }

    /// Loads a ticket, lets `apply` mutate it, then saves and re-projects it
    /// in one transaction.
    ///
    /// Returns `Ok(None)` when the ticket does not exist. If `apply` fails
    /// nothing is written and its error is returned unchanged.
    pub fn modify_ticket<E, F>(&self, id: Uuid, apply: F) -> std::result::Result<Option<Ticket>, E>
    where
        F: FnOnce(&mut Ticket) -> std::result::Result<(), E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let Some(mut ticket) = load(&tx, id)? else {
            return Ok(None);
        };
        apply(&mut ticket)?;
        save(&tx, &ticket)?;
        project(&tx, &ticket)?;

        tx.commit().map_err(anyhow::Error::from)?;
        Ok(Some(ticket))
    }

    // ============================================================
    // Read side
    // ============================================================

    pub fn list_tickets(&self, query: &ListTicketsQuery) -> Result<Vec<TicketListItem>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        let skip = query.skip.unwrap_or(0);

        let mut sql = String::from(
            "SELECT id, subject, status, updated_at, preview, has_note FROM ticket_reads",
        );
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(status) = query.status {
            clauses.push("status = ?");
            params.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(has_note) = query.has_note {
            clauses.push("has_note = ?");
            params.push(Value::Integer(has_note as i64));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY updated_at DESC, id LIMIT ? OFFSET ?");
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(skip as i64));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok(TicketListItem {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    subject: row.get(1)?,
                    status: TicketStatus::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(TicketStatus::New),
                    updated_at: parse_datetime(row.get::<_, String>(3)?),
                    preview: row.get(4)?,
                    has_note: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    pub fn status_counts(&self) -> Result<StatusCounts> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM ticket_reads GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match TicketStatus::from_str(&status) {
                Some(status) => counts.add(status, count as u64),
                None => tracing::warn!("Skipping unknown status in projection: {}", status),
            }
        }
        Ok(counts)
    }

    /// Recomputes every row of the read projection from the ticket documents.
    pub fn rebuild_projection(&self) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let documents: Vec<String> = {
            let mut stmt = tx.prepare("SELECT document FROM tickets")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        tx.execute("DELETE FROM ticket_reads", [])?;
        for document in &documents {
            project(&tx, &from_document(document)?)?;
        }

        tx.commit()?;
        Ok(documents.len())
    }
}

fn load(conn: &Connection, id: Uuid) -> Result<Option<Ticket>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM tickets WHERE id = ?",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    document.as_deref().map(from_document).transpose()
}

fn save(conn: &Connection, ticket: &Ticket) -> Result<()> {
    conn.execute(
        "UPDATE tickets SET document = ?, status = ?, updated_at = ? WHERE id = ?",
        (
            to_document(ticket)?,
            ticket.status.as_str(),
            format_datetime(ticket.updated_at),
            ticket.id.to_string(),
        ),
    )?;
    Ok(())
}

fn project(conn: &Connection, ticket: &Ticket) -> Result<()> {
    let item = TicketListItem::from(ticket);
    conn.execute(
        "INSERT INTO ticket_reads (id, subject, status, updated_at, preview, has_note)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            subject = excluded.subject,
            status = excluded.status,
            updated_at = excluded.updated_at,
            preview = excluded.preview,
            has_note = excluded.has_note",
        (
            item.id.to_string(),
            &item.subject,
            item.status.as_str(),
            format_datetime(item.updated_at),
            &item.preview,
            item.has_note as i64,
        ),
    )?;
    Ok(())
}

fn to_document(ticket: &Ticket) -> Result<String> {
    serde_json::to_string(ticket).context("Failed to serialize ticket document")
}

fn from_document(document: &str) -> Result<Ticket> {
    serde_json::from_str(document).context("Corrupt ticket document")
}

// Fixed-width so that lexicographic order in SQL matches time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetimes_sort_lexicographically() {
        let whole = DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let fractional = DateTime::parse_from_rfc3339("2026-01-01T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(format_datetime(whole) < format_datetime(fractional));
        assert_eq!(format_datetime(fractional), "2026-01-01T10:00:00.500000000Z");
    }

    #[test]
    fn formatted_datetimes_parse_back() {
        let now = Utc::now();
        assert_eq!(parse_datetime(format_datetime(now)), now);
    }
}
