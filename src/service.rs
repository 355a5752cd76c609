//! Ticket lifecycle operations.
//!
//! [`TicketService`] is the only place that enforces ticket rules: required
//! submission fields, the status enumeration, the no-reopen rule for closed
//! tickets and append-only notes. Transport layers (HTTP, CLI) hand it raw
//! input and map its [`TicketError`]s onto their own surfaces.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Result, TicketError};
use crate::models::*;

#[derive(Clone)]
pub struct TicketService {
    db: Database,
}

impl TicketService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_ticket(&self, input: CreateTicketInput) -> Result<Ticket> {
        require("customer_id", &input.customer_id)?;
        require("subject", &input.subject)?;
        require("message", &input.message)?;

        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            subject: input.subject,
            message: input.message,
            status: TicketStatus::New,
            agent_notes: Vec::new(),
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_ticket(&ticket)?;

        tracing::info!(
            ticket_id = %ticket.id,
            customer_id = %ticket.customer_id,
            "Ticket created"
        );
        Ok(ticket)
    }

    pub fn get_ticket(&self, id: Uuid) -> Result<Ticket> {
        self.db.get_ticket(id)?.ok_or(TicketError::NotFound(id))
    }

    pub fn update_status(&self, id: Uuid, new_status: &str) -> Result<Ticket> {
        let ticket = self
            .db
            .modify_ticket(id, |ticket| apply_status(ticket, new_status))?
            .ok_or(TicketError::NotFound(id))?;

        tracing::info!(ticket_id = %id, status = %ticket.status, "Ticket status updated");
        Ok(ticket)
    }

    pub fn add_note(&self, id: Uuid, note: &str) -> Result<Ticket> {
        let ticket = self
            .db
            .modify_ticket(id, |ticket| apply_note(ticket, note))?
            .ok_or(TicketError::NotFound(id))?;

        tracing::info!(
            ticket_id = %id,
            notes = ticket.agent_notes.len(),
            "Agent note added"
        );
        Ok(ticket)
    }

    /// Legacy combined update: status first, then note, committed together.
    pub fn patch_ticket(&self, id: Uuid, patch: PatchTicketInput) -> Result<Ticket> {
        let ticket = self
            .db
            .modify_ticket(id, |ticket| {
                if let Some(status) = patch.status.as_deref() {
                    apply_status(ticket, status)?;
                }
                if let Some(note) = patch.agent_note.as_deref() {
                    apply_note(ticket, note)?;
                }
                Ok::<_, TicketError>(())
            })?
            .ok_or(TicketError::NotFound(id))?;

        tracing::info!(ticket_id = %id, status = %ticket.status, "Ticket patched");
        Ok(ticket)
    }

    pub fn list_tickets(&self, query: &ListTicketsQuery) -> Result<Vec<TicketListItem>> {
        Ok(self.db.list_tickets(query)?)
    }

    pub fn dashboard(&self) -> Result<StatusCounts> {
        Ok(self.db.status_counts()?)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TicketError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn apply_status(ticket: &mut Ticket, new_status: &str) -> Result<()> {
    let next = TicketStatus::from_str(new_status).ok_or_else(|| {
        TicketError::InvalidTransition(format!("Unknown status: {:?}", new_status))
    })?;

    if !ticket.status.can_transition_to(next) {
        return Err(TicketError::InvalidTransition(
            "Closed tickets cannot be reopened".to_string(),
        ));
    }

    let now = Utc::now();
    ticket.transitions.push(StatusTransition {
        from: ticket.status,
        to: next,
        at: now,
    });
    ticket.status = next;
    ticket.updated_at = now;
    Ok(())
}

fn apply_note(ticket: &mut Ticket, note: &str) -> Result<()> {
    require("note", note)?;
    ticket.agent_notes.push(note.to_string());
    ticket.updated_at = Utc::now();
    Ok(())
}
