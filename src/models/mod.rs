//! Domain models for ticketdesk.
//!
//! - [`Ticket`]: the write-side document. Submission fields are immutable;
//!   `status` moves through [`TicketStatus`] and `agent_notes` only grows.
//! - [`TicketListItem`]: the read-side projection row served by list queries.
//! - Request bodies ([`CreateTicketInput`], [`UpdateStatusInput`],
//!   [`AddNoteInput`], [`PatchTicketInput`]) and query types.

mod ticket;

pub use ticket::*;
