use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of characters in a list preview, ellipsis included.
pub const PREVIEW_LEN: usize = 80;

/// A customer support request.
///
/// The submission fields (`customer_id`, `subject`, `message`) are fixed at
/// creation. Only `status` and `agent_notes` change afterwards, and only
/// through the service operations that own them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    /// Append-only, in the order the notes were added.
    #[serde(default)]
    pub agent_notes: Vec<String>,
    /// Every accepted status update, oldest first.
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn has_note(&self) -> bool {
        self.agent_notes.iter().any(|n| !n.trim().is_empty())
    }

    pub fn preview(&self) -> String {
        make_preview(&self.message)
    }
}

/// Where a ticket is in its lifecycle.
///
/// - `New`: Submitted, nobody has looked at it yet
/// - `Triaged`: An agent has assessed it
/// - `Closed`: Resolved; a closed ticket is never reopened
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[serde(alias = "open")]
    New,
    Triaged,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 3] = [Self::New, Self::Triaged, Self::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Triaged => "triaged",
            Self::Closed => "closed",
        }
    }

    /// Parses a wire value. `open` is the legacy spelling of `new`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" | "open" => Some(Self::New),
            "triaged" => Some(Self::Triaged),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        !matches!((self, next), (Self::Closed, to) if to != Self::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusTransition {
    pub from: TicketStatus,
    pub to: TicketStatus,
    pub at: DateTime<Utc>,
}

/// Input for submitting a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketInput {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /tickets/{id}/status`.
///
/// The status is kept as a raw string so that unknown or missing values
/// surface as an invalid transition rather than a body deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusInput {
    #[serde(default)]
    pub new_status: String,
}

/// Body of `POST /tickets/{id}/agent-note`. A missing note is a blank note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNoteInput {
    #[serde(default)]
    pub note: String,
}

/// Body of the legacy `PATCH /tickets/{id}`. Both fields are optional, but
/// unknown fields are rejected so a misspelled key is not a silent no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchTicketInput {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub agent_note: Option<String>,
}

/// Read-side row used by list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketListItem {
    pub id: Uuid,
    pub subject: String,
    pub status: TicketStatus,
    pub updated_at: DateTime<Utc>,
    pub preview: String,
    pub has_note: bool,
}

impl From<&Ticket> for TicketListItem {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id,
            subject: t.subject.clone(),
            status: t.status,
            updated_at: t.updated_at,
            preview: t.preview(),
            has_note: t.has_note(),
        }
    }
}

/// Query parameters for listing tickets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
    /// Accepts `true`/`false` as well as `1`/`0`, `yes`/`no` and `on`/`off`.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub has_note: Option<bool>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "invalid boolean: {:?}",
                other
            ))),
        },
    }
}

/// Ticket counts per status. Every status is always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: u64,
    pub triaged: u64,
    pub closed: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: TicketStatus, count: u64) {
        match status {
            TicketStatus::New => self.new += count,
            TicketStatus::Triaged => self.triaged += count,
            TicketStatus::Closed => self.closed += count,
        }
    }

    pub fn total(&self) -> u64 {
        self.new + self.triaged + self.closed
    }
}

/// Single-line preview of a message, truncated to [`PREVIEW_LEN`] characters.
pub fn make_preview(message: &str) -> String {
    let msg = message.trim().replace('\n', " ");
    if msg.chars().count() <= PREVIEW_LEN {
        return msg;
    }
    let mut out: String = msg.chars().take(PREVIEW_LEN - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in TicketStatus::ALL {
            assert_eq!(TicketStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn open_is_accepted_as_new() {
        assert_eq!(TicketStatus::from_str("open"), Some(TicketStatus::New));
        let parsed: TicketStatus = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(parsed, TicketStatus::New);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"new\"");
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(TicketStatus::from_str("escalated"), None);
        assert_eq!(TicketStatus::from_str("Triaged"), None);
        assert_eq!(TicketStatus::from_str(""), None);
    }

    #[test]
    fn closed_tickets_only_stay_closed() {
        assert!(TicketStatus::Closed.can_transition_to(TicketStatus::Closed));
        assert!(!TicketStatus::Closed.can_transition_to(TicketStatus::New));
        assert!(!TicketStatus::Closed.can_transition_to(TicketStatus::Triaged));
        assert!(TicketStatus::New.can_transition_to(TicketStatus::Closed));
        assert!(TicketStatus::Triaged.can_transition_to(TicketStatus::New));
    }

    #[test]
    fn preview_keeps_short_messages_and_flattens_newlines() {
        assert_eq!(make_preview("  hello\nworld  "), "hello world");
    }

    #[test]
    fn preview_truncates_long_messages() {
        let long = "x".repeat(200);
        let preview = make_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LEN);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let msg = "é".repeat(PREVIEW_LEN);
        assert_eq!(make_preview(&msg), msg);
    }

    #[test]
    fn missing_body_fields_default_to_empty() {
        let status: UpdateStatusInput = serde_json::from_str("{}").unwrap();
        assert_eq!(status.new_status, "");

        let note: AddNoteInput = serde_json::from_str("{}").unwrap();
        assert_eq!(note.note, "");
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let result = serde_json::from_str::<PatchTicketInput>(r#"{"new_status":"closed"}"#);
        assert!(result.is_err());

        let empty: PatchTicketInput = serde_json::from_str("{}").unwrap();
        assert!(empty.status.is_none() && empty.agent_note.is_none());
    }

    #[test]
    fn list_query_accepts_numeric_and_json_booleans() {
        let query: ListTicketsQuery = serde_json::from_str(r#"{"has_note":"1"}"#).unwrap();
        assert_eq!(query.has_note, Some(true));

        let query: ListTicketsQuery = serde_json::from_str(r#"{"has_note":false}"#).unwrap();
        assert_eq!(query.has_note, Some(false));

        let query: ListTicketsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.has_note, None);

        assert!(serde_json::from_str::<ListTicketsQuery>(r#"{"has_note":"maybe"}"#).is_err());
    }

    #[test]
    fn status_counts_track_each_status() {
        let mut counts = StatusCounts::default();
        counts.add(TicketStatus::New, 2);
        counts.add(TicketStatus::Closed, 1);
        assert_eq!(counts, StatusCounts { new: 2, triaged: 0, closed: 1 });
        assert_eq!(counts.total(), 3);
    }
}
