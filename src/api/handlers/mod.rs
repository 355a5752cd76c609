use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::extractor::{ApiJson, ApiQuery};
use crate::error::TicketError;
use crate::models::*;
use crate::service::TicketService;

// ============================================================
// Error Handling
// ============================================================

/// Client errors are returned with their message. Storage errors are logged
/// in full and the client only sees a generic message.
impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        let status = match &self {
            TicketError::Validation(_) | TicketError::InvalidTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            TicketError::NotFound(_) => StatusCode::NOT_FOUND,
            TicketError::Storage(e) => {
                tracing::error!("Internal error: {:#}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };

        tracing::warn!("Rejected request: {}", self);
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, TicketError>;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Commands
// ============================================================

pub async fn create_ticket(
    State(service): State<TicketService>,
    ApiJson(input): ApiJson<CreateTicketInput>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    service
        .create_ticket(input)
        .map(|t| (StatusCode::CREATED, Json(t)))
}

pub async fn update_status(
    State(service): State<TicketService>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateStatusInput>,
) -> ApiResult<Json<Ticket>> {
    service.update_status(id, &input.new_status).map(Json)
}

/// Legacy `PATCH` form accepting `status` and/or `agent_note`.
pub async fn patch_ticket(
    State(service): State<TicketService>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<PatchTicketInput>,
) -> ApiResult<Json<Ticket>> {
    service.patch_ticket(id, input).map(Json)
}

pub async fn add_note(
    State(service): State<TicketService>,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<AddNoteInput>,
) -> ApiResult<Json<Ticket>> {
    service.add_note(id, &input.note).map(Json)
}

// ============================================================
// Queries
// ============================================================

pub async fn get_ticket(
    State(service): State<TicketService>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Ticket>> {
    service.get_ticket(id).map(Json)
}

pub async fn list_tickets(
    State(service): State<TicketService>,
    ApiQuery(query): ApiQuery<ListTicketsQuery>,
) -> ApiResult<Json<Vec<TicketListItem>>> {
    service.list_tickets(&query).map(Json)
}

pub async fn dashboard(State(service): State<TicketService>) -> ApiResult<Json<StatusCounts>> {
    service.dashboard().map(Json)
}
