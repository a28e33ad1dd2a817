use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use coachdesk_llm::{build_messages, parse_scorecard, CompletionRequest};
use coachdesk_models::{
    derive_title, BalanceChange, ChatMessage, ChatMode, ChatOutcome, ChatResponse, ChatSession,
    ExchangeSession, NewChatExchange, NewChatSession, Page, PageQuery, RenameSessionRequest,
    SendMessageRequest,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::error::{
    bad_request, from_auth_error, from_database_error, json_rejection, not_found, path_rejection,
    query_rejection, upstream_error, validation_error, with_extension, ApiError, ApiResult,
};
use crate::middleware::{AuthUser, CorrelationId};
use crate::AppState;

// ============================================================================
// SEND
// ============================================================================

/// Send a message in coach or review mode.
///
/// The mode's cost is charged before the model is called and refunded if
/// the call fails or the exchange cannot be stored. Review output that fails the scorecard check is still a
/// 200, with `ok: false` and the raw text.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return json_rejection(rejection).into_response(),
    };

    let mode = request.mode;
    let result = send(&state, &user, correlation_id.as_str(), request).await;
    with_extension(result.map(Json), mode)
}

async fn send(
    state: &AppState,
    user: &AuthUser,
    correlation_id: &str,
    request: SendMessageRequest,
) -> Result<ChatResponse, ApiError> {
    request
        .validate()
        .map_err(|e| validation_error(&e.to_string()))?;

    let mode = request.mode;
    let text = request.message.trim();
    if text.is_empty() {
        return Err(validation_error("message must not be blank"));
    }
    let max_chars = state.config.chat.max_message_chars;
    if text.chars().count() > max_chars {
        return Err(bad_request(&format!(
            "message exceeds the maximum of {} characters",
            max_chars
        )));
    }

    let existing = match request.session_id {
        Some(id) => {
            let session = state
                .chats
                .get_session(id, &user.subject)
                .await
                .map_err(|e| from_database_error(e, correlation_id))?;
            if session.mode != mode {
                return Err(bad_request(&format!(
                    "Session {} is a {} session and cannot take {} messages",
                    id, session.mode, mode
                )));
            }
            Some(session)
        }
        None => None,
    };

    let history = match &existing {
        Some(session) => state
            .chats
            .recent_messages(session.id, state.config.chat.max_history_messages)
            .await
            .map_err(|e| from_database_error(e, correlation_id))?,
        None => Vec::new(),
    };

    let charge = state
        .billing
        .charge(&user.subject, state.config.chat.cost(mode), correlation_id)
        .await
        .map_err(|e| from_auth_error(e, correlation_id))?;

    let completion = match state
        .llm
        .complete(CompletionRequest {
            messages: build_messages(mode, &history, text),
            json_output: mode == ChatMode::Review,
        })
        .await
    {
        Ok(completion) => completion,
        Err(e) => {
            warn!(
                correlation_id = %correlation_id,
                provider = state.llm.name(),
                "Completion failed: {}",
                e
            );
            refund(state, &charge, correlation_id).await;
            return Err(upstream_error(
                correlation_id,
                "The language model request failed. Please try again.",
            ));
        }
    };

    let session = match existing {
        Some(session) => ExchangeSession::Existing {
            id: session.id,
            owner_subject: session.owner_subject,
        },
        None => ExchangeSession::New(NewChatSession {
            organization_id: user.organization_id,
            owner_subject: user.subject.clone(),
            mode,
            title: Some(derive_title(text, state.config.chat.title_chars)),
        }),
    };

    let (session, reply) = match state
        .chats
        .record_exchange(&NewChatExchange {
            session,
            user_content: text.to_string(),
            reply_content: completion.text.clone(),
            usage: completion.usage,
            correlation_id: correlation_id.to_string(),
        })
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            refund(state, &charge, correlation_id).await;
            return Err(from_database_error(e, correlation_id));
        }
    };

    let outcome = shape_outcome(mode, completion.text);
    if let ChatOutcome::Unscored { error, .. } = &outcome {
        info!(
            correlation_id = %correlation_id,
            session_id = %session.id,
            "Review reply failed the scorecard check: {}",
            error
        );
    }

    Ok(ChatResponse::new(
        mode,
        session.id,
        reply.id,
        outcome,
        completion.usage,
        charge.balance,
    ))
}

/// Give back a charge whose exchange was not delivered
async fn refund(state: &AppState, charge: &BalanceChange, correlation_id: &str) {
    if let Err(e) = state.billing.refund(charge, correlation_id).await {
        error!(
            correlation_id = %correlation_id,
            organization_id = %charge.organization_id,
            "Refund did not apply: {}",
            e
        );
    }
}

/// Coach text passes through; review text must be a valid scorecard
pub fn shape_outcome(mode: ChatMode, text: String) -> ChatOutcome {
    match mode {
        ChatMode::Coach => ChatOutcome::Coach { reply: text },
        ChatMode::Review => match parse_scorecard(&text) {
            Ok(scorecard) => ChatOutcome::Scored { scorecard },
            Err(error) => ChatOutcome::Unscored { raw: text, error },
        },
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

/// List own sessions, newest first
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<ChatSession>> {
    let Query(query) = query.map_err(query_rejection)?;
    let cursor = query.cursor().map_err(|e| bad_request(&e.to_string()))?;
    let limit = query.limit();

    let rows = state
        .chats
        .list_sessions(&user.subject, cursor, limit)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    Ok(Json(Page::from_overfetch(rows, limit)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ChatSession> {
    let Path(id) = id.map_err(path_rejection)?;

    let session = state
        .chats
        .get_session(id, &user.subject)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    Ok(Json(session))
}

pub async fn rename_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RenameSessionRequest>, JsonRejection>,
) -> ApiResult<ChatSession> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(request) = payload.map_err(json_rejection)?;
    request
        .validate()
        .map_err(|e| validation_error(&e.to_string()))?;

    let title = request.title.trim();
    if title.is_empty() {
        return Err(validation_error("title must not be blank"));
    }

    let session = state
        .chats
        .rename_session(id, &user.subject, title)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    Ok(Json(session))
}

/// Delete a session and its messages
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id.map_err(path_rejection)?;

    let deleted = state
        .chats
        .delete_session(id, &user.subject)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    if !deleted {
        return Err(not_found(&format!("Chat session with id {} not found", id)));
    }

    info!(session_id = %id, subject = %user.subject, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Messages of an owned session, oldest first
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    correlation_id: CorrelationId,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<ChatMessage>> {
    let Path(id) = id.map_err(path_rejection)?;
    let Query(query) = query.map_err(query_rejection)?;
    let cursor = query.cursor().map_err(|e| bad_request(&e.to_string()))?;
    let limit = query.limit();

    // Ownership check; foreign sessions read as missing
    state
        .chats
        .get_session(id, &user.subject)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    let rows = state
        .chats
        .list_messages(id, cursor, limit)
        .await
        .map_err(|e| from_database_error(e, correlation_id.as_str()))?;

    Ok(Json(Page::from_overfetch(rows, limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coach_text_passes_through() {
        let outcome = shape_outcome(ChatMode::Coach, "{ not json".to_string());
        assert!(matches!(outcome, ChatOutcome::Coach { ref reply } if reply == "{ not json"));
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_malformed_review_is_surfaced_raw() {
        let raw = r#"{ "overall_score": "eight", "summary": "x" }"#.to_string();
        let outcome = shape_outcome(ChatMode::Review, raw.clone());

        assert!(!outcome.is_ok());
        let response = ChatResponse::new(
            ChatMode::Review,
            Uuid::nil(),
            Uuid::nil(),
            outcome,
            Default::default(),
            5,
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["raw"], raw);
        assert!(json.get("scorecard").is_none());
        assert!(json["error"].as_str().unwrap().starts_with("invalid scorecard"));
    }

    #[test]
    fn test_valid_review_is_scored() {
        let raw = r#"{
            "overall_score": 8,
            "summary": "Good",
            "criteria": [{ "name": "clarity", "score": 8, "comment": "clear" }],
            "strengths": [],
            "improvements": ["shorter intro"]
        }"#;
        let outcome = shape_outcome(ChatMode::Review, raw.to_string());
        let ChatOutcome::Scored { scorecard } = outcome else {
            panic!("expected a scorecard");
        };
        assert_eq!(scorecard.criteria[0].name, "clarity");
    }
}
