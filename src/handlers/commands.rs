//! Command endpoints: initialization, parsing, execution and the catalogue.

use crate::error::{AppError, AppResult};
use crate::intent::{CommandAction, MatchResult};
use crate::middleware::RequestId;
use crate::state::AppState;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    #[serde(flatten)]
    pub result: MatchResult,
    pub action: Option<CommandAction>,
    pub message: String,
}

/// POST /api/v1/commands/init
///
/// Runs initialization, or waits for the attempt already in flight.
pub async fn init_commands(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let start_time = Instant::now();
    state.parser.init().await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ready",
        "cached_phrases": state.parser.cache_len().await,
        "elapsed_ms": start_time.elapsed().as_millis() as u64
    })))
}

/// POST /api/v1/commands/parse
pub async fn parse_command(
    state: web::Data<AppState>,
    body: web::Json<CommandRequest>,
) -> AppResult<HttpResponse> {
    let result = parse(&state, &body.text).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/v1/commands/execute
///
/// Parses the text and dispatches the resulting action, if any.
pub async fn execute_command(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CommandRequest>,
) -> AppResult<HttpResponse> {
    let result = parse(&state, &body.text).await?;

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.to_string())
        .unwrap_or_default();
    let span = tracing::info_span!("execute_command", request_id = %request_id);

    let action = CommandAction::from_match(&result, state.parser.extractor());
    let message = span.in_scope(|| match &action {
        Some(action) => action.dispatch(),
        None => {
            tracing::info!(score = result.score, "Command not recognized: '{}'", body.text);
            "Command not recognized".to_string()
        }
    });

    Ok(HttpResponse::Ok().json(ExecuteResponse { result, action, message }))
}

/// GET /api/v1/commands/catalogue
pub async fn get_catalogue(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let catalogue = state.parser.catalogue();
    Ok(HttpResponse::Ok().json(json!({
        "intents": catalogue.intents(),
        "phrase_count": catalogue.phrase_count(),
        "threshold": state.threshold()
    })))
}

pub(crate) fn validate_text(state: &AppState, text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::ValidationError("Command text is empty".to_string()));
    }

    let max_chars = state.get_config().performance.max_input_chars;
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(AppError::ValidationError(format!(
            "Command text is {} characters, the limit is {}",
            chars, max_chars
        )));
    }
    Ok(())
}

async fn parse(state: &AppState, text: &str) -> AppResult<MatchResult> {
    validate_text(state, text)?;

    let result = state.parser.parse_command(text).await?;
    state.record_parse(result.is_match());

    Ok(result)
}
