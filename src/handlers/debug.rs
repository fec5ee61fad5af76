//! Debug endpoints for tuning the catalogue and the matching threshold.
//!
//! Useful during development to see how close an utterance lands to every
//! example phrase, without going through the accept/reject decision.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

use crate::device::DeviceManager;
use crate::error::AppResult;
use crate::handlers::commands::{validate_text, CommandRequest};
use crate::intent::matcher::RankedPhrase;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub text: String,
    pub threshold: f32,
    pub elapsed_ms: u64,
    pub ranking: Vec<RankedPhrase>,
}

/// POST /debug/rank
/// Body: {"text": "carica batteria 3"}
pub async fn rank_phrases(state: web::Data<AppState>, body: web::Json<CommandRequest>) -> AppResult<HttpResponse> {
    validate_text(&state, &body.text)?;
    let start_time = Instant::now();

    let ranking = state.parser.rank(&body.text).await?;
    tracing::debug!(
        "Debug: ranked '{}' against {} phrases, best {:?}",
        body.text,
        ranking.len(),
        ranking.first().map(|r| (&r.intent, r.score))
    );

    Ok(HttpResponse::Ok().json(RankResponse {
        text: body.into_inner().text,
        threshold: state.threshold(),
        elapsed_ms: start_time.elapsed().as_millis() as u64,
        ranking,
    }))
}

/// GET /debug/environment
pub async fn debug_environment(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let env_var = |name: &str| std::env::var(name).unwrap_or_else(|_| "not set".to_string());
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "hf_home": env_var("HF_HOME"),
        "hf_hub_cache": env_var("HF_HUB_CACHE"),
        "hf_token": if std::env::var("HF_TOKEN").is_ok() { "set" } else { "not set" },
        "https_proxy": env_var("HTTPS_PROXY"),
        "rust_log": env_var("RUST_LOG"),
        "embedding_model": config.models.embedding_model,
        "device": config.models.device,
        "devices": DeviceManager::get_device_summary(),
        "catalogue_path": config.matching.catalogue_path,
    })))
}

pub fn configure_debug_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/debug")
            .route("/rank", web::post().to(rank_phrases))
            .route("/environment", web::get().to(debug_environment)),
    );
}
