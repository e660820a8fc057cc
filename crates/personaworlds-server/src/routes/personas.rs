//! Persona CRUD, preview, digest, and profile publishing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::config::QuotaDefaults;
use personaworlds_core::storage::personas::{Persona, PersonaInput};
use personaworlds_core::storage::{digests, personas, profiles};
use personaworlds_core::timeutil;
use personaworlds_core::workflow;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or updating a persona.
#[derive(Deserialize)]
pub struct PersonaRequest {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub tone: String,
    pub writing_samples: Vec<String>,
    #[serde(default)]
    pub do_not_say: Vec<String>,
    #[serde(default)]
    pub catchphrases: Vec<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub formality: Option<i16>,
    #[serde(default)]
    pub daily_draft_quota: Option<i32>,
    #[serde(default)]
    pub daily_reply_quota: Option<i32>,
}

/// Validate a persona request into a storage input, applying configured
/// quota defaults.
fn parse_input(body: PersonaRequest, defaults: &QuotaDefaults) -> Result<PersonaInput, ApiError> {
    let name = body.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 80 {
        return Err(ApiError::validation("name must be 1-80 characters"));
    }

    if body.writing_samples.len() != 3 {
        return Err(ApiError::validation("exactly 3 writing samples are required"));
    }
    for sample in &body.writing_samples {
        if sample.trim().is_empty() || sample.chars().count() > 180 {
            return Err(ApiError::validation(
                "each writing sample must be 1-180 characters",
            ));
        }
    }
    for phrase in &body.do_not_say {
        if phrase.chars().count() > 120 {
            return Err(ApiError::validation("do_not_say entries are capped at 120 characters"));
        }
    }
    for phrase in &body.catchphrases {
        if phrase.chars().count() > 80 {
            return Err(ApiError::validation("catchphrases are capped at 80 characters"));
        }
    }

    let preferred_language = body.preferred_language.unwrap_or_else(|| "tr".to_string());
    if preferred_language != "tr" && preferred_language != "en" {
        return Err(ApiError::validation("preferred_language must be 'tr' or 'en'"));
    }

    let formality = body.formality.unwrap_or(1);
    if !(0..=3).contains(&formality) {
        return Err(ApiError::validation("formality must be between 0 and 3"));
    }

    let daily_draft_quota = body.daily_draft_quota.unwrap_or(defaults.draft);
    let daily_reply_quota = body.daily_reply_quota.unwrap_or(defaults.reply);
    if daily_draft_quota <= 0 || daily_reply_quota <= 0 {
        return Err(ApiError::validation("daily quotas must be positive"));
    }

    Ok(PersonaInput {
        name,
        bio: body.bio.trim().to_string(),
        tone: body.tone.trim().to_string(),
        writing_samples: body.writing_samples,
        do_not_say: body.do_not_say,
        catchphrases: body.catchphrases,
        preferred_language,
        formality,
        daily_draft_quota,
        daily_reply_quota,
    })
}

fn persona_json(persona: &Persona) -> Value {
    json!({
        "id": persona.id,
        "name": persona.name,
        "bio": persona.bio,
        "tone": persona.tone,
        "writing_samples": persona.writing_samples.0,
        "do_not_say": persona.do_not_say.0,
        "catchphrases": persona.catchphrases.0,
        "preferred_language": persona.preferred_language,
        "formality": persona.formality,
        "daily_draft_quota": persona.daily_draft_quota,
        "daily_reply_quota": persona.daily_reply_quota,
        "created_at": persona.created_at,
    })
}

async fn load_owned(
    state: &AppState,
    user_id: Uuid,
    persona_id: Uuid,
) -> Result<Persona, ApiError> {
    let persona = personas::get(&state.db, persona_id)
        .await?
        .ok_or_else(|| ApiError::not_found("persona not found"))?;
    if persona.user_id != user_id {
        return Err(ApiError(
            personaworlds_core::error::DomainError::Forbidden(
                "persona belongs to another user".to_string(),
            ),
        ));
    }
    Ok(persona)
}

/// `GET /personas` — all personas owned by the caller.
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let personas = personas::list_for_user(&state.db, user_id).await?;
    let body: Vec<Value> = personas.iter().map(persona_json).collect();
    Ok(Json(json!({ "personas": body })))
}

/// `POST /personas` — create a persona.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<PersonaRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let input = parse_input(body, &state.config.quotas)?;
    let persona = personas::create(&state.db, user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(persona_json(&persona))))
}

/// `GET /personas/{id}`.
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let persona = load_owned(&state, user_id, persona_id).await?;
    Ok(Json(persona_json(&persona)))
}

/// `PUT /personas/{id}` — replace mutable fields.
pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
    Json(body): Json<PersonaRequest>,
) -> Result<Json<Value>, ApiError> {
    load_owned(&state, user_id, persona_id).await?;
    let input = parse_input(body, &state.config.quotas)?;
    let persona = personas::update(&state.db, persona_id, &input).await?;
    Ok(Json(persona_json(&persona)))
}

/// `DELETE /personas/{id}` — delete the persona and its dependents.
pub async fn delete_one(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    load_owned(&state, user_id, persona_id).await?;
    personas::delete(&state.db, persona_id).await?;
    Ok(Json(json!({ "deleted": persona_id })))
}

/// Request body for preview generation.
#[derive(Deserialize)]
pub struct PreviewRequest {
    pub room_id: Uuid,
}

/// `POST /personas/{id}/preview` — two draft candidates, no post.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<Value>, ApiError> {
    let variants = workflow::draft::preview(
        &state.db,
        &state.llm,
        &state.config.limits,
        user_id,
        body.room_id,
        persona_id,
        state.config.quotas.preview,
    )
    .await?;
    Ok(Json(json!({ "variants": variants })))
}

/// `GET /personas/{id}/digest` — today's digest, if built.
pub async fn digest(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    load_owned(&state, user_id, persona_id).await?;
    let today = timeutil::today(chrono::Utc::now());
    let digest = digests::get(&state.db, persona_id, today)
        .await?
        .ok_or_else(|| ApiError::not_found("digest not built yet"))?;
    Ok(Json(json!({
        "persona_id": digest.persona_id,
        "date": digest.digest_date,
        "summary": digest.summary,
        "stats": digest.stats.0,
        "updated_at": digest.updated_at,
    })))
}

/// Request body for profile publishing.
#[derive(Deserialize, Default)]
pub struct PublishProfileRequest {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// `POST /personas/{id}/publish-profile` — make the persona publicly
/// addressable under a slug.
pub async fn publish_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(persona_id): Path<Uuid>,
    body: Option<Json<PublishProfileRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let persona = load_owned(&state, user_id, persona_id).await?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let slug = profiles::slugify(body.slug.as_deref().unwrap_or(&persona.name));
    if slug.is_empty() {
        return Err(ApiError::validation("slug has no usable characters"));
    }
    let bio = body.bio.unwrap_or_else(|| persona.bio.clone());

    let profile = match profiles::create(&state.db, persona_id, &slug, &bio).await {
        Ok(profile) => profile,
        Err(e) if e.is_unique_violation(None) => {
            return Err(ApiError::conflict("slug already taken or persona already published"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "persona_id": profile.persona_id,
            "slug": profile.slug,
            "is_public": profile.is_public,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> QuotaDefaults {
        QuotaDefaults {
            draft: 5,
            reply: 25,
            preview: 5,
        }
    }

    fn request() -> PersonaRequest {
        PersonaRequest {
            name: "Ayşe".to_string(),
            bio: "critic".to_string(),
            tone: "dry".to_string(),
            writing_samples: vec!["one".into(), "two".into(), "three".into()],
            do_not_say: vec![],
            catchphrases: vec![],
            preferred_language: None,
            formality: None,
            daily_draft_quota: None,
            daily_reply_quota: None,
        }
    }

    #[test]
    fn defaults_fill_in() {
        let input = parse_input(request(), &defaults()).expect("valid");
        assert_eq!(input.preferred_language, "tr");
        assert_eq!(input.formality, 1);
        assert_eq!(input.daily_draft_quota, 5);
        assert_eq!(input.daily_reply_quota, 25);
    }

    #[test]
    fn requires_exactly_three_samples() {
        let mut body = request();
        body.writing_samples.pop();
        assert!(parse_input(body, &defaults()).is_err());

        let mut body = request();
        body.writing_samples.push("four".into());
        assert!(parse_input(body, &defaults()).is_err());
    }

    #[test]
    fn sample_length_capped_at_180_runes() {
        let mut body = request();
        body.writing_samples[0] = "ğ".repeat(181);
        assert!(parse_input(body, &defaults()).is_err());

        let mut body = request();
        body.writing_samples[0] = "ğ".repeat(180);
        assert!(parse_input(body, &defaults()).is_ok());
    }

    #[test]
    fn rejects_unknown_language() {
        let mut body = request();
        body.preferred_language = Some("de".to_string());
        assert!(parse_input(body, &defaults()).is_err());
    }

    #[test]
    fn rejects_out_of_range_formality() {
        let mut body = request();
        body.formality = Some(4);
        assert!(parse_input(body, &defaults()).is_err());
    }

    #[test]
    fn rejects_non_positive_quota() {
        let mut body = request();
        body.daily_draft_quota = Some(0);
        assert!(parse_input(body, &defaults()).is_err());
    }
}
