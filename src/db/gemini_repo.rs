// src/db/gemini_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::gemini::{GeminiSettings, UpdateGeminiSettingsPayload},
};

#[derive(Clone)]
pub struct GeminiSettingsRepository {
    pool: PgPool,
}

impl GeminiSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, company_id: Uuid) -> Result<Option<GeminiSettings>, AppError> {
        let settings = sqlx::query_as::<_, GeminiSettings>(
            "SELECT * FROM gemini_settings WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    // UPSERT (Insert or Update). Chave ausente mantém a atual.
    pub async fn upsert(
        &self,
        company_id: Uuid,
        input: &UpdateGeminiSettingsPayload,
        default_model: &str,
    ) -> Result<GeminiSettings, AppError> {
        let model = input
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default_model);

        let settings = sqlx::query_as::<_, GeminiSettings>(
            r#"
            INSERT INTO gemini_settings
                (company_id, api_key, model, personality_prompt, products_prompt,
                 temperature, max_output_tokens, auto_reply_enabled)
            VALUES ($1, COALESCE($2, ''), $3, $4, $5, $6, $7, $8)
            ON CONFLICT (company_id)
            DO UPDATE SET
                api_key = COALESCE($2, gemini_settings.api_key),
                model = EXCLUDED.model,
                personality_prompt = EXCLUDED.personality_prompt,
                products_prompt = EXCLUDED.products_prompt,
                temperature = EXCLUDED.temperature,
                max_output_tokens = EXCLUDED.max_output_tokens,
                auto_reply_enabled = EXCLUDED.auto_reply_enabled,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(&input.api_key)
        .bind(model)
        .bind(&input.personality_prompt)
        .bind(&input.products_prompt)
        .bind(input.temperature)
        .bind(input.max_output_tokens)
        .bind(input.auto_reply_enabled)
        .fetch_one(&self.pool)
        .await?;

        Ok(settings)
    }
}
