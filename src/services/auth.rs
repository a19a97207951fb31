// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CompanyRepository,
    models::company::{Claims, Company},
};

#[derive(Clone)]
pub struct AuthService {
    company_repo: CompanyRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(company_repo: CompanyRepository, jwt_secret: String) -> Self {
        Self { company_repo, jwt_secret }
    }

    pub async fn register_company(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AppError> {
        // 1. Hashing fora do runtime async
        let password_clone = password.to_owned();
        let hashed_password = tokio::task::spawn_blocking(move || {
            hash(&password_clone, bcrypt::DEFAULT_COST)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        // 2. Cria a empresa (e-mail duplicado vira EmailAlreadyExists no repositório)
        let company = self
            .company_repo
            .create(name, &email.to_lowercase(), &hashed_password)
            .await?;

        tracing::info!("🏢 Empresa '{}' registrada ({})", company.name, company.id);

        // 3. Gera o token
        self.create_token(company.id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let company = self
            .company_repo
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = company.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }
        if !company.is_active() {
            return Err(AppError::CompanyInactive);
        }

        self.create_token(company.id)
    }

    /// Decodifica o token e carrega a empresa. Empresas suspensas perdem o acesso na hora.
    pub async fn validate_token(&self, token: &str) -> Result<Company, AppError> {
        let claims = self.decode_token(token)?;

        let company = self
            .company_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !company.is_active() {
            return Err(AppError::CompanyInactive);
        }
        Ok(company)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;
        Ok(token_data.claims)
    }

    fn create_token(&self, company_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: company_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
