// src/common/signature.rs

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::common::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Cabeçalho enviado pela Meta em cada POST do webhook.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Confere `sha256=<hex>` contra o HMAC-SHA256 do corpo bruto.
/// A comparação é feita em tempo constante pelo próprio `hmac`.
pub fn verify_hub_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> Result<(), AppError> {
    let header = header.ok_or(AppError::InvalidSignature)?;
    let hex_sig = header
        .strip_prefix("sha256=")
        .ok_or(AppError::InvalidSignature)?;
    let received = hex::decode(hex_sig).map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Segredo do app inválido: {}", e))?;
    mac.update(body);
    mac.verify_slice(&received).map_err(|_| AppError::InvalidSignature)
}

/// Gera o valor do cabeçalho para um corpo (usado nos testes e em ferramentas).
pub fn sign_hub_payload(app_secret: &str, body: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Segredo do app inválido: {}", e))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "app-secret";

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"object":"page","entry":[]}"#;
        let header = sign_hub_payload(SECRET, body).unwrap();
        assert!(verify_hub_signature(SECRET, body, Some(&header)).is_ok());
    }

    #[test]
    fn rejects_tampered_body_and_bad_headers() {
        let body = br#"{"object":"page"}"#;
        let header = sign_hub_payload(SECRET, body).unwrap();

        let tampered = br#"{"object":"user"}"#;
        assert!(matches!(
            verify_hub_signature(SECRET, tampered, Some(&header)),
            Err(AppError::InvalidSignature)
        ));
        assert!(verify_hub_signature(SECRET, body, None).is_err());
        assert!(verify_hub_signature(SECRET, body, Some("sha1=abcd")).is_err());
        assert!(verify_hub_signature(SECRET, body, Some("sha256=zz-not-hex")).is_err());
        assert!(verify_hub_signature("other-secret", body, Some(&header)).is_err());
    }
}
