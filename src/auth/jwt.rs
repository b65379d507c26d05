use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::domain::Role;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

/// Identity embedded in an access token at login.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: i32,
    pub username: &'a str,
    pub role: Role,
    pub cfc_name: Option<&'a str>,
    pub name: &'a str,
    pub require_password_change: bool,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::hours(config.jwt_expiry_hours),
        })
    }

    pub fn generate_token(&self, subject: &TokenSubject<'_>) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: subject.user_id,
            username: subject.username.to_owned(),
            role: subject.role,
            cfc_name: subject.cfc_name.map(str::to_owned),
            name: subject.name.to_owned(),
            require_password_change: subject.require_password_change,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub username: String,
    pub role: Role,
    #[serde(rename = "cfcName")]
    pub cfc_name: Option<String>,
    pub name: String,
    #[serde(rename = "requirePasswordChange")]
    pub require_password_change: bool,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
