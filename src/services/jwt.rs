use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::{Role, User};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub phone: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct JwtService;

impl JwtService {
    fn generate(
        user_id: &ObjectId,
        phone: &str,
        role: Role,
        secret: &str,
        expiry: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_hex(),
            phone: phone.to_string(),
            role,
            exp: now + expiry,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn generate_access_token(
        user_id: &ObjectId,
        phone: &str,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        Self::generate(
            user_id,
            phone,
            role,
            &crate::config::Config::jwt_secret(),
            crate::config::Config::jwt_expiry(),
        )
    }

    pub fn generate_refresh_token(
        user_id: &ObjectId,
        phone: &str,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        Self::generate(
            user_id,
            phone,
            role,
            &crate::config::Config::jwt_refresh_secret(),
            crate::config::Config::jwt_refresh_expiry(),
        )
    }

    /// Mint the access/refresh pair for an authenticated identity.
    pub fn issue_pair(user: &User) -> Result<TokenPair, jsonwebtoken::errors::Error> {
        let user_id = user.id.ok_or_else(|| {
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSubject)
        })?;
        Ok(TokenPair {
            access_token: Self::generate_access_token(&user_id, &user.phone, user.role)?,
            refresh_token: Self::generate_refresh_token(&user_id, &user.phone, user.role)?,
        })
    }

    pub fn verify_token(
        token: &str,
        is_refresh: bool,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = if is_refresh {
            crate::config::Config::jwt_refresh_secret()
        } else {
            crate::config::Config::jwt_secret()
        };

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let user_id = ObjectId::new();
        let token = JwtService::generate_access_token(&user_id, "0712345678", Role::Member)
            .expect("token generation");
        let claims = JwtService::verify_token(&token, false).expect("token verification");
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.phone, "0712345678");
    }

    #[test]
    fn refresh_secret_rejects_access_token() {
        let user_id = ObjectId::new();
        let token =
            JwtService::generate_access_token(&user_id, "0712345678", Role::Member).unwrap();
        assert!(JwtService::verify_token(&token, true).is_err());
    }
}
