use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

/// The authenticated caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub user_id: Uuid,
    pub role: Option<String>,
}

impl Learner {
    pub fn has_role(&self, allowed: &[&str]) -> bool {
        self.role
            .as_deref()
            .map_or(false, |role| allowed.contains(&role))
    }
}

#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Learner, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| Error::Unauthorized("invalid_token".into()))?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| Error::Unauthorized("token subject is not a user id".into()))?;
        Ok(Learner {
            user_id,
            role: data.claims.role,
        })
    }
}

fn bearer_token(req: &Request) -> Result<&str, Error> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".into()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".into()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".into()))
}

pub async fn require_learner(
    State(keys): State<AuthKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, Error> {
    let learner = keys.verify(bearer_token(&req)?)?;
    req.extensions_mut().insert(learner);
    Ok(next.run(req).await)
}

/// Must run inside [`require_learner`].
pub async fn require_author(req: Request, next: Next) -> Result<Response, Error> {
    let allowed = req
        .extensions()
        .get::<Learner>()
        .map_or(false, |l| l.has_role(&["author", "admin"]));
    if !allowed {
        return Err(Error::AccessDenied("authoring requires the author role".into()));
    }
    Ok(next.run(req).await)
}
