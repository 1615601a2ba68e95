use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use serde::Deserialize;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;

use super::role::{Capabilities, Role};
use crate::errors::AppError;

/// Header carrying the user id, set by the authenticating gateway.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller and the role they act under for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Deserialize)]
struct RoleQuery {
    role: Option<String>,
}

impl Actor {
    pub fn capabilities(&self) -> Capabilities {
        self.role.capabilities()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Parse identity from headers and query string, without touching the
    /// database.
    pub fn from_parts(req: &HttpRequest) -> Result<Self, AppError> {
        let user_id = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(AppError::Unauthenticated)?;

        let query = web::Query::<RoleQuery>::from_query(req.query_string())
            .map_err(|_| AppError::PermissionDenied("Invalid role parameter.".to_string()))?;
        let raw = query
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AppError::PermissionDenied("Role parameter is required.".to_string()))?;
        let role = raw
            .parse::<Role>()
            .map_err(|_| AppError::PermissionDenied("Invalid role parameter.".to_string()))?;

        Ok(Actor { user_id, role })
    }
}

impl FromRequest for Actor {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let parsed = Actor::from_parts(req);
        let pool = req.app_data::<web::Data<PgPool>>().cloned();
        Box::pin(async move {
            let actor = parsed?;
            let pool = pool.ok_or_else(|| {
                log::error!("PgPool missing from app data");
                AppError::Unauthenticated
            })?;
            if !super::scope::user_exists(&pool, actor.user_id).await? {
                return Err(AppError::Unauthenticated);
            }
            if !super::scope::holds_role(&pool, actor.user_id, actor.role).await? {
                log::warn!("user {} claimed role {} without holding it", actor.user_id, actor.role);
                return Err(AppError::PermissionDenied(actor.role.not_held_message().to_string()));
            }
            Ok(actor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn parses_header_and_role() {
        let req = TestRequest::get()
            .uri("/syllabi/4/?role=dean")
            .insert_header((USER_ID_HEADER, "17"))
            .to_http_request();
        assert_eq!(
            Actor::from_parts(&req).unwrap(),
            Actor { user_id: 17, role: Role::Dean }
        );
    }

    #[test]
    fn missing_user_is_unauthenticated() {
        let req = TestRequest::get().uri("/syllabi/4/?role=DEAN").to_http_request();
        assert!(matches!(Actor::from_parts(&req), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn missing_or_unknown_role_is_forbidden() {
        let req = TestRequest::get()
            .uri("/syllabi/4/")
            .insert_header((USER_ID_HEADER, "17"))
            .to_http_request();
        match Actor::from_parts(&req) {
            Err(AppError::PermissionDenied(msg)) => assert_eq!(msg, "Role parameter is required."),
            other => panic!("unexpected {other:?}"),
        }

        let req = TestRequest::get()
            .uri("/syllabi/4/?role=STUDENT")
            .insert_header((USER_ID_HEADER, "17"))
            .to_http_request();
        match Actor::from_parts(&req) {
            Err(AppError::PermissionDenied(msg)) => assert_eq!(msg, "Invalid role parameter."),
            other => panic!("unexpected {other:?}"),
        }
    }
}
