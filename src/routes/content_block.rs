use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::content_block::ContentBlockResponse;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

/// Fetch an editable text block, e.g. the introduction shown on the login page
#[openapi(tag = "Content")]
#[get("/<key>")]
pub async fn get_content_block(repo: &State<PostgresRepository>, key: &str) -> Result<Json<ContentBlockResponse>, AppError> {
    let block = repo
        .get_content_block(key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Content block '{}' not found", key)))?;

    Ok(Json(ContentBlockResponse::from(&block)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_content_block]
}
