use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::ClientIp;
use crate::models::password_reset_ticket::{PasswordResetCompleteRequest, PasswordResetRequest, PasswordResetResponse, TicketValidationResponse};
use crate::service::email::EmailService;
use crate::service::password_reset::PasswordResetService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use validator::Validate;

/// Request a password reset link
///
/// Answers the same way whether or not the email belongs to an account.
#[openapi(tag = "Password Reset")]
#[post("/request", data = "<payload>")]
pub async fn request_password_reset(
    repo: &State<PostgresRepository>,
    config: &State<Config>,
    client_ip: ClientIp,
    payload: Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    payload.validate()?;

    let notifier = EmailService::new(config.email.clone());
    let service = PasswordResetService::new(repo.inner(), &config.password_reset, &notifier);
    service.request_reset(&payload.email, client_ip.as_deref()).await?;

    Ok(Json(PasswordResetResponse::generic()))
}

/// Check whether a reset ticket can still be redeemed
#[openapi(tag = "Password Reset")]
#[get("/<ticket>")]
pub async fn validate_password_reset_ticket(
    repo: &State<PostgresRepository>,
    config: &State<Config>,
    ticket: &str,
) -> Result<Json<TicketValidationResponse>, AppError> {
    let Ok(ticket_id) = uuid::Uuid::parse_str(ticket) else {
        return Ok(Json(TicketValidationResponse::invalid()));
    };

    let notifier = EmailService::new(config.email.clone());
    let service = PasswordResetService::new(repo.inner(), &config.password_reset, &notifier);

    Ok(Json(service.validate_ticket(&ticket_id).await?))
}

/// Redeem a reset ticket and set a new password
#[openapi(tag = "Password Reset")]
#[post("/complete", data = "<payload>")]
pub async fn complete_password_reset(
    repo: &State<PostgresRepository>,
    config: &State<Config>,
    client_ip: ClientIp,
    payload: Json<PasswordResetCompleteRequest>,
) -> Result<Status, AppError> {
    payload.validate()?;

    let notifier = EmailService::new(config.email.clone());
    let service = PasswordResetService::new(repo.inner(), &config.password_reset, &notifier);
    service.complete_reset(&payload.ticket_id, &payload.new_password, client_ip.as_deref()).await?;

    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![request_password_reset, validate_password_reset_ticket, complete_password_reset]
}
