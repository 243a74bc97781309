use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::{Admin, Editor},
    database::NoteStore,
    error::AppError,
    models::{Counter, ListQuery, NoteEdit},
    state::AppState,
    utils::read_upload,
};

#[cfg(test)]
mod tests;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn list_handler<N: NoteStore>(
    State(state): State<Arc<AppState<N>>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let notes = state
        .notes
        .list_approved(query.q.as_deref(), query.sort.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(notes)))
}

pub async fn admin_list_handler<N: NoteStore>(
    _admin: Admin,
    State(state): State<Arc<AppState<N>>>,
) -> Result<impl IntoResponse, AppError> {
    Ok((StatusCode::OK, Json(state.notes.list_all().await?)))
}

pub async fn get_handler<N: NoteStore>(
    admin: Option<Admin>,
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let note = state.notes.get(&id, admin.is_some()).await?;

    Ok((StatusCode::OK, Json(note)))
}

pub async fn upload_handler<N: NoteStore>(
    State(state): State<Arc<AppState<N>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let form = read_upload(multipart, state.notes.max_upload_bytes()).await?;
    let note = state.notes.upload(form).await?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn approve_handler<N: NoteStore>(
    _admin: Admin,
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok((StatusCode::OK, Json(state.notes.approve(&id).await?)))
}

pub async fn edit_handler<N: NoteStore>(
    _editor: Editor,
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
    payload: Result<Json<NoteEdit>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(edit) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    Ok((StatusCode::OK, Json(state.notes.edit(&id, edit).await?)))
}

pub async fn delete_handler<N: NoteStore>(
    _editor: Editor,
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.notes.delete(&id).await?;

    Ok((StatusCode::OK, Json(json!({ "message": "PDF deleted successfully" }))))
}

pub async fn view_handler<N: NoteStore>(
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let views = state.notes.track(&id, Counter::Views).await?;

    Ok((StatusCode::OK, Json(json!({ "views": views }))))
}

pub async fn download_handler<N: NoteStore>(
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let downloads = state.notes.track(&id, Counter::Downloads).await?;

    Ok((StatusCode::OK, Json(json!({ "downloads": downloads }))))
}

pub async fn login_handler<N: NoteStore>(
    State(state): State<Arc<AppState<N>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(LoginRequest { username, password }) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    if !state.credentials.verify(&username, &password) {
        warn!("Failed login for {username}");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.tokens.issue(&username)?;
    info!("Issued token for {username}");

    Ok((StatusCode::OK, Json(TokenResponse { token })))
}
