use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    auth::{Action, AuthenticatedUser},
    domain::{Lote, LoteItem, LoteStatus, LoteTipo},
    error::{AppError, AppResult},
    ingest::{self, IngestSummary},
    routes::users::UserResponse,
    state::AppState,
    storage::upload_key,
    store::{
        lotes::{self, normalize_numero, NewLote, NewLoteItem},
        users,
    },
    utils::json::optional_string,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoteItemResponse {
    pub id: String,
    pub nome: String,
    pub cfc: Option<String>,
    pub tipo: LoteTipo,
    pub numero_documento: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoteResponse {
    pub id: String,
    pub numero: String,
    pub tipo: LoteTipo,
    pub status: LoteStatus,
    pub criado_por: String,
    pub criado_em: DateTime<Utc>,
    pub atualizado_por: Option<String>,
    pub atualizado_em: Option<DateTime<Utc>>,
    pub pdf_file_name: Option<String>,
    pub items: Vec<LoteItemResponse>,
}

impl From<LoteItem> for LoteItemResponse {
    fn from(item: LoteItem) -> Self {
        Self {
            id: item.id.to_string(),
            nome: item.nome,
            cfc: item.cfc,
            tipo: item.tipo,
            numero_documento: item.numero_documento,
        }
    }
}

impl From<Lote> for LoteResponse {
    fn from(lote: Lote) -> Self {
        Self {
            id: lote.id.to_string(),
            numero: lote.numero,
            tipo: lote.tipo,
            status: lote.status,
            criado_por: lote.criado_por,
            criado_em: utc(lote.criado_em),
            atualizado_por: lote.atualizado_por,
            atualizado_em: lote.atualizado_em.map(utc),
            pdf_file_name: lote.pdf_filename,
            items: lote.items.into_iter().map(LoteItemResponse::from).collect(),
        }
    }
}

fn utc(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(value, Utc)
}

/// JSON carried in the `loteData` multipart field. A client-sent `tipo` is
/// ignored; the type always follows from the number.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoteData {
    numero: String,
    #[serde(default)]
    status: Option<LoteStatus>,
    #[serde(default)]
    items: Vec<LoteItemData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoteItemData {
    nome: String,
    #[serde(default)]
    cfc: Option<String>,
    #[serde(default)]
    numero_documento: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub lote: LoteResponse,
    pub summary: IngestSummary,
    pub provisioned_users: Vec<UserResponse>,
}

struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl UploadForm {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, field = %name, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                if data.is_empty() {
                    continue;
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        bytes: data.to_vec(),
                    },
                );
            }
            None => {
                let value = field.text().await.map_err(|err| {
                    error!(error = %err, field = %name, "failed to read form field");
                    AppError::bad_request(format!("invalid field {name}: {err}"))
                })?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

/// Stores the optional `pdf` part and returns its storage key.
async fn store_pdf(state: &AppState, form: &mut UploadForm) -> AppResult<Option<String>> {
    let Some(pdf) = form.files.remove("pdf") else {
        return Ok(None);
    };
    let key = upload_key(&pdf.file_name);
    state
        .storage
        .put_object(&key, pdf.bytes)
        .await
        .map_err(|err| AppError::internal(format!("failed to store pdf: {err}")))?;
    info!(key = %key, original_name = %pdf.file_name, "pdf stored");
    Ok(Some(key))
}

async fn discard_pdf(state: &AppState, key: Option<&str>) {
    if let Some(key) = key {
        if let Err(err) = state.storage.delete_object(key).await {
            warn!(key = %key, error = %err, "failed to remove stored pdf");
        }
    }
}

pub async fn list_lotes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<LoteResponse>>> {
    user.authorize(Action::ListLotes)?;
    let mut conn = state.db()?;
    let lotes = lotes::list_lotes(&mut conn)?;
    Ok(Json(lotes.into_iter().map(LoteResponse::from).collect()))
}

pub async fn create_lote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<LoteResponse>)> {
    user.authorize(Action::CreateLote)?;

    let mut form = read_upload_form(multipart).await?;
    let raw = form
        .field("loteData")
        .ok_or_else(|| AppError::bad_request("loteData is required"))?;
    let data: LoteData = serde_json::from_str(raw)
        .map_err(|err| AppError::bad_request(format!("loteData must be valid JSON: {err}")))?;
    let new_lote = build_new_lote(data, &user.name)?;

    let pdf_key = store_pdf(&state, &mut form).await?;
    let result = state.db().and_then(|mut conn| {
        let input = NewLote {
            pdf_filename: pdf_key.clone(),
            ..new_lote
        };
        Ok(lotes::create_lote(&mut conn, &input)?)
    });

    match result {
        Ok(lote) => {
            info!(
                lote_id = lote.id,
                numero = %lote.numero,
                items = lote.items.len(),
                actor = %user.name,
                "lote created"
            );
            Ok((StatusCode::CREATED, Json(LoteResponse::from(lote))))
        }
        Err(err) => {
            discard_pdf(&state, pdf_key.as_deref()).await;
            Err(err)
        }
    }
}

fn build_new_lote(data: LoteData, criado_por: &str) -> AppResult<NewLote> {
    let numero = normalize_numero(&data.numero);
    if numero.is_empty() {
        return Err(AppError::bad_request("numero is required"));
    }
    let tipo = LoteTipo::from_numero(&numero);
    let mut rng = rand::thread_rng();

    let items = data
        .items
        .into_iter()
        .map(|item| {
            let nome = item.nome.trim().to_string();
            if nome.is_empty() {
                return Err(AppError::bad_request("every item needs a nome"));
            }
            let numero_documento = item
                .numero_documento
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| ingest::document_number(tipo, &mut rng));
            Ok(NewLoteItem {
                nome,
                cfc: item
                    .cfc
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
                numero_documento,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(NewLote {
        numero,
        status: data.status.unwrap_or(LoteStatus::Pendente),
        criado_por: criado_por.to_string(),
        items,
        pdf_filename: None,
    })
}

/// Reads the spreadsheet server side, provisions accounts for CFCs seen for
/// the first time and creates the lote, all in one transaction.
pub async fn import_lote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ImportResponse>)> {
    user.authorize(Action::ImportLote)?;

    let mut form = read_upload_form(multipart).await?;
    let sheet = form
        .files
        .remove("file")
        .ok_or_else(|| AppError::bad_request("file field is required"))?;

    let rows = ingest::read_rows(&sheet.bytes, &sheet.file_name)?;
    let numero = form
        .field("numero")
        .map(str::to_string)
        .or_else(|| ingest::suggested_numero(&rows))
        .map(|value| normalize_numero(&value))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request("numero is required"))?;
    let tipo = LoteTipo::from_numero(&numero);
    let items = ingest::extract_items(&rows, tipo);
    let summary = ingest::summarize(&items);

    let pdf_key = store_pdf(&state, &mut form).await?;
    let new_lote = NewLote {
        numero,
        status: LoteStatus::Pendente,
        criado_por: user.name.clone(),
        items: items.into_iter().map(NewLoteItem::from).collect(),
        pdf_filename: pdf_key.clone(),
    };

    let result = state.db().and_then(|mut conn| {
        conn.transaction::<_, AppError, _>(|conn| {
            let lote = lotes::create_lote(conn, &new_lote)?;
            let provisioned = users::provision_cfc_users(conn, &summary.cfcs)?;
            Ok((lote, provisioned))
        })
    });

    match result {
        Ok((lote, provisioned)) => {
            info!(
                lote_id = lote.id,
                numero = %lote.numero,
                file = %sheet.file_name,
                items = summary.total,
                provisioned = provisioned.len(),
                actor = %user.name,
                "lote imported"
            );
            Ok((
                StatusCode::CREATED,
                Json(ImportResponse {
                    lote: LoteResponse::from(lote),
                    summary,
                    provisioned_users: provisioned.into_iter().map(UserResponse::from).collect(),
                }),
            ))
        }
        Err(err) => {
            discard_pdf(&state, pdf_key.as_deref()).await;
            Err(err)
        }
    }
}

/// Any status may be set at any time. An unknown id is a silent no-op.
pub async fn update_lote_status(
    State(state): State<AppState>,
    Path(lote_id): Path<i32>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    user.authorize(Action::UpdateLoteStatus)?;

    let status: LoteStatus = optional_string(&body, "status")
        .map_err(AppError::bad_request)?
        .ok_or_else(|| AppError::bad_request("status is required"))?
        .parse::<LoteStatus>()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut conn = state.db()?;
    let updated = lotes::update_lote_status(&mut conn, lote_id, status, &user.name)?;
    info!(lote_id, status = %status, updated, actor = %user.name, "lote status updated");

    Ok(Json(json!({ "message": "lote status updated" })))
}

pub async fn delete_lote(
    State(state): State<AppState>,
    Path(lote_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.authorize(Action::DeleteLote)?;

    let mut conn = state.db()?;
    let lote = lotes::get_lote(&mut conn, lote_id)?.ok_or_else(AppError::not_found)?;
    lotes::delete_lote(&mut conn, lote_id)?;
    drop(conn);

    discard_pdf(&state, lote.pdf_filename.as_deref()).await;
    info!(lote_id, numero = %lote.numero, actor = %user.name, "lote deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_pdf(
    State(state): State<AppState>,
    Path(lote_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Response> {
    user.authorize(Action::DownloadPdf)?;

    let mut conn = state.db()?;
    let lote = lotes::get_lote(&mut conn, lote_id)?.ok_or_else(AppError::not_found)?;
    drop(conn);
    let key = lote.pdf_filename.ok_or_else(AppError::not_found)?;

    let bytes = state.storage.get_object(&key).await.map_err(|err| {
        warn!(lote_id, key = %key, error = %err, "stored pdf unavailable");
        AppError::not_found()
    })?;

    let content_type = mime_guess::from_path(&key).first_or_octet_stream();
    let disposition =
        HeaderValue::from_str(&format!("inline; filename=\"{}\"", key.replace('"', "")))
            .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    let content_type = HeaderValue::from_str(content_type.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
