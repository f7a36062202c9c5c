//! HTTP handlers for DocSign API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use docsign_core::{rules, AuthContext, DocsignError, FinalizeResponse};
use shared_pdf::{bake_signatures, hash_document, PdfDocument};
use shared_types::{
    AuditEntry, DocumentFilter, DocumentRecord, PlaceSignatureRequest, PlacementStatus,
    SignaturePlacement,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

async fn owned_document(
    state: &AppState,
    auth: &AuthContext,
    document_id: &str,
) -> Result<DocumentRecord, ApiError> {
    let row: Option<DbDocument> = sqlx::query_as(
        r#"
        SELECT id, original_name, storage_path, uploaded_at, page_count, owner_email,
               document_hash, signed_artifact_path
        FROM documents WHERE id = ? AND owner_email = ?
        "#,
    )
    .bind(document_id)
    .bind(&auth.user_email)
    .fetch_optional(&state.db)
    .await?;

    row.map(DocumentRecord::from)
        .ok_or_else(|| ApiError::not_found(format!("document {}", document_id)))
}

async fn placements_of(
    state: &AppState,
    document_id: &str,
) -> Result<Vec<SignaturePlacement>, ApiError> {
    let rows: Vec<DbPlacement> = sqlx::query_as(
        r#"
        SELECT id, document_id, page_number, x, y, rendered_page_height, rendered_page_width,
               text, font_family, status, rejection_reason, created_at
        FROM placements WHERE document_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(document_id)
    .fetch_all(&state.db)
    .await?;

    rows.into_iter().map(SignaturePlacement::try_from).collect()
}

/// A placement together with every placement of its document
async fn owned_placement(
    state: &AppState,
    auth: &AuthContext,
    placement_id: &str,
) -> Result<(DocumentRecord, Vec<SignaturePlacement>, usize), ApiError> {
    let document_id: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT p.document_id FROM placements p
        JOIN documents d ON d.id = p.document_id
        WHERE p.id = ? AND d.owner_email = ?
        "#,
    )
    .bind(placement_id)
    .bind(&auth.user_email)
    .fetch_optional(&state.db)
    .await?;

    let (document_id,) =
        document_id.ok_or_else(|| ApiError::not_found(format!("placement {}", placement_id)))?;
    let document = owned_document(state, auth, &document_id).await?;
    let placements = placements_of(state, &document_id).await?;
    let idx = placements
        .iter()
        .position(|p| p.id == placement_id)
        .ok_or_else(|| ApiError::not_found(format!("placement {}", placement_id)))?;
    Ok((document, placements, idx))
}

/// Upload a PDF
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<DocumentRecord>), ApiError> {
    let original_name = req.file_name.trim();
    if original_name.is_empty() {
        return Err(ApiError::InvalidRequest("File name is required".into()));
    }

    let pdf_data = BASE64
        .decode(&req.pdf_base64)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;

    let page_count = PdfDocument::from_bytes(&pdf_data)
        .map_err(|e| DocsignError::Validation(format!("not a readable PDF: {}", e)))?
        .page_count();
    if page_count == 0 {
        return Err(DocsignError::Validation("PDF has no pages".to_string()).into());
    }

    let id = Uuid::new_v4().to_string();
    let record = DocumentRecord {
        storage_path: format!("uploads/{}.pdf", id),
        id,
        original_name: original_name.to_string(),
        uploaded_at: Utc::now(),
        page_count,
        owner_email: auth.user_email.clone(),
        document_hash: hash_document(&pdf_data),
        signed_artifact_path: None,
    };

    tokio::fs::write(state.file_path(&record.storage_path), &pdf_data)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, original_name, storage_path, uploaded_at, page_count, owner_email, document_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.original_name)
    .bind(&record.storage_path)
    .bind(db_timestamp(record.uploaded_at))
    .bind(i64::from(record.page_count))
    .bind(&record.owner_email)
    .bind(&record.document_hash)
    .execute(&state.db)
    .await?;

    tracing::info!(document_id = %record.id, pages = page_count, "Stored upload");

    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_filtered(
    state: &AppState,
    auth: &AuthContext,
    filter: DocumentFilter,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    let rows: Vec<DbDocument> = sqlx::query_as(
        r#"
        SELECT id, original_name, storage_path, uploaded_at, page_count, owner_email,
               document_hash, signed_artifact_path
        FROM documents WHERE owner_email = ?
        ORDER BY uploaded_at, rowid
        "#,
    )
    .bind(&auth.user_email)
    .fetch_all(&state.db)
    .await?;

    let documents = rows.into_iter().map(DocumentRecord::from);
    if filter == DocumentFilter::All {
        return Ok(Json(documents.collect()));
    }

    // One query for every placement of the caller, grouped per document
    let placement_rows: Vec<DbPlacement> = sqlx::query_as(
        r#"
        SELECT p.id, p.document_id, p.page_number, p.x, p.y, p.rendered_page_height,
               p.rendered_page_width, p.text, p.font_family, p.status, p.rejection_reason,
               p.created_at
        FROM placements p
        JOIN documents d ON d.id = p.document_id
        WHERE d.owner_email = ?
        ORDER BY p.created_at, p.rowid
        "#,
    )
    .bind(&auth.user_email)
    .fetch_all(&state.db)
    .await?;

    let mut by_document: HashMap<String, Vec<SignaturePlacement>> = HashMap::new();
    for row in placement_rows {
        let placement = SignaturePlacement::try_from(row)?;
        by_document
            .entry(placement.document_id.clone())
            .or_default()
            .push(placement);
    }

    Ok(Json(
        documents
            .filter(|record| {
                let placements = by_document.get(&record.id).map_or(&[][..], Vec::as_slice);
                filter.matches(record.status(placements))
            })
            .collect(),
    ))
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    list_filtered(&state, &auth, DocumentFilter::All).await
}

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    list_filtered(&state, &auth, DocumentFilter::Pending).await
}

pub async fn list_signed(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    list_filtered(&state, &auth, DocumentFilter::Signed).await
}

pub async fn list_rejected(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
) -> Result<Json<Vec<DocumentRecord>>, ApiError> {
    list_filtered(&state, &auth, DocumentFilter::Rejected).await
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>, ApiError> {
    Ok(Json(owned_document(&state, &auth, &id).await?))
}

/// Delete a document with its placements, audit rows and files
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.write_lock.lock().await;
    let document = owned_document(&state, &auth, &id).await?;

    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM audit_entries WHERE document_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM placements WHERE document_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let files = std::iter::once(document.storage_path).chain(document.signed_artifact_path);
    for relative in files {
        if let Err(e) = tokio::fs::remove_file(state.file_path(&relative)).await {
            tracing::warn!(document_id = %id, file = %relative, "Could not remove file: {}", e);
        }
    }

    tracing::info!(document_id = %id, "Deleted document");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_audit_trail(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    owned_document(&state, &auth, &id).await?;

    let rows: Vec<DbAuditEntry> = sqlx::query_as(
        r#"
        SELECT placement_id, signer_name, signer_email, ip_address, signed_at
        FROM audit_entries WHERE document_id = ?
        ORDER BY id
        "#,
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(AuditEntry::from).collect()))
}

pub async fn list_placements(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<SignaturePlacement>>, ApiError> {
    owned_document(&state, &auth, &id).await?;
    Ok(Json(placements_of(&state, &id).await?))
}

pub async fn place_signature(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Json(req): Json<PlaceSignatureRequest>,
) -> Result<(StatusCode, Json<SignaturePlacement>), ApiError> {
    let _guard = state.write_lock.lock().await;
    let document = owned_document(&state, &auth, &req.document_id).await?;
    let placements = placements_of(&state, &document.id).await?;
    rules::check_place(&document, &placements, &req, state.resubmission)?;

    let placement = rules::new_placement(Uuid::new_v4().to_string(), &req);
    sqlx::query(
        r#"
        INSERT INTO placements (id, document_id, page_number, x, y, rendered_page_height,
                                rendered_page_width, text, font_family, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&placement.id)
    .bind(&placement.document_id)
    .bind(i64::from(placement.page_number))
    .bind(placement.position.x)
    .bind(placement.position.y)
    .bind(placement.rendered_page_height)
    .bind(placement.rendered_page_width)
    .bind(&placement.text)
    .bind(&placement.font_family)
    .bind(placement.status.to_string())
    .bind(db_timestamp(placement.created_at))
    .execute(&state.db)
    .await?;

    tracing::info!(
        document_id = %placement.document_id,
        placement_id = %placement.id,
        page = placement.page_number,
        "Signature placed"
    );
    Ok((StatusCode::CREATED, Json(placement)))
}

/// Accept a placement and append its audit row
pub async fn accept_placement(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let (document, placements, idx) = owned_placement(&state, &auth, &id).await?;
    if !rules::check_accept(&placements, &placements[idx])? {
        tracing::debug!(placement_id = %id, "Placement already accepted");
        return Ok(Json(MessageResponse::new("Signature already accepted")));
    }

    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE placements SET status = ? WHERE id = ?")
        .bind(PlacementStatus::Accepted.to_string())
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO audit_entries (document_id, placement_id, signer_name, signer_email, ip_address, signed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&document.id)
    .bind(&id)
    .bind(&auth.user_name)
    .bind(&auth.user_email)
    .bind(auth.client_ip.as_deref().unwrap_or("unknown"))
    .bind(db_timestamp(Utc::now()))
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(document_id = %document.id, placement_id = %id, "Placement accepted");
    Ok(Json(MessageResponse::new("Signature accepted")))
}

/// Bake accepted placements into the signed artifact
pub async fn finalize_document(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Json(req): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let document = owned_document(&state, &auth, &req.file_id).await?;
    if let Some(path) = document.signed_artifact_path {
        tracing::debug!(document_id = %document.id, "Already finalized");
        return Ok(Json(FinalizeResponse {
            signed_artifact_path: path,
        }));
    }

    let placements = placements_of(&state, &document.id).await?;
    if !placements
        .iter()
        .any(|p| p.status == PlacementStatus::Accepted)
    {
        return Err(DocsignError::InvalidState("no accepted signature to finalize".to_string()).into());
    }

    let original = tokio::fs::read(state.file_path(&document.storage_path))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    // lopdf work is CPU bound
    let baked = tokio::task::spawn_blocking(move || bake_signatures(&original, &placements))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("artifact generation failed: {}", e)))?;

    let path = rules::signed_artifact_path(&document.id);
    tokio::fs::write(state.file_path(&path), &baked)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    sqlx::query(
        "UPDATE documents SET signed_artifact_path = ? WHERE id = ? AND signed_artifact_path IS NULL",
    )
    .bind(&path)
    .bind(&document.id)
    .execute(&state.db)
    .await?;

    tracing::info!(document_id = %document.id, artifact = %path, bytes = baked.len(), "Document signed");
    Ok(Json(FinalizeResponse {
        signed_artifact_path: path,
    }))
}

pub async fn reject_placement(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let (document, placements, idx) = owned_placement(&state, &auth, &id).await?;
    let reason = rules::check_reject(&placements[idx], &req.reason)?;

    sqlx::query("UPDATE placements SET status = ?, rejection_reason = ? WHERE id = ?")
        .bind(PlacementStatus::Rejected.to_string())
        .bind(reason)
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(document_id = %document.id, placement_id = %id, "Placement rejected");
    Ok(Json(MessageResponse::new("Signature rejected")))
}

pub async fn remove_placement(
    State(state): State<Arc<AppState>>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let _guard = state.write_lock.lock().await;
    let (document, placements, idx) = owned_placement(&state, &auth, &id).await?;
    rules::check_remove(&placements[idx])?;

    sqlx::query("DELETE FROM placements WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    tracing::info!(document_id = %document.id, placement_id = %id, "Placement removed");
    Ok(Json(MessageResponse::new("Signature removed")))
}
