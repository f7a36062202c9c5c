//! [`SigningBackend`] over the DocSign REST API

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shared_types::{
    AuditEntry, DocumentFilter, DocumentRecord, PlaceSignatureRequest, SignaturePlacement,
};

use crate::backend::{AuthContext, FinalizeResponse, SigningBackend};
use crate::config::ControllerConfig;
use crate::error::{DocsignError, Result};

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(config.api_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, auth: &AuthContext) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(USER_EMAIL_HEADER, &auth.user_email)
            .header(USER_NAME_HEADER, &auth.user_name);
        if let Some(ip) = &auth.client_ip {
            req = req.header(FORWARDED_FOR_HEADER, ip);
        }
        if let Some(token) = &auth.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(req: RequestBuilder) -> Result<Response> {
        let response = req
            .send()
            .await
            .map_err(|e| DocsignError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(match body.kind.as_deref() {
                Some(kind) => DocsignError::from_kind(kind, body.error),
                None => from_status(status, body.error),
            }),
            Err(_) => Err(from_status(status, status.to_string())),
        }
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
        Self::send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| DocsignError::Transport(format!("malformed response: {}", e)))
    }
}

/// Fallback when the body carries no `kind`
fn from_status(status: StatusCode, message: String) -> DocsignError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            DocsignError::Validation(message)
        }
        StatusCode::NOT_FOUND => DocsignError::NotFound(message),
        StatusCode::CONFLICT => DocsignError::Conflict(message),
        _ => DocsignError::Transport(message),
    }
}

#[async_trait]
impl SigningBackend for HttpBackend {
    async fn list_documents(
        &self,
        auth: &AuthContext,
        filter: DocumentFilter,
    ) -> Result<Vec<DocumentRecord>> {
        Self::send_json(self.request(Method::GET, filter.path(), auth)).await
    }

    async fn get_document(&self, auth: &AuthContext, document_id: &str) -> Result<DocumentRecord> {
        Self::send_json(self.request(Method::GET, &format!("/docs/{}", document_id), auth)).await
    }

    async fn list_placements(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<Vec<SignaturePlacement>> {
        Self::send_json(self.request(
            Method::GET,
            &format!("/signature/file/{}", document_id),
            auth,
        ))
        .await
    }

    async fn place_signature(
        &self,
        auth: &AuthContext,
        request: &PlaceSignatureRequest,
    ) -> Result<SignaturePlacement> {
        Self::send_json(
            self.request(Method::POST, "/signature/place", auth)
                .json(request),
        )
        .await
    }

    async fn accept_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()> {
        Self::send(self.request(
            Method::POST,
            &format!("/signature/accept/{}", placement_id),
            auth,
        ))
        .await?;
        Ok(())
    }

    async fn finalize_document(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<FinalizeResponse> {
        Self::send_json(
            self.request(Method::POST, "/signature/finalize", auth)
                .json(&json!({ "fileId": document_id })),
        )
        .await
    }

    async fn reject_placement(
        &self,
        auth: &AuthContext,
        placement_id: &str,
        reason: &str,
    ) -> Result<()> {
        Self::send(
            self.request(
                Method::POST,
                &format!("/signature/reject/{}", placement_id),
                auth,
            )
            .json(&json!({ "reason": reason })),
        )
        .await?;
        Ok(())
    }

    async fn remove_placement(&self, auth: &AuthContext, placement_id: &str) -> Result<()> {
        Self::send(self.request(
            Method::DELETE,
            &format!("/signature/remove/{}", placement_id),
            auth,
        ))
        .await?;
        Ok(())
    }

    async fn get_audit_trail(
        &self,
        auth: &AuthContext,
        document_id: &str,
    ) -> Result<Vec<AuditEntry>> {
        Self::send_json(self.request(
            Method::GET,
            &format!("/docs/{}/audit", document_id),
            auth,
        ))
        .await
    }

    async fn delete_document(&self, auth: &AuthContext, document_id: &str) -> Result<()> {
        Self::send(self.request(Method::DELETE, &format!("/docs/{}", document_id), auth)).await?;
        Ok(())
    }
}
