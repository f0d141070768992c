use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::core::errors::ApiError;
use crate::rag::InlinePages;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub documents: Vec<IngestDocument>,
}

#[derive(Debug, Deserialize)]
pub struct IngestDocument {
    pub name: String,
    pub pages: Vec<String>,
}

/// Full-corpus re-ingestion: destructive clear-then-rebuild, serialized
/// behind the state's ingest lock.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.documents.is_empty() {
        return Err(ApiError::BadRequest(
            "missing required field: documents".to_string(),
        ));
    }

    let _guard = state.ingest_lock.lock().await;

    // Repeated names collapse to one entry (last payload wins), matching
    // the page map below; ingesting a name twice would duplicate chunks.
    let names = unique_names(&payload.documents);
    let pages: HashMap<String, Vec<String>> = payload
        .documents
        .into_iter()
        .map(|d| (d.name, d.pages))
        .collect();

    info!(documents = names.len(), "starting corpus ingestion");
    let stored = state
        .pipeline
        .ingest(&InlinePages::new(pages), &names)
        .await?;

    Ok(Json(json!({ "stored_chunks": stored })))
}

pub async fn corpus(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let chunks = state.store.count().await?;
    Ok(Json(json!({ "chunks": chunks })))
}

fn unique_names(documents: &[IngestDocument]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(documents.len());
    for document in documents {
        if !names.contains(&document.name) {
            names.push(document.name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> IngestDocument {
        IngestDocument {
            name: name.to_string(),
            pages: vec!["page text".to_string()],
        }
    }

    #[test]
    fn repeated_document_names_are_ingested_once() {
        let documents = vec![doc("manual.pdf"), doc("faq.pdf"), doc("manual.pdf")];
        assert_eq!(unique_names(&documents), vec!["manual.pdf", "faq.pdf"]);
    }
}
