//! PDF-to-drug-record extraction via the Anthropic Messages API.
//!
//! The registration sheets arrive as scanned PDF tables; the model reads each
//! document chunk and returns CSV rows matching the catalog schema. Large
//! documents are split into page chunks so one bad or slow chunk costs only
//! its own rows, never the whole document.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use lopdf::Document;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::drug::RawDrugRecord;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

const PAGES_PER_CHUNK: usize = 5;
// Scanned tables take the model a while; a chunk gets minutes, not seconds.
const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

const EXTRACTION_PROMPT: &str = r#"Extract every drug registration row from this PDF.

The document contains Vietnamese drug-price registration tables. For each drug, extract:
- Registration number (Số đăng ký)
- Drug name (Tên thuốc)
- Active ingredients (Tên hoạt chất)
- Manufacturer (Doanh nghiệp sản xuất)
- Distributor (Doanh nghiệp kê khai)
- Country of origin (Nước sản xuất)
- Year of registration (Ngày tiếp nhận Hồ sơ kê khai)
- Usage form (Dạng bào chế)

If the information is in a table, extract it row by row. If it is in running text, extract it accurately.
Output the extracted data in CSV format with exactly these headers:
"registration_number","name","ingredients","manufacturer","distributor","country_of_origin","year_of_registration","usage_form"

Ensure that:
1. Each row represents a single drug.
2. If a drug has multiple active ingredients, separate them with a semicolon (;).
3. If a field is missing in the document, leave it empty.
4. The output contains only the CSV data, no explanations or additional text."#;

/// Callback reporting `(percent_complete, message)` while a document is
/// being processed.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + Send + Sync);

pub struct PdfExtractionService {
    api_key: String,
    http_client: reqwest::Client,
}

impl PdfExtractionService {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            AppError::Internal(anyhow::anyhow!("ANTHROPIC_API_KEY not configured"))
        })?;
        Ok(Self::new(api_key))
    }

    /// Extracts drug records from a PDF document, chunk by chunk.
    ///
    /// A chunk that errors or times out is skipped and processing continues;
    /// the call only fails when every chunk failed and nothing was extracted.
    pub async fn extract(
        &self,
        pdf_bytes: &[u8],
        progress: ProgressFn<'_>,
    ) -> Result<Vec<RawDrugRecord>> {
        let document_hash = hex::encode(Sha256::digest(pdf_bytes));
        tracing::info!(
            "Extracting PDF document ({} bytes, sha256 {})",
            pdf_bytes.len(),
            &document_hash[..12]
        );

        let chunks = split_into_page_chunks(pdf_bytes);
        let chunk_count = chunks.len();
        progress(0, &format!("Processing {} chunk(s)", chunk_count));

        let mut records = Vec::new();
        let mut last_error: Option<String> = None;

        for (idx, chunk) in chunks.iter().enumerate() {
            match self.extract_chunk(chunk).await {
                Ok(mut chunk_records) => {
                    tracing::info!(
                        "Chunk {}/{} extracted {} records",
                        idx + 1,
                        chunk_count,
                        chunk_records.len()
                    );
                    records.append(&mut chunk_records);
                }
                Err(e) => {
                    // Partial results beat total failure: skip and move on.
                    tracing::error!("Chunk {}/{} failed, skipping: {}", idx + 1, chunk_count, e);
                    last_error = Some(e.to_string());
                }
            }

            let percent = (((idx + 1) * 100) / chunk_count) as u8;
            progress(
                percent,
                &format!("Processed chunk {} of {}", idx + 1, chunk_count),
            );
        }

        if records.is_empty() {
            if let Some(error) = last_error {
                return Err(AppError::Extraction(error));
            }
        }

        Ok(records)
    }

    async fn extract_chunk(&self, chunk: &[u8]) -> Result<Vec<RawDrugRecord>> {
        let api_url = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let request = serde_json::json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "document",
                        "source": {
                            "type": "base64",
                            "media_type": "application/pdf",
                            "data": BASE64.encode(chunk),
                        }
                    },
                    { "type": "text", "text": EXTRACTION_PROMPT }
                ]
            }]
        });

        let response = self
            .http_client
            .post(&api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .timeout(CHUNK_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Extraction(format!("extraction request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Extraction(format!(
                "extraction API returned {}: {}",
                status, body
            )));
        }

        let api_response: ExtractionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Extraction(format!("invalid extraction response: {}", e)))?;

        let text: String = api_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();

        parse_csv_records(&text)
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Splits a PDF into page-range chunks. A document that cannot be parsed is
/// passed through whole; the extraction API sees it as a single chunk.
fn split_into_page_chunks(pdf_bytes: &[u8]) -> Vec<Vec<u8>> {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("Could not parse PDF for chunking, sending whole: {}", e);
            return vec![pdf_bytes.to_vec()];
        }
    };

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.len() <= PAGES_PER_CHUNK {
        return vec![pdf_bytes.to_vec()];
    }

    let mut chunks = Vec::new();
    for keep in pages.chunks(PAGES_PER_CHUNK) {
        let keep_set: HashSet<u32> = keep.iter().copied().collect();
        let delete: Vec<u32> = pages
            .iter()
            .copied()
            .filter(|page| !keep_set.contains(page))
            .collect();

        let mut part = doc.clone();
        part.delete_pages(&delete);

        let mut buffer = Vec::new();
        match part.save_to(&mut buffer) {
            Ok(()) => chunks.push(buffer),
            Err(e) => tracing::warn!("Failed to serialize page chunk, skipping: {}", e),
        }
    }

    if chunks.is_empty() {
        vec![pdf_bytes.to_vec()]
    } else {
        chunks
    }
}

/// Parses the model's CSV output into raw drug records. Rows with no
/// registration number are dropped; empty cells become None.
fn parse_csv_records(text: &str) -> Result<Vec<RawDrugRecord>> {
    let csv_text = strip_code_fence(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::Extraction(format!("malformed CSV header: {}", e)))?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let col_registration = column("registration_number");
    let col_name = column("name");
    let col_ingredients = column("ingredients");
    let col_manufacturer = column("manufacturer");
    let col_distributor = column("distributor");
    let col_country = column("country_of_origin");
    let col_year = column("year_of_registration");
    let col_usage_form = column("usage_form");

    let field = |row: &csv::StringRecord, idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping malformed CSV row: {}", e);
                continue;
            }
        };

        let Some(registration_number) = field(&row, col_registration) else {
            continue;
        };

        records.push(RawDrugRecord {
            id: None,
            registration_number,
            name: field(&row, col_name),
            ingredients: field(&row, col_ingredients),
            manufacturing_requirements: None,
            unit_of_measure: None,
            estimated_price: None,
            manufacturer: field(&row, col_manufacturer),
            distributor: field(&row, col_distributor),
            year_of_registration: field(&row, col_year),
            country_of_origin: field(&row, col_country),
            usage_form: field(&row, col_usage_form),
            content_of_review: None,
            no_proposals_on_price: None,
            date_of_proposals_on_price: None,
            additional_notes: None,
        });
    }

    Ok(records)
}

/// The model sometimes wraps its CSV in a markdown code fence.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}
