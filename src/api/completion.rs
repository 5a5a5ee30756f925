//! Job completion submission: validation, payload assembly, and transport.
//!
//! Everything up to the wire is pure and testable; the transport is a trait
//! so tests can count calls and capture payloads.

use async_trait::async_trait;
use tokio::fs;

use super::{ApiClient, ApiError};
use crate::invoice::InvoiceData;

/// Hard cap for the attached PDF report. Enforced at selection time; an
/// oversized file never enters state, so submit never sees one.
pub const MAX_REPORT_BYTES: u64 = 10 * 1024 * 1024;

/// PDF report attached to a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub path: String,
    pub name: String,
    pub mime: String,
    pub size: u64,
}

/// Reject report files over the cap before they reach state.
pub fn check_report_size(size: u64) -> Result<(), ApiError> {
    if size > MAX_REPORT_BYTES {
        Err(ApiError::Validation(format!(
            "report file is {:.1}MB; the limit is 10MB",
            size as f64 / (1024.0 * 1024.0)
        )))
    } else {
        Ok(())
    }
}

/// Stat a picked file and admit it as the report only if it fits the cap.
pub async fn select_report_file(path: &str) -> Result<ReportFile, ApiError> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| ApiError::Validation(format!("{path}: {e}")))?;
    check_report_size(meta.len())?;
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string());
    Ok(ReportFile {
        path: path.to_string(),
        name,
        mime: "application/pdf".to_string(),
        size: meta.len(),
    })
}

/// Everything the submitter needs for one attempt. Built fresh on each
/// submit; never persisted client-side.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Backend job id; must be exactly 24 hex characters.
    pub job_id: String,
    /// Inspection answers, already serialized (`{sectionId: {fieldId: value}}`).
    pub form_values_json: Option<String>,
    /// Invoice built from the valid line-item subset, when enabled.
    pub invoice: Option<InvoiceData>,
    pub report: Option<ReportFile>,
    /// Free-text completion notes, outside the inspection answers.
    pub notes: Option<String>,
}

/// Assembled multipart body, one field per part.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPayload {
    pub job_id: String,
    /// Wire contract: the flag travels as the string "true"/"false".
    pub has_invoice: String,
    /// JSON-stringified InvoiceData, present only when the invoice is enabled.
    pub invoice_data: Option<String>,
    pub form_values: Option<String>,
    pub report: Option<ReportFile>,
    pub notes: Option<String>,
}

/// The backend's canonical id format: exactly 24 hex characters.
pub fn is_canonical_job_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Client-side validation. Runs before any network call; a failure here
/// never reaches the transport.
pub fn validate(req: &CompletionRequest) -> Result<(), ApiError> {
    if !is_canonical_job_id(&req.job_id) {
        return Err(ApiError::Validation(format!(
            "job id {:?} is not a 24-character hex identifier",
            req.job_id
        )));
    }
    if let Some(invoice) = &req.invoice {
        if invoice.description.trim().is_empty() {
            return Err(ApiError::Validation(
                "invoice description is required".into(),
            ));
        }
        if invoice.items.is_empty() {
            return Err(ApiError::Validation(
                "invoice needs at least one complete line item (name, quantity and rate)".into(),
            ));
        }
    }
    Ok(())
}

/// Build the multipart payload from a validated request.
pub fn assemble(req: &CompletionRequest) -> Result<CompletionPayload, ApiError> {
    let invoice_data = match &req.invoice {
        Some(invoice) => Some(
            serde_json::to_string(invoice)
                .map_err(|e| ApiError::Network(format!("invoice encoding failed: {e}")))?,
        ),
        None => None,
    };
    Ok(CompletionPayload {
        job_id: req.job_id.clone(),
        has_invoice: if req.invoice.is_some() {
            "true".to_string()
        } else {
            "false".to_string()
        },
        invoice_data,
        form_values: req.form_values_json.clone(),
        report: req.report.clone(),
        notes: req.notes.clone(),
    })
}

/// Wire seam for the completion endpoint.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(&self, payload: &CompletionPayload) -> Result<(), ApiError>;
}

/// Validate, assemble, and send in one attempt. No retry; a failure leaves
/// the caller's state untouched and editable.
pub async fn submit(
    transport: &dyn CompletionTransport,
    req: &CompletionRequest,
) -> Result<(), ApiError> {
    validate(req)?;
    let payload = assemble(req)?;
    transport.send(&payload).await
}

#[async_trait]
impl CompletionTransport for ApiClient {
    /// PATCH the job-scoped completion URL with a multipart body.
    async fn send(&self, payload: &CompletionPayload) -> Result<(), ApiError> {
        let mut form = reqwest::multipart::Form::new()
            .text("hasInvoice", payload.has_invoice.clone());
        if let Some(invoice_json) = &payload.invoice_data {
            form = form.text("invoiceData", invoice_json.clone());
        }
        if let Some(values) = &payload.form_values {
            form = form.text("formValues", values.clone());
        }
        if let Some(notes) = &payload.notes {
            form = form.text("notes", notes.clone());
        }
        if let Some(report) = &payload.report {
            let bytes = fs::read(&report.path)
                .await
                .map_err(|e| ApiError::Network(format!("{}: {e}", report.path)))?;
            form = form.part(
                "reportFile",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(report.name.clone())
                    .mime_str(&report.mime)
                    .map_err(|e| ApiError::Network(e.to_string()))?,
            );
        }

        let resp = self
            .http
            .patch(self.url(&format!("/api/jobs/{}/complete", payload.job_id)))
            .bearer_auth(self.bearer())
            .multipart(form)
            .send()
            .await?;
        ApiClient::check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Answer, FormState};
    use crate::invoice::InvoiceEditor;
    use std::sync::Mutex;

    const JOB_ID: &str = "64a1f2c3d4e5f60718293a4b";

    /// Transport that records payloads instead of touching the network.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<CompletionPayload>>,
    }

    impl RecordingTransport {
        fn calls(&self) -> Vec<CompletionPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for RecordingTransport {
        async fn send(&self, payload: &CompletionPayload) -> Result<(), ApiError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn bare_request(job_id: &str) -> CompletionRequest {
        CompletionRequest {
            job_id: job_id.into(),
            form_values_json: None,
            invoice: None,
            report: None,
            notes: None,
        }
    }

    #[test]
    fn test_job_id_format() {
        assert!(is_canonical_job_id(JOB_ID));
        assert!(!is_canonical_job_id("abc123"));
        assert!(!is_canonical_job_id("64a1f2c3d4e5f60718293a4g"));
        assert!(!is_canonical_job_id("64a1f2c3d4e5f60718293a4b0"));
    }

    #[tokio::test]
    async fn test_bad_job_id_rejected_before_any_network_call() {
        let transport = RecordingTransport::default();
        let err = submit(&transport, &bare_request("abc123")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_invoice_description_rejected_without_network() {
        let mut editor = InvoiceEditor::new();
        let id = editor.items[0].id;
        editor.set_name(id, "Filter".into());
        editor.set_quantity(id, 2.0);
        editor.set_rate(id, 15.0);
        // Description left empty on purpose.
        let mut req = bare_request(JOB_ID);
        req.invoice = Some(editor.build_invoice_data());

        let transport = RecordingTransport::default();
        let err = submit(&transport, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_with_no_valid_rows_rejected() {
        let mut editor = InvoiceEditor::new();
        editor.description = "Service call".into();
        // The only row keeps empty name / zero rate and is filtered out.
        let mut req = bare_request(JOB_ID);
        req.invoice = Some(editor.build_invoice_data());

        let transport = RecordingTransport::default();
        let err = submit(&transport, &req).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_simple_completion_payload() {
        // One text field answered, no invoice, no report.
        let mut form = FormState::new();
        form.set_value("general", "notes", Answer::Text("All clear".into()));
        let req = CompletionRequest {
            job_id: JOB_ID.into(),
            form_values_json: Some(form.to_json().unwrap()),
            invoice: None,
            report: None,
            notes: None,
        };

        let transport = RecordingTransport::default();
        submit(&transport, &req).await.unwrap();
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let payload = &calls[0];
        assert_eq!(payload.has_invoice, "false");
        assert!(payload.invoice_data.is_none());
        assert!(payload.report.is_none());
        let values: serde_json::Value =
            serde_json::from_str(payload.form_values.as_deref().unwrap()).unwrap();
        assert_eq!(values["general"]["notes"], "All clear");
    }

    #[tokio::test]
    async fn test_invoice_completion_payload_filters_and_totals() {
        let mut editor = InvoiceEditor::new();
        editor.description = "Maintenance".into();
        let first = editor.items[0].id;
        editor.set_name(first, "Filter".into());
        editor.set_quantity(first, 2.0);
        editor.set_rate(first, 15.0);
        editor.add_line_item(); // empty-name row, qty 1, rate 0
        editor.tax_percentage = 10.0;

        let mut req = bare_request(JOB_ID);
        req.invoice = Some(editor.build_invoice_data());

        let transport = RecordingTransport::default();
        submit(&transport, &req).await.unwrap();
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].has_invoice, "true");

        let invoice: serde_json::Value =
            serde_json::from_str(calls[0].invoice_data.as_deref().unwrap()).unwrap();
        let items = invoice["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Filter");
        assert_eq!(invoice["subtotal"], 30.0);
        assert_eq!(invoice["taxAmount"], 3.0);
        assert_eq!(invoice["total"], 33.0);
    }

    #[test]
    fn test_report_cap_is_ten_megabytes() {
        assert!(check_report_size(MAX_REPORT_BYTES).is_ok());
        assert!(matches!(
            check_report_size(11 * 1024 * 1024),
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_report_never_enters_state() {
        // An 11MB file is rejected at the picker callback itself.
        let path = std::env::temp_dir().join(format!("report-{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, vec![0u8; 11 * 1024 * 1024])
            .await
            .unwrap();
        let picked = select_report_file(path.to_str().unwrap()).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(picked, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_small_report_selected_with_metadata() {
        let path = std::env::temp_dir().join(format!("report-{}.pdf", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();
        let picked = select_report_file(path.to_str().unwrap()).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(picked.mime, "application/pdf");
        assert_eq!(picked.size, 8);
        assert!(picked.name.ends_with(".pdf"));
    }
}
