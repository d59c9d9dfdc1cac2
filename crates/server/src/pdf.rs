//! Visa document rendering.
//!
//! The visa is filled into an HTML template and converted with
//! `wkhtmltopdf` when the tool is installed. Without it the HTML itself is
//! served so the browser can print it.

use std::path::Path;
use std::process::Stdio;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use evisa_core::domain::application::Application;
use evisa_core::domain::product::VisaProduct;
use evisa_core::domain::visa::Visa;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

const VISA_TEMPLATE: &str = "visa/visa.html.tera";
const DEFAULT_ADDRESS_IN_DRC: &str = "KINSHASA / GOMBE";

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct VisaDocumentRenderer {
    tera: Tera,
    wkhtmltopdf_path: Option<String>,
    public_base_url: String,
}

impl VisaDocumentRenderer {
    /// Loads templates from `template_dir`, falling back to the built-in visa template.
    pub fn new(template_dir: &Path, public_base_url: &str) -> Self {
        let pattern = format!("{}/**/*.tera", template_dir.display());
        let mut tera = match Tera::new(&pattern) {
            Ok(tera) => tera,
            Err(error) => {
                warn!(
                    event_name = "system.pdf.templates_fallback",
                    correlation_id = "bootstrap",
                    error = %error,
                    "failed to load visa templates from filesystem, using embedded template"
                );
                Tera::default()
            }
        };
        if !tera.get_template_names().any(|name| name == VISA_TEMPLATE) {
            if let Err(error) = tera.add_raw_template(VISA_TEMPLATE, embedded_template()) {
                error!(error = %error, "embedded visa template failed to parse");
            }
        }
        configure_escaping(&mut tera);

        let wkhtmltopdf_path =
            which::which("wkhtmltopdf").ok().map(|path| path.to_string_lossy().to_string());
        match &wkhtmltopdf_path {
            Some(path) => info!(path = %path, "wkhtmltopdf found"),
            None => warn!("wkhtmltopdf not found in PATH - visas will be served as printable HTML"),
        }

        Self { tera, wkhtmltopdf_path, public_base_url: public_base_url.trim_end_matches('/').to_string() }
    }

    /// Renderer that never shells out, for tests and environments without the converter.
    pub fn html_only(public_base_url: &str) -> Self {
        let mut tera = Tera::default();
        if let Err(error) = tera.add_raw_template(VISA_TEMPLATE, embedded_template()) {
            error!(error = %error, "embedded visa template failed to parse");
        }
        configure_escaping(&mut tera);
        Self {
            tera,
            wkhtmltopdf_path: None,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn render_html(
        &self,
        application: &Application,
        visa: &Visa,
        product: Option<&VisaProduct>,
    ) -> Result<String, PdfError> {
        let mut context = Context::new();
        context.insert("application", application);
        context.insert("visa", visa);
        context.insert(
            "visa_type_label",
            &product.map(VisaProduct::document_label).unwrap_or_else(|| "ORDINAIRE".to_string()),
        );
        context.insert("sponsor_full_name", &application.sponsor_full_name().unwrap_or_default());
        context.insert(
            "address_in_drc",
            application.sponsor_address.as_deref().unwrap_or(DEFAULT_ADDRESS_IN_DRC),
        );
        context.insert("valid_from", &visa.valid_from.format("%d/%m/%Y").to_string());
        context.insert("valid_to", &visa.valid_to.format("%d/%m/%Y").to_string());
        context.insert("issued_on", &visa.issued_at.format("%d/%m/%Y").to_string());
        context.insert("verify_url", &format!("{}/verify/{}", self.public_base_url, visa.verification_code));

        self.tera.render(VISA_TEMPLATE, &context).map_err(|e| PdfError::Template(e.to_string()))
    }

    /// Renders the visa, converting to PDF when possible.
    pub async fn render(
        &self,
        application: &Application,
        visa: &Visa,
        product: Option<&VisaProduct>,
    ) -> Result<PdfResult, PdfError> {
        let html = self.render_html(application, visa, product)?;

        if let Some(ref wkhtmltopdf) = self.wkhtmltopdf_path {
            match convert_html_to_pdf(&html, wkhtmltopdf).await {
                Ok(pdf_bytes) => Ok(PdfResult::Pdf(pdf_bytes)),
                Err(e) => {
                    warn!(error = %e, application_id = %application.id, "PDF conversion failed, falling back to HTML");
                    Ok(PdfResult::Html(html))
                }
            }
        } else {
            Ok(PdfResult::Html(html))
        }
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf_path: &str) -> Result<Vec<u8>, PdfError> {
    let temp_dir = std::env::temp_dir();
    let stem = uuid::Uuid::new_v4();
    let html_path = temp_dir.join(format!("visa_{stem}.html"));
    let pdf_path = temp_dir.join(format!("visa_{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(wkhtmltopdf_path)
        .args(["--page-size", "A4", "--encoding", "utf-8"])
        .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let result = match output {
        Ok(output) if output.status.success() => tokio::fs::read(&pdf_path).await.map_err(PdfError::from),
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(stderr = %stderr, "wkhtmltopdf failed");
            Err(PdfError::Conversion(stderr))
        }
        Err(error) => Err(PdfError::Io(error)),
    };

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(bytes) = &result {
        info!(size = bytes.len(), "visa PDF generated");
    }
    result
}

/// Escapes applicant text in `.html.tera` templates. Slashes are kept as-is
/// since visa numbers contain them.
pub fn configure_escaping(tera: &mut Tera) {
    tera.autoescape_on(vec![".html.tera"]);
    tera.set_escape_fn(escape_markup);
}

fn escape_markup(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn embedded_template() -> &'static str {
    include_str!("../../../templates/visa/visa.html.tera")
}

pub enum PdfResult {
    Pdf(Vec<u8>),
    Html(String),
}

impl PdfResult {
    /// PDFs are served inline under `filename`; the HTML fallback is served as a page.
    pub fn into_response(self, filename: &str) -> Response {
        match self {
            PdfResult::Pdf(bytes) => {
                let disposition = HeaderValue::from_str(&format!("inline; filename=\"{filename}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static("inline"));
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    Body::from(bytes),
                )
                    .into_response()
            }
            PdfResult::Html(html) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
                Body::from(html),
            )
                .into_response(),
        }
    }
}
