//! Printable imaging-request form.

pub mod layout;
pub mod logo;
pub mod metrics;
pub mod pdf;

use crate::error::AppError;
use crate::models::{ExamItem, ImagingRequestView};
use layout::{Align, Cell, Layout, Padding, Page, Table, TextStyle, INCH};
use logo::Logo;
use metrics::Font;
use std::path::Path;

pub const TITLE: &str = "Solicitud de Exámenes Imagenología";
pub const LOGO_PLACEHOLDER: &str = "LOGO NO DISPONIBLE";
pub const NO_EXAMS: &str = "Ningún examen seleccionado.";
const NOT_AVAILABLE: &str = "N/A";

const HEADER: TextStyle = TextStyle::new(Font::Bold, 10.0, 12.0, Align::Left);
const HEADER_RIGHT: TextStyle = TextStyle::new(Font::Regular, 9.0, 11.0, Align::Right);
const TITLE_STYLE: TextStyle = TextStyle::new(Font::Bold, 18.0, 22.0, Align::Center);
const SECTION: TextStyle = TextStyle::new(Font::Bold, 12.0, 14.0, Align::Left).spacing(10.0, 5.0);
const LABEL: TextStyle = TextStyle::new(Font::Bold, 10.0, 12.0, Align::Left);
const VALUE: TextStyle = TextStyle::new(Font::Regular, 10.0, 12.0, Align::Left);
const BODY: TextStyle = TextStyle::new(Font::Regular, 10.0, 12.0, Align::Left).spacing(6.0, 0.0);
const SIGNATURE: TextStyle = TextStyle::new(Font::Regular, 9.0, 11.0, Align::Center);
const SIGNATURE_BOLD: TextStyle = TextStyle::new(Font::Bold, 9.0, 11.0, Align::Center);

/// A request in the caller's scope together with its selected exams (ordered by name).
#[derive(Clone, Debug, PartialEq)]
pub struct ReportData {
    pub view: ImagingRequestView,
    pub exams: Vec<ExamItem>,
}

pub fn filename(id: i64) -> String {
    format!("solicitud_imagenologia_{}.pdf", id)
}

fn or_na(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE).to_string()
}

fn header(data: &ReportData, has_logo: bool) -> Table {
    let logo = if has_logo {
        Cell::Image {
            width: 1.5 * INCH,
            height: 0.5 * INCH,
        }
    } else {
        Cell::Text(LOGO_PLACEHOLDER.into(), HEADER)
    };
    let who = format!("Dr(a). {}\nFolio: {}", data.view.doctor_name, data.view.request.id);
    let mut table = Table::new(
        vec![1.5 * INCH, 3.0 * INCH, 2.6 * INCH],
        vec![vec![logo, Cell::Text(who, HEADER_RIGHT), Cell::Empty]],
    );
    table.padding.bottom = 10.0;
    table
}

fn patient(data: &ReportData) -> Table {
    let f = &data.view.request.fields;
    let label = |s: &str| Cell::Text(s.into(), LABEL);
    let value = |s: String| Cell::Text(s, VALUE);
    let mut table = Table::new(
        vec![1.5 * INCH, 2.0 * INCH, 1.0 * INCH, 2.0 * INCH],
        vec![
            vec![
                label("Nombre Completo:"),
                value(or_na(Some(&f.patient_name))),
                label("RUT:"),
                value(or_na(Some(&f.patient_rut))),
            ],
            vec![
                label("Fecha de Solicitud:"),
                value(f.request_date.format("%d/%m/%Y").to_string()),
                label("Teléfono:"),
                value(or_na(f.patient_phone.as_deref())),
            ],
            vec![
                label("Tipo Previsión:"),
                value(or_na(f.patient_prevencion.as_deref())),
                label("Diagnóstico:"),
                value(or_na(f.diagnosis.as_deref())),
            ],
        ],
    );
    table.padding = Padding {
        left: 5.0,
        right: 5.0,
        top: 2.0,
        bottom: 2.0,
    };
    table.grid = Some((0.5, 0.5));
    table.border = Some(1.0);
    table
}

fn signatures(data: &ReportData) -> Table {
    let line = "_________________________";
    let mut table = Table::new(
        vec![3.5 * INCH, 3.5 * INCH],
        vec![
            vec![
                Cell::Text(format!("{}\nFecha", line), SIGNATURE),
                Cell::Text(format!("{}\nFirma", line), SIGNATURE),
            ],
            vec![
                Cell::Text(data.view.request.fields.request_date.format("%d-%m-%Y").to_string(), SIGNATURE_BOLD),
                Cell::Text(format!("Dr(a). {}", data.view.doctor_name), SIGNATURE_BOLD),
            ],
        ],
    );
    table.padding.bottom = 10.0;
    table
}

/// Lay the form out top to bottom.
pub fn layout(data: &ReportData, has_logo: bool) -> Vec<Page> {
    let mut doc = Layout::new();
    doc.table(&header(data, has_logo));
    doc.spacer(0.1 * INCH);
    doc.paragraph(TITLE, &TITLE_STYLE);
    doc.spacer(0.2 * INCH);

    doc.paragraph("Datos del Paciente:", &SECTION);
    doc.table(&patient(data));
    doc.spacer(0.3 * INCH);

    doc.paragraph("Lista de Exámenes:", &SECTION);
    if data.exams.is_empty() {
        doc.paragraph(NO_EXAMS, &BODY);
    } else {
        for exam in &data.exams {
            doc.paragraph(&format!("- {} ({})", exam.name.to_uppercase(), exam.code), &BODY);
            doc.spacer(0.05 * INCH);
        }
    }
    doc.spacer(0.3 * INCH);

    doc.paragraph("Observaciones / Justificación", &SECTION);
    doc.paragraph(&or_na(data.view.request.fields.observations.as_deref()), &BODY);
    doc.spacer(0.5 * INCH);

    doc.table(&signatures(data));
    doc.finish()
}

/// Render the PDF. A missing or unusable logo falls back to a text placeholder.
pub fn generate(data: &ReportData, logo_path: Option<&Path>) -> Result<Vec<u8>, AppError> {
    let logo = match logo_path {
        Some(path) => Logo::load(path),
        None => {
            tracing::warn!("no logo configured; using placeholder");
            None
        }
    };
    let pages = layout(data, logo.is_some());
    let bytes = pdf::assemble(&pages, logo.as_ref())?;
    tracing::debug!(request_id = data.view.request.id, pages = pages.len(), bytes = bytes.len(), "report rendered");
    Ok(bytes)
}
