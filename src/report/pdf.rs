//! Serializes laid-out pages into a PDF document with lopdf.

use super::layout::{Mark, Page, PAGE_HEIGHT, PAGE_WIDTH};
use super::logo::Logo;
use super::metrics::{win_ansi, Font};
use crate::error::AppError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

const LOGO_RESOURCE: &str = "Im1";

fn report_err(e: lopdf::Error) -> AppError {
    AppError::Report(e.to_string())
}

fn real(v: f32) -> Object {
    Object::Real(v)
}

fn name(n: &str) -> Object {
    Object::Name(n.as_bytes().to_vec())
}

fn font_dictionary(font: Font) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_name(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn operations(page: &Page) -> Vec<Operation> {
    let mut ops = Vec::new();
    for mark in &page.marks {
        match mark {
            Mark::Text { x, y, font, size, text } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![name(font.resource()), real(*size)]));
                ops.push(Operation::new("Td", vec![real(*x), real(*y)]));
                ops.push(Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]));
                ops.push(Operation::new("ET", vec![]));
            }
            Mark::Line { from, to, width, gray } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new("w", vec![real(*width)]));
                ops.push(Operation::new("G", vec![real(*gray)]));
                ops.push(Operation::new("m", vec![real(from.0), real(from.1)]));
                ops.push(Operation::new("l", vec![real(to.0), real(to.1)]));
                ops.push(Operation::new("S", vec![]));
                ops.push(Operation::new("Q", vec![]));
            }
            Mark::Image { x, y, width, height } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![real(*width), real(0.0), real(0.0), real(*height), real(*x), real(*y)],
                ));
                ops.push(Operation::new("Do", vec![name(LOGO_RESOURCE)]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

/// One document, one page object per laid-out page. Image marks draw `logo`; they are
/// skipped when no logo is given.
pub fn assemble(pages: &[Page], logo: Option<&Logo>) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(font_dictionary(Font::Regular));
    let bold = doc.add_object(font_dictionary(Font::Bold));
    let mut resources = dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource() => regular,
            Font::Bold.resource() => bold,
        },
    };
    if let Some(logo) = logo {
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(i64::from(logo.width)),
            "Height" => Object::Integer(i64::from(logo.height)),
            "ColorSpace" => logo.color_space(),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => logo.filter.name(),
        };
        if let Some(alpha) = &logo.alpha {
            let mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(i64::from(logo.width)),
                    "Height" => Object::Integer(i64::from(logo.height)),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "FlateDecode",
                },
                alpha.clone(),
            );
            image_dict.set("SMask", doc.add_object(mask));
        }
        let image_id = doc.add_object(Stream::new(image_dict, logo.data.clone()));
        resources.set("XObject", dictionary! { LOGO_RESOURCE => image_id });
    }
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut ops = operations(page);
        if logo.is_none() {
            ops.retain(|op| op.operator != "Do");
        }
        let content = Content { operations: ops }.encode().map_err(report_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| AppError::Report(e.to_string()))?;
    Ok(out)
}
