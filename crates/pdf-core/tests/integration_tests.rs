//! Integration tests for pdf-core
//!
//! These tests verify end-to-end functionality with real PDF operations.

use lopdf::{dictionary, Object, Stream};
use pdf_core::{
    Erasure, PdfDocument, PdfError, Rect, SaveOptions, StandardFont, TextStyle, TextTarget,
};
use pretty_assertions::assert_eq;

/// Create a PDF with one page per content stream, using Helvetica as /F1
fn create_test_pdf(contents: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::new();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Count" => contents.len() as i32,
        "Kids" => vec![],
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });

    let mut page_ids = Vec::new();
    for content in contents {
        let contents_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => contents_id,
        });
        page_ids.push(page_id.into());
    }

    let mut pages_dict = doc.get_object(pages_id).unwrap().as_dict().unwrap().clone();
    pages_dict.set("Kids", Object::Array(page_ids));
    doc.objects.insert(pages_id, pages_dict.into());

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn reopen(doc: &mut PdfDocument) -> PdfDocument {
    let bytes = doc.to_bytes(&SaveOptions::default()).unwrap();
    PdfDocument::open_from_bytes(&bytes).unwrap()
}

#[test]
fn test_open_save_roundtrip() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Hello) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    assert_eq!(doc.page_count(), 1);

    let reopened = reopen(&mut doc);
    assert_eq!(reopened.page_count(), 1);
    assert_eq!(reopened.extract_text(1).unwrap(), "Hello");
}

#[test]
fn test_open_invalid_bytes() {
    let result = PdfDocument::open_from_bytes(b"not a pdf");
    assert!(matches!(result, Err(PdfError::OpenError(_))));
}

#[test]
fn test_page_box_inherited_from_page() {
    let pdf = create_test_pdf(&[""]);
    let doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    assert_eq!(doc.page_box(1).unwrap(), Rect::new(0.0, 0.0, 595.0, 842.0));
}

#[test]
fn test_extract_text_with_inherited_resources() {
    let pdf = create_test_pdf(&[
        "BT /F1 12 Tf 72 700 Td (Dear {name},) Tj 0 -20 Td (Total: {amount}) Tj ET",
        "BT /F1 12 Tf 72 700 Td (Page two) Tj ET",
    ]);
    let doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    assert_eq!(doc.extract_text(1).unwrap(), "Dear {name},\nTotal: {amount}");
    assert_eq!(doc.extract_text(2).unwrap(), "Page two");
}

#[test]
fn test_find_text_reports_geometry_and_font() {
    let pdf = create_test_pdf(&["BT /F1 11 Tf 72 700 Td (Contract {no}) Tj ET"]);
    let doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    let layout = doc.text_layout(1).unwrap();
    let matches = layout.find("{no}");

    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.baseline, 700.0);
    assert!(m.rect.x0 > 72.0);
    assert!(m.rect.y0 < 700.0 && m.rect.y1 > 700.0);

    let run = layout.run_of(m).unwrap();
    assert_eq!(run.font_name, "Helvetica");
    assert!((run.font_size - 11.0).abs() < 1e-9);
}

#[test]
fn test_invalid_page_number() {
    let pdf = create_test_pdf(&[""]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    assert!(matches!(doc.extract_text(2), Err(PdfError::InvalidPage(2, 1))));
    assert!(matches!(doc.extract_text(0), Err(PdfError::InvalidPage(0, 1))));
    let style = TextStyle::new(StandardFont::Helvetica, 12.0);
    let target = TextTarget::Point {
        x: 0.0,
        y: 0.0,
        max_width: None,
    };
    assert!(matches!(
        doc.insert_text(5, &target, "x", &style),
        Err(PdfError::InvalidPage(5, 1))
    ));
}

#[test]
fn test_erase_survives_save() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Hello {name}, welcome) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let found = doc.find_text(1, "{name}").unwrap();
    let erasures: Vec<Erasure> = found
        .iter()
        .map(|m| Erasure::new(m.rect))
        .collect();
    let outcome = doc.erase(1, &erasures).unwrap();
    assert_eq!(outcome.glyphs_removed, 6);

    let reopened = reopen(&mut doc);
    let text = reopened.extract_text(1).unwrap();
    assert!(!text.contains("{name}"));
    assert!(text.starts_with("Hello"));
    assert!(text.ends_with(", welcome"));
}

#[test]
fn test_erase_nothing_leaves_content() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Hello) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    let outcome = doc
        .erase(1, &[Erasure::new(Rect::new(300.0, 300.0, 310.0, 310.0))])
        .unwrap();
    assert_eq!(outcome.glyphs_removed, 0);
    assert_eq!(doc.extract_text(1).unwrap(), "Hello");
}

#[test]
fn test_insert_text_point() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Name:) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let style = TextStyle::new(StandardFont::Helvetica, 12.0);
    let target = TextTarget::Point {
        x: 72.0,
        y: 650.0,
        max_width: None,
    };
    let fit = doc.insert_text(1, &target, "Ion Popescu", &style).unwrap();
    assert!(fit.fits);

    let reopened = reopen(&mut doc);
    assert_eq!(reopened.extract_text(1).unwrap(), "Name:\nIon Popescu");
    let layout = reopened.text_layout(1).unwrap();
    let m = &layout.find("Ion Popescu")[0];
    assert_eq!(m.baseline, 650.0);
    assert_eq!(layout.run_of(m).unwrap().font_name, "Helvetica");
}

#[test]
fn test_insert_text_romanian_diacritics() {
    let pdf = create_test_pdf(&[""]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let style = TextStyle::new(StandardFont::TimesRoman, 12.0);
    let target = TextTarget::Point {
        x: 72.0,
        y: 700.0,
        max_width: None,
    };
    doc.insert_text(1, &target, "Țară și oraș", &style).unwrap();

    let reopened = reopen(&mut doc);
    assert_eq!(reopened.extract_text(1).unwrap(), "Țară și oraș");
}

#[test]
fn test_insert_text_box_wraps() {
    let pdf = create_test_pdf(&[""]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let style = TextStyle::new(StandardFont::Helvetica, 10.0);
    let target = TextTarget::Box {
        rect: Rect::new(72.0, 600.0, 150.0, 700.0),
        baseline: None,
    };
    let fit = doc
        .insert_text(1, &target, "one two three four five six", &style)
        .unwrap();
    assert!(fit.fits);
    assert!(fit.line_count > 1);

    let reopened = reopen(&mut doc);
    let text = reopened.extract_text(1).unwrap();
    assert_eq!(text.lines().count(), fit.line_count);
    assert_eq!(text.replace('\n', " "), "one two three four five six");
}

#[test]
fn test_insert_keeps_existing_page_fonts() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Before) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let target = TextTarget::Point {
        x: 72.0,
        y: 600.0,
        max_width: None,
    };
    doc.insert_text(1, &target, "After", &TextStyle::new(StandardFont::TimesBold, 12.0))
        .unwrap();

    let reopened = reopen(&mut doc);
    let layout = reopened.text_layout(1).unwrap();
    let fonts: Vec<&str> = layout.runs.iter().map(|r| r.font_name.as_str()).collect();
    assert_eq!(fonts, vec!["Helvetica", "Times-Bold"]);
}

#[test]
fn test_erase_then_insert_same_page() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Dear {name}) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let m = doc.find_text(1, "{name}").unwrap().remove(0);
    doc.erase(1, &[Erasure::new(m.rect)]).unwrap();
    let target = TextTarget::Point {
        x: m.rect.x0,
        y: m.baseline,
        max_width: None,
    };
    doc.insert_text(1, &target, "Ana", &TextStyle::new(StandardFont::Helvetica, 12.0))
        .unwrap();

    let reopened = reopen(&mut doc);
    assert_eq!(reopened.extract_text(1).unwrap(), "Dear Ana");
}

#[test]
fn test_font_registered_before_erase_is_reused() {
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Dear {name}) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let first = doc.get_or_create_font_ref(StandardFont::TimesBold, 1).unwrap();
    let second = doc.get_or_create_font_ref(StandardFont::TimesBold, 1).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, "F1");

    let m = doc.find_text(1, "{name}").unwrap().remove(0);
    doc.erase(1, &[Erasure::new(m.rect)]).unwrap();
    let target = TextTarget::Point {
        x: m.rect.x0,
        y: m.baseline,
        max_width: None,
    };
    doc.insert_text(1, &target, "Ana", &TextStyle::new(StandardFont::TimesBold, 12.0))
        .unwrap();

    let reopened = reopen(&mut doc);
    assert_eq!(reopened.extract_text(1).unwrap(), "Dear Ana");
    let layout = reopened.text_layout(1).unwrap();
    let fonts: Vec<&str> = layout.runs.iter().map(|r| r.font_name.as_str()).collect();
    assert_eq!(fonts, vec!["Helvetica", "Times-Bold"]);
}

#[test]
fn test_page_box_prefers_media_box_over_crop_box() {
    let mut doc = lopdf::Document::new();
    let pages_id = doc.new_object_id();
    let contents_id = doc.add_object(Stream::new(dictionary! {}, b"".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "CropBox" => vec![36.into(), 36.into(), 559.into(), 806.into()],
        "Contents" => contents_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![page_id.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();

    let doc = PdfDocument::open_from_bytes(&bytes).unwrap();
    assert_eq!(doc.page_box(1).unwrap(), Rect::new(0.0, 0.0, 595.0, 842.0));
}

#[test]
fn test_save_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pdf");
    let pdf = create_test_pdf(&["BT /F1 12 Tf 72 700 Td (Saved) Tj ET"]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    doc.save(&path, &SaveOptions::default()).unwrap();

    let reopened = PdfDocument::open(&path).unwrap();
    assert_eq!(reopened.extract_text(1).unwrap(), "Saved");
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_save_failure_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.pdf");
    let pdf = create_test_pdf(&[""]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();

    let result = doc.save(&path, &SaveOptions::default());
    assert!(matches!(result, Err(PdfError::SaveError(_))));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_save_uncompressed() {
    let pdf = create_test_pdf(&[""]);
    let mut doc = PdfDocument::open_from_bytes(&pdf).unwrap();
    let target = TextTarget::Point {
        x: 72.0,
        y: 700.0,
        max_width: None,
    };
    doc.insert_text(1, &target, "plain", &TextStyle::new(StandardFont::Helvetica, 12.0))
        .unwrap();

    let options = SaveOptions {
        prune: false,
        compress: false,
    };
    let bytes = doc.to_bytes(&options).unwrap();
    let haystack = String::from_utf8_lossy(&bytes);
    assert!(haystack.contains("<706C61696E> Tj"));
}
