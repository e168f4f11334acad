//! ID-card sized credential PDF with a vector QR code.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference, Rect, Rgb,
};
use qrcode::{Color as QrColor, EcLevel, QrCode};

const CARD_WIDTH: f32 = 85.60;
const CARD_HEIGHT: f32 = 53.98;
const QR_SIZE: f32 = 20.0;
const PHOTO_WIDTH: f32 = 16.0;
const DATE_FORMAT: &str = "%d/%m/%Y";

pub struct CardData<'a> {
    pub numero: &'a str,
    pub student_name: &'a str,
    pub dni: &'a str,
    pub course_name: &'a str,
    pub course_code: &'a str,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub verification_url: &'a str,
    pub photo: Option<&'a [u8]>,
}

fn render_err(e: impl std::fmt::Display) -> AppError {
    AppError::Render(e.to_string())
}

pub fn render_card(card: &CardData<'_>) -> AppResult<Vec<u8>> {
    // QR first: an unencodable URL must fail before any drawing happens
    let qr = QrCode::with_error_correction_level(card.verification_url.as_bytes(), EcLevel::L)
        .map_err(render_err)?;

    let (doc, page, layer) =
        PdfDocument::new(card.numero, Mm(CARD_WIDTH), Mm(CARD_HEIGHT), "credencial");
    let layer = doc.get_page(page).get_layer(layer);
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_err)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_err)?;

    layer.set_fill_color(rgb(0.12, 0.25, 0.69));
    layer.add_rect(Rect::new(Mm(0.0), Mm(0.0), Mm(CARD_WIDTH), Mm(CARD_HEIGHT)));

    layer.set_fill_color(rgb(1.0, 1.0, 1.0));
    let text = |s: &str, size: f32, y: f32, font: &IndirectFontRef| {
        layer.use_text(s, size, Mm(5.0), Mm(y), font);
    };
    text("VMP SERVICIOS", 8.0, 48.0, &bold);
    text("Credencial Profesional", 6.0, 45.0, &regular);
    text(card.student_name, 12.0, 35.0, &bold);
    text(&format!("DNI: {}", card.dni), 8.0, 31.0, &regular);
    text(&format!("Curso: {}", card.course_name), 9.0, 26.0, &bold);
    text(&format!("Código: {}", card.course_code), 7.0, 23.0, &regular);
    text(&format!("Emisión: {}", card.issued_at.format(DATE_FORMAT)), 7.0, 17.0, &regular);
    if let Some(expires_at) = card.expires_at {
        text(&format!("Vence: {}", expires_at.format(DATE_FORMAT)), 7.0, 14.0, &regular);
    }
    text(card.numero, 6.0, 3.0, &bold);

    draw_qr(&layer, &qr, 62.0, 3.0);

    if let Some(bytes) = card.photo {
        draw_photo(&layer, bytes, card.numero);
    }

    doc.save_to_bytes().map_err(render_err)
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Draws dark modules as filled squares on a white quiet zone.
fn draw_qr(layer: &PdfLayerReference, qr: &QrCode, x: f32, y: f32) {
    let width = qr.width();
    let module = QR_SIZE / (width + 2) as f32;

    layer.set_fill_color(rgb(1.0, 1.0, 1.0));
    layer.add_rect(Rect::new(Mm(x), Mm(y), Mm(x + QR_SIZE), Mm(y + QR_SIZE)));

    layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    for (i, color) in qr.to_colors().into_iter().enumerate() {
        if color != QrColor::Dark {
            continue;
        }
        let (col, row) = (i % width, i / width);
        // QR rows run top-down, PDF y runs bottom-up
        let left = x + module * (col + 1) as f32;
        let top = y + QR_SIZE - module * (row + 1) as f32;
        layer.add_rect(Rect::new(Mm(left), Mm(top - module), Mm(left + module), Mm(top)));
    }
}

/// An undecodable photo is skipped; the card is still valid without it.
fn draw_photo(layer: &PdfLayerReference, bytes: &[u8], numero: &str) {
    use printpdf::image_crate::GenericImageView;

    let decoded = match printpdf::image_crate::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, numero, "credential photo unreadable, rendering without it");
            return;
        }
    };
    let dpi = 300.0;
    let natural_width = decoded.width() as f32 / dpi * 25.4;
    let scale = if natural_width > 0.0 { PHOTO_WIDTH / natural_width } else { 1.0 };
    Image::from_dynamic_image(&decoded).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(64.0)),
            translate_y: Some(Mm(27.0)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}
