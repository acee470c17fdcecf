use js_sys::{Function, Promise, Reflect};
use qrcodegen::{QrCode, QrCodeEcc};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement};

use crate::error::js_value_to_string;

const QR_BORDER_MODULES: i32 = 2;

/// Module rectangles `(x, y, w, h)` in pixels for a square image of `size_px`.
pub fn qr_module_rects(payload: &str, size_px: u32) -> Option<Vec<(f64, f64, f64, f64)>> {
    let qr = QrCode::encode_text(payload, QrCodeEcc::Medium).ok()?;
    let qr_size = qr.size();
    let total_modules = qr_size + QR_BORDER_MODULES * 2;
    let module_px = size_px as f64 / total_modules as f64;

    let mut rects = Vec::new();
    for y in 0..qr_size {
        for x in 0..qr_size {
            if !qr.get_module(x, y) {
                continue;
            }
            let x0 = ((x + QR_BORDER_MODULES) as f64 * module_px).floor();
            let y0 = ((y + QR_BORDER_MODULES) as f64 * module_px).floor();
            let x1 = ((x + QR_BORDER_MODULES + 1) as f64 * module_px).ceil();
            let y1 = ((y + QR_BORDER_MODULES + 1) as f64 * module_px).ceil();
            rects.push((x0, y0, (x1 - x0).max(1.0), (y1 - y0).max(1.0)));
        }
    }
    Some(rects)
}

pub fn render_qr_data_url(document: &Document, payload: &str, size_px: u32) -> Result<String, JsValue> {
    let rects = qr_module_rects(payload, size_px)
        .ok_or_else(|| JsValue::from_str("failed to encode share QR payload"))?;

    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    canvas.set_width(size_px);
    canvas.set_height(size_px);

    let context = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2D canvas unavailable for share QR"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    context.set_image_smoothing_enabled(false);

    let size = size_px as f64;
    context.set_fill_style_str("#f8fcff");
    context.fill_rect(0.0, 0.0, size, size);

    context.set_fill_style_str("#0a1018");
    for (x, y, w, h) in rects {
        context.fill_rect(x, y, w, h);
    }

    canvas.to_data_url_with_type("image/png")
}

fn js_function(target: &JsValue, name: &str) -> Result<Function, String> {
    Reflect::get(target, &JsValue::from_str(name))
        .map_err(|err| js_value_to_string(&err))?
        .dyn_into::<Function>()
        .map_err(|_| format!("{} missing", name))
}

/// `navigator.clipboard.writeText`, looked up dynamically since the API is
/// missing on insecure origins.
pub async fn copy_text(text: &str) -> Result<(), String> {
    let window = web_sys::window().ok_or_else(|| "missing window".to_string())?;
    let nav_js: JsValue = window.navigator().into();

    let clipboard = Reflect::get(&nav_js, &JsValue::from_str("clipboard"))
        .map_err(|err| js_value_to_string(&err))?;
    if clipboard.is_undefined() || clipboard.is_null() {
        return Err("clipboard unavailable".to_string());
    }

    let write_text = js_function(&clipboard, "writeText")?;
    let promise = write_text
        .call1(&clipboard, &JsValue::from_str(text))
        .map_err(|err| js_value_to_string(&err))?;
    JsFuture::from(Promise::from(promise))
        .await
        .map_err(|err| js_value_to_string(&err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_rects_fit_inside_the_image() {
        let rects = qr_module_rects("http://localhost:8000/api/video/3f2a9c", 176).unwrap();
        assert!(!rects.is_empty());
        for (x, y, w, h) in rects {
            assert!(x >= 0.0 && y >= 0.0);
            assert!(x + w <= 177.0 && y + h <= 177.0);
        }
    }
}
