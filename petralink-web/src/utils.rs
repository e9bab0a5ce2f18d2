//! Utility functions for WASM

use petralink_lib::PetraLinkError;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Route panics to the browser console.
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Log a message to the browser console
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    pub fn warn(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    pub fn error(s: &str);
}

/// Convert a message into a JS `Error`.
pub fn js_error(msg: &str) -> JsValue {
    js_sys::Error::new(msg).into()
}

/// Convert a session error into a JS `Error` carrying a numeric `code`.
pub fn session_error(err: PetraLinkError) -> JsValue {
    let js = js_sys::Error::new(&err.message());
    let _ = js_sys::Reflect::set(
        &js,
        &JsValue::from_str("code"),
        &JsValue::from_f64(err.code() as i32 as f64),
    );
    js.into()
}

/// The browser window, or a JS error outside a window context.
pub fn window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| js_error("No window object"))
}

/// Serialize to a plain JS value: objects, not `Map`s, for JSON maps.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| js_error(&e.to_string()))
}
