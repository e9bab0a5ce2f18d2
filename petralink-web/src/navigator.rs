//! Deep-link dispatch through `window.location`.

use petralink_lib::{is_mobile_user_agent, Navigator};
use url::Url;
use wasm_bindgen::JsValue;

use crate::utils;

/// [`Navigator`] backed by the browser window.
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowNavigator;

impl WindowNavigator {
    pub fn new() -> Self {
        Self
    }
}

impl Navigator for WindowNavigator {
    fn is_mobile(&self) -> bool {
        web_sys::window()
            .and_then(|w| w.navigator().user_agent().ok())
            .map(|ua| is_mobile_user_agent(&ua))
            .unwrap_or(false)
    }

    fn navigate(&self, url: &Url) {
        let Some(window) = web_sys::window() else {
            utils::error("No window object, deep link dropped");
            return;
        };
        if window.location().set_href(url.as_str()).is_err() {
            utils::error("Failed to open wallet deep link");
        }
    }

    /// Replace the response URL with `/` so a reload does not replay it.
    fn consume_response_location(&self) {
        let history = web_sys::window().and_then(|w| w.history().ok());
        if let Some(history) = history {
            if history
                .replace_state_with_url(&JsValue::NULL, "", Some("/"))
                .is_err()
            {
                utils::warn("Failed to clear wallet response from location");
            }
        }
    }
}
