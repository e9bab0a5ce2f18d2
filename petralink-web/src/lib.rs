#![cfg(target_arch = "wasm32")]
//! Petra wallet session - WebAssembly bindings
//!
//! Browser glue for `petralink-lib`: session persistence in `localStorage`,
//! deep-link dispatch through `window.location`, and a `popstate` router that
//! feeds wallet responses back into the session.

use wasm_bindgen::prelude::*;

mod navigator;
mod router;
mod session;
mod storage;
mod utils;

pub use navigator::WindowNavigator;
pub use router::{route_current_location, ResponseRouter};
pub use session::{sign_response_to_js, WebSession};
pub use storage::LocalStorageStore;
pub use utils::to_js;

/// Initialize the WASM module
///
/// Runs once when the module is loaded and routes panics to the console.
#[wasm_bindgen(start)]
pub fn init() {
    utils::set_panic_hook();
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Whether `user_agent` belongs to a mobile browser that can open the wallet.
#[wasm_bindgen(js_name = isMobileUserAgent)]
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    petralink_lib::is_mobile_user_agent(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_mobile_user_agent() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
        ));
        assert!(!is_mobile_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/120.0"
        ));
    }
}
