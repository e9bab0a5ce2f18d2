//! Routes wallet responses arriving as page loads and history changes.

use std::rc::Rc;
use std::sync::Arc;

use petralink_lib::{NavigationOutcome, PetraClient, PetraLinkError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{PopStateEvent, Window};

use crate::utils;

/// Handler invoked with the outcome of every routed location.
pub type OutcomeHandler = Rc<dyn Fn(Result<NavigationOutcome, PetraLinkError>)>;

/// Route the window's current location through the session.
pub fn route_current_location(
    client: &PetraClient,
) -> Result<Result<NavigationOutcome, PetraLinkError>, JsValue> {
    let href = utils::window()?
        .location()
        .href()
        .map_err(|_| utils::js_error("Could not read window location"))?;
    Ok(client.handle_navigation_str(&href))
}

/// A `popstate` listener bound to one session. Removed on drop.
pub struct ResponseRouter {
    window: Window,
    callback: Closure<dyn FnMut(PopStateEvent)>,
}

impl ResponseRouter {
    /// Listen for history changes and route each new location.
    pub fn install(client: Arc<PetraClient>, on_outcome: OutcomeHandler) -> Result<Self, JsValue> {
        let window = utils::window()?;

        let callback = Closure::wrap(Box::new(move |_event: PopStateEvent| {
            match route_current_location(&client) {
                Ok(outcome) => on_outcome(outcome),
                Err(_) => utils::error("Could not read window location"),
            }
        }) as Box<dyn FnMut(PopStateEvent)>);

        window
            .add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref())
            .map_err(|_| utils::js_error("Failed to register popstate listener"))?;

        Ok(Self { window, callback })
    }
}

impl Drop for ResponseRouter {
    fn drop(&mut self) {
        let _ = self.window.remove_event_listener_with_callback(
            "popstate",
            self.callback.as_ref().unchecked_ref(),
        );
    }
}
