//! JS-facing wallet session.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use js_sys::{Function, Promise};
use petralink_lib::{
    DeepLinkConfig, NavigationOutcome, PetraClient, PetraLinkError, SignResponse, Subscription,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::navigator::WindowNavigator;
use crate::router::{self, ResponseRouter};
use crate::storage::LocalStorageStore;
use crate::utils;

thread_local! {
    // Listener closures handed to the client must be `Send + Sync`, which JS
    // functions are not. They capture an id into this table instead.
    static CALLBACKS: RefCell<HashMap<u32, Function>> = RefCell::new(HashMap::new());
    static NEXT_CALLBACK: RefCell<u32> = const { RefCell::new(0) };
}

fn register_callback(callback: Function) -> u32 {
    let id = NEXT_CALLBACK.with(|next| {
        let mut next = next.borrow_mut();
        *next += 1;
        *next
    });
    CALLBACKS.with(|table| table.borrow_mut().insert(id, callback));
    id
}

fn call_callback(id: u32, arg: &JsValue) -> Result<(), String> {
    let callback = CALLBACKS.with(|table| table.borrow().get(&id).cloned());
    match callback {
        Some(f) => f
            .call1(&JsValue::NULL, arg)
            .map(|_| ())
            .map_err(|e| format!("listener threw: {:?}", e)),
        None => Ok(()),
    }
}

/// Payload handed to `onSignResponse` callbacks.
#[derive(Serialize)]
struct SignResponseEvent<'a> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// `{status, data?, error?}` for a signing response.
pub fn sign_response_to_js(response: &SignResponse) -> Result<JsValue, JsValue> {
    let event = match response {
        SignResponse::Approved(data) => SignResponseEvent {
            status: "approved",
            data: Some(data),
            error: None,
        },
        SignResponse::Rejected => SignResponseEvent {
            status: "rejected",
            data: None,
            error: None,
        },
        SignResponse::Failed(reason) => SignResponseEvent {
            status: "failed",
            data: None,
            error: Some(reason),
        },
    };
    utils::to_js(&event)
}

/// Petra wallet session for browser apps.
///
/// ```js
/// const session = new WebSession("https://bundle.example", "Bundle");
/// session.onStateChange((s) => render(s));
/// session.listen();
/// await session.connect();
/// ```
#[wasm_bindgen]
pub struct WebSession {
    client: Arc<PetraClient>,
    subscriptions: RefCell<HashMap<u32, Subscription>>,
    router: RefCell<Option<ResponseRouter>>,
}

#[wasm_bindgen]
impl WebSession {
    /// Create a session for `origin`, restoring any session saved in
    /// `localStorage`.
    #[wasm_bindgen(constructor)]
    pub fn new(origin: &str, app_name: Option<String>) -> Result<WebSession, JsValue> {
        let mut config = DeepLinkConfig::new(origin);
        if let Some(name) = app_name {
            config = config.with_app_name(name);
        }
        let client = PetraClient::new(
            &config,
            Arc::new(LocalStorageStore::new()),
            Arc::new(WindowNavigator::new()),
        )
        .map_err(utils::session_error)?;

        Ok(WebSession::from_client(Arc::new(client)))
    }

    /// Current session snapshot as a plain object.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> Result<JsValue, JsValue> {
        utils::to_js(&self.client.snapshot())
    }

    #[wasm_bindgen(getter, js_name = isConnected)]
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    #[wasm_bindgen(getter, js_name = isMobile)]
    pub fn is_mobile(&self) -> bool {
        self.client.is_mobile()
    }

    #[wasm_bindgen(getter)]
    pub fn address(&self) -> Option<String> {
        self.client.peer_address()
    }

    /// Open the wallet to approve a connection.
    pub fn connect(&self) -> Result<(), JsValue> {
        self.client.connect().map_err(utils::session_error)
    }

    /// Drop the session locally and tell the wallet.
    pub fn disconnect(&self) -> Result<(), JsValue> {
        self.client.disconnect().map_err(utils::session_error)
    }

    /// Ask the wallet to sign and submit `payload`.
    ///
    /// Resolves with the wallet's response data (including `hash`) once the
    /// response page is routed; rejects if the user declines.
    #[wasm_bindgen(js_name = signAndSubmit)]
    pub fn sign_and_submit(&self, payload: JsValue) -> Result<Promise, JsValue> {
        let payload: serde_json::Value = serde_wasm_bindgen::from_value(payload)
            .map_err(|e| utils::js_error(&format!("Invalid payload: {}", e)))?;
        self.send(|client| client.sign_and_submit(&payload))
    }

    /// Ask the wallet to sign `payload` as a message.
    #[wasm_bindgen(js_name = signMessage)]
    pub fn sign_message(&self, payload: JsValue) -> Result<Promise, JsValue> {
        let payload: serde_json::Value = serde_wasm_bindgen::from_value(payload)
            .map_err(|e| utils::js_error(&format!("Invalid payload: {}", e)))?;
        self.send(|client| client.sign_message(&payload))
    }

    /// Route a URL, e.g. from a client-side router. Returns the outcome kind.
    #[wasm_bindgen(js_name = handleLocation)]
    pub fn handle_location(&self, href: &str) -> Result<String, JsValue> {
        self.client
            .handle_navigation_str(href)
            .map(|outcome| outcome_name(&outcome).to_string())
            .map_err(utils::session_error)
    }

    /// Route the current location now and on every `popstate` from here on.
    pub fn listen(&self) -> Result<String, JsValue> {
        let outcome = router::route_current_location(&self.client)?;

        let router = ResponseRouter::install(
            self.client.clone(),
            Rc::new(|outcome: Result<NavigationOutcome, PetraLinkError>| {
                if let Err(e) = outcome {
                    utils::warn(&format!("Wallet response failed: {}", e.message()));
                }
            }),
        )?;
        self.router.replace(Some(router));

        outcome
            .map(|o| outcome_name(&o).to_string())
            .map_err(utils::session_error)
    }

    /// Stop routing `popstate` events.
    #[wasm_bindgen(js_name = stopListening)]
    pub fn stop_listening(&self) {
        self.router.replace(None);
    }

    /// Call `callback(snapshot)` on every state change. Returns a handle for
    /// [`WebSession::unsubscribe`].
    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&self, callback: Function) -> Result<u32, JsValue> {
        let id = register_callback(callback);
        let subscription = self
            .client
            .on_state_change(move |snapshot| {
                let value = utils::to_js(snapshot).map_err(|e| format!("{:?}", e))?;
                call_callback(id, &value).map_err(Into::into)
            })
            .map_err(utils::session_error)?;
        self.subscriptions.borrow_mut().insert(id, subscription);
        Ok(id)
    }

    /// Call `callback({status, data?, error?})` on every signing response.
    #[wasm_bindgen(js_name = onSignResponse)]
    pub fn on_sign_response(&self, callback: Function) -> Result<u32, JsValue> {
        let id = register_callback(callback);
        let subscription = self
            .client
            .on_sign_response(move |response| {
                let value = sign_response_to_js(response).map_err(|e| format!("{:?}", e))?;
                call_callback(id, &value).map_err(Into::into)
            })
            .map_err(utils::session_error)?;
        self.subscriptions.borrow_mut().insert(id, subscription);
        Ok(id)
    }

    pub fn unsubscribe(&self, id: u32) -> bool {
        CALLBACKS.with(|table| table.borrow_mut().remove(&id));
        match self.subscriptions.borrow_mut().remove(&id) {
            Some(subscription) => self.client.unsubscribe(subscription),
            None => false,
        }
    }
}

impl WebSession {
    /// Wrap an existing client, e.g. one built with a custom navigator.
    pub fn from_client(client: Arc<PetraClient>) -> WebSession {
        WebSession {
            client,
            subscriptions: RefCell::new(HashMap::new()),
            router: RefCell::new(None),
        }
    }

    fn send<F>(&self, dispatch: F) -> Result<Promise, JsValue>
    where
        F: FnOnce(&PetraClient) -> Result<(), PetraLinkError>,
    {
        let waiter = self
            .client
            .sign_response_waiter()
            .map_err(utils::session_error)?;
        dispatch(&self.client).map_err(utils::session_error)?;

        Ok(future_to_promise(async move {
            match waiter.recv().await {
                Some(SignResponse::Approved(data)) => utils::to_js(&data),
                Some(SignResponse::Rejected) => {
                    Err(utils::js_error("Transaction rejected by user"))
                }
                Some(SignResponse::Failed(reason)) => Err(utils::js_error(&reason)),
                None => Err(utils::session_error(PetraLinkError::NotConnected)),
            }
        }))
    }
}

impl Drop for WebSession {
    fn drop(&mut self) {
        CALLBACKS.with(|table| {
            let mut table = table.borrow_mut();
            for id in self.subscriptions.borrow().keys() {
                table.remove(id);
            }
        });
    }
}

fn outcome_name(outcome: &NavigationOutcome) -> &'static str {
    match outcome {
        NavigationOutcome::Ignored => "ignored",
        NavigationOutcome::Connected { .. } => "connected",
        NavigationOutcome::Signed(_) => "signed",
        NavigationOutcome::Disconnected => "disconnected",
    }
}
