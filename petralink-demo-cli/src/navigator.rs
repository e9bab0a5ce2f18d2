//! Deep-link dispatch for a terminal: show the link instead of opening it.

use petralink_lib::Navigator;
use url::Url;

use crate::ui;

/// Prints each deep link and its QR code so a phone can open it.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNavigator {
    mobile: bool,
}

impl TerminalNavigator {
    /// `mobile = false` makes the session refuse deep links, as a desktop
    /// browser would.
    pub fn new(mobile: bool) -> Self {
        Self { mobile }
    }
}

impl Navigator for TerminalNavigator {
    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn navigate(&self, url: &Url) {
        tracing::debug!(url = %url, "Dispatching deep link");
        ui::separator();
        ui::info("Open this link on the device running Petra:");
        println!("  {}", url);
        if let Err(e) = ui::qr_code(url.as_str()) {
            ui::warning(&format!("Could not render QR code: {}", e));
        }
        ui::separator();
    }
}
