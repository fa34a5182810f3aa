//! Centralized branding constants
//!
//! All product naming comes from this module.

/// User-facing display name
pub const DISPLAY_NAME: &str = "DMFlow";

/// Prefix for rolling log files (e.g. `dmflow.2026-10-19.log`)
pub const LOG_PREFIX: &str = "dmflow";

/// Prefix for environment variables read by [`crate::ConnectConfig::from_env`]
pub const ENV_PREFIX: &str = "DMFLOW";

/// External platform connected by default
pub const DEFAULT_PROVIDER: &str = "instagram";

/// Name given to the authorization popup window
pub const POPUP_WINDOW_NAME: &str = "oauth_connect";

/// Preferred port for the native host's loopback callback page
pub const DEFAULT_LOOPBACK_PORT: u16 = 45_920;

/// Path of the loopback callback page served by the native host
pub fn loopback_callback_path() -> &'static str {
    "/oauth/complete"
}

/// Get the window title with suffix
///
/// # Example
/// ```
/// let title = dmflow_core::branding::window_title("Connect Instagram");
/// assert_eq!(title, "DMFlow - Connect Instagram");
/// ```
pub fn window_title(suffix: &str) -> String {
    format!("{} - {}", DISPLAY_NAME, suffix)
}
