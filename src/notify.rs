//! Notification channel for reminders
//!
//! Desktop notifications are used only when a notifier is available and the
//! user granted permission; every other case, including a failed desktop
//! dispatch, falls back to a transient banner in the terminal.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::desktop::DesktopNotifier;
use crate::error::Result;
use crate::ui;

/// Title of every reminder notification
pub const REMINDER_TITLE: &str = "Reservation reminder";

/// Something that can put a short alert in front of the user
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);

    /// Pick up settings changed by another process since the last call.
    fn refresh(&self) {}
}

impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    fn notify(&self, message: &str) {
        (**self).notify(message)
    }

    fn refresh(&self) {
        (**self).refresh()
    }
}

/// Where the persisted permission decision can be read back from
pub trait PermissionSource: Send + Sync {
    /// `None` when the stored decision cannot be read.
    fn current(&self) -> Option<NotificationPermission>;
}

/// A native channel that may refuse to deliver
pub trait NativeChannel: Send + Sync {
    fn dispatch(&self, title: &str, body: &str) -> Result<()>;
}

impl NativeChannel for DesktopNotifier {
    fn dispatch(&self, title: &str, body: &str) -> Result<()> {
        DesktopNotifier::dispatch(self, title, body)
    }
}

/// Whether the user allowed desktop notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    /// Not asked yet, or the question was dismissed
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for NotificationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NotificationPermission::Default => "default",
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
        };
        f.write_str(text)
    }
}

/// Asks the user for notification permission
pub trait PermissionPrompt {
    /// `Ok(None)` when the question was dismissed without an answer.
    fn ask(&self) -> Result<Option<bool>>;
}

/// Interactive yes/no prompt; non-interactive sessions never answer.
pub struct DialoguerPrompt;

impl PermissionPrompt for DialoguerPrompt {
    fn ask(&self) -> Result<Option<bool>> {
        if !console::Term::stderr().is_term() {
            return Ok(None);
        }
        let answer = dialoguer::Confirm::new()
            .with_prompt("Show desktop notifications for reservation reminders?")
            .default(true)
            .interact_opt()?;
        Ok(answer)
    }
}

/// Terminal banner that clears itself after a fixed delay
#[derive(Debug, Clone)]
pub struct BannerNotifier {
    dismiss_after: Duration,
}

impl BannerNotifier {
    pub fn new(dismiss_after: Duration) -> Self {
        Self { dismiss_after }
    }
}

impl Notifier for BannerNotifier {
    fn notify(&self, message: &str) {
        ui::show_banner(REMINDER_TITLE, message, self.dismiss_after);
    }
}

/// Delivery policy: desktop when allowed, banner otherwise
pub struct NotificationChannel {
    native: Option<Box<dyn NativeChannel>>,
    permission: RwLock<NotificationPermission>,
    source: Option<Box<dyn PermissionSource>>,
    fallback: Box<dyn Notifier>,
}

impl NotificationChannel {
    pub fn new(
        native: Option<Box<dyn NativeChannel>>,
        permission: NotificationPermission,
        fallback: Box<dyn Notifier>,
    ) -> Self {
        Self {
            native,
            permission: RwLock::new(permission),
            source: None,
            fallback,
        }
    }

    /// Re-read the permission from `source` on every [`Notifier::refresh`].
    pub fn with_permission_source(mut self, source: Box<dyn PermissionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// A native channel exists on this machine.
    pub fn is_supported(&self) -> bool {
        self.native.is_some()
    }

    pub fn permission(&self) -> NotificationPermission {
        *self
            .permission
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_permission(&self, permission: NotificationPermission) {
        *self
            .permission
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = permission;
    }

    /// Ask for permission if, and only if, a native channel exists and the
    /// user has not decided yet. Returns the permission afterwards.
    pub fn request_permission(&self, prompt: &dyn PermissionPrompt) -> Result<NotificationPermission> {
        if !self.is_supported() || self.permission() != NotificationPermission::Default {
            return Ok(self.permission());
        }

        let permission = match prompt.ask()? {
            Some(true) => NotificationPermission::Granted,
            Some(false) => NotificationPermission::Denied,
            None => NotificationPermission::Default,
        };
        debug!(%permission, "notification permission answered");
        self.set_permission(permission);
        Ok(self.permission())
    }
}

impl Notifier for NotificationChannel {
    fn refresh(&self) {
        let Some(permission) = self.source.as_ref().and_then(|source| source.current()) else {
            return;
        };
        if permission != self.permission() {
            debug!(%permission, "notification permission changed");
            self.set_permission(permission);
        }
    }

    fn notify(&self, message: &str) {
        if self.permission() == NotificationPermission::Granted {
            if let Some(native) = &self.native {
                match native.dispatch(REMINDER_TITLE, message) {
                    Ok(()) => {
                        info!(message, "reminder delivered to desktop");
                        return;
                    }
                    Err(e) => warn!("Desktop notification failed, showing banner: {}", e),
                }
            }
        }

        info!(message, "reminder shown in terminal");
        self.fallback.notify(message);
    }
}
