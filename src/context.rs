//! Everything a command needs, wired from the config file

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::config::{default_config_path, ConfigPermission, ConsoleConfig};
use crate::desktop::{detect_notifier, DesktopNotifier};
use crate::error::{Result, RoombookError};
use crate::notify::{BannerNotifier, NativeChannel, NotificationChannel, NotificationPermission};
use crate::reminder::ReminderStore;
use crate::session::{AuthSession, SessionStore};
use crate::storage::{FileStorage, MemoryStorage, Storage};

pub struct AppContext {
    pub config: ConsoleConfig,
    pub config_path: PathBuf,
    pub sessions: SessionStore,
    /// False when running on the in-memory fallback
    pub durable_storage: bool,
    pub reminders: Arc<Mutex<ReminderStore>>,
    pub notifications: Arc<NotificationChannel>,
    pub api: ApiClient,
}

impl AppContext {
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(default_config_path);
        let mut config = ConsoleConfig::load(&config_path).await?;
        debug!(path = %config_path.display(), storage = %config.storage_dir.display(), "configuration loaded");

        let (storage, durable_storage): (Arc<dyn Storage>, bool) =
            match std::fs::create_dir_all(&config.storage_dir) {
                Ok(()) => (Arc::new(FileStorage::new(config.storage_dir.clone())), true),
                Err(e) => {
                    warn!(
                        "Storage directory {} unavailable, nothing will persist: {}",
                        config.storage_dir.display(),
                        e
                    );
                    (Arc::new(MemoryStorage::new()), false)
                }
            };
        let sessions = SessionStore::new(storage.clone());
        let reminders = Arc::new(Mutex::new(ReminderStore::new(storage)));

        let notifier_path = match detect_notifier(&mut config, &config_path).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Desktop notifier detection failed: {}", e);
                None
            }
        };
        let native = notifier_path
            .map(|path| Box::new(DesktopNotifier::from_path(&path)) as Box<dyn NativeChannel>);
        let notifications = Arc::new(
            NotificationChannel::new(
                native,
                config.notification_permission,
                Box::new(BannerNotifier::new(config.banner_duration())),
            )
            .with_permission_source(Box::new(ConfigPermission::new(&config_path))),
        );

        let api = ApiClient::new(config.to_client_config()?)?;

        Ok(Self {
            config,
            config_path,
            sessions,
            durable_storage,
            reminders,
            notifications,
            api,
        })
    }

    /// The current session, or an error telling the user to log in.
    pub fn require_session(&self) -> Result<AuthSession> {
        self.sessions
            .session()
            .filter(|session| !session.token.is_empty())
            .cloned()
            .ok_or_else(RoombookError::session_not_found)
    }

    /// Remember a permission decision across runs.
    pub async fn save_permission(&mut self, permission: NotificationPermission) -> Result<()> {
        if self.config.notification_permission == permission {
            return Ok(());
        }
        self.config.notification_permission = permission;
        self.config.save(&self.config_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::tests::test_helpers::create_temp_dir;
    use roombook_protocol::UserRole;

    #[tokio::test]
    async fn test_context_uses_configured_storage() {
        let dir = create_temp_dir();
        let config_path = dir.path().join("config.json");
        let config = ConsoleConfig {
            storage_dir: dir.path().join("data"),
            ..ConsoleConfig::default()
        };
        config.save(&config_path).await.unwrap();

        let mut ctx = AppContext::load(Some(config_path.clone())).await.unwrap();
        assert!(ctx.require_session().is_err());
        assert!(dir.path().join("data").is_dir());
        assert!(ctx.durable_storage);

        let session = AuthSession::new("token").with_user("jdoe", UserRole::User);
        ctx.sessions.set_session(Some(session)).unwrap();
        assert!(dir.path().join("data").join("sr-auth.json").exists());
        assert_eq!(ctx.require_session().unwrap().username(), "jdoe");

        ctx.save_permission(NotificationPermission::Denied).await.unwrap();
        let reloaded = ConsoleConfig::load(&config_path).await.unwrap();
        assert_eq!(reloaded.notification_permission, NotificationPermission::Denied);
    }

    #[tokio::test]
    async fn test_running_context_sees_permission_saved_by_another() {
        let dir = create_temp_dir();
        let config_path = dir.path().join("config.json");
        let config = ConsoleConfig {
            storage_dir: dir.path().join("data"),
            ..ConsoleConfig::default()
        };
        config.save(&config_path).await.unwrap();

        let watcher = AppContext::load(Some(config_path.clone())).await.unwrap();
        let mut other = AppContext::load(Some(config_path)).await.unwrap();
        other.save_permission(NotificationPermission::Granted).await.unwrap();

        assert_eq!(watcher.notifications.permission(), NotificationPermission::Default);
        watcher.notifications.refresh();
        assert_eq!(watcher.notifications.permission(), NotificationPermission::Granted);
    }
}
