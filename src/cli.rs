use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

use roombook_protocol::{ReservationPayload, RoomRef};

use crate::auth::AuthService;
use crate::booking::BookingService;
use crate::config::{default_config_path, ConfigService, ConsoleConfig};
use crate::context::AppContext;
use crate::error::{Result, RoombookError};
use crate::notify::{DialoguerPrompt, NotificationPermission};
use crate::reminder::LocalReminder;
use crate::scheduler::ReminderScheduler;
use crate::ui::UI;
use crate::utils::format_hour;
use crate::{Commands, CredentialsArgs, RemindCommand, ReserveArgs, RoomsCommand};

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    async fn context(&self) -> Result<AppContext> {
        AppContext::load(self.config_path.clone()).await
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Register(args) => self.handle_register(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::Rooms(args) => self.handle_rooms(args.command).await,
            Commands::Reserve(args) => self.handle_reserve(args).await,
            Commands::Reservations(args) => self.handle_reservations(args.date).await,
            Commands::Remind(args) => self.handle_remind(args.command).await,
            Commands::Watch => self.handle_watch().await,
            Commands::Config(args) => self.handle_config(args.command).await,
        }
    }

    async fn handle_login(&mut self, args: CredentialsArgs) -> Result<()> {
        let mut ctx = self.context().await?;
        let password = read_password(args.password, false)?;

        let spinner = self.ui.spinner("Logging in...");
        let result = AuthService::new(&ctx.api)
            .login(&mut ctx.sessions, &args.username, &password)
            .await;
        spinner.finish_and_clear();

        let session = result?;
        self.ui.success(&format!("Logged in as {}", session.username()));
        Ok(())
    }

    async fn handle_register(&mut self, args: CredentialsArgs) -> Result<()> {
        let mut ctx = self.context().await?;
        let password = read_password(args.password, true)?;

        let spinner = self.ui.spinner("Creating account...");
        let result = AuthService::new(&ctx.api)
            .register(&mut ctx.sessions, &args.username, &password)
            .await;
        spinner.finish_and_clear();

        let session = result?;
        self.ui.success(&format!(
            "Account created, logged in as {}",
            session.username()
        ));
        Ok(())
    }

    async fn handle_logout(&mut self) -> Result<()> {
        let mut ctx = self.context().await?;
        AuthService::new(&ctx.api).logout(&mut ctx.sessions)?;
        self.ui.success("Logged out");
        Ok(())
    }

    async fn handle_status(&mut self) -> Result<()> {
        let ctx = self.context().await?;
        let mut rows = vec![(
            "Version",
            format!("{} v{}", env!("CARGO_PKG_NAME"), crate::CURRENT_VERSION),
        )];

        let Some(session) = ctx.sessions.session().cloned() else {
            rows.push(("Session", "Not logged in".to_string()));
            self.ui.card("Status", rows);
            return Ok(());
        };

        rows.push(("User", session.username().to_string()));
        rows.push(("Role", self.ui.format_role(session.role())));
        rows.push((
            "Identity",
            self.ui.format_identity_source(session.identity_source()),
        ));

        let spinner = self.ui.spinner("Loading dashboard...");
        let overview = BookingService::new(&ctx.api)
            .overview(&session, Utc::now())
            .await;
        spinner.finish_and_clear();

        match overview {
            Ok(overview) => {
                let label = if session.is_admin() {
                    "Reservations"
                } else {
                    "My reservations"
                };
                rows.push(("Rooms", overview.rooms.to_string()));
                rows.push((label, overview.reservations.to_string()));
                rows.push((
                    "Next reservation",
                    overview
                        .upcoming
                        .map(|r| {
                            format!(
                                "{} {} ({})",
                                r.date,
                                format_hour(r.start_time.as_deref()),
                                r.room.name
                            )
                        })
                        .unwrap_or_else(|| "None pending".to_string()),
                ));
            }
            Err(e) => rows.push(("Server", e.user_message())),
        }

        let pending = ctx
            .reminders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .list()
            .iter()
            .filter(|r| !r.fired)
            .count();
        rows.push(("Reminders", pending.to_string()));
        rows.push(("Notifications", ctx.notifications.permission().to_string()));

        self.ui.card("Status", rows);
        Ok(())
    }

    async fn handle_rooms(&mut self, command: RoomsCommand) -> Result<()> {
        let ctx = self.context().await?;
        let session = ctx.require_session()?;
        let service = BookingService::new(&ctx.api);

        match command {
            RoomsCommand::List => {
                let rooms = service.rooms(&session).await?;
                if rooms.is_empty() {
                    self.ui.info("No rooms registered");
                    return Ok(());
                }
                self.ui.header("Rooms");
                for room in &rooms {
                    println!("{}", self.ui.format_room(room));
                }
            }
            RoomsCommand::Create { name } => {
                let room = service.create_room(&session, &name).await?;
                self.ui
                    .success(&format!("Room '{}' created (id {})", room.name, room.id));
            }
            RoomsCommand::Rename { id, name } => {
                let room = service.rename_room(&session, &id, &name).await?;
                self.ui.success(&format!("Room {} renamed to '{}'", room.id, room.name));
            }
            RoomsCommand::Delete { id, force } => {
                if !force {
                    let confirmed = dialoguer::Confirm::new()
                        .with_prompt(format!("Delete room {} permanently?", id))
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        return Err(RoombookError::user_cancelled());
                    }
                }
                service.delete_room(&session, &id).await?;
                self.ui.success(&format!("Room {} deleted", id));
            }
        }
        Ok(())
    }

    async fn handle_reserve(&mut self, args: ReserveArgs) -> Result<()> {
        let ctx = self.context().await?;
        let session = ctx.require_session()?;

        let payload = ReservationPayload {
            room: RoomRef { id: args.room },
            date: args.date,
            start_time: args.start,
            end_time: args.end,
            manager_dni: args.dni,
            manager_first_names: args.first_names,
            manager_last_names: args.last_names,
            attendees: args.attendees,
            description: args.description,
        };

        let spinner = self.ui.spinner("Sending reservation...");
        let result = BookingService::new(&ctx.api).reserve(&session, &payload).await;
        spinner.finish_and_clear();

        let receipt = result?;
        self.ui.success(&format!(
            "Reservation created: {} on {} {}-{}",
            receipt.room_name,
            payload.date,
            format_hour(Some(&payload.start_time)),
            format_hour(Some(&payload.end_time))
        ));
        if let Some(link) = receipt.calendar_link {
            self.ui.blank_line();
            self.ui.info("Add it to Google Calendar:");
            println!("{}", link);
        }
        Ok(())
    }

    async fn handle_reservations(&mut self, date: Option<String>) -> Result<()> {
        let ctx = self.context().await?;
        let session = ctx.require_session()?;
        if date.is_some() && !ctx.sessions.is_admin() {
            self.ui
                .warning("Date filtering is only available to administrators; showing your reservations");
        }

        let reservations = BookingService::new(&ctx.api)
            .reservations(&session, date.as_deref())
            .await?;
        if reservations.is_empty() {
            self.ui.info("No reservations found");
            return Ok(());
        }

        self.ui.header(if session.is_admin() {
            "Reservations"
        } else {
            "My reservations"
        });
        for reservation in &reservations {
            println!("{}", self.ui.format_reservation(reservation));
        }
        Ok(())
    }

    async fn handle_remind(&mut self, command: RemindCommand) -> Result<()> {
        let mut ctx = self.context().await?;

        match command {
            RemindCommand::Add {
                reservation_id,
                minutes,
            } => {
                let session = ctx.require_session()?;
                let reservation = BookingService::new(&ctx.api)
                    .find_reservation(&session, &reservation_id)
                    .await?;

                let (reminder, saved) = {
                    let mut store = ctx
                        .reminders
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    let reminder =
                        store.schedule_for_reservation(&reservation, minutes, Utc::now())?;
                    (reminder, store.is_saved() && ctx.durable_storage)
                };

                let permission = ctx.notifications.request_permission(&DialoguerPrompt)?;
                ctx.save_permission(permission).await?;

                self.ui.success(&format!(
                    "Reminder set {} before {} ({})",
                    minutes,
                    reminder.room_label,
                    reminder
                        .trigger_at
                        .with_timezone(&chrono::Local)
                        .format("fires %Y-%m-%d %H:%M")
                ));
                if !saved {
                    self.ui.warning(
                        "The reminder could not be saved and will be lost when this command exits; check the storage directory",
                    );
                } else if permission != NotificationPermission::Granted {
                    self.ui
                        .info("Reminders will show in the terminal running 'roombook watch'");
                }
            }
            RemindCommand::Cancel { id } => {
                let mut store = ctx
                    .reminders
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                // accept a reservation id as well as a reminder id
                let target = if store.list().iter().any(|r| r.id == id) {
                    Some(id.clone())
                } else {
                    store.find_active(&id).map(|r| r.id.clone())
                };
                match target.filter(|target| store.cancel(target)) {
                    Some(target) => {
                        self.ui.success(&format!("Reminder {} cancelled", target));
                    }
                    None => return Err(RoombookError::not_found(format!("reminder {}", id))),
                }
            }
            RemindCommand::List => {
                let store = ctx
                    .reminders
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let mut pending: Vec<&LocalReminder> =
                    store.list().iter().filter(|r| !r.fired).collect();
                if pending.is_empty() {
                    self.ui.info("No reminders scheduled");
                    return Ok(());
                }
                pending.sort_by_key(|r| r.trigger_at);
                self.ui.header("Reminders");
                for reminder in pending {
                    println!(
                        "{:<12} {}  {}",
                        reminder.id,
                        reminder
                            .trigger_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M"),
                        reminder.message()
                    );
                }
            }
        }
        Ok(())
    }

    async fn handle_watch(&mut self) -> Result<()> {
        let ctx = self.context().await?;
        let scheduler = ReminderScheduler::new(
            ctx.reminders.clone(),
            ctx.notifications.clone(),
            ctx.config.poll_interval(),
        );

        let handle = scheduler.start();
        self.ui.info(&format!(
            "Watching reminders every {}s, press Ctrl+C to stop",
            ctx.config.poll_interval_secs
        ));

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| RoombookError::io_from_error("Failed to listen for Ctrl+C", e))?;
        handle.stop().await;
        info!("reminder watch stopped");
        self.ui.blank_line();
        Ok(())
    }

    async fn handle_config(&mut self, command: crate::ConfigCommand) -> Result<()> {
        let config_path = self.config_path.clone().unwrap_or_else(default_config_path);
        let config = ConsoleConfig::load(&config_path).await?;
        let mut service = ConfigService::new(config, config_path);
        service.handle_config(command).await
    }
}

/// Use the password given on the command line or ask for it.
fn read_password(given: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if !console::Term::stderr().is_term() {
        return Err(RoombookError::invalid_input(
            "no password given and no terminal to ask for one; use --password",
        ));
    }

    let mut prompt = dialoguer::Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}
