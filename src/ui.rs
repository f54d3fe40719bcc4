use console::{strip_ansi_codes, Term};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use roombook_protocol::{Reservation, Room, UserRole};

use crate::session::IdentitySource;
use crate::utils::format_hour;

/// Terminal output helpers
pub struct UI {
    term: Term,
}

impl UI {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Helper method to conditionally apply color based on terminal support
    fn colorize<F>(&self, text: &str, color_fn: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.supports_color() {
            color_fn(text)
        } else {
            text.to_string()
        }
    }

    /// Print a success message (color only if supported)
    pub fn success(&self, message: &str) {
        let output = self.colorize(message, |m| m.green().bold().to_string());
        println!("{}", output);
    }

    /// Print an error message to stderr (color only if supported)
    pub fn error(&self, message: &str) {
        let output = self.colorize(message, |m| m.red().bold().to_string());
        eprintln!("{}", output);
    }

    /// Print a warning message (color only if supported)
    pub fn warning(&self, message: &str) {
        let output = self.colorize(message, |m| m.yellow().bold().to_string());
        println!("{}", output);
    }

    /// Print an info message (color only if supported)
    pub fn info(&self, message: &str) {
        let output = self.colorize(message, |m| m.blue().bold().to_string());
        println!("{}", output);
    }

    pub fn format_role(&self, role: UserRole) -> String {
        match role {
            UserRole::Admin => self.colorize(role.as_str(), |r| r.magenta().bold().to_string()),
            UserRole::User => role.as_str().to_string(),
        }
    }

    /// Claimed identities come from unverified token data and are flagged.
    pub fn format_identity_source(&self, source: IdentitySource) -> String {
        match source {
            IdentitySource::Server => self.colorize("confirmed by server", |s| s.green().to_string()),
            IdentitySource::Claimed => {
                self.colorize("from token (unverified)", |s| s.yellow().to_string())
            }
        }
    }

    /// Format user field with fallback for missing data
    pub fn format_user_field(&self, value: Option<String>) -> String {
        value.unwrap_or_else(|| "-".to_string())
    }

    /// `2026-03-02 10:00-11:30  Laboratorio  #42`
    pub fn format_reservation(&self, reservation: &Reservation) -> String {
        let when = format!(
            "{} {}-{}",
            reservation.date,
            format_hour(reservation.start_time.as_deref()),
            format_hour(reservation.end_time.as_deref())
        );
        let mut line = format!(
            "{}  {}  {}",
            self.colorize(&when, |w| w.cyan().to_string()),
            reservation.room.name,
            self.colorize(&format!("#{}", reservation.id), |i| i.dimmed().to_string())
        );
        if let Some(owner) = &reservation.owner {
            line.push_str(&format!("  ({})", owner.username));
        }
        if let Some(status) = reservation.status.as_deref().filter(|s| !s.is_empty()) {
            line.push_str(&format!("  [{}]", status));
        }
        line
    }

    pub fn format_room(&self, room: &Room) -> String {
        let id = self.colorize(&format!("{:>4}", room.id), |i| i.dimmed().to_string());
        match room.capacity {
            Some(capacity) => format!("{}  {} ({} seats)", id, room.name, capacity),
            None => format!("{}  {}", id, room.name),
        }
    }

    /// Print a blank line for spacing
    pub fn blank_line(&self) {
        println!();
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        let term_width = self.width();
        let title_len = title.width() + 4; // 2 spaces on each side
        let line_len = if term_width > title_len {
            (term_width - title_len) / 2
        } else {
            0
        };

        let line = "═".repeat(line_len.min(30));

        println!();
        if self.supports_color() {
            println!("{} {} {}", line.cyan(), title.cyan().bold(), line.cyan());
        } else {
            println!("{} {} {}", line, title, line);
        }
        println!();
    }

    /// Create a card-style display for information
    pub fn card(&self, title: &str, content: Vec<(&str, String)>) {
        let term_width = self.width();
        let card_width = term_width
            .saturating_sub(4) // Leave more space for terminal margins
            .clamp(50, 80); // Minimum and maximum width

        let supports_color = self.supports_color();

        println!("╭{}╮", "─".repeat(card_width - 2));
        let title_spaces = card_width.saturating_sub(title.width() + 4);
        if supports_color {
            println!("│ {} {}│", title.cyan().bold(), " ".repeat(title_spaces));
        } else {
            println!("│ {} {}│", title, " ".repeat(title_spaces));
        }
        println!("├{}┤", "─".repeat(card_width - 2));

        for (label, value) in content {
            // widths ignore ANSI codes
            let label_width = strip_ansi_codes(label).width();
            let value_width = strip_ansi_codes(&value).width();
            let content_width = label_width + value_width + 4; // ": " + 2 spaces padding

            let spaces = if content_width < card_width - 1 {
                card_width - content_width - 1
            } else {
                1
            };

            if supports_color {
                println!("│ {}: {}{}│", label.dimmed(), value, " ".repeat(spaces));
            } else {
                println!("│ {}: {}{}│", label, value, " ".repeat(spaces));
            }
        }

        println!("╰{}╯", "─".repeat(card_width - 2));
        println!();
    }

    /// Spinner shown while waiting on the server
    pub fn spinner(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Get terminal width for responsive layout
    pub fn width(&self) -> usize {
        self.term.size().1 as usize
    }

    /// Check if terminal supports color
    pub fn supports_color(&self) -> bool {
        self.term.features().colors_supported()
    }
}

impl Default for UI {
    fn default() -> Self {
        Self::new()
    }
}

/// Show a transient banner that clears itself after `dismiss_after`.
///
/// Returns immediately. Without a terminal the banner is a plain line.
pub fn show_banner(title: &str, message: &str, dismiss_after: Duration) {
    let term = Term::stderr();
    if !term.is_term() {
        eprintln!("{}: {}", title, message);
        return;
    }

    let text = if term.features().colors_supported() {
        format!("{} {}", title.black().on_yellow().bold(), message.bold())
    } else {
        format!("{}: {}", title, message)
    };

    let banner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.yellow} {msg}") {
        banner.set_style(style);
    }
    banner.set_message(text);
    banner.enable_steady_tick(Duration::from_millis(200));

    std::thread::spawn(move || {
        std::thread::sleep(dismiss_after);
        banner.finish_and_clear();
    });
}
