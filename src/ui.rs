use colored::Colorize;
use declarative::{Action, ActionList, Reporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Size Formatting
// ============================================================================

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Truncate a string for display, keeping the end
pub fn truncate_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        path.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = path.chars().skip(len - max_len + 3).collect();
        format!("...{tail}")
    }
}

// ============================================================================
// Planning and Execution Display
// ============================================================================

/// Reporter printing planning events as an indented tree
///
/// During execution, progress is shown on a bar instead.
#[derive(Default)]
pub struct TerminalReporter {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl TerminalReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }

    /// Show a progress bar over the next `total` actions
    pub fn start_execution(&mut self, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    pub fn finish_execution(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Reporter for TerminalReporter {
    fn check(&mut self, indent: usize, message: &str) {
        if !self.quiet {
            println!("{}{} {}", "  ".repeat(indent), "•".blue(), format!("checking {message}").dimmed());
        }
    }

    fn add(&mut self, indent: usize, what: &str, name: &str) {
        if !self.quiet {
            println!("{}  {} {what} {}", "  ".repeat(indent), "+".green(), name.bold());
        }
    }

    fn remove(&mut self, indent: usize, what: &str, name: &str) {
        if !self.quiet {
            println!("{}  {} {what} {}", "  ".repeat(indent), "-".red(), name.bold());
        }
    }

    fn error(&mut self, message: &str) {
        warn(message);
    }

    fn on_action_start(&mut self, action: &Action) {
        if let Some(bar) = &self.bar {
            bar.set_message(truncate_path(&action.message().replace('\t', " "), 50));
        }
    }

    fn on_action_complete(&mut self, action: &Action, success: bool) {
        let Some(bar) = &self.bar else {
            return;
        };
        if !success {
            bar.suspend(|| println!("  {} {}", "✗".red(), action.message()));
        }
        bar.inc(1);
    }
}

/// Print the actions waiting in a list
pub fn print_plan(actions: &ActionList) {
    section("Plan");
    let mut count = 0;
    for action in actions.todo() {
        count += 1;
        let size = match action {
            Action::InsertDocument { body, .. } => format!(" ({})", format_size(body.len() as u64)),
            _ => String::new(),
        };
        println!("  {} {}{}", "→".cyan(), action.message(), size.dimmed());
    }
    if count == 0 {
        dim("Nothing to do.");
    }
}

/// Print the done/error/not done report of an executed list
pub fn print_summary(actions: &ActionList) {
    section("Summary");
    for action in actions.done() {
        println!("  {} {}", "✓".green(), action.message());
    }
    if let Some(failure) = actions.error() {
        println!("  {} {}", "✗".red(), failure.message);
        println!("    {}", failure.error.red());
    }
    for action in actions.todo() {
        println!("  {} {}", "-".dimmed(), action.message().dimmed());
    }

    let counts = actions.counts();
    println!();
    if counts.is_success() {
        success(&format!("{} actions applied", counts.done));
    } else {
        warn(&format!(
            "{} done, {} failed, {} not attempted",
            counts.done, counts.failed, counts.not_attempted
        ));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024 * 100), "100.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 2 + 1024 * 1024 * 512), "2.5 GB");
    }

    #[test]
    fn test_truncate_path_long() {
        assert_eq!(truncate_path("short.txt", 20), "short.txt");
        assert_eq!(
            truncate_path("/very/long/path/to/file.txt", 15),
            ".../to/file.txt"
        );
        assert_eq!(truncate_path("test", 3), "...");
    }

    #[test]
    fn test_quiet_reporter_without_bar() {
        let mut reporter = TerminalReporter::new(true);
        reporter.start_execution(3);
        assert!(reporter.bar.is_none());
        let action = Action::ListForests;
        reporter.on_action_start(&action);
        reporter.on_action_complete(&action, true);
        reporter.finish_execution();
    }
}
