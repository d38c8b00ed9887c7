use crate::output;
use colored::Colorize;

/// Project home page.
pub const REPOSITORY: &str = "https://github.com/cenodude/DriverSync";

/// Text printed by the about command
#[must_use]
pub fn about_text() -> String {
    format!(
        "DriverSync\n\
         Version: {}\n\
         Keeps iOverlay driver tags and CrewChief driver reputations consistent.\n\
         Drivers are only ever added, never removed.\n\
         Repository: {REPOSITORY}",
        crate::VERSION
    )
}

/// Print version and project information
pub fn execute() {
    let text = about_text();
    let mut lines = text.lines();
    if let Some(title) = lines.next() {
        output::print(&format!("{}", title.bold()));
    }
    for line in lines {
        output::print(line);
    }
}
