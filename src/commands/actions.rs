//! Command: list available actions.

use crate::actions::ActionRegistry;
use crate::logging::Logger;

/// Render the registered actions in execution order, with their aliases.
#[must_use]
pub fn listing(registry: &ActionRegistry) -> String {
    let mut out = String::from("Actions (in execution order):\n");
    for action in registry.iter() {
        let id = action.id();
        let aliases = id.aliases();
        let line = if aliases.is_empty() {
            format!("  {:<10}{}\n", id.as_str(), action.description())
        } else {
            format!(
                "  {:<10}{} (alias: {})\n",
                id.as_str(),
                action.description(),
                aliases.join(", ")
            )
        };
        out.push_str(&line);
    }
    out.trim_end().to_string()
}

/// Print the action listing to stdout.
pub fn run(log: &Logger) {
    log.print(&listing(&ActionRegistry::new()));
}
