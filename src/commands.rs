//! Command-line parsing
//!
//! Parses `usersearch search <query>`, `usersearch avatars <query>` and friends.

/// Parsed command from the argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one search and list the hits: search <query>
    Search { query: String },
    /// Search, then download every hit's avatar: avatars <query>
    Avatars { query: String },
    /// Show help: help
    Help,
    /// Anything else
    Unknown { name: String },
}

impl Command {
    /// Parse arguments (without the program name) into a command
    pub fn parse(args: &[String]) -> Self {
        let Some((cmd, rest)) = args.split_first() else {
            return Command::Help;
        };
        let query = rest.join(" ").trim().to_string();

        match cmd.to_lowercase().as_str() {
            "search" | "s" => Command::Search { query },
            "avatars" | "avatar" | "a" => Command::Avatars { query },
            "help" | "--help" | "-h" => Command::Help,
            _ => Command::Unknown { name: cmd.clone() },
        }
    }

    /// Get help text for all commands
    pub fn help_text() -> &'static str {
        r#"usersearch - search users and fetch their avatars

Usage: usersearch <command> [query]

Commands:
  search <query>   List users matching the query
  avatars <query>  List users and download their avatars
  help             Show this help message

Environment:
  USERSEARCH_CONFIG       Path to a TOML config file
  USERSEARCH_API_BASE     Search API base URL
  USERSEARCH_TIMEOUT_MS   Request timeout in milliseconds
  USERSEARCH_MAX_FETCHES  Maximum concurrent avatar downloads
  RUST_LOG                Log filter, e.g. usersearch=debug"#
    }
}
