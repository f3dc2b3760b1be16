//! Command parser for the REPL
//!
//! One command per line. The first word picks the command (case-insensitive),
//! remaining words are its arguments.

/// REPL command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Update,
    Install { names: Vec<String> },
    List,
    Launch { name: Option<String> },
    Stop { name: Option<String> },
    Remove { name: Option<String> },
    Read { log: Option<String> },
    Connect { target: Option<String> },
    Disconnect,
    Pull { remote: Option<String>, local: Option<String> },
    Status,
    Clear,
    Exit,
    Empty,
    Unknown { input: String },
}

/// Command words offered by tab completion
pub const COMMAND_WORDS: &[&str] = &[
    "update", "install", "connect", "list", "launch", "read", "disconnect", "help", "remove",
    "stop", "status", "pull", "clear", "exit",
];

/// Help lines: (usage, description)
pub const HELP_ENTRIES: &[(&str, &str)] = &[
    ("connect <username@hostname>", "Connect to a remote machine via SSH."),
    ("disconnect", "Disconnect the current SSH session."),
    ("update", "Fetch the list of available modules."),
    ("install [module...]", "Install selected modules."),
    ("list", "List installed modules."),
    ("launch [module]", "Launch a specific module."),
    ("remove [module]", "Remove a specific module."),
    ("stop [module]", "Stop a running module."),
    ("status", "Show running modules and the SSH connection."),
    ("read <log_file>", "Reads a specified log file."),
    ("pull <remote_path> [local]", "Copy a file from the connected host into the logs directory."),
    ("clear", "Clear the screen."),
    ("exit", "Exit the application."),
];

impl Command {
    /// Parse one input line
    pub fn parse(input: &str) -> Command {
        let mut words = input.split_whitespace();
        let Some(first) = words.next() else {
            return Command::Empty;
        };
        let rest: Vec<String> = words.map(str::to_string).collect();
        let arg = |i: usize| rest.get(i).cloned();

        match first.to_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "update" | "fetch" => Command::Update,
            "install" => Command::Install { names: rest.clone() },
            "list" | "ls" => Command::List,
            "launch" | "run" => Command::Launch { name: arg(0) },
            "stop" => Command::Stop { name: arg(0) },
            "remove" | "rm" => Command::Remove { name: arg(0) },
            "read" => Command::Read { log: arg(0) },
            "connect" => Command::Connect { target: arg(0) },
            "disconnect" => Command::Disconnect,
            "pull" => Command::Pull { remote: arg(0), local: arg(1) },
            "status" => Command::Status,
            "clear" | "cls" => Command::Clear,
            "exit" | "quit" => Command::Exit,
            _ => Command::Unknown { input: input.trim().to_string() },
        }
    }
}
