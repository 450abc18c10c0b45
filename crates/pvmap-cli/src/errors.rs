use console::style;
use pvmap_core::PvMapError;
use std::fmt;
use std::path::Path;

/// Error with context and suggestions for the terminal
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Remote credentials are not configured
pub fn remote_not_configured(key: &str) -> CliError {
    CliError::new("Remote project API is not configured")
        .with_context(format!("{} is not set.", key))
        .with_suggestion("Export SUPABASE_URL and SUPABASE_ANON_KEY (VITE_ prefixed names work too)")
        .with_suggestion("Or add endpoint_url and anon_key to pvmap.toml")
        .with_suggestion("Or search a local file: pvmap --data projects.json search")
        .with_help("Run: pvmap config")
}

/// The remote rejected the anonymous key
pub fn remote_rejected(reason: &str) -> CliError {
    CliError::new("Remote project API rejected the request")
        .with_context(format!("The server refused the configured key.\n\nError: {}", reason))
        .with_suggestion("Check SUPABASE_ANON_KEY belongs to the project at SUPABASE_URL")
        .with_help("Run: pvmap config")
}

/// Local data file is missing
pub fn data_file_not_found(path: &Path) -> CliError {
    CliError::new("Project data file not found")
        .with_context(format!("The file passed to --data does not exist.\n\nPath: {}", path.display()))
        .with_suggestion("Check the file path and try again")
        .with_help("Run: pvmap --help")
}

/// Cluster id does not exist in the rebuilt index
pub fn cluster_not_found(id: &str) -> CliError {
    CliError::new(format!("Cluster {} not found", id))
        .with_context(
            "Cluster ids are only valid for the exact search that produced them.\n\
             The region, zoom or filters differ, or the data changed since.",
        )
        .with_suggestion("Run `pvmap search` again with the same --bbox, --zoom and filter flags")
        .with_suggestion("Pass those same flags to `pvmap expand`")
        .with_help("Run: pvmap expand --help")
}

/// Project id unknown to the source
pub fn project_not_found(id: &str) -> CliError {
    CliError::new(format!("Project {} not found", id))
        .with_suggestion("Use a project id from `pvmap search` or `pvmap expand` output")
        .with_help("Run: pvmap project --help")
}

/// Translate source errors into terminal guidance where one exists
pub fn from_source_error(error: PvMapError) -> anyhow::Error {
    match error {
        PvMapError::ConfigMissing { key } => remote_not_configured(&key).into(),
        PvMapError::Unauthorized { reason } => remote_rejected(&reason).into(),
        other => anyhow::Error::new(other),
    }
}
