use thiserror::Error;

/// Raised before any client is built when required credentials are absent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API keys are not configured. Please set {} in your `.env` file.", format_missing(.0))]
    MissingCredentials(Vec<&'static str>),
}

fn format_missing(keys: &[&'static str]) -> String {
    let quoted: Vec<String> = keys.iter().map(|key| format!("`{key}`")).collect();
    quoted.join(" and ")
}

/// Failure to populate a workspace. Terminal for the attempted repository.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to clone repository. Error: could not run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Failed to clone repository. Error: {diagnostic}")]
    Failed { diagnostic: String },
}
