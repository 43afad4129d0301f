use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("directive '{directive}' on line {line} is unknown")]
    UnknownDirective { directive: String, line: usize },

    #[error("directive '{directive}' on line {line} is not unique")]
    AmbiguousDirective { directive: String, line: usize },

    #[error("missing argument to directive '{0}'")]
    MissingArgument(String),

    #[error("extra arguments to directive '{0}'")]
    ExtraArguments(String),

    #[error("illegal argument '{arg}' to directive '{directive}'")]
    IllegalArgument { directive: String, arg: String },

    #[error("{} configuration error(s) detected", faults.len())]
    Faults { faults: Vec<String> },
}

impl ConfigError {
    /// The accumulated validation faults, if this error came out of the
    /// validation phase.
    pub fn faults(&self) -> &[String] {
        match self {
            ConfigError::Faults { faults } => faults,
            _ => &[],
        }
    }
}
