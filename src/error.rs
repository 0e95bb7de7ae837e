/// Broad failure category, used by callers (and tests) that need to tell
/// "nothing to read" apart from genuine processing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input file is missing or unreadable.
    InputMissing,
    /// Input file opened, but the expected table is not in it.
    TableMissing,
    /// Bad configuration, model definition, or input values.
    Invalid,
    /// Objective could not be evaluated during minimization.
    Fit,
    /// Plot drawing or image encoding failed.
    Render,
    /// Writing an output file failed.
    Io,
}

impl ErrorKind {
    fn default_exit_code(self) -> u8 {
        match self {
            ErrorKind::InputMissing | ErrorKind::TableMissing => 2,
            ErrorKind::Invalid => 3,
            ErrorKind::Fit => 4,
            ErrorKind::Render | ErrorKind::Io => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code: kind.default_exit_code(),
            message: message.into(),
        }
    }

    /// `Error: Cannot open <path>`
    pub fn input_missing(path: &std::path::Path) -> Self {
        Self::new(
            ErrorKind::InputMissing,
            format!("Error: Cannot open {}", path.display()),
        )
    }

    /// `Error: Cannot find table '<name>'`
    pub fn table_missing(table: &str) -> Self {
        Self::new(
            ErrorKind::TableMissing,
            format!("Error: Cannot find table '{table}'"),
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fit, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn missing_input_and_table_share_exit_code() {
        let a = AppError::input_missing(Path::new("temp_data_for_fit.parquet"));
        let b = AppError::table_missing("small_tree");
        assert_eq!(a.exit_code(), b.exit_code());
        assert_eq!(a.kind(), ErrorKind::InputMissing);
        assert_eq!(b.kind(), ErrorKind::TableMissing);
        assert_eq!(a.to_string(), "Error: Cannot open temp_data_for_fit.parquet");
        assert_eq!(b.to_string(), "Error: Cannot find table 'small_tree'");
    }
}
