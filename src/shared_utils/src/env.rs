use thiserror::Error;

/// A required environment variable is unset or blank.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Read a required variable. Blank values count as missing, so an empty
/// `APCA_API_KEY_ID=` line in `.env` fails early instead of at the first request.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    get_env_var_opt(name).ok_or_else(|| MissingEnvVarError(name.to_string()))
}

/// Read an optional variable, trimmed; unset and blank are both `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load `.env` from the working directory (or a parent) if there is one.
///
/// Variables already in the process environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_is_reported_by_name() {
        let err = get_env_var("PRICE_ETL_SURELY_UNSET_VARIABLE").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: PRICE_ETL_SURELY_UNSET_VARIABLE"
        );
        assert!(get_env_var_opt("PRICE_ETL_SURELY_UNSET_VARIABLE").is_none());
    }
}
