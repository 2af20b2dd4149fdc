use crate::server::response::ApiError;

const MAX_ASSET_NAME_LEN: usize = 255;
const MAX_LOGIN_LEN: usize = 64;

fn validate_asset_name_inner(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Asset name cannot be empty".to_string());
    }
    if name.len() > MAX_ASSET_NAME_LEN {
        return Err(format!("Asset name cannot exceed {MAX_ASSET_NAME_LEN} bytes"));
    }
    if name.chars().any(|c| matches!(c, '/' | '\0' | '\r' | '\n')) {
        return Err("Asset name cannot contain '/', NUL or line breaks".to_string());
    }
    Ok(())
}

pub fn validate_asset_name(name: &str) -> Result<(), ApiError> {
    validate_asset_name_inner(name).map_err(ApiError::bad_request)
}

pub fn validate_credentials(login: &str, password: &str) -> Result<(), ApiError> {
    if login.trim().is_empty() {
        return Err(ApiError::bad_request("Login cannot be empty"));
    }
    if login.len() > MAX_LOGIN_LEN {
        return Err(ApiError::bad_request(format!(
            "Login cannot exceed {MAX_LOGIN_LEN} bytes"
        )));
    }
    if password.is_empty() {
        return Err(ApiError::bad_request("Password cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_names() {
        assert!(validate_asset_name_inner("report.pdf").is_ok());
        assert!(validate_asset_name_inner("with spaces & ünïcode").is_ok());
        assert!(validate_asset_name_inner(&"a".repeat(255)).is_ok());

        assert!(validate_asset_name_inner("").is_err());
        assert!(validate_asset_name_inner(&"a".repeat(256)).is_err());
        assert!(validate_asset_name_inner("dir/file").is_err());
        assert!(validate_asset_name_inner("nul\0").is_err());
        assert!(validate_asset_name_inner("line\nbreak").is_err());
    }

    #[test]
    fn test_credentials() {
        assert!(validate_credentials("alice", "pw").is_ok());
        assert!(validate_credentials("  ", "pw").is_err());
        assert!(validate_credentials("alice", "").is_err());
    }
}
