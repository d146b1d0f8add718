use std::{env, path::PathBuf};

/// AWS configuration directory name
pub const AWS_CONFIG_DIR_NAME: &str = ".aws";

/// AWS configuration file name
pub const AWS_CONFIG_FILE_NAME: &str = "config";

/// AWS shared credentials file name
pub const AWS_CREDENTIALS_FILE_NAME: &str = "credentials";

/// Default export descriptor file name, placed next to the credentials file
pub const DEFAULT_EXPORT_FILE_NAME: &str = "rolechain.env";

/// Default AWS region when neither the command line nor the config file names one
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Suffix appended to the base profile to name the MFA session profile
pub const INTERMEDIATE_PROFILE_SUFFIX: &str = "-session";

/// Default role reference template; `{account_id}` and `{role_name}` are substituted
pub const DEFAULT_ROLE_ARN_TEMPLATE: &str = "arn:aws:iam::{account_id}:role/{role_name}";

/// GetSessionToken duration limits (seconds)
pub const MIN_SESSION_TOKEN_DURATION: i32 = 900;
pub const MAX_SESSION_TOKEN_DURATION: i32 = 129_600;
pub const DEFAULT_SESSION_TOKEN_DURATION: i32 = 43_200;

/// AssumeRole duration limits (seconds)
pub const MIN_ASSUME_ROLE_DURATION: i32 = 900;
pub const MAX_ASSUME_ROLE_DURATION: i32 = 43_200;
pub const DEFAULT_ASSUME_ROLE_DURATION: i32 = 3_600;

/// Maximum length of an AssumeRole session name
pub const MAX_ROLE_SESSION_NAME_LEN: usize = 64;

/// Static-key variables that shadow profile-based credential resolution
pub const STATIC_KEY_ENV_VARS: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];

fn aws_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(AWS_CONFIG_DIR_NAME))
}

/// Get the AWS config file path
/// Respects AWS_CONFIG_FILE environment variable if set
pub fn get_aws_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Some(PathBuf::from(path));
    }

    aws_dir().map(|dir| dir.join(AWS_CONFIG_FILE_NAME))
}

/// Get the AWS credentials file path
/// Respects AWS_SHARED_CREDENTIALS_FILE environment variable if set
pub fn get_aws_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }

    aws_dir().map(|dir| dir.join(AWS_CREDENTIALS_FILE_NAME))
}

/// Default location of the shell export descriptor
pub fn default_export_path() -> PathBuf {
    aws_dir()
        .map(|dir| dir.join(DEFAULT_EXPORT_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE_NAME))
}
