use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::env;

use crate::error::ConfigurationError;
use crate::util::find_first_subpath;

static CONFIG_FILE_NAMES: &[&str] = &["settings.yml", "settings.yaml"];

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn default_mongodb_uri() -> String {
    env_or("MONGODB_URI", "mongodb://localhost:27017")
}

fn default_mongodb_db() -> String {
    env_or("MONGODB_DB_NAME", "tutorhub")
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env_or("PUBLIC_CONTENT_PATH", "./public"))
}

/// Shared secret the auth service signs session tokens with. The fallback
/// only exists so local development works out of the box.
fn default_session_jwt_secret() -> String {
    match env::var("SESSION_JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            tracing::warn!("SESSION_JWT_SECRET not set, using an insecure development secret");
            "insecure-dev-secret".to_string()
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env_or("CONFIG_DIR", "./config"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Directory the web console bundle is served from.
    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,

    #[serde(default = "default_session_jwt_secret")]
    pub session_jwt_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join(CONFIG_FILE_NAMES[0]),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            public_content: default_public_content(),
            session_jwt_secret: default_session_jwt_secret(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = find_first_subpath(config_dir(), CONFIG_FILE_NAMES, Path::exists)
            .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let reader = BufReader::new(File::open(config_file)?);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        let mut writer = BufWriter::new(File::create(&self.file_path)?);
        serde_yaml::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
