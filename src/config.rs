use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("sportyDB".to_string())
}

fn default_admin_emails() -> Vec<String> {
    vec![]
}

fn default_token_lifetime_minutes() -> i64 {
    60
}

fn default_payment_api_base() -> String {
    env::var("PAYMENT_API_BASE").unwrap_or("https://api.stripe.com".to_string())
}

fn default_payment_currency() -> String {
    "usd".to_string()
}

fn default_payment_secret_key() -> Option<String> {
    env::var("PAYMENT_SECRET_KEY").ok().filter(|it| !it.is_empty())
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    /// Users signing up with one of these emails start out as admins.
    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_token_lifetime_minutes")]
    pub token_lifetime_minutes: i64,

    #[serde(default = "default_payment_api_base")]
    pub payment_api_base: String,
    #[serde(default = "default_payment_currency")]
    pub payment_currency: String,
    // Only ever read from the environment or a hand written file.
    #[serde(default = "default_payment_secret_key", skip_serializing)]
    pub payment_secret_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            admin_emails: default_admin_emails(),
            token_lifetime_minutes: default_token_lifetime_minutes(),
            payment_api_base: default_payment_api_base(),
            payment_currency: default_payment_currency(),
            payment_secret_key: default_payment_secret_key(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("file_path", &self.file_path)
            .field("mongodb_db", &self.mongodb_db)
            .field("admin_emails", &self.admin_emails)
            .field("token_lifetime_minutes", &self.token_lifetime_minutes)
            .field("payment_api_base", &self.payment_api_base)
            .field("payment_currency", &self.payment_currency)
            .field(
                "payment_secret_key",
                &self.payment_secret_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    pub fn is_bootstrap_admin(&self, email: impl AsRef<str>) -> bool {
        self.admin_emails
            .iter()
            .any(|it| it == email.as_ref())
    }
}
