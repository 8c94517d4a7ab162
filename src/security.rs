use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::BackendError;

const ACCESS_TOKEN_SECRET: &str = "access_token.secret";
const MIN_SECRET_LEN: usize = 32;

/// Key material used to sign and verify access tokens (HS256).
#[derive(Clone)]
pub struct Security {
    pub token_secret: Vec<u8>,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Security")
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Security {
        Security {
            token_secret: secret.as_ref().to_vec(),
        }
    }

    pub fn load() -> Result<Security, BackendError> {
        if let Ok(secret) = env::var("ACCESS_TOKEN_SECRET") {
            if !secret.is_empty() {
                tracing::info!("Using access token secret from environment.");
                return Ok(Security::from_secret(secret));
            }
        }

        Security::load_from(security_dir())
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Security, BackendError> {
        let path = dir.as_ref().join(ACCESS_TOKEN_SECRET);

        tracing::info!("Loading access token secret...");
        match fs::read(&path) {
            Ok(secret) if secret.len() >= MIN_SECRET_LEN => {
                tracing::info!("Access token secret found and loaded.");
                return Ok(Security::from_secret(secret));
            }
            Ok(_) => tracing::warn!(
                "Access token secret in '{}' is too short.",
                path.display()
            ),
            Err(_) => tracing::info!("Access token secret not found in '{}'.", path.display()),
        }

        Security::generate(dir.as_ref(), &path)
    }

    #[cfg(feature = "generate-security")]
    fn generate(dir: &Path, path: &Path) -> Result<Security, BackendError> {
        use rand::RngCore;

        tracing::info!("Generating a new access token secret.");
        let mut secret = vec![0u8; 64];
        rand::thread_rng().fill_bytes(&mut secret);

        fs::create_dir_all(dir).map_err(|e| {
            BackendError::Security(format!("unable to create '{}': {}", dir.display(), e))
        })?;
        fs::write(path, &secret).map_err(|e| {
            BackendError::Security(format!("unable to write '{}': {}", path.display(), e))
        })?;

        Ok(Security::from_secret(secret))
    }

    #[cfg(not(feature = "generate-security"))]
    fn generate(_dir: &Path, path: &Path) -> Result<Security, BackendError> {
        Err(BackendError::Security(format!(
            "no usable access token secret in '{}' and ACCESS_TOKEN_SECRET isn't set",
            path.display()
        )))
    }
}
