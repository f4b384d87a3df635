use std::str::FromStr;

use sqlx::postgres::PgConnectOptions;
use url::Url;

/// Parsed server URL from which per-database connect options are derived
#[derive(Debug, Clone)]
pub struct ServerAddress {
    url: Url,
}

impl ServerAddress {
    pub fn parse(database_url: &str) -> Result<Self, sqlx::Error> {
        let url = Url::parse(database_url).map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(sqlx::Error::Configuration(
                format!("unsupported database URL scheme '{}'", url.scheme()).into(),
            ));
        }
        Ok(Self { url })
    }

    /// Connection string targeting `database_name` on the same server.
    /// Credentials and query parameters (sslmode etc.) are preserved.
    pub fn connection_string(&self, database_name: &str) -> String {
        let mut url = self.url.clone();
        url.set_path(&format!("/{}", database_name));
        url.into()
    }

    pub fn options_for(&self, database_name: &str) -> Result<PgConnectOptions, sqlx::Error> {
        PgConnectOptions::from_str(&self.connection_string(database_name))
    }

    /// URL with the password removed, for logs
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.into()
    }
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
