use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use oauth_callback::config::{ClientSecret, ProviderConfig};

/// Host application base URL used by every test.
#[allow(dead_code)]
pub const HOST_URL: &str = "https://practice.example.com/";

/// Provider configuration pointing both endpoints at `base_url`
/// (`/token` and `/userinfo`).
#[allow(dead_code)]
pub fn provider_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        client_id: "test-client".to_string(),
        client_secret: ClientSecret::new("test-secret"),
        client_secret_file: None,
        redirect_uri: "http://localhost:3001/oauth-callback".to_string(),
        token_endpoint: format!("{}/token", base_url),
        userinfo_endpoint: format!("{}/userinfo", base_url),
        timeout_seconds: 5,
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// In-memory sink for formatted `tracing` output.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
impl LogBuffer {
    /// Subscriber writing plain-text logs at `debug` and above into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}
