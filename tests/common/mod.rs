//! Common test utilities and fixtures

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// A port nothing is listening on at the moment of the call
pub fn free_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

/// Temporary directory holding a single config file
pub struct ConfigFixture {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl ConfigFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("tempsync.toml");
        Self { temp_dir, config_path }
    }

    pub fn with_content(content: &str) -> Self {
        let fixture = Self::new();
        fixture.write(content);
        fixture
    }

    pub fn write(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    pub fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

/// Config pointing at a loopback central on `port` with a short connect timeout
pub fn loopback_config(port: u16, connect_timeout_ms: u64) -> String {
    format!(
        r#"
[network]
host = "127.0.0.1"
port = {port}
connect_timeout_ms = {connect_timeout_ms}
initial_retry_delay_ms = 20
max_retry_delay_ms = 200

[logging]
level = "warn"
"#
    )
}
