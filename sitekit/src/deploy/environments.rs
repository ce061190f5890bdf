//! Deploy environment descriptors

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single deploy environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Display name
    pub name: String,

    /// Target host
    pub host: String,

    /// Target port
    pub port: u16,

    /// Build output directory (deploy source)
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Live deploy directory
    pub deploy_dir: PathBuf,

    /// Take a backup of the live directory before deploying
    #[serde(default)]
    pub backup: bool,

    /// Probe the environment URL after deploying
    #[serde(default = "default_true")]
    pub health_check: bool,

    /// Environment is served over TLS
    #[serde(default)]
    pub tls: bool,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_true() -> bool {
    true
}

impl Environment {
    /// The environment's base URL. The port is omitted when it is the
    /// scheme's default.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        let default_port = if self.tls { 443 } else { 80 };

        if self.port == default_port {
            format!("{}://{}", scheme, self.host)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// The statically configured environment set
pub fn default_environments() -> BTreeMap<String, Environment> {
    let mut environments = BTreeMap::new();

    environments.insert(
        "development".to_string(),
        Environment {
            name: "Development".to_string(),
            host: "localhost".to_string(),
            port: 3000,
            build_dir: default_build_dir(),
            deploy_dir: PathBuf::from("deploy/dev"),
            backup: false,
            health_check: true,
            tls: false,
        },
    );

    environments.insert(
        "staging".to_string(),
        Environment {
            name: "Staging".to_string(),
            host: "staging.learn.example.org".to_string(),
            port: 443,
            build_dir: default_build_dir(),
            deploy_dir: PathBuf::from("/var/www/learn-staging"),
            backup: true,
            health_check: true,
            tls: true,
        },
    );

    environments.insert(
        "production".to_string(),
        Environment {
            name: "Production".to_string(),
            host: "learn.example.org".to_string(),
            port: 443,
            build_dir: default_build_dir(),
            deploy_dir: PathBuf::from("/var/www/learn"),
            backup: true,
            health_check: true,
            tls: true,
        },
    );

    environments
}
