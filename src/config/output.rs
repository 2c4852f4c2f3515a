use serde::{Deserialize, Serialize};

/// `Output` top-level deck key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputDeck {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_interval")]
    pub output_interval: u64,
    #[serde(default)]
    pub debug: bool,
}

fn default_path() -> String {
    "./out".to_string()
}

fn default_tag() -> String {
    "peridem".to_string()
}

fn default_interval() -> u64 {
    100
}

impl Default for OutputDeck {
    fn default() -> Self {
        Self {
            path: default_path(),
            tag: default_tag(),
            output_interval: default_interval(),
            debug: false,
        }
    }
}

/// `Restart` top-level deck key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RestartDeck {
    #[serde(default)]
    pub restart_file: Option<String>,
    #[serde(default = "default_restart_interval")]
    pub restart_interval: u64,
}

fn default_restart_interval() -> u64 {
    1000
}
