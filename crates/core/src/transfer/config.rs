//! Configuration for the transfer module.

use serde::{Deserialize, Serialize};

/// External program invoked once per staged package.
///
/// The command line is `<program> <args...> <package> [destination]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Trailing argument, typically a remote path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

fn default_program() -> String {
    "rsync".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-rav".to_string()]
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            destination: None,
        }
    }
}
