// Run configuration: where the source tables come from and where results go.
use std::env;
use std::path::PathBuf;

pub const AG_COST_TABLE_URL: &str =
    "https://storage.googleapis.com/nci-ecoshards/ag_cost_md5_872f0d09f6d7add60c733cccc3b26987.csv";

pub const CROP_GLOBAL_COST_TABLE_URL: &str = "https://storage.googleapis.com/nci-ecoshards/crop_global_cost_md5_35b4f1a26c9829b785a18af330d68b58.csv";

const WORKSPACE_DIR: &str = "fert_cost_workspace";
const ADJUSTED_PRICE_TABLE_FILE_NAME: &str = "adjusted_global_price_map.csv";
const ADJUSTMENT_SUMMARY_FILE_NAME: &str = "adjustment_summary.json";

/// Environment variable that relocates the workspace directory.
pub const WORKSPACE_ENV_VAR: &str = "FERT_COST_WORKSPACE";

/// The two downloads have no ordering between them.
pub const DOWNLOAD_WORKERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ag_cost_url: String,
    pub crop_global_cost_url: String,
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ag_cost_url: AG_COST_TABLE_URL.to_string(),
            crop_global_cost_url: CROP_GLOBAL_COST_TABLE_URL.to_string(),
            workspace_dir: PathBuf::from(WORKSPACE_DIR),
        }
    }
}

impl Config {
    /// Defaults, with the workspace taken from `FERT_COST_WORKSPACE` if set.
    pub fn from_env() -> Self {
        Self::with_workspace(env::var(WORKSPACE_ENV_VAR).ok())
    }

    fn with_workspace(workspace: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = workspace.filter(|d| !d.trim().is_empty()) {
            config.workspace_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn adjusted_price_table_path(&self) -> PathBuf {
        self.workspace_dir.join(ADJUSTED_PRICE_TABLE_FILE_NAME)
    }

    pub fn adjustment_summary_path(&self) -> PathBuf {
        self.workspace_dir.join(ADJUSTMENT_SUMMARY_FILE_NAME)
    }
}
