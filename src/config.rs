use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::dataset::DEFAULT_DATASET_FILE;
use crate::draw::Placeholders;
use crate::prefs::DEFAULT_PREFS_FILE;

pub const CONFIG_FILE_NAME: &str = "revision-randomiser.toml";
pub const CONFIG_ENV: &str = "REVISION_RANDOMISER_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub cards: CardsSection,
    #[serde(default)]
    pub prefs: PrefsSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DataSection {
    /// Dataset JSON, relative to the config file directory.
    #[serde(default)]
    pub dataset: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CardsSection {
    #[serde(default)]
    pub content_placeholder: Option<String>,
    #[serde(default)]
    pub function_placeholder: Option<String>,

    /// Fixed RNG seed for reproducible draws. Unset means a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PrefsSection {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LogSection {
    #[serde(default)]
    pub verbose: Option<bool>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn relative_to(base: &Path, p: PathBuf) -> PathBuf {
    if p.is_relative() {
        base.join(p)
    } else {
        p
    }
}

/// Config file values with command-line overrides applied and paths made absolute.
#[derive(Clone, Debug)]
pub struct Settings {
    pub config_path: Option<PathBuf>,
    pub dataset_path: PathBuf,
    pub prefs_path: PathBuf,
    pub placeholders: Placeholders,
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(
        config_path: Option<PathBuf>,
        dataset: Option<PathBuf>,
        seed: Option<u64>,
        quiet: bool,
    ) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(CONFIG_FILE_NAME))
            .filter(|p| p.exists());

        let file_cfg = match cfg_file.as_ref() {
            Some(p) => load_config(p)?,
            None => AppConfig::default(),
        };
        Ok(Self::from_config(&file_cfg, cfg_file, &cwd, dataset, seed, quiet))
    }

    pub fn from_config(
        file_cfg: &AppConfig,
        config_path: Option<PathBuf>,
        cwd: &Path,
        dataset: Option<PathBuf>,
        seed: Option<u64>,
        quiet: bool,
    ) -> Self {
        let base_dir = config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        let dataset_path = match dataset {
            Some(p) => relative_to(cwd, p),
            None => relative_to(
                &base_dir,
                PathBuf::from(
                    non_empty(file_cfg.data.dataset.as_deref())
                        .unwrap_or_else(|| DEFAULT_DATASET_FILE.to_string()),
                ),
            ),
        };
        let prefs_path = relative_to(
            &base_dir,
            PathBuf::from(
                non_empty(file_cfg.prefs.path.as_deref())
                    .unwrap_or_else(|| DEFAULT_PREFS_FILE.to_string()),
            ),
        );

        let defaults = Placeholders::default();
        let placeholders = Placeholders {
            content: non_empty(file_cfg.cards.content_placeholder.as_deref())
                .unwrap_or(defaults.content),
            function: non_empty(file_cfg.cards.function_placeholder.as_deref())
                .unwrap_or(defaults.function),
        };

        Self {
            config_path,
            dataset_path,
            prefs_path,
            placeholders,
            seed: seed.or(file_cfg.cards.seed),
            verbose: !quiet && file_cfg.log.verbose.unwrap_or(true),
        }
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[data]
# Dataset with "contentGroups" and "functionGroups", relative to this file.
dataset = "cards_data.json"

[cards]
# Shown on a card whose axis is switched off by the other axis's "only" mode.
content_placeholder = "Content"
function_placeholder = "Instruction"
# seed = 42

[prefs]
path = ".revision-randomiser-prefs.json"

[log]
verbose = true
"#;
