use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::confusion::AdvisoryTable;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("number of classes must be at least 1 (set evaluation.num_classes or classes.names)")]
    NoClasses,
    #[error("iou_threshold must be in (0, 1], got {0}")]
    InvalidIouThreshold(f64),
    #[error("top_k_confusions must be at least 1")]
    ZeroTopK,
    #[error("{names} class names given for {num_classes} classes")]
    TooManyClassNames { names: usize, num_classes: usize },
    #[error("group '{group}' lists class {class_id}, outside [0, {num_classes})")]
    GroupClassOutOfRange {
        group: &'static str,
        class_id: usize,
        num_classes: usize,
    },
    #[error("class {class_id} appears in both the normal and warning groups")]
    OverlappingGroups { class_id: usize },
    #[error(
        "advisory ({true_class}, {predicted_class}) references a class outside [0, {num_classes})"
    )]
    AdvisoryClassOutOfRange {
        true_class: usize,
        predicted_class: usize,
        num_classes: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvalConfig {
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub classes: ClassNames,
    #[serde(default)]
    pub groups: ClassGroups,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    /// 0 means "use the number of class names"
    pub num_classes: usize,
    /// IoU threshold for single-point precision/recall
    pub iou_threshold: f64,
    pub top_k_confusions: usize,
    pub parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ClassNames {
    pub names: Vec<String>,
}

/// Two disjoint partitions of the class set
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ClassGroups {
    pub normal: Vec<usize>,
    pub warning: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Advisory {
    pub true_class: usize,
    pub predicted_class: usize,
    pub advice: String,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            num_classes: 0,
            iou_threshold: 0.5,
            top_k_confusions: 3,
            parallel: true,
        }
    }
}

impl EvalConfig {
    /// Configuration for `num_classes` anonymous classes
    pub fn with_classes(num_classes: usize) -> Self {
        let mut config = Self::default();
        config.evaluation.num_classes = num_classes;
        config
    }

    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.classes.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups(mut self, normal: Vec<usize>, warning: Vec<usize>) -> Self {
        self.groups = ClassGroups { normal, warning };
        self
    }

    pub fn with_advisory(
        mut self,
        true_class: usize,
        predicted_class: usize,
        advice: impl Into<String>,
    ) -> Self {
        self.advisories.push(Advisory {
            true_class,
            predicted_class,
            advice: advice.into(),
        });
        self
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f64) -> Self {
        self.evaluation.iou_threshold = iou_threshold;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.evaluation.top_k_confusions = top_k;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.evaluation.parallel = parallel;
        self
    }

    pub fn num_classes(&self) -> usize {
        if self.evaluation.num_classes > 0 {
            self.evaluation.num_classes
        } else {
            self.classes.names.len()
        }
    }

    /// Display name per class id; unnamed classes become `class_<id>`
    pub fn class_names(&self) -> Vec<String> {
        (0..self.num_classes())
            .map(|id| {
                self.classes
                    .names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", id))
            })
            .collect()
    }

    pub fn advisory_table(&self) -> AdvisoryTable {
        AdvisoryTable::from_entries(
            self.advisories
                .iter()
                .map(|a| ((a.true_class, a.predicted_class), a.advice.clone())),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let num_classes = self.num_classes();
        if num_classes == 0 {
            return Err(ConfigError::NoClasses);
        }
        let t = self.evaluation.iou_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::InvalidIouThreshold(t));
        }
        if self.evaluation.top_k_confusions == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if self.classes.names.len() > num_classes {
            return Err(ConfigError::TooManyClassNames {
                names: self.classes.names.len(),
                num_classes,
            });
        }

        for (group, ids) in [
            ("normal", &self.groups.normal),
            ("warning", &self.groups.warning),
        ] {
            if let Some(&class_id) = ids.iter().find(|&&id| id >= num_classes) {
                return Err(ConfigError::GroupClassOutOfRange {
                    group,
                    class_id,
                    num_classes,
                });
            }
        }
        let normal: BTreeSet<usize> = self.groups.normal.iter().copied().collect();
        if let Some(&class_id) = self.groups.warning.iter().find(|&&id| normal.contains(&id)) {
            return Err(ConfigError::OverlappingGroups { class_id });
        }

        if let Some(a) = self
            .advisories
            .iter()
            .find(|a| a.true_class >= num_classes || a.predicted_class >= num_classes)
        {
            return Err(ConfigError::AdvisoryClassOutOfRange {
                true_class: a.true_class,
                predicted_class: a.predicted_class,
                num_classes,
            });
        }

        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load the user config file, falling back to defaults
    pub fn load() -> Self {
        if let Some(config_path) = Self::config_file_path()
            && config_path.exists()
        {
            match Self::from_file(&config_path) {
                Ok(config) => return config,
                Err(e) => log::warn!("ignoring {}: {}", config_path.display(), e),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_file_path().ok_or_else(|| ConfigError::Io {
            path: PathBuf::from("deteval/config.toml"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user configuration directory",
            ),
        })?;
        let io_err = |source| ConfigError::Io {
            path: config_path.clone(),
            source,
        };
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&config_path, self.to_toml_string()?).map_err(io_err)?;
        Ok(config_path)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|mut path| {
            path.push("config.toml");
            path
        })
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("deteval");
            path
        })
    }
}
