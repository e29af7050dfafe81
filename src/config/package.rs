//! Package cook configuration document

use crate::error::{CookError, CookResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One package built from cooked content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDefinition {
    pub name: String,
    /// Content-relative directories included in the package
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default = "default_compress")]
    pub compress: bool,
    /// Open the written manifest in source control for the next submit
    #[serde(default)]
    pub include_in_source_control: bool,
}

fn default_compress() -> bool {
    true
}

/// Packages the session produces after all other tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCookConfig {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageDefinition>,
}

impl PackageCookConfig {
    pub fn load(path: &Path) -> CookResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CookError::configuration(format!(
                "Cannot read package cook config {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config: Self = toml::from_str(&content)?;
        config.path = path.to_path_buf();

        for package in &config.packages {
            if package.name.is_empty() {
                return Err(CookError::configuration(format!(
                    "{}: package without a name",
                    path.display()
                )));
            }
            if let Some(root) = package.roots.iter().find(|r| !is_content_relative(r)) {
                return Err(CookError::configuration(format!(
                    "{}: package {} root '{}' leaves the content directory",
                    path.display(),
                    package.name,
                    root
                )));
            }
        }
        Ok(config)
    }

    pub fn package(&self, name: &str) -> Option<&PackageDefinition> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Roots are joined onto the content directory (leading slashes
/// ignored), so they must not climb out of it or name a drive.
fn is_content_relative(root: &str) -> bool {
    let root = root.replace('\\', "/");
    !root.contains(':') && root.split('/').all(|component| component != "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_packages() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("packages.toml");
        fs::write(
            &path,
            r#"
[[package]]
name = "base"
roots = ["Authored/UI", "Authored/Fx"]

[[package]]
name = "audio"
roots = ["Authored/Sound"]
compress = false
"#,
        )
        .unwrap();

        let config = PackageCookConfig::load(&path).unwrap();
        assert_eq!(config.packages.len(), 2);
        assert!(config.package("base").unwrap().compress);
        assert!(!config.package("audio").unwrap().compress);
        assert!(!config.package("base").unwrap().include_in_source_control);
        assert_eq!(config.path, path);
    }

    #[test]
    fn test_escaping_roots_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("packages.toml");
        for root in ["../Secrets", "Ui/../../Secrets", "/..", "C:\\Windows", "..\\Up"] {
            fs::write(
                &path,
                format!("[[package]]\nname = \"base\"\nroots = [{:?}]\n", root),
            )
            .unwrap();
            let err = PackageCookConfig::load(&path).unwrap_err();
            assert!(err.to_string().contains("leaves the content directory"), "{root}");
        }

        fs::write(&path, "[[package]]\nname = \"base\"\nroots = [\"/Ui/..menus/\"]\n").unwrap();
        assert!(PackageCookConfig::load(&path).is_ok());
    }

    #[test]
    fn test_unnamed_package_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("packages.toml");
        fs::write(&path, "[[package]]\nname = \"\"\n").unwrap();
        assert!(PackageCookConfig::load(&path).is_err());
    }
}
