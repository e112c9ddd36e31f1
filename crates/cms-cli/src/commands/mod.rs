//! Command implementations for cms-cli

pub mod extension;

use std::path::Path;

use cms_extensions::ManagerSettings;

use crate::error::Result;

pub use extension::{
    handle_extension_check, handle_extension_discover, handle_extension_init,
    handle_extension_list,
};

/// Settings file looked up in the working directory when `--config` is absent.
pub const SETTINGS_FILENAME: &str = "cms.toml";

/// Resolve manager settings for a command.
///
/// `--config` wins; otherwise `cms.toml` in `cwd` is read when present, and
/// the defaults rooted at `cwd/extensions` are used when it is not.
/// `--extensions-dir` overrides whatever the settings say.
pub fn load_settings(
    cwd: &Path,
    config: Option<&Path>,
    extensions_dir: Option<&Path>,
) -> Result<ManagerSettings> {
    let mut settings = match config {
        Some(path) => ManagerSettings::from_path(&cwd.join(path))?,
        None => {
            let default_path = cwd.join(SETTINGS_FILENAME);
            if default_path.is_file() {
                ManagerSettings::from_path(&default_path)?
            } else {
                ManagerSettings::new(cwd.join("extensions"))
            }
        }
    };

    if let Some(dir) = extensions_dir {
        settings.extensions_dir = cwd.join(dir);
    }

    tracing::debug!(extensions_dir = ?settings.extensions_dir, policy = ?settings.dependency_policy, "Resolved settings");
    Ok(settings)
}
