//! Read-only settings port.

use std::sync::Arc;

use crate::settings::Settings;

/// Supplies the current settings.
///
/// The core only reads settings; persistence is the host's concern.
pub trait SettingsProvider: Send + Sync {
    /// Current settings snapshot.
    fn settings(&self) -> Settings;

    /// Destination filename template, if configured.
    fn filename_template(&self) -> Option<String> {
        self.settings().filename_template
    }
}

/// Settings fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    settings: Arc<Settings>,
}

impl StaticSettings {
    /// Wrap a settings value.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Settings {
        (*self.settings).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_settings_returns_snapshot() {
        let provider: Arc<dyn SettingsProvider> = Arc::new(StaticSettings::new(Settings {
            filename_template: Some("{id}".into()),
            ..Settings::with_defaults()
        }));
        assert_eq!(provider.filename_template().as_deref(), Some("{id}"));
        assert_eq!(provider.settings().download_concurrency, Some(3));
    }
}
