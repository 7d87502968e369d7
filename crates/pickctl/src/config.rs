use anyhow::Context;
use picking_client::SessionStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Config is the persisted state of a `pickctl` profile.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    // Project API which was last used by this profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<API>,
    // Local key-value entries of the auth client, such as its persisted session.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub store: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct API {
    // Base URL of the hosted project.
    pub endpoint: url::Url,
    // Public (shared) anonymous key of the project.
    pub public_token: String,
}

/// Arguments which select the project API, overriding those of the profile.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ApiArgs {
    /// Base URL of the hosted project.
    #[clap(global = true, long = "api-url", env = "PICKING_API_URL")]
    pub endpoint: Option<url::Url>,
    /// Public (anonymous) API key of the hosted project.
    #[clap(global = true, long = "public-key", env = "PICKING_PUBLIC_KEY", hide_env_values = true)]
    pub public_token: Option<String>,
}

impl Config {
    /// Load the Config of `profile`, or a default Config if none has been written.
    pub fn load(dir: &Path, profile: &str) -> anyhow::Result<Self> {
        let path = Self::path(dir, profile);

        match std::fs::read(&path) {
            Ok(content) => serde_json::from_slice(&content)
                .with_context(|| format!("failed to parse config at {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config found, using defaults");
                Ok(Config::default())
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config at {}", path.display()))
            }
        }
    }

    /// Write the Config of `profile`, replacing any previous one.
    pub fn write(&self, dir: &Path, profile: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;

        let path = Self::path(dir, profile);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(self)?;

        std::fs::write(&tmp, content)
            .with_context(|| format!("failed to write config to {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move config into {}", path.display()))?;

        Ok(())
    }

    /// Resolve the project API from `args`, falling back to that of the profile.
    pub fn resolve_api(&self, args: &ApiArgs) -> anyhow::Result<API> {
        let stored = self.api.as_ref();

        let endpoint = args
            .endpoint
            .clone()
            .or_else(|| stored.map(|api| api.endpoint.clone()));
        let public_token = args
            .public_token
            .clone()
            .or_else(|| stored.map(|api| api.public_token.clone()));

        match (endpoint, public_token) {
            (Some(endpoint), Some(public_token)) => Ok(API {
                endpoint,
                public_token,
            }),
            (None, None) => Ok(API::local()),
            (None, Some(_)) => anyhow::bail!("--api-url (or PICKING_API_URL) must be set"),
            (Some(_), None) => anyhow::bail!("--public-key (or PICKING_PUBLIC_KEY) must be set"),
        }
    }

    fn path(dir: &Path, profile: &str) -> PathBuf {
        dir.join(format!("{profile}.json"))
    }
}

impl API {
    /// API of a project running on this machine.
    pub fn local() -> Self {
        Self {
            endpoint: picking_client::LOCAL_API_URL.clone(),
            public_token: picking_client::LOCAL_PUBLIC_TOKEN.to_string(),
        }
    }
}

/// Default directory of profile configs.
pub fn default_dir() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir().context("couldn't determine the user config directory")?;
    Ok(dir.join("pickctl"))
}

/// ConfigStore is the SessionStore of a profile. Its entries are
/// written back into the profile's Config when the command completes.
#[derive(Debug, Default)]
pub struct ConfigStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl ConfigStore {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.lock().unwrap().clone()
    }
}

impl SessionStore for ConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
    fn set(&self, key: &str, value: String) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_through_profile_file() {
        let dir = tempfile::tempdir().unwrap();

        let loaded = Config::load(dir.path(), "floor").unwrap();
        assert!(loaded.api.is_none());

        let config = Config {
            api: Some(API {
                endpoint: "https://abcdefgh.supabase.co".parse().unwrap(),
                public_token: "anon".to_string(),
            }),
            store: [("sb-abcdefgh-auth-token".to_string(), "{}".to_string())].into(),
        };
        config.write(dir.path(), "floor").unwrap();

        let loaded = Config::load(dir.path(), "floor").unwrap();
        assert_eq!(loaded.api, config.api);
        assert_eq!(loaded.store, config.store);

        // Other profiles are unaffected.
        assert!(Config::load(dir.path(), "default").unwrap().api.is_none());
    }

    #[test]
    fn test_api_resolution() {
        let stored = API {
            endpoint: "https://stored.supabase.co".parse().unwrap(),
            public_token: "stored-key".to_string(),
        };
        let config = Config {
            api: Some(stored.clone()),
            ..Default::default()
        };

        assert_eq!(config.resolve_api(&ApiArgs::default()).unwrap(), stored);

        let args = ApiArgs {
            endpoint: Some("https://other.supabase.co".parse().unwrap()),
            public_token: None,
        };
        let resolved = config.resolve_api(&args).unwrap();
        assert_eq!(resolved.endpoint.as_str(), "https://other.supabase.co/");
        assert_eq!(resolved.public_token, "stored-key");

        assert_eq!(
            Config::default().resolve_api(&ApiArgs::default()).unwrap(),
            API::local()
        );
        assert!(Config::default().resolve_api(&args).is_err());
    }

    #[test]
    fn test_store_clears_session_keys() {
        let store = ConfigStore::new(
            [
                ("sb-local-auth-token".to_string(), "{}".to_string()),
                ("supabase.auth.token".to_string(), "{}".to_string()),
                ("theme".to_string(), "dark".to_string()),
            ]
            .into(),
        );
        picking_client::clear_session_keys(&store);

        assert_eq!(store.keys(), vec!["theme".to_string()]);
    }
}
