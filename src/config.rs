use crate::error::ConfigError;
use crate::records::SensorCategory;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_GVIZ_BASE: &str = "https://docs.google.com";
pub const DEFAULT_APPEND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Which spreadsheet tab receives each category's rows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationMap {
    tabs: BTreeMap<SensorCategory, String>,
}

impl DestinationMap {
    pub fn new() -> Self {
        DestinationMap {
            tabs: BTreeMap::new(),
        }
    }

    /// Every category mapped to its default tab name
    pub fn with_default_tabs() -> Self {
        let mut map = DestinationMap::new();
        for category in SensorCategory::ALL {
            map.insert(category, category.label());
        }
        map
    }

    pub fn insert(&mut self, category: SensorCategory, tab: impl Into<String>) {
        self.tabs.insert(category, tab.into());
    }

    pub fn tab_for(&self, category: SensorCategory) -> Option<&str> {
        self.tabs.get(&category).map(String::as_str)
    }

    /// Looks up a destination by category name (`THERMAL`, `thermal`,
    /// `Thermal Data`)
    pub fn resolve(&self, name: &str) -> Option<(SensorCategory, &str)> {
        let category = SensorCategory::parse(name)?;
        self.tab_for(category).map(|tab| (category, tab))
    }
}

impl Default for DestinationMap {
    fn default() -> Self {
        DestinationMap::with_default_tabs()
    }
}

/// Everything the server needs to run, gathered in one place
#[derive(Clone, Debug)]
pub struct Config {
    pub bind: SocketAddr,
    pub spreadsheet_id: String,
    /// Bearer token for the append endpoint; obtaining it is up to the
    /// deployment
    pub access_token: Option<String>,
    pub sheets_api_base: String,
    pub gviz_base: String,
    pub destinations: DestinationMap,
    pub frontend_origin: String,
    pub append_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Build the configuration from process environment variables
    ///
    /// # Returns
    /// * `Result<Config, ConfigError>` - The configuration, or the first missing/invalid setting
    ///
    /// # Examples
    /// ```no_run
    /// use faultsheet::config::Config;
    ///
    /// match Config::from_env() {
    ///     Ok(config) => println!("listening on {}", config.bind),
    ///     Err(e) => eprintln!("bad configuration: {}", e),
    /// }
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    ///
    /// Only `SHEET_ID` is required. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let spreadsheet_id = get("SHEET_ID").ok_or(ConfigError::Missing("SHEET_ID"))?;

        let bind_raw = get("FAULTSHEET_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "FAULTSHEET_BIND",
            value: bind_raw.clone(),
        })?;

        let mut destinations = DestinationMap::new();
        for (category, key) in [
            (SensorCategory::Thermal, "THERMAL_SHEET_NAME"),
            (SensorCategory::Acoustic, "ACOUSTIC_SHEET_NAME"),
            (SensorCategory::Vibration, "VIBRATION_SHEET_NAME"),
        ] {
            let tab = get(key).unwrap_or_else(|| category.label().to_string());
            destinations.insert(category, tab);
        }

        let append_timeout = match get("APPEND_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("APPEND_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_APPEND_TIMEOUT_SECS),
        };
        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => parse_number("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Config {
            bind,
            spreadsheet_id,
            access_token: get("SHEETS_ACCESS_TOKEN"),
            sheets_api_base: get("SHEETS_API_BASE")
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            gviz_base: get("GVIZ_BASE").unwrap_or_else(|| DEFAULT_GVIZ_BASE.to_string()),
            destinations,
            frontend_origin: get("FRONTEND_ORIGIN")
                .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGIN.to_string()),
            append_timeout,
            max_upload_bytes,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
