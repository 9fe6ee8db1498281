use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub supabase_url: String,
    pub anon_key: String,
    pub bucket: String,
    /// Base of the public product page, used for share deep links.
    pub product_page_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".into(),
            anon_key: String::new(),
            bucket: "box".into(),
            product_page_base_url: "http://localhost:3000/dashboard/produto".into(),
        }
    }
}

/// Defaults, overridden by an optional `catalog.toml` next to the
/// binary, overridden in turn by environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("catalog.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_overrides(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("SUPABASE_URL") {
        settings.supabase_url = v;
    }
    if let Ok(v) = std::env::var("SUPABASE_ANON_KEY") {
        settings.anon_key = v;
    }
    if let Ok(v) = std::env::var("SUPABASE_BUCKET") {
        settings.bucket = v;
    }
    if let Ok(v) = std::env::var("PRODUCT_PAGE_BASE_URL") {
        settings.product_page_base_url = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("supabase_url") {
        settings.supabase_url = v.clone();
    }
    if let Some(v) = file_cfg.get("anon_key") {
        settings.anon_key = v.clone();
    }
    if let Some(v) = file_cfg.get("bucket") {
        settings.bucket = v.clone();
    }
    if let Some(v) = file_cfg.get("product_page_base_url") {
        settings.product_page_base_url = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_local_stack() {
        let settings = Settings::default();
        assert_eq!(settings.bucket, "box");
        assert!(settings.supabase_url.starts_with("http://127.0.0.1"));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        let file_cfg: HashMap<String, String> = toml::from_str(
            "supabase_url = \"https://abc.supabase.co\"\nbucket = \"media\"\n",
        )
        .expect("toml");

        apply_file_overrides(&mut settings, &file_cfg);
        assert_eq!(settings.supabase_url, "https://abc.supabase.co");
        assert_eq!(settings.bucket, "media");
        // Untouched keys keep their defaults.
        assert_eq!(
            settings.product_page_base_url,
            "http://localhost:3000/dashboard/produto"
        );
    }
}
