use crate::output::{print_json, print_table};
use crate::settings::load_config;
use std::path::Path;

// ---------------------------------------------------------------------------
// formats
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;
    let default_key = registry.default_key();

    if json {
        let formats: Vec<serde_json::Value> = registry
            .iter()
            .map(|t| {
                serde_json::json!({
                    "key": t.key,
                    "label": t.label,
                    "default": t.key == default_key,
                    "builtin": t.builtin,
                })
            })
            .collect();
        return print_json(&formats);
    }

    let rows = registry
        .iter()
        .map(|t| {
            let mut tags = Vec::new();
            if t.key == default_key {
                tags.push("default");
            }
            if !t.builtin {
                tags.push("custom");
            }
            vec![t.key.clone(), t.label.clone(), tags.join(", ")]
        })
        .collect();
    print_table(&["KEY", "LABEL", ""], rows);
    Ok(())
}
