//! `roadwatch models`: List the model aliases that can be selected.

use roadwatch_config::AppConfig;
use roadwatch_core::provider::Provider;

pub async fn run(check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Model aliases (current: {})", config.model_core);
    println!();
    for (alias, line) in model_table(&config) {
        if check {
            println!("{line} {}", reachability(&config, &alias).await);
        } else {
            println!("{line}");
        }
    }
    println!();
    println!("  Select one with MODEL_CORE=<alias> or `roadwatch ask --model <alias>`.");

    Ok(())
}

fn model_table(config: &AppConfig) -> Vec<(String, String)> {
    config
        .model_aliases()
        .into_iter()
        .filter_map(|alias| {
            let model = config.model(&alias).ok()?;
            let marker = if alias == config.model_core { "*" } else { " " };
            let key = match model.provider.as_str() {
                "ollama" => "local",
                provider if config.api_key_for(provider).is_some() => "key set",
                _ => "no key",
            };
            let line = format!(
                "{marker} {alias:<20} {:<10} {:<32} {key:<8}",
                model.provider, model.model_id
            );
            Some((alias, line))
        })
        .collect()
}

/// Bind `alias` and ask its provider whether it is reachable.
async fn reachability(config: &AppConfig, alias: &str) -> String {
    match roadwatch_providers::bind_model(config, alias) {
        Ok(binding) => health_label(binding.provider.as_ref()).await,
        Err(_) => "skipped".into(),
    }
}

async fn health_label(provider: &dyn Provider) -> String {
    match provider.health_check().await {
        Ok(true) => "reachable".into(),
        Ok(false) => "unreachable".into(),
        Err(e) => format!("error: {e}"),
    }
}
