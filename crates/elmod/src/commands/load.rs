//! Load a document into a fresh registry and report the outcome.

use std::sync::Arc;

use anyhow::{Context, Result};
use elmod_runtime::{
    ComponentOutcome, ElementModuleLoader, ElementRegistry, LoadReport, OutcomeStatus,
};
use serde_json::{json, Value};

use crate::config::ConfigFile;

/// Run the load command.
pub async fn run(location: &str, instantiate: bool, as_json: bool, config: &ConfigFile) -> Result<()> {
    let registry = Arc::new(ElementRegistry::new());
    let loader = ElementModuleLoader::new(Arc::clone(&registry));

    let report = loader
        .load(location, &config.load_options())
        .await
        .with_context(|| format!("Failed to load {location}"))?;

    let roots: Vec<(String, Result<String, String>)> = if instantiate {
        report
            .registered()
            .into_iter()
            .map(|tag| {
                let root = registry
                    .create_element(tag)
                    .map(|element| {
                        element
                            .internals()
                            .and_then(|internals| internals.shadow_root())
                            .map(|root| root.to_html())
                            .unwrap_or_default()
                    })
                    .map_err(|e| e.to_string());
                (tag.to_string(), root)
            })
            .collect()
    } else {
        Vec::new()
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report, &roots))?);
    } else {
        print_report(&report, &roots);
    }

    let failed = report.failures().count();
    if failed > 0 {
        tracing::warn!("{failed} of {} definitions failed", report.outcomes.len());
    }

    Ok(())
}

fn print_report(report: &LoadReport, roots: &[(String, Result<String, String>)]) {
    println!("{}", report.url);
    for outcome in &report.outcomes {
        let tag = outcome.tag_name.as_deref().unwrap_or("(unnamed)");
        match &outcome.status {
            OutcomeStatus::Registered { class_name, .. } => {
                println!("  registered <{tag}> as {class_name}")
            }
            OutcomeStatus::Skipped => println!("  skipped definition {}", outcome.index),
            OutcomeStatus::Failed(e) => println!("  failed <{tag}>: {e}"),
        }
    }

    for (tag, root) in roots {
        match root {
            Ok(markup) => println!("<{tag}> root: {markup}"),
            Err(e) => println!("<{tag}> construction failed: {e}"),
        }
    }
}

fn report_json(report: &LoadReport, roots: &[(String, Result<String, String>)]) -> Value {
    let definitions: Vec<Value> = report.outcomes.iter().map(outcome_json).collect();
    let instances: Vec<Value> = roots
        .iter()
        .map(|(tag, root)| match root {
            Ok(markup) => json!({ "tag": tag, "root": markup }),
            Err(e) => json!({ "tag": tag, "error": e }),
        })
        .collect();

    json!({
        "url": report.url.as_str(),
        "definitions": definitions,
        "instances": instances,
    })
}

fn outcome_json(outcome: &ComponentOutcome) -> Value {
    match &outcome.status {
        OutcomeStatus::Registered {
            class_name,
            module_url,
            imports,
        } => json!({
            "index": outcome.index,
            "tag": outcome.tag_name,
            "status": "registered",
            "class": class_name,
            "module": module_url.as_str(),
            "imports": imports,
        }),
        OutcomeStatus::Skipped => json!({
            "index": outcome.index,
            "tag": outcome.tag_name,
            "status": "skipped",
        }),
        OutcomeStatus::Failed(e) => json!({
            "index": outcome.index,
            "tag": outcome.tag_name,
            "status": "failed",
            "error": e.to_string(),
        }),
    }
}
