use crate::output::{print_json, print_table};
use sentinel_core::actions::{ActionCatalog, TemplateContext};
use serde::Serialize;

#[derive(Serialize)]
struct CatalogEntry {
    trigger: String,
    steps: Vec<String>,
}

pub fn run(trigger: Option<&str>, json: bool) -> anyhow::Result<()> {
    let catalog = ActionCatalog::standard();
    let ctx = TemplateContext::default();

    let mut triggers: Vec<&str> = catalog.triggers().collect();
    triggers.sort_unstable();

    let entries: Vec<CatalogEntry> = triggers
        .iter()
        .filter(|key| trigger.map_or(true, |t| t == **key))
        .map(|key| CatalogEntry {
            trigger: key.to_string(),
            steps: catalog
                .resolve(key, &ctx)
                .iter()
                .map(|step| step.formatted())
                .collect(),
        })
        .collect();

    if let Some(t) = trigger {
        anyhow::ensure!(!entries.is_empty(), "unknown trigger: {t}");
    }

    if json {
        return print_json(&entries);
    }

    let rows = entries
        .iter()
        .map(|entry| {
            vec![
                entry.trigger.clone(),
                entry.steps.len().to_string(),
                entry.steps.first().cloned().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["TRIGGER", "STEPS", "FIRST STEP"], rows);

    if let Some(entry) = trigger.and_then(|_| entries.first()) {
        println!();
        for step in &entry.steps {
            println!("  {step}");
        }
    }
    Ok(())
}
