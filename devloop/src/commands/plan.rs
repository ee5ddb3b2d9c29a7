//! Inspection commands that never start the loop.

use std::path::PathBuf;

use anyhow::{bail, Result};
use devloop_core::settings::validate;
use devloop_core::{dedupe_tasks, TaskPlanner};
use owo_colors::OwoColorize;
use serde_json::json;

use crate::formatting::{
    format_task, print_error, print_key_value, print_section_header, print_warning,
    SectionStyle, Status,
};

use super::{load_project, SelectionArgs};

pub async fn cmd_plan(config_path: PathBuf, selection: SelectionArgs, json: bool) -> Result<()> {
    let (config, graph) = load_project(&config_path)?;
    let settings = selection.apply(config.session_settings());
    validate(&graph, &settings)?;

    let plan = TaskPlanner::new().initial_tasks(&graph, &settings).await;
    let failures: Vec<(String, String)> = plan
        .failures
        .iter()
        .map(|f| (f.target.clone(), f.error.to_string()))
        .collect();
    let tasks = dedupe_tasks(plan.tasks);

    if json {
        let failures: Vec<_> = failures
            .iter()
            .map(|(target, error)| json!({ "target": target, "error": error }))
            .collect();
        let output = json!({
            "settings": settings,
            "tasks": tasks,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_section_header("Initial Plan", SectionStyle::Primary);
        print_key_value("Project", &config.project.name);
        print_key_value("Tasks", &tasks.len().to_string());
        println!();

        if tasks.is_empty() {
            print_warning("Nothing to do");
        }
        for task in &tasks {
            println!("  {}", Status::Info.format(&format_task(task)));
        }
        for (target, error) in &failures {
            print_error(&format!("{}: {}", target, error));
        }
        println!();
    }

    if !failures.is_empty() {
        bail!("{} item(s) could not be planned", failures.len());
    }
    Ok(())
}

pub fn cmd_graph(config_path: PathBuf, json: bool) -> Result<()> {
    let (_, graph) = load_project(&config_path)?;
    let order = graph.topological_order();

    if json {
        let mut modules = Vec::with_capacity(order.len());
        for name in order {
            let module = graph.module(name)?;
            modules.push(json!({
                "name": module.name,
                "path": module.path,
                "deps": graph.dependencies(name)?,
                "dependants": graph.dependants(name)?,
                "services": module.services.iter().map(|s| &s.name).collect::<Vec<_>>(),
            }));
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "order": order, "modules": modules }))?
        );
        return Ok(());
    }

    print_section_header("Dependency Graph", SectionStyle::Primary);
    if order.is_empty() {
        print_warning("No modules configured");
    }
    for (i, name) in order.iter().enumerate() {
        let deps = graph.dependencies(name)?;
        print!("  {}. {}", (i + 1).to_string().bright_black(), name.bold().white());
        if !deps.is_empty() {
            print!(" {}", format!("<- {}", deps.join(", ")).bright_black());
        }
        println!();

        let module = graph.module(name)?;
        for service in &module.services {
            let mut label = service.name.clone();
            if service.hot_reloadable {
                label.push_str(" (hot reload)");
            }
            if service.disabled {
                label.push_str(" (disabled)");
            }
            println!("       {}", label.cyan());
        }
    }
    println!();

    Ok(())
}
