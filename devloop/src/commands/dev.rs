//! The continuous-development loop.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use devloop_core::{
    CommandLogSource, DevSession, EventBus, EventName, ModuleWatcher, TaskRequest,
    WatcherConfig, WsRemoteSession,
};
use serde_json::json;

use crate::formatting::{
    print_key_value, print_section_header, print_success, print_warning, SectionStyle,
};

use super::reporter::TaskReporter;
use super::{load_project, SelectionArgs};

pub async fn cmd_dev(
    config_path: PathBuf,
    selection: SelectionArgs,
    debounce_ms: Option<u64>,
    session_id: Option<String>,
) -> Result<()> {
    let (config, mut graph) = load_project(&config_path)?;
    let has_remote_url = config.remote.as_ref().is_some_and(|r| !r.url.is_empty());
    if session_id.is_some() && !has_remote_url {
        bail!(
            "--session-id needs a [remote] url in {}",
            config_path.display()
        );
    }
    let settings = selection.apply(config.session_settings());

    let bus = EventBus::new();
    let mut session = DevSession::new(settings, bus.clone());

    let remote = config.remote.clone().map(|remote| match session_id {
        Some(id) => remote.with_session_id(id),
        None => remote,
    });
    if let Some(remote) = remote {
        session = session
            .with_remote(Arc::new(WsRemoteSession::new(remote.url.clone())), remote)
            .with_log_source(
                Arc::new(CommandLogSource::new(&config.root)),
                config.logs.since(),
            );
    }

    print_section_header("Dev Mode", SectionStyle::Primary);
    print_key_value("Project", &config.project.name);
    print_key_value("Root", &config.root.display().to_string());
    print_key_value("Modules", &graph.module_names().join(", "));
    println!();

    let mut requests = bus.subscribe_to(&TaskRequest::EVENTS);
    let reporter = TaskReporter::new(bus.clone());

    let plan = session.start(&graph).await?;
    let planned = reporter.report(plan);
    print_success(&format!("Planned {} tasks", planned));
    if session.channel().state().is_terminal() {
        print_key_value("Remote", "disabled");
    } else {
        print_key_value("Remote", "connecting");
    }
    println!();

    let watcher_config = WatcherConfig {
        debounce_ms: debounce_ms.unwrap_or(300),
        project_root: config.root.clone(),
    };
    let mut watcher = ModuleWatcher::new(watcher_config, &graph)?;

    println!("  Press Ctrl+C to stop");
    println!();
    bus.emit(EventName::WatchingForChanges, json!({}));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                println!();
                print_warning("Stopping dev loop...");
                break Ok(());
            }
            changes = watcher.next_changes() => {
                let changed = match changes {
                    Ok(changed) => changed,
                    Err(e) => break Err(e.into()),
                };

                match load_project(&config_path) {
                    Ok((_, reloaded)) => {
                        graph = reloaded;
                        watcher.set_graph(&graph);
                    }
                    Err(e) => {
                        print_warning(&format!("Keeping previous configuration: {}", e));
                    }
                }

                bus.emit(
                    EventName::ModuleSourcesChanged,
                    json!({ "moduleNames": changed }),
                );
                for module in &changed {
                    print_warning(&format!("{} changed", module));
                    match session.on_module_changed(&graph, module).await {
                        Ok(plan) => {
                            reporter.report(plan);
                        }
                        Err(e) => print_warning(&e.to_string()),
                    }
                }
                println!();
                bus.emit(EventName::WatchingForChanges, json!({}));
            }
            Some(event) = requests.recv() => {
                let request = match TaskRequest::from_event(&event) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::warn!(event = %event.name, error = %e, "Ignoring remote request");
                        continue;
                    }
                };
                tracing::info!(request = ?request, "Remote request");
                match session.on_request(&graph, &request).await {
                    Ok(plan) => {
                        reporter.report(plan);
                    }
                    Err(e) => print_warning(&e.to_string()),
                }
            }
        }
    };

    session.shutdown().await;
    result
}
