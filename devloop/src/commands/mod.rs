//! Command implementations for the CLI.

mod dev;
mod plan;
mod reporter;

use std::path::Path;

use anyhow::Result;
use clap::Args;
use devloop_core::{DependencyGraph, ProjectConfig, Selection, SessionSettings};

pub use dev::cmd_dev;
pub use plan::{cmd_graph, cmd_plan};

/// Overrides for the `[session]` defaults. Each flag takes a comma-separated
/// list and can be repeated; `'*'` selects everything.
#[derive(Args, Debug, Default)]
pub struct SelectionArgs {
    #[arg(long, value_delimiter = ',')]
    deploy: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    test_modules: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    tests: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    dev_mode: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    hot_reload: Option<Vec<String>>,
}

impl SelectionArgs {
    fn apply(self, mut settings: SessionSettings) -> SessionSettings {
        let overrides = [
            (self.deploy, &mut settings.deploy_service_names),
            (self.test_modules, &mut settings.test_module_names),
            (self.tests, &mut settings.test_config_names),
            (self.dev_mode, &mut settings.dev_mode_service_names),
            (self.hot_reload, &mut settings.hot_reload_service_names),
        ];
        for (names, selection) in overrides {
            if let Some(names) = names {
                *selection = Selection::from(names);
            }
        }
        settings
    }
}

fn load_project(path: &Path) -> Result<(ProjectConfig, DependencyGraph)> {
    let config = ProjectConfig::load(path)?;
    let graph = config.graph()?;
    Ok((config, graph))
}
