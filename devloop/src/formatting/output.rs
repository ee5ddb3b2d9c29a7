//! Key-value and task lines.

use devloop_core::Task;
use owo_colors::OwoColorize;

pub fn print_key_value(key: &str, value: &str) {
    println!("  {} {}", key.bright_black().bold(), value.bold().white());
}

/// One-line description of a planned task, e.g. `deploy api (backend) [forced, watch]`.
pub fn format_task(task: &Task) -> String {
    let (target, flags) = match task {
        Task::Build(build) => (build.module.clone(), task_flags(build.force, false, false)),
        Task::Test(test) => (
            format!("{}:{}", test.module, test.test_name),
            task_flags(test.force, test.force_build, false),
        ),
        Task::Deploy(deploy) => {
            let mut target = format!("{} ({})", deploy.service, deploy.module);
            if deploy.dev_mode_service_names.contains(&deploy.service) {
                target.push_str(" dev mode");
            }
            (
                target,
                task_flags(deploy.force, deploy.force_build, deploy.from_watch),
            )
        }
    };

    let label = format!("{:<6}", task.kind().as_str());
    if flags.is_empty() {
        format!("{} {}", label.bold(), target)
    } else {
        format!(
            "{} {} {}",
            label.bold(),
            target,
            format!("[{}]", flags.join(", ")).bright_black()
        )
    }
}

fn task_flags(force: bool, force_build: bool, from_watch: bool) -> Vec<&'static str> {
    [
        (force, "forced"),
        (force_build, "rebuild"),
        (from_watch, "watch"),
    ]
    .into_iter()
    .filter_map(|(set, flag)| set.then_some(flag))
    .collect()
}
