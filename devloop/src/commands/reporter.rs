//! Hands planned tasks to the executor and announces them.

use devloop_core::{dedupe_tasks, EventBus, EventName, Task, TaskPlan};
use serde_json::Value;

use crate::formatting::{format_task, print_error, Status};

/// Prints planned tasks and raises `taskPending` for each.
///
/// Execution itself happens outside this process; pending events are what
/// an executor or a remote session picks up.
pub struct TaskReporter {
    bus: EventBus,
}

impl TaskReporter {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Returns the number of distinct tasks reported.
    pub fn report(&self, plan: TaskPlan) -> usize {
        for failure in &plan.failures {
            print_error(&format!("{}: {}", failure.target, failure.error));
        }

        let tasks = dedupe_tasks(plan.tasks);
        for task in &tasks {
            println!("  {}", Status::Info.format(&format_task(task)));
            self.bus.emit(EventName::TaskPending, task_payload(task));
        }
        tasks.len()
    }
}

fn task_payload(task: &Task) -> Value {
    let key = Value::from(task.key());
    match serde_json::to_value(task) {
        Ok(Value::Object(mut fields)) => {
            fields.insert("key".to_string(), key);
            Value::Object(fields)
        }
        _ => serde_json::json!({ "key": key }),
    }
}
