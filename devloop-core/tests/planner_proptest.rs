use devloop_core::graph::DependencyGraph;
use devloop_core::module::{Module, Service, TestConfig};
use devloop_core::planner::TaskPlanner;
use devloop_core::settings::SessionSettings;
use devloop_core::task::{Task, TaskKind};
use proptest::prelude::*;

/// Random DAGs: module `i` may only depend on modules declared before it.
fn gen_modules() -> impl Strategy<Value = Vec<Module>> {
    (1usize..10)
        .prop_flat_map(|count| {
            proptest::collection::vec(proptest::collection::vec(any::<bool>(), count), count)
        })
        .prop_map(|matrix| {
            matrix
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let deps = (0..i)
                        .filter(|&j| row[j])
                        .map(|j| format!("m{}", j))
                        .collect();
                    Module::new(format!("m{}", i), deps)
                        .with_service(Service::new(format!("s{}", i), ""))
                        .with_test(TestConfig::new("unit"))
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn test_one_build_per_module(modules in gen_modules()) {
        let graph = DependencyGraph::new(modules).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let plan = runtime.block_on(
            TaskPlanner::new().initial_tasks(&graph, &SessionSettings::everything()),
        );

        let builds: Vec<String> = plan
            .tasks
            .iter()
            .filter(|t| t.kind() == TaskKind::Build)
            .map(Task::key)
            .collect();
        let expected: Vec<String> = graph
            .module_names()
            .iter()
            .map(|name| format!("build.{}", name))
            .collect();
        prop_assert_eq!(builds, expected);
    }

    #[test]
    fn test_watch_tests_cover_dependants(modules in gen_modules(), pick in any::<prop::sample::Index>()) {
        let graph = DependencyGraph::new(modules).unwrap();
        let names = graph.module_names();
        let changed = &names[pick.index(names.len())];
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let plan = runtime
            .block_on(TaskPlanner::new().watch_tasks(&graph, changed, &SessionSettings::everything()))
            .unwrap();

        let tested: Vec<String> = plan
            .tasks
            .iter()
            .filter_map(|t| match t {
                Task::Test(test) => Some(test.module.clone()),
                _ => None,
            })
            .collect();
        let expected: Vec<String> = graph
            .transitive_dependants(changed)
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect();
        prop_assert_eq!(tested, expected);
    }
}
