use std::fs;

use stint_lib::execution::ExecutionOutcome;
use tracing_test::traced_test;

use super::common::TestEnv;

#[test]
fn empty_sources_without_outputs_on_disk_short_circuit() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.write_file("src/app/B.java", "class B {}");

  let first = env.engine.execute(&work).unwrap();
  assert_eq!(first.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert!(env.path("build/app/classes/A.class").exists());
  assert!(env.path("build/app/classes/B.class").exists());

  fs::remove_file(env.path("src/app/A.java")).unwrap();
  fs::remove_file(env.path("src/app/B.java")).unwrap();
  fs::remove_file(env.path("build/app/classes/A.class")).unwrap();
  fs::remove_file(env.path("build/app/classes/B.class")).unwrap();

  let second = env.engine.execute(&work).unwrap();

  assert_eq!(second.outcome(), Some(ExecutionOutcome::ShortCircuited));
  assert!(env.history().load(&work.identity).unwrap().is_none());
  assert_eq!(work.executions(), 1);
}

#[test]
fn empty_sources_remove_previous_outputs() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.write_file("src/app/B.java", "class B {}");
  env.engine.execute(&work).unwrap();

  fs::remove_file(env.path("src/app/A.java")).unwrap();
  fs::remove_file(env.path("src/app/B.java")).unwrap();

  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert!(!env.path("build/app/classes/A.class").exists());
  assert!(!env.path("build/app/classes/B.class").exists());
  assert!(env.history().load(&work.identity).unwrap().is_none());
  assert!(result.output_files_produced_by_work.is_empty());
  assert!(result.execution_reasons.is_empty());
  assert!(result.reused_origin_metadata.is_none());
  assert_eq!(work.executions(), 1);
}

#[test]
fn empty_sources_on_first_run_short_circuit() {
  let env = TestEnv::new();
  let work = env.compile_work("empty");

  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::ShortCircuited));
  assert_eq!(work.executions(), 0);
  assert!(!env.path("build/empty/classes").exists());
}

#[test]
fn short_circuit_is_stable() {
  let env = TestEnv::new();
  let work = env.compile_work("empty");

  for _ in 0..3 {
    let result = env.engine.execute(&work).unwrap();
    assert_eq!(result.outcome(), Some(ExecutionOutcome::ShortCircuited));
  }
  assert!(env.history().load(&work.identity).unwrap().is_none());
}

#[test]
fn non_empty_sources_keep_history() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();

  env.write_file("src/app/A.java", "class A { int x; }");
  let result = env.engine.execute(&work).unwrap();

  assert!(result.outcome().unwrap().did_work());
  assert_eq!(work.executions(), 2);
  let state = env.history().load(&work.identity).unwrap().unwrap();
  assert!(state.input_file_properties["sources"].entries().contains_key("A.java"));
}

#[test]
#[traced_test]
fn cleaning_is_logged() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();
  fs::remove_file(env.path("src/app/A.java")).unwrap();

  env.engine.execute(&work).unwrap();

  assert!(logs_contain(
    "Cleaned previous output of :app:compile as it has no source files."
  ));
}
