use std::fs;
use std::thread;

use stint_lib::execution::{CachingState, ExecutionOutcome, RequestContext};

use super::common::TestEnv;

#[test]
fn unchanged_work_is_up_to_date() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");

  let first = env.engine.execute(&work).unwrap();
  let second = env.engine.execute(&work).unwrap();

  assert_eq!(second.outcome(), Some(ExecutionOutcome::UpToDate));
  assert_eq!(work.executions(), 1);
  assert_eq!(second.output_files_produced_by_work, first.output_files_produced_by_work);
  let origin = second.reused_origin_metadata.unwrap();
  assert_eq!(origin.build_invocation_id, env.engine.build_invocation_id());
  assert_eq!(second.duration, origin.execution_time);
  assert_eq!(second.caching_state, CachingState::NotDetermined);
}

#[test]
fn first_execution_reports_missing_history() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");

  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.execution_reasons, vec!["No history is available.".to_string()]);
  assert_eq!(result.execution_result.unwrap().output["compiled"], 1);
}

#[test]
fn changed_source_content_re_executes() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();

  env.write_file("src/app/A.java", "class A { void run() {} }");
  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::Executed));
  assert_eq!(
    result.execution_reasons,
    vec!["Input property 'sources' file A.java has changed.".to_string()]
  );
  assert_eq!(
    fs::read_to_string(env.path("build/app/classes/A.class")).unwrap(),
    "CLASS A { VOID RUN() {} }"
  );
}

#[test]
fn changed_value_re_executes_from_scratch() {
  let env = TestEnv::new();
  let mut work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();

  work.release = 21;
  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert_eq!(
    result.execution_reasons,
    vec!["Value of input property 'release' has changed.".to_string()]
  );
}

#[test]
fn removed_output_re_executes() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();

  fs::remove_file(env.path("build/app/classes/A.class")).unwrap();
  let result = env.engine.execute(&work).unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert!(result.execution_reasons[0].starts_with("Output property 'classes' file"));
  assert!(env.path("build/app/classes/A.class").exists());
}

#[test]
fn stale_outputs_are_removed_before_full_rebuild() {
  let env = TestEnv::new();
  let mut work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.write_file("src/app/B.java", "class B {}");
  env.engine.execute(&work).unwrap();

  fs::remove_file(env.path("src/app/B.java")).unwrap();
  work.release = 21;
  env.engine.execute(&work).unwrap();

  assert!(env.path("build/app/classes/A.class").exists());
  assert!(!env.path("build/app/classes/B.class").exists());
}

#[test]
fn rebuild_reason_forces_execution() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  env.engine.execute(&work).unwrap();

  let result = env
    .engine
    .execute_with(&work, RequestContext::rebuild("Forced by --rerun"))
    .unwrap();

  assert_eq!(result.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert_eq!(result.execution_reasons, vec!["Forced by --rerun".to_string()]);
  assert_eq!(work.executions(), 2);
}

#[test]
fn failure_is_captured_and_retried() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");
  work.set_failing(true);

  let failed = env.engine.execute(&work).unwrap();
  assert!(!failed.is_success());
  assert!(failed.execution_result.unwrap_err().to_string().contains("compilation failed"));
  let state = env.history().load(&work.identity).unwrap().unwrap();
  assert!(!state.successful);

  work.set_failing(false);
  let retried = env.engine.execute(&work).unwrap();

  assert_eq!(retried.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
  assert_eq!(retried.execution_reasons, vec!["Previous execution failed.".to_string()]);
  assert!(env.history().load(&work.identity).unwrap().unwrap().successful);
}

#[test]
fn identities_are_isolated() {
  let env = TestEnv::new();
  let works: Vec<_> = ["a", "b", "c", "d"]
    .iter()
    .map(|name| {
      env.write_file(&format!("src/{}/Main.java", name), &format!("class {} {{}}", name));
      env.compile_work(name)
    })
    .collect();

  thread::scope(|scope| {
    for work in &works {
      let engine = &env.engine;
      scope.spawn(move || {
        let result = engine.execute(work).unwrap();
        assert_eq!(result.outcome(), Some(ExecutionOutcome::ExecutedNonIncrementally));
      });
    }
  });

  fs::remove_file(env.path("src/a/Main.java")).unwrap();
  env.engine.execute(&works[0]).unwrap();

  assert!(env.history().load(&works[0].identity).unwrap().is_none());
  for work in &works[1..] {
    assert!(env.history().load(&work.identity).unwrap().is_some());
    assert!(work.classes.join("Main.class").exists());
  }
}

#[test]
fn same_identity_concurrent_runs_execute_once() {
  let env = TestEnv::new();
  let work = env.compile_work("app");
  env.write_file("src/app/A.java", "class A {}");

  thread::scope(|scope| {
    for _ in 0..4 {
      let (engine, work) = (&env.engine, &work);
      scope.spawn(move || engine.execute(work).unwrap());
    }
  });

  assert_eq!(work.executions(), 1);
}
