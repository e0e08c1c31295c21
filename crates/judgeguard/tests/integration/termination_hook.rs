use judgeguard::{Config, Outcome};

use super::{Mode, run_command, run_scenario, scenario_command};

#[test]
fn test_return_value_becomes_exit_code() {
    let (outcome, output) = run_scenario(Mode::Hook, "return-seven");
    assert_eq!(outcome, Outcome::Exited(7));
    // Flushed at exit even though main returned normally
    assert_eq!(String::from_utf8_lossy(&output.stdout), "answer\n");
}

#[test]
fn test_out_of_memory_raises_resource_signal() {
    let (outcome, _) = run_scenario(Mode::Hook, "out-of-memory");
    assert_eq!(outcome, Outcome::ResourceExhaustion);
}

#[test]
fn test_runtime_error_raises_other_signal() {
    let (outcome, output) = run_scenario(Mode::Hook, "runtime-error");
    assert_eq!(outcome, Outcome::OtherFailure);

    // The previous hook still prints the panic message
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("panicked"));
}

#[test]
fn test_nested_unstructured_failure_raises_other_signal() {
    let (outcome, _) = run_scenario(Mode::Hook, "nested-unstructured");
    assert_eq!(outcome, Outcome::OtherFailure);
}

#[test]
fn test_worker_thread_panic_raises_other_signal() {
    let (outcome, _) = run_scenario(Mode::Hook, "thread-panic");
    assert_eq!(outcome, Outcome::OtherFailure);
}

#[test]
fn test_racing_failures_terminate_once() {
    for _ in 0..5 {
        let (outcome, _) = run_scenario(Mode::Hook, "racing-failures");
        assert_eq!(outcome, Outcome::OtherFailure);
    }
}

#[test]
fn test_catch_local_keeps_process_alive() {
    let (outcome, _) = run_scenario(Mode::Hook, "caught-locally");
    assert_eq!(outcome, Outcome::Exited(3));
}

#[test]
fn test_terminate_without_failure_exits_quietly() {
    let (outcome, output) = run_scenario(Mode::Hook, "terminate");
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "before terminate\n");
}

#[test]
fn test_error_result_exits_one() {
    let (outcome, _) = run_scenario(Mode::Hook, "result-error");
    assert_eq!(outcome, Outcome::Exited(1));
}

#[test]
fn test_second_install_is_a_no_op() {
    let (outcome, output) = run_scenario(Mode::Hook, "install-twice");
    assert_eq!(outcome, Outcome::OtherFailure);

    // Chaining the hook twice would print the panic message twice
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("panicked").count(), 1, "stderr: {stderr}");
}

#[test]
fn test_bare_catch_unwind_is_not_a_local_handler() {
    let (outcome, output) = run_scenario(Mode::Hook, "caught-by-catch-unwind");
    assert_eq!(outcome, Outcome::OtherFailure);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_disabled_desync_writes_through() {
    let mut command = scenario_command(Mode::Hook, "buffered-line");
    command.env("JUDGEGUARD_STDIO__DESYNC", "false");

    let (outcome, output) = run_command(command, &Config::default());
    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "line\n");
}
