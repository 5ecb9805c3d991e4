mod common;

use std::rc::Rc;

use arbor::{
    describe, err_msg, ErrorType, ExampleResult, FailureCause, Group, HookScope, Phase,
    ReporterEvent, Value,
};

use common::{entries, log, push, run, Log};

/// Two levels, every hook kind, one example per level.
fn instrumented(trace: &Log) -> Group {
    let trace = Rc::clone(trace);
    describe("outer", move |g| {
        g.before(HookScope::All, push(&trace, "outer before all"));
        g.before(HookScope::Each, push(&trace, "outer before each"));
        let around = push(&trace, "outer around");
        g.around(move |scope, example| {
            around(scope)?;
            example.run(scope)
        });
        g.after(HookScope::Each, push(&trace, "outer after each"));
        g.after(HookScope::All, push(&trace, "outer after all"));
        g.it("first", push(&trace, "outer example"));

        let inner = Rc::clone(&trace);
        g.describe("inner", move |g| {
            g.before(HookScope::All, push(&inner, "inner before all"));
            g.before(HookScope::Each, push(&inner, "inner before each"));
            let around = push(&inner, "inner around");
            g.around(move |scope, example| {
                around(scope)?;
                example.run(scope)
            });
            g.after(HookScope::Each, push(&inner, "inner after each"));
            g.after(HookScope::All, push(&inner, "inner after all"));
            g.it("second", push(&inner, "inner example"));
            Ok(())
        })?;
        Ok(())
    })
    .unwrap()
}

#[test]
fn test_hook_order_across_levels() {
    let trace = log();
    let root = instrumented(&trace);
    let (summary, _) = run(&root);

    assert!(summary.success());
    assert_eq!(
        entries(&trace),
        [
            "outer before all",
            "outer before each",
            "outer around",
            "outer example",
            "outer after each",
            "inner before all",
            "outer before each",
            "inner before each",
            "outer around",
            "inner around",
            "inner example",
            "inner after each",
            "outer after each",
            "inner after all",
            "outer after all",
        ]
    );
}

#[test]
fn test_reporter_notifications_bracket_each_example() {
    let root = instrumented(&log());
    let (_, reporter) = run(&root);

    let events: Vec<String> = reporter
        .events
        .iter()
        .map(|event| match event {
            ReporterEvent::GroupStarted(name) => format!("group+ {name}"),
            ReporterEvent::GroupFinished(name) => format!("group- {name}"),
            ReporterEvent::ExampleStarted(name) => format!("start {name}"),
            ReporterEvent::ExampleFinished(name, result) => {
                format!("finish {name} {}", result.label())
            }
            ReporterEvent::HookFailed(name, _) => format!("hook {name}"),
        })
        .collect();
    assert_eq!(
        events,
        [
            "group+ outer",
            "start outer first",
            "finish outer first passed",
            "group+ outer inner",
            "start outer inner second",
            "finish outer inner second passed",
            "group- outer inner",
            "group- outer",
        ]
    );
}

#[test]
fn test_failing_body_still_runs_after_each() {
    let trace = log();
    let root = describe("cleanup", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.after(HookScope::Each, push(&trace, "after each"));
            g.it("fails", |_| Err(err_msg!(Execution, "expected 1, got 2")));
            g.it("panics", |_| {
                assert_eq!(1, 2, "numbers differ");
                Ok(())
            });
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert_eq!(summary.failed, 2);
    assert_eq!(entries(&trace), ["after each", "after each"]);

    let failure = reporter.result_of("cleanup fails").and_then(ExampleResult::failure).unwrap();
    assert_eq!(failure.message, "expected 1, got 2");
    assert_eq!(failure.cause, FailureCause::Error(ErrorType::Execution));
    assert!(failure.hook.is_none());

    let failure = reporter.result_of("cleanup panics").and_then(ExampleResult::failure).unwrap();
    assert_eq!(failure.cause, FailureCause::Panic);
    assert!(failure.message.contains("numbers differ"));
}

#[test]
fn test_before_each_failure_skips_the_rest_but_not_cleanup() {
    let trace = log();
    let root = describe("setup", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.before(HookScope::Each, |_| Err::<(), _>(err_msg!(Hook, "no database")));
            g.before(HookScope::Each, push(&trace, "second before each"));
            g.after(HookScope::Each, push(&trace, "after each"));
            g.it("needs a database", push(&trace, "body"));
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert_eq!(summary.hook_failed, 1);
    assert_eq!(entries(&trace), ["after each"]);

    let Some(ExampleResult::HookFailed(failure)) = reporter.result_of("setup needs a database")
    else {
        panic!("expected a hook failure");
    };
    let site = failure.hook.as_ref().unwrap();
    assert_eq!((site.phase, site.scope), (Phase::Before, HookScope::Each));
    assert_eq!(site.group, "setup");
}

#[test]
fn test_before_all_failure_fails_the_whole_subtree() {
    let trace = log();
    let root = describe("top", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.before(HookScope::All, |_| Err::<(), _>(err_msg!(Hook, "cannot boot")));
            g.before(HookScope::Each, push(&trace, "before each"));
            g.after(HookScope::All, push(&trace, "top after all"));
            g.it("a", push(&trace, "a"));
            let nested = Rc::clone(&trace);
            g.describe("nested", move |g| {
                g.before(HookScope::All, push(&nested, "nested before all"));
                g.after(HookScope::All, push(&nested, "nested after all"));
                g.it("b", push(&nested, "b"));
                Ok(())
            })?;
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert!(!summary.success());
    assert_eq!(summary.hook_failed, 2);
    assert_eq!(entries(&trace), ["top after all"]);

    for name in ["top a", "top nested b"] {
        let Some(ExampleResult::HookFailed(failure)) = reporter.result_of(name) else {
            panic!("{name} should have failed in before(all)");
        };
        assert_eq!(failure.message, "cannot boot");
        let site = failure.hook.as_ref().unwrap();
        assert_eq!((site.phase, site.scope), (Phase::Before, HookScope::All));
    }
    assert!(reporter
        .events
        .contains(&ReporterEvent::ExampleStarted("top nested b".to_string())));
}

#[test]
fn test_after_each_failure_flips_a_passing_example() {
    let root = describe("teardown", |g| {
        g.after(HookScope::Each, |_| Err::<(), _>(err_msg!(Hook, "leaked handle")));
        g.it("passes", |_| Ok(()));
        g.it("fails", |_| Err(err_msg!(Execution, "wrong answer")));
        Ok(())
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert_eq!(summary.hook_failed, 1);
    assert_eq!(summary.failed, 1);

    let Some(ExampleResult::HookFailed(failure)) = reporter.result_of("teardown passes") else {
        panic!("expected the passing example to be flipped");
    };
    assert_eq!(failure.message, "leaked handle");

    let Some(ExampleResult::Failed(failure)) = reporter.result_of("teardown fails") else {
        panic!("expected the body failure to be kept");
    };
    assert_eq!(failure.message, "wrong answer");
    assert_eq!(reporter.hook_failures().len(), 1);
    assert_eq!(summary.hook_failures.len(), 1);
}

#[test]
fn test_after_all_failure_goes_to_the_diagnostic_channel() {
    let trace = log();
    let root = describe("suite", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.after(HookScope::All, |_| Err::<(), _>(err_msg!(Hook, "cannot shut down")));
            g.after(HookScope::All, push(&trace, "second after all"));
            g.it("works", |_| Ok(()));
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert!(summary.success());
    assert_eq!(summary.passed, 1);
    assert_eq!(entries(&trace), ["second after all"]);

    let failures = reporter.hook_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "cannot shut down");
    assert_eq!(summary.hook_failures, vec![failures[0].clone()]);
}

#[test]
fn test_around_hook_that_never_runs_skips_body_and_after_each() {
    let trace = log();
    let root = describe("gate", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.around(|_, _| Ok(()));
            g.after(HookScope::Each, push(&trace, "after each"));
            g.it("never reached", push(&trace, "body"));
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root);
    assert!(summary.success());
    assert_eq!(summary.skipped, 1);
    assert_eq!(reporter.result_of("gate never reached"), Some(&ExampleResult::Skipped));
    assert!(entries(&trace).is_empty());
}

#[test]
fn test_after_each_runs_inside_the_around_hooks() {
    let trace = log();
    let root = describe("wrapped", {
        let trace = Rc::clone(&trace);
        move |g| {
            let enter = push(&trace, "around enter");
            let leave = push(&trace, "around leave");
            g.around(move |scope, example| {
                enter(scope)?;
                example.run(scope)?;
                leave(scope)
            });
            g.after(HookScope::Each, push(&trace, "after each"));
            g.it("runs", push(&trace, "body"));
            Ok(())
        }
    })
    .unwrap();

    let (summary, _) = run(&root);
    assert!(summary.success());
    assert_eq!(
        entries(&trace),
        ["around enter", "body", "after each", "around leave"]
    );
}

#[test]
fn test_inner_gate_only_skips_after_each_hooks_inside_it() {
    let trace = log();
    let root = describe("outer", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.around(|scope, example| example.run(scope));
            g.after(HookScope::Each, push(&trace, "outer after each"));
            let inner = Rc::clone(&trace);
            g.describe("inner", move |g| {
                g.around(|_, _| Ok(()));
                g.after(HookScope::Each, push(&inner, "inner after each"));
                g.it("gated", push(&inner, "body"));
                Ok(())
            })?;
            Ok(())
        }
    })
    .unwrap();

    let (summary, _) = run(&root);
    assert_eq!(summary.skipped, 1);
    assert!(entries(&trace).is_empty());
}

#[test]
fn test_running_a_nested_group_applies_its_ancestors() {
    let trace = log();
    let root = describe("service", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.before(HookScope::All, |scope| {
                scope.set("db", "up");
                Ok(())
            });
            g.before(HookScope::Each, |scope| {
                scope.set("conn", "open");
                Ok(())
            });
            let around = push(&trace, "service around");
            g.around(move |scope, example| {
                around(scope)?;
                example.run(scope)
            });
            g.after(HookScope::Each, push(&trace, "service after each"));
            g.after(HookScope::All, push(&trace, "service after all"));
            g.define_let("port", |_| Ok(8080_u32));
            g.it("is not selected", push(&trace, "service example"));

            let inner = Rc::clone(&trace);
            g.describe("client", move |g| {
                g.before(HookScope::Each, push(&inner, "client before each"));
                g.it("connects", |scope| {
                    assert_eq!(scope.get("db"), Some(&Value::from("up")));
                    assert_eq!(scope.get("conn"), Some(&Value::from("open")));
                    assert_eq!(*scope.let_value::<u32>("port")?, 8080);
                    Ok(())
                });
                Ok(())
            })?;
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root.children()[0]);
    assert!(summary.success(), "{:?}", reporter.events);
    assert_eq!(summary.total(), 1);
    assert_eq!(
        entries(&trace),
        [
            "client before each",
            "service around",
            "service after each",
            "service after all",
        ]
    );
    assert_eq!(reporter.result_of("service client connects"), Some(&ExampleResult::Passed));
}

#[test]
fn test_ancestor_before_all_failure_fails_a_nested_run() {
    let trace = log();
    let root = describe("service", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.before(HookScope::All, |_| Err::<(), _>(err_msg!(Hook, "no network")));
            g.after(HookScope::All, push(&trace, "service after all"));
            let inner = Rc::clone(&trace);
            g.describe("client", move |g| {
                g.before(HookScope::All, push(&inner, "client before all"));
                g.it("connects", push(&inner, "body"));
                Ok(())
            })?;
            Ok(())
        }
    })
    .unwrap();

    let (summary, reporter) = run(&root.children()[0]);
    assert_eq!(summary.hook_failed, 1);
    assert_eq!(entries(&trace), ["service after all"]);
    let Some(ExampleResult::HookFailed(failure)) = reporter.result_of("service client connects")
    else {
        panic!("expected the ancestor's before(all) failure");
    };
    assert_eq!(failure.message, "no network");
    assert_eq!(failure.hook.as_ref().map(|s| s.group.as_str()), Some("service"));
}

#[test]
fn test_around_hook_cannot_run_the_example_twice() {
    let trace = log();
    let root = describe("greedy", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.around(|scope, example| {
                example.run(scope)?;
                example.run(scope)
            });
            g.it("runs once", push(&trace, "body"));
            Ok(())
        }
    })
    .unwrap();

    let (_, reporter) = run(&root);
    assert_eq!(entries(&trace), ["body"]);
    let Some(ExampleResult::HookFailed(failure)) = reporter.result_of("greedy runs once") else {
        panic!("expected a hook failure");
    };
    assert!(failure.message.contains("more than once"));
    assert_eq!(failure.hook.as_ref().map(|s| s.phase), Some(Phase::Around));
}

#[test]
fn test_body_failure_wins_over_around_failure() {
    let root = describe("layers", |g| {
        g.around(|scope, example| example.run(scope));
        g.it("fails inside", |_| Err(err_msg!(Execution, "body broke")));
        Ok(())
    })
    .unwrap();

    let (_, reporter) = run(&root);
    let Some(ExampleResult::Failed(failure)) = reporter.result_of("layers fails inside") else {
        panic!("expected the body failure");
    };
    assert_eq!(failure.message, "body broke");
}

#[test]
fn test_hooks_from_empty_subtrees_never_run() {
    let trace = log();
    let root = describe("root", {
        let trace = Rc::clone(&trace);
        move |g| {
            g.it("only example", |_| Ok(()));
            let empty = Rc::clone(&trace);
            g.describe("empty", move |g| {
                g.before(HookScope::All, push(&empty, "empty before all"));
                g.after(HookScope::All, push(&empty, "empty after all"));
                Ok(())
            })?;
            Ok(())
        }
    })
    .unwrap();

    let (summary, _) = run(&root);
    assert_eq!(summary.total(), 1);
    assert!(entries(&trace).is_empty());
}
