//! End-to-end dispatch tests: routing, nesting, locking, deadlines.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use textline_engine::{
    CommandRegistry, CommandSpec, Context, Error, Response, SessionState, Store,
};

struct Harness {
    _dir: tempfile::TempDir,
    registry: Arc<CommandRegistry>,
    store: Store,
}

impl Harness {
    fn new(build: impl FnOnce(&mut CommandRegistry)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.json")).unwrap();
        let mut registry = CommandRegistry::new();
        build(&mut registry);
        Harness {
            _dir: dir,
            registry: Arc::new(registry),
            store,
        }
    }

    fn context(&self) -> Context {
        Context::new(
            Arc::clone(&self.registry),
            self.store.clone(),
            SessionState::new(),
        )
    }
}

#[tokio::test]
async fn greeter_receives_the_variadic_tail() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("greeter", "Greets")
                    .unwrap()
                    .rule("[...]", "Echo the arguments", |_ctx, args| async move {
                        Ok(Response::ok(args.rest(0).join(" ")))
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut ctx = harness.context();
    let rsp = ctx.run_command("greeter hello world").await.unwrap();
    assert!(!rsp.is_error);
    assert_eq!(rsp.message, "hello world");
}

#[tokio::test]
async fn unknown_command_names_the_culprit() {
    let harness = Harness::new(|_| {});
    let mut ctx = harness.context();
    let rsp = ctx.run_command("foo").await.unwrap();
    assert!(rsp.is_error);
    assert!(rsp.message.contains("not found"));
    assert!(rsp.message.contains("foo"));
}

#[tokio::test]
async fn self_invocation_is_fatal_not_a_response() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("loopy", "")
                    .unwrap()
                    .rule("", "", |mut ctx: Context, _| async move {
                        // Bubbling the dispatcher error through anyhow must
                        // still abort the request, not become a response.
                        let rsp = ctx.run_command("loopy").await?;
                        Ok(rsp)
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut ctx = harness.context();
    let err = ctx.run_command("loopy").await.unwrap_err();
    assert!(matches!(err, Error::SelfInvocation { namespace } if namespace == "loopy"));
}

#[tokio::test]
async fn handler_fault_becomes_tagged_error_response() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("crashy", "")
                    .unwrap()
                    .rule("", "", |ctx: Context, _| async move {
                        // Missing key without default is a handler fault.
                        let value = ctx.data("never-set")?;
                        Ok(Response::ok_with("", value))
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut ctx = harness.context();
    let rsp = ctx.run_command("crashy").await.unwrap();
    assert!(rsp.is_error);
    assert!(rsp.message.contains("crashy"));
    assert!(rsp.message.contains("key not found"));
}

#[tokio::test]
async fn nested_invocation_shares_session_but_not_namespace() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("outer", "")
                    .unwrap()
                    .rule("", "", |mut ctx: Context, _| async move {
                        ctx.set_client_data("mark", json!("outer"))?;
                        ctx.set_data("where", json!("outer-store"))?;
                        let inner = ctx.run_command("inner").await?;
                        // Session state written by the nested command is
                        // visible to the caller through the shared handle.
                        let seen = ctx.session().get("inner", "mark");
                        Ok(Response::ok_with(inner.message, seen.unwrap_or(json!(null))))
                    })
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                CommandSpec::new("inner", "")
                    .unwrap()
                    .rule("", "", |ctx: Context, _| async move {
                        ctx.set_client_data("mark", json!("inner"))?;
                        // The nested context scopes storage to its own
                        // namespace; the outer command's key is invisible.
                        let outer_key = ctx.data("where");
                        assert!(outer_key.is_err());
                        ctx.set_data("where", json!("inner-store"))?;
                        Ok(Response::ok("nested-done"))
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut ctx = harness.context();
    let rsp = ctx.run_command("outer").await.unwrap();
    assert!(!rsp.is_error, "{}", rsp.message);
    assert_eq!(rsp.message, "nested-done");
    assert_eq!(rsp.value, Some(json!("inner")));

    // Each namespace kept its own storage slice.
    assert_eq!(
        harness.store.get("outer", "where").unwrap(),
        json!("outer-store")
    );
    assert_eq!(
        harness.store.get("inner", "where").unwrap(),
        json!("inner-store")
    );
}

#[tokio::test]
async fn deadline_abandons_but_does_not_cancel_the_handler() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("slowpoke", "")
                    .unwrap()
                    .rule("", "", |ctx: Context, _| async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ctx.set_data("late-effect", json!(true))?;
                        Ok(Response::ok("finally"))
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut ctx = harness.context();
    let rsp = ctx
        .run_command_with_deadline("slowpoke", Duration::from_millis(5))
        .await
        .unwrap();
    assert!(rsp.is_error);
    assert!(rsp.message.contains("timed out"));

    // The lock is already released, yet the abandoned handler still runs
    // to completion and its store effect lands afterwards.
    assert_eq!(harness.store.pending_acquisitions(), 0);
    assert!(harness.store.get("slowpoke", "late-effect").is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.store.get("slowpoke", "late-effect").unwrap(),
        json!(true)
    );
}

#[tokio::test]
async fn same_namespace_requests_never_lose_updates() {
    let harness = Harness::new(|registry| {
        registry
            .register(
                CommandSpec::new("counter", "")
                    .unwrap()
                    .rule("bump", "", |ctx: Context, _| async move {
                        let n = ctx.data_or_init("n", json!(0))?.as_i64().unwrap_or(0);
                        // Yield between read and write; without the
                        // namespace lock this interleaves and drops one.
                        tokio::task::yield_now().await;
                        ctx.set_data("n", json!(n + 1))?;
                        Ok(Response::default())
                    })
                    .unwrap(),
            )
            .unwrap();
    });

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let mut ctx = harness.context();
        tasks.push(tokio::spawn(async move {
            ctx.run_command("counter bump").await.unwrap()
        }));
    }
    for task in tasks {
        let rsp = task.await.unwrap();
        assert!(!rsp.is_error);
    }

    assert_eq!(harness.store.get("counter", "n").unwrap(), json!(2));
}

#[tokio::test]
async fn different_namespaces_run_concurrently() {
    // Both handlers park on a shared barrier, so the test only completes
    // if neither namespace waits on the other's lock.
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let harness = Harness::new(|registry| {
        for name in ["alpha", "beta"] {
            let barrier = Arc::clone(&barrier);
            registry
                .register(
                    CommandSpec::new(name, "")
                        .unwrap()
                        .rule("", "", move |_ctx, _| {
                            let barrier = Arc::clone(&barrier);
                            async move {
                                barrier.wait().await;
                                Ok(Response::default())
                            }
                        })
                        .unwrap(),
                )
                .unwrap();
        }
    });

    let mut ctx_a = harness.context();
    let mut ctx_b = harness.context();
    let (a, b) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(2), ctx_a.run_command("alpha")),
        tokio::time::timeout(Duration::from_secs(2), ctx_b.run_command("beta")),
    );
    assert!(!a.expect("alpha blocked").unwrap().is_error);
    assert!(!b.expect("beta blocked").unwrap().is_error);
}
