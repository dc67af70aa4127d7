//! Global command listing.
//!
//! Per-command help is answered reflectively by the dispatcher; this
//! command only covers the registry-wide overview.

use std::fmt::Write as _;

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

async fn general_help(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let mut out = String::from("Available commands:\n");
    for spec in ctx.registry().list() {
        let _ = writeln!(out, "    {}: {}", spec.name(), spec.doc());
    }
    Ok(Response::ok(out.trim_end().to_string()))
}

/// Build the `help` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("help", "Helping people help themselves")?.rule(
        "",
        "Shows the list of all commands available",
        general_help,
    )?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use textline_engine::{CommandRegistry, SessionState, Store};

    use super::*;

    #[tokio::test]
    async fn lists_every_command_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.json")).unwrap();
        let mut registry = CommandRegistry::new();
        crate::register_all(&mut registry).unwrap();
        let mut ctx = Context::new(Arc::new(registry), store, SessionState::new());

        let rsp = ctx.run_command("help").await.unwrap();
        assert!(!rsp.is_error);
        assert!(rsp.message.starts_with("Available commands:"));
        let cdata_at = rsp.message.find("cdata:").unwrap();
        let login_at = rsp.message.find("login: User account management").unwrap();
        let terminal_at = rsp.message.find("terminal:").unwrap();
        assert!(cdata_at < login_at && login_at < terminal_at);
    }
}
