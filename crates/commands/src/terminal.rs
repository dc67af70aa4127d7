//! Terminal settings and actions.
//!
//! These only flip session-state flags; the connected client consumes
//! them when rendering.

use serde_json::json;

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

async fn clear(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    ctx.set_client_data("clear", json!(true))?;
    Ok(Response::ok(""))
}

async fn color_enable(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    ctx.set_client_data("color", json!(true))?;
    Ok(Response::ok("Color output enabled."))
}

async fn color_disable(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    ctx.set_client_data("color", json!(false))?;
    Ok(Response::ok("Color output disabled."))
}

/// Build the `terminal` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("terminal", "Terminal settings and actions")?
        .rule("clear", "Clear the terminal", clear)?
        .rule("color enable", "Enable colors in command output", color_enable)?
        .rule(
            "color disable",
            "Disable colors in command output",
            color_disable,
        )?)
}
