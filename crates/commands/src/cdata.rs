//! Session-state inspection.

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

async fn show(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let snapshot = ctx.session().snapshot();
    let value = serde_json::to_value(&snapshot)?;
    Ok(Response::ok_with(serde_json::to_string(&value)?, value))
}

async fn clear(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    ctx.delete_all_client_data()?;
    Ok(Response::ok("Client data succesfully cleared."))
}

/// Build the `cdata` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("cdata", "Manage client data")?
        .rule("", "Show client data", show)?
        .rule("clear", "Clear all client data", clear)?)
}
