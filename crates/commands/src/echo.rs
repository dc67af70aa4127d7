//! Echoes back things.

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

async fn echo(_ctx: Context, args: Args) -> anyhow::Result<Response> {
    Ok(Response::ok(args.rest(0).join(" ")))
}

/// Build the `echo` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("echo", "Echoes back things")?.rule(
        "[...]",
        "Echoes back whatever the user says",
        echo,
    )?)
}
