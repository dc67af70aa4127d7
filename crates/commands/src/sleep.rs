//! Just sleep.

use std::time::Duration;

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

async fn sleep(_ctx: Context, args: Args) -> anyhow::Result<Response> {
    let raw = args.str(0);
    let secs: f64 = match raw.parse() {
        Ok(secs) if secs >= 0.0 => secs,
        _ => {
            return Ok(Response::error(format!(
                "'{raw}' is not a non-negative number of seconds."
            )))
        }
    };
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    Ok(Response::ok(""))
}

/// Build the `sleep` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("sleep", "Just sleep")?.rule(
        "[sec]",
        "Sleep for [sec] seconds.",
        sleep,
    )?)
}
