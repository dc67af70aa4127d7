//! Email settings management.

use std::fmt::Write as _;

use serde_json::{json, Value};

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

use crate::login::LoginUtils;

async fn set(mut ctx: Context, args: Args) -> anyhow::Result<Response> {
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    let Some(user) = utils.logged_in_user(&mut ctx).await? else {
        return Ok(utils.not_logged_in());
    };

    let address = args.str(0).to_string();
    let mut addresses = ctx.data_or_init("addresses", json!({}))?;
    if let Value::Object(map) = &mut addresses {
        map.insert(user, Value::String(address.clone()));
    }
    ctx.set_data("addresses", addresses)?;
    Ok(Response::ok_with(
        format!("Changed email address to '{address}'."),
        Value::String(address),
    ))
}

async fn unset(mut ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    let Some(user) = utils.logged_in_user(&mut ctx).await? else {
        return Ok(utils.not_logged_in());
    };

    let mut addresses = ctx.data_or_init("addresses", json!({}))?;
    if let Value::Object(map) = &mut addresses {
        map.remove(&user);
    }
    ctx.set_data("addresses", addresses)?;
    Ok(Response::ok_with(
        format!("Unset email address for user '{user}'."),
        Value::String(user),
    ))
}

async fn list(mut ctx: Context, args: Args) -> anyhow::Result<Response> {
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    if utils.logged_in_user(&mut ctx).await?.is_none() {
        return Ok(utils.not_logged_in());
    }

    let addresses = ctx.data_or_init("addresses", json!({}))?;
    let mut resolved: Vec<(String, String)> = Vec::new();
    let mut unresolved: Vec<String> = Vec::new();
    for user in args.str(0).split(',') {
        let user = user.trim();
        match addresses.get(user).and_then(Value::as_str) {
            Some(address) => resolved.push((user.to_string(), address.to_string())),
            None => unresolved.push(user.to_string()),
        }
    }

    let mut out = String::new();
    if !resolved.is_empty() {
        out.push_str("Resolved email addresses:\nUser\t\tAddress\n");
        for (user, address) in &resolved {
            let _ = writeln!(out, "{user}\t\t{address}");
        }
    }
    if !unresolved.is_empty() {
        if !resolved.is_empty() {
            out.push('\n');
        }
        out.push_str("Unresolved email addresses:\n");
        out.push_str(&unresolved.join(", "));
    }
    Ok(Response::ok_with(
        out.trim_end().to_string(),
        json!({"resolved": resolved, "unresolved": unresolved}),
    ))
}

/// Build the `email` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("email", "Email settings management")?
        .rule(
            "set [address]",
            "Configure an email address for notifications",
            set,
        )?
        .rule("unset", "Unset a previously configured email address", unset)?
        .rule(
            "list [users]",
            "List email addresses for a comma-separated list of [users]",
            list,
        )?)
}
