//! Serious business fika management.
//!
//! A host runs at most one open session at a time, keyed by username
//! under the store key `sessions`. Ending a session with participants
//! is two-phase: the first `fika end` stores a confirmation flag in
//! session state and prints the details, the second transfers one
//! balance unit per participant to the host and appends the session to
//! `history`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

use crate::login::LoginUtils;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FikaSession {
    start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,
    participants: Vec<String>,
    /// Only present on history entries; open sessions are keyed by host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
}

type Sessions = BTreeMap<String, FikaSession>;

fn load_sessions(ctx: &Context) -> anyhow::Result<Sessions> {
    Ok(serde_json::from_value(
        ctx.data_or_init("sessions", json!({}))?,
    )?)
}

fn store_sessions(ctx: &Context, sessions: &Sessions) -> anyhow::Result<()> {
    ctx.set_data("sessions", serde_json::to_value(sessions)?)?;
    Ok(())
}

fn load_balances(ctx: &Context) -> anyhow::Result<BTreeMap<String, i64>> {
    Ok(serde_json::from_value(
        ctx.data_or_init("balances", json!({}))?,
    )?)
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn session_string(session: &FikaSession, host: &str, indent_level: usize) -> String {
    let mut out = format!("Host: {host}\n");
    let _ = writeln!(out, "started at {}", format_date(&session.start_date));
    if let Some(end_date) = &session.end_date {
        let _ = writeln!(out, "ended at {}", format_date(end_date));
    }
    let mut participants = vec![format!("{host} (host)")];
    participants.extend(session.participants.iter().cloned());
    let _ = writeln!(out, "Participants: {}", participants.join(", "));

    let indent = "    ".repeat(indent_level);
    if indent_level > 0 {
        out = out.replace('\n', &format!("\n{indent}"));
    }
    format!("{indent}{}", out.trim_end())
}

async fn login_user(ctx: &mut Context) -> anyhow::Result<Result<String, Response>> {
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    match utils.logged_in_user(ctx).await? {
        Some(user) => Ok(Ok(user)),
        None => Ok(Err(utils.not_logged_in())),
    }
}

async fn status(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let sessions = load_sessions(&ctx)?;
    if sessions.is_empty() {
        return Ok(Response::ok(
            "There are currently no fika sessions being hosted",
        ));
    }
    let mut out = String::from("Currently open fika sessions:\n");
    for (host, session) in &sessions {
        out.push_str(&session_string(session, host, 1));
        out.push_str("\n\n");
    }
    Ok(Response::ok(out.trim_end().to_string()))
}

async fn start(mut ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let user = match login_user(&mut ctx).await? {
        Ok(user) => user,
        Err(rsp) => return Ok(rsp),
    };

    let mut sessions = load_sessions(&ctx)?;
    if sessions.contains_key(&user) {
        return Ok(Response::error(
            "You already have a fika session under your name. Please end it first.",
        ));
    }
    sessions.insert(
        user.clone(),
        FikaSession {
            start_date: Utc::now(),
            end_date: None,
            participants: Vec::new(),
            host: None,
        },
    );
    store_sessions(&ctx, &sessions)?;
    ctx.delete_client_data("reallyEnd")?;
    Ok(Response::ok(format!(
        "Session started!\n\
         Tell people in your fika to login and run the 'fika join {user}' command."
    )))
}

async fn end(mut ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let user = match login_user(&mut ctx).await? {
        Ok(user) => user,
        Err(rsp) => return Ok(rsp),
    };

    let mut sessions = load_sessions(&ctx)?;
    let Some(session) = sessions.get(&user).cloned() else {
        return Ok(Response::error(
            "You are not currently hosting a fika session",
        ));
    };

    if session.participants.is_empty() {
        sessions.remove(&user);
        store_sessions(&ctx, &sessions)?;
        return Ok(Response::ok(
            "Session ended!\n\
             Since your fika session had no participants, it was not logged \
             and no funds transfer took place.",
        ));
    }

    if ctx.client_data("reallyEnd")?.is_none() {
        ctx.set_client_data("reallyEnd", json!(true))?;
        return Ok(Response::ok(format!(
            "After you end a session, funds will be transferred and it will \
             be added to the history.\n\
             Warning: ending a session is an irreversible action.\n\
             To really end this session, please confirm the details below \
             and run the 'fika end' command again:\n\n{}",
            session_string(&session, &user, 1)
        )));
    }
    ctx.delete_client_data("reallyEnd")?;

    let mut balances = load_balances(&ctx)?;
    let mut total = 0i64;
    for participant in &session.participants {
        *balances.entry(participant.clone()).or_insert(0) -= 1;
        *balances.entry(user.clone()).or_insert(0) += 1;
        total += 1;
    }

    let mut history: Vec<FikaSession> =
        serde_json::from_value(ctx.data_or_init("history", json!([]))?)?;
    let mut logged = session;
    logged.host = Some(user.clone());
    logged.end_date = Some(Utc::now());
    history.push(logged.clone());
    sessions.remove(&user);

    store_sessions(&ctx, &sessions)?;
    ctx.set_data("history", serde_json::to_value(&history)?)?;
    ctx.set_data("balances", serde_json::to_value(&balances)?)?;

    Ok(Response::ok(format!(
        "Session ended! Your balance has increased by {total}.\n\
         This is the session as it has been logged to the history:\n\n{}",
        session_string(&logged, &user, 1)
    )))
}

async fn join(mut ctx: Context, args: Args) -> anyhow::Result<Response> {
    let user = match login_user(&mut ctx).await? {
        Ok(user) => user,
        Err(rsp) => return Ok(rsp),
    };
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    let Some(host) = utils.user_exists(&mut ctx, args.str(0)).await? else {
        return Ok(utils.unknown_user());
    };

    if user == host {
        return Ok(Response::error("You cannot join your own fika session"));
    }
    let mut sessions = load_sessions(&ctx)?;
    let Some(session) = sessions.get_mut(&host) else {
        return Ok(Response::error(format!(
            "User {host} is not currently hosting a fika session"
        )));
    };
    if session.participants.contains(&user) {
        return Ok(Response::error(format!(
            "You are already in the fika session hosted by {host}"
        )));
    }
    session.participants.push(user);
    store_sessions(&ctx, &sessions)?;
    Ok(Response::ok(format!(
        "You joined the fika session hosted by {host}!"
    )))
}

async fn leave(mut ctx: Context, args: Args) -> anyhow::Result<Response> {
    let user = match login_user(&mut ctx).await? {
        Ok(user) => user,
        Err(rsp) => return Ok(rsp),
    };
    let utils = ctx.registry().utils::<LoginUtils>("login")?;
    let Some(host) = utils.user_exists(&mut ctx, args.str(0)).await? else {
        return Ok(utils.unknown_user());
    };

    if user == host {
        return Ok(Response::error(
            "You cannot leave your own fika session, end it instead",
        ));
    }
    let mut sessions = load_sessions(&ctx)?;
    let Some(session) = sessions.get_mut(&host) else {
        return Ok(Response::error(format!(
            "User {host} is not currently hosting a fika session"
        )));
    };
    let Some(position) = session.participants.iter().position(|p| p == &user) else {
        return Ok(Response::error(format!(
            "You are not part of the fika session hosted by {host}"
        )));
    };
    session.participants.remove(position);
    store_sessions(&ctx, &sessions)?;
    Ok(Response::ok(format!(
        "You left the fika session hosted by {host}!"
    )))
}

async fn leave_list(mut ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let user = match login_user(&mut ctx).await? {
        Ok(user) => user,
        Err(rsp) => return Ok(rsp),
    };

    let sessions = load_sessions(&ctx)?;
    let mine: Vec<_> = sessions
        .iter()
        .filter(|(_, session)| session.participants.contains(&user))
        .collect();
    if mine.is_empty() {
        return Ok(Response::ok(
            "You are not currently part of any fika sessions",
        ));
    }
    let mut out = String::from("Fika sessions you are currently a part of:\n");
    for (host, session) in mine {
        let _ = writeln!(
            out,
            "    {host}: started at {}",
            format_date(&session.start_date)
        );
    }
    Ok(Response::ok(out.trim_end().to_string()))
}

async fn next(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let balances = load_balances(&ctx)?;
    // Lowest balance hosts next; ties break alphabetically.
    let mut next_list: Vec<(String, i64)> = balances.into_iter().collect();
    next_list.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut out = String::from("Next fika hosts:\n    User\t\tBalance\n");
    for (user, balance) in &next_list {
        let _ = writeln!(out, "    {user}\t\t{balance}");
    }
    Ok(Response::ok_with(
        out.trim_end().to_string(),
        serde_json::to_value(&next_list)?,
    ))
}

async fn history(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let history: Vec<FikaSession> =
        serde_json::from_value(ctx.data_or_init("history", json!([]))?)?;
    if history.is_empty() {
        return Ok(Response::ok_with(
            "There is no fika session history.",
            json!([]),
        ));
    }
    let mut out = String::from("Previous fika sessions (at most 5 are shown):\n");
    for session in history.iter().rev().take(5).rev() {
        let host = session.host.as_deref().unwrap_or("?");
        out.push_str(&session_string(session, host, 1));
        out.push_str("\n\n");
    }
    Ok(Response::ok_with(
        out.trim_end().to_string(),
        serde_json::to_value(&history)?,
    ))
}

async fn balances(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let balances = load_balances(&ctx)?;
    let mut out = String::from("Current fika balances:\n");
    for (user, balance) in &balances {
        let _ = writeln!(out, "    {user}\t\t{balance}");
    }
    Ok(Response::ok_with(
        out.trim_end().to_string(),
        serde_json::to_value(&balances)?,
    ))
}

/// Build the `fika` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    Ok(CommandSpec::new("fika", "Serious business fika management")?
        .rule("start", "Start a fika session hosted by you", start)?
        .rule("end", "End a fika session being hosted by you", end)?
        .rule("status", "Show the status of all current fika sessions", status)?
        .rule("join", "Show currently open fika sessions", status)?
        .rule(
            "join [who]",
            "Join a fika session being hosted by someone ([who])",
            join,
        )?
        .rule(
            "leave",
            "Show fika sessions you're currently participating in",
            leave_list,
        )?
        .rule(
            "leave [who]",
            "Leave a fika session being hosted by someone ([who])",
            leave,
        )?
        .rule("next", "Show who is responsible for the next fika", next)?
        .rule("history", "Show all previous fika sessions", history)?
        .rule("balances", "Shows the balances of all users", balances)?)
}
