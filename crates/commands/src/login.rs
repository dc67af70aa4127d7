//! User account management.
//!
//! Credentials live under the store key `credentials` as a
//! username-to-password object, compared by plain equality. A logged-in
//! client carries its username and password in session state and is
//! re-verified against the store on every use, so a password change
//! elsewhere invalidates the session immediately.

use serde_json::{json, Value};

use textline_engine::{Args, CommandSpec, Context, RegistryError, Response};

const MIN_PASSWORD_LEN: usize = 10;

/// Helpers other commands fetch through the registry utils
/// side-channel. All lookups go through the dispatcher, so they respect
/// the login namespace lock.
pub struct LoginUtils;

impl LoginUtils {
    /// The verified username of the caller, or `None` when not logged
    /// in.
    pub async fn logged_in_user(&self, ctx: &mut Context) -> anyhow::Result<Option<String>> {
        let rsp = ctx.run_command("login").await?;
        Ok(response_username(rsp))
    }

    /// Resolve `username` if such an account exists.
    pub async fn user_exists(
        &self,
        ctx: &mut Context,
        username: &str,
    ) -> anyhow::Result<Option<String>> {
        let rsp = ctx.run_command(&format!("login {username}")).await?;
        Ok(response_username(rsp))
    }

    /// Canned response for operations that require a login.
    pub fn not_logged_in(&self) -> Response {
        Response::error("Please login first.")
    }

    /// Canned response for references to a nonexistent account.
    pub fn unknown_user(&self) -> Response {
        Response::error("The user you referred to does not exist.")
    }
}

fn response_username(rsp: Response) -> Option<String> {
    if rsp.is_error {
        return None;
    }
    rsp.value.and_then(|v| v.as_str().map(str::to_string))
}

fn stored_password(credentials: &Value, username: &str) -> Option<String> {
    credentials
        .get(username)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn session_credentials(ctx: &Context) -> Result<(Option<String>, Option<String>), anyhow::Error> {
    let username = ctx
        .client_data("username")?
        .and_then(|v| v.as_str().map(str::to_string));
    let password = ctx
        .client_data("password")?
        .and_then(|v| v.as_str().map(str::to_string));
    Ok((username, password))
}

async fn whoami(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let (username, password) = session_credentials(&ctx)?;
    let credentials = ctx.data_or_init("credentials", json!({}))?;
    match (username, password) {
        (Some(username), Some(password))
            if stored_password(&credentials, &username) == Some(password.clone()) =>
        {
            Ok(Response::ok_with(
                format!("Logged in as '{username}'"),
                Value::String(username),
            ))
        }
        (None, _) => Ok(Response::error("Not logged in.")),
        (Some(username), _) => Ok(Response::error(format!(
            "Not logged in.\nAttempted login with username '{username}', \
             but it does not exist or password is wrong"
        ))),
    }
}

async fn logout(ctx: Context, _args: Args) -> anyhow::Result<Response> {
    let (username, password) = session_credentials(&ctx)?;
    let credentials = ctx.data_or_init("credentials", json!({}))?;
    match (username, password) {
        (Some(username), Some(password))
            if stored_password(&credentials, &username) == Some(password.clone()) =>
        {
            ctx.delete_client_data("username")?;
            ctx.delete_client_data("password")?;
            Ok(Response::ok("Logged out!"))
        }
        _ => Ok(Response::error("Not logged in.")),
    }
}

async fn user_exists(ctx: Context, args: Args) -> anyhow::Result<Response> {
    let username = args.str(0);
    let credentials = ctx.data_or_init("credentials", json!({}))?;
    if credentials.get(username).is_some() {
        Ok(Response::ok_with(
            format!("Username '{username}' exists."),
            Value::String(username.to_string()),
        ))
    } else {
        Ok(Response::error(format!(
            "Username '{username}' does not exist."
        )))
    }
}

async fn do_login(ctx: Context, args: Args) -> anyhow::Result<Response> {
    let username = args.str(0);
    let password = args.str(1);
    let credentials = ctx.data_or_init("credentials", json!({}))?;
    if stored_password(&credentials, username).as_deref() == Some(password) {
        ctx.set_client_data("username", Value::String(username.to_string()))?;
        ctx.set_client_data("password", Value::String(password.to_string()))?;
        Ok(Response::ok_with(
            format!("Logged in as '{username}'"),
            Value::String(username.to_string()),
        ))
    } else {
        Ok(Response::error(format!(
            "Login failed.\nAttempted login with username '{username}', \
             but it does not exist or password is wrong."
        )))
    }
}

async fn change_password(ctx: Context, args: Args) -> anyhow::Result<Response> {
    let new_password = args.str(0);
    if new_password.len() < MIN_PASSWORD_LEN {
        return Ok(Response::error(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }

    let (username, current_password) = session_credentials(&ctx)?;
    let Some(username) = username else {
        return Ok(Response::error("Not logged in."));
    };

    let mut credentials = ctx.data_or_init("credentials", json!({}))?;
    if stored_password(&credentials, &username) == current_password {
        if let Value::Object(map) = &mut credentials {
            map.insert(username.clone(), Value::String(new_password.to_string()));
        }
        ctx.set_data("credentials", credentials)?;
        // Force a re-login under the new password.
        ctx.delete_client_data("username")?;
        ctx.delete_client_data("password")?;
        Ok(Response::ok_with(
            "Password succesfully changed.\n\
             You have been logged out, please login with your new password.",
            Value::String(username),
        ))
    } else {
        Ok(Response::error(format!(
            "Login failed.\nAttempted login with username '{username}', \
             but it does not exist or password is wrong."
        )))
    }
}

/// Build the `login` command spec.
pub fn spec() -> Result<CommandSpec, RegistryError> {
    // The literal `bye` rule must come before the bare `[username]`
    // rule, or logging out would become an existence check for a user
    // called "bye".
    Ok(CommandSpec::new("login", "User account management")?
        .rule(
            "",
            "Print the username of who is currently logged in",
            whoami,
        )?
        .rule("bye", "Log out", logout)?
        .rule("[username]", "Verify if user [username] exists", user_exists)?
        .rule(
            "[username] [password]",
            "Attempt to login with [username] and [password]",
            do_login,
        )?
        .rule(
            "change password to [newPassword]",
            "Change the user password to [newPassword]",
            change_password,
        )?
        .with_utils(LoginUtils))
}
