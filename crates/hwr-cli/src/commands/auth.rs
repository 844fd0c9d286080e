//! Login / Logout Commands
//!
//! The captcha and the login must share one HTTP client: the auth service
//! binds the captcha to its session cookie. Login therefore stays
//! interactive within a single process.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;
use hwr_console::api::LoginRequest;
use hwr_console::{Navigation, Route, Session};
use tracing::warn;

use super::utils::{print_info, print_success, prompt};
use super::Context;
use crate::cli::LoginArgs;
use crate::error::{CliError, CliResult};

/// Execute the login command
pub async fn login(ctx: &Context, args: &LoginArgs) -> CliResult<()> {
    let (navigation, session) = ctx.store.navigate(Route::Login)?;
    if let Navigation::Redirect(_) = navigation {
        print_info(&format!(
            "Already logged in as user {}",
            session.user_id.as_deref().unwrap_or("?")
        ));
        return Ok(());
    }

    let services = ctx.services()?;

    let captcha = services.auth.captcha().await?;
    let image = STANDARD.decode(captcha.image_base64())?;
    std::fs::write(&args.captcha_out, image)?;
    print_info(&format!(
        "Captcha image written to {}",
        args.captcha_out.display().to_string().cyan()
    ));

    let user = match args.user {
        Some(user) => user,
        None => parse_user_id(&prompt("User id")?)?,
    };
    let password = match &args.password {
        Some(password) => password.clone(),
        None => prompt("Password")?,
    };
    let code = prompt("Verification code")?;

    let request = LoginRequest::new(user, password, code, captcha.verify_code_id);
    let user_id = services.auth.login(&request).await?.to_string();

    let session = Session::authenticated(user_id.clone());
    ctx.store.save(&session)?;
    ctx.record(&services, &session, "用户登录").await;

    print_success(&format!("Logged in as user {}", user_id.green()));
    Ok(())
}

/// Execute the logout command
pub async fn logout(ctx: &Context) -> CliResult<()> {
    let session = ctx.store.load()?;
    if !session.is_authenticated() {
        ctx.store.clear()?;
        print_info("Not logged in");
        return Ok(());
    }

    let services = ctx.services()?;
    ctx.record(&services, &session, "用户退出").await;
    if let Err(e) = services.auth.logout().await {
        warn!(error = %e, "Logout request failed");
    }

    ctx.store.clear()?;
    print_success("Logged out");
    Ok(())
}

fn parse_user_id(input: &str) -> CliResult<i64> {
    input
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("user id must be numeric, got '{}'", input)))
}
