use super::utils::{password_or_prompt, print_json};
use super::OutputOptions;
use crate::cli::AuthCommands;
use crate::client::ClientContext;
use crate::error::Result;
use serde_json::json;

/// Handle all `taskshare auth` subcommands
pub async fn handle_auth_command(
    client: &ClientContext,
    cmd: AuthCommands,
    output: OutputOptions,
) -> Result<()> {
    match cmd {
        AuthCommands::Signup { email, password } => {
            let password = password_or_prompt(password, true)?;
            let user = client.auth.sign_up(&email, &password).await?;
            if output.json {
                print_json(&user)?;
            } else if !output.quiet {
                println!("Account created for {}", user.email);
                println!("Sign in with: taskshare auth signin {}", user.email);
            }
        },

        AuthCommands::Signin { email, password } => {
            let password = password_or_prompt(password, false)?;
            let session = client.auth.sign_in_with_password(&email, &password).await?;
            if output.json {
                print_json(&session.user)?;
            } else if !output.quiet {
                println!("Signed in as {}", session.user.email);
            }
        },

        AuthCommands::Oauth {
            provider,
            no_browser,
        } => {
            let redirect = client.auth.sign_in_with_oauth(&provider)?;
            let opened = if no_browser {
                false
            } else {
                match open::that(&redirect.url) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Could not open a browser");
                        false
                    },
                }
            };

            if output.json {
                print_json(&json!({
                    "provider": redirect.provider,
                    "url": redirect.url,
                    "opened": opened,
                }))?;
            } else if opened {
                println!("Continue signing in with {} in your browser.", redirect.provider);
            } else {
                println!("Open this URL to sign in with {}:", redirect.provider);
                println!("  {}", redirect.url);
            }
        },

        AuthCommands::Signout => {
            let was = client.current_session().map(|s| s.user.email);
            client.auth.sign_out().await?;
            if output.json {
                print_json(&json!({ "signed_out": was.is_some(), "email": was }))?;
            } else if !output.quiet {
                match was {
                    Some(email) => println!("Signed out {}", email),
                    None => println!("Not signed in"),
                }
            }
        },

        AuthCommands::Whoami => {
            let user = client.require_session()?.user;
            if output.json {
                print_json(&user)?;
            } else {
                println!("{}", user.email);
                if let Some(name) = &user.full_name {
                    println!("Name: {}", name);
                }
                println!("ID:   {}", user.id);
            }
        },
    }

    Ok(())
}
