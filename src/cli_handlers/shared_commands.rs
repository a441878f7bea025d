use super::utils::{drain_notices, print_json, print_shared_list};
use super::OutputOptions;
use crate::cli::SharedCommands;
use crate::client::ClientContext;
use crate::error::Result;
use crate::notifications::NotificationSender;

/// Handle all `taskshare shared` subcommands
pub async fn handle_shared_command(
    client: &ClientContext,
    cmd: SharedCommands,
    output: OutputOptions,
) -> Result<()> {
    match cmd {
        SharedCommands::List => {
            client.require_session()?;
            let (notifier, mut notices) = NotificationSender::channel();
            let sync = client.shared_sync(notifier);
            let state = sync.ready().await?;
            drain_notices(&mut notices, output.json);

            if output.json {
                print_json(&state.items)?;
            } else {
                print_shared_list(&state.items);
            }
        },
    }

    Ok(())
}
