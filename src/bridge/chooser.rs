//! Interactive chooser workflow for the switch commands.
//!
//! Listing, then Selecting, then Invoking: query the server for the option
//! list, prompt the operator for one of the listed values, and issue the
//! real switch command carrying the choice. Cancellation at the prompt is
//! a normal exit, not an error.

use std::time::Duration;

use tracing::{debug, warn};

use super::client::ServerTransport;
use super::commands::{CommandArgs, CommandKind};
use super::gateway::{CommandInvocation, Gateway, RequestError};

/// Constrained single-choice prompt shown to the operator.
///
/// Must return one of the listed values or `None` on cancellation; free
/// text is rejected. Modeled as a cancellable synchronous call so the
/// workflow stays unit-testable without a real UI.
pub trait ChoicePrompt {
    fn choose(&mut self, title: &str, choices: &[String]) -> Option<String>;
}

/// Read-only display surface for final command results.
///
/// Receives the exact, unmodified text the server returned, once per
/// completed invocation, replacing any previously displayed content.
pub trait ResultSink {
    fn display(&mut self, text: &str);
}

/// Splits a listing response into selectable values, one per line.
#[must_use]
pub fn parse_choices(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs the two-step workflow for a switch command.
///
/// A gateway failure while listing aborts before any prompt is shown.
/// Returns the chosen value, or `None` when the operator cancelled or the
/// server had nothing to offer.
pub async fn switch_flow<T, P, S>(
    transport: &T,
    command: CommandKind,
    timeout: Duration,
    prompt: &mut P,
    sink: &mut S,
) -> Result<Option<String>, RequestError>
where
    T: ServerTransport,
    P: ChoicePrompt,
    S: ResultSink,
{
    let Some(listing) = command.listing_command() else {
        debug!("{} has no listing command, nothing to choose", command.name());
        return Ok(None);
    };

    let gateway = Gateway::new(transport);

    // Listing
    let listing_args = match listing {
        CommandKind::ShowDatabases => CommandArgs::ShowDatabases,
        _ => CommandArgs::ShowConnectionAliases,
    };
    let listing_invocation = CommandInvocation::new(listing)
        .with_arguments(listing_args.to_wire())
        .with_timeout(timeout);
    let listing_text = gateway.invoke(&listing_invocation).await?;
    let choices = parse_choices(&listing_text);

    if choices.is_empty() {
        debug!("{} returned no choices", listing.name());
        return Ok(None);
    }

    // Selecting
    let title = match command {
        CommandKind::SwitchDatabase => "Select database",
        _ => "Select connection",
    };
    let Some(selected) = prompt.choose(title, &choices) else {
        debug!("Chooser cancelled for {}", command.name());
        return Ok(None);
    };

    if !choices.contains(&selected) {
        // require-match: a value outside the list counts as cancellation
        warn!("Prompt returned unlisted value {selected:?}, ignoring");
        return Ok(None);
    }

    // Invoking
    let args = match command {
        CommandKind::SwitchDatabase => CommandArgs::SwitchDatabase {
            database: selected.clone(),
        },
        _ => CommandArgs::SwitchConnections {
            alias: selected.clone(),
        },
    };
    let invocation = CommandInvocation::new(command)
        .with_arguments(args.to_wire())
        .with_timeout(timeout);

    let text = gateway.invoke(&invocation).await?;
    sink.display(&text);

    Ok(Some(selected))
}
