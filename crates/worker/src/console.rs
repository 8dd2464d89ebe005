//! Line-oriented command console for the worker.
//!
//! Commands, one per line:
//! - `start <name>`
//! - `spot <game-id> [CC-RR ...]`
//! - `end <game-id>`
//! - `show <game-id>`

use common::{AggregateId, PlayerId};
use message_bus::EventPublisher;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use transaction::{Database, Execution, ExecutionError};

use crate::games::GameCommands;
use crate::scoreboard::Scoreboard;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start { name: String },
    Spot { game_id: AggregateId, plates: Vec<(String, String)> },
    End { game_id: AggregateId },
    Show { game_id: AggregateId },
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb.to_ascii_lowercase().as_str() {
            "start" => ConsoleCommand::Start {
                name: rest.to_string(),
            },
            "spot" => {
                let mut parts = rest.split_whitespace();
                let game_id = parse_game_id(parts.next())?;
                let plates = parts.map(parse_plate).collect::<Result<_, _>>()?;
                ConsoleCommand::Spot { game_id, plates }
            }
            "end" => ConsoleCommand::End {
                game_id: parse_game_id(Some(rest))?,
            },
            "show" => ConsoleCommand::Show {
                game_id: parse_game_id(Some(rest))?,
            },
            other => return Err(format!("unknown command {other:?}")),
        };

        Ok(Some(command))
    }
}

fn parse_game_id(raw: Option<&str>) -> Result<AggregateId, String> {
    let raw = raw.filter(|s| !s.is_empty()).ok_or("missing game id")?;
    raw.parse().map_err(|_| format!("invalid game id {raw:?}"))
}

fn parse_plate(raw: &str) -> Result<(String, String), String> {
    raw.split_once('-')
        .map(|(country, region)| (country.to_string(), region.to_string()))
        .ok_or_else(|| format!("plate {raw:?} must look like CC-RR"))
}

/// Reads commands from `input` until EOF or cancellation, writing one reply
/// line per command to `output`.
///
/// Every command runs as `player`. A command that fails in the transaction
/// layer gets an `error:` reply and the console keeps serving.
pub async fn run<D, P, R, W>(
    commands: &GameCommands<D, P>,
    scoreboard: &Scoreboard,
    player: PlayerId,
    input: R,
    mut output: W,
    cancel: &CancellationToken,
)
where
    D: Database,
    P: EventPublisher,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read console input");
                break;
            }
        };

        let reply = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => execute(commands, scoreboard, player, command, cancel).await,
            Ok(None) => continue,
            Err(message) => format!("error: {message}"),
        };

        if let Err(e) = output.write_all(format!("{reply}\n").as_bytes()).await {
            tracing::error!(error = %e, "failed to write console output");
            break;
        }
    }

    if let Err(e) = output.flush().await {
        tracing::error!(error = %e, "failed to flush console output");
    }
}

async fn execute<D, P>(
    commands: &GameCommands<D, P>,
    scoreboard: &Scoreboard,
    player: PlayerId,
    command: ConsoleCommand,
    cancel: &CancellationToken,
) -> String
where
    D: Database,
    P: EventPublisher,
{
    match command {
        ConsoleCommand::Start { name } => {
            render(commands.start_game(&name, player, cancel).await, |id| {
                format!("started {id}")
            })
        }
        ConsoleCommand::Spot { game_id, plates } => render(
            commands.spot_plates(game_id, player, &plates, cancel).await,
            |changes| {
                format!(
                    "spotted +{} -{}",
                    changes.added.len(),
                    changes.removed.len()
                )
            },
        ),
        ConsoleCommand::End { game_id } => {
            render(commands.end_game(game_id, cancel).await, |ended_on| {
                format!("ended at {}", ended_on.to_rfc3339())
            })
        }
        ConsoleCommand::Show { game_id } => match scoreboard.tally(game_id).await {
            Some(tally) => format!(
                "{}: {} spotted{}",
                tally.name,
                tally.spotted(),
                if tally.is_finished() {
                    " (finished)"
                } else {
                    ""
                }
            ),
            None => format!("error: no tally for {game_id}"),
        },
    }
}

fn render<T>(
    result: Result<Execution<T>, ExecutionError>,
    success: impl FnOnce(T) -> String,
) -> String {
    let execution = match result {
        Ok(execution) => execution,
        Err(e) => {
            tracing::error!(error = %e, "console command failed");
            return format!("error: {e}");
        }
    };

    let mut reply = match execution.outcome {
        Ok(value) => success(value),
        Err(failure) => format!("error: {}", failure.message().replace('\n', "; ")),
    };
    if let Some(e) = &execution.publish_error {
        reply.push_str(&format!(
            " (warning: {} event(s) not delivered: {e})",
            execution.undelivered
        ));
    }
    reply
}
