//! Terminal control surface.
//!
//! A line-oriented stand-in for the page's player controls: each command
//! line becomes a typed control event or a direct transport call.

use bandstand_broadcast::BroadcastPoller;
use bandstand_core::{ControlEvent, ControlSurface, PlaybackSession};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const HELP: &str = "\
Controls:
  p          play/pause
  <space>    play/pause (spacebar shortcut)
  n          next track
  b          previous track
  s          toggle shuffle
  v <0..1>   set volume
  c          enable broadcast audio (one-time consent)
  i          show player status
  q          quit";

/// Run the control loop until quit or cancellation.
pub async fn run(
    session: Arc<PlaybackSession>,
    poller: Option<Arc<BroadcastPoller>>,
    cancel_token: CancellationToken,
) {
    let surface = ControlSurface::new(Arc::clone(&session));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&line, &surface, &session, poller.as_deref()).await {
                            cancel_token.cancel();
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Input closed");
                        cancel_token.cancel();
                        break;
                    }
                    Err(e) => {
                        debug!("Input error: {e}");
                        cancel_token.cancel();
                        break;
                    }
                }
            }
        }
    }
}

/// Handle one input line. Returns false when the user asked to quit.
async fn handle_line(
    line: &str,
    surface: &ControlSurface,
    session: &Arc<PlaybackSession>,
    poller: Option<&BroadcastPoller>,
) -> bool {
    // A bare spacebar press arrives as an empty or whitespace-only line
    if line.trim().is_empty() {
        surface
            .dispatch(ControlEvent::Spacebar {
                focus_in_input: false,
            })
            .await;
        return true;
    }

    match line.trim() {
        "p" => surface.dispatch(ControlEvent::PlayPausePressed).await,
        "n" => session.play_next().await,
        "b" => session.play_previous().await,
        "s" => {
            session.toggle_shuffle().await;
            let enabled = session.shuffle_enabled().await;
            println!("Shuffle {}", if enabled { "on" } else { "off" });
        }
        "c" => match poller {
            Some(poller) => {
                poller.grant_consent().await;
                println!("Broadcast audio enabled");
            }
            None => println!("Broadcast listener is disabled"),
        },
        "i" => {
            let snapshot = session.snapshot().await;
            let title = snapshot
                .track
                .as_ref()
                .map_or("(nothing loaded)", |track| track.title.as_str());
            println!(
                "{} | {} | {:.0}s | shuffle {} | volume {:.2}",
                title,
                if snapshot.is_playing { "playing" } else { "paused" },
                snapshot.elapsed_secs,
                if snapshot.shuffle_enabled { "on" } else { "off" },
                snapshot.volume,
            );
        }
        "q" => return false,
        other => {
            if let Some(raw) = other.strip_prefix("v ") {
                match raw.trim().parse::<f32>() {
                    Ok(volume) => surface.dispatch(ControlEvent::VolumeChanged(volume)).await,
                    Err(_) => println!("Volume must be a number between 0 and 1"),
                }
            } else {
                println!("{HELP}");
            }
        }
    }

    true
}
