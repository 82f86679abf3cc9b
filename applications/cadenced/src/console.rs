//! Line console
//!
//! Each stdin line is one command. `parse_line` turns it into a
//! [`ConsoleInput`]; the daemon resolves tracks and forwards the rest to the
//! session.

use cadence_core::RepeatMode;
use cadence_playback::{Command, MediaAction, PlaybackSnapshot, SystemEvent};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

/// Console help text
pub const HELP: &str = "\
commands:
  play | pause | toggle | stop | next | prev | retry
  seek <seconds>              jump within the current track
  repeat off|one|all          change repeat mode
  shuffle on|off              toggle shuffle
  add <path>                  append a track to the queue
  remove <index>              remove a queue item (0-based)
  move <from> <to>            move a queue item
  jump <index>                play a queue item
  clear                       empty the queue
  sleep <minutes> [fade]      start the sleep timer
  extend <minutes>            extend the sleep timer
  cancel-sleep                cancel the sleep timer
  speed <x>                   playback speed (0.5-2.0)
  volume <0-100>              output volume
  unplug | plug               simulate headphone route changes
  media <ACTION> [ms]         send a media-session action
  status | help | quit";

/// A parsed console line
#[derive(Debug, Clone)]
pub enum ConsoleInput {
    /// Forward to the session
    Command(Command),
    /// Resolve a path to a track and append it
    Add(PathBuf),
    /// Host signal
    System(SystemEvent),
    /// Media-session action
    Media(MediaAction),
    /// Print the current snapshot
    Status,
    /// Print help
    Help,
    /// Shut down
    Quit,
}

/// Parse one console line
///
/// Returns `Ok(None)` for blank lines and an error message for anything
/// that isn't a valid command.
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let input = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("play", []) => ConsoleInput::Command(Command::Play),
        ("pause", []) => ConsoleInput::Command(Command::Pause),
        ("toggle", []) => ConsoleInput::Command(Command::PlayPause),
        ("stop", []) => ConsoleInput::Command(Command::Stop),
        ("next", []) => ConsoleInput::Command(Command::SkipNext),
        ("prev" | "previous", []) => ConsoleInput::Command(Command::SkipPrevious),
        ("retry", []) => ConsoleInput::Command(Command::Retry),
        ("clear", []) => ConsoleInput::Command(Command::ClearQueue),
        ("cancel-sleep", []) => ConsoleInput::Command(Command::CancelSleepTimer),
        ("seek", [secs]) => {
            let secs: f64 = parse_number(secs, "seconds")?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(format!("invalid position: {secs}"));
            }
            ConsoleInput::Command(Command::Seek(Duration::from_secs_f64(secs)))
        }
        ("repeat", [mode]) => {
            let mode = RepeatMode::from_str(&mode.to_ascii_lowercase())
                .ok_or_else(|| format!("unknown repeat mode: {mode}"))?;
            ConsoleInput::Command(Command::SetRepeat(mode))
        }
        ("shuffle", [flag]) => ConsoleInput::Command(Command::SetShuffle(parse_flag(flag)?)),
        ("add", [_, ..]) => {
            // Paths may contain spaces
            let raw = line.trim_start()[verb.len()..].trim();
            ConsoleInput::Add(PathBuf::from(raw))
        }
        ("remove", [index]) => {
            ConsoleInput::Command(Command::RemoveFromQueue(parse_number(index, "index")?))
        }
        ("move", [from, to]) => ConsoleInput::Command(Command::MoveQueueItem {
            from: parse_number(from, "index")?,
            to: parse_number(to, "index")?,
        }),
        ("jump", [index]) => ConsoleInput::Command(Command::SkipTo(parse_number(index, "index")?)),
        ("sleep", [minutes]) => ConsoleInput::Command(Command::SetSleepTimer {
            minutes: parse_number(minutes, "minutes")?,
            fade_out: false,
        }),
        ("sleep", [minutes, "fade"]) => ConsoleInput::Command(Command::SetSleepTimer {
            minutes: parse_number(minutes, "minutes")?,
            fade_out: true,
        }),
        ("extend", [minutes]) => {
            ConsoleInput::Command(Command::ExtendSleepTimer(parse_number(minutes, "minutes")?))
        }
        ("speed", [speed]) => {
            ConsoleInput::Command(Command::SetPlaybackSpeed(parse_number(speed, "speed")?))
        }
        ("volume", [volume]) => {
            let volume: u8 = parse_number(volume, "volume")?;
            if volume > 100 {
                return Err(format!("volume must be 0-100, got {volume}"));
            }
            ConsoleInput::Command(Command::SetVolume(volume))
        }
        ("unplug", []) => ConsoleInput::System(SystemEvent::AccessoryDisconnected),
        ("plug", []) => ConsoleInput::System(SystemEvent::HeadphonesConnected),
        ("media", [id]) => ConsoleInput::Media(parse_media(id, None)?),
        ("media", [id, ms]) => ConsoleInput::Media(parse_media(id, Some(parse_number(ms, "ms")?))?),
        ("status", []) => ConsoleInput::Status,
        ("help" | "?", []) => ConsoleInput::Help,
        ("quit" | "exit", []) => ConsoleInput::Quit,
        _ => return Err(format!("unrecognised command: {}", line.trim())),
    };

    Ok(Some(input))
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid {what}: {raw}"))
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(format!("expected on/off, got {raw}")),
    }
}

fn parse_media(id: &str, position_ms: Option<u64>) -> Result<MediaAction, String> {
    MediaAction::parse(&id.to_ascii_uppercase(), position_ms)
        .ok_or_else(|| format!("unknown media action: {id}"))
}

fn clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Render a snapshot as a short multi-line status block
pub fn format_status(snapshot: &PlaybackSnapshot) -> String {
    let mut out = String::new();

    let _ = write!(out, "[{}]", snapshot.transport);
    match &snapshot.track {
        Some(track) => {
            let _ = write!(
                out,
                " {} - {} ({} / {})",
                track.display_artist(),
                track.title,
                clock(snapshot.position),
                clock(snapshot.duration)
            );
        }
        None => out.push_str(" nothing loaded"),
    }

    let _ = write!(
        out,
        "\nqueue {}/{} | repeat {} | shuffle {} | volume {} | speed {:.2}x",
        snapshot.queue_index.map_or(0, |i| i + 1),
        snapshot.queue.len(),
        snapshot.repeat.as_str(),
        if snapshot.shuffle { "on" } else { "off" },
        snapshot.volume,
        snapshot.speed,
    );

    if snapshot.sleep_timer.active {
        let _ = write!(
            out,
            "\nsleep timer {} left of {}{}",
            clock(snapshot.sleep_timer.remaining),
            clock(snapshot.sleep_timer.total),
            if snapshot.sleep_timer.fade_out {
                ", fading"
            } else {
                ""
            }
        );
    }

    out
}
