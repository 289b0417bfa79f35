//! Line-oriented commands read from stdin.

use std::io::BufRead;

use crossbeam_channel::Sender;

use crate::{overlay::BodyPart, types::AnalysisMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    CameraOn,
    CameraOff,
    SwitchCamera,
    Start,
    Stop,
    Mode(AnalysisMode),
    Resize(u32, u32),
    Toggle(BodyPart),
    ResetParts,
    Metrics,
    Devices,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  camera on|off          acquire or release the camera
  switch                 move to the next camera
  start | stop           start or stop live analysis
  mode live|upload       change analysis mode
  resize W H             change the display box
  toggle <part>          face, left, right, upper, lower
  reset                  show every body part again
  metrics                print the latest scores
  devices                list cameras
  quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        ["camera", "on"] => Command::CameraOn,
        ["camera", "off"] => Command::CameraOff,
        ["switch"] => Command::SwitchCamera,
        ["start"] => Command::Start,
        ["stop"] => Command::Stop,
        ["mode", "live"] => Command::Mode(AnalysisMode::Live),
        ["mode", "upload"] => Command::Mode(AnalysisMode::Upload),
        ["resize", w, h] => {
            let size = |s: &str| s.parse::<u32>().ok().filter(|v| *v > 0);
            match (size(*w), size(*h)) {
                (Some(w), Some(h)) => Command::Resize(w, h),
                _ => return Err(format!("bad size `{w} {h}`")),
            }
        }
        ["toggle", part] => {
            Command::Toggle(BodyPart::parse(part).ok_or_else(|| format!("unknown part `{part}`"))?)
        }
        ["reset"] => Command::ResetParts,
        ["metrics"] => Command::Metrics,
        ["devices"] => Command::Devices,
        ["help"] | ["?"] => Command::Help,
        ["quit"] | ["exit"] => Command::Quit,
        _ => return Err(format!("unknown command `{}`", line.trim())),
    };
    Ok(command)
}

/// Forwards parsed commands until `input` ends or the receiver is gone.
/// End of input is reported as `Quit`.
pub fn read_commands<R: BufRead>(input: R, commands: Sender<Command>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => {
                if commands.send(command).is_err() {
                    return;
                }
            }
            Err(err) => log::warn!("{err} (type `help`)"),
        }
    }
    let _ = commands.send(Command::Quit);
}
