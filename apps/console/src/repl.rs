//! Line commands accepted by `console run`.

use std::{fmt::Write as _, sync::Arc};

use console_core::{
    ActuatorController, ConsoleSession, ConsoleStatus, IdentityProvider, LocalIdentity,
};
use shared::domain::{ActuatorId, Operator, UNKNOWN_OPERATOR_EMAIL};
use tokio::task::JoinSet;

pub const HELP: &str = "\
commands:
  toggle <grinder|pump|juicer|mixer>   flip one actuator
  timer start <minutes>               start the cook timer (1-120)
  timer cancel                        stop the cook timer
  status                              show readings, actuators and timer
  mixer-state                         ask the mixer node for its line state
  login <email> <password>            sign in
  signup <email> <password>           create an operator account and sign in
  logout                              sign out
  quit                                end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Toggle(ActuatorId),
    TimerStart(u32),
    TimerCancel,
    Status,
    MixerState,
    Login { email: String, password: String },
    SignUp { email: String, password: String },
    Logout,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["toggle", name] => ReplCommand::Toggle(name.parse().map_err(|e| format!("{e}"))?),
        ["timer", "start", minutes] => ReplCommand::TimerStart(
            minutes
                .parse()
                .map_err(|_| format!("'{minutes}' is not a number of minutes"))?,
        ),
        ["timer", "cancel"] => ReplCommand::TimerCancel,
        ["status"] => ReplCommand::Status,
        ["mixer-state"] => ReplCommand::MixerState,
        ["login", email, password] => ReplCommand::Login {
            email: email.to_string(),
            password: password.to_string(),
        },
        ["signup", email, password] => ReplCommand::SignUp {
            email: email.to_string(),
            password: password.to_string(),
        },
        ["logout"] => ReplCommand::Logout,
        ["help"] | ["?"] => ReplCommand::Help,
        ["quit"] | ["exit"] => ReplCommand::Quit,
        _ => return Err(format!("unrecognised command '{}'; try 'help'", line.trim())),
    };
    Ok(Some(command))
}

pub async fn execute(
    command: ReplCommand,
    session: &ConsoleSession,
    identity: &LocalIdentity,
) -> Flow {
    let output = match command {
        ReplCommand::Toggle(actuator) => toggle_actuator(session.actuators(), actuator).await,
        ReplCommand::TimerStart(minutes) => match session.timer().start(minutes) {
            Ok(snapshot) => format!("timer running: {}", snapshot.remaining_display()),
            Err(err) => format!("error: {err}"),
        },
        ReplCommand::TimerCancel => {
            session.timer().cancel();
            "timer idle".to_string()
        }
        ReplCommand::Status => render_status(&session.status(), identity.current_user()),
        ReplCommand::MixerState => match session.actuators().read_mixer_state().await {
            Ok(running) => format!("mixer node reports the mixer {}", on_off(running)),
            Err(err) => format!("error: {err}"),
        },
        ReplCommand::Login { email, password } => match identity.sign_in(&email, &password) {
            Ok(operator) => format!("signed in as {}", operator.email),
            Err(err) => format!("error: {err}"),
        },
        ReplCommand::SignUp { email, password } => match identity.sign_up(&email, &password) {
            Ok(operator) => format!("account created; signed in as {}", operator.email),
            Err(err) => format!("error: {err}"),
        },
        ReplCommand::Logout => {
            identity.sign_out();
            "signed out".to_string()
        }
        ReplCommand::Help => HELP.to_string(),
        ReplCommand::Quit => return Flow::Quit,
    };
    Flow::Continue(output)
}

/// Runs a toggle on its own task; the result is collected from `in_flight`.
pub fn spawn_toggle(
    in_flight: &mut JoinSet<String>,
    actuators: &Arc<ActuatorController>,
    actuator: ActuatorId,
) {
    let actuators = Arc::clone(actuators);
    in_flight.spawn(async move { toggle_actuator(&actuators, actuator).await });
}

async fn toggle_actuator(actuators: &ActuatorController, actuator: ActuatorId) -> String {
    match actuators.toggle(actuator).await {
        Ok(outcome) => format!("{} is {}", actuator.label(), on_off(outcome.confirmed)),
        Err(err) => format!("error: {err}"),
    }
}

pub fn render_status(status: &ConsoleStatus, operator: Option<Operator>) -> String {
    let mut out = String::new();

    let temperature = match status.sensors.temperature {
        Some(t) if status.sensors.is_high_temperature() => format!("{t:.1} °C (HIGH)"),
        Some(t) => format!("{t:.1} °C"),
        None => "--".to_string(),
    };
    let _ = writeln!(out, "temperature: {temperature}");
    if status.poll.consecutive_failures > 0 {
        let _ = writeln!(
            out,
            "  last {} polls failed; showing last known reading",
            status.poll.consecutive_failures
        );
    }
    let _ = writeln!(out, "machine: {}", status.machine.label());

    for (actuator, state) in &status.actuators {
        let pending = if state.pending { " (pending)" } else { "" };
        let _ = writeln!(
            out,
            "{:<8} {}{pending}",
            actuator.label(),
            on_off(state.confirmed)
        );
    }

    let timer = if status.timer.running {
        format!("{} remaining", status.timer.remaining_display())
    } else {
        "idle".to_string()
    };
    let _ = writeln!(out, "timer: {timer}");
    let operator = operator.map_or_else(|| UNKNOWN_OPERATOR_EMAIL.to_string(), |op| op.email);
    let _ = write!(out, "operator: {operator}");
    out
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
#[path = "tests/repl_tests.rs"]
mod tests;
