//! Line-based host for both reminder engines.

use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::delivery::InAppEvent;
use crate::models::reminder::{DEFAULT_BUSINESS_HOUR_END, DEFAULT_BUSINESS_HOUR_START, Preset};
use crate::scheduling::{ConfigUpdate, CountdownEngine, HydrationEngine};
use crate::storage::validation::{parse_hour_input, parse_interval_input};

pub const HELP: &str = "\
Commands:
  start | stop                 enable or disable the hydration reminder
  interval <minutes>           reminder interval, 15-1440
  hours <start> <end>          business hours, 0-23, end exclusive
  weekdays on|off              only remind Monday to Friday
  notifications on|off         also raise desktop notifications
  message [text]               custom reminder text, empty restores the default
  preset 2h|hourly|30m         apply a preset schedule
  timer start|pause|reset      control the Vitamin D countdown
  timer hours <n>              countdown length, 1-10 hours
  status                       show both reminders
  help                         show this text
  quit                         stop both reminders and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    Reset,
    Hours(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Interval(u32),
    Hours { start: u32, end: u32 },
    Weekdays(bool),
    Notifications(bool),
    Message(String),
    Preset(Preset),
    Timer(TimerCommand),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("start", []) => ConsoleCommand::Start,
            ("stop", []) => ConsoleCommand::Stop,
            ("interval", [minutes]) => ConsoleCommand::Interval(parse_interval_input(minutes)?),
            ("hours", [start, end]) => ConsoleCommand::Hours {
                start: parse_hour_input(start, DEFAULT_BUSINESS_HOUR_START)?,
                end: parse_hour_input(end, DEFAULT_BUSINESS_HOUR_END)?,
            },
            ("weekdays", [toggle]) => ConsoleCommand::Weekdays(parse_toggle(toggle)?),
            ("notifications", [toggle]) => ConsoleCommand::Notifications(parse_toggle(toggle)?),
            ("message", _) => ConsoleCommand::Message(rest.to_owned()),
            ("preset", [preset]) => ConsoleCommand::Preset(preset.parse()?),
            ("timer", ["start"]) => ConsoleCommand::Timer(TimerCommand::Start),
            ("timer", ["pause"]) => ConsoleCommand::Timer(TimerCommand::Pause),
            ("timer", ["reset"]) => ConsoleCommand::Timer(TimerCommand::Reset),
            ("timer", ["hours", hours]) => ConsoleCommand::Timer(TimerCommand::Hours(
                hours
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Please enter a whole number of hours"))?,
            )),
            ("status", []) => ConsoleCommand::Status,
            ("help", []) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            ("", []) => anyhow::bail!("Empty command, type `help` for the list"),
            _ => anyhow::bail!("Unknown command {line:?}, type `help` for the list"),
        };

        Ok(command)
    }
}

fn parse_toggle(raw: &str) -> anyhow::Result<bool> {
    match raw.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => anyhow::bail!("Expected on or off, got {other:?}"),
    }
}

pub struct Console<'a> {
    hydration: &'a HydrationEngine,
    countdown: &'a CountdownEngine,
}

impl<'a> Console<'a> {
    pub fn new(hydration: &'a HydrationEngine, countdown: &'a CountdownEngine) -> Self {
        Self {
            hydration,
            countdown,
        }
    }

    /// Reads commands until `quit`, end of input or Ctrl-C.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");

        loop {
            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C");
                    break;
                }
                line = lines.next_line() => match line? {
                    Some(line) => line,
                    None => break,
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => {
                    if let Err(error) = self.execute(command).await {
                        println!("error: {error}");
                    }
                }
                Err(error) => println!("error: {error}"),
            }
        }

        Ok(())
    }

    async fn execute(&self, command: ConsoleCommand) -> anyhow::Result<()> {
        match command {
            ConsoleCommand::Start => self.hydration.set_enabled(true).await?,
            ConsoleCommand::Stop => self.hydration.set_enabled(false).await?,
            ConsoleCommand::Interval(minutes) => {
                self.update(ConfigUpdate::IntervalMinutes(minutes.into())).await?
            }
            ConsoleCommand::Hours { start, end } => {
                self.update(ConfigUpdate::BusinessHours {
                    start: start.into(),
                    end: end.into(),
                })
                .await?
            }
            ConsoleCommand::Weekdays(weekdays_only) => {
                self.update(ConfigUpdate::WeekdaysOnly(weekdays_only)).await?
            }
            ConsoleCommand::Notifications(enabled) => {
                self.update(ConfigUpdate::UseNotifications(enabled)).await?
            }
            ConsoleCommand::Message(message) => {
                self.update(ConfigUpdate::CustomMessage(message)).await?
            }
            ConsoleCommand::Preset(preset) => self.update(ConfigUpdate::Preset(preset)).await?,
            ConsoleCommand::Timer(TimerCommand::Start) => self.countdown.start_timer().await?,
            ConsoleCommand::Timer(TimerCommand::Pause) => self.countdown.pause().await?,
            ConsoleCommand::Timer(TimerCommand::Reset) => self.countdown.reset().await?,
            ConsoleCommand::Timer(TimerCommand::Hours(hours)) => {
                self.countdown.set_target_hours(hours).await?
            }
            ConsoleCommand::Status => {}
            ConsoleCommand::Help => {
                println!("{HELP}");
                return Ok(());
            }
            ConsoleCommand::Quit => return Ok(()),
        }

        self.print_status().await
    }

    async fn update(&self, update: ConfigUpdate) -> anyhow::Result<()> {
        self.hydration.update(update).await?;
        Ok(())
    }

    async fn print_status(&self) -> anyhow::Result<()> {
        let hydration = self.hydration.status().await?;
        let config = &hydration.config;
        let next = config
            .next_trigger_at()
            .map(|next| next.to_rfc3339())
            .unwrap_or_else(|| "-".to_owned());

        println!(
            "hydration: {} | every {} min | {:02}:00-{:02}:00{} | notifications {} | next {} | \"{}\"",
            if config.enabled() { "on" } else { "off" },
            config.interval_minutes(),
            config.business_hour_start(),
            config.business_hour_end(),
            if config.weekdays_only() { " weekdays" } else { "" },
            if config.use_notifications() { "on" } else { "off" },
            next,
            config.message(),
        );

        let countdown = self.countdown.status().await?;
        println!(
            "vitamin d: {} | target {} h | remaining {}",
            if countdown.running { "running" } else { "stopped" },
            countdown.target_hours,
            format_remaining(countdown.remaining_seconds),
        );

        Ok(())
    }
}

fn format_remaining(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Prints every in-app reminder event until the sender goes away.
pub async fn run_banner(mut events: broadcast::Receiver<InAppEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!(
                "\n*** [{}] {} ({})\n",
                event.name,
                event.message,
                event.fired_at.to_rfc3339()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Banner missed {} reminder events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> anyhow::Result<ConsoleCommand> {
        line.parse()
    }

    #[test]
    fn parses_hydration_commands() {
        assert_eq!(parse("start").unwrap(), ConsoleCommand::Start);
        assert_eq!(parse("  STOP ").unwrap(), ConsoleCommand::Stop);
        assert_eq!(parse("interval 50").unwrap(), ConsoleCommand::Interval(45));
        assert_eq!(
            parse("hours 8 18").unwrap(),
            ConsoleCommand::Hours { start: 8, end: 18 }
        );
        assert_eq!(parse("weekdays off").unwrap(), ConsoleCommand::Weekdays(false));
        assert_eq!(
            parse("notifications on").unwrap(),
            ConsoleCommand::Notifications(true)
        );
        assert_eq!(parse("preset 30m").unwrap(), ConsoleCommand::Preset(Preset::HalfHour));
    }

    #[test]
    fn message_keeps_the_rest_of_the_line() {
        assert_eq!(
            parse("message Time  to drink").unwrap(),
            ConsoleCommand::Message("Time  to drink".to_owned())
        );
        assert_eq!(parse("message").unwrap(), ConsoleCommand::Message(String::new()));
    }

    #[test]
    fn parses_timer_commands() {
        assert_eq!(
            parse("timer start").unwrap(),
            ConsoleCommand::Timer(TimerCommand::Start)
        );
        assert_eq!(
            parse("timer hours 3").unwrap(),
            ConsoleCommand::Timer(TimerCommand::Hours(3))
        );
        assert!(parse("timer hours three").is_err());
    }

    #[test]
    fn invalid_input_reports_the_validation_message() {
        let error = parse("interval 5").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Please enter a value between 15 and 1440 minutes"
        );

        let error = parse("hours 9 24").unwrap_err();
        assert_eq!(error.to_string(), "Please enter a value between 0 and 23");
    }

    #[test]
    fn unknown_commands_are_errors() {
        assert!(parse("snooze").is_err());
        assert!(parse("start now").is_err());
        assert!(parse("preset weekly").is_err());
        assert!(parse("weekdays maybe").is_err());
    }

    #[test]
    fn remaining_time_is_formatted_as_clock() {
        assert_eq!(format_remaining(3725), "1:02:05");
        assert_eq!(format_remaining(0), "0:00:00");
    }
}
