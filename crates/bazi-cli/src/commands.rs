//! Parsing of shell input lines.

use anyhow::{anyhow, bail, Result};
use bazi_core::{BirthData, View};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Calculate(BirthData),
    Save,
    Charts,
    Delete(i64),
    Login,
    Register,
    Logout,
    Go(View),
    Status,
    Health,
    Help,
    Quit,
}

impl Command {
    /// Parse one line. Blank lines give `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "calc" | "calculate" => Command::Calculate(parse_birth(&args)?),
            "save" => Command::Save,
            "charts" | "list" => Command::Charts,
            "delete" | "rm" => {
                let id = args
                    .first()
                    .ok_or_else(|| anyhow!("Usage: delete <chart id>"))?;
                Command::Delete(id.parse().map_err(|_| anyhow!("'{}' is not a chart id", id))?)
            }
            "login" => Command::Login,
            "register" | "signup" => Command::Register,
            "logout" => Command::Logout,
            "view" | "go" => {
                let name = args
                    .first()
                    .ok_or_else(|| anyhow!("Usage: view <calculator|login|register|charts>"))?;
                Command::Go(name.parse()?)
            }
            "status" | "whoami" => Command::Status,
            "health" => Command::Health,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("Unknown command '{}'. Type 'help' for a list.", other),
        };
        Ok(Some(command))
    }
}

/// `YEAR MONTH DAY HOUR`, or `YYYY-MM-DD HH`
fn parse_birth(args: &[&str]) -> Result<BirthData> {
    const USAGE: &str = "Usage: calc <year> <month> <day> <hour>";

    let parts: Vec<&str> = match args {
        [date, hour] if date.contains('-') => {
            let mut parts: Vec<&str> = date.split('-').collect();
            parts.push(*hour);
            parts
        }
        _ => args.to_vec(),
    };
    let [year, month, day, hour] = parts.as_slice() else {
        bail!(USAGE);
    };

    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| anyhow!("'{}' is not a number. {}", s, USAGE))
    };
    let year: i32 = year
        .parse()
        .map_err(|_| anyhow!("'{}' is not a year. {}", year, USAGE))?;
    Ok(BirthData::new(year, number(*month)?, number(*day)?, number(*hour)?))
}

pub const HELP: &str = "\
Commands:
  calc <year> <month> <day> <hour>   Calculate the four pillars
  save                               Save the last calculated chart
  charts                             Show your saved charts
  delete <id>                        Delete a saved chart
  login | register | logout          Manage your account
  view <calculator|login|register|charts>
  status                             Show who is logged in
  health                             Check the chart service
  quit";
