//! Line commands for the interactive shell.

use anyhow::{anyhow, bail, Result};

pub const HELP: &str = "\
Commands:
  list                                   show the current (filtered) list
  select <label>                         drill into a brand or chassis
  back                                   return to the previous list
  find <text> [year]                     filter brands or chassis
  find engine=.. year=.. kw=.. hp=.. fuel=..
                                         filter cars (fuel=all for any)
  show <car index> [--json]              car details from the local store
  sync                                   sample the remote catalog again
  status                                 stage, connectivity, record counts
  help                                   this text
  quit                                   exit";

/// Filter input as typed. Which fields apply depends on the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindArgs {
    pub text: String,
    pub year: String,
    pub engine: String,
    pub kw: String,
    pub hp: String,
    pub fuel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(String),
    Back,
    Find(FindArgs),
    Show { car_index: u32, json: bool },
    Sync,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => bail!("Empty command"),
            "list" | "ls" => Ok(Command::List),
            "select" | "cd" => {
                if rest.is_empty() {
                    bail!("select needs a label");
                }
                Ok(Command::Select(rest.to_string()))
            }
            "back" | ".." => Ok(Command::Back),
            "find" | "filter" => Ok(Command::Find(parse_find(rest)?)),
            "show" => parse_show(rest),
            "sync" => Ok(Command::Sync),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(anyhow!("Unknown command '{}' (try 'help')", other)),
        }
    }
}

/// `key=value` tokens set fields; bare words form the search text. Without
/// an explicit `year=`, a trailing all-digit word after some text is the year.
fn parse_find(args: &str) -> Result<FindArgs> {
    let mut find = FindArgs::default();
    let mut words: Vec<&str> = Vec::new();

    for token in args.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            words.push(token);
            continue;
        };
        let field = match key.to_ascii_lowercase().as_str() {
            "text" | "name" => &mut find.text,
            "year" => &mut find.year,
            "engine" | "code" => &mut find.engine,
            "kw" => &mut find.kw,
            "hp" => &mut find.hp,
            "fuel" => &mut find.fuel,
            _ => bail!("Unknown filter field '{}'", key),
        };
        *field = value.to_string();
    }

    if find.year.is_empty() && words.len() > 1 {
        if let Some(last) = words.last().filter(|w| w.bytes().all(|b| b.is_ascii_digit())) {
            find.year = last.to_string();
            words.pop();
        }
    }
    if !words.is_empty() {
        let joined = words.join(" ");
        find.text = if find.text.is_empty() {
            joined
        } else {
            format!("{} {}", find.text, joined)
        };
    }
    Ok(find)
}

fn parse_show(args: &str) -> Result<Command> {
    let mut car_index = None;
    let mut json = false;
    for token in args.split_whitespace() {
        if token == "--json" {
            json = true;
        } else {
            let index = token
                .parse::<u32>()
                .map_err(|_| anyhow!("'{}' is not a car index", token))?;
            car_index = Some(index);
        }
    }
    let car_index = car_index.ok_or_else(|| anyhow!("show needs a car index"))?;
    Ok(Command::Show { car_index, json })
}
