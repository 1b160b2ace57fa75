// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive shell for a loader instance.

use clay_loader::{Clay, ModuleList};
use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use std::path::PathBuf;
use tokio::runtime::Handle;

/// Shell configuration constants
const HISTORY_FILE: &str = ".clay_history";
const MAX_HISTORY_SIZE: usize = 1000;

/// Shell commands, written with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Knead,
    Fetch,
    Depend,
    Modules,
    Pending,
    Version,
}

impl ReplCommand {
    /// Parse a command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "knead" | "k" => Some((ReplCommand::Knead, arg)),
            "fetch" | "f" => Some((ReplCommand::Fetch, arg)),
            "depend" | "d" => Some((ReplCommand::Depend, arg)),
            "modules" | "ls" => Some((ReplCommand::Modules, arg)),
            "pending" | "p" => Some((ReplCommand::Pending, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            _ => None,
        }
    }

    /// All commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the shell"),
            (".knead <module>...", "Load modules and wait for them"),
            (".fetch <module>", "Print a module's exports"),
            (".depend <module>=<dep>,...", "Declare prerequisites"),
            (".modules", "List registered modules"),
            (".pending", "Show in-flight loads and queued callbacks"),
            (".version", "Show version information"),
        ]
    }
}

/// Completes command names and registered module identifiers
struct ClayHelper {
    clay: Clay,
}

impl Completer for ClayHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|i| i + 1)
            .unwrap_or(0);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let candidates: Vec<String> = if start == 0 {
            ReplCommand::all_commands()
                .iter()
                .filter_map(|(usage, _)| usage.split_whitespace().next())
                .map(String::from)
                .collect()
        } else {
            self.clay.modules()
        };

        let matches = candidates
            .into_iter()
            .filter(|c| c.starts_with(word))
            .map(|c| Pair {
                replacement: c[word.len()..].to_string(),
                display: c,
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for ClayHelper {
    type Hint = String;
}

impl Highlighter for ClayHelper {}

impl Validator for ClayHelper {}

impl Helper for ClayHelper {}

/// What the loop should do after a command
enum CommandResult {
    Continue,
    Exit,
}

/// Interactive shell over one loader
pub struct Repl {
    clay: Clay,
    handle: Handle,
    editor: Editor<ClayHelper, DefaultHistory>,
    history_path: PathBuf,
}

/// Run the shell until `.exit` or end of input.
///
/// Blocks the calling thread; call it from a blocking task.
pub fn run(clay: Clay, handle: Handle) -> anyhow::Result<()> {
    let mut repl = Repl::new(clay, handle)?;
    repl.run()?;
    Ok(())
}

impl Repl {
    /// Create a new shell
    pub fn new(clay: Clay, handle: Handle) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ClayHelper { clay: clay.clone() }));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clay")
            .join(HISTORY_FILE);
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.load_history(&history_path);

        Ok(Self {
            clay,
            handle,
            editor,
            history_path,
        })
    }

    /// Run the main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "clay>".bright_green().bold());
            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match ReplCommand::parse(trimmed) {
                        Some((cmd, arg)) => match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        },
                        None => {
                            eprintln!(
                                "{}: unknown command '{}', try {}",
                                "Error".red().bold(),
                                trimmed,
                                ".help".cyan()
                            );
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        Ok(())
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Version => {
                println!("clay v{}", clay_loader::VERSION);
            }
            ReplCommand::Knead => match arg {
                Some(arg) => self.knead(arg),
                None => usage(".knead <module>..."),
            },
            ReplCommand::Fetch => match arg {
                Some(id) => match self.clay.fetch(id) {
                    Ok(value) => match serde_json::to_string_pretty(&value) {
                        Ok(text) => println!("{}", text),
                        Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
                    },
                    Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
                },
                None => usage(".fetch <module>"),
            },
            ReplCommand::Depend => match arg.and_then(|a| a.split_once('=')) {
                Some((module, deps)) => {
                    let deps: Vec<String> = deps
                        .split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(String::from)
                        .collect();
                    println!(
                        "{} {} {}",
                        module.trim().cyan(),
                        "->".dimmed(),
                        deps.join(", ")
                    );
                    self.clay.depend([(module.trim().to_string(), deps)]);
                }
                None => usage(".depend <module>=<dep>,..."),
            },
            ReplCommand::Modules => {
                let modules = self.clay.modules();
                if modules.is_empty() {
                    println!("{}", "(no modules registered)".dimmed());
                }
                for module in modules {
                    println!("  {}", module.cyan());
                }
            }
            ReplCommand::Pending => {
                println!(
                    "in flight: {}, queued callbacks: {}",
                    self.clay.in_flight().yellow(),
                    self.clay.pending_callbacks().yellow()
                );
            }
        }
        CommandResult::Continue
    }

    fn knead(&self, arg: &str) {
        let modules: ModuleList = arg.split_whitespace().map(String::from).collect();
        let count = modules.len();
        match self.handle.block_on(self.clay.knead_async(modules)) {
            Ok(()) => println!("{} {} module(s)", "loaded".green(), count),
            Err(e) => eprintln!("{}: {}", "Error".red().bold(), e),
        }
    }

    fn print_banner(&self) {
        println!(
            "{} {} {}",
            "clay".bright_cyan().bold(),
            "v".dimmed(),
            clay_loader::VERSION.bright_yellow()
        );
        println!(
            "Type {} for help, {} to exit",
            ".help".cyan(),
            ".exit".cyan()
        );
        println!();
    }

    fn print_help(&self) {
        println!("{}", "Commands:".white().bold());
        for (usage, description) in ReplCommand::all_commands() {
            println!("  {:<30} {}", usage.cyan(), description.dimmed());
        }
    }
}

fn usage(text: &str) {
    eprintln!("{}: {}", "Usage".yellow().bold(), text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ReplCommand::parse(".knead a b"),
            Some((ReplCommand::Knead, Some("a b")))
        );
        assert_eq!(ReplCommand::parse(".q"), Some((ReplCommand::Exit, None)));
        assert_eq!(
            ReplCommand::parse("  .depend x=y "),
            Some((ReplCommand::Depend, Some("x=y")))
        );
        assert_eq!(ReplCommand::parse("knead a"), None);
        assert_eq!(ReplCommand::parse(".unknown"), None);
    }
}
