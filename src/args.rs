//! Command-line argument parsing.
//!
//! Global flags may appear anywhere; the first positional argument selects
//! the command and the rest are its operands. No command means `run`.

/// Which query surface `show` prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowQuery {
    Config,
    Events,
    Event(usize),
    Store,
    Next,
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the control loop until interrupted
    Run {
        debug_enabled: bool,
        simulate: bool,
        log_file: Option<String>,
        config_dir: Option<String>,
    },
    /// Apply one configure command to the persisted schedule
    Configure {
        json: String,
        config_dir: Option<String>,
    },
    /// Apply one submit-event command to the persisted schedule
    Event {
        json: String,
        config_dir: Option<String>,
    },
    /// Print one of the query surfaces
    Show {
        query: ShowQuery,
        config_dir: Option<String>,
    },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown or malformed arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments (including the program name) into an action.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut simulate = false;
        let mut log_file: Option<String> = None;
        let mut config_dir: Option<String> = None;
        let mut unknown_arg_found = false;
        let mut positionals: Vec<String> = Vec::new();

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = args_vec[i].as_str();
            match arg {
                "-d" | "--debug" => debug_enabled = true,
                "-h" | "--help" => display_help = true,
                "-V" | "-v" | "--version" => display_version = true,
                "-S" | "--simulate" => simulate = true,
                "-c" | "--config" | "-l" | "--log" => {
                    let Some(value) = args_vec.get(i + 1) else {
                        unknown_arg_found = true;
                        break;
                    };
                    if matches!(arg, "-c" | "--config") {
                        config_dir = Some(value.clone());
                    } else {
                        log_file = Some(value.clone());
                    }
                    i += 1;
                }
                // JSON operands start with '{', so anything else dashed is a flag.
                _ if arg.starts_with('-') => unknown_arg_found = true,
                _ => positionals.push(arg.to_string()),
            }
            i += 1;
        }

        let action = if display_version {
            CliAction::ShowVersion
        } else if display_help {
            CliAction::ShowHelp
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else {
            let command = positionals.first().map(String::as_str);
            let operands = positionals.get(1..).unwrap_or_default();
            match (command, operands) {
                (None | Some("run"), []) => CliAction::Run {
                    debug_enabled,
                    simulate,
                    log_file,
                    config_dir,
                },
                (Some("configure"), [json]) => CliAction::Configure {
                    json: json.clone(),
                    config_dir,
                },
                (Some("event"), [json]) => CliAction::Event {
                    json: json.clone(),
                    config_dir,
                },
                (Some("show"), operands) => match parse_show_query(operands) {
                    Some(query) => CliAction::Show { query, config_dir },
                    None => CliAction::ShowHelpDueToError,
                },
                (Some("help"), []) => CliAction::ShowHelp,
                (Some("version"), []) => CliAction::ShowVersion,
                _ => CliAction::ShowHelpDueToError,
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_show_query(operands: &[String]) -> Option<ShowQuery> {
    let words: Vec<&str> = operands.iter().map(String::as_str).collect();
    match words.as_slice() {
        [] | ["next"] => Some(ShowQuery::Next),
        ["config"] => Some(ShowQuery::Config),
        ["events"] => Some(ShowQuery::Events),
        ["event", index] => index.parse().ok().map(ShowQuery::Event),
        ["store"] => Some(ShowQuery::Store),
        _ => None,
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("smartflag [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-l, --log <file>       Write run output to a file");
    log_indented!("-S, --simulate         Run on accelerated simulated time");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Run the halyard control loop (default)");
    log_indented!("configure '<json>'     Apply scheduler settings (LAT, LNG, STD, DST, ZIP, FED, STA, FPR, FLG)");
    log_indented!("event '<json>'         Submit a flag event (IDV, JUR, FLG, BMK, EMK, DEL)");
    log_indented!("show [query]           Print next | config | events | event <n> | store");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_action(debug_enabled: bool, simulate: bool) -> CliAction {
        CliAction::Run {
            debug_enabled,
            simulate,
            log_file: None,
            config_dir: None,
        }
    }

    #[test]
    fn test_parse_no_args() {
        let parsed = ParsedArgs::parse(vec!["smartflag"]);
        assert_eq!(parsed.action, run_action(false, false));
    }

    #[test]
    fn test_parse_run_flags() {
        let parsed = ParsedArgs::parse(vec!["smartflag", "run", "--debug", "-S"]);
        assert_eq!(parsed.action, run_action(true, true));

        let parsed = ParsedArgs::parse(vec![
            "smartflag",
            "--log",
            "/tmp/flag.log",
            "run",
            "-c",
            "/etc/smartflag",
        ]);
        assert_eq!(
            parsed.action,
            CliAction::Run {
                debug_enabled: false,
                simulate: false,
                log_file: Some("/tmp/flag.log".to_string()),
                config_dir: Some("/etc/smartflag".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_commands_with_json() {
        let parsed = ParsedArgs::parse(vec!["smartflag", "configure", r#"{"LAT":40.7}"#]);
        assert_eq!(
            parsed.action,
            CliAction::Configure {
                json: r#"{"LAT":40.7}"#.to_string(),
                config_dir: None,
            }
        );

        let parsed = ParsedArgs::parse(vec!["smartflag", "--config", "d", "event", "{}"]);
        assert_eq!(
            parsed.action,
            CliAction::Event {
                json: "{}".to_string(),
                config_dir: Some("d".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_show_queries() {
        let show = |words: &[&str]| {
            let mut args = vec!["smartflag", "show"];
            args.extend_from_slice(words);
            ParsedArgs::parse(args).action
        };

        assert_eq!(
            show(&[]),
            CliAction::Show {
                query: ShowQuery::Next,
                config_dir: None
            }
        );
        assert_eq!(
            show(&["event", "3"]),
            CliAction::Show {
                query: ShowQuery::Event(3),
                config_dir: None
            }
        );
        assert_eq!(
            show(&["store"]),
            CliAction::Show {
                query: ShowQuery::Store,
                config_dir: None
            }
        );
        assert_eq!(show(&["event", "x"]), CliAction::ShowHelpDueToError);
        assert_eq!(show(&["everything"]), CliAction::ShowHelpDueToError);
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(
            ParsedArgs::parse(vec!["smartflag", "-h"]).action,
            CliAction::ShowHelp
        );
        assert_eq!(
            ParsedArgs::parse(vec!["smartflag", "help"]).action,
            CliAction::ShowHelp
        );
        assert_eq!(
            ParsedArgs::parse(vec!["smartflag", "--help", "--version"]).action,
            CliAction::ShowVersion
        );
    }

    #[test]
    fn test_malformed_arguments() {
        for args in [
            vec!["smartflag", "--bogus"],
            vec!["smartflag", "configure"],
            vec!["smartflag", "event", "{}", "{}"],
            vec!["smartflag", "run", "extra"],
            vec!["smartflag", "--config"],
            vec!["smartflag", "dance"],
        ] {
            assert_eq!(
                ParsedArgs::parse(args.clone()).action,
                CliAction::ShowHelpDueToError,
                "{args:?}"
            );
        }
    }
}
