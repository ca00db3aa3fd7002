use std::collections::{HashMap, HashSet};

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, Command};
use tracing::debug;

use super::Loader;

/// Reads field values from command-line arguments.
///
/// Flag names join the prefix, field-set key and field key with `_` in lower case,
/// so field `db.host` is `--db_host`. Accepted forms are `--name=value`,
/// `--name value` and a bare `--name`, which sets `true`. Negative numbers are
/// read as values. A single leading dash works too. Parsing stops at `--`.
///
/// A bare flag takes the next plain argument as its value. Write `--name=true`
/// when a positional argument follows.
#[derive(Debug, Clone, Default)]
pub struct FlagLoader {
    key_prefix: String,
    args: Vec<String>,
}

impl FlagLoader {
    /// Reads the arguments of the current process.
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self::with_args(key_prefix, std::env::args().skip(1))
    }

    pub fn with_args<S: Into<String>>(
        key_prefix: impl Into<String>,
        args: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn flag_name(&self, field_set_key: &str, field_key: &str) -> String {
        [self.key_prefix.as_str(), field_set_key, field_key]
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    }

    /// Parses the stored arguments against one `--name` arg per requested flag.
    fn parse(&self, names: &HashSet<String>) -> HashMap<String, String> {
        let command = names.iter().fold(
            Command::new("flags")
                .no_binary_name(true)
                .ignore_errors(true)
                .args_override_self(true)
                .disable_help_flag(true)
                .disable_version_flag(true),
            |command, name| {
                command.arg(
                    Arg::new(name.clone())
                        .long(name.clone())
                        .action(ArgAction::Set)
                        .value_parser(ValueParser::string())
                        .num_args(0..=1)
                        .default_missing_value("true")
                        .allow_negative_numbers(true),
                )
            },
        );

        let matches = match command.try_get_matches_from(select_args(&self.args, names)) {
            Ok(matches) => matches,
            Err(e) => {
                debug!(error = %e, "flag arguments not parsed");
                return HashMap::new();
            }
        };

        names
            .iter()
            .filter_map(|name| {
                let value = matches.get_one::<String>(name)?;
                Some((name.clone(), value.clone()))
            })
            .collect()
    }
}

/// Keeps the requested flags, normalized to `--name`, and the argument after each
/// bare one when it can be a value.
///
/// Flags of other field-sets and positional arguments are dropped so they never
/// end the clap parse early.
fn select_args(args: &[String], names: &HashSet<String>) -> Vec<String> {
    let mut selected = Vec::new();
    let mut args = args.iter().take_while(|arg| *arg != "--").peekable();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            continue;
        };
        let (name, value) = match flag.split_once('=') {
            Some((name, value)) => (name.to_lowercase(), Some(value)),
            None => (flag.to_lowercase(), None),
        };
        if !names.contains(&name) {
            continue;
        }

        match value {
            Some(value) => selected.push(format!("--{name}={value}")),
            None => {
                selected.push(format!("--{name}"));
                if let Some(next) = args.next_if(|next| is_value(next)) {
                    selected.push(next.clone());
                }
            }
        }
    }

    selected
}

fn is_value(arg: &str) -> bool {
    !arg.starts_with('-') || arg.parse::<f64>().is_ok()
}

impl Loader for FlagLoader {
    fn name(&self) -> &str {
        "flag"
    }

    fn get_map(&self, field_set_key: &str, field_keys: &[String]) -> HashMap<String, String> {
        let names: HashMap<String, &String> = field_keys
            .iter()
            .map(|field_key| (self.flag_name(field_set_key, field_key), field_key))
            .collect();
        let values = self.parse(&names.keys().cloned().collect());

        names
            .into_iter()
            .filter_map(|(name, field_key)| Some((field_key.clone(), values.get(&name)?.clone())))
            .collect()
    }

    fn help_string(&self, field_set_key: &str, field_key: &str) -> String {
        format!("Flag argument: --{}", self.flag_name(field_set_key, field_key))
    }
}
