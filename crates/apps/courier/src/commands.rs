//! Command parsing and execution

use anyhow::{Context, Result, bail};
use log::info;
use serde::Serialize;
use triage::search::{parse_search, to_query};
use triage::{
    PlanType, ProcessedEmailTracker, Settings, SubscriptionStore, TokenRateLimiter, UsageLedger,
    plan_catalog,
};

pub const USAGE: &str = "\
Usage: courier <command> [args]

Commands:
  parse [--max N] <query...>   Parse a Gmail search string into a filter
  to-query <query...>          Rewrite a search string in canonical order
  usage <user>                 Show today's usage record
  record <user> <count>        Record processed emails for today
  can-process <user>           Check whether the user is under today's limit
  plans                        List subscription plans
  subscribe <user> <plan>      Create or change a user's plan
  cancel <user>                Cancel a user's subscription
  subscription <user>          Show a user's subscription
  tracking <user>              Prune old processed-email entries and show stats
  rate-limit                   Show the token budget for the current minute
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Parse { query: String, max: Option<usize> },
    ToQuery { query: String },
    Usage { user: String },
    Record { user: String, count: u64 },
    CanProcess { user: String },
    Plans,
    Subscribe { user: String, plan: PlanType },
    Cancel { user: String },
    Subscription { user: String },
    Tracking { user: String },
    RateLimit,
    Help,
}

impl Command {
    /// Parse command-line arguments (without the program name)
    pub fn from_args(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "parse" => {
                let (max, rest) = match rest {
                    [flag, value, tail @ ..] if flag == "--max" => {
                        let max = value
                            .parse()
                            .with_context(|| format!("--max expects a number, got {value:?}"))?;
                        (Some(max), tail)
                    }
                    _ => (None, rest),
                };
                Command::Parse {
                    query: rest.join(" "),
                    max,
                }
            }
            "to-query" => Command::ToQuery {
                query: rest.join(" "),
            },
            "usage" => Command::Usage {
                user: single_arg(rest, "usage <user>")?,
            },
            "record" => match rest {
                [user, count] => Command::Record {
                    user: user.clone(),
                    count: count
                        .parse()
                        .with_context(|| format!("count must be a number, got {count:?}"))?,
                },
                _ => bail!("expected: record <user> <count>"),
            },
            "can-process" => Command::CanProcess {
                user: single_arg(rest, "can-process <user>")?,
            },
            "plans" => Command::Plans,
            "subscribe" => match rest {
                [user, plan] => Command::Subscribe {
                    user: user.clone(),
                    plan: plan.parse()?,
                },
                _ => bail!("expected: subscribe <user> <plan>"),
            },
            "cancel" => Command::Cancel {
                user: single_arg(rest, "cancel <user>")?,
            },
            "subscription" => Command::Subscription {
                user: single_arg(rest, "subscription <user>")?,
            },
            "tracking" => Command::Tracking {
                user: single_arg(rest, "tracking <user>")?,
            },
            "rate-limit" => Command::RateLimit,
            "help" | "-h" | "--help" => Command::Help,
            other => bail!("unknown command: {other}\n\n{USAGE}"),
        };

        Ok(command)
    }
}

/// Run a command and return what should be printed
pub fn run(command: Command, settings: &Settings) -> Result<String> {
    let subscriptions = SubscriptionStore::new(settings.subscriptions_path());
    let ledger = UsageLedger::new(settings.usage_path(), settings.plan_limits);

    match command {
        Command::Parse { query, max } => {
            let filter =
                parse_search(&query).with_max_emails(max.unwrap_or(settings.default_max_emails));
            to_json(&filter)
        }
        Command::ToQuery { query } => Ok(to_query(&parse_search(&query))),
        Command::Usage { user } => {
            to_json(&ledger.get_usage_for_today(&user, settings.is_admin(&user)))
        }
        Command::Record { user, count } => {
            let plan = subscriptions.effective_plan(&user);
            let record = ledger.record_usage(&user, plan, count, settings.is_admin(&user))?;
            to_json(&record)
        }
        Command::CanProcess { user } => {
            let is_admin = settings.is_admin(&user);
            Ok(format!(
                "{} ({} remaining today)",
                ledger.can_process_more(&user, is_admin),
                ledger.remaining_today(&user, is_admin)
            ))
        }
        Command::Plans => to_json(&plan_catalog(&settings.plan_limits)),
        Command::Subscribe { user, plan } => {
            let changed = subscriptions.change_plan(&user, plan)?;
            if !changed {
                subscriptions.create(&user, plan)?;
            }
            info!("{} is now on the {} plan", user, plan);
            to_json(&subscriptions.get(&user))
        }
        Command::Cancel { user } => {
            if !subscriptions.cancel(&user)? {
                bail!("no subscription for {user}");
            }
            to_json(&subscriptions.get(&user))
        }
        Command::Subscription { user } => match subscriptions.get(&user) {
            Some(subscription) => to_json(&subscription),
            None => bail!("no subscription for {user}"),
        },
        Command::Tracking { user } => {
            let mut tracker = ProcessedEmailTracker::open(&settings.data_dir, &user);
            tracker.cleanup_older_than(settings.tracking_retention_days)?;
            to_json(&tracker.statistics())
        }
        Command::RateLimit => {
            let limiter =
                TokenRateLimiter::new(settings.rate_limit_path(), settings.max_tokens_per_minute);
            to_json(&limiter.stats())
        }
        Command::Help => Ok(USAGE.to_string()),
    }
}

fn single_arg(rest: &[String], expected: &str) -> Result<String> {
    match rest {
        [value] => Ok(value.clone()),
        _ => bail!("expected: {expected}"),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
