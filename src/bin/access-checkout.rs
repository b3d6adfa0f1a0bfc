//! CLI tool for Access Checkout card validation and sessions.
//!
//! # Usage
//!
//! ```bash
//! # Validate a card number
//! access-checkout pan 4111111111111111
//!
//! # Validate a CVC against the brand of a card number
//! access-checkout cvc 1234 --pan 343434343434343
//!
//! # Validate an expiry date
//! access-checkout expiry 12/30
//!
//! # Format a card number the way the card field shows it
//! access-checkout format 343434343434343
//!
//! # Sanitise expiry date input
//! access-checkout sanitise-expiry 1225
//!
//! # Show the card configuration in use
//! access-checkout config --base-url https://try.access.worldpay.com/
//!
//! # Check a card-types document
//! access-checkout config --file cardTypes.json
//!
//! # Follow the discovery chain for a session type
//! access-checkout discover https://try.access.worldpay.com/ --session-type card
//!
//! # Request sessions
//! access-checkout session https://try.access.worldpay.com/ --checkout-id <id> \
//!     --pan 4111111111111111 --expiry 12/30 --cvc 123
//! ```
//!
//! Exit codes: `0` valid or succeeded, `1` invalid or failed, `2` bad usage.
//! Set `RUST_LOG=access_checkout=debug` to trace requests.

use access_checkout::client::{AccessCheckoutClient, CardDetails, SessionResponseListener};
use access_checkout::config::{try_parse_card_configuration, CardConfigurationProvider};
use access_checkout::discovery::{ApiDiscoveryClient, DiscoverLinks, DiscoveryCache};
use access_checkout::expiry::{sanitise_expiry_date, validate_expiry_date};
use access_checkout::http::{HttpClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use access_checkout::{
    cvc, format, mask, validate, AccessCheckoutError, CardConfiguration, SessionType,
};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "access-checkout")]
#[command(author, version, about = "Access Checkout card validation and session tool")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Fetch the card configuration from this base URL instead of using the built-in one
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a card number
    Pan {
        /// Card number (spaces allowed)
        pan: String,

        /// Only accept these brands
        #[arg(short, long, value_delimiter = ',')]
        accepted: Vec<String>,
    },

    /// Validate a CVC
    Cvc {
        /// CVC to validate
        cvc: String,

        /// Card number whose brand decides the CVC length
        #[arg(short, long)]
        pan: Option<String>,
    },

    /// Validate an MM/YY expiry date
    Expiry {
        /// Expiry date
        date: String,
    },

    /// Format a card number
    Format {
        /// Card number to format
        pan: String,

        /// Separator to use
        #[arg(short, long, default_value = format::SEPARATOR)]
        separator: String,
    },

    /// Rewrite expiry date input into MM/YY form
    SanitiseExpiry {
        /// Raw input
        text: String,
    },

    /// Print the card configuration in use, or check a card-types document
    Config {
        /// Card-types JSON file to check instead
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Resolve the session endpoint through the discovery chain
    Discover {
        /// Service base URL
        service_url: String,

        /// Session type whose chain to follow
        #[arg(short, long, default_value = "card")]
        session_type: SessionTypeArg,
    },

    /// Request session references
    Session {
        /// Service base URL
        service_url: String,

        /// Merchant checkout id
        #[arg(long)]
        checkout_id: String,

        /// Card number
        #[arg(long)]
        pan: Option<String>,

        /// Expiry date (MM/YY)
        #[arg(long)]
        expiry: Option<String>,

        /// CVC
        #[arg(long)]
        cvc: String,

        /// Session types to request
        #[arg(short, long, value_delimiter = ',', default_value = "card")]
        session_types: Vec<SessionTypeArg>,

        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SessionTypeArg {
    Card,
    Cvc,
}

impl From<SessionTypeArg> for SessionType {
    fn from(arg: SessionTypeArg) -> Self {
        match arg {
            SessionTypeArg::Card => SessionType::Card,
            SessionTypeArg::Cvc => SessionType::Cvc,
        }
    }
}

/// Outcome of a command.
enum Outcome {
    Valid,
    Invalid,
    Usage,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Valid => ExitCode::SUCCESS,
            Outcome::Invalid => ExitCode::from(1),
            Outcome::Usage => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: {error}");
            return Outcome::Invalid.into();
        }
    };

    let config = match &cli.base_url {
        Some(base_url) => match runtime.block_on(fetch_configuration(base_url)) {
            Ok(config) => config,
            Err(error) => return report_error(cli.json, &error).into(),
        },
        None => Arc::new(CardConfiguration::built_in()),
    };

    let outcome = match cli.command {
        Commands::Pan { pan, accepted } => cmd_pan(&pan, &accepted, &config, cli.json),
        Commands::Cvc { cvc, pan } => cmd_cvc(&cvc, pan.as_deref(), &config, cli.json),
        Commands::Expiry { date } => cmd_expiry(&date, &config, cli.json),
        Commands::Format { pan, separator } => cmd_format(&pan, &separator, &config, cli.json),
        Commands::SanitiseExpiry { text } => cmd_sanitise_expiry(&text, cli.json),
        Commands::Config { file: None } => cmd_config(&config, cli.json),
        Commands::Config { file: Some(path) } => match load_configuration(&path) {
            Ok(config) => cmd_config(&config, cli.json),
            Err(message) => {
                if cli.json {
                    println!("{}", json!({ "error": message }));
                } else {
                    eprintln!("Error: {message}");
                }
                Outcome::Invalid
            }
        },
        Commands::Discover {
            service_url,
            session_type,
        } => runtime.block_on(cmd_discover(&service_url, session_type.into(), cli.json)),
        Commands::Session {
            service_url,
            checkout_id,
            pan,
            expiry,
            cvc,
            session_types,
            timeout,
        } => {
            let mut builder = CardDetails::builder().cvc(cvc);
            if let Some(pan) = pan {
                builder = builder.pan(pan);
            }
            if let Some(expiry) = expiry {
                builder = builder.expiry_date(expiry);
            }
            let types: Vec<SessionType> = session_types.into_iter().map(Into::into).collect();

            match builder.build() {
                Ok(card) => runtime.block_on(cmd_session(
                    &service_url,
                    &checkout_id,
                    &card,
                    &types,
                    Duration::from_secs(timeout),
                    cli.json,
                )),
                Err(error) => {
                    report_error(cli.json, &error);
                    Outcome::Usage
                }
            }
        }
    };

    outcome.into()
}

async fn fetch_configuration(
    base_url: &str,
) -> Result<Arc<CardConfiguration>, AccessCheckoutError> {
    let http = HttpClient::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)?;
    let provider = CardConfigurationProvider::new(CardConfiguration::built_in());
    provider.fetch(&http, base_url).await?;
    Ok(provider.current())
}

fn load_configuration(path: &Path) -> Result<CardConfiguration, String> {
    let document = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    try_parse_card_configuration(&document).map_err(|e| e.to_string())
}

fn verdict(valid: bool) -> Outcome {
    if valid {
        Outcome::Valid
    } else {
        Outcome::Invalid
    }
}

fn report_error(as_json: bool, error: &AccessCheckoutError) -> Outcome {
    if as_json {
        println!("{}", json!({ "error": error.to_string() }));
    } else {
        eprintln!("Error: {error}");
    }
    Outcome::Invalid
}

fn cmd_pan(pan: &str, accepted: &[String], config: &CardConfiguration, as_json: bool) -> Outcome {
    let check = validate::check_pan(pan, config, accepted);
    let brand = check.brand.map(|b| b.name());
    let masked = mask::mask_pan(&validate::strip_spaces(pan));

    if as_json {
        println!(
            "{}",
            json!({
                "valid": check.is_valid(),
                "partial": check.result.partial,
                "complete": check.result.complete,
                "brand": brand,
                "brand_accepted": check.brand_accepted,
                "masked": masked,
            })
        );
    } else {
        println!("Valid: {}", if check.is_valid() { "yes" } else { "no" });
        println!("Brand: {}", brand.unwrap_or("unknown"));
        println!("Partial: {}", check.result.partial);
        if !check.brand_accepted {
            println!("Brand accepted: no");
        }
        println!("Masked: {masked}");
    }

    verdict(check.is_valid())
}

fn cmd_cvc(
    cvc_input: &str,
    pan: Option<&str>,
    config: &CardConfiguration,
    as_json: bool,
) -> Outcome {
    let (result, brand) = cvc::validate_cvc(cvc_input, pan, config);
    let brand = brand.map(|b| b.name());

    if as_json {
        println!(
            "{}",
            json!({
                "valid": result.complete,
                "partial": result.partial,
                "brand": brand,
            })
        );
    } else {
        println!("Valid: {}", if result.complete { "yes" } else { "no" });
        if let Some(brand) = brand {
            println!("Brand: {brand}");
        }
    }

    verdict(result.complete)
}

fn cmd_expiry(date: &str, config: &CardConfiguration, as_json: bool) -> Outcome {
    let result = validate_expiry_date(date, config, &Local::now());

    if as_json {
        println!(
            "{}",
            json!({ "valid": result.complete, "partial": result.partial })
        );
    } else {
        println!("Valid: {}", if result.complete { "yes" } else { "no" });
        if !result.complete && result.partial {
            println!("Incomplete");
        }
    }

    verdict(result.complete)
}

fn cmd_format(pan: &str, separator: &str, config: &CardConfiguration, as_json: bool) -> Outcome {
    let digits = format::strip_formatting(pan);
    let brand = access_checkout::detect::find_brand(&digits, config.brands());
    let formatted = format::format_pan_with_separator(&digits, brand, separator);

    if as_json {
        println!("{}", json!({ "formatted": formatted }));
    } else {
        println!("{formatted}");
    }
    Outcome::Valid
}

fn cmd_sanitise_expiry(text: &str, as_json: bool) -> Outcome {
    let sanitised = sanitise_expiry_date(text);

    if as_json {
        println!("{}", json!({ "sanitised": sanitised }));
    } else {
        println!("{sanitised}");
    }
    Outcome::Valid
}

fn cmd_config(config: &CardConfiguration, as_json: bool) -> Outcome {
    if as_json {
        let brands: Vec<_> = config
            .brands()
            .iter()
            .map(|brand| {
                json!({
                    "name": brand.name(),
                    "pattern": brand.pan_rule().matcher().map(|m| m.as_str()),
                    "panLengths": brand.pan_rule().valid_lengths(),
                    "cvvLength": brand.cvc_rule().valid_lengths(),
                })
            })
            .collect();
        println!("{}", json!({ "brands": brands }));
    } else if config.is_empty() {
        println!("No brands configured, default rules apply");
    } else {
        for brand in config.brands() {
            println!(
                "{:<12} pan {:?} cvc {:?}",
                brand.name(),
                brand.pan_rule().valid_lengths(),
                brand.cvc_rule().valid_lengths()
            );
        }
    }
    Outcome::Valid
}

async fn cmd_discover(service_url: &str, session_type: SessionType, as_json: bool) -> Outcome {
    let http = match HttpClient::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT) {
        Ok(http) => http,
        Err(error) => return report_error(as_json, &error.into()),
    };
    let client = ApiDiscoveryClient::new(http, Arc::new(DiscoveryCache::new()));
    let links = match session_type {
        SessionType::Card => DiscoverLinks::card_sessions(),
        SessionType::Cvc => DiscoverLinks::cvc_sessions(),
    };

    match client.discover(service_url, &links).await {
        Ok(url) => {
            if as_json {
                println!("{}", json!({ "session_type": session_type, "url": url.as_str() }));
            } else {
                println!("{url}");
            }
            Outcome::Valid
        }
        Err(error) => report_error(as_json, &error),
    }
}

type SessionResult = Result<HashMap<SessionType, String>, AccessCheckoutError>;

struct ChannelListener(mpsc::Sender<SessionResult>);

impl SessionResponseListener for ChannelListener {
    fn on_request_finished(&self, result: SessionResult) {
        let _ = self.0.send(result);
    }
}

async fn cmd_session(
    service_url: &str,
    checkout_id: &str,
    card: &CardDetails,
    session_types: &[SessionType],
    timeout: Duration,
    as_json: bool,
) -> Outcome {
    let (tx, rx) = mpsc::channel();

    let client = match AccessCheckoutClient::builder()
        .base_url(service_url)
        .checkout_id(checkout_id)
        .listener(Arc::new(ChannelListener(tx)))
        .build()
    {
        Ok(client) => client,
        Err(error) => {
            report_error(as_json, &error);
            return Outcome::Usage;
        }
    };

    let handles = match client.generate_sessions(card, session_types) {
        Ok(handles) => handles,
        Err(error) => {
            report_error(as_json, &error);
            return Outcome::Usage;
        }
    };

    if tokio::time::timeout(timeout, join_all(handles)).await.is_err() {
        eprintln!("Error: timed out after {}s", timeout.as_secs());
        return Outcome::Invalid;
    }

    match rx.try_recv() {
        Ok(Ok(sessions)) => {
            if as_json {
                println!("{}", json!({ "sessions": sessions }));
            } else {
                let mut sessions: Vec<_> = sessions.into_iter().collect();
                sessions.sort();
                for (session_type, href) in sessions {
                    println!("{session_type}: {href}");
                }
            }
            Outcome::Valid
        }
        Ok(Err(error)) => report_error(as_json, &error),
        Err(_) => {
            eprintln!("Error: no session response");
            Outcome::Invalid
        }
    }
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
