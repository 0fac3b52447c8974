use crate::{
    error::PlannerError, BudgetLevel, Language, PlannerConfig, PlanningRequest, Tier,
    TripPlanner,
};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Arg, ArgMatches, Command};
use tracing::{error, info};

/// CLI entry point for the trip planner
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();

    let mut config = PlannerConfig::from_env().context("failed to load configuration")?;
    if let Some(provider) = matches.get_one::<String>("provider") {
        config.provider = provider.clone();
    }

    let request = match request_from_matches(&matches) {
        Ok(request) => request,
        Err(err) => return fail(err),
    };
    let user_id = matches
        .get_one::<String>("user")
        .map(String::as_str)
        .unwrap_or("cli");
    let tier: Tier = match parse_arg(&matches, "tier") {
        Ok(tier) => tier,
        Err(err) => return fail(err),
    };

    let planner = TripPlanner::from_config(&config)
        .await
        .context("failed to initialize the trip planner")?;
    info!(
        "Planning trip to {} with provider {}",
        request.destination_label(),
        planner.generator().provider_name()
    );

    match planner.plan_trip(user_id, tier, &request).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.plan)?);
            println!(
                "\nRemaining generations this year: {}/{}",
                outcome.usage.remaining, outcome.usage.limit
            );
            info!("Plan generated successfully");
            Ok(())
        }
        Err(err) => fail(err),
    }
}

fn command() -> Command {
    Command::new("trip-planner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate an AI travel itinerary, gated by a yearly usage quota")
        .arg(
            Arg::new("destination")
                .help("Destination city or region")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("country")
                .short('c')
                .long("country")
                .value_name("COUNTRY")
                .help("Country of the destination"),
        )
        .arg(
            Arg::new("budget")
                .short('b')
                .long("budget")
                .value_name("LEVEL")
                .help("Budget level: high, medium or low")
                .default_value("medium"),
        )
        .arg(
            Arg::new("start")
                .short('s')
                .long("start")
                .value_name("YYYY-MM-DD")
                .help("First day of the trip")
                .required(true),
        )
        .arg(
            Arg::new("end")
                .short('e')
                .long("end")
                .value_name("YYYY-MM-DD")
                .help("Last day of the trip")
                .required(true),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("LANG")
                .help("Plan language: zh or en")
                .default_value("zh"),
        )
        .arg(
            Arg::new("provider")
                .short('p')
                .long("provider")
                .value_name("PROVIDER")
                .help("AI provider: google, laozhang or openrouter (or set AI_PROVIDER)"),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("USER_ID")
                .help("User whose quota is charged")
                .default_value("cli"),
        )
        .arg(
            Arg::new("tier")
                .short('t')
                .long("tier")
                .value_name("TIER")
                .help("Subscription tier: free or vip")
                .default_value("free"),
        )
}

fn request_from_matches(matches: &ArgMatches) -> Result<PlanningRequest, PlannerError> {
    let destination = matches
        .get_one::<String>("destination")
        .cloned()
        .unwrap_or_default();
    let budget: BudgetLevel = parse_arg(matches, "budget")?;
    let language: Language = parse_arg(matches, "language")?;
    let start = parse_date(matches, "start")?;
    let end = parse_date(matches, "end")?;

    let mut request = PlanningRequest::new(destination, budget, start, end).with_language(language);
    if let Some(country) = matches.get_one::<String>("country") {
        request = request.with_country(country.clone());
    }
    request.validate()?;
    Ok(request)
}

fn parse_arg<T>(matches: &ArgMatches, name: &str) -> Result<T, PlannerError>
where
    T: std::str::FromStr<Err = PlannerError>,
{
    matches
        .get_one::<String>(name)
        .ok_or_else(|| PlannerError::InvalidRequest(format!("--{name} is required")))?
        .parse()
}

fn parse_date(matches: &ArgMatches, name: &str) -> Result<NaiveDate, PlannerError> {
    let raw = matches
        .get_one::<String>(name)
        .ok_or_else(|| PlannerError::InvalidRequest(format!("--{name} is required")))?;
    raw.parse().map_err(|err| {
        PlannerError::InvalidRequest(format!("--{name} `{raw}` is not a YYYY-MM-DD date: {err}"))
    })
}

fn fail(err: PlannerError) -> anyhow::Result<()> {
    error!("Trip planning failed: {}", err);
    eprintln!("{}", serde_json::to_string_pretty(&err.to_error_payload())?);
    Err(err.into())
}
