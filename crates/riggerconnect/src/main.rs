//! `rigger` - CLI for riggerconnect
//!
//! This binary submits feedback, records roll history and browses the
//! activity log from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;

use riggerconnect::cli::{
    ActivityCommand, ActivityListCommand, Cli, Command, ConfigCommand, FeedbackCommand,
    OutputFormat, PurgeCommand, RollAddCommand, RollCommand, RollListCommand, RollUpdateCommand,
};
use riggerconnect::feedback::{FeedbackRequest, Recipient};
use riggerconnect::monitoring::{traces, RiggerEventType, RiggerOperationType};
use riggerconnect::storage::{ActivityLogFilter, RollHistoryFilter};
use riggerconnect::{init_logging, ActivityLogEntry, ActivityType, Config, RollHistoryEntry, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Config commands must work even when the database can't be opened.
    let command = match cli.command {
        Command::Config(cmd) => return handle_config(&config, cmd),
        other => other,
    };

    let services = match Services::init(&config) {
        Ok(services) => services,
        Err(e) if e.is_database_error() => bail!(
            "cannot open database {}: {e} (check storage.database_path)",
            config.database_path().display()
        ),
        Err(e) => return Err(e).context("initializing services"),
    };

    match command {
        Command::Feedback(cmd) => handle_feedback(&services, cmd).await,
        Command::Roll(cmd) => handle_roll(&services, cmd).await,
        Command::Activity(cmd) => handle_activity(&services, cmd).await,
        Command::Purge(cmd) => handle_purge(&services, &cmd).await,
        Command::Status(cmd) => handle_status(&services, &config, cmd.json).await,
        Command::Config(_) => Ok(()),
    }
}

async fn handle_feedback(services: &Services, cmd: FeedbackCommand) -> anyhow::Result<()> {
    let feedback = &services.feedback;
    match cmd {
        FeedbackCommand::Submit {
            category,
            message,
            email,
            name,
            no_system_info,
        } => {
            let mut request = FeedbackRequest::new(category, message);
            if no_system_info {
                request = request.include_system_info(false);
            }
            if let Some(email) = email {
                request = request.with_email(email);
            }
            if let Some(name) = name {
                request = request.with_name(name);
            }
            feedback.send_feedback(request).await;
            println!("Feedback queued: {}", category.route().subject);
        }
        FeedbackCommand::Report {
            feedback_type,
            details,
            priority,
        } => {
            let details: BTreeMap<_, _> = details.into_iter().collect();
            let effective = priority.unwrap_or_else(|| feedback_type.implied_priority());
            feedback
                .send_rigger_feedback(feedback_type, details, priority)
                .await;
            if feedback_type == riggerconnect::RiggerFeedbackType::SafetyViolation {
                services
                    .crash
                    .log_rigger_event(RiggerEventType::SafetyReport, BTreeMap::new());
            }
            println!(
                "Rigger feedback queued: {} ({effective})",
                feedback_type.route().subject
            );
        }
        FeedbackCommand::Error {
            message,
            stack_trace,
        } => {
            feedback
                .send_error_report(&message, stack_trace.as_deref())
                .await;
            println!("Error report queued.");
        }
        FeedbackCommand::Compose {
            category,
            message,
            to,
            uri,
        } => {
            let recipient = Recipient::from(to);
            let email = feedback.compose_email(category, &message, recipient);
            feedback
                .open_email_feedback(category, &message, Some(recipient))
                .await;
            println!("To:      {}", email.recipients.join(", "));
            println!("Subject: {}", email.subject);
            println!();
            print!("{}", email.body);
            if uri {
                println!();
                println!("{}", email.to_mailto_uri());
            }
        }
    }
    Ok(())
}

async fn handle_roll(services: &Services, cmd: RollCommand) -> anyhow::Result<()> {
    let repo = &services.repository;
    match cmd {
        RollCommand::Add(add) => {
            let trace = services
                .performance
                .monitor_rigger_operation(RiggerOperationType::EquipmentAdd, BTreeMap::new());
            let id = repo.insert_roll_history(roll_from_args(add)).await?;
            services.performance.stop_trace(&trace, BTreeMap::new());
            println!("Recorded roll history entry {id}");
        }
        RollCommand::Update(update) => {
            let Some(entry) = repo.roll_history_by_id(update.id).await? else {
                bail!("no roll history entry with id {}", update.id);
            };
            if repo.update_roll_history(apply_update(entry, update)).await? {
                println!("Updated roll history entry");
            } else {
                println!("Entry vanished before it could be updated");
            }
        }
        RollCommand::Delete { id } => {
            let Some(entry) = repo.roll_history_by_id(id).await? else {
                bail!("no roll history entry with id {id}");
            };
            repo.delete_roll_history(entry).await?;
            println!("Deleted roll history entry {id}");
        }
        RollCommand::Show { roll_id, json } => {
            let Some(entry) = repo.roll_history_by_roll_id(&roll_id).await? else {
                bail!("no roll history for '{roll_id}'");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_roll_detail(&entry);
            }
        }
        RollCommand::List(list) => handle_roll_list(services, list).await?,
    }
    Ok(())
}

async fn handle_roll_list(services: &Services, list: RollListCommand) -> anyhow::Result<()> {
    let filter = match (list.user, list.since, list.until) {
        (Some(user), _, _) => RollHistoryFilter::User(user),
        (None, None, None) => RollHistoryFilter::All,
        (None, since, until) => RollHistoryFilter::DateRange {
            start: since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            end: until.unwrap_or_else(Utc::now),
        },
    };

    let trace = services.performance.start_trace(traces::DATABASE_OPERATION);
    let rows = services
        .repository
        .roll_history(filter, Some(list.limit))
        .await?;
    services.performance.stop_trace(
        &trace,
        BTreeMap::from([("query".to_string(), "roll_history".to_string())]),
    );

    match list.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!(
                    "{} {} {} {}",
                    row.timestamp.format("%Y-%m-%d %H:%M"),
                    row.roll_id,
                    row.status,
                    row.description
                );
            }
        }
        OutputFormat::Table => {
            println!(
                "{:>6}  {:<16}  {:<12}  {:<12}  {:<12}  DESCRIPTION",
                "ID", "WHEN", "ROLL", "USER", "STATUS"
            );
            for row in &rows {
                println!(
                    "{:>6}  {:<16}  {:<12}  {:<12}  {:<12}  {}",
                    row.id.unwrap_or_default(),
                    row.timestamp.format("%Y-%m-%d %H:%M"),
                    row.roll_id,
                    row.user_id,
                    row.status,
                    row.description
                );
            }
            println!("{} entries", rows.len());
        }
    }
    Ok(())
}

async fn handle_activity(services: &Services, cmd: ActivityCommand) -> anyhow::Result<()> {
    match cmd {
        ActivityCommand::List(list) => handle_activity_list(services, list).await,
        ActivityCommand::Log {
            activity_type,
            description,
            user,
            entity_id,
            entity_type,
            metadata,
        } => {
            let mut entry =
                ActivityLogEntry::new(user, ActivityType::from(activity_type), description);
            if let Some(id) = entity_id {
                entry = entry.related_to(id, entity_type.unwrap_or_default());
            }
            if let Some(metadata) = metadata {
                entry = entry.with_metadata(metadata);
            }
            let id = services.repository.log_activity(entry).await?;
            println!("Logged activity {id}");
            Ok(())
        }
    }
}

async fn handle_activity_list(
    services: &Services,
    list: ActivityListCommand,
) -> anyhow::Result<()> {
    let filter = if let Some(user) = list.user.clone() {
        ActivityLogFilter::User(user)
    } else if let Some(activity_type) = list.activity_type() {
        ActivityLogFilter::Type(activity_type)
    } else if let Some(id) = list.entity_id.clone() {
        ActivityLogFilter::Entity {
            id,
            entity_type: list.entity_type.clone(),
        }
    } else if let Some(start) = list.since {
        ActivityLogFilter::DateRange {
            start,
            end: list.until.unwrap_or_else(Utc::now),
        }
    } else {
        ActivityLogFilter::All
    };

    let rows = services
        .repository
        .activity_logs(filter, Some(list.limit))
        .await?;

    match list.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain | OutputFormat::Table => {
            for row in &rows {
                let related = match (&row.related_entity_type, &row.related_entity_id) {
                    (Some(t), Some(id)) => format!(" [{t} {id}]"),
                    _ => String::new(),
                };
                println!(
                    "{}  {:<22}  {:<12}  {}{related}",
                    row.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    row.activity_type,
                    row.user_id,
                    row.description
                );
            }
        }
    }
    Ok(())
}

async fn handle_purge(services: &Services, cmd: &PurgeCommand) -> anyhow::Result<()> {
    let now = Utc::now();
    let cutoff = match (cmd.before, services.repository.retention()) {
        (Some(before), _) => before,
        (None, Some(retention)) => now - retention,
        (None, None) => {
            println!("Retention is unlimited; pass --before to purge.");
            return Ok(());
        }
    };

    if cmd.dry_run {
        println!("Would delete rows older than {cutoff}");
        return Ok(());
    }

    let stats = services.repository.purge_older_than(cutoff).await?;
    println!(
        "Deleted {} roll history and {} activity log rows older than {cutoff}",
        stats.roll_history, stats.activity_logs
    );
    Ok(())
}

async fn handle_status(services: &Services, config: &Config, json: bool) -> anyhow::Result<()> {
    let stats = services.repository.stats().await?;
    let outbox = services.outbox.pending().await?.len();
    let performance = services.performance.report();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "storage": stats,
            "outbox_dir": services.outbox.dir(),
            "outbox_pending": outbox,
            "performance": performance,
            "app_version": config.app.version,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("rigger status");
        println!("-------------");
        println!("Database:      {}", config.database_path().display());
        println!("Roll history:  {}", stats.roll_history_count);
        println!("Activity log:  {}", stats.activity_log_count);
        if let (Some(oldest), Some(newest)) = (stats.oldest_entry, stats.newest_entry) {
            println!("Date range:    {oldest} .. {newest}");
        }
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Outbox:        {} ({outbox} pending)", services.outbox.dir().display());
        println!(
            "Monitoring:    {}",
            if performance.monitoring_enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Retention (days):   {}", config.storage.retention_days);
                println!();
                println!("[Feedback]");
                println!("  Support:            {}", config.feedback.support_email);
                println!("  Business:           {}", config.feedback.business_email);
                println!("  Technical:          {}", config.feedback.technical_email);
                println!("  Outbox:             {}", config.outbox_dir().display());
                println!(
                    "  System info:        {}",
                    config.feedback.include_system_info
                );
                println!();
                println!("[Monitoring]");
                println!("  Analytics:          {}", config.monitoring.analytics_enabled);
                println!(
                    "  Crash reporting:    {}",
                    config.monitoring.crash_reporting_enabled
                );
                println!(
                    "  Performance:        {}",
                    config.monitoring.performance_enabled
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn roll_from_args(add: RollAddCommand) -> RollHistoryEntry {
    let mut entry = RollHistoryEntry::new(add.roll_id, add.user, add.description, add.status);
    entry.equipment_id = add.equipment;
    entry.weight = add.weight;
    entry.location = add.location;
    entry.notes = add.notes;
    if let Some(at) = add.at {
        entry = entry.at(at);
    }
    entry
}

fn apply_update(mut entry: RollHistoryEntry, update: RollUpdateCommand) -> RollHistoryEntry {
    if let Some(description) = update.description {
        entry.description = description;
    }
    if let Some(status) = update.status {
        entry.status = status;
    }
    if update.equipment.is_some() {
        entry.equipment_id = update.equipment;
    }
    if update.weight.is_some() {
        entry.weight = update.weight;
    }
    if update.location.is_some() {
        entry.location = update.location;
    }
    if update.notes.is_some() {
        entry.notes = update.notes;
    }
    entry
}

fn print_roll_detail(entry: &RollHistoryEntry) {
    println!("Roll:        {}", entry.roll_id);
    println!("Row id:      {}", entry.id.unwrap_or_default());
    println!("User:        {}", entry.user_id);
    println!("When:        {}", entry.timestamp);
    println!("Status:      {}", entry.status);
    println!("Description: {}", entry.description);
    if let Some(equipment) = &entry.equipment_id {
        println!("Equipment:   {equipment}");
    }
    if let Some(weight) = entry.weight {
        println!("Weight:      {weight} kg");
    }
    if let Some(location) = &entry.location {
        println!("Location:    {location}");
    }
    if let Some(notes) = &entry.notes {
        println!("Notes:       {notes}");
    }
}
