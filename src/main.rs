mod cli;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use console::Style;
use tracing::{debug, info};

use cli::{Cli, Command, ContactArgs};
use tryon::backend::{HttpBackend, JobBackend};
use tryon::channels::{
    BroadcastEventSource, JobEventSource, ManualChannel, PollSettings, WebSocketEventSource,
};
use tryon::config::TryOnConfig;
use tryon::coordinator::JobResultCoordinator;
use tryon::demo::{SimulatedBackend, push_completion_after};
use tryon::session::{
    FileSessionStore, MemorySessionStore, TabSession, TabSessionStore, new_tab_key,
};
use tryon::state_machine::{ContactInfo, JobId, MediaRef, OrderState, Phase};
use tryon::ui::{self, TryOnProgress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tryon::logging::init(cli.verbose);

    let config = TryOnConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    debug!(api = %config.api_base_url, push = ?config.push_url, "configuration loaded");

    match cli.command {
        Command::Run {
            garment,
            photo,
            contact,
            tab,
        } => {
            let garment = parse_media(&garment)?;
            let photo = parse_media(&photo)?;
            let tab = tab.unwrap_or_else(new_tab_key);
            println!("Tab: {tab}");

            let backend = Arc::new(http_backend(&config));
            let source = event_source(&config);
            let store = FileSessionStore::new(config.session_dir.clone());
            let mut coordinator = JobResultCoordinator::new(
                backend,
                &*source,
                store,
                tab,
                config.poll_settings(),
            );
            let progress = attach_progress(&mut coordinator, "Submitting job…");

            coordinator.submit_job(garment, photo).await?;
            if let Some(info) = contact_from_flags(&contact) {
                coordinator.submit_info(info).await?;
            }
            let outcome = drive(&mut coordinator, &contact).await;
            progress.finish();
            coordinator.shutdown();
            outcome?;
        }

        Command::Resume { tab, contact } => {
            let backend = Arc::new(http_backend(&config));
            let source = event_source(&config);
            let store = FileSessionStore::new(config.session_dir.clone());
            let mut coordinator = JobResultCoordinator::resume(
                backend,
                &*source,
                store,
                tab,
                config.poll_settings(),
            )?;
            let progress = attach_progress(&mut coordinator, "Resuming…");
            info!(phase = %coordinator.phase(), "resuming flow");

            if coordinator.phase() == Phase::Failed {
                progress.finish();
                let error = coordinator.state().error.clone().unwrap_or_default();
                coordinator.acknowledge_failure()?;
                bail!("job had failed ({error}); tab reset");
            }
            let outcome = drive(&mut coordinator, &contact).await;
            progress.finish();
            coordinator.shutdown();
            outcome?;
        }

        Command::ConfirmOrder { tab, order_id } => {
            let source = BroadcastEventSource::new();
            let store = FileSessionStore::new(config.session_dir.clone());
            let mut coordinator = JobResultCoordinator::resume(
                Arc::new(http_backend(&config)),
                &source,
                store,
                tab.clone(),
                config.poll_settings(),
            )?;
            let found = order_id.is_some();
            if !coordinator.settle_order(order_id)? {
                println!("Tab {tab} has no order of unknown outcome.");
            } else if found {
                println!("Order recorded for tab {tab}.");
            } else {
                println!("Order marked as not created; run `tryon resume --tab {tab}` to retry.");
            }
            coordinator.shutdown();
        }

        Command::Check { job_id } => {
            let manual = ManualChannel::new(Arc::new(http_backend(&config)));
            let result = manual.inspect(&JobId::new(job_id)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Status { tab } => {
            let store = FileSessionStore::new(config.session_dir.clone());
            match TabSession::load(&store, &tab)? {
                Some(session) => ui::print_session(&tab, &session),
                None => println!("No saved session for tab {tab}."),
            }
        }

        Command::Reset { tab } => {
            let store = FileSessionStore::new(config.session_dir.clone());
            store.delete(&tab)?;
            println!("Session for tab {tab} cleared.");
        }

        Command::Demo => run_demo().await?,
    }

    Ok(())
}

fn http_backend(config: &TryOnConfig) -> HttpBackend {
    HttpBackend::with_base_url(config.api_key.clone(), config.api_base_url.clone())
}

/// Pushed events come over WebSocket when configured; otherwise the push
/// channel listens to a source nobody publishes on.
fn event_source(config: &TryOnConfig) -> Box<dyn JobEventSource> {
    match &config.push_url {
        Some(url) => {
            let source = WebSocketEventSource::new(url.clone());
            source.spawn();
            Box::new(source)
        }
        None => Box::new(BroadcastEventSource::new()),
    }
}

fn attach_progress<B: JobBackend, S: TabSessionStore>(
    coordinator: &mut JobResultCoordinator<B, S>,
    message: &str,
) -> TryOnProgress {
    let progress = TryOnProgress::start(message);
    let sink = progress.clone();
    coordinator.on_state_change(move |change| sink.handle(change));
    progress
}

/// Runs the flow until an order exists.
async fn drive<B: JobBackend, S: TabSessionStore>(
    coordinator: &mut JobResultCoordinator<B, S>,
    contact: &ContactArgs,
) -> anyhow::Result<()> {
    loop {
        match coordinator.phase() {
            Phase::AwaitingResult => {
                coordinator.wait_for_result().await?;
                if coordinator.phase() != Phase::AwaitingResult {
                    continue;
                }
                if !coordinator.manual_check_available() {
                    bail!("job event channels closed before a result arrived");
                }
                coordinator.observe_externally().await?;
                if coordinator.phase() == Phase::AwaitingResult {
                    bail!(
                        "job is still processing; run `tryon resume --tab {}` later",
                        coordinator.tab_key()
                    );
                }
            }
            Phase::Gated => {
                let info = prompt_contact(contact)?;
                coordinator.submit_info(info).await?;
            }
            Phase::Displayed => {
                if coordinator.state().order_state == OrderState::Unknown {
                    let tab = coordinator.tab_key();
                    bail!(
                        "order outcome for tab {tab} is unknown; check the order store, then run \
                         `tryon confirm-order --tab {tab} [--order-id <id>]`"
                    );
                }
                coordinator.retry_order().await?;
            }
            Phase::Complete => return Ok(()),
            Phase::Failed => {
                let error = coordinator.state().error.clone().unwrap_or_default();
                bail!("job failed: {error}");
            }
            Phase::Idle | Phase::OrderPending => {
                bail!("nothing to resume in phase {}", coordinator.phase());
            }
        }
    }
}

fn contact_from_flags(contact: &ContactArgs) -> Option<ContactInfo> {
    match (&contact.name, &contact.email) {
        (Some(name), Some(email)) => Some(ContactInfo {
            name: name.clone(),
            email: email.clone(),
            phone: contact.phone.clone(),
        }),
        _ => None,
    }
}

/// Asks for whatever contact details the flags did not provide.
fn prompt_contact(defaults: &ContactArgs) -> anyhow::Result<ContactInfo> {
    if let Some(info) = contact_from_flags(defaults) {
        return Ok(info);
    }
    let name = match &defaults.name {
        Some(name) => name.clone(),
        None => ask("Name")?,
    };
    let email = match &defaults.email {
        Some(email) => email.clone(),
        None => ask("E-mail")?,
    };
    let phone = match &defaults.phone {
        Some(phone) => Some(phone.clone()),
        None => Some(ask("Phone (optional)")?).filter(|p| !p.is_empty()),
    };
    Ok(ContactInfo { name, email, phone })
}

fn ask(label: &str) -> anyhow::Result<String> {
    let prompt = Style::new().cyan().bold();
    print!("{} ", prompt.apply_to(format!("{label}:")));
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading contact details")?;
    Ok(line.trim().to_string())
}

/// `http(s)://` stays a URL, `data:` stays inline, anything else is read from disk.
fn parse_media(input: &str) -> anyhow::Result<MediaRef> {
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(MediaRef::url(input));
    }
    if input.starts_with("data:") {
        return Ok(MediaRef::DataUri {
            uri: input.to_string(),
        });
    }
    let path = Path::new(input);
    let bytes = std::fs::read(path).with_context(|| format!("reading image {input}"))?;
    let content_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    Ok(MediaRef::Blob {
        content_type: content_type.to_string(),
        bytes,
    })
}

async fn run_demo() -> anyhow::Result<()> {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("─── tryon demo ───"));
    println!("Simulated backend; push and poll race for the same job.\n");

    let backend = Arc::new(SimulatedBackend::new(3));
    let source = BroadcastEventSource::new();
    let settings = PollSettings {
        initial_delay: Duration::from_secs(1),
        interval: Duration::from_secs(1),
        max_attempts: 10,
    };
    let mut coordinator = JobResultCoordinator::new(
        Arc::clone(&backend),
        &source,
        MemorySessionStore::new(),
        new_tab_key(),
        settings,
    );
    let progress = attach_progress(&mut coordinator, "Submitting job…");

    let job = coordinator
        .submit_job(
            MediaRef::url("https://example.invalid/garments/jacket.png"),
            MediaRef::DataUri {
                uri: "data:image/jpeg;base64,/9j/4AAQ".into(),
            },
        )
        .await?;
    push_completion_after(&source, job.id.clone(), Duration::from_millis(2500));

    let contact = ContactArgs {
        name: Some("Demo Customer".into()),
        email: Some("demo@example.invalid".into()),
        phone: None,
    };
    let outcome = drive(&mut coordinator, &contact).await;
    progress.finish();
    coordinator.shutdown();
    outcome?;

    println!(
        "\nOrders created: {} (job {})",
        backend.orders_created(),
        job.id
    );
    Ok(())
}
