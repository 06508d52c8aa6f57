//! # Command Line Interface
//!
//! Subcommand surface over the client library. Data results print as
//! JSON on stdout; progress and prompts go to stderr so output can be
//! piped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::facebook::FacebookCoordinator;
use crate::models::{
    CreateCampaignRequest, JobStatus, LocationHit, LoginRequest, RegisterRequest,
    UpdateCampaignRequest,
};
use crate::poller::{JobPoller, PollOptions};
use crate::popup::{CommandPopupLauncher, PopupLauncher};
use crate::publisher::{PublishOutcome, Publisher};
use crate::search::LocationSearcher;
use crate::session::CampaignSession;
use crate::store::{FileStorage, SessionStore, keys};

#[derive(Parser)]
#[command(name = "adlaunch")]
#[command(version)]
#[command(about = "Turn a landing page into a ready-to-publish Meta ad campaign", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the account session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the signed-in account
    Whoami,
    /// Sign out and drop the stored account session
    Logout,
    /// Analyze a landing page and wait for the generated ad pack
    Analyze {
        /// Landing page URL to analyze
        url: String,
        /// Start the job and print its id without waiting
        #[arg(long)]
        no_wait: bool,
    },
    /// Check a job's status once, without waiting
    Status { job_id: String },
    /// Wait for a started job and store its ad pack
    Wait { job_id: String },
    /// List the generated ad creatives
    Ads,
    /// Pick one creative from the generated pack
    SelectAd { index: usize },
    /// Show or update the campaign draft settings
    Draft {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        page_id: Option<String>,
        #[arg(long)]
        ad_account_id: Option<String>,
        /// Daily budget in major currency units
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long)]
        days: Option<u32>,
        /// Platform call-to-action key, e.g. LEARN_MORE or SIGN_UP
        #[arg(long)]
        cta: Option<String>,
    },
    /// Connect a Facebook account through the login popup
    Connect,
    /// Show the Facebook connection status
    FbStatus {
        /// Re-check against the backend instead of the local cache
        #[arg(long)]
        refresh: bool,
    },
    /// Disconnect the Facebook account
    Disconnect,
    /// Publish the drafted campaign to the connected ad account
    Publish,
    /// Search targetable cities
    Locations {
        /// Query text; omit to read queries line by line from stdin
        query: Option<String>,
    },
    /// Manage campaigns saved on the backend
    Campaigns {
        #[command(subcommand)]
        action: CampaignCommands,
    },
    /// Clear campaign-scoped local state
    Reset,
}

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// List saved campaigns
    List,
    /// Save a campaign, optionally attaching the stored ad pack
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        with_pack: bool,
    },
    /// Show one saved campaign
    Show { id: String },
    /// Update a saved campaign
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a saved campaign
    Delete { id: String },
}

/// Everything a command needs, wired once per invocation.
pub struct App {
    pub api: ApiClient,
    pub store: SessionStore,
    pub session: CampaignSession,
    pub facebook: Arc<FacebookCoordinator>,
    pub publisher: Publisher,
    pub searcher: LocationSearcher,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api = ApiClient::new(config.base_url()?).context("building API client")?;

        let storage = Arc::new(FileStorage::new(&config.state_dir));
        let store = SessionStore::new(storage, Duration::from_secs(config.session.ttl_secs));
        if let Some(cookie) = store.get::<String>(keys::ACCOUNT_COOKIE) {
            api.set_session_cookie(Some(cookie));
        }

        let poller = JobPoller::new(api.clone(), config.poller.clone());
        let session = CampaignSession::new(api.clone(), poller, store.clone());

        let launcher: Arc<dyn PopupLauncher> = match &config.popup_command {
            Some(command) => Arc::new(CommandPopupLauncher::with_command(command.clone())),
            None => Arc::new(CommandPopupLauncher::new()),
        };
        let facebook = Arc::new(FacebookCoordinator::new(
            api.clone(),
            store.clone(),
            launcher,
            config.facebook.clone(),
        ));
        let publisher = Publisher::new(api.clone(), facebook.clone());
        let searcher = LocationSearcher::new(api.clone(), config.search.clone());

        Ok(Self {
            api,
            store,
            session,
            facebook,
            publisher,
            searcher,
        })
    }
}

/// Dispatch one parsed invocation.
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let app = App::new(&config)?;
    match cli.command {
        Commands::Login { email, password } => login(&app, email, password).await,
        Commands::Register {
            email,
            password,
            name,
        } => register(&app, email, password, name).await,
        Commands::Whoami => whoami(&app).await,
        Commands::Logout => logout(&app).await,
        Commands::Analyze { url, no_wait } => analyze(&app, url, no_wait).await,
        Commands::Status { job_id } => status(&app, job_id).await,
        Commands::Wait { job_id } => wait(&app, job_id).await,
        Commands::Ads => ads(&app),
        Commands::SelectAd { index } => select_ad(&app, index),
        Commands::Draft {
            name,
            page_id,
            ad_account_id,
            budget,
            days,
            cta,
        } => draft(&app, name, page_id, ad_account_id, budget, days, cta),
        Commands::Connect => connect(&app).await,
        Commands::FbStatus { refresh } => fb_status(&app, refresh).await,
        Commands::Disconnect => disconnect(&app).await,
        Commands::Publish => publish(&app).await,
        Commands::Locations { query } => locations(&app, query).await,
        Commands::Campaigns { action } => campaigns(&app, action).await,
        Commands::Reset => reset(&app),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn login(app: &App, email: String, password: String) -> Result<()> {
    let user = app.api.login(&LoginRequest { email, password }).await?;
    persist_account_cookie(app);
    eprintln!("Signed in as {}", user.email);
    Ok(())
}

async fn register(app: &App, email: String, password: String, name: Option<String>) -> Result<()> {
    let user = app
        .api
        .register(&RegisterRequest {
            email,
            password,
            name,
        })
        .await?;
    persist_account_cookie(app);
    eprintln!("Registered {}", user.email);
    Ok(())
}

fn persist_account_cookie(app: &App) {
    match app.api.session_cookie() {
        Some(cookie) => app.store.set(keys::ACCOUNT_COOKIE, &cookie),
        None => app.store.remove(keys::ACCOUNT_COOKIE),
    }
}

async fn whoami(app: &App) -> Result<()> {
    let user = app.api.me().await?;
    print_json(&user)
}

async fn logout(app: &App) -> Result<()> {
    let result = app.api.logout().await;
    // The stored copy goes regardless of what the backend said.
    app.store.remove(keys::ACCOUNT_COOKIE);
    result?;
    eprintln!("Signed out");
    Ok(())
}

async fn analyze(app: &App, url: String, no_wait: bool) -> Result<()> {
    if no_wait {
        let started = app.session.start_analysis(&url).await?;
        return print_json(&started);
    }
    let pack = app.session.analyze(&url, watch_options()).await?;
    print_json(&pack)
}

async fn status(app: &App, job_id: String) -> Result<()> {
    let record = app.api.get_job(&job_id).await?;
    print_json(&record)
}

async fn wait(app: &App, job_id: String) -> Result<()> {
    let pack = app.session.wait_for_result(&job_id, watch_options()).await?;
    print_json(&pack)
}

/// Progress to stderr on each status change; ctrl-c cancels the poll.
fn watch_options() -> PollOptions {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let last: Mutex<Option<JobStatus>> = Mutex::new(None);
    PollOptions {
        on_progress: Some(Box::new(move |observed| {
            let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref() != Some(&observed) {
                eprintln!("analysis {observed}");
                *last = Some(observed);
            }
        })),
        cancel: Some(cancel),
    }
}

fn ads(app: &App) -> Result<()> {
    let pack = app
        .session
        .ad_pack()
        .context("no ad pack stored; run an analysis first")?;
    let selected = app.session.selected_ad().map(|(index, _)| index);
    for (index, ad) in pack.ads.iter().enumerate() {
        let marker = if selected == Some(index) { "*" } else { " " };
        println!("{marker} [{index}] {}", ad.headline);
        if !ad.primary_text.is_empty() {
            println!("      {}", ad.primary_text);
        }
    }
    Ok(())
}

fn select_ad(app: &App, index: usize) -> Result<()> {
    let creative = app.session.select_ad(index)?;
    eprintln!("Selected [{index}] {}", creative.headline);
    Ok(())
}

fn draft(
    app: &App,
    name: Option<String>,
    page_id: Option<String>,
    ad_account_id: Option<String>,
    budget: Option<f64>,
    days: Option<u32>,
    cta: Option<String>,
) -> Result<()> {
    let mut draft = app.session.draft();
    let mut changed = false;
    if let Some(name) = name {
        draft.campaign_name = Some(name);
        changed = true;
    }
    if let Some(page_id) = page_id {
        draft.page_id = Some(page_id);
        changed = true;
    }
    if let Some(ad_account_id) = ad_account_id {
        draft.ad_account_id = Some(ad_account_id);
        changed = true;
    }
    if let Some(budget) = budget {
        draft.daily_budget = budget;
        changed = true;
    }
    if let Some(days) = days {
        draft.duration_days = days;
        changed = true;
    }
    if let Some(cta) = cta {
        draft.call_to_action = cta;
        changed = true;
    }
    if changed {
        app.session.save_draft(&draft);
    }
    print_json(&draft)
}

async fn connect(app: &App) -> Result<()> {
    eprintln!("Opening the Facebook login page; finish signing in from the browser window.");
    let status = app.facebook.connect().await?;
    print_json(&status)
}

async fn fb_status(app: &App, refresh: bool) -> Result<()> {
    let status = if refresh {
        app.facebook.refresh_status().await?
    } else {
        app.facebook.status()
    };
    print_json(&status)
}

async fn disconnect(app: &App) -> Result<()> {
    app.facebook.disconnect().await;
    eprintln!("Facebook account disconnected");
    Ok(())
}

async fn publish(app: &App) -> Result<()> {
    match app.publisher.publish_draft(&app.session).await? {
        PublishOutcome::Published(response) => print_json(&response),
        PublishOutcome::PaymentRequired { add_payment_url } => {
            eprintln!("The ad account has no payment method yet.");
            if let Some(url) = add_payment_url {
                eprintln!("Add one at: {url}");
            }
            Ok(())
        }
    }
}

async fn locations(app: &App, query: Option<String>) -> Result<()> {
    match query {
        Some(query) => {
            let hits = app.searcher.search(&query).await?;
            print_json(&hits)
        }
        None => interactive_locations(app).await,
    }
}

type SearchTask = JoinHandle<Option<Result<Vec<LocationHit>, ApiError>>>;

/// Reads queries line by line; each new line supersedes the pending one,
/// so only a query that survives the debounce window reaches the
/// backend. An empty line quits.
async fn interactive_locations(app: &App) -> Result<()> {
    eprintln!("Type a location query and press enter; an empty line quits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<SearchTask> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    break;
                }
                pending = Some(app.searcher.search_debounced(&line));
            }
            outcome = resolve(&mut pending) => {
                pending = None;
                match outcome? {
                    Some(Ok(hits)) => print_hits(&hits),
                    Some(Err(err)) => eprintln!("search failed: {err}"),
                    None => {}
                }
            }
        }
    }
    Ok(())
}

/// Completes with the pending search's outcome, or never when nothing is
/// pending.
async fn resolve(
    pending: &mut Option<SearchTask>,
) -> std::result::Result<Option<Result<Vec<LocationHit>, ApiError>>, tokio::task::JoinError> {
    match pending.as_mut() {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

fn print_hits(hits: &[LocationHit]) {
    if hits.is_empty() {
        println!("(no matches)");
        return;
    }
    for hit in hits {
        let mut place = hit.name.clone();
        if let Some(region) = &hit.region {
            place.push_str(", ");
            place.push_str(region);
        }
        place.push_str(", ");
        place.push_str(&hit.country_name);
        println!("{}  {place}", hit.key);
    }
}

async fn campaigns(app: &App, action: CampaignCommands) -> Result<()> {
    match action {
        CampaignCommands::List => {
            let listing = app.api.list_campaigns().await?;
            print_json(&listing.campaigns)
        }
        CampaignCommands::Create { name, with_pack } => {
            let ad_pack = if with_pack {
                Some(
                    app.session
                        .ad_pack()
                        .context("no ad pack stored; run an analysis first")?,
                )
            } else {
                None
            };
            let record = app
                .api
                .create_campaign(&CreateCampaignRequest { name, ad_pack })
                .await?;
            print_json(&record)
        }
        CampaignCommands::Show { id } => {
            let record = app.api.get_campaign(&id).await?;
            print_json(&record)
        }
        CampaignCommands::Update { id, name, status } => {
            let record = app
                .api
                .update_campaign(
                    &id,
                    &UpdateCampaignRequest {
                        name,
                        status,
                        ad_pack: None,
                    },
                )
                .await?;
            print_json(&record)
        }
        CampaignCommands::Delete { id } => {
            app.api.delete_campaign(&id).await?;
            eprintln!("Deleted campaign {id}");
            Ok(())
        }
    }
}

fn reset(app: &App) -> Result<()> {
    app.session.reset();
    eprintln!("Campaign state cleared");
    Ok(())
}
