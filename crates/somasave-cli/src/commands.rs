use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::Utc;
use somasave_core::auth::{Session, SessionData};
use somasave_core::cache::{
    CacheRouter, CacheStorage, DiskStorage, HttpFetcher, Request, ResponseSource, RouteError, Routed,
};
use somasave_core::deposit::{DepositEvent, DepositFlow, DepositOptions, TokioScheduler};
use somasave_core::models::DashboardStats;
use somasave_core::worker::ServiceWorker;
use somasave_core::{ApiClient, ApiError, Config};
use tracing::{debug, warn};

use crate::terminal::{TerminalClients, TerminalNotifier};

/// Offline stores live under this directory of the cache dir.
const OFFLINE_DIR: &str = "offline";

const STATS_PATH: &str = "/api/dashboard/stats/";

pub struct Context {
    pub config: Config,
    pub session: Session,
    pub cache_dir: PathBuf,
}

impl Context {
    pub fn load() -> Result<Self> {
        let mut config = Config::load().context("Failed to load config")?;
        config.apply_env();
        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));

        let mut session = Session::new(cache_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Ignoring unreadable session");
        }

        Ok(Self {
            config,
            session,
            cache_dir,
        })
    }

    fn api(&self) -> Result<ApiClient> {
        let api = ApiClient::new(self.config.api_base_url())?;
        Ok(match self.session.token() {
            Some(token) => api.with_token(token),
            None => api,
        })
    }

    fn require_session(&self) -> Result<&SessionData> {
        self.session
            .data
            .as_ref()
            .filter(|_| self.session.is_valid())
            .ok_or_else(|| anyhow!("Not logged in - run `somasave login` first"))
    }

    fn router(&self, api: &ApiClient) -> Result<CacheRouter<DiskStorage, HttpFetcher>> {
        let app_url = self.config.app_url()?;
        let storage = DiskStorage::new(self.cache_dir.join(OFFLINE_DIR))?;
        let mut fetcher = HttpFetcher::with_client(api.http().clone(), app_url.origin());
        if let Some(token) = self.session.token() {
            fetcher = fetcher.with_token(token);
        }
        Ok(CacheRouter::new(
            &app_url,
            self.config.cache_version,
            Arc::new(storage),
            Arc::new(fetcher),
        ))
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn api_hint(e: ApiError) -> anyhow::Error {
    match e {
        ApiError::Unauthorized => anyhow!("Session expired - run `somasave login` again"),
        other => other.into(),
    }
}

pub async fn login(ctx: &mut Context, username: Option<String>, otp: Option<String>) -> Result<()> {
    let identifier = match username
        .or_else(|| std::env::var("SOMASAVE_USERNAME").ok())
        .or_else(|| ctx.config.last_username.clone())
    {
        Some(u) => u,
        None => prompt("Email or student ID: ")?,
    };
    let password = match std::env::var("SOMASAVE_PASSWORD") {
        Ok(p) => p,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    let api = ApiClient::new(ctx.config.api_base_url())?;
    let response = api.login(&identifier, &password, otp.as_deref()).await?;
    let Some(token) = response.token else {
        let message = response
            .message
            .unwrap_or_else(|| "Verification required".to_string());
        bail!("{} - rerun with --otp <code>", message);
    };

    let user = response.user;
    ctx.session.update(SessionData {
        token,
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name(),
        phone_number: user.phone_number.clone(),
        created_at: Utc::now(),
    });
    ctx.session.save().context("Failed to save session")?;

    ctx.config.last_username = Some(identifier);
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to remember username");
    }

    println!("Logged in as {}", user.display_name());
    Ok(())
}

pub async fn logout(ctx: &mut Context) -> Result<()> {
    if ctx.session.is_valid() {
        if let Err(e) = ctx.api()?.logout().await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
    }
    ctx.session.clear()?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let saved = ctx.require_session()?;
    match ctx.api()?.current_user().await {
        Ok(user) => {
            println!("{} ({})", user.display_name(), user.username);
            if !user.email.is_empty() {
                println!("  Email:  {}", user.email);
            }
            if let Some(ref phone) = user.phone_number {
                println!("  Phone:  {}", phone);
            }
            if let Some(ref university) = user.university_name {
                println!("  School: {}", university);
            }
        }
        Err(e) if e.is_network() => {
            debug!(error = %e, "Offline, showing saved session");
            println!("{} ({}) [offline]", saved.display_name, saved.username);
        }
        Err(e) => return Err(api_hint(e)),
    }
    println!(
        "  Session expires in {}h {}m",
        saved.minutes_until_expiry() / 60,
        saved.minutes_until_expiry() % 60
    );
    Ok(())
}

pub async fn stats(ctx: &Context) -> Result<()> {
    ctx.require_session()?;
    let api = ctx.api()?;
    let router = ctx.router(&api)?;
    let url = ctx.config.app_url()?.join(STATS_PATH)?;
    let request = Request::get(url).with_header("accept", "application/json");

    let response = match router.handle(&request).await {
        Ok(Routed::Handled(response)) => response,
        Ok(Routed::Bypass) => bail!("Dashboard request was not routed"),
        Err(RouteError::Unavailable { source, .. }) => {
            bail!("Could not reach SomaSave and nothing is cached yet ({})", source)
        }
    };

    let snapshot = &response.snapshot;
    if !snapshot.is_cacheable() {
        let body = snapshot.text();
        return Err(api_hint(ApiError::from_code(snapshot.status, &body)));
    }

    let stats: DashboardStats = snapshot.json().context("Unexpected dashboard response")?;
    println!("Savings:  {}", stats.savings_balance);
    println!("Loans:    {}", stats.loan_balance);
    println!("Shares:   {}", stats.shares);
    if !stats.recent_transactions.is_empty() {
        println!();
        println!("Recent transactions:");
        for tx in &stats.recent_transactions {
            println!(
                "  {:<12} {:<24} {:>16}",
                tx.date.as_deref().unwrap_or(""),
                tx.kind,
                tx.amount.to_string()
            );
        }
        println!("  Credits: {}", stats.total_credits());
    }
    if response.source == ResponseSource::Cache {
        println!();
        println!("Offline - showing figures cached {}", snapshot.age_display());
    }
    Ok(())
}

pub async fn deposit(ctx: &Context, amount: &str, phone: Option<String>) -> Result<()> {
    let saved = ctx.require_session()?;
    let phone = phone
        .or_else(|| saved.phone_number.clone())
        .ok_or_else(|| anyhow!("No phone number on your profile - pass --phone"))?;

    let options = DepositOptions {
        max_poll_duration: ctx.config.max_poll_duration(),
        ..Default::default()
    };
    let (flow, mut events) = DepositFlow::new(Arc::new(ctx.api()?), Arc::new(TokioScheduler::new()), options);

    let refs = flow.submit(amount, &phone).await?;
    println!("Approve the payment on {} (ref {})", phone, refs.internal_reference);
    println!("Waiting for confirmation... press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(DepositEvent::Succeeded(receipt)) => {
                    println!("Deposit of {} successful!", receipt.amount);
                    if let Some(balance) = receipt.new_balance {
                        println!("New balance: {}", balance);
                    }
                    return Ok(());
                }
                Some(DepositEvent::Failed(reason)) => bail!(reason),
                Some(DepositEvent::TimedOut) => bail!("No confirmation received - check your phone and try again"),
                Some(DepositEvent::Closed) | None => bail!("Deposit closed before it was confirmed"),
                Some(other) => debug!(?other, "Deposit event"),
            },
            _ = tokio::signal::ctrl_c() => {
                flow.cancel();
                println!();
                println!("Stopped waiting. If you approved the payment it will still reach your account.");
                return Ok(());
            }
        }
    }
}

pub async fn cache_list(ctx: &Context) -> Result<()> {
    let storage = DiskStorage::new(ctx.cache_dir.join(OFFLINE_DIR))?;
    let names = somasave_core::cache::CacheNames::new(ctx.config.cache_version);

    let stores = storage.store_names().await?;
    if stores.is_empty() {
        println!("Offline cache is empty");
        return Ok(());
    }
    for store in stores {
        let keys = storage.keys(&store).await?;
        let marker = if names.is_current(&store) { "" } else { " (old version)" };
        println!("{}{}: {} entries", store, marker, keys.len());
        for key in keys {
            if let Some(snapshot) = storage.get(&store, &key).await? {
                println!("  {}  {}", key, snapshot.age_display());
            }
        }
    }
    Ok(())
}

pub async fn cache_install(ctx: &Context) -> Result<()> {
    let api = ctx.api()?;
    let router = ctx.router(&api)?;
    let mut worker = ServiceWorker::new(
        ctx.config.app_url()?,
        router,
        Arc::new(TerminalClients),
        Arc::new(TerminalNotifier),
    );

    let removed = worker.start().await?;
    println!(
        "Cached the app shell for offline use (version {})",
        worker.router().names().version()
    );
    for store in removed {
        println!("Removed {}", store);
    }
    Ok(())
}

pub async fn cache_activate(ctx: &Context) -> Result<()> {
    let api = ctx.api()?;
    let removed = ctx.router(&api)?.activate().await?;
    if removed.is_empty() {
        println!("Nothing to clean up");
    }
    for store in removed {
        println!("Removed {}", store);
    }
    Ok(())
}

pub async fn cache_clear(ctx: &Context) -> Result<()> {
    let storage = DiskStorage::new(ctx.cache_dir.join(OFFLINE_DIR))?;
    let mut count = 0;
    for store in storage.store_names().await? {
        if storage.delete_store(&store).await? {
            count += 1;
        }
    }
    println!("Deleted {} store(s)", count);
    Ok(())
}
