//! NutriFit CLI
//!
//! Command-line front end for NutriFit:
//! - Sign in through the identity provider (local callback listener)
//! - Browse recipes and the day's meals
//! - Talk to the nutrition coach
//! - Show the profile

use anyhow::{anyhow, bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use nutrifit::client::chat::ImageUpload;
use nutrifit::client::recipes::{RecipeCard, DEFAULT_PAGE_SIZE};
use nutrifit::client::translations::DEFAULT_NAMESPACE;
use nutrifit::client::{
    ApiClient, ChatClient, ChatSession, ImageClient, ProfileClient, RecipeClient, TrackingClient,
    TranslationClient,
};
use nutrifit::config::{generate_default_config, Config};
use nutrifit::session::{
    callback_router, AuthService, BearerInterceptor, CallbackOutcome, FileSessionStore,
    GuardDecision, OidcProvider, RouteGuard, SessionStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "nutrifit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diet and fitness tracking from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in through the identity provider
    Login {
        /// Seconds to wait for the browser redirect
        #[arg(long, default_value = "300")]
        timeout: u64,
    },

    /// Sign in with email and password
    LoginPassword {
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show who is signed in
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Create an account
    Register {
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        password: String,
    },

    /// Browse recipes
    Recipes {
        #[command(subcommand)]
        command: RecipeCommands,
    },

    /// Meals and workouts of a day
    Day {
        #[command(subcommand)]
        command: DayCommands,
    },

    /// Talk to the nutrition coach
    Chat {
        /// Message (omit with --clear)
        text: Vec<String>,
        /// Photos to build recipes from
        #[arg(short, long)]
        image: Vec<PathBuf>,
        /// Start a new conversation
        #[arg(long)]
        clear: bool,
    },

    /// Show the user profile
    Profile,

    /// Public URL of a stored image
    Image {
        /// File name (default: the logo)
        file: Option<String>,
    },

    /// Available languages and UI strings
    Translations {
        /// Language code; lists languages when omitted
        lang: Option<String>,
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RecipeCommands {
    /// One page of the catalogue
    List {
        #[arg(short, long, default_value = "0")]
        page: u32,
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },
    /// Search by text
    Search {
        query: String,
        #[arg(short, long, default_value = "0")]
        page: u32,
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        size: u32,
    },
    /// Full recipe
    Show { id: String },
    /// Known categories
    Categories,
    /// Generate a recipe with AI and save it
    Generate { prompt: Vec<String> },
}

#[derive(Subcommand)]
pub enum DayCommands {
    /// Totals, meals and workouts (default: today)
    Show { date: Option<String> },
    /// Calorie rings for the week
    Week { date: Option<String> },
    /// Remove a meal
    DeleteMeal { date: String, meal_id: String },
}

/// Everything the commands share
struct App {
    config: Config,
    store: Arc<dyn SessionStore>,
    auth: Arc<AuthService>,
    json: bool,
}

impl App {
    fn new(config: Config, json: bool) -> anyhow::Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::open(&config.session.store_path)
                .with_context(|| format!("opening session store {}", config.session.store_path))?,
        );
        let provider = Arc::new(OidcProvider::new(config.identity.to_identity_config()));
        let auth = Arc::new(AuthService::new(
            provider,
            Arc::clone(&store),
            config.api.auth_url(),
        ));

        Ok(Self {
            config,
            store,
            auth,
            json,
        })
    }

    fn interceptor(&self) -> Arc<BearerInterceptor> {
        Arc::new(BearerInterceptor::new(
            self.config.api.root_url(),
            Arc::clone(&self.store),
        ))
    }

    fn api(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(
            self.config.api.url.clone(),
            self.config.api.request_timeout_ms,
            Some(self.interceptor()),
        )?)
    }

    fn tracking_api(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(
            self.config.api.tracking_url(),
            self.config.api.request_timeout_ms,
            Some(self.interceptor()),
        )?)
    }

    /// The chat service is external and never sees the bearer token
    fn chat_api(&self) -> anyhow::Result<ApiClient> {
        Ok(ApiClient::new(
            self.config.chat.url.clone(),
            self.config.chat.request_timeout_ms,
            None,
        )?)
    }

    /// Run the route guard for the screen a command stands for
    async fn enter(&self, route: &str) -> anyhow::Result<()> {
        if self.auth.is_authenticated() && !self.auth.is_token_valid() {
            match self.auth.refresh_token().await {
                Ok(_) => tracing::info!("Access token refreshed"),
                Err(e) => tracing::warn!("Could not refresh expired token: {}", e),
            }
        }

        match RouteGuard::new(Arc::clone(&self.auth)).check(route) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::RedirectToLogin { location } => {
                bail!(
                    "not signed in, run `nutrifit-cli login` or open:\n  {}",
                    location
                )
            }
        }
    }

    fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn parse_date(date: Option<&str>) -> anyhow::Result<NaiveDate> {
    match date {
        None | Some("today") => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date {:?}, expected YYYY-MM-DD", s)),
    }
}

/// host:port the redirect URI points at
fn callback_addr(redirect_uri: &str) -> anyhow::Result<String> {
    let url = reqwest::Url::parse(redirect_uri)
        .with_context(|| format!("invalid redirect URI {}", redirect_uri))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("redirect URI {} has no host", redirect_uri))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect URI {} has no port", redirect_uri))?;
    Ok(format!("{}:{}", host, port))
}

async fn login(app: &App, timeout: u64) -> anyhow::Result<()> {
    let addr = callback_addr(&app.config.identity.redirect_uri)?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding callback listener on {}", addr))?;

    let (tx, mut rx) = mpsc::channel(1);
    let router = callback_router(Arc::clone(&app.auth), tx);

    println!("Open this URL to sign in:");
    println!();
    println!("  {}", app.auth.login_url());
    println!();
    println!("Waiting for the redirect on {} ...", addr);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(Duration::from_secs(timeout), rx.recv()).await;
    let _ = stop_tx.send(());
    if let Err(e) = server.await {
        tracing::warn!("Callback listener ended abnormally: {}", e);
    }

    match outcome {
        Ok(Some(CallbackOutcome::Authenticated { .. })) => {
            println!("Signed in as {}", app.auth.user_full_name());
            Ok(())
        }
        Ok(Some(CallbackOutcome::Failed { message, .. })) => bail!(message),
        Ok(None) => bail!("callback listener stopped without a result"),
        Err(_) => bail!("no redirect received within {}s", timeout),
    }
}

fn print_cards(cards: &[RecipeCard]) {
    if cards.is_empty() {
        println!("No recipes found.");
        return;
    }
    println!(
        "{:<38} {:<32} {:>6} {:>6} {:<10}",
        "ID", "Name", "kcal", "min", "Difficulty"
    );
    println!("{}", "-".repeat(96));
    for card in cards {
        println!(
            "{:<38} {:<32} {:>6} {:>6} {:<10}",
            card.id,
            truncate(&card.name, 32),
            card.calories,
            card.time,
            card.difficulty.as_str()
        );
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, &content)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let config = nutrifit::logging::with_bootstrap(|| Config::resolve(cli.config.as_deref()))?;
    nutrifit::logging::init(&config.logging);
    let app = App::new(config, cli.json)?;

    match cli.command {
        Commands::Config { .. } => unreachable!("handled before loading config"),

        Commands::Login { timeout } => login(&app, timeout).await?,

        Commands::LoginPassword { email, password } => {
            app.auth.login_direct(&email, &password).await?;
            println!("Signed in as {}", email);
        }

        Commands::Logout => {
            let landing = app.auth.logout()?;
            println!("Signed out ({})", landing);
        }

        Commands::Whoami => {
            app.enter("/dashboard").await?;
            let user = app.auth.current_user().unwrap_or_default();
            if app.json {
                app.print_json(&user)?;
            } else {
                println!("Name:  {}", app.auth.user_full_name());
                println!("Email: {}", app.auth.user_email().unwrap_or_else(|| "-".into()));
                println!(
                    "Token: {}",
                    if app.auth.is_token_valid() { "valid" } else { "expired" }
                );
            }
        }

        Commands::Refresh => {
            let response = app.auth.refresh_token().await?;
            match response.expires_in {
                Some(secs) => println!("Token refreshed, valid for {}s", secs),
                None => println!("Token refreshed"),
            }
        }

        Commands::Register {
            email,
            first_name,
            last_name,
            password,
        } => {
            let answer = app
                .auth
                .register(&email, &first_name, &last_name, &password)
                .await?;
            println!(
                "{}",
                answer.message.unwrap_or_else(|| "Account created".into())
            );
        }

        Commands::Recipes { command } => {
            app.enter("/recipes").await?;
            let client = RecipeClient::new(app.api()?);
            match command {
                RecipeCommands::List { page, size } => {
                    let recipes = client.list(page, size).await?;
                    if app.json {
                        app.print_json(&recipes)?;
                    } else {
                        print_cards(&recipes.iter().map(RecipeCard::from).collect::<Vec<_>>());
                    }
                }
                RecipeCommands::Search { query, page, size } => {
                    let recipes = client.search(&query, page, size).await?;
                    if app.json {
                        app.print_json(&recipes)?;
                    } else {
                        print_cards(&recipes.iter().map(RecipeCard::from).collect::<Vec<_>>());
                    }
                }
                RecipeCommands::Show { id } => {
                    app.enter(&format!("/recipes/{}", id)).await?;
                    let recipe = client.get(&id).await?;
                    if app.json {
                        app.print_json(&recipe)?;
                    } else {
                        let card = RecipeCard::from(&recipe);
                        println!("{}", card.name);
                        println!("{}", "=".repeat(card.name.chars().count()));
                        println!("{}", card.description);
                        println!();
                        println!("Category:   {}", card.category);
                        println!("Calories:   {}", card.calories);
                        println!("Time:       {} min", card.time);
                        println!("Difficulty: {}", card.difficulty.as_str());
                        println!("Image:      {}", card.image);
                        if let Some(instructions) = &recipe.instructions {
                            println!();
                            println!("{}", instructions);
                        }
                    }
                }
                RecipeCommands::Categories => {
                    for category in client.categories().await? {
                        println!("{}", category);
                    }
                }
                RecipeCommands::Generate { prompt } => {
                    let recipe = client.generate_ai(&prompt.join(" ")).await?;
                    println!("Created {} ({})", recipe.title, recipe.id);
                }
            }
        }

        Commands::Day { command } => {
            let client = TrackingClient::new(app.tracking_api()?);
            match command {
                DayCommands::Show { date } => {
                    let date = parse_date(date.as_deref())?;
                    app.enter(&format!("/calendar/{}", date)).await?;
                    let day = client.day(date).await?;
                    if app.json {
                        app.print_json(&day)?;
                    } else {
                        println!("{}", date.format("%A %d %B %Y"));
                        println!(
                            "Calories: {} in / {} target / {} burned ({} remaining)",
                            day.calories_in,
                            day.calories_target,
                            day.calories_out,
                            day.calories_remaining()
                        );
                        println!();
                        println!("Meals:");
                        for meal in &day.meals {
                            println!(
                                "  {:<6} {:<30} {:>5} kcal  [{}]",
                                meal.time,
                                truncate(&meal.recipe_name, 30),
                                meal.calories,
                                meal.id.as_deref().unwrap_or("-")
                            );
                        }
                        println!();
                        println!(
                            "Workouts: {} min, {} sets",
                            day.total_workout_minutes, day.total_sets
                        );
                        for workout in &day.workouts {
                            println!(
                                "  {:<6} {:<30} {:>4} min",
                                workout.time, workout.name, workout.duration_min
                            );
                        }
                    }
                }
                DayCommands::Week { date } => {
                    let date = parse_date(date.as_deref())?;
                    app.enter(&format!("/calendar/{}", date)).await?;
                    let rings = client.week_rings(date).await;
                    if app.json {
                        app.print_json(&rings)?;
                    } else {
                        for ring in rings {
                            println!(
                                "{} {}  {:>5}/{:<5} kcal  {}",
                                ring.label,
                                ring.date,
                                ring.calories_in,
                                ring.calories_target,
                                if ring.trained { "trained" } else { "rest" }
                            );
                        }
                    }
                }
                DayCommands::DeleteMeal { date, meal_id } => {
                    let date = parse_date(Some(&date))?;
                    app.enter(&format!("/calendar/{}", date)).await?;
                    let day = client.delete_meal(date, &meal_id).await?;
                    println!("Meal deleted, {} kcal remaining", day.calories_remaining());
                }
            }
        }

        Commands::Chat { text, image, clear } => {
            app.enter("/chat").await?;
            let mut session =
                ChatSession::open(ChatClient::new(app.chat_api()?), Arc::clone(&app.store))?;

            if clear {
                session.clear()?;
                println!("Conversation cleared.");
                if text.is_empty() && image.is_empty() {
                    return Ok(());
                }
            }

            let text = text.join(" ");
            let reply = if image.is_empty() {
                session.send(&text).await?
            } else {
                let mut uploads = Vec::with_capacity(image.len());
                for path in &image {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("reading image {:?}", path))?;
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "image".to_string());
                    uploads.push(ImageUpload { file_name, bytes });
                }
                session.analyze_images(uploads, Some(&text)).await?
            };

            match reply {
                Some(message) => {
                    if let Some(answer) = &message.text {
                        println!("{}", answer);
                    }
                    for recipe in message.recipes.iter().flatten() {
                        println!("  - {}", recipe.title);
                    }
                }
                None => {
                    for message in session.messages() {
                        println!("[{}] {}", message.time, message.text.as_deref().unwrap_or(""));
                    }
                }
            }
        }

        Commands::Profile => {
            app.enter("/profile").await?;
            let loaded = ProfileClient::new(app.api()?, Arc::clone(&app.store))
                .load()
                .await?;
            if app.json {
                app.print_json(&loaded.profile)?;
            } else {
                println!("Username:   {}", loaded.profile.username);
                println!("Email:      {}", loaded.profile.email);
                println!("First name: {}", loaded.profile.first_name);
                println!("Last name:  {}", loaded.profile.last_name);
                println!("Source:     {:?}", loaded.source);
            }
        }

        Commands::Image { file } => {
            let client = ImageClient::new(app.api()?);
            let response = match file {
                Some(file) => client.url_for(&file).await?,
                None => client.logo_url().await?,
            };
            match response.url {
                Some(url) => println!("{}", url),
                None => bail!(response.message.unwrap_or_else(|| "image not found".into())),
            }
        }

        Commands::Translations { lang, namespace } => {
            let api = ApiClient::new(
                app.config.api.translations_url(),
                app.config.api.request_timeout_ms,
                None,
            )?;
            let client = TranslationClient::new(api);
            match lang {
                None => {
                    let languages = client.languages().await;
                    if !client.is_backend_available() {
                        eprintln!("(backend unavailable, built-in list)");
                    }
                    for language in languages {
                        println!("{:<4} {}", language.code, language.native_name);
                    }
                }
                Some(lang) => {
                    let mut entries: Vec<_> =
                        client.namespace(&lang, &namespace).await.into_iter().collect();
                    entries.sort();
                    for (key, value) in entries {
                        println!("{:<40} {}", key, value);
                    }
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
