use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_console::app::{App, GuardDecision, Route};
use agent_console::auth::{LoginOutcome, SystemBrowser, WindowHandle};
use agent_console::config::{self, Config};
use agent_console::models::{FeedQuery, TIMEZONES};
use agent_console::token;
use agent_console::views::{FeedView, FormError, ProfileEdit, ProfileForm};

#[derive(Parser)]
#[command(name = "agent")]
#[command(about = "Sign in to the AI Agent and browse your personalized feed")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Google in your browser
    Login,
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Status,
    /// Show your feed (default)
    Feed {
        /// Page size
        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(short, long, default_value = "0")]
        offset: u32,

        /// Include items past their expiry
        #[arg(long)]
        include_expired: bool,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommand>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
    /// Serve the login callback page without an active login. A login that
    /// lands here is picked up by the next command.
    Callback,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Print the stored profile
    Show,
    /// Change profile fields and save the whole form
    Edit(EditArgs),
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    birthday: Option<String>,
    #[arg(long)]
    home_address: Option<String>,
    #[arg(long)]
    work_address: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// car, public_transit, bike, walk or carpool (empty to clear)
    #[arg(long)]
    commute_method: Option<String>,
    #[arg(long)]
    timezone: Option<String>,
    /// Toggle a dietary restriction on or off (repeatable)
    #[arg(long = "toggle-restriction")]
    toggle_restrictions: Vec<String>,
}

impl From<EditArgs> for ProfileEdit {
    fn from(args: EditArgs) -> Self {
        Self {
            name: args.name,
            birthday: args.birthday,
            home_address: args.home_address,
            work_address: args.work_address,
            phone: args.phone,
            commute_method: args.commute_method,
            timezone: args.timezone,
            toggle_restrictions: args.toggle_restrictions,
        }
    }
}

/// Logs go to stderr so stdout only carries rendered views.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "agent_console=info,tower_http=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Close `window` when the user hits Ctrl-C.
fn close_on_ctrl_c(window: WindowHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            window.close();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let app = App::open(Config::load())?;
    if let Some(session) = app.on_load()? {
        println!("Signed in as {}", session.user.email);
    }

    let command = cli.command.unwrap_or(Commands::Feed {
        limit: None,
        offset: 0,
        include_expired: false,
    });

    match command {
        Commands::Login => login(&app).await,
        Commands::Logout => {
            app.logout()?;
            println!("Signed out.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => status(&app),
        Commands::Config { init } => {
            let path = config::get_config_path()?;
            if init {
                app.config().save()?;
                println!("Wrote {}", path.display());
            } else {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(app.config())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Feed {
            limit,
            offset,
            include_expired,
        } => {
            if !authorized(&app, Route::Dashboard)? {
                return Ok(ExitCode::FAILURE);
            }
            let query = FeedQuery {
                limit: Some(limit.unwrap_or(app.config().feed_page_size)),
                offset: Some(offset),
                include_expired: include_expired.then_some(true),
            };
            let mut view = FeedView::new(query);
            view.load(app.client()).await;
            print!("{}", view.render(Utc::now()));
            Ok(if view.state().error().is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Profile { command } => {
            if !authorized(&app, Route::Profile)? {
                return Ok(ExitCode::FAILURE);
            }
            profile(&app, command.unwrap_or(ProfileCommand::Show)).await
        }
        Commands::Callback => {
            let window = WindowHandle::new();
            close_on_ctrl_c(window.clone());
            let watched = window.clone();
            let poll_interval = app.config().poll_interval();
            app.serve_callback(window, async move {
                while !watched.is_closed() {
                    tokio::time::sleep(poll_interval).await;
                }
            })
            .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn authorized(app: &App, route: Route) -> anyhow::Result<bool> {
    match app.navigate(route)? {
        GuardDecision::Render { .. } => Ok(true),
        GuardDecision::Redirect(_) => {
            eprintln!("Not signed in. Run `agent login` first.");
            Ok(false)
        }
    }
}

async fn login(app: &App) -> anyhow::Result<ExitCode> {
    let window = WindowHandle::new();
    close_on_ctrl_c(window.clone());

    println!("Opening your browser. Please complete the authentication there.");
    match app
        .login(SystemBrowser::new(window.clone()), window)
        .await
    {
        Ok(LoginOutcome::Success(session)) => {
            println!("Signed in as {}", session.user.email);
            Ok(ExitCode::SUCCESS)
        }
        Ok(LoginOutcome::Cancelled) => Ok(ExitCode::SUCCESS),
        Ok(outcome) => {
            if let Some(message) = outcome.error_message() {
                eprintln!("{}", message);
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn status(app: &App) -> anyhow::Result<ExitCode> {
    if !app.session().check_auth()? {
        println!("Not signed in.");
        return Ok(ExitCode::SUCCESS);
    }

    match app.session().user() {
        Some(user) => println!("Signed in as {} ({})", user.email, user.id),
        None => println!("Signed in."),
    }
    if let Some(token) = app.session().token()? {
        match token::expires_at(&token) {
            Some(exp) if exp <= Utc::now() => println!("Token expired at {}", exp.to_rfc3339()),
            Some(exp) => println!("Token expires at {}", exp.to_rfc3339()),
            None => println!("Token expiry unknown"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn profile(app: &App, command: ProfileCommand) -> anyhow::Result<ExitCode> {
    let mut form = ProfileForm::new();
    form.load(app.client()).await;
    if form.error().is_some() {
        print!("{}", form.render());
        return Ok(ExitCode::FAILURE);
    }

    if let ProfileCommand::Edit(args) = command {
        if let Err(e) = form.apply(args.into()) {
            eprintln!("{}", e);
            if let FormError::UnknownTimezone(_) = e {
                let zones: Vec<&str> = TIMEZONES.iter().map(|(tz, _)| *tz).collect();
                eprintln!("Available timezones: {}", zones.join(", "));
            }
            return Ok(ExitCode::FAILURE);
        }
        form.save(app.client()).await;
    }

    print!("{}", form.render());
    Ok(if form.error().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
