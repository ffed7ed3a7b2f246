use anyhow::{anyhow, bail, Result};
use clap::Parser;
use eframe::egui::{self, ViewportBuilder};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;

use dirmenu::applet::{DirectoryMenuApplet, POPUP_COMMAND};
use dirmenu::config::{load_settings, save_settings, DEFAULT_APPLET_ID};
use dirmenu::launcher::SystemLauncher;
use dirmenu::listing::FsLister;
use dirmenu::native::{configure_native_context, DirMenuApp};
use dirmenu::remote::{self, RemoteError, RemoteServer};

#[derive(Parser, Debug)]
#[command(name = "dirmenu", version, about = "Browse a directory as a cascading popup menu")]
struct Cli {
    /// Applet instance id; selects the settings file and remote socket
    #[arg(long, default_value = DEFAULT_APPLET_ID)]
    id: String,

    /// Open the menu of a running instance, starting one if needed
    #[arg(long, default_value_t = false)]
    popup: bool,

    /// Set and store the base directory (path or file:// URI)
    #[arg(long, value_name = "DIR")]
    base_directory: Option<String>,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dirmenu=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let socket = remote::socket_path(&cli.id);

    // ── Forward to a running instance ─────────────────────────────────────────

    let mut popup_on_start = false;
    if cli.popup {
        match remote::send(&socket, POPUP_COMMAND) {
            Ok(()) => {
                tracing::info!(id = %cli.id, "popup forwarded to running instance");
                return Ok(());
            }
            Err(RemoteError::NotRunning { .. }) => popup_on_start = true,
            Err(err) => {
                tracing::warn!(error = %err, "could not reach running instance");
                popup_on_start = true;
            }
        }
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    let mut settings = load_settings(&cli.id);
    if let Some(dir) = &cli.base_directory {
        settings.set_base_directory(dir);
        if let Err(err) = save_settings(&cli.id, &settings) {
            tracing::warn!(error = %err, "failed to save applet settings");
        }
    }

    // ── Remote commands ───────────────────────────────────────────────────────

    let repaint: Arc<OnceLock<egui::Context>> = Arc::default();
    let waker = Arc::clone(&repaint);
    let remote = match RemoteServer::bind(socket, move || {
        if let Some(ctx) = waker.get() {
            ctx.request_repaint();
        }
    }) {
        Ok(server) => Some(server),
        Err(err @ RemoteError::AlreadyRunning(_)) => {
            bail!("{err}; use --popup to open its menu")
        }
        Err(err) => {
            tracing::warn!(error = %err, "remote commands unavailable");
            None
        }
    };

    let applet = DirectoryMenuApplet::new(
        settings,
        Box::new(FsLister),
        Box::new(SystemLauncher::from_env()),
    );
    tracing::info!(id = %cli.id, base = %applet.base_directory().display(), "starting applet");

    let viewport = ViewportBuilder::default()
        .with_inner_size([720.0, 520.0])
        .with_min_inner_size([320.0, 240.0])
        .with_title(format!("Directory Menu ({})", cli.id))
        .with_app_id("dirmenu");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let applet_id = cli.id.clone();
    eframe::run_native(
        "Directory Menu",
        options,
        Box::new(move |cc| {
            configure_native_context(&cc.egui_ctx);
            let _ = repaint.set(cc.egui_ctx.clone());
            Ok(Box::new(DirMenuApp::new(
                applet_id,
                applet,
                remote,
                popup_on_start,
            )))
        }),
    )
    .map_err(|err| anyhow!(err.to_string()))
}
