pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod notification;
pub mod permission;
pub mod session;
pub mod share;
pub mod state;
pub mod storage;
pub use error::{AppError, AppResult};

use notification::DesktopNotifier;

/// Entrypoint used by higher-level integrations and CLI bindings: one
/// framed capture, saved to the pictures directory.
pub fn run() -> AppResult<()> {
    logging::init();
    tracing::info!("starting framecam");

    let app = app::App::new()?;
    let mut session = app.open_session()?;
    let report = app::capture_and_save(&mut session, &DesktopNotifier)?;

    tracing::info!(
        path = %report.destination.path().display(),
        state = ?session.state(),
        "capture saved"
    );
    Ok(())
}
