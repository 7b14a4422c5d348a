use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;

mod app;
mod ui;

use app::App;
use sprig_api::EntryClient;
use sprig_auth::{IdentityClient, IdentityEndpoints, SessionContext, SessionStore};
use sprig_config::ConfigManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger first, so config loading itself is visible. The filter starts
    // permissive and the configured level caps it afterwards; an explicit
    // RUST_LOG wins over the config file.
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let manager = ConfigManager::load_default().await?;
    let config = manager.config();
    if !rust_log_set {
        log::set_max_level(config.logging.level.to_level_filter());
    }

    let identity = IdentityClient::new(IdentityEndpoints {
        client_id: config.identity.client_id.clone(),
        device_authorization_url: config.identity.device_authorization_url.clone(),
        token_url: config.identity.token_url.clone(),
        revoke_url: config.identity.revoke_url.clone(),
    });
    let store = SessionStore::new(config.storage.resolved_dir()?);
    let session = SessionContext::new(identity, store);
    let client = EntryClient::new(
        &config.api.base_url,
        config.api.timeout_seconds,
        session.clone(),
    )?;

    if !client.health_check().await {
        log::warn!("Backend at {} is not responding", config.api.base_url);
    }

    let mut app = App::new(client, session);
    app.restore_session().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let mut last_tick = tokio::time::Instant::now();
    let tick_rate = tokio::time::Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| tokio::time::Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if handle_key_event(app, key).await {
                    return Ok(());
                }
            }
        }

        // Sign-in poll outcomes and session notifications arrive between
        // frames.
        app.process_events().await;

        if last_tick.elapsed() >= tick_rate {
            last_tick = tokio::time::Instant::now();
        }
    }
}

/// Returns true when the app should quit.
async fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if app.notice.is_some() {
        app.dismiss_notice();
        return false;
    }

    // Signed-out screen: Enter starts the device-code flow, everything
    // else is ignored until the poll resolves.
    if app.profile.is_none() {
        if key.code == KeyCode::Enter {
            app.begin_sign_in().await;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.sign_out().await;
        }
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.reload_entries(true);
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.delete_selected().await;
        }
        KeyCode::Tab => {
            app.next_view();
        }
        KeyCode::BackTab => {
            app.prev_view();
        }
        KeyCode::Enter => {
            if app.has_composer() {
                app.submit();
            }
        }
        KeyCode::Char(c) if app.has_composer() => {
            app.push_input(c);
        }
        KeyCode::Backspace if app.has_composer() => {
            app.pop_input();
        }
        KeyCode::Up => {
            app.select_up();
        }
        KeyCode::Down => {
            app.select_down();
        }
        KeyCode::Delete => {
            app.delete_selected().await;
        }
        _ => {}
    }
    false
}
