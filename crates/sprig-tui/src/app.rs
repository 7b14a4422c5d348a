use chrono::{Local, NaiveDate};
use tokio::sync::{mpsc, watch};

use sprig_api::{CreateEntryResponse, EntryClient};
use sprig_auth::{DeviceAuthorization, Profile, SessionContext};
use sprig_core::{counts, select, Entry, View, ViewCounts};

/// Outcome of the background device-code sign-in poll.
#[derive(Debug)]
pub enum AuthEvent {
    SignedIn(Profile),
    Failed(String),
}

/// Outcome of a background backend call. Fetches and submissions run on
/// spawned tasks so the loading flags stay visible across frames; results
/// land here and are drained per tick.
#[derive(Debug)]
pub enum DataEvent {
    Entries(Result<Vec<Entry>, String>),
    Created(Result<CreateEntryResponse, String>),
    SearchResults(Result<Vec<Entry>, String>),
}

pub struct App {
    pub client: EntryClient,
    pub session: SessionContext,
    session_rx: watch::Receiver<Option<Profile>>,
    pub profile: Option<Profile>,
    pub entries: Vec<Entry>,
    pub search_results: Vec<Entry>,
    pub active_view: View,
    pub input: String,
    pub selected: usize,
    pub is_submitting: bool,
    pub entries_loading: bool,
    /// Blocking notice for create/search failures; any key dismisses it.
    pub notice: Option<String>,
    /// Device code being shown while we wait for the user to authorize.
    pub device: Option<DeviceAuthorization>,
    auth_rx: Option<mpsc::Receiver<AuthEvent>>,
    data_tx: mpsc::Sender<DataEvent>,
    data_rx: mpsc::Receiver<DataEvent>,
}

impl App {
    pub fn new(client: EntryClient, session: SessionContext) -> Self {
        let session_rx = session.subscribe();
        let (data_tx, data_rx) = mpsc::channel(16);
        Self {
            client,
            session,
            session_rx,
            profile: None,
            entries: Vec::new(),
            search_results: Vec::new(),
            active_view: View::Chat,
            input: String::new(),
            selected: 0,
            is_submitting: false,
            entries_loading: false,
            notice: None,
            device: None,
            auth_rx: None,
            data_tx,
            data_rx,
        }
    }

    /// Eager session restore on startup. A malformed store has already been
    /// cleared underneath us and reads as "no session"; without a stored
    /// session nothing is fetched and the sign-in screen is shown. The disk
    /// read completes before the first frame; the entry fetch it kicks off
    /// runs in the background.
    pub async fn restore_session(&mut self) {
        match self.session.restore().await {
            Ok(Some(profile)) => {
                self.profile = Some(profile);
                self.reload_entries(true);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Session restore failed: {}", e);
            }
        }
    }

    /// Kick off the device-code sign-in: fetch the code inline so it can be
    /// rendered, then poll for authorization in the background.
    pub async fn begin_sign_in(&mut self) {
        if self.device.is_some() {
            return;
        }

        let device = match self.session.identity().begin_sign_in().await {
            Ok(device) => device,
            Err(e) => {
                log::error!("Sign-in failed to start: {}", e);
                self.notice = Some(format!("Sign-in failed to start: {}", e));
                return;
            }
        };
        self.device = Some(device.clone());

        let (tx, rx) = mpsc::channel(1);
        self.auth_rx = Some(rx);

        let session = self.session.clone();
        tokio::spawn(async move {
            let event = match session.identity().poll_sign_in(&device).await {
                Ok(sign_in) => match session.complete_sign_in(sign_in).await {
                    Ok(profile) => AuthEvent::SignedIn(profile),
                    Err(e) => AuthEvent::Failed(format!("Could not persist session: {}", e)),
                },
                Err(e) => AuthEvent::Failed(e.to_string()),
            };
            let _ = tx.send(event).await;
        });
    }

    /// Drain pending background events: the sign-in poll outcome, finished
    /// backend calls, and session notifications (token rotation,
    /// 401-triggered sign-out).
    pub async fn process_events(&mut self) {
        let mut auth_events = Vec::new();
        if let Some(rx) = self.auth_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                auth_events.push(event);
            }
        }
        for event in auth_events {
            self.device = None;
            self.auth_rx = None;
            match event {
                AuthEvent::SignedIn(profile) => {
                    self.profile = Some(profile);
                    self.active_view = View::Chat;
                    self.reload_entries(true);
                }
                AuthEvent::Failed(message) => {
                    log::error!("Sign-in failed: {}", message);
                    self.notice = Some(format!("Sign-in failed: {}", message));
                }
            }
        }

        while let Ok(event) = self.data_rx.try_recv() {
            self.apply_data_event(event);
        }

        // The session context publishes sign-outs (including the retry
        // policy clearing an unrecoverable session) over the watch channel;
        // transitioning the UI is our job, not the API client's.
        if self.session_rx.has_changed().unwrap_or(false) {
            let current = self.session_rx.borrow_and_update().clone();
            match current {
                Some(profile) => self.profile = Some(profile),
                None => {
                    if self.profile.take().is_some() {
                        self.entries.clear();
                        self.search_results.clear();
                        self.active_view = View::Chat;
                        self.input.clear();
                        self.selected = 0;
                    }
                }
            }
        }
    }

    fn apply_data_event(&mut self, event: DataEvent) {
        match event {
            DataEvent::Entries(Ok(entries)) => {
                self.entries = entries;
                self.entries_loading = false;
                self.clamp_selection(Self::today());
            }
            DataEvent::Entries(Err(e)) => {
                // List refreshes fail quietly; the previous list stays up.
                log::error!("Failed to load entries: {}", e);
                self.entries_loading = false;
            }
            DataEvent::Created(Ok(response)) if response.success => {
                self.is_submitting = false;
                self.input.clear();
                self.active_view = View::All;
                self.selected = 0;
                self.reload_entries(false);
            }
            DataEvent::Created(Ok(_)) => {
                self.is_submitting = false;
                self.notice = Some("The server did not accept that entry".to_string());
            }
            DataEvent::Created(Err(e)) => {
                self.is_submitting = false;
                log::error!("Failed to create entry: {}", e);
                self.notice = Some(format!("Could not create entry: {}", e));
            }
            DataEvent::SearchResults(Ok(results)) => {
                self.is_submitting = false;
                self.search_results = results;
                self.selected = 0;
            }
            DataEvent::SearchResults(Err(e)) => {
                self.is_submitting = false;
                log::error!("Search failed: {}", e);
                self.notice = Some(format!("Search failed: {}", e));
            }
        }
    }

    /// Replace the entry collection wholesale from the backend. The fetch
    /// runs on a spawned task; `entries_loading` stays set until the result
    /// is drained in [`process_events`].
    pub fn reload_entries(&mut self, eager: bool) {
        if eager {
            self.entries_loading = true;
        }
        let client = self.client.clone();
        let tx = self.data_tx.clone();
        tokio::spawn(async move {
            let result = client.list_entries().await.map_err(|e| e.to_string());
            let _ = tx.send(DataEvent::Entries(result)).await;
        });
    }

    /// Submit the composer input: a search query in the search view, a new
    /// entry everywhere else. The call runs in the background;
    /// `is_submitting` refuses a second submit until the outcome arrives.
    pub fn submit(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() || self.is_submitting {
            return;
        }
        self.is_submitting = true;

        let client = self.client.clone();
        let tx = self.data_tx.clone();
        if self.active_view == View::Search {
            tokio::spawn(async move {
                let result = client.search(&text).await.map_err(|e| e.to_string());
                let _ = tx.send(DataEvent::SearchResults(result)).await;
            });
        } else {
            tokio::spawn(async move {
                let result = client.create_entry(&text).await.map_err(|e| e.to_string());
                let _ = tx.send(DataEvent::Created(result)).await;
            });
        }
    }

    /// Delete the highlighted entry. Failures leave the list as-is and are
    /// only logged.
    pub async fn delete_selected(&mut self) {
        let today = Self::today();
        let id = match self.visible_entries(today).get(self.selected) {
            Some(entry) => entry.id.clone(),
            None => return,
        };

        match self.client.delete_entry(&id).await {
            Ok(()) => {
                self.reload_entries(false);
                self.search_results.retain(|e| e.id != id);
            }
            Err(e) => log::error!("Failed to delete entry {}: {}", id, e),
        }
        self.clamp_selection(today);
    }

    pub async fn sign_out(&mut self) {
        self.session.sign_out().await;
        // The watch notification also arrives, but don't leave a stale
        // frame in between.
        self.profile = None;
        self.entries.clear();
        self.search_results.clear();
        self.active_view = View::Chat;
        self.input.clear();
        self.selected = 0;
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// The filtered, ordered list for the active view.
    pub fn visible_entries(&self, today: NaiveDate) -> Vec<Entry> {
        select(&self.entries, self.active_view, &self.search_results, today)
    }

    pub fn view_counts(&self) -> ViewCounts {
        counts(&self.entries)
    }

    pub fn set_view(&mut self, view: View) {
        if self.active_view != view {
            self.active_view = view;
            self.selected = 0;
            if view == View::Chat {
                self.input.clear();
            }
        }
    }

    pub fn next_view(&mut self) {
        self.set_view(next_in_cycle(self.active_view));
    }

    pub fn prev_view(&mut self) {
        let mut view = self.active_view;
        // Five steps forward is one step back in a six-view cycle.
        for _ in 0..VIEW_CYCLE.len() - 1 {
            view = next_in_cycle(view);
        }
        self.set_view(view);
    }

    /// Does the active view accept typed input?
    pub fn has_composer(&self) -> bool {
        matches!(self.active_view, View::Chat | View::Search)
    }

    pub fn push_input(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_input(&mut self) {
        self.input.pop();
    }

    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        self.selected += 1;
        self.clamp_selection(Self::today());
    }

    fn clamp_selection(&mut self, today: NaiveDate) {
        let len = self.visible_entries(today).len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

const VIEW_CYCLE: [View; 6] = [
    View::Chat,
    View::Search,
    View::All,
    View::Tasks,
    View::Reminders,
    View::Notes,
];

fn next_in_cycle(view: View) -> View {
    let idx = VIEW_CYCLE.iter().position(|v| *v == view).unwrap_or(0);
    VIEW_CYCLE[(idx + 1) % VIEW_CYCLE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_auth::{IdentityClient, IdentityEndpoints, SessionStore, StoredToken};
    use sprig_core::{Category, Priority};
    use tempfile::TempDir;
    use tokio::time::{sleep, Duration};

    fn app_at(dir: &TempDir, api_base: &str) -> App {
        let identity = IdentityClient::new(IdentityEndpoints {
            client_id: "sprig-test".to_string(),
            device_authorization_url: "http://127.0.0.1:1/oauth/device/code".to_string(),
            token_url: "http://127.0.0.1:1/oauth/token".to_string(),
            revoke_url: None,
        });
        let session = SessionContext::new(identity, SessionStore::new(dir.path()));
        let client = EntryClient::new(api_base, 1, session.clone()).unwrap();
        App::new(client, session)
    }

    fn app(dir: &TempDir) -> App {
        app_at(dir, "http://127.0.0.1:1")
    }

    fn entry(id: &str, category: Category) -> Entry {
        Entry {
            id: id.to_string(),
            text: format!("entry {id}"),
            category,
            priority: Some(Priority::Medium),
            due_date: None,
            created_at: None,
            similarity: None,
        }
    }

    fn profile() -> Profile {
        Profile {
            uid: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
            photo_url: None,
        }
    }

    /// Pump `process_events` until `done` holds.
    async fn drain(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..100 {
            app.process_events().await;
            if done(app) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("background event never arrived");
    }

    #[test]
    fn view_cycle_visits_every_view_once() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        let mut seen = vec![app.active_view];
        for _ in 0..5 {
            app.next_view();
            seen.push(app.active_view);
        }
        assert_eq!(seen, VIEW_CYCLE.to_vec());
        app.next_view();
        assert_eq!(app.active_view, View::Chat);
    }

    #[test]
    fn prev_view_inverts_next_view() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.next_view();
        app.next_view();
        app.prev_view();
        assert_eq!(app.active_view, View::Search);
    }

    #[test]
    fn switching_views_resets_selection() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.entries = vec![entry("a", Category::Task), entry("b", Category::Task)];
        app.set_view(View::Tasks);
        app.select_down();
        assert_eq!(app.selected, 1);
        app.set_view(View::Notes);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn selection_is_clamped_to_visible_list() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.entries = vec![entry("a", Category::Task)];
        app.set_view(View::Tasks);
        app.select_down();
        app.select_down();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn composer_views_accept_input() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        assert!(app.has_composer());
        app.set_view(View::All);
        assert!(!app.has_composer());
        app.set_view(View::Search);
        assert!(app.has_composer());
    }

    #[tokio::test]
    async fn restore_without_stored_session_fetches_nothing() {
        let mut server = mockito::Server::new_async().await;
        let list = server
            .mock("GET", "/api/tasks")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let mut app = app_at(&dir, &server.url());
        app.restore_session().await;
        app.process_events().await;

        assert!(app.profile.is_none());
        assert!(app.entries.is_empty());
        assert!(!app.entries_loading);
        list.assert_async().await;
    }

    #[tokio::test]
    async fn restored_session_loads_entries_in_background() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tasks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": "e1", "text": "pay rent", "category": "TASK"}]"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_profile(&profile()).unwrap();
        store
            .save_token(&StoredToken {
                token: "tok".to_string(),
                refresh_token: None,
                expires_at: u64::MAX,
            })
            .unwrap();

        let mut app = app_at(&dir, &server.url());
        app.restore_session().await;
        assert!(app.profile.is_some());
        // Fetch is still in flight when restore returns, so the indicator
        // is up for the first frames.
        assert!(app.entries_loading);

        drain(&mut app, |a| !a.entries_loading).await;
        assert_eq!(app.entries.len(), 1);
    }

    #[tokio::test]
    async fn submit_search_runs_in_background() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id": "e1", "text": "buy milk", "category": "TASK", "similarity": 0.9}]"#,
            )
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let mut app = app_at(&dir, &server.url());
        app.set_view(View::Search);
        app.input = "milk".to_string();

        app.submit();
        // The flag holds until the result is drained; a second submit is
        // refused meanwhile.
        assert!(app.is_submitting);
        app.submit();

        drain(&mut app, |a| !a.is_submitting).await;
        assert_eq!(app.search_results.len(), 1);
        assert_eq!(app.input, "milk");
    }

    #[tokio::test]
    async fn successful_create_clears_composer_and_shows_overview() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/tasks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/tasks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let mut app = app_at(&dir, &server.url());
        app.input = "buy milk".to_string();

        app.submit();
        assert!(app.is_submitting);

        drain(&mut app, |a| !a.is_submitting).await;
        assert!(app.input.is_empty());
        assert_eq!(app.active_view, View::All);
    }
}
