use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;
use tokio::sync::mpsc;
use tracing::info;

use crate::hub::WatchEvent;
use crate::subscriptions::SubscriptionManager;
use crate::view::ViewReconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFocus {
    #[default]
    Repository,
    Interval,
}

/// Dashboard state: the two protocol components plus UI plumbing.
///
/// Everything here mutates on the single driver task in `main`, so no
/// locking; the hub loop only talks to us through channels.
pub struct App {
    pub subscriptions: SubscriptionManager,
    pub view: ViewReconciler,
    pub connected: bool,
    pub repo_input: String,
    pub interval_input: String,
    pub focus: InputFocus,
    pub table_state: TableState,
    pub status_note: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            subscriptions: SubscriptionManager::new(outbound),
            view: ViewReconciler::new(),
            connected: false,
            repo_input: String::new(),
            interval_input: String::new(),
            focus: InputFocus::default(),
            table_state: TableState::default(),
            status_note: None,
            should_quit: false,
        }
    }

    pub fn apply_watch_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Connected => {
                self.connected = true;
                self.status_note = Some("watcher connected".to_string());
            }
            WatchEvent::Disconnected => {
                // Connection loss resets every key to unsubscribed; the
                // watcher keeps no client state we can rely on across
                // reconnects.
                self.connected = false;
                self.subscriptions.clear();
                self.view.clear();
                self.table_state.select(None);
                self.status_note = Some("watcher disconnected; subscriptions reset".to_string());
                info!(event = "view_reset", reason = "disconnected");
            }
            WatchEvent::Refresh(refresh) => {
                let subscriptions = &self.subscriptions;
                self.view
                    .apply_refresh(refresh, |key| subscriptions.is_subscribed(key));
                self.clamp_selection();
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::Enter => self.submit_subscribe(),
            KeyCode::Backspace => {
                self.focused_input_mut().pop();
            }
            KeyCode::Char(c) => self.focused_input_mut().push(c),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Delete => self.unsubscribe_selected(),
            _ => {}
        }
    }

    pub fn on_tick(&mut self) {
        self.clamp_selection();
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            InputFocus::Repository => InputFocus::Interval,
            InputFocus::Interval => InputFocus::Repository,
        };
    }

    fn focused_input_mut(&mut self) -> &mut String {
        match self.focus {
            InputFocus::Repository => &mut self.repo_input,
            InputFocus::Interval => &mut self.interval_input,
        }
    }

    pub fn submit_subscribe(&mut self) {
        let repository = self.repo_input.clone();
        let interval = self.interval_input.clone();
        match self.subscriptions.request_subscribe(&repository, &interval) {
            Ok(()) => {
                self.status_note = Some(format!("watching {}", repository.trim()));
                self.repo_input.clear();
                self.focus = InputFocus::Repository;
            }
            Err(err) => self.status_note = Some(err.to_string()),
        }
    }

    pub fn unsubscribe_selected(&mut self) {
        let Some(index) = self.table_state.selected() else {
            return;
        };
        let Some(row) = self.view.rows().get(index) else {
            return;
        };
        let repository = row.repository.clone();
        self.subscriptions.request_unsubscribe(&repository);
        self.view.remove(&repository);
        self.clamp_selection();
        self.status_note = Some(format!("unsubscribed {repository}"));
    }

    fn move_selection(&mut self, delta: isize) {
        if self.view.is_empty() {
            self.table_state.select(None);
            return;
        }
        let last = self.view.len() - 1;
        let next = match self.table_state.selected() {
            Some(current) => current.saturating_add_signed(delta).min(last),
            None => 0,
        };
        self.table_state.select(Some(next));
    }

    fn clamp_selection(&mut self) {
        match self.table_state.selected() {
            Some(_) if self.view.is_empty() => self.table_state.select(None),
            Some(index) if index >= self.view.len() => {
                self.table_state.select(Some(self.view.len() - 1));
            }
            None if !self.view.is_empty() => self.table_state.select(Some(0)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use repowatch_core::wire::{RefreshEvent, SnapshotCounts, StarDelta};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn app() -> (App, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let mut app = App::new(tx);
        app.apply_watch_event(WatchEvent::Connected);
        (app, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).expect("frame is json"));
        }
        frames
    }

    fn delta(repository: &str, stars: u64) -> WatchEvent {
        WatchEvent::Refresh(RefreshEvent::Delta(StarDelta {
            repository: repository.to_string(),
            stars,
        }))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn subscribe_then_deltas_then_unsubscribe() {
        let (mut app, mut rx) = app();
        app.repo_input = "octocat/Hello-World".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();

        assert_eq!(
            drain(&mut rx),
            vec![json!({
                "action": "subscribe",
                "repository": "octocat/Hello-World",
                "interval": 30,
            })]
        );

        app.apply_watch_event(delta("octocat/Hello-World", 42));
        assert_eq!(app.view.len(), 1);
        assert_eq!(
            app.view.row("octocat/Hello-World").map(|row| row.star_count),
            Some(42)
        );

        app.apply_watch_event(delta("octocat/Hello-World", 43));
        assert_eq!(app.view.len(), 1);
        assert_eq!(
            app.view.row("octocat/Hello-World").map(|row| row.star_count),
            Some(43)
        );

        app.table_state.select(Some(0));
        app.unsubscribe_selected();
        assert!(app.view.is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![json!({
                "action": "unsubscribe",
                "repository": "octocat/Hello-World",
            })]
        );
    }

    #[test]
    fn four_digit_interval_is_rejected_and_nothing_is_emitted() {
        let (mut app, mut rx) = app();
        app.repo_input = "x".to_string();
        app.interval_input = "1000".to_string();
        app.submit_subscribe();

        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            app.status_note.as_deref(),
            Some("the interval must be numeric and at most 999")
        );
        assert_eq!(app.repo_input, "x");
    }

    #[test]
    fn empty_repository_is_rejected() {
        let (mut app, mut rx) = app();
        app.repo_input = "   ".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();

        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            app.status_note.as_deref(),
            Some("the repository can't be empty")
        );
    }

    #[test]
    fn stray_delta_after_unsubscribe_is_dropped() {
        let (mut app, _rx) = app();
        app.repo_input = "a/a".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();
        app.apply_watch_event(delta("a/a", 42));

        app.table_state.select(Some(0));
        app.unsubscribe_selected();
        app.apply_watch_event(delta("a/a", 43));

        assert!(app.view.is_empty());
    }

    #[test]
    fn refresh_for_never_subscribed_key_is_dropped() {
        let (mut app, _rx) = app();
        app.apply_watch_event(delta("stranger/repo", 5));
        assert!(app.view.is_empty());
    }

    #[test]
    fn snapshot_is_filtered_to_subscribed_keys() {
        let (mut app, _rx) = app();
        app.repo_input = "a/a".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();

        app.apply_watch_event(WatchEvent::Refresh(RefreshEvent::Snapshot(SnapshotCounts {
            counts: BTreeMap::from([("a/a".to_string(), 1), ("b/b".to_string(), 2)]),
        })));

        assert_eq!(app.view.len(), 1);
        assert_eq!(app.view.row("a/a").map(|row| row.star_count), Some(1));
    }

    #[test]
    fn disconnect_resets_rows_and_subscriptions() {
        let (mut app, _rx) = app();
        app.repo_input = "a/a".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();
        app.apply_watch_event(delta("a/a", 42));

        app.apply_watch_event(WatchEvent::Disconnected);

        assert!(!app.connected);
        assert!(app.view.is_empty());
        assert!(app.subscriptions.is_empty());
        assert_eq!(app.table_state.selected(), None);
    }

    #[test]
    fn keys_edit_inputs_and_submit() {
        let (mut app, mut rx) = app();
        for c in "a/a".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('3')));
        app.handle_key(key(KeyCode::Char('0')));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(drain(&mut rx).len(), 1);
        assert!(app.subscriptions.is_subscribed("a/a"));
        assert!(app.repo_input.is_empty());
        assert_eq!(app.interval_input, "30");
    }

    #[test]
    fn selection_follows_rows() {
        let (mut app, _rx) = app();
        app.repo_input = "a/a".to_string();
        app.interval_input = "30".to_string();
        app.submit_subscribe();
        app.repo_input = "b/b".to_string();
        app.submit_subscribe();
        app.apply_watch_event(delta("a/a", 1));
        app.apply_watch_event(delta("b/b", 2));

        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.table_state.selected(), Some(1));

        app.unsubscribe_selected();
        assert_eq!(app.table_state.selected(), Some(0));
    }
}
