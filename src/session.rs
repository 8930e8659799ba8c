//! Conversation sessions: flow states, the collected-data bag and the
//! in-memory store.
//!
//! Navigation is an explicit bounded stack: every forward transition
//! pushes the state it left, "back" pops one frame and re-renders from
//! data already in the bag. Nothing here re-derives position from the
//! bag's contents.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::types::{
    Category, City, Gearbox, InstructorDetail, InstructorSummary, Intent, OnlineProduct,
    ResolvedTariff, SchoolDetail, SchoolSummary, Tariff, TrainingFormat, TrainingTime,
};
use crate::i18n::Lang;

/// Chat id of the conversation; one session per chat.
pub type SessionId = i64;

/// Frames kept for "back". Deeper than the longest flow path, so in
/// practice the cap only guards against pathological loops.
const HISTORY_CAP: usize = 16;

// ── Flow states ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolState {
    City,
    Category,
    TrainingFormat,
    TrainingTime,
    School,
    SchoolCard,
    Tariff,
    Name,
    Phone,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineState {
    ProductChoice,
    Category,
    FirstName,
    LastName,
    Iin,
    Whatsapp,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructorState {
    City,
    Category,
    Gearbox,
    Instructor,
    InstructorCard,
    Name,
    Phone,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateState {
    SelectAction,
}

/// Where the conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    School(SchoolState),
    Online(OnlineState),
    Instructor(InstructorState),
    Certificate(CertificateState),
}

// ── Collected data ──────────────────────────────────────────────────

/// Everything a flow has gathered so far: the user's selections plus the
/// lists those selections were made from. Cached lists are what lets
/// "back" re-render a step without another API call.
#[derive(Debug, Clone, Default)]
pub struct Bag {
    pub main_intent: Option<Intent>,

    pub cities: Vec<City>,
    pub city_id: Option<i64>,
    pub city_name: Option<String>,

    pub categories: Vec<Category>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,

    pub formats: Vec<TrainingFormat>,
    pub training_format_id: Option<i64>,
    pub format_name: Option<String>,

    pub training_times: Vec<TrainingTime>,
    pub training_time_id: Option<i64>,
    pub training_time_name: Option<String>,

    pub schools: Vec<SchoolSummary>,
    pub school: Option<SchoolDetail>,

    pub tariffs: Vec<Tariff>,
    pub tariff: Option<Tariff>,

    pub product: Option<OnlineProduct>,
    pub resolved_tariff: Option<ResolvedTariff>,

    pub instructors: Vec<InstructorSummary>,
    pub instructor: Option<InstructorDetail>,
    pub gearbox: Option<Gearbox>,

    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub iin: Option<String>,
    pub phone: Option<String>,
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Session {
    pub lang: Lang,
    /// Set once the user picks a language from the keyboard; from then
    /// on the channel's language hint no longer applies.
    pub lang_chosen: bool,
    pub state: FlowState,
    pub bag: Bag,
    history: Vec<FlowState>,
}

impl Session {
    pub fn new(lang: Lang) -> Self {
        Self {
            lang,
            lang_chosen: false,
            state: FlowState::Idle,
            bag: Bag::default(),
            history: Vec::new(),
        }
    }

    /// Move forward, remembering where we came from.
    pub fn advance(&mut self, next: FlowState) {
        if self.history.len() == HISTORY_CAP {
            self.history.remove(0);
        }
        self.history.push(self.state);
        self.state = next;
    }

    /// Pop one frame. Returns the state we returned to, or `None` when
    /// the history is exhausted (the caller falls back to the main menu).
    pub fn pop_back(&mut self) -> Option<FlowState> {
        let prev = self.history.pop()?;
        self.state = prev;
        Some(prev)
    }

    /// Rewind to an earlier state, dropping every frame recorded since
    /// it was last visited. After this, "back" behaves as if the user
    /// had just arrived at `target` the first time.
    pub fn rewind_to(&mut self, target: FlowState) {
        while let Some(prev) = self.history.pop() {
            if prev == target {
                break;
            }
        }
        self.state = target;
    }

    /// Drop everything and return to the main menu. Language survives.
    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
        self.bag = Bag::default();
        self.history.clear();
    }

    #[cfg(test)]
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// In-memory session store.
///
/// The outer lock is held only for the map lookup; each session carries
/// its own lock, held for the whole handling of a message. Messages for
/// different chats proceed in parallel, messages within one chat are
/// serialized in arrival order.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, id: SessionId, default_lang: Lang) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(default_lang))))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_then_back_retraces_the_path() {
        let mut session = Session::new(Lang::Ru);
        session.advance(FlowState::School(SchoolState::City));
        session.advance(FlowState::School(SchoolState::Category));
        session.advance(FlowState::School(SchoolState::TrainingFormat));

        assert_eq!(
            session.pop_back(),
            Some(FlowState::School(SchoolState::Category))
        );
        assert_eq!(session.pop_back(), Some(FlowState::School(SchoolState::City)));
        assert_eq!(session.pop_back(), Some(FlowState::Idle));
        assert_eq!(session.pop_back(), None);
    }

    #[test]
    fn history_is_bounded() {
        let mut session = Session::new(Lang::Ru);
        for _ in 0..40 {
            session.advance(FlowState::School(SchoolState::City));
            session.advance(FlowState::School(SchoolState::Category));
        }
        assert_eq!(session.history_depth(), HISTORY_CAP);
    }

    #[test]
    fn rewind_drops_intermediate_frames() {
        let mut session = Session::new(Lang::Ru);
        session.advance(FlowState::School(SchoolState::Name));
        session.advance(FlowState::School(SchoolState::Phone));
        session.advance(FlowState::School(SchoolState::Confirm));

        session.rewind_to(FlowState::School(SchoolState::Name));
        assert_eq!(session.state, FlowState::School(SchoolState::Name));
        // Back from the rewound state lands before the first visit.
        assert_eq!(session.pop_back(), Some(FlowState::Idle));
    }

    #[test]
    fn reset_keeps_language() {
        let mut session = Session::new(Lang::Kz);
        session.lang_chosen = true;
        session.advance(FlowState::Online(OnlineState::Iin));
        session.bag.iin = Some("990101350123".into());
        session.reset();
        assert_eq!(session.state, FlowState::Idle);
        assert!(session.bag.iin.is_none());
        assert_eq!(session.lang, Lang::Kz);
        assert!(session.lang_chosen);
    }

    #[tokio::test]
    async fn store_returns_the_same_session_per_chat() {
        let store = SessionStore::new();
        let a = store.get_or_create(7, Lang::Ru).await;
        a.lock().await.bag.name = Some("Aigerim".into());
        let b = store.get_or_create(7, Lang::Ru).await;
        assert_eq!(b.lock().await.bag.name.as_deref(), Some("Aigerim"));
        assert_eq!(store.len().await, 1);
    }
}
