//! Conversation flows.
//!
//! `Dispatcher::handle` is the single entry point for an inbound
//! message. Classification order at every state:
//!
//! 1. a "main menu" phrase in any supported spelling clears the session;
//! 2. "back" pops one history frame and re-renders from cached data,
//!    without touching the network;
//! 3. valid forward input advances the machine;
//! 4. anything else re-renders the current prompt unchanged.

pub mod certificate;
pub mod instructor;
pub mod online;
pub mod school;
mod submit;

use std::sync::Arc;

use serde_json::json;

use crate::analytics::{events, Analytics};
use crate::api::types::BotUser;
use crate::api::CatalogApi;
use crate::config::BotConfig;
use crate::error::ApiError;
use crate::i18n::{Lang, Msg};
use crate::links::WhatsappLinks;
use crate::render::Reply;
use crate::session::{FlowState, Session, SessionId, SessionStore};

/// An inbound chat message, normalized by the channel adapter.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub session_id: SessionId,
    pub user: BotUser,
    pub text: String,
    /// Phone from the channel's native contact-share, already trusted
    /// over the message text at the phone step.
    pub contact_phone: Option<String>,
    /// Channel's guess at the user's language, applied while idle.
    pub lang_hint: Option<Lang>,
}

pub struct Dispatcher {
    pub(crate) api: Arc<dyn CatalogApi>,
    store: SessionStore,
    pub(crate) analytics: Analytics,
    pub(crate) links: WhatsappLinks,
    default_lang: Lang,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn CatalogApi>, config: &BotConfig) -> Self {
        Self {
            api,
            store: SessionStore::new(),
            analytics: Analytics::new(config),
            links: WhatsappLinks::new(config),
            default_lang: config.default_language,
        }
    }

    /// Handle one message and produce the replies to deliver.
    ///
    /// The per-session lock is held for the whole call, so messages in
    /// one chat are processed strictly in arrival order.
    pub async fn handle(&self, incoming: Incoming) -> Vec<Reply> {
        let entry = self
            .store
            .get_or_create(incoming.session_id, self.default_lang)
            .await;
        let mut session = entry.lock().await;

        // The channel's hint is only a default; an explicit pick from the
        // language keyboard sticks.
        if session.state == FlowState::Idle && !session.lang_chosen {
            if let Some(hint) = incoming.lang_hint {
                session.lang = hint;
            }
        }

        let text = incoming.text.trim().to_string();
        if is_start(&text) {
            session.reset();
            return language_prompt(session.lang);
        }
        if is_main_menu(&text) {
            session.reset();
            return main_menu(session.lang);
        }
        if is_back(&text) {
            return self.go_back(&mut session);
        }

        match session.state {
            FlowState::Idle => self.handle_idle(&mut session, &incoming, &text).await,
            FlowState::School(state) => {
                school::handle(self, &mut session, state, &incoming, &text).await
            }
            FlowState::Online(state) => {
                online::handle(self, &mut session, state, &incoming, &text).await
            }
            FlowState::Instructor(state) => {
                instructor::handle(self, &mut session, state, &incoming, &text).await
            }
            FlowState::Certificate(state) => {
                certificate::handle(self, &mut session, state, &incoming, &text).await
            }
        }
    }

    async fn handle_idle(
        &self,
        session: &mut Session,
        incoming: &Incoming,
        text: &str,
    ) -> Vec<Reply> {
        if let Some(lang) = language_choice(text) {
            session.lang = lang;
            session.lang_chosen = true;
            return main_menu(lang);
        }
        let lang = session.lang;
        if matches_msg(text, Msg::MenuSchools) {
            self.analytics.record(
                events::FLOW_SELECTED,
                json!({"flow": "school"}),
                Some(incoming.user.external_user_id),
                None,
            );
            return school::enter(self, session).await;
        }
        if matches_msg(text, Msg::MenuOnline) {
            self.analytics.record(
                events::FLOW_SELECTED,
                json!({"flow": "online"}),
                Some(incoming.user.external_user_id),
                None,
            );
            return online::enter(session);
        }
        if matches_msg(text, Msg::MenuCertificate) {
            self.analytics.record(
                events::CERTIFICATE_FLOW_STARTED,
                json!({}),
                Some(incoming.user.external_user_id),
                None,
            );
            return certificate::enter(session);
        }
        main_menu(lang)
    }

    fn go_back(&self, session: &mut Session) -> Vec<Reply> {
        match session.pop_back() {
            None | Some(FlowState::Idle) => {
                session.reset();
                main_menu(session.lang)
            }
            Some(_) => render_state(session),
        }
    }
}

/// Re-render the prompt for the session's current state from cached
/// data. Never calls the API.
pub(crate) fn render_state(session: &Session) -> Vec<Reply> {
    match session.state {
        FlowState::Idle => main_menu(session.lang),
        FlowState::School(state) => school::render(session, state),
        FlowState::Online(state) => online::render(session, state),
        FlowState::Instructor(state) => instructor::render(session, state),
        FlowState::Certificate(state) => certificate::render(session, state),
    }
}

// ── Input classification ────────────────────────────────────────────

/// `/start` restarts the conversation from the language keyboard.
pub(crate) fn is_start(text: &str) -> bool {
    text.trim() == "/start"
}

/// The escape phrase works in every supported spelling regardless of
/// the session language, so a user who switched languages mid-way is
/// never trapped.
pub(crate) fn is_main_menu(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    normalized == "главное меню" || normalized == "басты мәзір" || normalized == "main menu"
}

/// A press on the language keyboard, in either spelling.
pub(crate) fn language_choice(text: &str) -> Option<Lang> {
    match text.trim().to_lowercase().as_str() {
        "русский" => Some(Lang::Ru),
        "қазақша" => Some(Lang::Kz),
        _ => None,
    }
}

pub(crate) fn is_back(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    normalized == "назад" || normalized == "артқа" || normalized == "back"
}

/// Input equals the label of `msg` in either language.
pub(crate) fn matches_msg(text: &str, msg: Msg) -> bool {
    text == msg.text(Lang::Ru) || text == msg.text(Lang::Kz)
}

// ── Shared rendering helpers ────────────────────────────────────────

pub(crate) fn language_prompt(lang: Lang) -> Vec<Reply> {
    vec![Reply::prompt(
        Msg::ChooseLanguage.text(lang),
        vec![
            Msg::LangRussian.text(lang).to_string(),
            Msg::LangKazakh.text(lang).to_string(),
        ],
    )]
}

pub(crate) fn main_menu(lang: Lang) -> Vec<Reply> {
    vec![Reply::prompt(
        Msg::MainWelcome.text(lang),
        vec![
            Msg::MenuSchools.text(lang).to_string(),
            Msg::MenuOnline.text(lang).to_string(),
            Msg::MenuCertificate.text(lang).to_string(),
        ],
    )]
}

/// Append the navigation row shown under every in-flow prompt.
pub(crate) fn with_nav(lang: Lang, mut options: Vec<String>) -> Vec<String> {
    options.push(Msg::Back.text(lang).to_string());
    options.push(Msg::MainMenu.text(lang).to_string());
    options
}

/// Map an exhausted API error to a localized message, clear the session
/// and fall back to the main menu.
pub(crate) fn api_error_replies(session: &mut Session, error: &ApiError) -> Vec<Reply> {
    tracing::error!(error = %error, "API call failed, clearing session");
    let msg = match error {
        ApiError::Client { .. } => Msg::ErrorClient,
        ApiError::Server { .. } => Msg::ErrorServer,
        ApiError::Timeout => Msg::ErrorTimeout,
        ApiError::Network(_) => Msg::ErrorNetwork,
        ApiError::Unknown(_) => Msg::ErrorUnknown,
    };
    let lang = session.lang;
    session.reset();
    let mut replies = vec![Reply::text(msg.text(lang))];
    replies.extend(main_menu(lang));
    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_phrases_match_any_language_any_case() {
        assert!(is_main_menu("Главное меню"));
        assert!(is_main_menu("БАСТЫ МӘЗІР"));
        assert!(is_main_menu("main menu"));
        assert!(!is_main_menu("меню"));
        assert!(is_start("/start"));
        assert!(!is_main_menu("/start"));
    }

    #[test]
    fn language_buttons_parse_case_insensitively() {
        assert_eq!(language_choice("Русский"), Some(Lang::Ru));
        assert_eq!(language_choice(" қазақша "), Some(Lang::Kz));
        assert_eq!(language_choice("KZ"), None);
    }

    #[test]
    fn back_matches_both_languages() {
        assert!(is_back("Назад"));
        assert!(is_back(" артқа "));
        assert!(!is_back("назад!"));
    }
}
