//! Certificate router.
//!
//! For users who finished a driving school but have not passed the state
//! exam yet. One menu state; choosing an option tags the session with
//! `CERT_NOT_PASSED` and hands over to the School or Instructor flow.
//! The handed-over flows then offer the full category list instead of
//! only category B.

use serde_json::json;

use crate::analytics::events;
use crate::api::types::Intent;
use crate::i18n::Msg;
use crate::render::Reply;
use crate::session::{CertificateState, FlowState, Session};

use super::{instructor, matches_msg, school, with_nav, Dispatcher, Incoming};

pub(crate) fn enter(session: &mut Session) -> Vec<Reply> {
    session.advance(FlowState::Certificate(CertificateState::SelectAction));
    render(session, CertificateState::SelectAction)
}

pub(crate) async fn handle(
    d: &Dispatcher,
    session: &mut Session,
    state: CertificateState,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    match state {
        CertificateState::SelectAction => on_select(d, session, incoming, text).await,
    }
}

async fn on_select(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    if matches_msg(text, Msg::CertSchoolAgain) {
        session.bag.main_intent = Some(Intent::CertNotPassed);
        d.analytics.record(
            events::CERTIFICATE_ACTION_SELECTED,
            json!({"action": "school"}),
            Some(incoming.user.external_user_id),
            None,
        );
        return school::enter(d, session).await;
    }
    if matches_msg(text, Msg::CertInstructor) {
        session.bag.main_intent = Some(Intent::CertNotPassed);
        d.analytics.record(
            events::CERTIFICATE_ACTION_SELECTED,
            json!({"action": "instructor"}),
            Some(incoming.user.external_user_id),
            None,
        );
        return instructor::enter(d, session).await;
    }
    render(session, CertificateState::SelectAction)
}

pub(crate) fn render(session: &Session, state: CertificateState) -> Vec<Reply> {
    let lang = session.lang;
    match state {
        CertificateState::SelectAction => vec![Reply::prompt(
            Msg::CertIntro.text(lang),
            with_nav(
                lang,
                vec![
                    Msg::CertSchoolAgain.text(lang).to_string(),
                    Msg::CertInstructor.text(lang).to_string(),
                ],
            ),
        )],
    }
}
