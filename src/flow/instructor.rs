//! Instructor flow: city → category → gearbox → instructor →
//! instructor card → name → phone → confirm.
//!
//! Entered only through the certificate router, so the full category
//! list is available here.

use serde_json::json;

use crate::analytics::events;
use crate::api::types::Gearbox;
use crate::error::ApiError;
use crate::i18n::{Lang, Msg};
use crate::render::Reply;
use crate::session::{FlowState, InstructorState, Session};
use crate::validators;

use super::school::restrict_categories;
use super::{api_error_replies, main_menu, matches_msg, submit, with_nav, Dispatcher, Incoming};

pub(crate) async fn enter(d: &Dispatcher, session: &mut Session) -> Vec<Reply> {
    match d.api.list_cities().await {
        Ok(cities) if cities.is_empty() => {
            let mut replies = vec![Reply::text(Msg::NoCities.text(session.lang))];
            replies.extend(main_menu(session.lang));
            replies
        }
        Ok(cities) => {
            session.bag.cities = cities;
            session.advance(FlowState::Instructor(InstructorState::City));
            render(session, InstructorState::City)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

pub(crate) async fn handle(
    d: &Dispatcher,
    session: &mut Session,
    state: InstructorState,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    match state {
        InstructorState::City => on_city(d, session, incoming, text).await,
        InstructorState::Category => on_category(d, session, incoming, text),
        InstructorState::Gearbox => on_gearbox(d, session, incoming, text).await,
        InstructorState::Instructor => on_instructor(d, session, incoming, text).await,
        InstructorState::InstructorCard => on_card(d, session, incoming, text),
        InstructorState::Name => on_name(session, text),
        InstructorState::Phone => on_phone(session, incoming, text),
        InstructorState::Confirm => on_confirm(d, session, incoming, text).await,
    }
}

async fn on_city(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let Some(city) = session
        .bag
        .cities
        .iter()
        .find(|c| c.name.get(lang) == text)
        .cloned()
    else {
        return render(session, InstructorState::City);
    };
    session.bag.city_id = Some(city.id);
    session.bag.city_name = Some(city.name.get(lang).to_string());
    d.analytics.record(
        events::CITY_SELECTED,
        json!({"city_id": city.id}),
        Some(incoming.user.external_user_id),
        None,
    );
    match d.api.list_categories().await {
        Ok(categories) => {
            let categories = restrict_categories(categories, session.bag.main_intent);
            if categories.is_empty() {
                let mut replies = vec![Reply::text(Msg::NoCategories.text(lang))];
                replies.extend(render(session, InstructorState::City));
                return replies;
            }
            session.bag.categories = categories;
            session.advance(FlowState::Instructor(InstructorState::Category));
            render(session, InstructorState::Category)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

fn on_category(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let Some(category) = session
        .bag
        .categories
        .iter()
        .find(|c| c.name.get(lang) == text)
        .cloned()
    else {
        return render(session, InstructorState::Category);
    };
    session.bag.category_id = Some(category.id);
    session.bag.category_name = Some(category.name.get(lang).to_string());
    d.analytics.record(
        events::CATEGORY_SELECTED,
        json!({"category_id": category.id, "code": category.code}),
        Some(incoming.user.external_user_id),
        None,
    );
    session.advance(FlowState::Instructor(InstructorState::Gearbox));
    render(session, InstructorState::Gearbox)
}

async fn on_gearbox(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let gearbox = if matches_msg(text, Msg::GearboxAutomatic) {
        Gearbox::Automatic
    } else if matches_msg(text, Msg::GearboxManual) {
        Gearbox::Manual
    } else {
        return render(session, InstructorState::Gearbox);
    };
    let (Some(city_id), Some(category_id)) = (session.bag.city_id, session.bag.category_id) else {
        return api_error_replies(session, &ApiError::Unknown("selection lost".into()));
    };
    session.bag.gearbox = Some(gearbox);
    match d
        .api
        .list_instructors(city_id, category_id, Some(gearbox), None)
        .await
    {
        Ok(instructors) if instructors.is_empty() => {
            let mut replies = vec![Reply::text(Msg::NoInstructors.text(lang))];
            replies.extend(render(session, InstructorState::Gearbox));
            replies
        }
        Ok(instructors) => {
            session.bag.instructors = instructors;
            session.advance(FlowState::Instructor(InstructorState::Instructor));
            d.analytics.record(
                events::FORMAT_SELECTED,
                json!({"gearbox": gearbox}),
                Some(incoming.user.external_user_id),
                None,
            );
            render(session, InstructorState::Instructor)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

async fn on_instructor(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let Some(instructor) = session
        .bag
        .instructors
        .iter()
        .find(|i| i.display_name == text)
        .cloned()
    else {
        return render(session, InstructorState::Instructor);
    };
    match d.api.instructor_detail(instructor.id).await {
        Ok(detail) => {
            session.bag.instructor = Some(detail);
            session.advance(FlowState::Instructor(InstructorState::InstructorCard));
            d.analytics.record(
                events::SCHOOL_OPENED,
                json!({"instructor_id": instructor.id}),
                Some(incoming.user.external_user_id),
                None,
            );
            render(session, InstructorState::InstructorCard)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

fn on_card(d: &Dispatcher, session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    if !matches_msg(text, Msg::RegisterButton) {
        return render(session, InstructorState::InstructorCard);
    }
    d.analytics.record(
        events::REGISTER_BUTTON_CLICKED,
        json!({"instructor_id": session.bag.instructor.as_ref().map(|i| i.id)}),
        Some(incoming.user.external_user_id),
        None,
    );
    session.advance(FlowState::Instructor(InstructorState::Name));
    d.analytics.record(
        events::LEAD_FORM_OPENED,
        json!({"flow": "instructor"}),
        Some(incoming.user.external_user_id),
        None,
    );
    render(session, InstructorState::Name)
}

fn on_name(session: &mut Session, text: &str) -> Vec<Reply> {
    match validators::validate_name(text) {
        Ok(name) => {
            session.bag.name = Some(name);
            session.advance(FlowState::Instructor(InstructorState::Phone));
            render(session, InstructorState::Phone)
        }
        Err(_) => {
            let mut replies = vec![Reply::text(Msg::InvalidName.text(session.lang))];
            replies.extend(render(session, InstructorState::Name));
            replies
        }
    }
}

fn on_phone(session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    let raw = incoming.contact_phone.as_deref().unwrap_or(text);
    match validators::normalize_phone(raw) {
        Ok(phone) => {
            session.bag.phone = Some(phone);
            session.advance(FlowState::Instructor(InstructorState::Confirm));
            render(session, InstructorState::Confirm)
        }
        Err(_) => {
            let mut replies = vec![Reply::text(Msg::InvalidPhone.text(session.lang))];
            replies.extend(render(session, InstructorState::Phone));
            replies
        }
    }
}

async fn on_confirm(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    if matches_msg(text, Msg::AllCorrect) {
        return submit::instructor(d, session, &incoming.user).await;
    }
    if matches_msg(text, Msg::Fix) {
        session.rewind_to(FlowState::Instructor(InstructorState::Name));
        return render(session, InstructorState::Name);
    }
    render(session, InstructorState::Confirm)
}

// ── Rendering (pure, cache-only) ────────────────────────────────────

pub(crate) fn render(session: &Session, state: InstructorState) -> Vec<Reply> {
    let lang = session.lang;
    let bag = &session.bag;
    match state {
        InstructorState::City => vec![Reply::prompt(
            Msg::ChooseCity.text(lang),
            with_nav(
                lang,
                bag.cities.iter().map(|c| c.name.get(lang).to_string()).collect(),
            ),
        )],
        InstructorState::Category => vec![Reply::prompt(
            Msg::ChooseCategory.text(lang),
            with_nav(
                lang,
                bag.categories
                    .iter()
                    .map(|c| c.name.get(lang).to_string())
                    .collect(),
            ),
        )],
        InstructorState::Gearbox => vec![Reply::prompt(
            Msg::ChooseGearbox.text(lang),
            with_nav(
                lang,
                vec![
                    Msg::GearboxAutomatic.text(lang).to_string(),
                    Msg::GearboxManual.text(lang).to_string(),
                ],
            ),
        )],
        InstructorState::Instructor => vec![Reply::prompt(
            Msg::ChooseInstructor.text(lang),
            with_nav(
                lang,
                bag.instructors.iter().map(|i| i.display_name.clone()).collect(),
            ),
        )],
        InstructorState::InstructorCard => vec![Reply::prompt(
            instructor_card(session),
            with_nav(lang, vec![Msg::RegisterButton.text(lang).to_string()]),
        )],
        InstructorState::Name => vec![Reply::prompt(
            Msg::EnterName.text(lang),
            with_nav(lang, Vec::new()),
        )],
        InstructorState::Phone => vec![Reply::RequestContact {
            text: Msg::EnterPhone.text(lang).to_string(),
            share_label: Msg::ShareContact.text(lang).to_string(),
            options: with_nav(lang, Vec::new()),
        }],
        InstructorState::Confirm => vec![Reply::prompt(
            confirm_text(session),
            with_nav(
                lang,
                vec![
                    Msg::AllCorrect.text(lang).to_string(),
                    Msg::Fix.text(lang).to_string(),
                ],
            ),
        )],
    }
}

fn instructor_card(session: &Session) -> String {
    let lang = session.lang;
    let Some(instructor) = session.bag.instructor.as_ref() else {
        return Msg::ChooseInstructor.text(lang).to_string();
    };
    let mut card = format!("🚗 {}\n", instructor.display_name);
    card.push_str(&format!(
        "⭐ {}: {}\n",
        Msg::SchoolRating.text(lang),
        instructor.rating
    ));
    if let Some(gearbox) = instructor.gearbox {
        let label = match gearbox {
            Gearbox::Automatic => Msg::GearboxAutomatic,
            Gearbox::Manual => Msg::GearboxManual,
        };
        card.push_str(&format!(
            "⚙️ {}: {}\n",
            Msg::ChooseGearbox.text(lang).trim_end_matches(':'),
            label.text(lang)
        ));
    }
    let bio = instructor.bio.get(lang);
    if !bio.is_empty() {
        card.push('\n');
        card.push_str(bio);
    }
    card
}

fn confirm_text(session: &Session) -> String {
    let lang = session.lang;
    let bag = &session.bag;
    let field = |ru: &str, kz: &str| match lang {
        Lang::Ru => ru.to_string(),
        Lang::Kz => kz.to_string(),
    };
    let mut lines = vec![Msg::ConfirmData.text(lang).to_string(), String::new()];
    if let Some(city) = bag.city_name.as_deref() {
        lines.push(format!("{}: {city}", field("Город", "Қала")));
    }
    if let Some(category) = bag.category_name.as_deref() {
        lines.push(format!("{}: {category}", field("Категория", "Санат")));
    }
    if let Some(gearbox) = bag.gearbox {
        let label = match gearbox {
            Gearbox::Automatic => Msg::GearboxAutomatic,
            Gearbox::Manual => Msg::GearboxManual,
        };
        lines.push(format!("{}: {}", field("КПП", "БҚ"), label.text(lang)));
    }
    if let Some(instructor) = bag.instructor.as_ref() {
        lines.push(format!(
            "{}: {}",
            field("Инструктор", "Нұсқаушы"),
            instructor.display_name
        ));
    }
    if let Some(name) = bag.name.as_deref() {
        lines.push(format!("{}: {name}", field("Имя", "Аты")));
    }
    if let Some(phone) = bag.phone.as_deref() {
        lines.push(format!("{}: {phone}", field("Телефон", "Телефон")));
    }
    lines.join("\n")
}
