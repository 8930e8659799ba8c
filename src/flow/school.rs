//! School-enrollment flow: city → category → training format → lesson
//! time → school → school card → tariff → name → phone → confirm. The
//! time step is skipped when the catalog defines no slots.

use chrono::NaiveDate;
use serde_json::json;

use crate::analytics::events;
use crate::api::types::{filter_tariffs, Category, Intent, Tariff, TariffFilter};
use crate::error::ApiError;
use crate::i18n::{Lang, Msg};
use crate::render::Reply;
use crate::session::{FlowState, SchoolState, Session};
use crate::validators;

use super::{api_error_replies, main_menu, matches_msg, submit, with_nav, Dispatcher, Incoming};

/// Start the flow: fetch cities and show the first prompt.
pub(crate) async fn enter(d: &Dispatcher, session: &mut Session) -> Vec<Reply> {
    match d.api.list_cities().await {
        Ok(cities) if cities.is_empty() => {
            let mut replies = vec![Reply::text(Msg::NoCities.text(session.lang))];
            replies.extend(main_menu(session.lang));
            replies
        }
        Ok(cities) => {
            session.bag.cities = cities;
            session.advance(FlowState::School(SchoolState::City));
            render(session, SchoolState::City)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

pub(crate) async fn handle(
    d: &Dispatcher,
    session: &mut Session,
    state: SchoolState,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    match state {
        SchoolState::City => on_city(d, session, incoming, text).await,
        SchoolState::Category => on_category(d, session, incoming, text).await,
        SchoolState::TrainingFormat => on_format(d, session, incoming, text).await,
        SchoolState::TrainingTime => on_training_time(d, session, incoming, text).await,
        SchoolState::School => on_school(d, session, incoming, text).await,
        SchoolState::SchoolCard => on_card(d, session, incoming, text),
        SchoolState::Tariff => on_tariff(d, session, incoming, text),
        SchoolState::Name => on_name(session, text),
        SchoolState::Phone => on_phone(session, incoming, text),
        SchoolState::Confirm => on_confirm(d, session, incoming, text).await,
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
        return render(session, SchoolState::City);
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
                replies.extend(render(session, SchoolState::City));
                return replies;
            }
            session.bag.categories = categories;
            session.advance(FlowState::School(SchoolState::Category));
            render(session, SchoolState::Category)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

async fn on_category(
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
        return render(session, SchoolState::Category);
    };
    session.bag.category_id = Some(category.id);
    session.bag.category_name = Some(category.name.get(lang).to_string());
    d.analytics.record(
        events::CATEGORY_SELECTED,
        json!({"category_id": category.id, "code": category.code}),
        Some(incoming.user.external_user_id),
        None,
    );
    match d.api.list_training_formats().await {
        Ok(formats) if formats.is_empty() => {
            api_error_replies(session, &ApiError::Unknown("no training formats".into()))
        }
        Ok(formats) => {
            session.bag.formats = formats;
            session.advance(FlowState::School(SchoolState::TrainingFormat));
            render(session, SchoolState::TrainingFormat)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

async fn on_format(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let Some(format) = session
        .bag
        .formats
        .iter()
        .find(|f| f.name.get(lang) == text)
        .cloned()
    else {
        return render(session, SchoolState::TrainingFormat);
    };
    session.bag.training_format_id = Some(format.id);
    session.bag.format_name = Some(format.name.get(lang).to_string());
    d.analytics.record(
        events::FORMAT_SELECTED,
        json!({"training_format_id": format.id}),
        Some(incoming.user.external_user_id),
        None,
    );
    match d.api.list_training_times().await {
        // A catalog without time slots goes straight to the school list.
        Ok(times) if times.is_empty() => {
            load_schools(d, session, SchoolState::TrainingFormat).await
        }
        Ok(times) => {
            session.bag.training_times = times;
            session.advance(FlowState::School(SchoolState::TrainingTime));
            render(session, SchoolState::TrainingTime)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

async fn on_training_time(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let Some(slot) = session
        .bag
        .training_times
        .iter()
        .find(|t| t.name.get(lang) == text)
        .cloned()
    else {
        return render(session, SchoolState::TrainingTime);
    };
    session.bag.training_time_id = Some(slot.id);
    session.bag.training_time_name = Some(slot.name.get(lang).to_string());
    d.analytics.record(
        events::TIME_SELECTED,
        json!({"training_time_id": slot.id}),
        Some(incoming.user.external_user_id),
        None,
    );
    load_schools(d, session, SchoolState::TrainingTime).await
}

/// Fetch the school list for the selected city and advance; on an empty
/// list re-prompt the step we came from.
async fn load_schools(d: &Dispatcher, session: &mut Session, from: SchoolState) -> Vec<Reply> {
    let lang = session.lang;
    let Some(city_id) = session.bag.city_id else {
        return api_error_replies(session, &ApiError::Unknown("city selection lost".into()));
    };
    match d.api.list_schools(city_id).await {
        Ok(schools) if schools.is_empty() => {
            let mut replies = vec![Reply::text(Msg::NoSchools.text(lang))];
            replies.extend(render(session, from));
            replies
        }
        Ok(schools) => {
            session.bag.schools = schools;
            session.advance(FlowState::School(SchoolState::School));
            render(session, SchoolState::School)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

async fn on_school(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let lang = session.lang;
    let Some(school) = session
        .bag
        .schools
        .iter()
        .find(|s| s.name.get(lang) == text)
        .cloned()
    else {
        return render(session, SchoolState::School);
    };
    let filter = TariffFilter {
        category_id: session.bag.category_id,
        training_format_id: session.bag.training_format_id,
        training_time_id: session.bag.training_time_id,
    };
    match d.api.school_detail(school.id, filter).await {
        Ok(detail) => {
            session.bag.tariffs = filter_tariffs(&detail.tariffs, filter);
            session.bag.school = Some(detail);
            session.advance(FlowState::School(SchoolState::SchoolCard));
            d.analytics.record(
                events::SCHOOL_OPENED,
                json!({"school_id": school.id}),
                Some(incoming.user.external_user_id),
                None,
            );
            render(session, SchoolState::SchoolCard)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

fn on_card(d: &Dispatcher, session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    let lang = session.lang;
    if !matches_msg(text, Msg::RegisterButton) {
        return render(session, SchoolState::SchoolCard);
    }
    d.analytics.record(
        events::REGISTER_BUTTON_CLICKED,
        json!({"school_id": session.bag.school.as_ref().map(|s| s.id)}),
        Some(incoming.user.external_user_id),
        None,
    );
    if session.bag.tariffs.is_empty() {
        let mut replies = vec![Reply::text(Msg::NoTariffs.text(lang))];
        replies.extend(render(session, SchoolState::SchoolCard));
        return replies;
    }
    session.advance(FlowState::School(SchoolState::Tariff));
    render(session, SchoolState::Tariff)
}

fn on_tariff(d: &Dispatcher, session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    let lang = session.lang;
    let Some(tariff) = session
        .bag
        .tariffs
        .iter()
        .find(|t| tariff_label(t, lang) == text)
        .cloned()
    else {
        return render(session, SchoolState::Tariff);
    };
    d.analytics.record(
        events::TARIFF_SELECTED,
        json!({"tariff_plan_id": tariff.tariff_plan_id}),
        Some(incoming.user.external_user_id),
        None,
    );
    session.bag.tariff = Some(tariff);
    session.advance(FlowState::School(SchoolState::Name));
    d.analytics.record(
        events::LEAD_FORM_OPENED,
        json!({"flow": "school"}),
        Some(incoming.user.external_user_id),
        None,
    );
    render(session, SchoolState::Name)
}

fn on_name(session: &mut Session, text: &str) -> Vec<Reply> {
    match validators::validate_name(text) {
        Ok(name) => {
            session.bag.name = Some(name);
            session.advance(FlowState::School(SchoolState::Phone));
            render(session, SchoolState::Phone)
        }
        Err(_) => {
            let mut replies = vec![Reply::text(Msg::InvalidName.text(session.lang))];
            replies.extend(render(session, SchoolState::Name));
            replies
        }
    }
}

fn on_phone(session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    let raw = incoming.contact_phone.as_deref().unwrap_or(text);
    match validators::normalize_phone(raw) {
        Ok(phone) => {
            session.bag.phone = Some(phone);
            session.advance(FlowState::School(SchoolState::Confirm));
            render(session, SchoolState::Confirm)
        }
        Err(_) => {
            let mut replies = vec![Reply::text(Msg::InvalidPhone.text(session.lang))];
            replies.extend(render(session, SchoolState::Phone));
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
        return submit::school(d, session, &incoming.user).await;
    }
    if matches_msg(text, Msg::Fix) {
        session.rewind_to(FlowState::School(SchoolState::Name));
        return render(session, SchoolState::Name);
    }
    render(session, SchoolState::Confirm)
}

// ── Rendering (pure, cache-only) ────────────────────────────────────

pub(crate) fn render(session: &Session, state: SchoolState) -> Vec<Reply> {
    let lang = session.lang;
    let bag = &session.bag;
    match state {
        SchoolState::City => vec![Reply::prompt(
            Msg::ChooseCity.text(lang),
            with_nav(
                lang,
                bag.cities.iter().map(|c| c.name.get(lang).to_string()).collect(),
            ),
        )],
        SchoolState::Category => vec![Reply::prompt(
            Msg::ChooseCategory.text(lang),
            with_nav(
                lang,
                bag.categories
                    .iter()
                    .map(|c| c.name.get(lang).to_string())
                    .collect(),
            ),
        )],
        SchoolState::TrainingFormat => vec![Reply::prompt(
            Msg::ChooseFormat.text(lang),
            with_nav(
                lang,
                bag.formats.iter().map(|f| f.name.get(lang).to_string()).collect(),
            ),
        )],
        SchoolState::TrainingTime => vec![Reply::prompt(
            Msg::ChooseTime.text(lang),
            with_nav(
                lang,
                bag.training_times
                    .iter()
                    .map(|t| t.name.get(lang).to_string())
                    .collect(),
            ),
        )],
        SchoolState::School => vec![Reply::prompt(
            Msg::ChooseSchool.text(lang),
            with_nav(
                lang,
                bag.schools.iter().map(|s| s.name.get(lang).to_string()).collect(),
            ),
        )],
        SchoolState::SchoolCard => vec![Reply::prompt(
            school_card(session),
            with_nav(lang, vec![Msg::RegisterButton.text(lang).to_string()]),
        )],
        SchoolState::Tariff => vec![Reply::prompt(
            Msg::ChooseTariff.text(lang),
            with_nav(
                lang,
                bag.tariffs.iter().map(|t| tariff_label(t, lang)).collect(),
            ),
        )],
        SchoolState::Name => vec![Reply::prompt(
            Msg::EnterName.text(lang),
            with_nav(lang, Vec::new()),
        )],
        SchoolState::Phone => vec![Reply::RequestContact {
            text: Msg::EnterPhone.text(lang).to_string(),
            share_label: Msg::ShareContact.text(lang).to_string(),
            options: with_nav(lang, Vec::new()),
        }],
        SchoolState::Confirm => vec![Reply::prompt(
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

/// Restrict the category list to code "B" unless the user arrived via
/// the certificate router.
pub(crate) fn restrict_categories(
    categories: Vec<Category>,
    main_intent: Option<Intent>,
) -> Vec<Category> {
    if main_intent == Some(Intent::CertNotPassed) {
        categories
    } else {
        categories.into_iter().filter(|c| c.code == "B").collect()
    }
}

pub(crate) fn tariff_label(tariff: &Tariff, lang: Lang) -> String {
    format!(
        "{} - {} {}",
        tariff.display_name(lang),
        tariff.price_kzt,
        tariff.currency.as_deref().unwrap_or("KZT")
    )
}

fn school_card(session: &Session) -> String {
    let lang = session.lang;
    let Some(school) = session.bag.school.as_ref() else {
        return Msg::ChooseSchool.text(lang).to_string();
    };
    let mut card = format!("🏫 {}\n", school.name.get(lang));
    card.push_str(&format!(
        "⭐ {}: {}\n",
        Msg::SchoolRating.text(lang),
        school.rating
    ));
    card.push_str(&format!(
        "🛡 {}: {}\n",
        Msg::SchoolTrust.text(lang),
        school.trust_index
    ));
    let address = school.address.get(lang);
    if !address.is_empty() {
        card.push_str(&format!("📍 {}: {}\n", Msg::SchoolAddress.text(lang), address));
    }
    if let Some(intake) = intake_line(session, lang) {
        card.push_str(&format!("📅 {}: {}\n", Msg::SchoolIntake.text(lang), intake));
    }
    let description = school.description.get(lang);
    if !description.is_empty() {
        card.push('\n');
        card.push_str(description);
    }
    card
}

fn intake_line(session: &Session, lang: Lang) -> Option<String> {
    let intake = &session.bag.school.as_ref()?.nearest_intake;
    if let Some(text) = intake.text(lang) {
        return Some(text.to_string());
    }
    let date = intake.date.as_deref()?;
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => Some(parsed.format("%d.%m.%Y").to_string()),
        Err(_) => Some(date.to_string()),
    }
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
    if let Some(format_name) = bag.format_name.as_deref() {
        lines.push(format!("{}: {format_name}", field("Формат", "Формат")));
    }
    if let Some(time_name) = bag.training_time_name.as_deref() {
        lines.push(format!("{}: {time_name}", field("Время", "Уақыт")));
    }
    if let Some(school) = bag.school.as_ref() {
        lines.push(format!("{}: {}", field("Автошкола", "Автошкола"), school.name.get(lang)));
    }
    if let Some(tariff) = bag.tariff.as_ref() {
        lines.push(format!("{}: {}", field("Тариф", "Тариф"), tariff_label(tariff, lang)));
    }
    if let Some(name) = bag.name.as_deref() {
        lines.push(format!("{}: {name}", field("Имя", "Аты")));
    }
    if let Some(phone) = bag.phone.as_deref() {
        lines.push(format!("{}: {phone}", field("Телефон", "Телефон")));
    }
    lines.join("\n")
}
