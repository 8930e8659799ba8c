//! Online-product flow: product choice → category (PDD tests only) →
//! first name → last name → IIN → WhatsApp → confirm.
//!
//! Start and Pro Drive pin category B and skip the category step. The
//! chosen product is carried as a plan code; the concrete tariff is
//! resolved against the backend only at submission time.

use serde_json::json;

use crate::analytics::events;
use crate::api::types::OnlineProduct;
use crate::i18n::{Lang, Msg};
use crate::render::Reply;
use crate::session::{FlowState, OnlineState, Session};
use crate::validators;

use super::{api_error_replies, matches_msg, submit, with_nav, Dispatcher, Incoming};

pub(crate) fn enter(session: &mut Session) -> Vec<Reply> {
    session.advance(FlowState::Online(OnlineState::ProductChoice));
    render(session, OnlineState::ProductChoice)
}

pub(crate) async fn handle(
    d: &Dispatcher,
    session: &mut Session,
    state: OnlineState,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    match state {
        OnlineState::ProductChoice => on_product(d, session, incoming, text).await,
        OnlineState::Category => on_category(session, text),
        OnlineState::FirstName => on_first_name(session, text),
        OnlineState::LastName => on_last_name(session, text),
        OnlineState::Iin => on_iin(session, text),
        OnlineState::Whatsapp => on_whatsapp(session, incoming, text),
        OnlineState::Confirm => on_confirm(d, session, incoming, text).await,
    }
}

fn product_msg(product: OnlineProduct) -> Msg {
    match product {
        OnlineProduct::PddTests => Msg::ProductPddTests,
        OnlineProduct::Start => Msg::ProductStart,
        OnlineProduct::ProDrive => Msg::ProductProDrive,
    }
}

async fn on_product(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    let product = if matches_msg(text, Msg::ProductPddTests) {
        OnlineProduct::PddTests
    } else if matches_msg(text, Msg::ProductStart) {
        OnlineProduct::Start
    } else if matches_msg(text, Msg::ProductProDrive) {
        OnlineProduct::ProDrive
    } else {
        return render(session, OnlineState::ProductChoice);
    };
    session.bag.product = Some(product);
    d.analytics.record(
        events::PRODUCT_SELECTED,
        json!({"plan_code": product.plan_code()}),
        Some(incoming.user.external_user_id),
        None,
    );

    let lang = session.lang;
    let categories = match d.api.list_categories().await {
        Ok(categories) => categories,
        Err(e) => return api_error_replies(session, &e),
    };
    match product {
        // Tests are offered per license category.
        OnlineProduct::PddTests => {
            if categories.is_empty() {
                let mut replies = vec![Reply::text(Msg::NoCategories.text(lang))];
                replies.extend(render(session, OnlineState::ProductChoice));
                return replies;
            }
            session.bag.categories = categories;
            session.advance(FlowState::Online(OnlineState::Category));
            render(session, OnlineState::Category)
        }
        // The driving courses exist only for category B.
        OnlineProduct::Start | OnlineProduct::ProDrive => {
            let Some(b) = categories.into_iter().find(|c| c.code == "B") else {
                let mut replies = vec![Reply::text(Msg::OnlyCategoryB.text(lang))];
                replies.extend(render(session, OnlineState::ProductChoice));
                return replies;
            };
            session.bag.category_id = Some(b.id);
            session.bag.category_name = Some(b.name.get(lang).to_string());
            session.advance(FlowState::Online(OnlineState::FirstName));
            render(session, OnlineState::FirstName)
        }
    }
}

fn on_category(session: &mut Session, text: &str) -> Vec<Reply> {
    let lang = session.lang;
    let Some(category) = session
        .bag
        .categories
        .iter()
        .find(|c| c.name.get(lang) == text)
        .cloned()
    else {
        return render(session, OnlineState::Category);
    };
    session.bag.category_id = Some(category.id);
    session.bag.category_name = Some(category.name.get(lang).to_string());
    session.advance(FlowState::Online(OnlineState::FirstName));
    render(session, OnlineState::FirstName)
}

fn on_first_name(session: &mut Session, text: &str) -> Vec<Reply> {
    match validators::validate_name(text) {
        Ok(name) => {
            session.bag.first_name = Some(name);
            session.advance(FlowState::Online(OnlineState::LastName));
            render(session, OnlineState::LastName)
        }
        Err(_) => invalid(session, Msg::InvalidName, OnlineState::FirstName),
    }
}

fn on_last_name(session: &mut Session, text: &str) -> Vec<Reply> {
    match validators::validate_name(text) {
        Ok(name) => {
            session.bag.last_name = Some(name);
            session.advance(FlowState::Online(OnlineState::Iin));
            render(session, OnlineState::Iin)
        }
        Err(_) => invalid(session, Msg::InvalidName, OnlineState::LastName),
    }
}

fn on_iin(session: &mut Session, text: &str) -> Vec<Reply> {
    match validators::validate_iin(text) {
        Ok(iin) => {
            session.bag.iin = Some(iin);
            session.advance(FlowState::Online(OnlineState::Whatsapp));
            render(session, OnlineState::Whatsapp)
        }
        Err(_) => invalid(session, Msg::InvalidIin, OnlineState::Iin),
    }
}

fn on_whatsapp(session: &mut Session, incoming: &Incoming, text: &str) -> Vec<Reply> {
    let raw = incoming.contact_phone.as_deref().unwrap_or(text);
    match validators::normalize_phone(raw) {
        Ok(phone) => {
            session.bag.phone = Some(phone);
            session.advance(FlowState::Online(OnlineState::Confirm));
            render(session, OnlineState::Confirm)
        }
        Err(_) => invalid(session, Msg::InvalidPhone, OnlineState::Whatsapp),
    }
}

async fn on_confirm(
    d: &Dispatcher,
    session: &mut Session,
    incoming: &Incoming,
    text: &str,
) -> Vec<Reply> {
    if matches_msg(text, Msg::AllCorrect) {
        return submit::online(d, session, &incoming.user).await;
    }
    if matches_msg(text, Msg::Fix) {
        session.rewind_to(FlowState::Online(OnlineState::FirstName));
        return render(session, OnlineState::FirstName);
    }
    render(session, OnlineState::Confirm)
}

fn invalid(session: &Session, msg: Msg, state: OnlineState) -> Vec<Reply> {
    let mut replies = vec![Reply::text(msg.text(session.lang))];
    replies.extend(render(session, state));
    replies
}

// ── Rendering (pure, cache-only) ────────────────────────────────────

pub(crate) fn render(session: &Session, state: OnlineState) -> Vec<Reply> {
    let lang = session.lang;
    match state {
        OnlineState::ProductChoice => vec![Reply::prompt(
            Msg::OnlineChooseProduct.text(lang),
            with_nav(
                lang,
                vec![
                    Msg::ProductPddTests.text(lang).to_string(),
                    Msg::ProductStart.text(lang).to_string(),
                    Msg::ProductProDrive.text(lang).to_string(),
                ],
            ),
        )],
        OnlineState::Category => vec![Reply::prompt(
            Msg::ChooseCategory.text(lang),
            with_nav(
                lang,
                session
                    .bag
                    .categories
                    .iter()
                    .map(|c| c.name.get(lang).to_string())
                    .collect(),
            ),
        )],
        OnlineState::FirstName => vec![Reply::prompt(
            Msg::EnterFirstName.text(lang),
            with_nav(lang, Vec::new()),
        )],
        OnlineState::LastName => vec![Reply::prompt(
            Msg::EnterLastName.text(lang),
            with_nav(lang, Vec::new()),
        )],
        OnlineState::Iin => vec![Reply::prompt(
            Msg::EnterIin.text(lang),
            with_nav(lang, Vec::new()),
        )],
        OnlineState::Whatsapp => vec![Reply::RequestContact {
            text: Msg::EnterWhatsapp.text(lang).to_string(),
            share_label: Msg::ShareContact.text(lang).to_string(),
            options: with_nav(lang, Vec::new()),
        }],
        OnlineState::Confirm => vec![Reply::prompt(
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

fn confirm_text(session: &Session) -> String {
    let lang = session.lang;
    let bag = &session.bag;
    let field = |ru: &str, kz: &str| match lang {
        Lang::Ru => ru.to_string(),
        Lang::Kz => kz.to_string(),
    };
    let mut lines = vec![Msg::ConfirmData.text(lang).to_string(), String::new()];
    if let Some(product) = bag.product {
        lines.push(format!(
            "{}: {}",
            field("Тариф", "Тариф"),
            product_msg(product).text(lang)
        ));
    }
    if let Some(category) = bag.category_name.as_deref() {
        lines.push(format!("{}: {category}", field("Категория", "Санат")));
    }
    let full_name = match (bag.first_name.as_deref(), bag.last_name.as_deref()) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(first), None) => Some(first.to_string()),
        _ => None,
    };
    if let Some(name) = full_name {
        lines.push(format!("{}: {name}", field("Имя", "Аты")));
    }
    if let Some(iin) = bag.iin.as_deref() {
        lines.push(format!("{}: {iin}", field("ИИН", "ЖСН")));
    }
    if let Some(phone) = bag.phone.as_deref() {
        lines.push(format!("WhatsApp: {phone}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_prompt_lists_all_three_products() {
        let mut session = Session::new(Lang::Ru);
        let replies = enter(&mut session);
        assert_eq!(session.state, FlowState::Online(OnlineState::ProductChoice));
        let Reply::Prompt { options, .. } = &replies[0] else {
            panic!("expected prompt");
        };
        assert!(options.contains(&Msg::ProductStart.text(Lang::Ru).to_string()));
        assert_eq!(options.len(), 5); // three products + nav row
    }

    #[test]
    fn invalid_iin_reprompts_without_touching_bag() {
        let mut session = Session::new(Lang::Ru);
        session.advance(FlowState::Online(OnlineState::Iin));
        let replies = on_iin(&mut session, "not-an-iin");
        assert_eq!(session.state, FlowState::Online(OnlineState::Iin));
        assert!(session.bag.iin.is_none());
        assert_eq!(
            replies[0],
            Reply::text(Msg::InvalidIin.text(Lang::Ru))
        );
    }
}
