//! Lead assembly and submission, shared by the flows' confirm states.
//!
//! On success the session is cleared and the user gets a thank-you plus
//! a WhatsApp deep link; on failure the API error is mapped to a
//! localized message and the session is cleared as well.

use serde_json::json;
use uuid::Uuid;

use crate::analytics::events;
use crate::api::types::{BotUser, Contact, LeadPayload, LeadRequest, LeadType};
use crate::error::ApiError;
use crate::i18n::Msg;
use crate::render::Reply;
use crate::session::Session;

use super::{api_error_replies, main_menu, Dispatcher};

pub(crate) async fn school(d: &Dispatcher, session: &mut Session, user: &BotUser) -> Vec<Reply> {
    let lang = session.lang;
    let bag = session.bag.clone();
    let (
        Some(city_id),
        Some(category_id),
        Some(training_format_id),
        Some(school),
        Some(tariff),
        Some(name),
        Some(phone),
    ) = (
        bag.city_id,
        bag.category_id,
        bag.training_format_id,
        bag.school,
        bag.tariff,
        bag.name,
        bag.phone,
    )
    else {
        return api_error_replies(session, &ApiError::Unknown("incomplete enrollment data".into()));
    };

    let lead = LeadRequest {
        lead_type: LeadType::School,
        language: lang,
        main_intent: bag.main_intent,
        bot_user: stamp_language(user, session),
        contact: Contact {
            name: name.clone(),
            phone: phone.clone(),
        },
        payload: LeadPayload::School {
            city_id: Some(city_id),
            category_id,
            training_format_id,
            training_time_id: bag.training_time_id,
            school_id: school.id,
            tariff_plan_id: Some(tariff.tariff_plan_id),
            tariff_price_kzt: Some(tariff.price_kzt),
            iin: None,
            whatsapp: None,
        },
    };

    match d.api.create_lead(&lead).await {
        Ok(created) => {
            tracing::info!(lead_id = %created.id, school_id = school.id, "school lead submitted");
            d.analytics.record(
                events::LEAD_SUBMITTED,
                json!({"type": "SCHOOL", "school_id": school.id}),
                Some(user.external_user_id),
                Some(created.id),
            );
            let url = d.links.school_lead(
                lang,
                bag.city_name.as_deref().unwrap_or_default(),
                bag.category_name.as_deref().unwrap_or_default(),
                bag.format_name.as_deref().unwrap_or_default(),
                bag.training_time_name.as_deref(),
                school.name.get(lang),
                &name,
                &phone,
            );
            accepted(d, session, user, created.id, url)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

pub(crate) async fn online(d: &Dispatcher, session: &mut Session, user: &BotUser) -> Vec<Reply> {
    let lang = session.lang;
    let bag = session.bag.clone();
    let (Some(product), Some(first_name), Some(last_name), Some(iin), Some(whatsapp)) = (
        bag.product,
        bag.first_name,
        bag.last_name,
        bag.iin,
        bag.phone,
    )
    else {
        return api_error_replies(session, &ApiError::Unknown("incomplete online-product data".into()));
    };

    // The tariff is re-resolved right before submission so a catalog
    // change between product choice and confirm cannot produce a lead
    // with a stale plan id.
    let resolved = match d
        .api
        .resolve_online_tariff(product.plan_code(), bag.category_id, None)
        .await
    {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            session.reset();
            let mut replies = vec![Reply::text(Msg::TariffNotFound.text(lang))];
            replies.extend(main_menu(lang));
            return replies;
        }
        Err(e) => return api_error_replies(session, &e),
    };
    let Some(category_id) = bag.category_id else {
        return api_error_replies(session, &ApiError::Unknown("missing category for online lead".into()));
    };

    let full_name = format!("{first_name} {last_name}");
    let lead = LeadRequest {
        lead_type: LeadType::School,
        language: lang,
        main_intent: bag.main_intent,
        bot_user: stamp_language(user, session),
        contact: Contact {
            name: full_name.clone(),
            phone: whatsapp.clone(),
        },
        payload: LeadPayload::School {
            city_id: None,
            category_id,
            training_format_id: resolved.training_format_id.unwrap_or(1),
            training_time_id: None,
            school_id: resolved.school_id,
            tariff_plan_id: Some(resolved.tariff_plan_id),
            tariff_price_kzt: Some(resolved.price_kzt),
            iin: Some(iin.clone()),
            whatsapp: Some(whatsapp.clone()),
        },
    };

    match d.api.create_lead(&lead).await {
        Ok(created) => {
            tracing::info!(lead_id = %created.id, plan = product.plan_code(), "online lead submitted");
            d.analytics.record(
                events::LEAD_SUBMITTED,
                json!({"type": "SCHOOL", "tariff_plan_id": resolved.tariff_plan_id}),
                Some(user.external_user_id),
                Some(created.id),
            );
            let url = d.links.online_lead(
                lang,
                resolved.name.get(lang),
                bag.category_name.as_deref(),
                &full_name,
                &iin,
                &whatsapp,
            );
            accepted(d, session, user, created.id, url)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

pub(crate) async fn instructor(d: &Dispatcher, session: &mut Session, user: &BotUser) -> Vec<Reply> {
    let lang = session.lang;
    let bag = session.bag.clone();
    let (
        Some(city_id),
        Some(category_id),
        Some(gearbox),
        Some(instructor),
        Some(name),
        Some(phone),
    ) = (
        bag.city_id,
        bag.category_id,
        bag.gearbox,
        bag.instructor,
        bag.name,
        bag.phone,
    )
    else {
        return api_error_replies(session, &ApiError::Unknown("incomplete instructor data".into()));
    };

    let lead = LeadRequest {
        lead_type: LeadType::Instructor,
        language: lang,
        main_intent: bag.main_intent,
        bot_user: stamp_language(user, session),
        contact: Contact {
            name: name.clone(),
            phone: phone.clone(),
        },
        payload: LeadPayload::Instructor {
            city_id,
            category_id,
            gearbox,
            instructor_id: instructor.id,
        },
    };

    match d.api.create_lead(&lead).await {
        Ok(created) => {
            tracing::info!(lead_id = %created.id, instructor_id = instructor.id, "instructor lead submitted");
            d.analytics.record(
                events::LEAD_SUBMITTED,
                json!({"type": "INSTRUCTOR", "instructor_id": instructor.id}),
                Some(user.external_user_id),
                Some(created.id),
            );
            let url = d.links.instructor_lead(
                lang,
                &instructor.display_name,
                bag.category_name.as_deref().unwrap_or_default(),
                &name,
                &phone,
            );
            accepted(d, session, user, created.id, url)
        }
        Err(e) => api_error_replies(session, &e),
    }
}

fn stamp_language(user: &BotUser, session: &Session) -> BotUser {
    BotUser {
        language: session.lang,
        ..user.clone()
    }
}

fn accepted(
    d: &Dispatcher,
    session: &mut Session,
    user: &BotUser,
    lead_id: Uuid,
    url: String,
) -> Vec<Reply> {
    let lang = session.lang;
    d.analytics.record(
        events::WHATSAPP_OPENED,
        json!({}),
        Some(user.external_user_id),
        Some(lead_id),
    );
    session.reset();
    let mut replies = vec![
        Reply::text(Msg::ThankYou.text(lang)),
        Reply::Link {
            text: Msg::OpenWhatsappHint.text(lang).to_string(),
            label: Msg::OpenWhatsapp.text(lang).to_string(),
            url,
        },
    ];
    replies.extend(main_menu(lang));
    replies
}
